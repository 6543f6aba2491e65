use monitor_core::{AlertSummary, SectionKind, SummarySection};

pub struct EmailTemplate;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl EmailTemplate {
    pub fn render(summary: &AlertSummary) -> String {
        let body_content: String = summary.sections.iter().map(Self::render_section).collect();

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td>
        <div style="background:#ef4444;color:#fff;padding:12px 20px;border-radius:8px 8px 0 0;font-size:18px;font-weight:700;">{title}</div>
        {body_content}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">Generated at {ts} UTC</p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">Stock Monitor</p>
  </td></tr>
</table>
</body>
</html>"#,
            title = escape(&summary.title),
            ts = summary.generated_at.format("%Y-%m-%d %H:%M:%S"),
        )
    }

    fn render_section(section: &SummarySection) -> String {
        // Change and decline columns are highlighted red
        let highlight = match section.kind {
            SectionKind::DailyDrops => 1,
            SectionKind::ConsecutiveDeclines => 4,
        };

        let header: String = section
            .columns
            .iter()
            .map(String::as_str)
            .chain(std::iter::once("Chart"))
            .map(|c| {
                format!(
                    r#"<th style="padding:8px 12px;text-align:left;color:#64748b;background:#f8fafc;">{}</th>"#,
                    escape(c)
                )
            })
            .collect();

        let rows: String = section
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let background = if i % 2 == 1 { r#" style="background:#f8fafc;""# } else { "" };
                let cells: String = row
                    .cells
                    .iter()
                    .enumerate()
                    .map(|(col, cell)| {
                        let style = match col {
                            0 => "font-weight:700;color:#1976d2;",
                            c if c == highlight => "font-weight:600;color:#ef4444;",
                            _ => "font-weight:600;",
                        };
                        format!(
                            r#"<td style="padding:8px 12px;{}">{}</td>"#,
                            style,
                            escape(cell)
                        )
                    })
                    .collect();
                format!(
                    r#"<tr{background}>{cells}<td style="padding:8px 12px;"><a href="{url}">View Chart</a></td></tr>"#,
                    url = escape(&row.chart_url()),
                )
            })
            .collect();

        format!(
            r#"<h3 style="margin:16px 20px 8px;color:#1e293b;">{heading}</h3>
<table style="width:100%;border-collapse:collapse;">
  <tr>{header}</tr>
  {rows}
</table>"#,
            heading = escape(&section.heading),
        )
    }
}
