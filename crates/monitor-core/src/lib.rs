pub mod detectors;
pub mod error;
pub mod render;
pub mod traits;
pub mod types;

pub use detectors::*;
pub use error::*;
pub use render::*;
pub use traits::*;
pub use types::*;
