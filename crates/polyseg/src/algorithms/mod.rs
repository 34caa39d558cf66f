pub mod extraction;
pub mod selection;
pub mod simplification;
pub mod confidence;

pub use extraction::*;
pub use selection::*;
pub use simplification::*;
pub use confidence::*;
