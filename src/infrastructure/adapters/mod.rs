//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod comfy;
pub mod download;
pub mod report;

pub use comfy::*;
pub use download::*;
pub use report::*;
