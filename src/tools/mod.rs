//! Tool abstraction and registry.

mod registry;
mod traits;

pub use registry::ToolRegistry;
pub use traits::{SchemaTool, Tool};
