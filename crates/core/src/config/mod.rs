//! The layered Config Registry (spec §4.5): database entries over a
//! file-backed document over built-in defaults.

pub mod defaults;
pub mod file;
pub mod registry;

pub use defaults::{ConfigDefaults, TaskClassDef, ToolDef};
pub use file::FileConfig;
pub use registry::ConfigRegistry;
