//! Tool registration, invocation, and the raise-to-return adapter.

pub mod adapter;
pub mod builtin;
pub mod derived;
pub mod error_envelope;
pub mod registry;
pub mod tool;

pub use adapter::R2RAdapter;
pub use derived::{DerivedTool, ParamKind, ParamSpec};
pub use error_envelope::error_envelope;
pub use registry::ToolRegistry;
pub use tool::Tool;
