pub mod capability;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod r2r;
pub mod stream;
pub mod trace;

pub use capability::ModelCapabilities;
pub use config::{AuthConfig, Config, ProviderConfig};
pub use error::{Error, Result};
pub use event::{Event, Kind as EventKind};
pub use message::{ContextEntry, Message, MessageKind, Role, ToolCall, ToolContext};
pub use r2r::Progress;
pub use stream::{BoxStream, ModelChunk, Usage};
pub use trace::TraceEvent;
