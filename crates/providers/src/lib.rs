pub mod auth;
pub mod openai_compat;
pub mod registry;
pub(crate) mod sse;
pub(crate) mod util;

pub use openai_compat::OpenAiCompatModelPlugin;
pub use registry::{register_providers, ProviderInitError};
