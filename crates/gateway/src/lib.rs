//! The chat-loop binary's library half: wiring, background-task tracking,
//! and the `TurnOrchestrator` that fills the `MessageProcessor` role.

pub mod bootstrap;
pub mod orchestrator;
pub mod state;
pub mod tasks;

pub use bootstrap::build_app_state;
pub use state::AppState;
