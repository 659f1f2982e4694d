use async_trait::async_trait;
use turnloom_domain::{BoxStream, Event, Result};

/// The single TurnOrchestrator implementation fills this role. Kept as a
/// trait (rather than a concrete dependency on the orchestrator's crate)
/// so the registry — and anything built against it — never needs to know
/// about the gateway crate at all.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Process one user turn end-to-end, returning the envelope stream the
    /// transport will forward to the client.
    async fn process_turn(
        &self,
        user_id: String,
        thread_id: String,
        user_message: String,
        model_override: Option<String>,
    ) -> Result<BoxStream<'static, Event>>;
}
