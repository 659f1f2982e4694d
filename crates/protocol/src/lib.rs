//! Wire framing for the typed event envelope. The orchestrator only
//! produces the envelope sequence (see `turnloom_domain::event`); this
//! crate is the one transport rendering this core ships.

pub mod sse;

pub use sse::to_sse_frame;
