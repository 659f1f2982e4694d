//! History log: a thread/message façade built on `turnloom-store`.

pub mod log;
pub mod thread;

pub use log::{HistoryLog, SearchHit};
pub use thread::ThreadHeader;
