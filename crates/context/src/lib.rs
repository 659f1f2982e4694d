//! Per-(thread, user) model-visible context view, built on `turnloom-history`.

pub mod cache;

pub use cache::ContextCache;
