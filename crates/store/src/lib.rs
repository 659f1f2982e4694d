pub mod engine;
pub mod filter;
pub mod record;
pub mod schema;
pub mod store;

pub use filter::{Filter, Predicate};
pub use record::Record;
pub use schema::{FieldDef, FieldKind, Schema};
pub use store::Store;
