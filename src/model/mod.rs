// File: ./src/model/mod.rs
pub mod mutation;
pub mod parser;
pub mod record;
pub mod recurrence;

pub use mutation::{FieldPatch, Mutation};
pub use parser::parse_recurrence;
pub use record::{DATE_FORMAT, FieldSchema, Fields, TaskRecord};
pub use recurrence::{
    ByFilter, DEFAULT_MAX_RETRIES, Frequency, RecurrenceEngine, RecurrencePattern, RecurrenceRule,
};
