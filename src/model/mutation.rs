// File: ./src/model/mutation.rs
use crate::model::record::{DATE_FORMAT, FieldSchema, Fields};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The state a rescheduled task is reset to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub status: String,
    pub scheduled: NaiveDate,
}

impl Mutation {
    pub fn new(next: NaiveDate, schema: &FieldSchema) -> Self {
        Self {
            status: schema.pending_status.clone(),
            scheduled: next,
        }
    }

    /// Both updates as one patch, so the store can apply them together.
    pub fn to_patch(&self, schema: &FieldSchema) -> FieldPatch {
        FieldPatch::default()
            .set(&schema.status_field, Value::String(self.status.clone()))
            .set(
                &schema.scheduled_field,
                Value::String(self.scheduled.format(DATE_FORMAT).to_string()),
            )
    }
}

/// An ordered list of field assignments, applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub updates: Vec<(String, Value)>,
}

impl FieldPatch {
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.updates.push((key.to_string(), value));
        self
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.updates.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Applies every assignment to `fields`. Keys not in the patch are kept.
    pub fn apply_to(&self, fields: &mut Fields) {
        for (key, value) in &self.updates {
            fields.insert(key.clone(), value.clone());
        }
    }
}
