// File: ./src/model/record.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured key/value metadata of one document, as handed over by the
/// change notifier or read from a field store.
pub type Fields = serde_json::Map<String, Value>;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Names of the fields the rescheduler reads and writes, and the marker
/// values it compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub kind_field: String,
    pub status_field: String,
    pub repeat_field: String,
    pub scheduled_field: String,
    pub task_kind: String,
    pub done_status: String,
    pub pending_status: String,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            kind_field: "kind".to_string(),
            status_field: "status".to_string(),
            repeat_field: "repeat".to_string(),
            scheduled_field: "scheduled".to_string(),
            task_kind: "task".to_string(),
            done_status: "done".to_string(),
            pending_status: "todo".to_string(),
        }
    }
}

/// Lenient, typed view over a document's fields.
///
/// Every field is optional. A field that is missing, or holds a value of the
/// wrong type, reads as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRecord {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub repeat: Option<String>,
    pub scheduled: Option<NaiveDate>,
}

impl TaskRecord {
    pub fn from_fields(fields: &Fields, schema: &FieldSchema) -> Self {
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            kind: text(&schema.kind_field),
            status: text(&schema.status_field),
            repeat: text(&schema.repeat_field),
            scheduled: text(&schema.scheduled_field)
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()),
        }
    }

    pub fn is_task(&self, schema: &FieldSchema) -> bool {
        self.kind.as_deref() == Some(schema.task_kind.as_str())
    }

    pub fn is_done(&self, schema: &FieldSchema) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(&schema.done_status))
    }

    /// The recurrence expression, if present and not blank.
    pub fn repeat_expression(&self) -> Option<&str> {
        self.repeat.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// A completed, repeating task. Anything else is left alone.
    pub fn is_eligible(&self, schema: &FieldSchema) -> bool {
        self.is_task(schema) && self.is_done(schema) && self.repeat_expression().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_done_repeating_task_is_eligible() {
        let schema = FieldSchema::default();
        let f = fields(json!({"kind": "task", "status": "DONE", "repeat": "every day"}));
        assert!(TaskRecord::from_fields(&f, &schema).is_eligible(&schema));
    }

    #[test]
    fn test_missing_or_mistyped_fields_are_not_eligible() {
        let schema = FieldSchema::default();
        let cases = [
            json!({}),
            json!({"kind": "note", "status": "done", "repeat": "every day"}),
            json!({"kind": "task", "repeat": "every day"}),
            json!({"kind": "task", "status": true, "repeat": "every day"}),
            json!({"kind": "task", "status": "todo", "repeat": "every day"}),
            json!({"kind": "task", "status": "done"}),
            json!({"kind": "task", "status": "done", "repeat": "   "}),
            json!({"kind": "task", "status": "done", "repeat": 7}),
            json!({"kind": null, "status": null, "repeat": null}),
        ];
        for case in cases {
            let record = TaskRecord::from_fields(&fields(case.clone()), &schema);
            assert!(!record.is_eligible(&schema), "{case} should not be eligible");
        }
    }

    #[test]
    fn test_custom_schema_field_names() {
        let schema = FieldSchema {
            status_field: "task.status".to_string(),
            repeat_field: "task.repeat".to_string(),
            scheduled_field: "task.scheduled".to_string(),
            ..FieldSchema::default()
        };
        let f = fields(json!({
            "kind": "task",
            "task.status": "Done",
            "task.repeat": "every week",
            "task.scheduled": "2026-01-05",
        }));
        let record = TaskRecord::from_fields(&f, &schema);
        assert!(record.is_eligible(&schema));
        assert_eq!(record.scheduled, NaiveDate::from_ymd_opt(2026, 1, 5));
    }

    #[test]
    fn test_unparseable_scheduled_reads_as_none() {
        let schema = FieldSchema::default();
        let f = fields(json!({"scheduled": "next tuesday"}));
        assert_eq!(TaskRecord::from_fields(&f, &schema).scheduled, None);
    }
}
