// File: src/controller.rs
//! Rescheduling of completed repeating tasks.
//!
//! `Rescheduler` is the single entry point for a field change: it checks
//! eligibility, evaluates the `repeat` expression at today's date and resets
//! the record to a pending status on the next occurrence. Expression failures
//! are reported through the notification sink; store failures propagate.
use crate::clock::Clock;
use crate::config::Config;
use crate::error::RescheduleError;
use crate::model::{FieldSchema, Fields, Mutation, RecurrenceEngine, TaskRecord, parse_recurrence};
use crate::notify::NotificationSink;
use crate::store::FieldStore;

/// A structured-field change on one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub document: String,
    pub fields: Fields,
}

impl ChangeEvent {
    pub fn new(document: impl Into<String>, fields: Fields) -> Self {
        Self {
            document: document.into(),
            fields,
        }
    }
}

/// Result of evaluating a record, before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Not a completed repeating task; nothing to do.
    Skip,
    Reschedule(Mutation),
}

/// What `handle_change` did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    /// The expression could not be used; the message went to the sink.
    Reported(String),
    Rescheduled(Mutation),
}

pub struct Rescheduler<S, N, C> {
    store: S,
    sink: N,
    clock: C,
    schema: FieldSchema,
    max_retries: usize,
}

impl<S, N, C> Rescheduler<S, N, C>
where
    S: FieldStore,
    N: NotificationSink,
    C: Clock,
{
    pub fn new(store: S, sink: N, clock: C, config: &Config) -> Self {
        Self {
            store,
            sink,
            clock,
            schema: config.schema(),
            max_retries: config.max_initial_period_retries,
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decides what should happen to `fields`. Performs no I/O.
    pub fn evaluate(&self, fields: &Fields) -> Result<Evaluation, RescheduleError> {
        let record = TaskRecord::from_fields(fields, &self.schema);
        if !record.is_eligible(&self.schema) {
            return Ok(Evaluation::Skip);
        }
        // Eligibility guarantees a non-empty expression.
        let Some(expression) = record.repeat_expression() else {
            return Ok(Evaluation::Skip);
        };

        let pattern = parse_recurrence(expression)?;
        let today = self.clock.today();

        if let Some(previous) = record.scheduled
            && previous < today
        {
            log::debug!(
                "Previous schedule {} is in the past; evaluating '{}' from {}",
                previous,
                expression,
                today
            );
        }

        let next = RecurrenceEngine::next_from(&pattern, today, self.max_retries)
            .ok_or_else(|| RescheduleError::UnresolvableOccurrence(expression.to_string()))?;

        Ok(Evaluation::Reschedule(Mutation::new(next, &self.schema)))
    }

    /// Evaluates a change and applies the outcome.
    ///
    /// User-facing failures produce exactly one sink message and no write.
    /// Only a failed write is returned as an error.
    pub async fn handle_change(&self, event: &ChangeEvent) -> Result<Outcome, RescheduleError> {
        let mutation = match self.evaluate(&event.fields) {
            Ok(Evaluation::Skip) => return Ok(Outcome::Skipped),
            Ok(Evaluation::Reschedule(mutation)) => mutation,
            Err(e) if e.is_user_facing() => {
                let message = e.to_string();
                self.sink.notify(&message);
                return Ok(Outcome::Reported(message));
            }
            Err(e) => return Err(e),
        };

        let patch = mutation.to_patch(&self.schema);
        self.store
            .write(&event.document, &patch)
            .await
            .map_err(RescheduleError::Persistence)?;

        log::info!(
            "Rescheduled {} to {} ({})",
            event.document,
            mutation.scheduled,
            mutation.status
        );
        Ok(Outcome::Rescheduled(mutation))
    }

    /// Reads `document` from the store, then handles it like a change.
    pub async fn handle_document(&self, document: &str) -> Result<Outcome, RescheduleError> {
        let fields = self
            .store
            .read(document)
            .await
            .map_err(RescheduleError::Persistence)?;
        self.handle_change(&ChangeEvent::new(document, fields)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notify::RecordingSink;
    use crate::store::MemoryFieldStore;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fields(v: serde_json::Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    fn rescheduler(
        today: NaiveDate,
    ) -> (
        Rescheduler<Arc<MemoryFieldStore>, Arc<RecordingSink>, FixedClock>,
        Arc<MemoryFieldStore>,
        Arc<RecordingSink>,
    ) {
        let store = Arc::new(MemoryFieldStore::new());
        let sink = Arc::new(RecordingSink::new());
        let r = Rescheduler::new(
            store.clone(),
            sink.clone(),
            FixedClock(today),
            &Config::default(),
        );
        (r, store, sink)
    }

    #[test]
    fn test_evaluate_skips_ineligible_records() {
        let (r, _, _) = rescheduler(date(2026, 5, 1));
        let cases = [
            json!({"kind": "note", "status": "done", "repeat": "every day"}),
            json!({"kind": "task", "status": "todo", "repeat": "every day"}),
            json!({"kind": "task", "status": "done"}),
            json!({"kind": "task", "status": "done", "repeat": "   "}),
            json!({"status": "done", "repeat": "every day"}),
        ];
        for case in cases {
            assert_eq!(r.evaluate(&fields(case)).unwrap(), Evaluation::Skip);
        }
    }

    #[test]
    fn test_evaluate_every_day() {
        let (r, _, _) = rescheduler(date(2026, 5, 1));
        let eval = r
            .evaluate(&fields(
                json!({"kind": "task", "status": "done", "repeat": "every day"}),
            ))
            .unwrap();
        assert_eq!(
            eval,
            Evaluation::Reschedule(Mutation {
                status: "todo".to_string(),
                scheduled: date(2026, 5, 2),
            })
        );
    }

    #[test]
    fn test_evaluate_ignores_stale_schedule() {
        let (r, _, _) = rescheduler(date(2026, 5, 1));
        let eval = r
            .evaluate(&fields(json!({
                "kind": "task",
                "status": "done",
                "repeat": "every week",
                "scheduled": "2025-01-01"
            })))
            .unwrap();
        let Evaluation::Reschedule(m) = eval else {
            panic!("expected a reschedule");
        };
        assert_eq!(m.scheduled, date(2026, 5, 8));
    }

    #[tokio::test]
    async fn test_unsupported_expression_reports_once() {
        let (r, store, sink) = rescheduler(date(2026, 5, 1));
        let original = fields(json!({"kind": "task", "status": "done", "repeat": "every fortnight"}));
        store.insert("t", original.clone()).await;

        let outcome = r.handle_document("t").await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Reported("Unsupported repeat value: every fortnight".to_string())
        );
        assert_eq!(sink.messages().len(), 1);
        assert_eq!(store.read("t").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_failed_write_propagates() {
        let (r, store, sink) = rescheduler(date(2026, 5, 1));
        let original = fields(json!({"kind": "task", "status": "done", "repeat": "every day"}));
        store.insert("t", original.clone()).await;
        store.fail_next_write();

        let err = r.handle_document("t").await.unwrap_err();
        assert!(matches!(err, RescheduleError::Persistence(_)));
        assert!(!err.is_user_facing());
        assert!(sink.messages().is_empty());
        assert_eq!(store.read("t").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_missing_document_is_a_persistence_error() {
        let (r, _, _) = rescheduler(date(2026, 5, 1));
        let err = r.handle_document("nope").await.unwrap_err();
        assert!(matches!(err, RescheduleError::Persistence(_)));
    }
}
