// File: tests/json_store_concurrency.rs
use chrono::NaiveDate;
use recur::clock::FixedClock;
use recur::config::Config;
use recur::context::{AppContext, TestContext};
use recur::controller::{ChangeEvent, Rescheduler};
use recur::model::{FieldPatch, Fields};
use recur::notify::RecordingSink;
use recur::storage::JsonFieldStore;
use recur::store::{FieldStore, MemoryFieldStore};
use recur::system::spawn_reschedule_actor;
use serde_json::json;
use serial_test::serial;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn fields(v: serde_json::Value) -> Fields {
    v.as_object().cloned().unwrap()
}

/// Two writers patch the same document at once; both updates must survive
/// because each one is a locked read-modify-write.
#[test]
#[serial]
fn test_concurrent_patches_do_not_lose_updates() {
    let ctx = TestContext::new();
    let store = Arc::new(JsonFieldStore::new(ctx.get_data_dir().unwrap()));
    store
        .save("shared", &fields(json!({"kind": "task", "status": "done"})))
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|key| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let patch = FieldPatch::default().set(key, json!(true));
                store.apply("shared", &patch).unwrap();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let loaded = store.load("shared").unwrap();
    assert_eq!(loaded["left"], json!(true));
    assert_eq!(loaded["right"], json!(true));
    assert_eq!(loaded["status"], json!("done"));
}

#[tokio::test]
#[serial]
async fn test_directory_of_documents_is_rescheduled() {
    let ctx = TestContext::new();
    let dir = ctx.get_documents_dir().unwrap();
    let store = JsonFieldStore::new(&dir);
    store
        .save(
            "laundry",
            &fields(json!({"kind": "task", "status": "done", "repeat": "every week"})),
        )
        .unwrap();
    store
        .save(
            "groceries",
            &fields(json!({"kind": "task", "status": "todo", "repeat": "every week"})),
        )
        .unwrap();
    store
        .save(
            "typo",
            &fields(json!({"kind": "task", "status": "done", "repeat": "every blue moon"})),
        )
        .unwrap();

    let sink = Arc::new(RecordingSink::new());
    let r = Arc::new(Rescheduler::new(
        JsonFieldStore::new(&dir),
        sink.clone(),
        FixedClock(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()),
        &Config::default(),
    ));

    let docs = store.list_documents().unwrap();
    assert_eq!(docs, vec!["groceries", "laundry", "typo"]);
    let results = futures::future::join_all(docs.iter().map(|d| r.handle_document(d))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let laundry = store.load("laundry").unwrap();
    assert_eq!(laundry["status"], json!("todo"));
    assert_eq!(laundry["scheduled"], json!("2026-05-08"));
    assert!(store.load("groceries").unwrap().get("scheduled").is_none());
    assert_eq!(store.load("typo").unwrap()["status"], json!("done"));
    assert_eq!(
        sink.messages(),
        vec!["Unsupported repeat value: every blue moon"]
    );
}

#[tokio::test]
#[serial]
async fn test_every_listed_document_can_be_handled() {
    let ctx = TestContext::new();
    let dir = ctx.get_documents_dir().unwrap();
    std::fs::write(
        dir.join("Water plants.json"),
        r#"{"kind": "task", "status": "done", "repeat": "every day"}"#,
    )
    .unwrap();
    std::fs::write(dir.join("v1.2.json"), r#"{"kind": "note"}"#).unwrap();

    let store = JsonFieldStore::new(&dir);
    let r = Rescheduler::new(
        JsonFieldStore::new(&dir),
        RecordingSink::new(),
        FixedClock(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()),
        &Config::default(),
    );

    let docs = store.list_documents().unwrap();
    assert_eq!(docs, vec!["Water plants", "v1.2"]);
    for doc in &docs {
        r.handle_document(doc).await.unwrap();
    }
    assert_eq!(
        store.load("Water plants").unwrap()["scheduled"],
        json!("2026-05-02")
    );
}

#[tokio::test]
async fn test_actor_handles_every_event() {
    let store = Arc::new(MemoryFieldStore::new());
    let sink = Arc::new(RecordingSink::new());
    let r = Arc::new(Rescheduler::new(
        store.clone(),
        sink.clone(),
        FixedClock(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()),
        &Config::default(),
    ));

    let tx = spawn_reschedule_actor(r);
    for i in 0..10 {
        let doc = format!("task-{}", i);
        let f = fields(json!({"kind": "task", "status": "done", "repeat": "daily"}));
        store.insert(&doc, f.clone()).await;
        tx.send(ChangeEvent::new(doc, f)).await.unwrap();
    }
    tx.send(ChangeEvent::new(
        "broken",
        fields(json!({"kind": "task", "status": "done", "repeat": "every now and then"})),
    ))
    .await
    .unwrap();
    drop(tx);

    // Events are handled on spawned tasks; poll until they have landed.
    let mut done = false;
    for _ in 0..100 {
        let mut pending = 0;
        for i in 0..10 {
            let f = store.read(&format!("task-{}", i)).await.unwrap();
            if f["status"] != json!("todo") {
                pending += 1;
            }
        }
        if pending == 0 && sink.messages().len() == 1 {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(done, "actor did not process every event");

    let f = store.read("task-3").await.unwrap();
    assert_eq!(f["scheduled"], json!("2026-05-02"));
}
