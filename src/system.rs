// File: ./src/system.rs
use crate::clock::Clock;
use crate::controller::{ChangeEvent, Outcome, Rescheduler};
use crate::notify::NotificationSink;
use crate::store::FieldStore;
use std::sync::Arc;
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 32;

/// Spawns the background rescheduling actor.
/// returns: Sender to push field changes into.
///
/// Every event is evaluated on its own task, so a slow store write never holds
/// up unrelated documents. The actor stops once all senders are dropped.
pub fn spawn_reschedule_actor<S, N, C>(
    rescheduler: Arc<Rescheduler<S, N, C>>,
) -> mpsc::Sender<ChangeEvent>
where
    S: FieldStore + 'static,
    N: NotificationSink + 'static,
    C: Clock + 'static,
{
    let (tx, mut rx) = mpsc::channel::<ChangeEvent>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let rescheduler = rescheduler.clone();
            tokio::spawn(async move {
                match rescheduler.handle_change(&event).await {
                    Ok(Outcome::Skipped) => {}
                    Ok(Outcome::Reported(msg)) => {
                        log::debug!("{}: {}", event.document, msg);
                    }
                    Ok(Outcome::Rescheduled(_)) => {}
                    Err(e) => {
                        log::error!("{}: {}", event.document, e);
                    }
                }
            });
        }
        log::debug!("Reschedule actor stopped: channel closed");
    });

    tx
}
