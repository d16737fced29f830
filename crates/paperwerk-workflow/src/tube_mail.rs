// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tube mail — in-process, mailbox-addressed, fire-and-forget message bus.
//
// Every registered receiver of a mailbox gets its own copy of each message,
// delivered on Tokio's blocking pool. Delivery is at most once and unordered.
// Receiver errors are logged here and never reach the sender.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use paperwerk_core::error::Result;

use crate::activity::ActivityTracker;
use crate::message::{Mailbox, Message};

/// A mailbox receiver. Runs on a blocking thread.
pub type Receiver<M> = Arc<dyn Fn(M) -> Result<()> + Send + Sync>;

/// Asynchronous fan-out bus for messages of type `M`.
pub struct TubeMail<M: Message> {
    receivers: RwLock<HashMap<Mailbox, Vec<Receiver<M>>>>,
    runtime: Handle,
    activity: Arc<ActivityTracker>,
}

impl<M: Message> TubeMail<M> {
    /// Deliveries are spawned on `runtime`; each one counts as activity on
    /// `activity` until its receiver returns.
    pub fn new(runtime: Handle, activity: Arc<ActivityTracker>) -> Self {
        Self {
            receivers: RwLock::new(HashMap::new()),
            runtime,
            activity,
        }
    }

    /// Add `receiver` to `mailbox`. Every registration fires.
    pub fn register_receiver(&self, mailbox: Mailbox, receiver: Receiver<M>) {
        let mut receivers = self.receivers.write().unwrap_or_else(PoisonError::into_inner);
        receivers.entry(mailbox).or_default().push(receiver);
        debug!(%mailbox, "receiver registered");
    }

    /// Deliver `message` to every receiver of its mailbox and return
    /// immediately.
    pub fn send_message(&self, message: M) {
        let mailbox = message.mailbox();
        let receivers = self
            .receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&mailbox)
            .cloned()
            .unwrap_or_default();

        if receivers.is_empty() {
            warn!(%mailbox, ?message, "no receivers registered; message dropped");
            return;
        }

        for receiver in receivers {
            let guard = self.activity.begin();
            let message = message.clone();
            self.runtime.spawn_blocking(move || {
                let _guard = guard;
                debug!(%mailbox, ?message, "delivering message");
                if let Err(e) = receiver(message.clone()) {
                    error!(%mailbox, ?message, error = %e, "receiver failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use paperwerk_core::error::PaperwerkError;
    use paperwerk_core::types::{DocumentNumber, PageNumber};

    use crate::message::WorkMessage;

    fn bus() -> (Arc<ActivityTracker>, TubeMail<WorkMessage>) {
        let activity = ActivityTracker::new();
        let bus = TubeMail::new(Handle::current(), activity.clone());
        (activity, bus)
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Receiver<WorkMessage> {
        let counter = counter.clone();
        Arc::new(move |_: WorkMessage| -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    async fn drained(activity: &ActivityTracker) {
        tokio::time::timeout(Duration::from_secs(5), activity.idle())
            .await
            .expect("bus drained");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn every_receiver_is_invoked() {
        let (activity, bus) = bus();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        bus.register_receiver(Mailbox::DOCUMENT_INDEX, counting(&first));
        bus.register_receiver(Mailbox::DOCUMENT_INDEX, counting(&second));

        bus.send_message(WorkMessage::IndexDocument {
            document: DocumentNumber(1),
        });
        drained(&activity).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_receivers_is_not_an_error() {
        let (activity, bus) = bus();
        bus.send_message(WorkMessage::PreprocessPage {
            document: DocumentNumber(1),
            page: PageNumber(0),
        });
        assert_eq!(activity.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mailboxes_are_isolated() {
        let (activity, bus) = bus();
        let index = Arc::new(AtomicUsize::new(0));
        let analyze = Arc::new(AtomicUsize::new(0));
        bus.register_receiver(Mailbox::DOCUMENT_INDEX, counting(&index));
        bus.register_receiver(Mailbox::PAGE_ANALYZE, counting(&analyze));

        bus.send_message(WorkMessage::AnalyzePage {
            document: DocumentNumber(2),
            page: PageNumber(3),
        });
        drained(&activity).await;

        assert_eq!(index.load(Ordering::SeqCst), 0);
        assert_eq!(analyze.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn receiver_errors_stay_inside_the_bus() {
        let (activity, bus) = bus();
        let after = Arc::new(AtomicUsize::new(0));
        bus.register_receiver(
            Mailbox::DOCUMENT_INDEX,
            Arc::new(|_: WorkMessage| -> Result<()> {
                Err(PaperwerkError::Index("index offline".into()))
            }),
        );
        bus.register_receiver(Mailbox::DOCUMENT_INDEX, counting(&after));

        bus.send_message(WorkMessage::IndexDocument {
            document: DocumentNumber(1),
        });
        drained(&activity).await;

        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn receivers_get_the_message_payload() {
        let (activity, bus) = bus();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.register_receiver(
            Mailbox::PAGE_PREPROCESS,
            Arc::new(move |message: WorkMessage| -> Result<()> {
                sink.lock().expect("lock").push(message);
                Ok(())
            }),
        );

        for page in 0..3 {
            bus.send_message(WorkMessage::PreprocessPage {
                document: DocumentNumber(9),
                page: PageNumber(page),
            });
        }
        drained(&activity).await;

        let mut pages: Vec<_> = seen
            .lock()
            .expect("lock")
            .iter()
            .map(|m| match m {
                WorkMessage::PreprocessPage { page, .. } => page.0,
                other => panic!("unexpected message {other:?}"),
            })
            .collect();
        pages.sort_unstable();
        assert_eq!(pages, [0, 1, 2]);
    }
}
