// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Message channel plumbing between the controller and the queue transport.
//!
//! Outbound events are encoded here and handed to a [`Publisher`]; publish
//! failures are logged and never retried. Inbound payloads are decoded in
//! the consumer task and forwarded to the controller as events.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use pwr_core::ControllerError;
use pwr_protocol::{decode_command, encode_event, StateEvent};

use crate::controller::ControllerEvent;

/// Alias to reduce type complexity in Publisher.
pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ControllerError>> + Send + 'a>>;

/// Raw inbound deliveries; transport failures carry their description.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>;

/// Fire-and-forget delivery of encoded payloads to a named queue.
pub trait Publisher: Send + Sync {
    fn publish<'a>(&'a self, queue: &'a str, payload: Vec<u8>) -> PublishFuture<'a>;
}

/// Alias to reduce type complexity in QueueSession.
pub type SessionFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ControllerError>> + Send + 'a>>;

/// A broker connection carrying the node's queues.
///
/// Sessions are not closed on drop; whoever opens one must call `close`.
pub trait QueueSession: Publisher {
    fn declare<'a>(&'a self, queue: &'a str) -> SessionFuture<'a, ()>;
    fn consume<'a>(&'a self, queue: &'a str, tag: &'a str) -> SessionFuture<'a, DeliveryStream>;
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Publisher that keeps every payload in memory.
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    sent: Vec<(String, Vec<u8>)>,
    failing: bool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Every `(queue, payload)` accepted so far.
    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().sent.clone()
    }

    /// Accepted payloads parsed as JSON, in publish order.
    pub fn json(&self) -> Vec<serde_json::Value> {
        self.lock()
            .sent
            .iter()
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Publisher for MemoryPublisher {
    fn publish<'a>(&'a self, queue: &'a str, payload: Vec<u8>) -> PublishFuture<'a> {
        Box::pin(async move {
            let mut state = self.lock();
            if state.failing {
                return Err(ControllerError::Publish {
                    queue: queue.to_string(),
                    reason: "publisher unavailable".to_string(),
                });
            }
            state.sent.push((queue.to_string(), payload));
            Ok(())
        })
    }
}

/// Upstream side of the node's channel.
#[derive(Clone)]
pub struct Outbound {
    publisher: Arc<dyn Publisher>,
    queue: String,
}

impl Outbound {
    pub fn new(publisher: Arc<dyn Publisher>, queue: impl Into<String>) -> Self {
        Self {
            publisher,
            queue: queue.into(),
        }
    }

    /// Encode and publish `event`. Returns whether the publisher accepted it.
    pub async fn publish(&self, event: &StateEvent) -> bool {
        let payload = match encode_event(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Cannot encode event for pin {}: {}", event.pin(), e);
                return false;
            }
        };
        match self.publisher.publish(&self.queue, payload).await {
            Ok(()) => {
                debug!("Published state of pin {} to {}", event.pin(), self.queue);
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}

/// Drain raw inbound deliveries into controller events.
///
/// Stops on the first undecodable payload or transport failure after
/// reporting it as fatal, or when the controller is gone.
pub async fn forward_inbound<S>(mut deliveries: S, events: mpsc::Sender<ControllerEvent>)
where
    S: Stream<Item = Result<Vec<u8>, String>> + Unpin,
{
    while let Some(delivery) = deliveries.next().await {
        let event = match delivery {
            Ok(payload) => match decode_command(&payload) {
                Ok(cmd) => ControllerEvent::Command(cmd),
                Err(e) => {
                    let _ = events
                        .send(ControllerEvent::Fatal(ControllerError::CommandDecode(
                            e.to_string(),
                        )))
                        .await;
                    return;
                }
            },
            Err(reason) => {
                let _ = events
                    .send(ControllerEvent::Fatal(ControllerError::Transport(reason)))
                    .await;
                return;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
    let _ = events
        .send(ControllerEvent::Fatal(ControllerError::Transport(
            "inbound consumer closed".to_string(),
        )))
        .await;
}
