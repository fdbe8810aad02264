// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Reader pin sampling and change deduplication.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pwr_core::{ControllerError, GpioBackend, PinConfig, PinId};
use pwr_protocol::ReaderEvent;

use crate::controller::ControllerEvent;
use crate::registry::{PinRegistry, ReaderState};

pub struct ObservationEngine {
    readers: PinRegistry<ReaderState>,
    node_id: String,
    service: String,
    events: mpsc::Sender<ControllerEvent>,
    watchers: Vec<JoinHandle<()>>,
}

impl ObservationEngine {
    pub fn new(
        node_id: impl Into<String>,
        service: impl Into<String>,
        events: mpsc::Sender<ControllerEvent>,
    ) -> Self {
        Self {
            readers: PinRegistry::new(),
            node_id: node_id.into(),
            service: service.into(),
            events,
            watchers: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        backend: &dyn GpioBackend,
        config: &PinConfig,
    ) -> Result<(), ControllerError> {
        let reader = self.readers.register(backend, config)?;
        info!("Reader pin {} registered", reader.pin);
        Ok(())
    }

    pub fn readers(&self) -> &PinRegistry<ReaderState> {
        &self.readers
    }

    pub fn last_published(&self, pin: PinId) -> Option<bool> {
        self.readers.get(pin).map(|r| r.last_published_status)
    }

    /// Seed a reader so its boot-time level is reported exactly once.
    ///
    /// The published status starts as the complement of the first sample,
    /// then a second sample is run through [`observe`](Self::observe).
    pub async fn init_reader(&mut self, pin: PinId) -> Result<Option<ReaderEvent>, ControllerError> {
        let reader = self.readers.find(pin)?;
        let first = sample(reader).await?;
        reader.last_published_status = !first;
        let level = sample(reader).await?;
        Ok(self.observe(pin, level))
    }

    /// Record a sampled level. Returns the event to publish when it differs
    /// from the last published status.
    pub fn observe(&mut self, pin: PinId, level: bool) -> Option<ReaderEvent> {
        let Some(reader) = self.readers.get_mut(pin) else {
            warn!("Level change on unregistered reader pin {}", pin);
            return None;
        };
        if reader.last_published_status == level {
            debug!("Reader pin {} still {}", pin, level);
            return None;
        }
        reader.last_published_status = level;
        Some(ReaderEvent {
            id: pin,
            status: level,
            service: self.service.clone(),
            node_id: self.node_id.clone(),
        })
    }

    /// Forward hardware level changes of `pin` to the controller.
    ///
    /// A failing or ending watch is reported as fatal; the stream cannot be
    /// resumed.
    pub fn watch(&mut self, pin: PinId) -> Result<(), ControllerError> {
        let reader = self.readers.find(pin)?;
        let mut levels = reader
            .line
            .watch()
            .map_err(|e| ControllerError::HardwareWatch {
                pin,
                reason: e.to_string(),
            })?;
        let events = self.events.clone();
        self.watchers.push(tokio::spawn(async move {
            while let Some(item) = levels.next().await {
                let event = match item {
                    Ok(level) => ControllerEvent::ReaderLevel { pin, level },
                    Err(e) => {
                        let _ = events
                            .send(ControllerEvent::Fatal(ControllerError::HardwareWatch {
                                pin,
                                reason: e.to_string(),
                            }))
                            .await;
                        return;
                    }
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            let _ = events
                .send(ControllerEvent::Fatal(ControllerError::HardwareWatch {
                    pin,
                    reason: "level stream ended".to_string(),
                }))
                .await;
        }));
        Ok(())
    }
}

impl Drop for ObservationEngine {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
    }
}

async fn sample(reader: &mut ReaderState) -> Result<bool, ControllerError> {
    let pin = reader.pin;
    reader
        .line
        .read()
        .await
        .map_err(|e| ControllerError::Hardware {
            pin,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwr_backend::DummyBackend;
    use pwr_core::PinRole;

    fn engine() -> (ObservationEngine, mpsc::Receiver<ControllerEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let mut engine = ObservationEngine::new("7", "Power_Read", tx);
        engine
            .register(&DummyBackend::new(), &PinConfig::new(PinRole::Reader, 2, 0, false))
            .unwrap();
        (engine, rx)
    }

    #[tokio::test]
    async fn test_init_reader_reports_boot_level_once() {
        let (mut engine, _rx) = engine();

        let event = engine.init_reader(PinId(2)).await.unwrap().unwrap();
        assert_eq!(
            event,
            ReaderEvent {
                id: PinId(2),
                status: false,
                service: "Power_Read".into(),
                node_id: "7".into(),
            }
        );
        assert_eq!(engine.last_published(PinId(2)), Some(false));
        assert!(engine.observe(PinId(2), false).is_none());
    }

    #[tokio::test]
    async fn test_observe_deduplicates() {
        let (mut engine, _rx) = engine();
        engine.init_reader(PinId(2)).await.unwrap();

        let samples = [true, true, true, false, false, true];
        let published: Vec<bool> = samples
            .iter()
            .filter_map(|&level| engine.observe(PinId(2), level))
            .map(|ev| ev.status)
            .collect();
        assert_eq!(published, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_unknown_reader() {
        let (mut engine, _rx) = engine();
        assert!(engine.observe(PinId(9), true).is_none());
        assert!(matches!(
            engine.init_reader(PinId(9)).await,
            Err(ControllerError::UnknownPin(PinId(9)))
        ));
        assert!(engine.watch(PinId(9)).is_err());
    }
}
