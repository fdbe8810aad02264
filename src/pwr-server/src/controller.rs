// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Single-worker pin controller.
//!
//! One task owns both engines and handles every event in arrival order:
//! inbound commands, reader level changes, expired revert timers and fatal
//! reports from helper tasks. Helper tasks only ever send events.

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use pwr_core::{ControllerError, PinId};
use pwr_protocol::{CommandMessage, StateEvent};

use crate::actuation::{ActuationEngine, RevertDue};
use crate::channel::Outbound;
use crate::observation::ObservationEngine;

/// Depth of the controller event queue.
pub const EVENT_QUEUE_DEPTH: usize = 64;

#[derive(Debug)]
pub enum ControllerEvent {
    /// Decoded command from the node's inbound queue.
    Command(CommandMessage),
    /// Hardware level reported by a reader watch.
    ReaderLevel { pin: PinId, level: bool },
    /// A revert timer expired.
    RevertDue(RevertDue),
    /// A helper task failed; the controller must stop.
    Fatal(ControllerError),
}

pub struct Controller {
    node_id: String,
    actuation: ActuationEngine,
    observation: ObservationEngine,
    outbound: Outbound,
    events_tx: mpsc::Sender<ControllerEvent>,
    events_rx: mpsc::Receiver<ControllerEvent>,
}

impl Controller {
    pub fn new(
        node_id: impl Into<String>,
        actuation: ActuationEngine,
        observation: ObservationEngine,
        outbound: Outbound,
        events_tx: mpsc::Sender<ControllerEvent>,
        events_rx: mpsc::Receiver<ControllerEvent>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            actuation,
            observation,
            outbound,
            events_tx,
            events_rx,
        }
    }

    /// Handle for feeding events into this controller.
    pub fn sender(&self) -> mpsc::Sender<ControllerEvent> {
        self.events_tx.clone()
    }

    pub fn writer_status(&self, pin: PinId) -> Option<bool> {
        self.actuation.status(pin)
    }

    pub fn reader_status(&self, pin: PinId) -> Option<bool> {
        self.observation.last_published(pin)
    }

    pub fn armed_reverts(&self) -> Vec<PinId> {
        self.actuation.armed_reverts()
    }

    /// Process events until shutdown is signalled or a fatal error occurs.
    ///
    /// Dropping the controller releases every pin line and armed timer.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), ControllerError> {
        info!(
            "Pin controller for node {} running ({} writers, {} readers)",
            self.node_id,
            self.actuation.writers().len(),
            self.observation.readers().len()
        );
        loop {
            if *shutdown_rx.borrow() {
                info!("Pin controller shutting down");
                return Ok(());
            }
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        info!("Shutdown channel closed, stopping pin controller");
                        return Ok(());
                    }
                }
                event = self.events_rx.recv() => {
                    let Some(event) = event else {
                        return Ok(());
                    };
                    if let Err(e) = self.handle_event(event).await {
                        error!("Pin controller failed: {}", e);
                        return Err(e);
                    }
                }
            }
        }
    }

    pub async fn handle_event(&mut self, event: ControllerEvent) -> Result<(), ControllerError> {
        match event {
            ControllerEvent::Command(cmd) => self.handle_command(cmd).await,
            ControllerEvent::ReaderLevel { pin, level } => {
                if let Some(ev) = self.observation.observe(pin, level) {
                    info!("Reader pin {} changed to {}", pin, level);
                    self.outbound.publish(&StateEvent::Reader(ev)).await;
                }
                Ok(())
            }
            ControllerEvent::RevertDue(due) => match self.actuation.take_revert(due)? {
                Some(revert) => {
                    info!("Auto-reverting pin {} to {}", revert.id, revert.status);
                    self.handle_command(revert).await
                }
                None => {
                    debug!("Ignoring superseded revert of pin {}", due.pin);
                    Ok(())
                }
            },
            ControllerEvent::Fatal(e) => Err(e),
        }
    }

    /// Apply a command and acknowledge it upstream with this node's id.
    async fn handle_command(&mut self, cmd: CommandMessage) -> Result<(), ControllerError> {
        info!(
            "Command for pin {}: status {} (mode {}, revert {} ms)",
            cmd.id, cmd.status, cmd.pin_mode_id.0, cmd.closed_in_milliseconds
        );
        self.actuation
            .apply_command(&cmd)
            .await
            .map_err(|e| ControllerError::CommandHandling {
                pin: cmd.id,
                reason: e.to_string(),
            })?;
        let ack = cmd.acknowledged_by(&self.node_id);
        self.outbound.publish(&StateEvent::Command(ack)).await;
        Ok(())
    }
}
