// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Writer pin actuation and delayed auto-revert.
//!
//! The engine owns the writer registry, the durable job store and the armed
//! revert timers. Timers never touch pin state: when one expires it sends a
//! [`RevertDue`] to the controller, which asks the engine for the revert
//! command and feeds it through the regular command path.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use pwr_core::clock::{deadline_after, now_epoch_millis};
use pwr_core::{ActuationMode, ControllerError, GpioBackend, PinConfig, PinId, PinModeId};
use pwr_protocol::CommandMessage;

use crate::controller::ControllerEvent;
use crate::job_store::{replay_delay, ScheduledJobStore};
use crate::registry::{PinRegistry, WriterState};

/// Time the inverse level is held in pulse mode.
pub const PULSE_WIDTH: Duration = Duration::from_millis(100);

/// Notification that a revert timer expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevertDue {
    pub pin: PinId,
    pub generation: u64,
}

/// Level a revert drives the pin to when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertTarget {
    /// Inverse of the pin's status at fire time.
    Flip,
    /// A fixed level. Jobs replayed at boot always switch the pin off.
    Level(bool),
}

struct ArmedRevert {
    generation: u64,
    template: CommandMessage,
    target: RevertTarget,
    task: JoinHandle<()>,
}

/// In-memory revert timers, at most one per pin.
///
/// Every arm gets a fresh generation; a firing whose generation is no longer
/// the armed one is stale and claims nothing.
pub struct RevertTimers {
    events: mpsc::Sender<ControllerEvent>,
    next_generation: u64,
    armed: HashMap<PinId, ArmedRevert>,
}

impl RevertTimers {
    pub fn new(events: mpsc::Sender<ControllerEvent>) -> Self {
        Self {
            events,
            next_generation: 0,
            armed: HashMap::new(),
        }
    }

    /// Arm a revert of `pin` after `delay`, replacing any armed one.
    /// `template` supplies the routing fields of the revert command.
    pub fn arm(
        &mut self,
        pin: PinId,
        delay: Duration,
        template: CommandMessage,
        target: RevertTarget,
    ) -> u64 {
        self.cancel(pin);
        self.next_generation += 1;
        let generation = self.next_generation;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = events
                .send(ControllerEvent::RevertDue(RevertDue { pin, generation }))
                .await;
        });
        self.armed.insert(
            pin,
            ArmedRevert {
                generation,
                template,
                target,
                task,
            },
        );
        generation
    }

    /// Returns false when nothing was armed for `pin`.
    pub fn cancel(&mut self, pin: PinId) -> bool {
        match self.armed.remove(&pin) {
            Some(armed) => {
                armed.task.abort();
                true
            }
            None => false,
        }
    }

    /// Take the template and target of a live timer. Stale firings yield
    /// `None`.
    pub fn claim(&mut self, due: RevertDue) -> Option<(CommandMessage, RevertTarget)> {
        match self.armed.get(&due.pin) {
            Some(armed) if armed.generation == due.generation => self
                .armed
                .remove(&due.pin)
                .map(|armed| (armed.template, armed.target)),
            _ => None,
        }
    }

    pub fn armed_pins(&self) -> Vec<PinId> {
        let mut pins: Vec<PinId> = self.armed.keys().copied().collect();
        pins.sort();
        pins
    }
}

impl Drop for RevertTimers {
    fn drop(&mut self) {
        for armed in self.armed.values() {
            armed.task.abort();
        }
    }
}

/// Routing fields stamped on reverts replayed at boot.
#[derive(Debug, Clone)]
pub struct ReplayTemplate {
    pub service: String,
    pub node_id: String,
}

pub struct ActuationEngine {
    writers: PinRegistry<WriterState>,
    jobs: ScheduledJobStore,
    timers: RevertTimers,
}

impl ActuationEngine {
    pub fn new(jobs: ScheduledJobStore, events: mpsc::Sender<ControllerEvent>) -> Self {
        Self {
            writers: PinRegistry::new(),
            jobs,
            timers: RevertTimers::new(events),
        }
    }

    pub fn register(
        &mut self,
        backend: &dyn GpioBackend,
        config: &PinConfig,
    ) -> Result<(), ControllerError> {
        let writer = self.writers.register(backend, config)?;
        info!(
            "Writer pin {} registered (mode {}, initial {})",
            writer.pin, writer.mode_id.0, writer.current_status
        );
        Ok(())
    }

    pub fn writers(&self) -> &PinRegistry<WriterState> {
        &self.writers
    }

    pub fn status(&self, pin: PinId) -> Option<bool> {
        self.writers.get(pin).map(|w| w.current_status)
    }

    pub fn armed_reverts(&self) -> Vec<PinId> {
        self.timers.armed_pins()
    }

    /// Drive `pin` to `status` without any mode handling or scheduling.
    pub async fn write_direct(&mut self, pin: PinId, status: bool) -> Result<(), ControllerError> {
        let writer = self.writers.find(pin)?;
        write_line(writer, status).await?;
        writer.current_status = status;
        Ok(())
    }

    /// Handle a command addressed to a writer pin.
    ///
    /// Any armed revert of the pin is superseded. Without a new auto-revert
    /// the durable job is dropped too.
    pub async fn apply_command(&mut self, cmd: &CommandMessage) -> Result<(), ControllerError> {
        if !self.writers.contains(cmd.id) {
            return Err(ControllerError::UnknownPin(cmd.id));
        }
        if self.timers.cancel(cmd.id) {
            debug!("Pending revert of pin {} superseded", cmd.id);
        }
        if cmd.auto_revert().is_none() && self.jobs.remove(cmd.id)? {
            debug!("Scheduled job of pin {} dropped", cmd.id);
        }
        self.actuate(cmd).await
    }

    /// Drive the pin per its mode and arm an auto-revert when requested.
    pub async fn actuate(&mut self, cmd: &CommandMessage) -> Result<(), ControllerError> {
        let writer = self.writers.find(cmd.id)?;
        drive(writer, cmd.status, cmd.pin_mode_id).await?;

        if let Some(delay) = cmd.auto_revert() {
            let fire_at = deadline_after(now_epoch_millis(), delay);
            self.jobs.put(cmd.id, fire_at)?;
            self.timers
                .arm(cmd.id, delay, cmd.clone(), RevertTarget::Flip);
            info!("Pin {} reverts in {} ms", cmd.id, delay.as_millis());
        }
        Ok(())
    }

    /// Re-arm reverts persisted by a previous run.
    ///
    /// A replayed job always switches the pin off. Each job is removed as
    /// soon as its timer is armed, so a restart inside the delay window does
    /// not replay it again. Returns the number of jobs replayed.
    pub fn replay_pending(&mut self, template: &ReplayTemplate) -> Result<usize, ControllerError> {
        let now = now_epoch_millis();
        let mut replayed = 0;
        for pin in self.writers.pins() {
            let Some(fire_at) = self.jobs.get(pin) else {
                continue;
            };
            let Some(writer) = self.writers.get(pin) else {
                continue;
            };
            let delay = replay_delay(fire_at, now);
            let mut revert = CommandMessage::new(pin, false, writer.mode_id);
            revert.service = template.service.clone();
            revert.node_id = template.node_id.clone();
            self.timers
                .arm(pin, delay, revert, RevertTarget::Level(false));
            self.jobs.remove(pin)?;
            info!("Replayed scheduled job of pin {} (fires in {} ms)", pin, delay.as_millis());
            replayed += 1;
        }
        for job in self.jobs.pending() {
            if !self.writers.contains(job.pin) {
                warn!("Scheduled job for unconfigured pin {} left in store", job.pin);
            }
        }
        Ok(replayed)
    }

    /// Build the revert for an expired timer.
    ///
    /// A flipping revert targets the inverse of the pin's status now, not the
    /// status at arm time. Stale firings return `None`.
    pub fn take_revert(&mut self, due: RevertDue) -> Result<Option<CommandMessage>, ControllerError> {
        let Some((template, target)) = self.timers.claim(due) else {
            return Ok(None);
        };
        let Some(writer) = self.writers.get(due.pin) else {
            return Err(ControllerError::UnknownPin(due.pin));
        };
        let status = match target {
            RevertTarget::Flip => !writer.current_status,
            RevertTarget::Level(level) => level,
        };
        self.jobs.remove(due.pin)?;
        Ok(Some(CommandMessage::revert_of(
            &template,
            status,
            now_epoch_millis(),
        )))
    }
}

async fn drive(writer: &mut WriterState, status: bool, mode: PinModeId) -> Result<(), ControllerError> {
    match mode.actuation() {
        ActuationMode::Pulse => {
            write_line(writer, !status).await?;
            time::sleep(PULSE_WIDTH).await;
            write_line(writer, status).await?;
        }
        ActuationMode::Hold => write_line(writer, status).await?,
    }
    writer.current_status = status;
    Ok(())
}

async fn write_line(writer: &mut WriterState, level: bool) -> Result<(), ControllerError> {
    let pin = writer.pin;
    writer
        .line
        .write(level)
        .await
        .map_err(|e| ControllerError::Hardware {
            pin,
            reason: e.to_string(),
        })
}
