// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Runtime state of the configured pins.
//!
//! One registry per role. Slots live in a vector in configuration order and
//! are looked up through a pin index; there are no globals.

use std::collections::HashMap;

use pwr_core::{ControllerError, GpioBackend, PinConfig, PinId, PinLine, PinModeId, PinRole};

/// Output pin driven by the actuation engine.
pub struct WriterState {
    pub pin: PinId,
    pub current_status: bool,
    pub mode_id: PinModeId,
    pub line: Box<dyn PinLine>,
}

/// Input pin sampled by the observation engine.
pub struct ReaderState {
    pub pin: PinId,
    pub last_published_status: bool,
    pub line: Box<dyn PinLine>,
}

pub trait PinSlot {
    const ROLE: PinRole;

    fn pin(&self) -> PinId;
}

impl PinSlot for WriterState {
    const ROLE: PinRole = PinRole::Writer;

    fn pin(&self) -> PinId {
        self.pin
    }
}

impl PinSlot for ReaderState {
    const ROLE: PinRole = PinRole::Reader;

    fn pin(&self) -> PinId {
        self.pin
    }
}

pub struct PinRegistry<S> {
    slots: Vec<S>,
    index: HashMap<PinId, usize>,
}

impl<S: PinSlot> PinRegistry<S> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a slot. A second slot for the same pin is rejected.
    pub fn insert(&mut self, state: S) -> Result<&mut S, ControllerError> {
        let pin = state.pin();
        if self.index.contains_key(&pin) {
            return Err(ControllerError::DuplicatePin { pin, role: S::ROLE });
        }
        let idx = self.slots.len();
        self.slots.push(state);
        self.index.insert(pin, idx);
        Ok(&mut self.slots[idx])
    }

    pub fn contains(&self, pin: PinId) -> bool {
        self.index.contains_key(&pin)
    }

    pub fn get(&self, pin: PinId) -> Option<&S> {
        self.index.get(&pin).map(|&idx| &self.slots[idx])
    }

    pub fn get_mut(&mut self, pin: PinId) -> Option<&mut S> {
        match self.index.get(&pin) {
            Some(&idx) => self.slots.get_mut(idx),
            None => None,
        }
    }

    /// Like [`get_mut`](Self::get_mut) but unknown pins are an error.
    pub fn find(&mut self, pin: PinId) -> Result<&mut S, ControllerError> {
        self.get_mut(pin).ok_or(ControllerError::UnknownPin(pin))
    }

    /// Registered pins in registration order.
    pub fn pins(&self) -> Vec<PinId> {
        self.slots.iter().map(PinSlot::pin).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<S: PinSlot> Default for PinRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl PinRegistry<WriterState> {
    /// Acquire the output line for `config` and add it.
    pub fn register(
        &mut self,
        backend: &dyn GpioBackend,
        config: &PinConfig,
    ) -> Result<&mut WriterState, ControllerError> {
        let pin = config.controller_pin;
        if self.contains(pin) {
            return Err(ControllerError::DuplicatePin {
                pin,
                role: PinRole::Writer,
            });
        }
        let line = backend
            .open_output(pin, config.initial_status)
            .map_err(|e| ControllerError::Hardware {
                pin,
                reason: e.to_string(),
            })?;
        self.insert(WriterState {
            pin,
            current_status: config.initial_status,
            mode_id: config.pin_mode_id,
            line,
        })
    }
}

impl PinRegistry<ReaderState> {
    /// Acquire the input line for `config` and add it. The published status
    /// is only meaningful after the observation engine seeded it.
    pub fn register(
        &mut self,
        backend: &dyn GpioBackend,
        config: &PinConfig,
    ) -> Result<&mut ReaderState, ControllerError> {
        let pin = config.controller_pin;
        if self.contains(pin) {
            return Err(ControllerError::DuplicatePin {
                pin,
                role: PinRole::Reader,
            });
        }
        let line = backend
            .open_input(pin)
            .map_err(|e| ControllerError::Hardware {
                pin,
                reason: e.to_string(),
            })?;
        self.insert(ReaderState {
            pin,
            last_published_status: config.initial_status,
            line,
        })
    }
}
