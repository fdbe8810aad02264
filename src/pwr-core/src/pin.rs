// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pin mode id the control plane uses for latching relays that need an
/// opposite pulse before settling.
pub const PULSE_RELAY_MODE_ID: i32 = 4;

/// Controller-specific identifier of a digital I/O line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinId(pub u32);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PinId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PinId)
    }
}

impl From<u32> for PinId {
    fn from(value: u32) -> Self {
        PinId(value)
    }
}

/// Raw pin mode id as assigned by the home server.
///
/// Only the pulse-relay id changes actuation; every other id holds a level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinModeId(pub i32);

impl PinModeId {
    pub const PULSE_RELAY: PinModeId = PinModeId(PULSE_RELAY_MODE_ID);

    pub fn actuation(self) -> ActuationMode {
        if self == Self::PULSE_RELAY {
            ActuationMode::Pulse
        } else {
            ActuationMode::Hold
        }
    }
}

/// How a writer pin is driven to a requested status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationMode {
    /// Write the requested level and keep it.
    Hold,
    /// Write the inverse level, wait, then write the requested level.
    Pulse,
}

/// Direction of a configured pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PinRole {
    #[default]
    Writer,
    Reader,
}

impl PinRole {
    /// Path segment used by the node pin API.
    pub fn path_segment(self) -> &'static str {
        match self {
            PinRole::Writer => "write",
            PinRole::Reader => "read",
        }
    }
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinRole::Writer => f.write_str("writer"),
            PinRole::Reader => f.write_str("reader"),
        }
    }
}

/// One pin entry served by the node pin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinConfig {
    #[serde(rename = "controllerPin")]
    pub controller_pin: PinId,
    #[serde(rename = "pinModeId", default)]
    pub pin_mode_id: PinModeId,
    #[serde(rename = "status", default)]
    pub initial_status: bool,
    /// Not part of the API payload; set by whoever fetched the entry.
    #[serde(skip)]
    pub role: PinRole,
}

impl PinConfig {
    pub fn new(role: PinRole, pin: u32, pin_mode_id: i32, initial_status: bool) -> Self {
        Self {
            controller_pin: PinId(pin),
            pin_mode_id: PinModeId(pin_mode_id),
            initial_status,
            role,
        }
    }
}
