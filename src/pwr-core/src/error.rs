// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

use crate::pin::{PinId, PinRole};

/// Failures of the pin controller lifecycle.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("node pin configuration fetch failed: {0}")]
    ConfigFetch(String),

    #[error("hardware watch on pin {pin} failed: {reason}")]
    HardwareWatch { pin: PinId, reason: String },

    #[error("cannot decode inbound command: {0}")]
    CommandDecode(String),

    #[error("command for pin {pin} failed: {reason}")]
    CommandHandling { pin: PinId, reason: String },

    #[error("publish to queue {queue} failed: {reason}")]
    Publish { queue: String, reason: String },

    #[error("pin {0} is not registered")]
    UnknownPin(PinId),

    #[error("pin {pin} is already registered as {role}")]
    DuplicatePin { pin: PinId, role: PinRole },

    #[error("hardware access on pin {pin} failed: {reason}")]
    Hardware { pin: PinId, reason: String },

    #[error("GPIO backend: {0}")]
    Backend(String),

    #[error("scheduled job store: {0}")]
    Store(String),

    #[error("queue transport: {0}")]
    Transport(String),
}

impl ControllerError {
    /// Transient errors are retried in place; they never reboot the controller.
    pub fn is_transient(&self) -> bool {
        matches!(self, ControllerError::ConfigFetch(_))
    }

    /// Fatal errors tear down the running controller and re-run boot.
    /// Publish failures are only reported.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ControllerError::ConfigFetch(_) | ControllerError::Publish { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let fetch = ControllerError::ConfigFetch("timeout".into());
        assert!(fetch.is_transient());
        assert!(!fetch.is_fatal());

        let publish = ControllerError::Publish {
            queue: "Server".into(),
            reason: "channel closed".into(),
        };
        assert!(!publish.is_transient());
        assert!(!publish.is_fatal());

        let watch = ControllerError::HardwareWatch {
            pin: PinId(5),
            reason: "EIO".into(),
        };
        assert!(watch.is_fatal());
        assert!(ControllerError::CommandDecode("bad json".into()).is_fatal());
        assert!(ControllerError::UnknownPin(PinId(9)).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = ControllerError::DuplicatePin {
            pin: PinId(3),
            role: PinRole::Reader,
        };
        assert_eq!(err.to_string(), "pin 3 is already registered as reader");
    }
}
