// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod clock;
pub mod error;
pub mod line;
pub mod pin;
pub mod policies;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use error::ControllerError;
pub use line::{GpioBackend, LevelStream, LineFuture, PinLine};
pub use pin::{ActuationMode, PinConfig, PinId, PinModeId, PinRole};
