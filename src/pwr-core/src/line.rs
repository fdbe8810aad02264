// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Narrow hardware capability used by the engines.
//!
//! A backend hands out one [`PinLine`] per configured pin. Whether the line
//! drives a real GPIO or only logs is decided once, when the backend is
//! built; nothing downstream can tell the difference.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;

use crate::pin::PinId;
use crate::DynResult;

/// Alias to reduce type complexity in PinLine.
pub type LineFuture<'a, T> = Pin<Box<dyn Future<Output = DynResult<T>> + Send + 'a>>;

/// Level changes reported by a watched input. The stream is infinite while
/// the hardware is healthy and cannot be restarted once it ends.
pub type LevelStream = Pin<Box<dyn Stream<Item = DynResult<bool>> + Send>>;

/// A single digital line. `true` is logic high.
pub trait PinLine: Send + Sync {
    fn pin(&self) -> PinId;

    fn write<'a>(&'a mut self, high: bool) -> LineFuture<'a, ()>;

    fn read<'a>(&'a mut self) -> LineFuture<'a, bool>;

    /// Subscribe to level changes of an input line.
    fn watch(&mut self) -> DynResult<LevelStream>;
}

/// Source of pin lines for one lifecycle of the controller.
pub trait GpioBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire `pin` as an output, driving `initial` as soon as possible.
    fn open_output(&self, pin: PinId, initial: bool) -> DynResult<Box<dyn PinLine>>;

    /// Acquire `pin` as an input with edge notifications.
    fn open_input(&self, pin: PinId) -> DynResult<Box<dyn PinLine>>;
}
