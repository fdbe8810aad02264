// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Dummy GPIO backend for development off the target board.
//!
//! Lines hold their level in memory and log every intended actuation.
//! Inputs read low and never report a change.

use futures::stream;
use tracing::info;

use pwr_core::{DynResult, GpioBackend, LevelStream, LineFuture, PinId, PinLine};

pub struct DummyBackend;

impl DummyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioBackend for DummyBackend {
    fn name(&self) -> &str {
        "dummy"
    }

    fn open_output(&self, pin: PinId, initial: bool) -> DynResult<Box<dyn PinLine>> {
        info!("Virtual pin {} opened as output", pin);
        Ok(Box::new(DummyLine {
            pin,
            level: initial,
        }))
    }

    fn open_input(&self, pin: PinId) -> DynResult<Box<dyn PinLine>> {
        info!("Virtual pin {} opened as input", pin);
        Ok(Box::new(DummyLine { pin, level: false }))
    }
}

struct DummyLine {
    pin: PinId,
    level: bool,
}

impl PinLine for DummyLine {
    fn pin(&self) -> PinId {
        self.pin
    }

    fn write<'a>(&'a mut self, high: bool) -> LineFuture<'a, ()> {
        self.level = high;
        info!("Virtual pin {} is now {}", self.pin, u8::from(high));
        Box::pin(async { Ok(()) })
    }

    fn read<'a>(&'a mut self) -> LineFuture<'a, bool> {
        let level = self.level;
        Box::pin(async move { Ok(level) })
    }

    fn watch(&mut self) -> DynResult<LevelStream> {
        info!("Virtual pin {} watch installed (never fires)", self.pin);
        Ok(Box::pin(stream::pending()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_output_remembers_last_write() {
        let backend = DummyBackend::new();
        let mut line = backend.open_output(PinId(4), true).expect("open");
        assert!(line.read().await.expect("read"));
        line.write(false).await.expect("write");
        assert!(!line.read().await.expect("read"));
    }

    #[tokio::test]
    async fn test_input_reads_low_and_watch_is_silent() {
        use futures::StreamExt;

        let backend = DummyBackend::new();
        let mut line = backend.open_input(PinId(9)).expect("open");
        assert_eq!(line.pin(), PinId(9));
        assert!(!line.read().await.expect("read"));

        let mut watch = line.watch().expect("watch");
        assert!(watch.next().now_or_never().is_none());
    }
}
