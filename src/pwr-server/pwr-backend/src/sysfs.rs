// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Linux sysfs GPIO backend (`/sys/class/gpio`).
//!
//! Lines are exported on open and unexported on drop. Input watches poll the
//! `value` attribute and yield only level changes; edge interrupts are left
//! unconfigured.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream;
use tracing::warn;

use pwr_core::{DynResult, GpioBackend, LevelStream, LineFuture, PinId, PinLine};

pub struct SysfsBackend {
    root: PathBuf,
    watch_interval: Duration,
}

impl SysfsBackend {
    pub fn new(root: PathBuf, watch_interval: Duration) -> DynResult<Self> {
        if !root.is_dir() {
            return Err(format!("GPIO sysfs root {} not found", root.display()).into());
        }
        if watch_interval.is_zero() {
            return Err("GPIO watch interval must be > 0".into());
        }
        Ok(Self {
            root,
            watch_interval,
        })
    }

    fn export(&self, pin: PinId) -> DynResult<PathBuf> {
        let dir = self.root.join(format!("gpio{}", pin));
        if !dir.exists() {
            std::fs::write(self.root.join("export"), pin.to_string())
                .map_err(|e| format!("export of gpio{} failed: {}", pin, e))?;
        }
        Ok(dir)
    }

    fn line(&self, pin: PinId, dir: PathBuf) -> SysfsLine {
        SysfsLine {
            pin,
            value_path: dir.join("value"),
            unexport_path: self.root.join("unexport"),
            watch_interval: self.watch_interval,
        }
    }
}

impl GpioBackend for SysfsBackend {
    fn name(&self) -> &str {
        "sysfs"
    }

    fn open_output(&self, pin: PinId, initial: bool) -> DynResult<Box<dyn PinLine>> {
        let dir = self.export(pin)?;
        // "high"/"low" set direction and level in one step, without a glitch.
        let direction = if initial { "high" } else { "low" };
        std::fs::write(dir.join("direction"), direction)
            .map_err(|e| format!("gpio{} direction: {}", pin, e))?;
        Ok(Box::new(self.line(pin, dir)))
    }

    fn open_input(&self, pin: PinId) -> DynResult<Box<dyn PinLine>> {
        let dir = self.export(pin)?;
        std::fs::write(dir.join("direction"), "in")
            .map_err(|e| format!("gpio{} direction: {}", pin, e))?;
        Ok(Box::new(self.line(pin, dir)))
    }
}

struct SysfsLine {
    pin: PinId,
    value_path: PathBuf,
    unexport_path: PathBuf,
    watch_interval: Duration,
}

fn parse_level(raw: &str) -> DynResult<bool> {
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(format!("unexpected GPIO value '{}'", other).into()),
    }
}

async fn read_level(path: &Path) -> DynResult<bool> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_level(&raw)
}

impl PinLine for SysfsLine {
    fn pin(&self) -> PinId {
        self.pin
    }

    fn write<'a>(&'a mut self, high: bool) -> LineFuture<'a, ()> {
        Box::pin(async move {
            tokio::fs::write(&self.value_path, if high { "1" } else { "0" }).await?;
            Ok(())
        })
    }

    fn read<'a>(&'a mut self) -> LineFuture<'a, bool> {
        Box::pin(async move { read_level(&self.value_path).await })
    }

    fn watch(&mut self) -> DynResult<LevelStream> {
        let path = self.value_path.clone();
        let period = self.watch_interval;
        let initial = parse_level(&std::fs::read_to_string(&path)?)?;

        let changes = stream::unfold(
            (path, initial, None::<tokio::time::Interval>),
            move |(path, mut last, ticker)| async move {
                let mut ticker = ticker.unwrap_or_else(|| tokio::time::interval(period));
                loop {
                    ticker.tick().await;
                    match read_level(&path).await {
                        Ok(level) if level == last => continue,
                        Ok(level) => {
                            last = level;
                            return Some((Ok(level), (path, last, Some(ticker))));
                        }
                        Err(e) => return Some((Err(e), (path, last, Some(ticker)))),
                    }
                }
            },
        );
        Ok(Box::pin(changes))
    }
}

impl Drop for SysfsLine {
    fn drop(&mut self) {
        if let Err(e) = std::fs::write(&self.unexport_path, self.pin.to_string()) {
            warn!("unexport of gpio{} failed: {}", self.pin, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn fake_sysfs(pins: &[u32]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for pin in pins {
            let gpio = dir.path().join(format!("gpio{}", pin));
            std::fs::create_dir_all(&gpio).expect("gpio dir");
            std::fs::write(gpio.join("value"), "0\n").expect("value");
        }
        dir
    }

    #[test]
    fn test_parse_level() {
        assert!(parse_level("1\n").expect("high"));
        assert!(!parse_level("0").expect("low"));
        assert!(parse_level("2").is_err());
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let err = SysfsBackend::new(PathBuf::from("/nonexistent/gpio"), Duration::from_millis(5))
            .err()
            .expect("missing root");
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_output_sets_direction_and_writes_value() {
        let root = fake_sysfs(&[17]);
        let backend = SysfsBackend::new(root.path().to_path_buf(), Duration::from_millis(5))
            .expect("backend");

        let mut line = backend.open_output(PinId(17), true).expect("open");
        let direction = std::fs::read_to_string(root.path().join("gpio17/direction"))
            .expect("direction");
        assert_eq!(direction, "high");

        line.write(true).await.expect("write");
        assert!(line.read().await.expect("read"));
        line.write(false).await.expect("write");
        assert_eq!(
            std::fs::read_to_string(root.path().join("gpio17/value")).expect("value"),
            "0"
        );

        drop(line);
        assert_eq!(
            std::fs::read_to_string(root.path().join("unexport")).expect("unexport"),
            "17"
        );
    }

    #[tokio::test]
    async fn test_export_is_requested_for_unexported_pins() {
        let root = fake_sysfs(&[]);
        let backend = SysfsBackend::new(root.path().to_path_buf(), Duration::from_millis(5))
            .expect("backend");

        // The fake tree never materialises gpio5, so configuring it fails after export.
        assert!(backend.open_input(PinId(5)).is_err());
        assert_eq!(
            std::fs::read_to_string(root.path().join("export")).expect("export"),
            "5"
        );
    }

    #[tokio::test]
    async fn test_watch_yields_only_changes() {
        let root = fake_sysfs(&[22]);
        let backend = SysfsBackend::new(root.path().to_path_buf(), Duration::from_millis(5))
            .expect("backend");
        let mut line = backend.open_input(PinId(22)).expect("open");
        let mut changes = line.watch().expect("watch");
        assert!(!root.path().join("gpio22/edge").exists());

        let value = root.path().join("gpio22/value");
        std::fs::write(&value, "1\n").expect("raise");
        let first = tokio::time::timeout(Duration::from_secs(2), changes.next())
            .await
            .expect("change timeout")
            .expect("stream item")
            .expect("level");
        assert!(first);

        std::fs::write(&value, "0\n").expect("lower");
        let second = tokio::time::timeout(Duration::from_secs(2), changes.next())
            .await
            .expect("change timeout")
            .expect("stream item")
            .expect("level");
        assert!(!second);
    }
}
