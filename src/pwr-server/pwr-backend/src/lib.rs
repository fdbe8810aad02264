// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pwr_core::{DynResult, GpioBackend};

mod dummy;
#[cfg(feature = "sysfs")]
mod sysfs;

pub use dummy::DummyBackend;
#[cfg(feature = "sysfs")]
pub use sysfs::SysfsBackend;

/// Host details a backend needs to reach the GPIO lines.
#[derive(Debug, Clone)]
pub struct GpioAccess {
    /// Root of the sysfs GPIO class, normally `/sys/class/gpio`.
    pub sysfs_root: PathBuf,
    /// Sampling period for input watches.
    pub watch_interval: Duration,
}

impl Default for GpioAccess {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            watch_interval: Duration::from_millis(20),
        }
    }
}

pub type BackendFactory = fn(&GpioAccess) -> DynResult<Arc<dyn GpioBackend>>;

/// Context for registering and instantiating GPIO backends.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, BackendFactory>,
}

impl RegistrationContext {
    /// Create a new empty registration context.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory under a stable name (e.g. "sysfs").
    pub fn register_backend(&mut self, name: &str, factory: BackendFactory) {
        let key = normalize_name(name);
        self.factories.insert(key, factory);
    }

    /// Check whether a backend name is registered.
    pub fn is_backend_registered(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.factories.contains_key(&key)
    }

    /// List registered backend names.
    pub fn registered_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate the named backend.
    pub fn build_backend(&self, name: &str, access: &GpioAccess) -> DynResult<Arc<dyn GpioBackend>> {
        let key = normalize_name(name);
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| format!("Unknown GPIO backend: {}", name))?;
        factory(access)
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Backend name used when the node runs on real hardware.
pub const PRODUCTION_BACKEND: &str = "sysfs";
/// Backend name used everywhere else.
pub const SIMULATED_BACKEND: &str = "dummy";

/// Register all built-in backends enabled by features on a context.
pub fn register_builtin_backends_on(context: &mut RegistrationContext) {
    context.register_backend(SIMULATED_BACKEND, dummy_factory);
    #[cfg(feature = "sysfs")]
    context.register_backend(PRODUCTION_BACKEND, sysfs_factory);
}

fn dummy_factory(_access: &GpioAccess) -> DynResult<Arc<dyn GpioBackend>> {
    Ok(Arc::new(DummyBackend::new()))
}

#[cfg(feature = "sysfs")]
fn sysfs_factory(access: &GpioAccess) -> DynResult<Arc<dyn GpioBackend>> {
    Ok(Arc::new(SysfsBackend::new(
        access.sysfs_root.clone(),
        access.watch_interval,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_backends_registered() {
        let mut ctx = RegistrationContext::new();
        register_builtin_backends_on(&mut ctx);

        assert!(ctx.is_backend_registered("Dummy"));
        assert!(ctx.is_backend_registered("sys-fs"));
        assert_eq!(ctx.registered_backends(), vec!["dummy", "sysfs"]);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let ctx = RegistrationContext::new();
        let err = ctx
            .build_backend("gpiod", &GpioAccess::default())
            .err()
            .expect("unknown backend");
        assert!(err.to_string().contains("Unknown GPIO backend"));
    }

    #[test]
    fn test_build_dummy_backend() {
        let mut ctx = RegistrationContext::new();
        register_builtin_backends_on(&mut ctx);
        let backend = ctx
            .build_backend("dummy", &GpioAccess::default())
            .expect("dummy backend");
        assert_eq!(backend.name(), "dummy");
    }
}
