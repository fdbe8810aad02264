// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Boot sequence of the pin controller.
//!
//! Order matters: writers are registered and driven to their configured
//! levels, persisted reverts are replayed, then readers are seeded and
//! watched. The inbound queue is opened by the caller once this returns.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time;
use tracing::{info, warn};

use pwr_core::policies::RetryPolicy;
use pwr_core::{ControllerError, GpioBackend, PinConfig, PinRole};
use pwr_protocol::StateEvent;

use crate::actuation::{ActuationEngine, ReplayTemplate};
use crate::channel::Outbound;
use crate::controller::{Controller, EVENT_QUEUE_DEPTH};
use crate::job_store::ScheduledJobStore;
use crate::node_api::PinSource;
use crate::observation::ObservationEngine;

/// Pins this node is configured with, in server order.
#[derive(Debug, Clone, Default)]
pub struct BootPlan {
    pub writers: Vec<PinConfig>,
    pub readers: Vec<PinConfig>,
}

/// Identity and routing used while booting.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub node_id: String,
    /// Service tag of commands this node consumes, stamped on replayed reverts.
    pub command_service: String,
    /// Service tag of reader events.
    pub reader_service: String,
}

/// Run `op` until it succeeds or `policy` gives up.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &dyn RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ControllerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ControllerError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.should_retry(attempt, &e) => {
                let delay = policy.delay(attempt);
                warn!(
                    "{} failed (attempt {}): {}; retrying in {:?}",
                    what,
                    attempt + 1,
                    e,
                    delay
                );
                time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetch writer and reader pins, retrying per `policy`.
pub async fn fetch_plan(
    source: &dyn PinSource,
    policy: &dyn RetryPolicy,
) -> Result<BootPlan, ControllerError> {
    let writers = retry_with_policy(policy, "Writer pin fetch", || {
        source.fetch_pins(PinRole::Writer)
    })
    .await?;
    let readers = retry_with_policy(policy, "Reader pin fetch", || {
        source.fetch_pins(PinRole::Reader)
    })
    .await?;
    info!(
        "Node configuration: {} writer pins, {} reader pins",
        writers.len(),
        readers.len()
    );
    Ok(BootPlan { writers, readers })
}

/// Build a controller with every pin in its boot-time state.
pub async fn reconcile(
    settings: &ControllerSettings,
    plan: &BootPlan,
    backend: &dyn GpioBackend,
    jobs: ScheduledJobStore,
    outbound: Outbound,
) -> Result<Controller, ControllerError> {
    info!("Reconciling pins on {} backend", backend.name());
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

    let mut actuation = ActuationEngine::new(jobs, events_tx.clone());
    for config in &plan.writers {
        actuation.register(backend, config)?;
    }
    for config in &plan.writers {
        actuation
            .write_direct(config.controller_pin, config.initial_status)
            .await?;
    }
    let replayed = actuation.replay_pending(&ReplayTemplate {
        service: settings.command_service.clone(),
        node_id: settings.node_id.clone(),
    })?;
    if replayed > 0 {
        info!("Replayed {} scheduled jobs", replayed);
    }

    let mut observation = ObservationEngine::new(
        settings.node_id.clone(),
        settings.reader_service.clone(),
        events_tx.clone(),
    );
    for config in &plan.readers {
        observation.register(backend, config)?;
        if let Some(event) = observation.init_reader(config.controller_pin).await? {
            outbound.publish(&StateEvent::Reader(event)).await;
        }
        observation.watch(config.controller_pin)?;
    }

    Ok(Controller::new(
        settings.node_id.clone(),
        actuation,
        observation,
        outbound,
        events_tx,
        events_rx,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use pwr_core::policies::ExponentialBackoff;
    use pwr_core::PinId;

    use crate::node_api::PinsFuture;

    struct FlakySource {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl PinSource for FlakySource {
        fn fetch_pins<'a>(&'a self, role: PinRole) -> PinsFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.failures_left.load(Ordering::SeqCst) > 0 {
                    self.failures_left.fetch_sub(1, Ordering::SeqCst);
                    return Err(ControllerError::ConfigFetch("connection refused".into()));
                }
                Ok(match role {
                    PinRole::Writer => vec![PinConfig::new(role, 17, 1, false)],
                    PinRole::Reader => vec![PinConfig::new(role, 2, 0, false)],
                })
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_plan_retries_until_success() {
        let source = FlakySource {
            failures_left: AtomicU32::new(12),
            calls: AtomicU32::new(0),
        };
        let policy = ExponentialBackoff::unbounded(Duration::from_millis(10), Duration::from_secs(1));

        let plan = fetch_plan(&source, &policy).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 14);
        assert_eq!(plan.writers[0].controller_pin, PinId(17));
        assert_eq!(plan.readers[0].role, PinRole::Reader);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_non_transient_error() {
        let policy = ExponentialBackoff::unbounded(Duration::from_millis(10), Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_policy(&policy, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ControllerError::Store("read-only filesystem".into())) }
        })
        .await;
        assert!(matches!(result, Err(ControllerError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
