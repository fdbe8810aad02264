// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Controller lifecycle and restart supervision.
//!
//! A lifecycle fetches the node configuration, opens hardware, store and
//! broker, boots the controller and runs it. On a fatal error everything is
//! dropped and a fresh lifecycle starts after the restart delay. The
//! supervisor only returns on shutdown.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, warn};

use pwr_backend::{GpioAccess, RegistrationContext};
use pwr_core::policies::{ExponentialBackoff, FixedDelay, RetryPolicy};
use pwr_core::{ControllerError, GpioBackend};
use pwr_protocol::queues::inbound_queue_name;

use crate::amqp::AmqpSession;
use crate::boot::{self, BootPlan, ControllerSettings};
use crate::channel::{forward_inbound, Outbound, QueueSession};
use crate::config::ServerConfig;
use crate::job_store::ScheduledJobStore;
use crate::node_api::NodeApiClient;

/// Everything a lifecycle needs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub node_id: String,
    pub server_url: String,
    pub request_timeout: Duration,
    pub amqp_uri: String,
    pub inbound_queue: String,
    pub outbound_queue: String,
    pub reader_service: String,
    pub store_path: PathBuf,
    pub backend: String,
    pub gpio: GpioAccess,
    pub fetch_policy: ExponentialBackoff,
    pub restart_delay: Duration,
}

impl NodeSettings {
    pub fn from_config(cfg: &ServerConfig) -> Self {
        let node_id = cfg.node.id.trim().to_string();
        Self {
            inbound_queue: inbound_queue_name(&cfg.queue.inbound_prefix, &node_id),
            outbound_queue: cfg.queue.outbound.clone(),
            reader_service: cfg.queue.reader_service.clone(),
            server_url: cfg.server.url.clone(),
            request_timeout: Duration::from_millis(cfg.server.request_timeout_ms),
            amqp_uri: cfg.queue.amqp_uri(),
            store_path: cfg.store.path.clone(),
            backend: cfg.backend_name(),
            gpio: GpioAccess {
                sysfs_root: cfg.gpio.sysfs_root.clone(),
                watch_interval: Duration::from_millis(cfg.gpio.watch_interval_ms),
            },
            fetch_policy: ExponentialBackoff::unbounded(
                Duration::from_millis(cfg.behavior.retry_base_delay_ms),
                Duration::from_millis(cfg.behavior.retry_max_delay_ms),
            ),
            restart_delay: Duration::from_millis(cfg.behavior.restart_delay_ms),
            node_id,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            node_id: self.node_id.clone(),
            command_service: self.inbound_queue.clone(),
            reader_service: self.reader_service.clone(),
        }
    }
}

/// One boot-and-run cycle. Returns `Ok` on shutdown.
pub async fn run_lifecycle(
    settings: &NodeSettings,
    registry: &RegistrationContext,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ControllerError> {
    let client = NodeApiClient::new(&settings.server_url, &settings.node_id, settings.request_timeout)?;
    let plan = boot::fetch_plan(&client, &settings.fetch_policy).await?;

    let backend = registry
        .build_backend(&settings.backend, &settings.gpio)
        .map_err(|e| ControllerError::Backend(e.to_string()))?;
    let jobs = ScheduledJobStore::open(&settings.store_path)?;

    let session = Arc::new(AmqpSession::connect(&settings.amqp_uri).await?);
    run_on_session(settings, &plan, backend.as_ref(), jobs, session, shutdown_rx).await
}

/// Boot and run the controller over an open broker session.
///
/// The session is closed on every exit path, including boot failures.
pub async fn run_on_session<S>(
    settings: &NodeSettings,
    plan: &BootPlan,
    backend: &dyn GpioBackend,
    jobs: ScheduledJobStore,
    session: Arc<S>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ControllerError>
where
    S: QueueSession + 'static,
{
    let result = serve(settings, plan, backend, jobs, session.clone(), shutdown_rx).await;
    session.close().await;
    result
}

async fn serve<S>(
    settings: &NodeSettings,
    plan: &BootPlan,
    backend: &dyn GpioBackend,
    jobs: ScheduledJobStore,
    session: Arc<S>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ControllerError>
where
    S: QueueSession + 'static,
{
    session.declare(&settings.inbound_queue).await?;
    session.declare(&settings.outbound_queue).await?;
    let outbound = Outbound::new(session.clone(), settings.outbound_queue.clone());

    let controller = boot::reconcile(
        &settings.controller_settings(),
        plan,
        backend,
        jobs,
        outbound,
    )
    .await?;

    let consumer_tag = format!("pwr-node-{}", settings.node_id);
    let deliveries = session.consume(&settings.inbound_queue, &consumer_tag).await?;
    let consumer = tokio::spawn(forward_inbound(deliveries, controller.sender()));

    let result = controller.run(shutdown_rx).await;
    consumer.abort();
    result
}

/// Run lifecycles until shutdown, rebooting after each failure.
pub async fn supervise<F, Fut>(
    policy: &FixedDelay,
    mut shutdown_rx: watch::Receiver<bool>,
    mut run_once: F,
) where
    F: FnMut(watch::Receiver<bool>) -> Fut,
    Fut: Future<Output = Result<(), ControllerError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let outcome = tokio::select! {
            result = run_once(shutdown_rx.clone()) => result,
            _ = wait_for_shutdown(shutdown_rx.clone()) => return,
        };
        let e = match outcome {
            Ok(()) => return,
            Err(e) => e,
        };
        let delay = policy.delay(attempt);
        if policy.should_retry(attempt, &e) {
            error!("Pin controller failed: {}; rebooting in {:?}", e, delay);
        } else {
            warn!("Pin controller stopped: {}; rebooting in {:?}", e, delay);
        }
        attempt = attempt.saturating_add(1);
        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = wait_for_shutdown(shutdown_rx.clone()) => return,
        }
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        info!("Rebooting pin controller (restart {})", attempt);
    }
}

pub async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    if *shutdown_rx.borrow() {
        return;
    }
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            break;
        }
    }
}
