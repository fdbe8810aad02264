// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Node-resident controller bridging GPIO pins to the home server's queues.

pub mod actuation;
pub mod amqp;
pub mod boot;
pub mod channel;
pub mod config;
pub mod controller;
pub mod job_store;
pub mod lifecycle;
pub mod node_api;
pub mod observation;
pub mod registry;

pub use actuation::{ActuationEngine, RevertDue, RevertTarget, PULSE_WIDTH};
pub use boot::{BootPlan, ControllerSettings};
pub use channel::{MemoryPublisher, Outbound, Publisher, QueueSession};
pub use config::ServerConfig;
pub use controller::{Controller, ControllerEvent};
pub use job_store::{ScheduledJob, ScheduledJobStore};
