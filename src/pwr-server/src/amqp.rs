// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! AMQP transport for the node's command channel.
//!
//! Queues are declared non-durable and consumed without acknowledgement;
//! delivery guarantees are the broker's business.

use std::future::Future;
use std::pin::Pin;

use futures::StreamExt;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{info, warn};

use pwr_core::ControllerError;

use crate::channel::{DeliveryStream, PublishFuture, Publisher, QueueSession, SessionFuture};

fn transport(context: &str, e: lapin::Error) -> ControllerError {
    ControllerError::Transport(format!("{}: {}", context, e))
}

/// One broker connection with a single channel.
pub struct AmqpSession {
    connection: Connection,
    channel: Channel,
}

impl AmqpSession {
    pub async fn connect(uri: &str) -> Result<Self, ControllerError> {
        info!("Connecting to message broker at {}", uri);
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| transport("connect", e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| transport("create channel", e))?;
        Ok(Self {
            connection,
            channel,
        })
    }
}

impl Publisher for AmqpSession {
    fn publish<'a>(&'a self, queue: &'a str, payload: Vec<u8>) -> PublishFuture<'a> {
        Box::pin(async move {
            let publish_err = |e: lapin::Error| ControllerError::Publish {
                queue: queue.to_string(),
                reason: e.to_string(),
            };
            self.channel
                .basic_publish(
                    "",
                    queue,
                    BasicPublishOptions::default(),
                    &payload,
                    BasicProperties::default(),
                )
                .await
                .map_err(publish_err)?
                .await
                .map_err(publish_err)?;
            Ok(())
        })
    }
}

impl QueueSession for AmqpSession {
    fn declare<'a>(&'a self, queue: &'a str) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            self.channel
                .queue_declare(
                    queue,
                    QueueDeclareOptions {
                        durable: false,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| transport(queue, e))?;
            info!("Queue {} declared", queue);
            Ok(())
        })
    }

    /// Start consuming `queue`; deliveries are raw payloads.
    fn consume<'a>(&'a self, queue: &'a str, tag: &'a str) -> SessionFuture<'a, DeliveryStream> {
        Box::pin(async move {
            let consumer = self
                .channel
                .basic_consume(
                    queue,
                    tag,
                    BasicConsumeOptions {
                        no_ack: true,
                        ..BasicConsumeOptions::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| transport(queue, e))?;
            info!("Consuming commands from {}", queue);
            let deliveries: DeliveryStream = Box::pin(consumer.map(|delivery| {
                delivery
                    .map(|delivery| delivery.data)
                    .map_err(|e| e.to_string())
            }));
            Ok(deliveries)
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Err(e) = self.channel.close(200, "controller stopped").await {
                warn!("Closing AMQP channel: {}", e);
            }
            if let Err(e) = self.connection.close(200, "controller stopped").await {
                warn!("Closing AMQP connection: {}", e);
            }
        })
    }
}
