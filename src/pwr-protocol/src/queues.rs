// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Queue and service names shared with the home server.

/// Prefix of the per-node inbound command queue.
pub const DEFAULT_INBOUND_PREFIX: &str = "Power_Write";
/// Shared upstream queue every node publishes to.
pub const DEFAULT_OUTBOUND_QUEUE: &str = "Server";
/// Service tag carried by reader state events.
pub const DEFAULT_READER_SERVICE: &str = "Power_Read";

/// Name of the inbound queue dedicated to `node_id`, e.g. `Power_Write:7`.
pub fn inbound_queue_name(prefix: &str, node_id: &str) -> String {
    format!("{}:{}", prefix, node_id)
}
