// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use pwr_core::{PinId, PinModeId};

/// Lifetime, in milliseconds, granted to a synthesized revert command.
pub const REVERT_EXPIRY_MS: i64 = 15;

/// Job id carried by commands the node synthesizes itself.
pub const NIL_JOB_GUID: &str = "00000000-0000-0000-0000-000000000000";

/// Spelling of the auto-revert delay key on the wire.
///
/// Older server builds send `ClosedinMilliseconds`; acknowledgements answer
/// with whichever spelling the command arrived with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClosedKey {
    #[default]
    Current,
    Legacy,
}

/// Write command exchanged with the home server.
///
/// Field names follow the server's PascalCase contract. Fields this node does
/// not understand are kept in `extra` and echoed back untouched, and so is
/// `JobGuid`, which is opaque to the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireCommand", into = "WireCommand")]
pub struct CommandMessage {
    pub id: PinId,
    pub status: bool,
    pub closed_in_milliseconds: i64,
    pub closed_key: ClosedKey,
    pub service: String,
    pub pin_mode_id: PinModeId,
    pub expiring: i64,
    /// `None` when the field was absent; otherwise the value as received.
    pub job_guid: Option<Value>,
    pub node_id: String,
    pub extra: Map<String, Value>,
}

impl CommandMessage {
    pub fn new(id: PinId, status: bool, pin_mode_id: PinModeId) -> Self {
        Self {
            id,
            status,
            closed_in_milliseconds: 0,
            closed_key: ClosedKey::Current,
            service: String::new(),
            pin_mode_id,
            expiring: 0,
            job_guid: None,
            node_id: String::new(),
            extra: Map::new(),
        }
    }

    /// Requested auto-revert delay, if any.
    pub fn auto_revert(&self) -> Option<Duration> {
        u64::try_from(self.closed_in_milliseconds)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Job id as text, when the server sent a string.
    pub fn job_guid_str(&self) -> Option<&str> {
        self.job_guid.as_ref().and_then(Value::as_str)
    }

    /// Copy of this command stamped with the handling node's identity.
    pub fn acknowledged_by(&self, node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            ..self.clone()
        }
    }

    /// Command that reverts a pin to `status`, derived from `template`.
    ///
    /// The result never schedules another revert and carries the nil job id
    /// so the server can tell it apart from operator commands.
    pub fn revert_of(template: &CommandMessage, status: bool, now_ms: i64) -> Self {
        Self {
            status,
            closed_in_milliseconds: 0,
            closed_key: ClosedKey::Current,
            expiring: now_ms.saturating_add(REVERT_EXPIRY_MS),
            job_guid: Some(Value::String(NIL_JOB_GUID.to_string())),
            ..template.clone()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireCommand {
    #[serde(rename = "Id")]
    id: PinId,
    #[serde(rename = "Status")]
    status: bool,
    #[serde(
        rename = "ClosedInMilliseconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    closed_in_milliseconds: Option<i64>,
    #[serde(
        rename = "ClosedinMilliseconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    closed_in_milliseconds_legacy: Option<i64>,
    #[serde(rename = "Service", default)]
    service: String,
    #[serde(rename = "PinModeId", default)]
    pin_mode_id: PinModeId,
    #[serde(rename = "Expiring", default)]
    expiring: i64,
    #[serde(
        rename = "JobGuid",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    job_guid: Option<Value>,
    #[serde(rename = "NodeId", default, deserialize_with = "node_id_from_any")]
    node_id: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<WireCommand> for CommandMessage {
    fn from(wire: WireCommand) -> Self {
        let (closed_in_milliseconds, closed_key) =
            match (wire.closed_in_milliseconds, wire.closed_in_milliseconds_legacy) {
                (Some(ms), _) => (ms, ClosedKey::Current),
                (None, Some(ms)) => (ms, ClosedKey::Legacy),
                (None, None) => (0, ClosedKey::Current),
            };
        Self {
            id: wire.id,
            status: wire.status,
            closed_in_milliseconds,
            closed_key,
            service: wire.service,
            pin_mode_id: wire.pin_mode_id,
            expiring: wire.expiring,
            job_guid: wire.job_guid,
            node_id: wire.node_id,
            extra: wire.extra,
        }
    }
}

impl From<CommandMessage> for WireCommand {
    fn from(cmd: CommandMessage) -> Self {
        let (current, legacy) = match cmd.closed_key {
            ClosedKey::Current => (Some(cmd.closed_in_milliseconds), None),
            ClosedKey::Legacy => (None, Some(cmd.closed_in_milliseconds)),
        };
        Self {
            id: cmd.id,
            status: cmd.status,
            closed_in_milliseconds: current,
            closed_in_milliseconds_legacy: legacy,
            service: cmd.service,
            pin_mode_id: cmd.pin_mode_id,
            expiring: cmd.expiring,
            job_guid: cmd.job_guid,
            node_id: cmd.node_id,
            extra: cmd.extra,
        }
    }
}

/// Keeps an explicit `null` distinct from an absent field.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// The server has sent node ids both as JSON numbers and as strings.
fn node_id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!("invalid NodeId: {}", other))),
    }
}

/// State report for a reader pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderEvent {
    pub id: PinId,
    pub status: bool,
    pub service: String,
    pub node_id: String,
}

/// Anything published on the upstream queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateEvent {
    Reader(ReaderEvent),
    Command(CommandMessage),
}

impl StateEvent {
    pub fn pin(&self) -> PinId {
        match self {
            StateEvent::Reader(ev) => ev.id,
            StateEvent::Command(cmd) => cmd.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandMessage {
        serde_json::from_str(
            r#"{"Id":17,"Status":true,"ClosedInMilliseconds":5000,"Service":"Power_Write:7",
                "PinModeId":1,"Expiring":1700000000000,
                "JobGuid":"6f9619ff-8b86-d011-b42d-00c04fc964ff","NodeId":"7"}"#,
        )
        .expect("command")
    }

    #[test]
    fn test_auto_revert() {
        assert_eq!(sample().auto_revert(), Some(Duration::from_millis(5000)));

        let mut cmd = sample();
        cmd.closed_in_milliseconds = 0;
        assert_eq!(cmd.auto_revert(), None);
        cmd.closed_in_milliseconds = -20;
        assert_eq!(cmd.auto_revert(), None);
    }

    #[test]
    fn test_revert_of_keeps_routing_fields() {
        let template = sample();
        let revert = CommandMessage::revert_of(&template, false, 1_000);

        assert_eq!(revert.id, template.id);
        assert!(!revert.status);
        assert_eq!(revert.closed_in_milliseconds, 0);
        assert_eq!(revert.expiring, 1_015);
        assert_eq!(revert.job_guid_str(), Some(NIL_JOB_GUID));
        assert_eq!(revert.closed_key, ClosedKey::Current);
        assert_eq!(revert.service, "Power_Write:7");
        assert_eq!(revert.pin_mode_id, PinModeId(1));
    }

    #[test]
    fn test_acknowledged_by_only_sets_node() {
        let mut cmd = sample();
        cmd.node_id.clear();
        let ack = cmd.acknowledged_by("12");
        assert_eq!(ack.node_id, "12");
        assert_eq!(ack.id, cmd.id);
        assert_eq!(ack.status, cmd.status);
        assert_eq!(ack.job_guid, cmd.job_guid);
    }

    #[test]
    fn test_reader_event_json_shape() {
        let ev = StateEvent::Reader(ReaderEvent {
            id: PinId(2),
            status: true,
            service: "Power_Read".into(),
            node_id: "7".into(),
        });
        let json = serde_json::to_value(&ev).expect("json");
        assert_eq!(
            json,
            serde_json::json!({"id": 2, "status": true, "service": "Power_Read", "nodeId": "7"})
        );
    }
}
