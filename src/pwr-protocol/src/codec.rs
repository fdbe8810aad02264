// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Byte-level codec for queue payloads (UTF-8 JSON).

use thiserror::Error;

use crate::types::{CommandMessage, StateEvent};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode an inbound queue payload into a command.
pub fn decode_command(payload: &[u8]) -> Result<CommandMessage, CodecError> {
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text.trim())?)
}

/// Encode an event for the upstream queue.
pub fn encode_event(event: &StateEvent) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(event)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwr_core::{PinId, PinModeId};
    use serde_json::{json, Value};

    #[test]
    fn test_decode_minimal_command() {
        let cmd = decode_command(br#"{"Id":5,"Status":false}"#).expect("decode");
        assert_eq!(cmd.id, PinId(5));
        assert!(!cmd.status);
        assert_eq!(cmd.closed_in_milliseconds, 0);
        assert_eq!(cmd.pin_mode_id, PinModeId(0));
        assert_eq!(cmd.job_guid, None);
        assert!(cmd.node_id.is_empty());
    }

    #[test]
    fn test_decode_legacy_closed_field_and_numeric_node() {
        let cmd = decode_command(
            br#"{"Id":5,"Status":true,"ClosedinMilliseconds":250,"NodeId":7}"#,
        )
        .expect("decode");
        assert_eq!(cmd.closed_in_milliseconds, 250);
        assert_eq!(cmd.node_id, "7");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_command(&[0xff, 0xfe, 0x00]),
            Err(CodecError::Utf8(_))
        ));
        assert!(matches!(
            decode_command(b"{\"Id\":"),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            decode_command(br#"{"Status":true}"#),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn test_unknown_fields_survive_acknowledgement() {
        let cmd = decode_command(
            br#"{"Id":3,"Status":true,"Service":"Power_Write:7","Room":"Kitchen"}"#,
        )
        .expect("decode");
        let bytes = encode_event(&StateEvent::Command(cmd.acknowledged_by("7"))).expect("encode");
        let value: Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(value["Room"], json!("Kitchen"));
        assert_eq!(value["NodeId"], json!("7"));
        assert_eq!(value["Service"], json!("Power_Write:7"));
        assert_eq!(value["ClosedInMilliseconds"], json!(0));
        assert!(value.get("JobGuid").is_none());
    }

    fn acknowledged(payload: &[u8]) -> Value {
        let cmd = decode_command(payload).expect("decode");
        let bytes = encode_event(&StateEvent::Command(cmd.acknowledged_by("7"))).expect("encode");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[test]
    fn test_job_guid_is_opaque() {
        let value = acknowledged(br#"{"Id":17,"Status":true,"JobGuid":""}"#);
        assert_eq!(value["JobGuid"], json!(""));

        let value = acknowledged(br#"{"Id":17,"Status":true,"JobGuid":null}"#);
        assert_eq!(value.get("JobGuid"), Some(&Value::Null));

        let value = acknowledged(br#"{"Id":17,"Status":true,"JobGuid":"job-42"}"#);
        assert_eq!(value["JobGuid"], json!("job-42"));

        let value = acknowledged(
            br#"{"Id":17,"Status":true,"JobGuid":"6F9619FF-8B86-D011-B42D-00C04FC964FF"}"#,
        );
        assert_eq!(value["JobGuid"], json!("6F9619FF-8B86-D011-B42D-00C04FC964FF"));
    }

    #[test]
    fn test_acknowledgement_keeps_closed_key_spelling() {
        let value = acknowledged(br#"{"Id":5,"Status":true,"ClosedinMilliseconds":250}"#);
        assert_eq!(value["ClosedinMilliseconds"], json!(250));
        assert!(value.get("ClosedInMilliseconds").is_none());

        let value = acknowledged(br#"{"Id":5,"Status":true,"ClosedInMilliseconds":250}"#);
        assert_eq!(value["ClosedInMilliseconds"], json!(250));
        assert!(value.get("ClosedinMilliseconds").is_none());
    }

    #[test]
    fn test_revert_uses_current_closed_key() {
        let cmd = decode_command(br#"{"Id":5,"Status":true,"ClosedinMilliseconds":250}"#)
            .expect("decode");
        let revert = CommandMessage::revert_of(&cmd, false, 0);
        let bytes = encode_event(&StateEvent::Command(revert)).expect("encode");
        let value: Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(value["ClosedInMilliseconds"], json!(0));
        assert!(value.get("ClosedinMilliseconds").is_none());
        assert_eq!(value["JobGuid"], json!("00000000-0000-0000-0000-000000000000"));
    }
}
