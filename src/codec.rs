// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wire codec boundary.
//!
//! The core never interprets bytes itself: encoding and decoding is delegated
//! to an injected [`WireCodec`]. The schema registry is keyed by
//! `(component, request kind)` on the implementor's side; this crate only
//! cares that a well-formed payload comes back.

use crate::component::Component;
use crate::error::{AgentError, Result};
use crate::message::{ReplyMessage, RequestEnvelope, RequestKind, StateSnapshot};
use serde_json::Value;

/// Encode/decode boundary between typed messages and the wire.
pub trait WireCodec: Send + Sync {
    fn encode_request(&self, envelope: &RequestEnvelope) -> Result<Vec<u8>>;

    fn decode_reply(
        &self,
        component: &Component,
        kind: RequestKind,
        bytes: &[u8],
    ) -> Result<ReplyMessage>;

    fn decode_snapshot(&self, component: &Component, bytes: &[u8]) -> Result<StateSnapshot>;
}

/// Default JSON codec.
///
/// Requests serialize to `{"kind": .., "component": .., "body": {..}}`;
/// replies and snapshots are expected to be JSON objects carrying the
/// component's schema-specific fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl WireCodec for JsonCodec {
    fn encode_request(&self, envelope: &RequestEnvelope) -> Result<Vec<u8>> {
        let payload = serde_json::json!({
            "kind": envelope.kind.as_str(),
            "component": envelope.component.as_str(),
            "body": envelope.body,
        });
        Ok(payload.to_string().into_bytes())
    }

    fn decode_reply(
        &self,
        component: &Component,
        kind: RequestKind,
        bytes: &[u8],
    ) -> Result<ReplyMessage> {
        let fields: Value =
            serde_json::from_slice(bytes).map_err(|e| AgentError::MalformedReply {
                component: component.clone(),
                kind,
                reason: e.to_string(),
            })?;
        if !fields.is_object() {
            return Err(AgentError::MalformedReply {
                component: component.clone(),
                kind,
                reason: format!("expected JSON object, got {}", fields),
            });
        }
        Ok(ReplyMessage::new(component.clone(), kind, fields))
    }

    fn decode_snapshot(&self, component: &Component, bytes: &[u8]) -> Result<StateSnapshot> {
        let fields: Value =
            serde_json::from_slice(bytes).map_err(|e| AgentError::MalformedSnapshot {
                component: component.clone(),
                reason: e.to_string(),
            })?;
        if !fields.is_object() {
            return Err(AgentError::MalformedSnapshot {
                component: component.clone(),
                reason: format!("expected JSON object, got {}", fields),
            });
        }
        Ok(StateSnapshot::new(component.clone(), fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RequestKind;

    #[test]
    fn request_encodes_to_json_object() {
        let envelope = RequestEnvelope::new(RequestKind::SetParameters, "stepper-motor".into())
            .field("timeout", 4000);
        let bytes = JsonCodec.encode_request(&envelope).unwrap();

        let decoded: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded["kind"], "SetParameters");
        assert_eq!(decoded["component"], "stepper-motor");
        assert_eq!(decoded["body"]["timeout"], 4000);
    }

    #[test]
    fn reply_decode_round_trip() {
        let reply = JsonCodec
            .decode_reply(
                &"house-light".into(),
                RequestKind::GetParameters,
                br#"{"clock_interval": 55}"#,
            )
            .unwrap();
        assert_eq!(reply.i64_field("clock_interval"), Some(55));
        assert_eq!(reply.kind(), RequestKind::GetParameters);
    }

    #[test]
    fn garbage_reply_is_malformed() {
        let err = JsonCodec
            .decode_reply(&"house-light".into(), RequestKind::GetParameters, b"\x00\x01")
            .unwrap_err();
        assert!(matches!(err, AgentError::MalformedReply { .. }));
    }

    #[test]
    fn non_object_snapshot_is_malformed() {
        let err = JsonCodec
            .decode_snapshot(&"stepper-motor".into(), b"[1,2,3]")
            .unwrap_err();
        assert!(matches!(err, AgentError::MalformedSnapshot { .. }));
    }
}
