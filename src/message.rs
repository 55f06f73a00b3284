// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed messages exchanged with the controller: request envelopes going out,
//! decoded replies and state snapshots coming back.
//!
//! Field sets are schema-specific per component (motor timeout, house-light
//! brightness/daytime/manual flags, audio playback id/state/frame count), so
//! decoded payloads are carried as JSON objects with typed accessors rather
//! than per-device structs. The concrete schemas live with the injected
//! [`WireCodec`](crate::codec::WireCodec), outside this crate.

use crate::component::Component;
use crate::error::PredicateError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The three request shapes the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    SetParameters,
    GetParameters,
    ChangeState,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::SetParameters => "SetParameters",
            RequestKind::GetParameters => "GetParameters",
            RequestKind::ChangeState => "ChangeState",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request. Constructed fresh per call, immutable once sent.
///
/// The body is a field-name to value mapping; queries (`GetParameters`)
/// leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub kind: RequestKind,
    pub component: Component,
    pub body: Map<String, Value>,
}

impl RequestEnvelope {
    pub fn new(kind: RequestKind, component: Component) -> Self {
        Self {
            kind,
            component,
            body: Map::new(),
        }
    }

    pub fn with_body(kind: RequestKind, component: Component, body: Map<String, Value>) -> Self {
        Self {
            kind,
            component,
            body,
        }
    }

    /// Add one body field, builder style.
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.body.insert(name.to_string(), value.into());
        self
    }
}

/// Decoded response to one request. Exactly one per request.
#[derive(Debug, Clone)]
pub struct ReplyMessage {
    component: Component,
    kind: RequestKind,
    fields: Value,
}

impl ReplyMessage {
    pub fn new(component: Component, kind: RequestKind, fields: Value) -> Self {
        Self {
            component,
            kind,
            fields,
        }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn fields(&self) -> &Value {
        &self.fields
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// One decoded state publication for a component.
///
/// Snapshots arrive as an unordered stream of periodic status reports;
/// newest wins for predicate evaluation. Cloned per watcher by the fan-out.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    component: Component,
    fields: Value,
}

impl StateSnapshot {
    pub fn new(component: Component, fields: Value) -> Self {
        Self { component, fields }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn fields(&self) -> &Value {
        &self.fields
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Like [`bool_field`](Self::bool_field) but for fallible predicates:
    /// a missing or mistyped field becomes a [`PredicateError`].
    pub fn require_bool(&self, name: &str) -> Result<bool, PredicateError> {
        self.bool_field(name).ok_or_else(|| {
            PredicateError::new(format!(
                "snapshot for {} has no boolean field '{}'",
                self.component, name
            ))
        })
    }

    pub fn require_i64(&self, name: &str) -> Result<i64, PredicateError> {
        self.i64_field(name).ok_or_else(|| {
            PredicateError::new(format!(
                "snapshot for {} has no integer field '{}'",
                self.component, name
            ))
        })
    }

    pub fn require_str(&self, name: &str) -> Result<&str, PredicateError> {
        self.str_field(name).ok_or_else(|| {
            PredicateError::new(format!(
                "snapshot for {} has no string field '{}'",
                self.component, name
            ))
        })
    }
}
