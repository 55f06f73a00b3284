// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the decide agent client

use crate::component::Component;
use crate::message::RequestKind;
use std::time::Duration;

/// Result type alias using AgentError
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error raised by a fallible watch predicate while evaluating a snapshot.
///
/// A predicate error is not fatal on its own: the offending snapshot is
/// skipped and the watch keeps consuming the stream. Only repeated
/// consecutive failures escalate to [`AgentError::Predicate`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct PredicateError(pub String);

impl PredicateError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Error types for the decide agent client
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// ZMQ communication error
    #[error("ZMQ error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No reply from the controller within the correlator's deadline
    #[error("no reply for {kind} on {component} within {timeout:?}")]
    RequestTimeout {
        component: Component,
        kind: RequestKind,
        timeout: Duration,
    },

    /// A reply arrived in time but could not be decoded
    #[error("malformed reply for {kind} on {component}: {reason}")]
    MalformedReply {
        component: Component,
        kind: RequestKind,
        reason: String,
    },

    /// A publication arrived but could not be decoded
    #[error("malformed snapshot on {component}: {reason}")]
    MalformedSnapshot { component: Component, reason: String },

    /// A watch predicate kept failing and the watch gave up
    #[error("predicate kept failing on {component}: {reason}")]
    Predicate { component: Component, reason: String },

    /// Subscription-level failure (bus driver stopped, stream torn down)
    #[error("subscription failure: {0}")]
    Subscription(String),

    /// Connection to an endpoint could not be established
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The request channel was closed underneath an exchange
    #[error("request channel closed")]
    ChannelClosed,

    /// Unexpected wire framing (multipart shape, missing correlation header)
    #[error("invalid message framing: {0}")]
    InvalidFraming(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A watch task failed or was cancelled before resolving
    #[error("watch task failed: {0}")]
    WatchTask(String),

    /// Generic client error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// True for "confirmation absent" style deadline expiries, as opposed to
    /// hard transport or decode failures. Callers alerting on failure can use
    /// this to react differently to the two classes.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::RequestTimeout { .. })
    }
}
