// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Client library for coordinating with a real-time behavioral experiment
//! controller over ZeroMQ.
//!
//! The controller exposes two channels: a point-to-point request channel
//! (one reply per request) and a fan-out publish channel of periodic state
//! snapshots per component. This crate provides the two primitives callers
//! compose to drive it:
//!
//! - [`Correlator`]: typed request out, exactly one decoded reply back
//!   within a deadline, stale replies discarded by correlation id.
//! - [`Matcher`]: predicate-driven confirmation ("catch") against a
//!   component's snapshot stream, with a per-watch deadline and failure hook.
//!
//! [`AgentClient`] assembles both over connected sockets;
//! [`ComponentSession`] wraps the usual composition: start a watch, send the
//! triggering request, await the confirmation.
//!
//! # Example
//! ```ignore
//! use decide_agent::{AgentClient, AgentConfig};
//! use serde_json::Map;
//!
//! let client = AgentClient::connect(AgentConfig::default()).await?;
//! let motor = client.session("stepper-motor");
//!
//! let mut body = Map::new();
//! body.insert("running".into(), true.into());
//! body.insert("direction".into(), true.into());
//! let outcome = motor
//!     .change_state_confirmed(body, |pub_state| {
//!         pub_state.bool_field("running").unwrap_or(false)
//!     })
//!     .await?;
//! assert!(outcome.matched);
//! ```

mod bus;
mod client;
mod component;
mod config;
mod correlator;
mod error;
mod message;
mod session;
mod watch;

pub mod codec;
pub mod transport;

pub use bus::SnapshotBus;
pub use client::AgentClient;
pub use codec::{JsonCodec, WireCodec};
pub use component::Component;
pub use config::{AgentConfig, DEFAULT_PUBLISH_ENDPOINT, DEFAULT_REQUEST_ENDPOINT};
pub use correlator::Correlator;
pub use error::{AgentError, PredicateError, Result};
pub use message::{ReplyMessage, RequestEnvelope, RequestKind, StateSnapshot};
pub use session::ComponentSession;
pub use watch::{FailureHook, Matcher, Watch, WatchOutcome};
