// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-component session: the composition layer over correlator and matcher.
//!
//! A session carries the default timeouts from [`AgentConfig`] and implements
//! the "request change, then confirm it happened" pattern: start a watch,
//! send the request, await the watch. The two primitives stay structurally
//! independent; the confirming snapshot is not assumed to be caused by this
//! particular request rather than a coincident state change.
//!
//! [`AgentConfig`]: crate::config::AgentConfig

use crate::component::Component;
use crate::correlator::Correlator;
use crate::error::Result;
use crate::message::{ReplyMessage, RequestEnvelope, RequestKind, StateSnapshot};
use crate::watch::{Matcher, Watch, WatchOutcome};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

pub struct ComponentSession {
    component: Component,
    correlator: Arc<Correlator>,
    matcher: Matcher,
    request_timeout: Duration,
    confirm_timeout: Duration,
}

impl ComponentSession {
    pub(crate) fn new(
        component: Component,
        correlator: Arc<Correlator>,
        matcher: Matcher,
        request_timeout: Duration,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            component,
            correlator,
            matcher,
            request_timeout,
            confirm_timeout,
        }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub async fn set_parameters(&self, body: Map<String, Value>) -> Result<ReplyMessage> {
        let envelope = RequestEnvelope::with_body(
            RequestKind::SetParameters,
            self.component.clone(),
            body,
        );
        self.correlator.send(envelope, self.request_timeout).await
    }

    pub async fn get_parameters(&self) -> Result<ReplyMessage> {
        let envelope = RequestEnvelope::new(RequestKind::GetParameters, self.component.clone());
        self.correlator.send(envelope, self.request_timeout).await
    }

    /// Query parameters with a caller-chosen deadline. Some controller
    /// operations (stimulus imports) block far longer than the default.
    pub async fn get_parameters_with_timeout(&self, timeout: Duration) -> Result<ReplyMessage> {
        let envelope = RequestEnvelope::new(RequestKind::GetParameters, self.component.clone());
        self.correlator.send(envelope, timeout).await
    }

    pub async fn change_state(&self, body: Map<String, Value>) -> Result<ReplyMessage> {
        let envelope =
            RequestEnvelope::with_body(RequestKind::ChangeState, self.component.clone(), body);
        self.correlator.send(envelope, self.request_timeout).await
    }

    /// Set one parameter, then read it back and compare.
    ///
    /// A readback mismatch is a non-fatal, logged inconsistency: the request
    /// itself succeeded, so the reply is still returned. This deliberately
    /// distinguishes "request failed" from "request succeeded but the
    /// controller holds a different value".
    pub async fn set_and_verify(&self, field: &str, value: Value) -> Result<ReplyMessage> {
        let mut body = Map::new();
        body.insert(field.to_string(), value.clone());
        self.set_parameters(body).await?;

        let reply = self.get_parameters().await?;
        match reply.fields().get(field) {
            Some(observed) if *observed == value => {
                debug!("[SESSION] {} {} verified at {}", self.component, field, value);
            }
            observed => {
                error!(
                    "[SESSION] {} parameter '{}' not set to {}, got {:?}",
                    self.component, field, value, observed
                );
            }
        }
        Ok(reply)
    }

    /// Start a confirmation watch with the session's failure policy: a
    /// timeout logs a publication error for this component. Returns the
    /// handle so the caller can send the triggering request before awaiting.
    pub async fn confirm<P>(&self, predicate: P, timeout: Duration) -> Result<Watch>
    where
        P: FnMut(&StateSnapshot) -> bool + Send + 'static,
    {
        let component = self.component.clone();
        self.matcher
            .watch(
                self.component.clone(),
                predicate,
                timeout,
                Box::new(move |matched| {
                    if !matched {
                        error!("[SESSION] no publication from {} before deadline", component);
                    }
                }),
            )
            .await
    }

    /// Request a state change and wait for the snapshot stream to confirm it.
    ///
    /// The watch starts before the request goes out, so a snapshot published
    /// between request and reply is not missed. If the request itself fails,
    /// the watch is cancelled and the request error is returned.
    pub async fn change_state_confirmed<P>(
        &self,
        body: Map<String, Value>,
        predicate: P,
    ) -> Result<WatchOutcome>
    where
        P: FnMut(&StateSnapshot) -> bool + Send + 'static,
    {
        let watch = self.confirm(predicate, self.confirm_timeout).await?;
        if let Err(e) = self.change_state(body).await {
            watch.cancel();
            return Err(e);
        }
        watch.resolve().await
    }
}
