// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Request/reply correlator.
//!
//! One call, one envelope on the wire, exactly one decoded reply back within
//! the deadline. The underlying request channel handles one exchange at a
//! time, so calls queue on an async mutex; a reply that surfaces for an
//! earlier, timed-out call is recognized by its correlation id and discarded
//! without ever reaching a caller.

use crate::codec::WireCodec;
use crate::error::{AgentError, Result};
use crate::message::{ReplyMessage, RequestEnvelope};
use crate::transport::RequestChannel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Width of the correlation id prefixed to every request payload.
const CORRELATION_HEADER: usize = 8;

pub struct Correlator {
    channel: Mutex<Box<dyn RequestChannel>>,
    codec: Arc<dyn WireCodec>,
    next_id: AtomicU64,
}

impl Correlator {
    pub fn new(channel: Box<dyn RequestChannel>, codec: Arc<dyn WireCodec>) -> Self {
        Self {
            channel: Mutex::new(channel),
            codec,
            next_id: AtomicU64::new(0),
        }
    }

    /// Send one request and await its reply.
    ///
    /// Writes exactly one envelope to the wire and never retries. On deadline
    /// expiry this fails with [`AgentError::RequestTimeout`]; a reply that
    /// arrives afterwards is discarded by the next exchange. A reply that
    /// arrives in time but fails to decode is [`AgentError::MalformedReply`].
    ///
    /// The correlator does not validate reply content against the request;
    /// comparing requested vs. observed parameter values is the caller's job.
    pub async fn send(&self, envelope: RequestEnvelope, timeout: Duration) -> Result<ReplyMessage> {
        let encoded = self.codec.encode_request(&envelope)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut payload = Vec::with_capacity(CORRELATION_HEADER + encoded.len());
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&encoded);

        let mut channel = self.channel.lock().await;
        channel.send(payload).await?;
        debug!(
            "[CORRELATOR] sent {} to {} (id={})",
            envelope.kind, envelope.component, id
        );

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let reply = match tokio::time::timeout(remaining, channel.recv()).await {
                Err(_) => {
                    warn!(
                        "[CORRELATOR] {} on {} timed out after {:?}",
                        envelope.kind, envelope.component, timeout
                    );
                    return Err(AgentError::RequestTimeout {
                        component: envelope.component,
                        kind: envelope.kind,
                        timeout,
                    });
                }
                Ok(received) => received?,
            };

            if reply.len() < CORRELATION_HEADER {
                return Err(AgentError::MalformedReply {
                    component: envelope.component,
                    kind: envelope.kind,
                    reason: format!(
                        "reply shorter than correlation header ({} bytes)",
                        reply.len()
                    ),
                });
            }
            let (header, body) = reply.split_at(CORRELATION_HEADER);
            let mut id_bytes = [0u8; CORRELATION_HEADER];
            id_bytes.copy_from_slice(header);
            let reply_id = u64::from_be_bytes(id_bytes);

            if reply_id != id {
                // Stale reply from a previously timed-out exchange.
                debug!(
                    "[CORRELATOR] discarding stale reply (id={}, expected {})",
                    reply_id, id
                );
                continue;
            }

            return self
                .codec
                .decode_reply(&envelope.component, envelope.kind, body);
        }
    }
}
