// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Agent client: assembles the correlator and snapshot bus over connected
//! channels and hands out per-component sessions.

use crate::bus::SnapshotBus;
use crate::codec::{JsonCodec, WireCodec};
use crate::component::Component;
use crate::config::AgentConfig;
use crate::correlator::Correlator;
use crate::error::Result;
use crate::session::ComponentSession;
use crate::transport::{RequestChannel, SnapshotChannel, ZmqRequestChannel, ZmqSnapshotChannel};
use crate::watch::Matcher;
use std::sync::Arc;
use tracing::info;

pub struct AgentClient {
    config: AgentConfig,
    correlator: Arc<Correlator>,
    bus: Arc<SnapshotBus>,
    matcher: Matcher,
}

impl AgentClient {
    /// Connect to the controller with the default JSON codec.
    pub async fn connect(config: AgentConfig) -> Result<Self> {
        Self::connect_with_codec(config, Arc::new(JsonCodec)).await
    }

    /// Connect with an application-supplied codec (per-device schemas).
    pub async fn connect_with_codec(
        config: AgentConfig,
        codec: Arc<dyn WireCodec>,
    ) -> Result<Self> {
        config.validate()?;

        let request_channel =
            ZmqRequestChannel::connect(&config.request_endpoint, config.connect_timeout).await?;
        let snapshot_channel =
            ZmqSnapshotChannel::connect(&config.publish_endpoint, config.connect_timeout).await?;

        info!(
            "[CLIENT] connected to controller (req: {}, pub: {})",
            config.request_endpoint, config.publish_endpoint
        );
        Ok(Self::assemble(
            config,
            Box::new(request_channel),
            Box::new(snapshot_channel),
            codec,
        ))
    }

    /// Assemble a client from already-connected channels. This is the seam
    /// for alternate transports and for tests with in-memory channels.
    pub fn assemble(
        config: AgentConfig,
        request_channel: Box<dyn RequestChannel>,
        snapshot_channel: Box<dyn SnapshotChannel>,
        codec: Arc<dyn WireCodec>,
    ) -> Self {
        let correlator = Arc::new(Correlator::new(request_channel, Arc::clone(&codec)));
        let bus = Arc::new(SnapshotBus::open(snapshot_channel, codec));
        let matcher = Matcher::new(Arc::clone(&bus));
        Self {
            config,
            correlator,
            bus,
            matcher,
        }
    }

    /// Open a session for one controlled component.
    pub fn session(&self, component: impl Into<Component>) -> ComponentSession {
        ComponentSession::new(
            component.into(),
            Arc::clone(&self.correlator),
            self.matcher.clone(),
            self.config.request_timeout,
            self.config.confirm_timeout,
        )
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Stop the snapshot bus driver. Watches still pending resolve with a
    /// subscription error rather than hanging.
    pub async fn shutdown(&self) {
        self.bus.shutdown().await;
    }
}
