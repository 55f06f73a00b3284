// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Snapshot bus: the process-wide shared subscription registry.
//!
//! The controller publishes each component's state on its own topic. Opening
//! one network subscription per watcher would duplicate traffic, so the bus
//! owns the single SUB-side channel, subscribes once per topic, and fans each
//! decoded snapshot out in-process on a per-topic broadcast channel. Every
//! registered watcher sees every snapshot for its topic, in publish order.
//!
//! Lifecycle is explicit: the application opens the bus at startup and shuts
//! it down when done. There are no global singletons.

use crate::codec::WireCodec;
use crate::component::Component;
use crate::error::{AgentError, Result};
use crate::message::StateSnapshot;
use crate::transport::SnapshotChannel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Per-topic fan-out buffer. Status streams are newest-wins, so a watcher
/// that lags past this many snapshots skips ahead rather than failing.
const SNAPSHOT_BUFFER: usize = 256;

struct SubscribeCommand {
    component: Component,
}

/// Establishment state of a topic's network subscription. While the
/// subscribe is still in flight every registrant parks on a waiter; the
/// driver settles all of them with the subscribe outcome.
enum TopicState {
    Pending(Vec<oneshot::Sender<Result<()>>>),
    Ready,
}

struct TopicEntry {
    fanout: broadcast::Sender<StateSnapshot>,
    state: TopicState,
}

type TopicMap = Arc<Mutex<HashMap<Component, TopicEntry>>>;

pub struct SnapshotBus {
    topics: TopicMap,
    commands: Mutex<Option<mpsc::UnboundedSender<SubscribeCommand>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotBus {
    /// Open the bus over a connected snapshot channel and start the driver
    /// task that routes publications to watchers.
    pub fn open(channel: Box<dyn SnapshotChannel>, codec: Arc<dyn WireCodec>) -> Self {
        let topics: TopicMap = Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(channel, codec, cmd_rx, Arc::clone(&topics)));
        Self {
            topics,
            commands: Mutex::new(Some(cmd_tx)),
            driver: Mutex::new(Some(driver)),
        }
    }

    /// Register a watcher for a component's topic.
    ///
    /// Completes only once the network subscription for the topic is
    /// established, for every registrant: the first call for a topic hands
    /// the driver the subscribe, and calls arriving while it is still in
    /// flight park until the driver reports the outcome (a failed subscribe
    /// fails them all). Every later snapshot routed for the topic reaches
    /// the receiver; this is what makes "start watch, then send the
    /// triggering request" free of a missed-first-match window.
    pub async fn register(
        &self,
        component: &Component,
    ) -> Result<broadcast::Receiver<StateSnapshot>> {
        let (receiver, established) = {
            let mut topics = self
                .topics
                .lock()
                .map_err(|e| AgentError::Subscription(format!("topic registry poisoned: {}", e)))?;
            match topics.get_mut(component) {
                Some(entry) => {
                    let receiver = entry.fanout.subscribe();
                    match &mut entry.state {
                        TopicState::Ready => (receiver, None),
                        TopicState::Pending(waiters) => {
                            let (waiter_tx, waiter_rx) = oneshot::channel();
                            waiters.push(waiter_tx);
                            (receiver, Some(waiter_rx))
                        }
                    }
                }
                None => {
                    // The command goes out under the registry lock so the
                    // pending entry and the driver's subscribe stay in step.
                    {
                        let commands = self.commands.lock().map_err(|e| {
                            AgentError::Subscription(format!("command channel poisoned: {}", e))
                        })?;
                        let commands = commands.as_ref().ok_or_else(|| {
                            AgentError::Subscription("snapshot bus is shut down".to_string())
                        })?;
                        commands
                            .send(SubscribeCommand {
                                component: component.clone(),
                            })
                            .map_err(|_| {
                                AgentError::Subscription("bus driver stopped".to_string())
                            })?;
                    }

                    let (fanout, receiver) = broadcast::channel(SNAPSHOT_BUFFER);
                    let (waiter_tx, waiter_rx) = oneshot::channel();
                    topics.insert(
                        component.clone(),
                        TopicEntry {
                            fanout,
                            state: TopicState::Pending(vec![waiter_tx]),
                        },
                    );
                    (receiver, Some(waiter_rx))
                }
            }
        };

        if let Some(waiter) = established {
            waiter
                .await
                .map_err(|_| AgentError::Subscription("bus driver stopped".to_string()))??;
        }
        Ok(receiver)
    }

    /// Stop the driver and tear down all topic streams. Pending watchers
    /// observe their stream closing and resolve with a subscription error.
    pub async fn shutdown(&self) {
        if let Ok(mut guard) = self.commands.lock() {
            guard.take();
        }
        let driver = match self.driver.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(driver) = driver {
            let _ = driver.await;
        }
        debug!("[BUS] shut down");
    }
}

impl Drop for SnapshotBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.driver.lock() {
            if let Some(driver) = guard.take() {
                driver.abort();
            }
        }
    }
}

enum DriverEvent {
    Command(Option<SubscribeCommand>),
    Delivery(Result<(String, Vec<u8>)>),
}

async fn drive(
    mut channel: Box<dyn SnapshotChannel>,
    codec: Arc<dyn WireCodec>,
    mut commands: mpsc::UnboundedReceiver<SubscribeCommand>,
    topics: TopicMap,
) {
    loop {
        let event = tokio::select! {
            command = commands.recv() => DriverEvent::Command(command),
            delivery = channel.next() => DriverEvent::Delivery(delivery),
        };

        match event {
            DriverEvent::Command(Some(SubscribeCommand { component })) => {
                let result = channel.subscribe(component.as_str()).await;
                settle_subscription(&topics, &component, result);
            }
            // Bus dropped its sender: orderly shutdown.
            DriverEvent::Command(None) => break,
            DriverEvent::Delivery(Ok((topic, payload))) => {
                let component = Component::from(topic);
                let fanout = match topics.lock() {
                    Ok(map) => map.get(&component).map(|entry| entry.fanout.clone()),
                    Err(_) => None,
                };
                let Some(fanout) = fanout else {
                    trace!("[BUS] snapshot for unwatched topic '{}'", component);
                    continue;
                };
                match codec.decode_snapshot(&component, &payload) {
                    // A send error only means no watcher is currently
                    // registered; the topic stays subscribed.
                    Ok(snapshot) => {
                        let _ = fanout.send(snapshot);
                    }
                    Err(e) => {
                        warn!("[BUS] skipping malformed snapshot on {}: {}", component, e);
                    }
                }
            }
            DriverEvent::Delivery(Err(e)) => {
                warn!("[BUS] snapshot channel failed, stopping driver: {}", e);
                break;
            }
        }
    }

    // Dropping the fan-out senders closes every watcher's stream, and
    // dropping pending waiters fails registrations still in flight.
    if let Ok(mut map) = topics.lock() {
        map.clear();
    }
}

/// Resolve everyone parked on a topic's subscribe. Success marks the topic
/// ready; failure removes it so a later registration can retry.
fn settle_subscription(topics: &TopicMap, component: &Component, result: Result<()>) {
    let Ok(mut map) = topics.lock() else {
        return;
    };
    match result {
        Ok(()) => {
            if let Some(entry) = map.get_mut(component) {
                if let TopicState::Pending(waiters) =
                    std::mem::replace(&mut entry.state, TopicState::Ready)
                {
                    for waiter in waiters {
                        let _ = waiter.send(Ok(()));
                    }
                }
            }
        }
        Err(e) => {
            warn!("[BUS] subscribe to '{}' failed: {}", component, e);
            if let Some(entry) = map.remove(component) {
                if let TopicState::Pending(waiters) = entry.state {
                    let reason = format!("subscribe to {} failed: {}", component, e);
                    for waiter in waiters {
                        let _ = waiter.send(Err(AgentError::Subscription(reason.clone())));
                    }
                }
            }
        }
    }
}
