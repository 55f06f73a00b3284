// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Confirmation matcher.
//!
//! A watch subscribes to a component's snapshot stream and resolves with the
//! first snapshot satisfying a caller predicate, or with `matched = false`
//! once its deadline passes, invoking the caller's failure hook exactly once.
//! Watches run as their own tasks so a caller can start one, fire the
//! triggering request, and await the resolution afterwards.

use crate::bus::SnapshotBus;
use crate::component::Component;
use crate::error::{AgentError, PredicateError, Result};
use crate::message::StateSnapshot;
use futures::future::BoxFuture;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Caller-supplied handler invoked exactly once when a watch times out
/// (with `false`), and never on success.
pub type FailureHook = Box<dyn FnOnce(bool) + Send + 'static>;

/// Consecutive predicate failures tolerated before the watch resolves with
/// an error instead of spinning until its deadline.
const MAX_PREDICATE_FAULTS: u32 = 8;

/// Terminal state of a resolved watch. Exactly one of these per watch:
/// either the first matching snapshot, or a timeout with no snapshot.
#[derive(Debug, Clone)]
pub struct WatchOutcome {
    pub matched: bool,
    pub snapshot: Option<StateSnapshot>,
}

/// Handle to a pending watch.
///
/// The watch is already consuming its snapshot stream; the handle is only
/// how the caller eventually joins (or abandons) it.
pub struct Watch {
    component: Component,
    task: JoinHandle<Result<WatchOutcome>>,
}

impl Watch {
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Await the watch's terminal state.
    pub async fn resolve(self) -> Result<WatchOutcome> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                Err(AgentError::WatchTask("watch was cancelled".to_string()))
            }
            Err(e) => Err(AgentError::WatchTask(e.to_string())),
        }
    }

    /// Cancel the watch. The task is aborted and its stream registration
    /// dropped: no late resolution, and the failure hook is not invoked.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Let the watch run unobserved. It still resolves (and fires its
    /// failure hook on timeout); only the outcome is discarded.
    pub fn detach(self) {
        drop(self.task);
    }
}

impl IntoFuture for Watch {
    type Output = Result<WatchOutcome>;
    type IntoFuture = BoxFuture<'static, Result<WatchOutcome>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.resolve())
    }
}

/// Factory for watches over a shared snapshot bus. Cheap to clone.
#[derive(Clone)]
pub struct Matcher {
    bus: Arc<SnapshotBus>,
}

impl Matcher {
    pub fn new(bus: Arc<SnapshotBus>) -> Self {
        Self { bus }
    }

    /// Start watching `component` for the first snapshot where `predicate`
    /// returns `true`, within `timeout`.
    ///
    /// The topic registration is established before this returns, so any
    /// snapshot published afterwards is observed: start the watch first,
    /// then send the triggering request.
    ///
    /// Tie-break: the watch task polls its snapshot stream before its timer,
    /// so a snapshot already delivered when the deadline fires is evaluated
    /// first and wins.
    pub async fn watch<P>(
        &self,
        component: Component,
        mut predicate: P,
        timeout: Duration,
        failure_hook: FailureHook,
    ) -> Result<Watch>
    where
        P: FnMut(&StateSnapshot) -> bool + Send + 'static,
    {
        self.watch_fallible(component, move |snapshot| Ok(predicate(snapshot)), timeout, failure_hook)
            .await
    }

    /// Like [`watch`](Self::watch) but with a fallible predicate. A
    /// [`PredicateError`] is logged and treated as a non-match for that
    /// snapshot; after [`MAX_PREDICATE_FAULTS`] consecutive failures the
    /// watch resolves with [`AgentError::Predicate`] instead of hanging.
    pub async fn watch_fallible<P>(
        &self,
        component: Component,
        predicate: P,
        timeout: Duration,
        failure_hook: FailureHook,
    ) -> Result<Watch>
    where
        P: FnMut(&StateSnapshot) -> std::result::Result<bool, PredicateError> + Send + 'static,
    {
        let receiver = self.bus.register(&component).await?;
        let task = tokio::spawn(run_watch(
            component.clone(),
            receiver,
            predicate,
            timeout,
            failure_hook,
        ));
        Ok(Watch { component, task })
    }
}

async fn run_watch<P>(
    component: Component,
    mut receiver: broadcast::Receiver<StateSnapshot>,
    mut predicate: P,
    timeout: Duration,
    failure_hook: FailureHook,
) -> Result<WatchOutcome>
where
    P: FnMut(&StateSnapshot) -> std::result::Result<bool, PredicateError> + Send + 'static,
{
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut faults = 0u32;

    loop {
        tokio::select! {
            biased;

            delivery = receiver.recv() => match delivery {
                Ok(snapshot) => match predicate(&snapshot) {
                    Ok(true) => {
                        debug!("[WATCH] {} confirmed", component);
                        return Ok(WatchOutcome {
                            matched: true,
                            snapshot: Some(snapshot),
                        });
                    }
                    Ok(false) => {
                        faults = 0;
                    }
                    Err(e) => {
                        faults += 1;
                        warn!(
                            "[WATCH] predicate failed on {} ({}/{}), snapshot skipped: {}",
                            component, faults, MAX_PREDICATE_FAULTS, e
                        );
                        if faults >= MAX_PREDICATE_FAULTS {
                            return Err(AgentError::Predicate {
                                component,
                                reason: e.to_string(),
                            });
                        }
                    }
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("[WATCH] {} watcher lagged, {} snapshots skipped", component, missed);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(AgentError::Subscription(format!(
                        "snapshot stream for {} closed",
                        component
                    )));
                }
            },

            _ = &mut deadline => {
                debug!("[WATCH] {} deadline passed without a match", component);
                failure_hook(false);
                return Ok(WatchOutcome {
                    matched: false,
                    snapshot: None,
                });
            }
        }
    }
}
