//! Delivery loop turning host activity into reactor callbacks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;
use guard_core::{Reactor, StateChange};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::local::LocalHost;
use crate::timers::{TimerAction, TimerEntry};

/// Upper bound on callbacks per `pump`, guarding against feedback loops
const MAX_DELIVERIES_PER_PUMP: usize = 10_000;

/// Longest idle sleep in `run`, so clock jumps are noticed
const MAX_IDLE_WAIT: std::time::Duration = std::time::Duration::from_secs(30);

/// Stops a running [`HostRuntime::run`] loop
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// Feeds state changes and due timers to a [`Reactor`], strictly one at a time
pub struct HostRuntime {
    host: Arc<LocalHost>,
    rx: broadcast::Receiver<StateChange>,
    shutdown_tx: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
}

impl HostRuntime {
    /// Changes written after this call are delivered
    pub fn new(host: Arc<LocalHost>) -> Self {
        let rx = host.subscribe();
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            host,
            rx,
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn host(&self) -> &Arc<LocalHost> {
        &self.host
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Deliver everything that is ready at the current clock time, including
    /// changes caused by the reactor's own service calls
    pub fn pump<R: Reactor>(&mut self, reactor: &mut R) -> usize {
        let mut delivered = 0;

        while delivered < MAX_DELIVERIES_PER_PUMP {
            match self.rx.try_recv() {
                Ok(change) => {
                    delivered += dispatch_change(&self.host, change, reactor);
                    continue;
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Runtime lagged by {} state changes", n);
                    continue;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => {}
            }

            match self.host.pop_due_timer() {
                Some(entry) => delivered += fire_timer(&self.host, entry, reactor),
                None => break,
            }
        }

        if delivered >= MAX_DELIVERIES_PER_PUMP {
            warn!(delivered, "Delivery limit reached, deferring the rest");
        }
        delivered
    }

    /// Move a manual clock forward by `by`, firing every timer on the way at
    /// its due time
    pub fn advance<R: Reactor>(&mut self, reactor: &mut R, by: Duration) -> usize {
        let clock = self.host.clock().clone();
        if !clock.is_manual() {
            warn!("advance() needs a manual clock, only pumping");
            return self.pump(reactor);
        }

        let target = clock.now() + by;
        let mut delivered = self.pump(reactor);

        while let Some(due) = self.host.next_timer_due() {
            if due > target {
                break;
            }
            if due > clock.now() {
                clock.set(due);
            }
            delivered += self.pump(reactor);
        }

        clock.set(target);
        delivered + self.pump(reactor)
    }

    /// Serve the reactor until shutdown, sleeping until the next timer is due
    pub async fn run<R: Reactor>(&mut self, reactor: &mut R) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Host runtime already running");
            return;
        }
        info!("Starting host runtime");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            self.pump(reactor);

            let wait = self
                .host
                .next_timer_due()
                .and_then(|due| (due - self.host.clock().now()).to_std().ok())
                .map(|w| w.min(MAX_IDLE_WAIT))
                .unwrap_or(MAX_IDLE_WAIT);
            trace!(wait_ms = wait.as_millis() as u64, "Idle");

            tokio::select! {
                result = self.rx.recv() => {
                    match result {
                        Ok(change) => {
                            dispatch_change(&self.host, change, reactor);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Runtime lagged by {} state changes", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("State bus closed, stopping host runtime");
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Host runtime stopped");
    }
}

/// Deliver a written state if someone listens and the value changed; arm
/// hold checks for hold listeners
fn dispatch_change<R: Reactor>(host: &LocalHost, change: StateChange, reactor: &mut R) -> usize {
    if !host.has_listener(&change.entity_id) || !change.is_value_change() {
        return 0;
    }

    if let Some(new_state) = &change.new_state {
        for hold in host.holds_for(&change.entity_id) {
            host.schedule_hold(
                change.entity_id.clone(),
                hold,
                change.old_state.clone(),
                new_state.last_changed,
            );
        }
    }

    debug!(
        entity_id = %change.entity_id,
        old = ?change.old_value(),
        new = ?change.new_value(),
        "Delivering state change"
    );
    reactor.on_state_changed(&change);
    1
}

fn fire_timer<R: Reactor>(host: &LocalHost, entry: TimerEntry, reactor: &mut R) -> usize {
    match entry.action {
        TimerAction::Fire(kind) => {
            trace!(handle = entry.handle.0, ?kind, "Firing timer");
            reactor.on_timer(entry.handle, kind);
            1
        }
        TimerAction::Hold {
            entity_id,
            hold,
            old_state,
            since,
        } => {
            // Superseded by a later change
            let Some(current) = host.store().get(&entity_id) else {
                return 0;
            };
            if current.last_changed != since {
                return 0;
            }
            debug!(%entity_id, hold_secs = hold.num_seconds(), "Delivering held state");
            reactor.on_state_changed(&StateChange {
                entity_id,
                old_state,
                new_state: Some(current),
                held_for: Some(hold),
            });
            1
        }
    }
}
