//! Change notifications for run subscribers
//!
//! The scheduler publishes after every committed turn. Turn events pass a
//! minimum-interval gate so a fast run does not flood slow consumers; status
//! changes and the final event are never gated. A turn event that arrives
//! while the gate is closed is held, replacing any older held one, and goes
//! out when the gate reopens or just before the next ungated event.
//! Subscribers that still fall behind see `RecvError::Lagged` and can
//! resync from `current_state`.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::core::types::{RunId, Turn};
use crate::simulation::run::{RunResults, RunStatus, TerminationReason};
use crate::simulation::snapshot::TurnSnapshot;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    StatusChanged {
        run_id: RunId,
        status: RunStatus,
    },
    TurnCommitted {
        run_id: RunId,
        turn: Turn,
        snapshot: TurnSnapshot,
    },
    Finished {
        run_id: RunId,
        status: RunStatus,
        reason: TerminationReason,
        results: Option<RunResults>,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::StatusChanged { run_id, .. }
            | RunEvent::TurnCommitted { run_id, .. }
            | RunEvent::Finished { run_id, .. } => *run_id,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RunEvent::Finished { .. })
    }
}

#[derive(Default)]
struct TurnGate {
    last_sent: Option<Instant>,
    /// Latest turn event suppressed by the gate
    held: Option<RunEvent>,
    flush_scheduled: bool,
}

impl TurnGate {
    fn release_held(&mut self, tx: &broadcast::Sender<RunEvent>) -> bool {
        match self.held.take() {
            Some(event) => {
                self.last_sent = Some(Instant::now());
                let _ = tx.send(event);
                true
            }
            None => false,
        }
    }
}

fn lock_gate(gate: &Mutex<TurnGate>) -> MutexGuard<'_, TurnGate> {
    gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct EventPublisher {
    tx: broadcast::Sender<RunEvent>,
    min_interval: Duration,
    gate: Arc<Mutex<TurnGate>>,
}

impl EventPublisher {
    pub fn new(capacity: usize, min_interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            min_interval,
            gate: Arc::new(Mutex::new(TurnGate::default())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish unconditionally, after any held turn event. Having no
    /// subscribers is not an error.
    pub fn publish(&self, event: RunEvent) {
        let mut gate = lock_gate(&self.gate);
        gate.release_held(&self.tx);
        let _ = self.tx.send(event);
    }

    /// Publish a turn event unless one went out less than `min_interval`
    /// ago, in which case it is held for a trailing send. Returns whether it
    /// was sent now.
    pub fn publish_turn(&self, event: RunEvent) -> bool {
        let now = Instant::now();
        let mut gate = lock_gate(&self.gate);
        if let Some(prev) = gate.last_sent {
            let elapsed = now.duration_since(prev);
            if elapsed < self.min_interval {
                gate.held = Some(event);
                if !gate.flush_scheduled {
                    gate.flush_scheduled = self.schedule_flush(self.min_interval - elapsed);
                }
                return false;
            }
        }
        gate.last_sent = Some(now);
        gate.held = None;
        let _ = self.tx.send(event);
        true
    }

    /// Send the held turn event now, if there is one
    pub fn flush_held(&self) -> bool {
        lock_gate(&self.gate).release_held(&self.tx)
    }

    /// Release the held event once the gate reopens. Outside a runtime
    /// nothing is scheduled and the event waits for the next publish.
    fn schedule_flush(&self, delay: Duration) -> bool {
        let Ok(handle) = Handle::try_current() else {
            return false;
        };
        let gate = Arc::clone(&self.gate);
        let tx = self.tx.clone();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut gate = lock_gate(&gate);
            gate.flush_scheduled = false;
            gate.release_held(&tx);
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn status_event(status: RunStatus) -> RunEvent {
        RunEvent::StatusChanged {
            run_id: RunId::new(),
            status,
        }
    }

    fn turn_event(turn: Turn) -> RunEvent {
        RunEvent::TurnCommitted {
            run_id: RunId::new(),
            turn,
            snapshot: TurnSnapshot {
                turn,
                agents: vec![],
                resources: vec![],
                events: vec![],
            },
        }
    }

    fn drain_turns(rx: &mut broadcast::Receiver<RunEvent>) -> Vec<Turn> {
        std::iter::from_fn(|| match rx.try_recv() {
            Ok(RunEvent::TurnCommitted { turn, .. }) => Some(turn),
            _ => None,
        })
        .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_events_are_rate_limited() {
        let publisher = EventPublisher::new(16, Duration::from_millis(200));
        let mut rx = publisher.subscribe();

        assert!(publisher.publish_turn(turn_event(1)));
        assert!(!publisher.publish_turn(turn_event(2)));
        assert!(!publisher.publish_turn(turn_event(3)));
        assert_eq!(drain_turns(&mut rx), vec![1]);

        // the latest held turn goes out once the gate reopens
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(drain_turns(&mut rx), vec![3]);
        assert!(!publisher.flush_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_turn_precedes_status_event() {
        let publisher = EventPublisher::new(16, Duration::from_secs(10));
        let mut rx = publisher.subscribe();
        publisher.publish_turn(turn_event(1));
        publisher.publish_turn(turn_event(2));
        publisher.publish(status_event(RunStatus::Paused));

        assert!(matches!(rx.try_recv(), Ok(RunEvent::TurnCommitted { turn: 1, .. })));
        assert!(matches!(rx.try_recv(), Ok(RunEvent::TurnCommitted { turn: 2, .. })));
        assert!(matches!(
            rx.try_recv(),
            Ok(RunEvent::StatusChanged {
                status: RunStatus::Paused,
                ..
            })
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        // nothing left for the scheduled flush to send
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_held_turn_waits_without_runtime() {
        let publisher = EventPublisher::new(4, Duration::from_secs(60));
        let mut rx = publisher.subscribe();
        publisher.publish_turn(turn_event(1));
        publisher.publish_turn(turn_event(2));
        assert_eq!(drain_turns(&mut rx), vec![1]);
        assert!(publisher.flush_held());
        assert_eq!(drain_turns(&mut rx), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_events_bypass_gate() {
        let publisher = EventPublisher::new(16, Duration::from_secs(10));
        let mut rx = publisher.subscribe();
        publisher.publish_turn(turn_event(1));
        publisher.publish(status_event(RunStatus::Paused));
        publisher.publish(status_event(RunStatus::Running));

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = EventPublisher::new(4, Duration::ZERO);
        publisher.publish(status_event(RunStatus::Running));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(status_event(RunStatus::Completed)).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["status"], "completed");
    }
}
