//! Turn scheduler
//!
//! Drives one run through `idle -> running <-> paused -> completed|error`.
//!
//! All mutation goes through the run mutex and never awaits while holding
//! it. Events and saves are queued before the lock is released, so
//! subscribers and the store see commits in order. Decisions are awaited with the lock released; the commit re-locks and
//! checks that the run is still running in the same epoch, so a response that
//! arrives after `pause()` or `stop()` is dropped instead of applied.
//!
//! Two disciplines:
//! - lockstep: one driver task; each tick gathers every alive agent's decision
//!   concurrently, then commits them in agent order
//! - per-agent: one task per agent, each sleeping its own think interval;
//!   commits are serialized by the run lock in arrival order

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use crate::core::config::{Discipline, EngineConfig};
use crate::core::error::Result;
use crate::core::types::{Direction, RunId, Turn};
use crate::decision::gateway::DecisionGateway;
use crate::decision::provider::DecisionProvider;
use crate::persistence::{save_logged, RunStore};
use crate::simulation::events::{EventPublisher, RunEvent};
use crate::simulation::run::{Run, RunConfig, RunStatus, TerminationReason};
use crate::simulation::snapshot::TurnSnapshot;
use crate::simulation::termination::check_termination;
use crate::simulation::turn::{commit_turn, plan_turn, TurnPlan};

/// What a tick or an agent turn ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A turn was committed and the run goes on
    Committed(Turn),
    /// A turn was committed and ended the run
    Finished(TerminationReason),
    /// The run was not running, or changed epoch while deciding
    Discarded,
    /// Per-agent only: the agent is dead and its task can stop
    AgentDead,
}

struct Shared {
    run_id: RunId,
    run: Mutex<Run>,
    gateway: Arc<DecisionGateway>,
    config: EngineConfig,
    tick_interval: Duration,
    status_tx: watch::Sender<RunStatus>,
    events: EventPublisher,
    store: Option<Arc<dyn RunStore>>,
    persist_tx: StdMutex<Option<mpsc::UnboundedSender<Run>>>,
    persist_worker: StdMutex<Option<JoinHandle<()>>>,
}

/// Result of recording a turn
struct Recorded {
    snapshot: TurnSnapshot,
    finished: Option<Run>,
    save: Option<Run>,
}

impl Shared {
    fn set_status(&self, status: RunStatus) {
        self.status_tx.send_replace(status);
        self.events.publish(RunEvent::StatusChanged {
            run_id: self.run_id,
            status,
        });
    }

    fn queue_save(&self, run: Run, last: bool) {
        let mut guard = self
            .persist_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(run);
        }
        if last {
            guard.take();
        }
    }

    /// Append the snapshot, check termination, decide what to persist.
    /// Runs under the run lock.
    fn record_turn(&self, run: &mut Run, events: Vec<String>, reason: Option<TerminationReason>) -> Result<Recorded> {
        let snapshot = TurnSnapshot::capture(run.turn, &run.agents, &run.grid, events);
        run.history.push(snapshot.clone());

        let reason = match reason {
            Some(reason) => Some(reason),
            None => check_termination(run, self.config.max_turns),
        };
        let finished = match reason {
            Some(reason) => {
                run.finish(reason)?;
                Some(run.clone())
            }
            None => None,
        };

        let every = self.config.persist_every_turns;
        let save = if finished.is_none() && every > 0 && run.turn % every == 0 {
            Some(run.clone())
        } else {
            None
        };

        Ok(Recorded {
            snapshot,
            finished,
            save,
        })
    }

    /// Publish and queue the save. Called under the run lock so events and
    /// saves leave in commit order.
    fn after_commit(&self, recorded: Recorded) -> StepOutcome {
        let turn = recorded.snapshot.turn;
        self.events.publish_turn(RunEvent::TurnCommitted {
            run_id: self.run_id,
            turn,
            snapshot: recorded.snapshot,
        });
        if let Some(run) = recorded.save {
            self.queue_save(run, false);
        }
        match recorded.finished {
            Some(run) => {
                let reason = run
                    .termination
                    .clone()
                    .unwrap_or(TerminationReason::Stopped);
                self.on_finished(run);
                StepOutcome::Finished(reason)
            }
            None => StepOutcome::Committed(turn),
        }
    }

    fn on_finished(&self, run: Run) {
        let reason = run
            .termination
            .clone()
            .unwrap_or(TerminationReason::Stopped);
        tracing::info!(
            run_id = %self.run_id,
            turn = run.turn,
            status = %run.status,
            reason = %reason,
            "Run finished"
        );
        self.status_tx.send_replace(run.status);
        self.events.publish(RunEvent::Finished {
            run_id: self.run_id,
            status: run.status,
            reason,
            results: run.results.clone(),
        });
        self.queue_save(run, true);
    }

    /// One lockstep tick: decide concurrently, commit in agent order
    async fn lockstep_tick(self: &Arc<Self>) -> Result<StepOutcome> {
        let (epoch, plans) = {
            let run = self.run.lock().await;
            if run.status != RunStatus::Running {
                return Ok(StepOutcome::Discarded);
            }
            let mut plans = Vec::with_capacity(run.agents.len());
            for index in 0..run.agents.len() {
                plans.push(plan_turn(&run, index)?);
            }
            (run.epoch, plans)
        };

        let count = plans.len();
        let mut decisions: Vec<Option<Direction>> = vec![None; count];
        let mut asked = vec![false; count];
        let mut pending = JoinSet::new();
        for (index, plan) in plans.into_iter().enumerate() {
            if let TurnPlan::Decide(observation) = plan {
                asked[index] = true;
                let gateway = Arc::clone(&self.gateway);
                pending.spawn(async move { (index, gateway.decide(&observation).await) });
            }
        }
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((index, decision)) => decisions[index] = Some(decision.direction),
                Err(err) => {
                    tracing::error!(run_id = %self.run_id, error = %err, "Decision task failed");
                }
            }
        }

        let mut run = self.run.lock().await;
        if run.status != RunStatus::Running || run.epoch != epoch {
            tracing::debug!(run_id = %self.run_id, "Discarding tick decided in a previous epoch");
            return Ok(StepOutcome::Discarded);
        }
        run.turn += 1;

        let mut events = Vec::new();
        let mut reason = None;
        for index in 0..count {
            // asked but never answered: the decision task died
            if asked[index] && decisions[index].is_none() {
                tracing::warn!(run_id = %run.id, turn = run.turn, index, "Agent turn skipped");
                continue;
            }
            match commit_turn(&mut run, index, decisions[index], self.config.proximity_radius) {
                Ok(report) => events.extend(report.events),
                Err(err) => {
                    tracing::warn!(run_id = %run.id, turn = run.turn, index, error = %err, "Agent turn skipped");
                    continue;
                }
            }
            // the turn cap is checked once the whole tick is in
            reason = check_termination(&run, None);
            if reason.is_some() {
                break;
            }
        }
        let recorded = self.record_turn(&mut run, events, reason)?;
        Ok(self.after_commit(recorded))
    }

    /// One turn of one agent in the per-agent discipline
    async fn agent_turn(self: &Arc<Self>, index: usize) -> Result<StepOutcome> {
        let (epoch, plan) = {
            let run = self.run.lock().await;
            if run.status != RunStatus::Running {
                return Ok(StepOutcome::Discarded);
            }
            (run.epoch, plan_turn(&run, index)?)
        };

        let direction = match plan {
            TurnPlan::Skip => return Ok(StepOutcome::AgentDead),
            TurnPlan::Collect => None,
            TurnPlan::Decide(observation) => Some(self.gateway.decide(&observation).await.direction),
        };

        let mut run = self.run.lock().await;
        if run.status != RunStatus::Running || run.epoch != epoch {
            tracing::debug!(run_id = %self.run_id, index, "Discarding decision from a previous epoch");
            return Ok(StepOutcome::Discarded);
        }
        run.turn += 1;
        let report = match commit_turn(&mut run, index, direction, self.config.proximity_radius) {
            Ok(report) => report,
            Err(err) => {
                run.turn -= 1;
                return Err(err);
            }
        };
        let recorded = self.record_turn(&mut run, report.events, None)?;
        Ok(self.after_commit(recorded))
    }
}

/// Block until the run is running. False once it is terminal.
async fn wait_until_running(rx: &mut watch::Receiver<RunStatus>) -> bool {
    loop {
        let status = *rx.borrow_and_update();
        if status == RunStatus::Running {
            return true;
        }
        if status.is_terminal() {
            return false;
        }
        if rx.changed().await.is_err() {
            return false;
        }
    }
}

async fn lockstep_loop(shared: Arc<Shared>) {
    let mut status_rx = shared.status_tx.subscribe();
    loop {
        if !wait_until_running(&mut status_rx).await {
            break;
        }
        match shared.lockstep_tick().await {
            Ok(StepOutcome::Finished(_)) => break,
            Ok(_) => {}
            Err(err) => tracing::warn!(run_id = %shared.run_id, error = %err, "Tick failed"),
        }
        tokio::select! {
            _ = tokio::time::sleep(shared.tick_interval) => {}
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

async fn agent_loop(shared: Arc<Shared>, index: usize, interval: Duration) {
    let mut status_rx = shared.status_tx.subscribe();
    loop {
        if !wait_until_running(&mut status_rx).await {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }
        match shared.agent_turn(index).await {
            Ok(StepOutcome::Finished(_)) | Ok(StepOutcome::AgentDead) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(run_id = %shared.run_id, index, error = %err, "Agent turn skipped");
            }
        }
    }
}

/// Waits on the driver tasks; a panic puts the run into `error`
async fn supervise(shared: Arc<Shared>, mut tasks: JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            if !err.is_panic() {
                continue;
            }
            tracing::error!(run_id = %shared.run_id, error = %err, "Driver task panicked");
            let mut run = shared.run.lock().await;
            if !run.status.is_terminal() {
                run.fail("driver task panicked");
                shared.on_finished(run.clone());
            }
            drop(run);
            tasks.abort_all();
        }
    }
}

async fn persist_worker(store: Arc<dyn RunStore>, mut rx: mpsc::UnboundedReceiver<Run>) {
    while let Some(run) = rx.recv().await {
        save_logged(store.as_ref(), &run).await;
    }
}

/// Owns one run and the tasks that drive it
pub struct Scheduler {
    shared: Arc<Shared>,
    driver: StdMutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(run: Run, gateway: DecisionGateway, config: EngineConfig) -> Self {
        Self::build(run, gateway, config, None)
    }

    pub fn with_store(run: Run, gateway: DecisionGateway, config: EngineConfig, store: Arc<dyn RunStore>) -> Self {
        Self::build(run, gateway, config, Some(store))
    }

    /// Create the run and its gateway from configuration
    pub fn from_config(config: &RunConfig, provider: Arc<dyn DecisionProvider>) -> Result<Self> {
        let run = Run::new(config)?;
        let gateway = DecisionGateway::new(
            provider,
            config.engine.decision_timeout(),
            config.engine.rng_seed,
        );
        Ok(Self::new(run, gateway, config.engine.clone()))
    }

    fn build(run: Run, gateway: DecisionGateway, config: EngineConfig, store: Option<Arc<dyn RunStore>>) -> Self {
        let (status_tx, _) = watch::channel(run.status);
        let events = EventPublisher::new(config.event_channel_capacity, config.publish_min_interval());
        let shared = Shared {
            run_id: run.id,
            tick_interval: Duration::from_millis(run.ruleset.turn_duration_ms),
            run: Mutex::new(run),
            gateway: Arc::new(gateway),
            config,
            status_tx,
            events,
            store,
            persist_tx: StdMutex::new(None),
            persist_worker: StdMutex::new(None),
        };
        Self {
            shared: Arc::new(shared),
            driver: StdMutex::new(None),
        }
    }

    pub fn id(&self) -> RunId {
        self.shared.run_id
    }

    pub fn status(&self) -> RunStatus {
        *self.shared.status_tx.borrow()
    }

    pub fn gateway(&self) -> &DecisionGateway {
        &self.shared.gateway
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.shared.events.subscribe()
    }

    /// Deep copy of the run
    pub async fn current_state(&self) -> Run {
        self.shared.run.lock().await.clone()
    }

    pub async fn history(&self) -> Vec<TurnSnapshot> {
        self.shared.run.lock().await.history.clone()
    }

    async fn begin(&self) -> Result<Discipline> {
        let discipline = {
            let mut run = self.shared.run.lock().await;
            run.begin()?;
            tracing::info!(
                run_id = %run.id,
                agents = run.agents.len(),
                resources = run.grid.remaining_resource_count(),
                ruleset = %run.ruleset.name,
                discipline = ?run.discipline,
                "Run started"
            );
            run.discipline
        };

        if let Some(store) = &self.shared.store {
            let (tx, rx) = mpsc::unbounded_channel();
            *self
                .shared
                .persist_tx
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tx);
            let worker = tokio::spawn(persist_worker(Arc::clone(store), rx));
            *self
                .shared
                .persist_worker
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(worker);
        }

        self.shared.set_status(RunStatus::Running);
        Ok(discipline)
    }

    /// idle -> running, and spawn the driver for the run's discipline
    pub async fn start(&self) -> Result<()> {
        let discipline = self.begin().await?;

        let mut tasks = JoinSet::new();
        match discipline {
            Discipline::Lockstep => {
                tasks.spawn(lockstep_loop(Arc::clone(&self.shared)));
            }
            Discipline::PerAgent => {
                let intervals: Vec<Duration> = {
                    let run = self.shared.run.lock().await;
                    run.agents.iter().map(|a| a.think_interval()).collect()
                };
                for (index, interval) in intervals.into_iter().enumerate() {
                    tasks.spawn(agent_loop(Arc::clone(&self.shared), index, interval));
                }
            }
        }

        let handle = tokio::spawn(supervise(Arc::clone(&self.shared), tasks));
        *self.driver.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        Ok(())
    }

    /// idle -> running without a driver; the caller advances with [`step`](Self::step)
    pub async fn start_stepped(&self) -> Result<()> {
        self.begin().await.map(|_| ())
    }

    /// Run one lockstep tick now
    pub async fn step(&self) -> Result<StepOutcome> {
        self.shared.lockstep_tick().await
    }

    /// running -> paused. Decisions in flight are discarded.
    pub async fn pause(&self) -> Result<()> {
        let mut run = self.shared.run.lock().await;
        run.pause()?;
        tracing::info!(run_id = %run.id, turn = run.turn, "Run paused");
        self.shared.set_status(RunStatus::Paused);
        Ok(())
    }

    /// paused -> running, state untouched
    pub async fn resume(&self) -> Result<()> {
        let mut run = self.shared.run.lock().await;
        run.resume()?;
        tracing::info!(run_id = %run.id, turn = run.turn, "Run resumed");
        self.shared.set_status(RunStatus::Running);
        Ok(())
    }

    /// Any non-terminal state -> completed
    pub async fn stop(&self) -> Result<()> {
        {
            let mut run = self.shared.run.lock().await;
            run.finish(TerminationReason::Stopped)?;
            self.shared.on_finished(run.clone());
        }
        if let Some(driver) = self
            .driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            driver.abort();
        }
        Ok(())
    }

    /// Wait for a terminal status
    pub async fn wait_finished(&self) -> RunStatus {
        let mut rx = self.shared.status_tx.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if status.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return self.status();
            }
        }
    }

    /// Wait until every queued save has been written. Only waits once the
    /// run is terminal; before that it returns immediately.
    pub async fn flush(&self) {
        if !self.status().is_terminal() {
            return;
        }
        let worker = self
            .shared
            .persist_worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                tracing::warn!(run_id = %self.shared.run_id, error = %err, "Persistence worker ended abnormally");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(driver) = self
            .driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            driver.abort();
        }
    }
}
