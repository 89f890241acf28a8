//! The running system: a database, a worker pool executing its work items,
//! and a monitor.
//!
//! [`Handle`] is the API rule bodies and host code use. Operations that
//! change the database and may trigger rules are queued as work items;
//! reads and holds are answered directly.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tessera_engine::{Activation, Db, QueryResult, RuleKind, SubscribeFiring, WhenFiring, WorkItem};
use tessera_foundation::{AnyRef, Clause, Error, MatchRef, Result, StatementRef};
use tessera_storage::Destructor;
use tracing::{debug, error, trace, warn};

use crate::config::RuntimeConfig;
use crate::evaluator::{EvalOutcome, Evaluator, Firing};
use crate::monitor::{Monitor, TickHook};
use crate::scheduler::{Scheduler, Spawner};
use crate::sustain::RemoveLater;

/// Hold key used by the monitor's clock.
pub const CLOCK_KEY: &str = "clock-time";

thread_local! {
    static CURRENT_MATCH: Cell<Option<MatchRef>> = const { Cell::new(None) };
}

/// The match whose body is running on this thread, if any.
#[must_use]
pub fn current_match_ref() -> Option<MatchRef> {
    CURRENT_MATCH.with(Cell::get)
}

/// Restores the previous current match when dropped.
struct CurrentMatch(Option<MatchRef>);

impl CurrentMatch {
    fn enter(m: Option<MatchRef>) -> Self {
        Self(CURRENT_MATCH.with(|c| c.replace(m)))
    }
}

impl Drop for CurrentMatch {
    fn drop(&mut self) {
        CURRENT_MATCH.with(|c| c.set(self.0));
    }
}

// =============================================================================
// Core
// =============================================================================

struct Core {
    db: Db,
    evaluator: Box<dyn Evaluator>,
    remove_later: RemoveLater,
}

impl Core {
    fn execute(self: &Arc<Self>, item: WorkItem, spawner: &Spawner<WorkItem>) {
        let op = item.op();
        trace!(?item, "executing");
        let result = match item {
            WorkItem::Assert(clause) => self.db.assert(&clause).map(|(_, reactions)| reactions),
            WorkItem::Retract(pattern) => self.db.retract(&pattern),
            WorkItem::Hold {
                key,
                version,
                clause,
                destructor,
            } => self
                .db
                .hold(&key, version, &clause, destructor)
                .map(|receipt| receipt.reactions),
            WorkItem::Say { parent, clause } => self
                .db
                .say(parent, &clause)
                .map(|said| said.map(|(_, reactions)| reactions).unwrap_or_default()),
            WorkItem::RunWhen(firing) => self.run_when(&firing, spawner).map(|()| Vec::new()),
            WorkItem::RunSubscribe(firing) => {
                self.run_subscribe(&firing, spawner).map(|()| Vec::new())
            }
            WorkItem::RemoveParent(r) => Ok(self.db.remove_parent(r)),
            WorkItem::Callback(callback) => {
                callback();
                Ok(Vec::new())
            }
        };

        match result {
            Ok(reactions) => {
                for reaction in reactions {
                    spawner.submit(reaction);
                }
            }
            Err(err) if err.is_fatal() => {
                error!(op, %err, "fatal error, aborting");
                std::process::abort();
            }
            Err(err) => warn!(op, %err, "work item failed"),
        }
    }

    fn run_when(self: &Arc<Self>, firing: &WhenFiring, spawner: &Spawner<WorkItem>) -> Result<()> {
        match self.db.begin_when(firing)? {
            Some(activation) => {
                self.run_body(RuleKind::When, &activation, spawner);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn run_subscribe(
        self: &Arc<Self>,
        firing: &SubscribeFiring,
        spawner: &Spawner<WorkItem>,
    ) -> Result<()> {
        if let Some(activation) = self.db.begin_subscribe(firing)? {
            self.run_body(RuleKind::Subscribe, &activation, spawner);
        }
        Ok(())
    }

    fn run_body(self: &Arc<Self>, kind: RuleKind, activation: &Activation<'_>, spawner: &Spawner<WorkItem>) {
        if activation.cancel_token().is_cancelled() {
            debug!(rule = %activation.rule, "firing cancelled before it started");
            return;
        }
        activation.set_worker(spawner.current_worker());
        let firing = Firing {
            kind,
            rule: activation.rule,
            body: &activation.body,
            environment: &activation.environment,
            bindings: &activation.bindings,
            clause: activation.clause.as_ref(),
            match_ref: activation.match_ref(),
            cancel: activation.cancel_token(),
        };
        let handle = Handle {
            core: Arc::clone(self),
            spawner: spawner.clone(),
        };

        let _current = CurrentMatch::enter(firing.match_ref);
        match self.evaluator.evaluate(&firing, &handle) {
            EvalOutcome::Completed => trace!(rule = %firing.rule, "body completed"),
            EvalOutcome::Cancelled => debug!(rule = %firing.rule, "body cancelled"),
            EvalOutcome::Failed(message) => {
                warn!(rule = %firing.rule, body = %firing.body, %message, "rule body failed");
            }
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// The operations available to rule bodies and host code.
#[derive(Clone)]
pub struct Handle {
    core: Arc<Core>,
    spawner: Spawner<WorkItem>,
}

impl Handle {
    /// The underlying database.
    #[must_use]
    pub fn db(&self) -> &Db {
        &self.core.db
    }

    /// Queues an arbitrary work item.
    pub fn submit(&self, item: WorkItem) {
        self.spawner.submit(item);
    }

    /// Queues `clause` as a premise.
    pub fn assert(&self, clause: impl Into<Clause>) {
        self.submit(WorkItem::Assert(clause.into()));
    }

    /// Queues withdrawal of the assertions behind every statement matching
    /// `pattern`. Statements that matches or holds sustain stay.
    pub fn retract(&self, pattern: impl Into<Clause>) {
        self.submit(WorkItem::Retract(pattern.into()));
    }

    /// Queues `clause` sustained by the match running on this thread.
    ///
    /// Outside a rule body this is the same as [`assert`](Self::assert).
    pub fn say(&self, clause: impl Into<Clause>) {
        let clause = clause.into();
        match current_match_ref() {
            Some(parent) => self.submit(WorkItem::Say { parent, clause }),
            None => self.submit(WorkItem::Assert(clause)),
        }
    }

    /// Queues `clause` sustained by `parent`.
    pub fn say_from(&self, parent: MatchRef, clause: impl Into<Clause>) {
        self.submit(WorkItem::Say {
            parent,
            clause: clause.into(),
        });
    }

    /// Installs `clause` under `key` if `version` is newer than the stored
    /// one, and returns the statement held afterwards.
    ///
    /// The new statement's reactions are queued before the removal of the
    /// statement it replaced. `destructor` runs once the held statement is
    /// removed. A negative version means one past the stored version.
    /// Fails with `Shutdown` once the runtime has stopped.
    pub fn hold(
        &self,
        key: &str,
        version: i64,
        clause: impl Into<Clause>,
        destructor: Option<Destructor>,
    ) -> Result<StatementRef> {
        if self.spawner.is_shutdown() {
            return Err(Error::shutdown());
        }
        let receipt = self.core.db.hold(key, version, &clause.into(), destructor)?;
        for reaction in receipt.reactions {
            self.submit(reaction);
        }
        Ok(receipt.statement)
    }

    /// Queues the `subscribe` rules matching `event`. Nothing is stored.
    pub fn notify(&self, event: impl Into<Clause>) {
        for item in self.core.db.notify(&event.into()) {
            self.submit(item);
        }
    }

    /// Returns the statements matching `pattern`.
    ///
    /// With `atomic_only`, output of bodies that are still running is left out.
    pub fn query(&self, pattern: &Clause, atomic_only: bool) -> Result<Vec<QueryResult>> {
        self.core.db.query(pattern, atomic_only)
    }

    /// Keeps an entity alive until [`release`](Self::release).
    pub fn acquire(&self, r: impl Into<AnyRef>) -> Result<()> {
        self.core.db.pin(r.into())
    }

    /// Drops an acquisition taken with [`acquire`](Self::acquire).
    pub fn release(&self, r: impl Into<AnyRef>) -> Result<()> {
        self.core.db.unpin(r.into())
    }

    /// Removes one parent from `statement` once `delay` has passed.
    ///
    /// Fails with `Shutdown` once the runtime has stopped.
    pub fn remove_later(&self, statement: StatementRef, delay: Duration) -> Result<()> {
        if self.spawner.is_shutdown() {
            return Err(Error::shutdown());
        }
        self.core.remove_later.schedule(statement, delay)
    }

    /// The match whose body is running on this thread, if any.
    #[must_use]
    pub fn current_match_ref(&self) -> Option<MatchRef> {
        current_match_ref()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("db", &self.core.db)
            .field("pending", &self.spawner.pending())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// A started system. Dereferences to its [`Handle`].
///
/// Dropping the runtime stops the monitor and the workers.
pub struct Runtime {
    handle: Handle,
    scheduler: Scheduler<WorkItem>,
    monitor: Option<Monitor>,
}

impl Runtime {
    /// Starts the workers and the monitor.
    pub fn start(config: RuntimeConfig, evaluator: impl Evaluator) -> Result<Self> {
        let core = Arc::new(Core {
            db: Db::new(config.db.clone()),
            evaluator: Box::new(evaluator),
            remove_later: RemoveLater::new(config.remove_later_capacity),
        });

        let worker_core = Arc::clone(&core);
        let scheduler = Scheduler::start(
            config.scheduler.clone(),
            move |item: WorkItem, spawner: &Spawner<WorkItem>| worker_core.execute(item, spawner),
        )?;
        let spawner = scheduler.spawner().clone();

        let mut hooks: Vec<TickHook> = vec![remove_later_hook(Arc::clone(&core), spawner.clone())];
        if config.clock_hold {
            hooks.push(clock_hook(spawner.clone()));
        }
        let monitor = Monitor::start(spawner.clone(), config.scheduler.monitor_tick, hooks)?;

        debug!(
            workers = scheduler.worker_count(),
            clock_hold = config.clock_hold,
            "runtime started"
        );
        Ok(Self {
            handle: Handle { core, spawner },
            scheduler,
            monitor: Some(monitor),
        })
    }

    /// The handle shared with rule bodies.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Blocks until no work is pending or `timeout` elapses.
    ///
    /// Returns true if the runtime went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    /// Number of workers started, parked ones included.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.scheduler.worker_count()
    }

    /// Stops the monitor and the workers. Queued work is dropped.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
            self.scheduler.shutdown();
            debug!("runtime stopped");
        }
    }
}

impl Deref for Runtime {
    type Target = Handle;

    fn deref(&self) -> &Handle {
        &self.handle
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("handle", &self.handle)
            .field("workers", &self.scheduler.worker_count())
            .finish_non_exhaustive()
    }
}

fn remove_later_hook(core: Arc<Core>, spawner: Spawner<WorkItem>) -> TickHook {
    Box::new(move |tick| {
        core.remove_later.drain_due(Instant::now(), |statement| {
            let queued = spawner.try_submit(WorkItem::RemoveParent(statement)).is_ok();
            if !queued {
                debug!(tick, %statement, "queue full, timed removal deferred");
            }
            queued
        });
    })
}

fn clock_hook(spawner: Spawner<WorkItem>) -> TickHook {
    Box::new(move |tick| {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        let hold = WorkItem::Hold {
            key: CLOCK_KEY.to_string(),
            version: i64::try_from(tick).unwrap_or(i64::MAX),
            clause: Clause::parse(&format!("monitor claims the clock time is {seconds:.6}")),
            destructor: None,
        };
        if spawner.try_submit(hold).is_err() {
            debug!(tick, "queue full, clock hold skipped");
        }
    })
}
