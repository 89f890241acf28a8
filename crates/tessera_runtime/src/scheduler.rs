//! Work-stealing scheduler.
//!
//! Each worker owns a deque. Work submitted from a worker that has only just
//! started its current item goes to that worker's deque; work from anywhere
//! else goes to a bounded global queue. An idle worker pops its own deque
//! from the back, then steals from the front of a random peer's deque, then
//! reads the global queue. Every `global_drain_interval` ticks the global
//! queue is read first so it cannot starve.
//!
//! ```text
//!   submit (worker, responsive) ──► own deque ◄── steal (peers)
//!   submit (otherwise)          ──► global queue ──► any worker
//! ```
//!
//! The [monitor](crate::monitor) calls [`Spawner::rebalance`] on every tick.
//! Workers stuck on one item for longer than `blocked_threshold` are marked
//! blocked and their deques donated to the global queue. If too few workers
//! remain available a parked worker is woken, or a new one started, up to
//! `max_extra_workers`. A blocked worker that finishes while more than the
//! configured number of workers are active parks itself.

use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::{Condvar, Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessera_foundation::{Error, Result, SchedulerConfig};
use tracing::{debug, error, info_span, trace, warn};

use crate::semaphore::Semaphore;

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// (scheduler id, worker index) of the worker running on this thread.
    static CURRENT_WORKER: Cell<Option<(u64, usize)>> = const { Cell::new(None) };
}

/// How long a parked worker sleeps between shutdown checks.
const PARK_POLL: Duration = Duration::from_millis(50);

type Handler<T> = dyn Fn(T, &Spawner<T>) + Send + Sync;

// =============================================================================
// Worker state
// =============================================================================

struct WorkerSlot<T> {
    index: usize,
    queue: Mutex<VecDeque<T>>,
    /// Nanoseconds since the scheduler epoch when the current item started,
    /// plus one; zero while idle.
    started: AtomicU64,
    blocked: AtomicBool,
    parked: AtomicBool,
}

impl<T> WorkerSlot<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            queue: Mutex::new(VecDeque::new()),
            started: AtomicU64::new(0),
            blocked: AtomicBool::new(false),
            parked: AtomicBool::new(false),
        }
    }

    fn busy_for(&self, now: u64) -> Option<Duration> {
        match self.started.load(Ordering::SeqCst) {
            0 => None,
            started => Some(Duration::from_nanos(now.saturating_sub(started - 1))),
        }
    }
}

struct Shared<T> {
    id: u64,
    config: SchedulerConfig,
    epoch: Instant,
    handler: Box<Handler<T>>,
    workers: RwLock<Vec<Arc<WorkerSlot<T>>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    global_tx: Sender<T>,
    global_rx: Receiver<T>,
    pending: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
    parking: Semaphore,
    starved: AtomicBool,
    shutdown: AtomicBool,
}

impl<T: Send + 'static> Shared<T> {
    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn current_worker(&self) -> Option<usize> {
        CURRENT_WORKER
            .with(Cell::get)
            .and_then(|(id, index)| (id == self.id).then_some(index))
    }

    fn worker(&self, index: usize) -> Option<Arc<WorkerSlot<T>>> {
        self.workers.read().get(index).cloned()
    }

    fn finish_one(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) {
            let _guard = self.idle_lock.lock();
            self.idle.notify_all();
        }
    }

    fn active_workers(&self) -> usize {
        self.workers
            .read()
            .iter()
            .filter(|w| !w.parked.load(Ordering::SeqCst))
            .count()
    }

    /// Moves a worker's queued items to the global queue, as far as it has room.
    fn donate(&self, slot: &WorkerSlot<T>) {
        let mut queue = slot.queue.lock();
        let mut moved = 0usize;
        while let Some(item) = queue.pop_front() {
            match self.global_tx.try_send(item) {
                Ok(()) => moved += 1,
                Err(TrySendError::Full(item) | TrySendError::Disconnected(item)) => {
                    queue.push_front(item);
                    break;
                }
            }
        }
        if moved > 0 {
            debug!(worker = slot.index, moved, "donated queue to global");
        }
    }

    fn steal(&self, own: usize, rng: &mut ChaCha8Rng) -> Option<T> {
        let workers = self.workers.read();
        if workers.len() < 2 {
            return None;
        }
        let mut victim = rng.gen_range(0..workers.len() - 1);
        if victim >= own {
            victim += 1;
        }
        let item = workers[victim].queue.lock().pop_front();
        if item.is_some() {
            trace!(worker = own, victim, "stole item");
        }
        item
    }
}

// =============================================================================
// Spawner
// =============================================================================

/// A cloneable handle for submitting work to a [`Scheduler`].
pub struct Spawner<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Spawner<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Spawner<T> {
    /// Queues an item.
    ///
    /// Dropped with a warning once the scheduler is shutting down.
    pub fn submit(&self, item: T) {
        let shared = &self.shared;
        if shared.shutdown.load(Ordering::SeqCst) {
            warn!("work submitted after shutdown was dropped");
            return;
        }
        shared.pending.fetch_add(1, Ordering::SeqCst);

        if let Some(slot) = shared.current_worker().and_then(|w| shared.worker(w)) {
            let responsive = slot
                .busy_for(shared.now())
                .is_none_or(|busy| busy < shared.config.responsive_threshold);
            if responsive {
                slot.queue.lock().push_back(item);
                return;
            }
            if let Err(TrySendError::Full(item) | TrySendError::Disconnected(item)) =
                shared.global_tx.try_send(item)
            {
                slot.queue.lock().push_back(item);
            }
            return;
        }

        if shared.global_tx.send(item).is_err() {
            shared.finish_one();
        }
    }

    /// Queues an item without blocking.
    ///
    /// On a worker thread this is [`submit`](Self::submit). Elsewhere the
    /// item is handed back if the global queue is full or the scheduler is
    /// shutting down.
    pub fn try_submit(&self, item: T) -> std::result::Result<(), T> {
        let shared = &self.shared;
        if shared.shutdown.load(Ordering::SeqCst) {
            return Err(item);
        }
        if shared.current_worker().is_some() {
            self.submit(item);
            return Ok(());
        }
        shared.pending.fetch_add(1, Ordering::SeqCst);
        match shared.global_tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item) | TrySendError::Disconnected(item)) => {
                shared.finish_one();
                Err(item)
            }
        }
    }

    /// Index of the worker running on this thread, if any.
    #[must_use]
    pub fn current_worker(&self) -> Option<usize> {
        self.shared.current_worker()
    }

    /// Items submitted but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// True once shutdown has begun.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Marks long-running workers blocked and makes sure enough workers are
    /// available to keep the queues moving.
    pub fn rebalance(&self) {
        let shared = &self.shared;
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let now = shared.now();
        let workers: Vec<Arc<WorkerSlot<T>>> = shared.workers.read().clone();

        let mut available = 0usize;
        let mut parked = 0usize;
        for slot in &workers {
            if slot.parked.load(Ordering::SeqCst) {
                parked += 1;
                continue;
            }
            match slot.busy_for(now) {
                Some(busy) if busy >= shared.config.blocked_threshold => {
                    if !slot.blocked.swap(true, Ordering::SeqCst) {
                        debug!(worker = slot.index, ?busy, "worker blocked");
                    }
                    shared.donate(slot);
                }
                _ => available += 1,
            }
        }

        let wanted = shared
            .config
            .min_available_workers
            .min(shared.config.workers.max(1));
        if available >= wanted {
            shared.starved.store(false, Ordering::SeqCst);
            return;
        }
        if parked > 0 {
            trace!(available, parked, "waking parked worker");
            shared.parking.post();
        } else if workers.len() < shared.config.max_workers() {
            if let Err(err) = spawn_worker(shared) {
                warn!(%err, "could not start extra worker");
            }
        } else if !shared.starved.swap(true, Ordering::SeqCst) {
            warn!(
                available,
                workers = workers.len(),
                "all workers busy and extra worker limit reached"
            );
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// A pool of worker threads running a single handler over submitted items.
pub struct Scheduler<T: Send + 'static> {
    spawner: Spawner<T>,
}

impl<T: Send + 'static> Scheduler<T> {
    /// Starts `config.workers` workers running `handler`.
    ///
    /// The handler receives a [`Spawner`] for submitting follow-up work.
    /// A panicking handler is logged and the worker carries on.
    pub fn start<F>(config: SchedulerConfig, handler: F) -> Result<Self>
    where
        F: Fn(T, &Spawner<T>) + Send + Sync + 'static,
    {
        let (global_tx, global_rx) = bounded(config.global_queue_capacity.max(1));
        let workers = config.workers.max(1);
        let shared = Arc::new(Shared {
            id: NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed),
            config,
            epoch: Instant::now(),
            handler: Box::new(handler),
            workers: RwLock::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
            global_tx,
            global_rx,
            pending: AtomicUsize::new(0),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
            parking: Semaphore::new(),
            starved: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        });

        let scheduler = Self {
            spawner: Spawner {
                shared: Arc::clone(&shared),
            },
        };
        for _ in 0..workers {
            spawn_worker(&shared)?;
        }
        Ok(scheduler)
    }

    /// A handle for submitting work.
    #[must_use]
    pub fn spawner(&self) -> &Spawner<T> {
        &self.spawner
    }

    /// Queues an item.
    pub fn submit(&self, item: T) {
        self.spawner.submit(item);
    }

    /// Number of workers started, parked ones included.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.spawner.shared.workers.read().len()
    }

    /// Number of workers not parked.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.spawner.shared.active_workers()
    }

    /// Items submitted but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.spawner.pending()
    }

    /// Blocks until no work is pending or `timeout` elapses.
    ///
    /// Returns true if the scheduler went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let shared = &self.spawner.shared;
        let deadline = Instant::now() + timeout;
        let mut guard = shared.idle_lock.lock();
        while shared.pending.load(Ordering::SeqCst) > 0 {
            if shared.idle.wait_until(&mut guard, deadline).timed_out() {
                return shared.pending.load(Ordering::SeqCst) == 0;
            }
        }
        true
    }

    /// Stops every worker and waits for them to exit.
    ///
    /// Items still queued are dropped.
    pub fn shutdown(&self) {
        let shared = &self.spawner.shared;
        if shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let workers = shared.workers.read().len();
        shared.parking.post_many(workers);

        let current = thread::current().id();
        let threads: Vec<JoinHandle<()>> = std::mem::take(&mut *shared.threads.lock());
        for handle in threads {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread panicked outside a work item");
            }
        }
        while shared.global_rx.try_recv().is_ok() {}
        for slot in shared.workers.read().iter() {
            slot.queue.lock().clear();
        }
        shared.pending.store(0, Ordering::SeqCst);
        let _guard = shared.idle_lock.lock();
        shared.idle.notify_all();
        debug!(workers, "scheduler stopped");
    }
}

impl<T: Send + 'static> Drop for Scheduler<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker<T: Send + 'static>(shared: &Arc<Shared<T>>) -> Result<()> {
    let slot = {
        let mut workers = shared.workers.write();
        let slot = Arc::new(WorkerSlot::new(workers.len()));
        workers.push(Arc::clone(&slot));
        slot
    };
    let index = slot.index;
    let thread_shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("tessera-worker-{index}"))
        .spawn(move || {
            let span = info_span!("worker", index);
            let _enter = span.enter();
            worker_loop(&thread_shared, &slot);
        })
        .map_err(|err| Error::internal(format!("failed to spawn worker {index}: {err}")))?;
    shared.threads.lock().push(handle);
    debug!(worker = index, "worker started");
    Ok(())
}

fn worker_loop<T: Send + 'static>(shared: &Arc<Shared<T>>, slot: &WorkerSlot<T>) {
    CURRENT_WORKER.with(|w| w.set(Some((shared.id, slot.index))));
    let spawner = Spawner {
        shared: Arc::clone(shared),
    };
    let seed = shared.config.seed ^ (slot.index as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let drain_interval = u64::from(shared.config.global_drain_interval.max(1));
    let mut tick: u64 = 0;

    while !shared.shutdown.load(Ordering::SeqCst) {
        tick += 1;
        let item = if tick % drain_interval == 0 {
            shared
                .global_rx
                .try_recv()
                .ok()
                .or_else(|| slot.queue.lock().pop_back())
        } else {
            slot.queue
                .lock()
                .pop_back()
                .or_else(|| shared.steal(slot.index, &mut rng))
                .or_else(|| shared.global_rx.try_recv().ok())
        };

        let item = match item {
            Some(item) => item,
            None => match shared.global_rx.recv_timeout(shared.config.idle_wait) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => continue,
            },
        };

        run_item(shared, slot, &spawner, item);

        if slot.blocked.swap(false, Ordering::SeqCst)
            && shared.active_workers() > shared.config.workers.max(1)
        {
            park(shared, slot);
        }
    }
    CURRENT_WORKER.with(|w| w.set(None));
    trace!(worker = slot.index, "worker exiting");
}

fn run_item<T: Send + 'static>(
    shared: &Shared<T>,
    slot: &WorkerSlot<T>,
    spawner: &Spawner<T>,
    item: T,
) {
    slot.started.store(shared.now() + 1, Ordering::SeqCst);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (shared.handler)(item, spawner)));
    slot.started.store(0, Ordering::SeqCst);
    if outcome.is_err() {
        error!(worker = slot.index, "work item panicked");
    }
    shared.finish_one();
}

fn park<T: Send + 'static>(shared: &Shared<T>, slot: &WorkerSlot<T>) {
    slot.parked.store(true, Ordering::SeqCst);
    shared.donate(slot);
    debug!(worker = slot.index, "worker parked");
    while !shared.shutdown.load(Ordering::SeqCst) {
        if shared.parking.wait_timeout(PARK_POLL) {
            break;
        }
    }
    slot.parked.store(false, Ordering::SeqCst);
    debug!(worker = slot.index, "worker resumed");
}
