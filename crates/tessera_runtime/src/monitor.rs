//! The monitor thread.
//!
//! Wakes every `monitor_tick`, rebalances the scheduler's workers, and runs
//! the periodic hooks (timed removals, the clock hold).

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tessera_foundation::{Error, Result};
use tracing::{debug, error, info_span};

use crate::scheduler::Spawner;

/// A callback run on every monitor tick with the tick number.
pub type TickHook = Box<dyn Fn(u64) + Send + 'static>;

struct Stop {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Handle to a running monitor thread. Stops the thread when dropped.
pub struct Monitor {
    stop: Arc<Stop>,
    thread: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Starts the monitor for `spawner`'s scheduler.
    pub fn start<T: Send + 'static>(
        spawner: Spawner<T>,
        tick: Duration,
        hooks: Vec<TickHook>,
    ) -> Result<Self> {
        let stop = Arc::new(Stop {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("tessera-monitor".to_string())
            .spawn(move || {
                let span = info_span!("monitor");
                let _enter = span.enter();
                run(&thread_stop, &spawner, tick, &hooks);
            })
            .map_err(|err| Error::internal(format!("failed to spawn monitor: {err}")))?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stops the monitor and waits for it to exit.
    pub fn stop(&mut self) {
        *self.stop.stopped.lock() = true;
        self.stop.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("monitor thread panicked");
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<T: Send + 'static>(stop: &Stop, spawner: &Spawner<T>, tick: Duration, hooks: &[TickHook]) {
    debug!(?tick, hooks = hooks.len(), "monitor started");
    let mut count: u64 = 0;
    loop {
        {
            let mut stopped = stop.stopped.lock();
            if !*stopped {
                let _ = stop.wake.wait_for(&mut stopped, tick);
            }
            if *stopped || spawner.is_shutdown() {
                break;
            }
        }
        count += 1;
        spawner.rebalance();
        for hook in hooks {
            hook(count);
        }
    }
    debug!(ticks = count, "monitor stopped");
}
