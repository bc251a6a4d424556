//! Periodic task scheduler.
//!
//! Every periodic job (heartbeat, subscription) of a session is a tokio task
//! driven by a [`tokio::time::Interval`] and owned by one [`Scheduler`].
//! Each job gets a child of the scheduler's [`CancellationToken`], so a job
//! can be cancelled on its own and [`Scheduler::shutdown`] stops them all.
//!
//! A job runs one tick at a time: the next tick is not started until the
//! previous one has returned, and ticks missed meanwhile are skipped.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Whether a periodic job wants to keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

pub struct Scheduler {
    root: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Jobs stop when `root` (or any of its parents) is cancelled.
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Run `job` every `period`, first one `period` from now.
    ///
    /// Returns the job's own token; cancelling it stops only this job.
    pub fn every<F, Fut>(&self, period: Duration, mut job: F) -> CancellationToken
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Tick> + Send + 'static,
    {
        let token = self.root.child_token();
        let cancel = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if job().await == Tick::Stop {
                            break;
                        }
                    }
                }
            }
        });

        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        token
    }

    /// Live (not yet finished) jobs.
    pub fn active(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel every job and wait until each has returned.
    ///
    /// Once this resolves no job is running or will run again.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}
