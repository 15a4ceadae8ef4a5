//! Wall-clock scheduler backed by a timer thread.
//!
//! Schedule/cancel commands go in over one channel, fired handles come back
//! over another. The host drains `fired()` and hands each handle to the
//! engine, so engine state never leaves the host thread.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use solitone_core::{Scheduler, TimerHandle};
use thiserror::Error;
use tracing::{debug, warn};

/// Wait used when nothing is pending
const IDLE_WAIT: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Failed to spawn timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

enum TimerCommand {
    Schedule(TimerHandle, Instant),
    Cancel(TimerHandle),
    Shutdown,
}

pub struct TimerThread {
    commands: Sender<TimerCommand>,
    fired: Receiver<TimerHandle>,
    next_id: u64,
    worker: Option<JoinHandle<()>>,
}

impl TimerThread {
    pub fn spawn() -> Result<Self, TimerError> {
        let (cmd_tx, cmd_rx) = unbounded();
        let (fired_tx, fired_rx) = unbounded();
        let worker = thread::Builder::new()
            .name("solitone-timer".into())
            .spawn(move || run_timer(cmd_rx, fired_tx))?;
        debug!("timer thread started");
        Ok(Self {
            commands: cmd_tx,
            fired: fired_rx,
            next_id: 0,
            worker: Some(worker),
        })
    }

    /// Handles whose deadline passed, in firing order
    pub fn fired(&self) -> &Receiver<TimerHandle> {
        &self.fired
    }

    /// Block up to `timeout` for the next fired handle
    pub fn wait(&self, timeout: Duration) -> Option<TimerHandle> {
        self.fired.recv_timeout(timeout).ok()
    }
}

impl Scheduler for TimerThread {
    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        if self.commands.send(TimerCommand::Schedule(handle, Instant::now() + delay)).is_err() {
            warn!(?handle, "timer thread gone, tick dropped");
        }
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let _ = self.commands.send(TimerCommand::Cancel(handle));
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        let _ = self.commands.send(TimerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_timer(commands: Receiver<TimerCommand>, fired: Sender<TimerHandle>) {
    let mut pending: Vec<(Instant, TimerHandle)> = Vec::new();
    loop {
        let now = Instant::now();
        pending.sort_by_key(|&(due, handle)| (due, handle));
        let split = pending.partition_point(|&(due, _)| due <= now);
        for (_, handle) in pending.drain(..split) {
            if fired.send(handle).is_err() {
                return;
            }
        }

        let wait = pending
            .first()
            .map(|&(due, _)| due.saturating_duration_since(now))
            .unwrap_or(IDLE_WAIT);

        match commands.recv_timeout(wait) {
            Ok(TimerCommand::Schedule(handle, due)) => pending.push((due, handle)),
            Ok(TimerCommand::Cancel(handle)) => pending.retain(|&(_, h)| h != handle),
            Ok(TimerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    debug!("timer thread stopped");
}
