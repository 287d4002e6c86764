// Countdown scheduler: the phase timer and the candidate decay timer.
//
// Timers are tokio tasks that only send `Tick`s back to the session loop;
// all countdown arithmetic happens in the session when a tick arrives. Each
// running timer is owned by exactly one `CountdownHandle`, and dropping the
// handle aborts the task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Counts down to the end of the current phase.
    Phase,
    /// Drives the candidate highlight fade.
    Decay,
}

/// One timer firing. `generation` identifies the timer instance so ticks
/// from a replaced timer can be told apart from current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub kind: TimerKind,
    pub generation: u64,
}

// ---------------------------------------------------------------------------
// CountdownHandle
// ---------------------------------------------------------------------------

/// Owner of one repeating timer task. Dropping it cancels the timer.
#[derive(Debug)]
pub struct CountdownHandle {
    task: JoinHandle<()>,
    generation: u64,
}

impl CountdownHandle {
    /// Spawn a timer that sends a `Tick` every `period`, starting one period
    /// from now.
    pub fn spawn(
        kind: TimerKind,
        period: Duration,
        generation: u64,
        tx: mpsc::Sender<Tick>,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(Tick { kind, generation }).await.is_err() {
                    break;
                }
            }
        });
        CountdownHandle { task, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Scheduler {
    tick_tx: mpsc::Sender<Tick>,
    phase_period: Duration,
    decay_period: Duration,
    phase: Option<CountdownHandle>,
    decay: Option<CountdownHandle>,
    /// Candidate-set size the decay timer was (re)started for.
    decay_len: usize,
    next_generation: u64,
}

impl Scheduler {
    pub fn new(tick_tx: mpsc::Sender<Tick>, phase_period: Duration, decay_period: Duration) -> Self {
        Scheduler {
            tick_tx,
            phase_period,
            decay_period,
            phase: None,
            decay: None,
            decay_len: 0,
            next_generation: 1,
        }
    }

    fn spawn(&mut self, kind: TimerKind, period: Duration) -> CountdownHandle {
        let generation = self.next_generation;
        self.next_generation += 1;
        debug!(?kind, generation, "timer started");
        CountdownHandle::spawn(kind, period, generation, self.tick_tx.clone())
    }

    /// Start (or restart) the phase countdown. Any previous phase timer is
    /// cancelled first.
    pub fn start_phase(&mut self) {
        self.phase = None;
        self.phase = Some(self.spawn(TimerKind::Phase, self.phase_period));
    }

    pub fn stop_phase(&mut self) {
        if let Some(handle) = self.phase.take() {
            debug!(generation = handle.generation(), "phase timer stopped");
        }
    }

    pub fn phase_running(&self) -> bool {
        self.phase.is_some()
    }

    /// Keep the decay timer in step with the candidate set.
    ///
    /// `total` is the size of the candidate set, `visible` how many of those
    /// are still on screen. The timer stops when either is zero and restarts
    /// whenever `total` differs from the size it was started for.
    pub fn sync_decay(&mut self, total: usize, visible: usize) {
        if total == 0 || visible == 0 {
            self.stop_decay();
            return;
        }
        if self.decay.is_none() || self.decay_len != total {
            self.decay = None;
            self.decay = Some(self.spawn(TimerKind::Decay, self.decay_period));
            self.decay_len = total;
        }
    }

    pub fn stop_decay(&mut self) {
        if let Some(handle) = self.decay.take() {
            debug!(generation = handle.generation(), "decay timer stopped");
        }
        self.decay_len = 0;
    }

    pub fn decay_running(&self) -> bool {
        self.decay.is_some()
    }

    /// Whether `tick` came from the timer currently registered for its kind.
    pub fn is_current(&self, tick: &Tick) -> bool {
        let handle = match tick.kind {
            TimerKind::Phase => &self.phase,
            TimerKind::Decay => &self.decay,
        };
        handle
            .as_ref()
            .is_some_and(|h| h.generation() == tick.generation)
    }

    pub fn stop_all(&mut self) {
        self.stop_phase();
        self.stop_decay();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn scheduler() -> (Scheduler, mpsc::Receiver<Tick>) {
        let (tx, rx) = mpsc::channel(16);
        let s = Scheduler::new(tx, Duration::from_millis(1000), Duration::from_millis(500));
        (s, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn phase_timer_ticks_with_current_generation() {
        let (mut s, mut rx) = scheduler();
        s.start_phase();
        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.kind, TimerKind::Phase);
        assert!(s.is_current(&tick));
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_timer_invalidates_old_ticks() {
        let (mut s, mut rx) = scheduler();
        s.start_phase();
        let old = rx.recv().await.unwrap();
        s.start_phase();
        assert!(!s.is_current(&old));
        let new = rx.recv().await.unwrap();
        assert!(s.is_current(&new));
        assert_ne!(old.generation, new.generation);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_never_ticks_again() {
        let (mut s, mut rx) = scheduler();
        s.start_phase();
        rx.recv().await.unwrap();
        s.stop_phase();
        assert!(!s.phase_running());
        assert!(timeout(Duration::from_secs(10), rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_aborts_task() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = CountdownHandle::spawn(TimerKind::Decay, Duration::from_millis(100), 9, tx);
        assert_eq!(rx.recv().await.unwrap().generation, 9);
        drop(handle);
        // The aborted task drops its sender, closing the channel.
        assert_eq!(timeout(Duration::from_secs(5), rx.recv()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn decay_follows_candidate_set() {
        let (mut s, mut rx) = scheduler();
        s.sync_decay(0, 0);
        assert!(!s.decay_running());

        s.sync_decay(2, 2);
        assert!(s.decay_running());
        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, TimerKind::Decay);

        // Same size: timer keeps running untouched.
        s.sync_decay(2, 1);
        assert!(s.is_current(&first));

        // Size change: restarted.
        s.sync_decay(3, 3);
        assert!(!s.is_current(&first));

        // Nothing visible: stopped even though data remains.
        s.sync_decay(3, 0);
        assert!(!s.decay_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_stops_both() {
        let (mut s, _rx) = scheduler();
        s.start_phase();
        s.sync_decay(1, 1);
        s.stop_all();
        assert!(!s.phase_running());
        assert!(!s.decay_running());
    }
}
