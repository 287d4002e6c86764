// Session state and orchestration logic.
//
// The central event loop that coordinates push-channel events, countdown
// ticks and user commands from the frontend. The `Session` owns every
// component of a client session and pushes a freshly rendered view to the
// frontend after anything changes.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::actions::{ActionDispatcher, ActionError};
use crate::config::Config;
use crate::protocol::{ConnectionStatus, ServerEvent, UiUpdate, UserCommand};
use crate::push_channel::PushEvent;
use crate::reconciler::{Effect, LinkState, ReconcileError, Reconciler};
use crate::render::{self, RenderContext, RenderedView};
use crate::scheduler::{Scheduler, Tick, TimerKind};
use crate::time::{self, ClockSkew};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How often the loop checks the reconnect grace period and the winner
/// flash, independent of the countdown timers.
pub const HOUSEKEEPING_INTERVAL: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct WinnerFlash {
    phrase: String,
    /// Local time at which the flash ends.
    until_ms: i64,
}

/// Everything one client session owns.
pub struct Session {
    config: Config,
    reconciler: Reconciler,
    scheduler: Scheduler,
    actions: ActionDispatcher,
    connection: ConnectionStatus,
    /// Local time the push channel was last seen failing, while it is down.
    lost_since: Option<i64>,
    fatal: Option<String>,
    winner: Option<WinnerFlash>,
    phase_expired: bool,
    input_open: bool,
}

impl Session {
    pub fn new(config: Config, actions: ActionDispatcher, tick_tx: mpsc::Sender<Tick>) -> Self {
        let scheduler = Scheduler::new(
            tick_tx,
            Duration::from_millis(config.timing.phase_tick_ms),
            Duration::from_millis(config.timing.decay_tick_ms),
        );
        Session {
            reconciler: Reconciler::new(ClockSkew::new(config.timing.apply_clock_skew)),
            scheduler,
            actions,
            connection: ConnectionStatus::Connecting,
            lost_since: None,
            fatal: None,
            winner: None,
            phase_expired: false,
            input_open: false,
            config,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn fatal(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    pub fn phase_expired(&self) -> bool {
        self.phase_expired
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // -- push channel --

    pub fn handle_push(&mut self, event: PushEvent, now_ms: i64) {
        match event {
            PushEvent::Opened => {
                self.reconciler.on_open();
                self.lost_since = None;
                self.connection = ConnectionStatus::Connected;
            }
            PushEvent::Lost { reason } => {
                debug!("push channel lost: {reason}");
                self.reconciler.on_lost();
                self.lost_since.get_or_insert(now_ms);
                if self.connection != ConnectionStatus::Lost {
                    self.connection = ConnectionStatus::Reconnecting;
                }
            }
            PushEvent::Message { event, data } => match ServerEvent::parse(&event, &data) {
                Ok(event) => self.apply_event(event, now_ms),
                Err(e) => warn!("Dropping push event: {e}"),
            },
        }
    }

    /// Apply a decoded server event and carry out its effects.
    pub fn apply_event(&mut self, event: ServerEvent, now_ms: i64) {
        let name = event.name();
        let effects = match self.reconciler.apply(event, now_ms) {
            Ok(effects) => effects,
            Err(e @ ReconcileError::UnknownPhase(_)) => {
                error!("Protocol mismatch: {e}");
                self.fatal = Some(e.to_string());
                return;
            }
            Err(e) => {
                warn!("Dropping {name} event: {e}");
                return;
            }
        };

        // A snapshot replaces the whole candidate set, so the old decay timer
        // goes before a new one is considered.
        if effects.contains(&Effect::SnapshotApplied) {
            self.scheduler.stop_decay();
        }

        let mut phase_restarted = false;
        for effect in effects {
            match effect {
                Effect::StartPhaseCountdown => {
                    self.phase_expired = false;
                    self.scheduler.start_phase();
                    phase_restarted = true;
                }
                Effect::CandidatesChanged => {}
                Effect::EnableInput => self.input_open = true,
                Effect::WinnerFlash { phrase } => {
                    info!("Winning phrase: {phrase:?}");
                    self.winner = Some(WinnerFlash {
                        phrase,
                        until_ms: now_ms + self.config.timing.winner_flash_ms as i64,
                    });
                }
                Effect::SnapshotApplied => {
                    if let Some(message) = self.fatal.take() {
                        info!("Recognized snapshot received, clearing error: {message}");
                    }
                }
                Effect::ResyncComplete => info!("Resynchronized after reconnect"),
            }
        }

        // After `EnableInput`, so a deadline already in the past closes input.
        if phase_restarted {
            self.check_phase(now_ms);
        }
        self.sync_decay(now_ms);
    }

    // -- timers --

    /// Handle a countdown tick. Returns `false` for ticks from a timer that
    /// has since been replaced or stopped.
    pub fn handle_tick(&mut self, tick: Tick, now_ms: i64) -> bool {
        if !self.scheduler.is_current(&tick) {
            debug!(?tick, "discarding stale tick");
            return false;
        }
        match tick.kind {
            TimerKind::Phase => self.check_phase(now_ms),
            TimerKind::Decay => self.sync_decay(now_ms),
        }
        true
    }

    fn check_phase(&mut self, now_ms: i64) {
        let Some(deadline) = self.reconciler.state().phase().deadline() else {
            self.scheduler.stop_phase();
            return;
        };
        let server_now = self.reconciler.server_now(now_ms);
        if time::remaining(deadline.as_millis(), server_now) == 0 {
            self.scheduler.stop_phase();
            if !self.phase_expired {
                info!("Phase countdown reached zero, waiting for the server");
                self.phase_expired = true;
                self.input_open = false;
            }
        }
    }

    fn sync_decay(&mut self, now_ms: i64) {
        let state = self.reconciler.state();
        let server_now = self.reconciler.server_now(now_ms);
        let total = state.candidates().len();
        let visible = render::visible_count(state, server_now);
        self.scheduler.sync_decay(total, visible);
    }

    /// Periodic checks not tied to a countdown. Returns `true` when the view
    /// changed.
    pub fn housekeeping(&mut self, now_ms: i64) -> bool {
        let mut changed = false;

        if self.winner.as_ref().is_some_and(|w| now_ms >= w.until_ms) {
            self.winner = None;
            changed = true;
        }

        if self.reconciler.link() == LinkState::Reconnecting
            && self.connection == ConnectionStatus::Reconnecting
        {
            if let Some(since) = self.lost_since {
                let grace = self.config.timing.reconnect_grace_ms as i64;
                if now_ms - since >= grace {
                    warn!("Push channel down for {}ms, marking connection lost", now_ms - since);
                    self.connection = ConnectionStatus::Lost;
                    changed = true;
                }
            }
        }

        changed
    }

    // -- user commands --

    pub fn handle_command(&mut self, cmd: UserCommand) {
        if let Some(message) = &self.fatal {
            debug!(?cmd, "ignoring command while blocked by error: {message}");
            return;
        }
        match cmd {
            UserCommand::SubmitPhrase(phrase) => {
                if !self.accepts_submissions() {
                    debug!("submission ignored outside of play");
                    return;
                }
                match self.actions.submit_candidate(&phrase) {
                    Ok(_) => {}
                    Err(ActionError::EmptyPhrase) => debug!("empty phrase not submitted"),
                    Err(e) => warn!("Failed to submit candidate: {e}"),
                }
            }
            UserCommand::CastVote(id) => {
                self.actions.cast_vote(&id);
            }
            UserCommand::FlagWord(id) => {
                self.actions.flag_word(&id);
            }
            UserCommand::Quit => {}
        }
    }

    fn accepts_submissions(&self) -> bool {
        self.input_open && self.reconciler.state().phase().is_in_play()
    }

    // -- rendering --

    pub fn view(&self, now_ms: i64) -> RenderedView {
        let ctx = RenderContext {
            now_ms: self.reconciler.server_now(now_ms),
            window_ms: self.config.timing.candidate_window_ms as i64,
            palette: self.config.palette,
            connection: self.connection,
            resyncing: self.reconciler.awaiting_resync(),
            input_open: self.input_open,
            phase_expired: self.phase_expired,
            fatal: self.fatal.as_deref(),
            winner: self.winner.as_ref().map(|w| w.phrase.as_str()),
        };
        render::render(self.reconciler.state(), &ctx)
    }

    pub fn shutdown(&mut self) {
        self.scheduler.stop_all();
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

async fn send_frame(session: &Session, ui_tx: &mpsc::Sender<UiUpdate>) {
    let frame = session.view(time::now_ms());
    let _ = ui_tx.send(UiUpdate::Frame(Box::new(frame))).await;
}

/// Run the session event loop.
///
/// Listens on the push channel, the countdown ticks and the user commands
/// using `tokio::select!`, plus a housekeeping interval. Exits on
/// `UserCommand::Quit` or when the command channel closes.
pub async fn run(
    mut push_rx: mpsc::Receiver<PushEvent>,
    mut tick_rx: mpsc::Receiver<Tick>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut session: Session,
) -> anyhow::Result<()> {
    info!("Session event loop started");

    // When the push task ends we stop polling its channel so select! never
    // spins on a closed receiver.
    let mut push_open = true;

    let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    housekeeping.tick().await;

    send_frame(&session, &ui_tx).await;

    loop {
        tokio::select! {
            // --- Push channel ---
            event = push_rx.recv(), if push_open => {
                match event {
                    Some(event) => {
                        session.handle_push(event, time::now_ms());
                        send_frame(&session, &ui_tx).await;
                    }
                    None => {
                        warn!("Push channel task ended");
                        push_open = false;
                        session.handle_push(
                            PushEvent::Lost { reason: "push task ended".into() },
                            time::now_ms(),
                        );
                        send_frame(&session, &ui_tx).await;
                    }
                }
            }

            // --- Countdown ticks ---
            Some(tick) = tick_rx.recv() => {
                if session.handle_tick(tick, time::now_ms()) {
                    send_frame(&session, &ui_tx).await;
                }
            }

            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => session.handle_command(cmd),
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Housekeeping ---
            _ = housekeeping.tick() => {
                if session.housekeeping(time::now_ms()) {
                    send_frame(&session, &ui_tx).await;
                }
            }
        }
    }

    session.shutdown();
    info!("Session event loop exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
