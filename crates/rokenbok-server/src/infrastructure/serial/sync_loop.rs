//! The serial sync loop: streams the hub state to the microcontroller.
//!
//! # How it works (for beginners)
//!
//! The microcontroller behind the serial port does not remember anything on
//! its own.  It simply mirrors the last 21-byte frame it received onto the
//! hub's controller inputs.  So instead of sending events ("player 3 pressed
//! forward"), the server sends the *whole* state about 25 times a second:
//!
//! ```text
//!           HubState (shared, mutated by connection handlers)
//!               │ snapshot()
//!               ▼
//!   ┌── hub-sync thread ──────────────────────────────┐
//!   │ open link ─► settle ≥ 5 s ─► loop {             │
//!   │                 frame = snapshot.to_sync_frame  │
//!   │                 write + flush                   │
//!   │                 record_delivered                │
//!   │                 sleep until next 40 ms tick     │
//!   │              }                                  │
//!   └─────────────────────────────────────────────────┘
//! ```
//!
//! A late tick is not caught up: the next frame carries the current state,
//! so nothing is lost.
//!
//! The loop runs on a dedicated OS thread because serial writes block.
//!
//! # Lifecycle
//!
//! - [`SerialSync::start`] / [`SerialSync::restart`]: stop and join any
//!   running loop, reopen the link (retrying forever while the device is
//!   missing), then start a fresh loop.  Blocking: call from a blocking
//!   context.
//! - [`SerialSync::stop`]: release every input, keep streaming the neutral
//!   state for a short grace period, then stop the loop and close the link.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rokenbok_core::{Button, Car, HubState, Selections};
use tracing::{debug, error, info, warn};

use crate::application::hub_commands::HubCommands;
use crate::infrastructure::serial::link::{HubLink, LinkOpener};

/// Shortest wait between opening the link and the first frame.  The
/// microcontroller drops anything sent while it boots.
pub const MIN_SETTLE: Duration = Duration::from_secs(5);

/// Longest single sleep while waiting, so stop requests are noticed quickly.
const POLL_SLICE: Duration = Duration::from_millis(200);

/// Timing for the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub settle: Duration,
    pub cadence: Duration,
    /// Pause between failed open attempts.
    pub reopen_delay: Duration,
    /// How long the neutral state is streamed by [`SerialSync::stop`].
    pub neutral_grace: Duration,
    pub priority: u8,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            settle: MIN_SETTLE,
            cadence: Duration::from_millis(40),
            reopen_delay: Duration::from_secs(2),
            neutral_grace: Duration::from_millis(500),
            priority: 0,
        }
    }
}

/// A running loop thread and its stop flag.
struct SyncWorker {
    keep_going: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SyncWorker {
    fn halt(self) {
        self.keep_going.store(false, Ordering::Release);
        if self.handle.join().is_err() {
            error!("hub sync thread panicked");
        }
    }
}

/// Owner of the serial link and the loop thread.
pub struct SerialSync {
    state: Arc<HubState>,
    opener: Arc<dyn LinkOpener>,
    config: SyncConfig,
    worker: Mutex<Option<SyncWorker>>,
    stopping: AtomicBool,
}

impl SerialSync {
    pub fn new(state: Arc<HubState>, opener: Arc<dyn LinkOpener>, config: SyncConfig) -> Self {
        Self {
            state,
            opener,
            config,
            worker: Mutex::new(None),
            stopping: AtomicBool::new(false),
        }
    }

    /// Opens the link and starts the loop.  Same as [`restart`](Self::restart).
    pub fn start(&self) -> bool {
        self.restart()
    }

    /// Stops any running loop, reopens the link and starts a fresh loop.
    ///
    /// Blocks until the link is open.  Returns `false` if
    /// [`interrupt`](Self::interrupt) or [`stop`](Self::stop) was called
    /// before the link could be opened.
    pub fn restart(&self) -> bool {
        let mut worker = self.lock_worker();
        if self.is_stopping() {
            return false;
        }
        if let Some(old) = worker.take() {
            debug!("stopping hub sync loop for restart");
            old.halt();
        }
        self.state.clear_observed();

        let Some(link) = self.open_with_retry() else {
            return false;
        };

        let keep_going = Arc::new(AtomicBool::new(true));
        let state = Arc::clone(&self.state);
        let config = self.config;
        let flag = Arc::clone(&keep_going);
        let spawned = thread::Builder::new()
            .name("hub-sync".to_string())
            .spawn(move || sync_loop(state, link, config, flag));

        match spawned {
            Ok(handle) => {
                *worker = Some(SyncWorker { keep_going, handle });
                info!(
                    "hub sync loop started on {} (first frame in {:?})",
                    self.opener.describe(),
                    self.config.settle
                );
                true
            }
            Err(e) => {
                error!("failed to spawn hub sync thread: {e}");
                false
            }
        }
    }

    /// Releases every input, streams the neutral state for the grace period,
    /// then stops the loop and closes the link.
    ///
    /// After `stop` the loop cannot be restarted.
    pub fn stop(&self) {
        self.interrupt();
        self.state.release_all();
        if self.is_running() {
            thread::sleep(self.config.neutral_grace);
        }
        if let Some(worker) = self.lock_worker().take() {
            worker.halt();
        }
        info!("hub sync loop stopped");
    }

    /// Abandons any open attempt in progress and refuses later restarts.
    ///
    /// A running loop keeps streaming until [`stop`](Self::stop).  Call this
    /// first on shutdown so a restart stuck waiting for a missing device
    /// returns within one poll slice.
    pub fn interrupt(&self) {
        if !self.stopping.swap(true, Ordering::AcqRel) {
            debug!("hub link opening interrupted");
        }
    }

    /// `true` while a loop thread is alive.  A thread that hit a write error
    /// has exited and reports `false` until the next restart.
    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    fn open_with_retry(&self) -> Option<HubLink> {
        let mut attempt: u32 = 0;
        loop {
            if self.is_stopping() {
                return None;
            }
            attempt += 1;
            match self.opener.open() {
                Ok(link) => return Some(link),
                Err(e) => {
                    warn!(
                        "cannot open hub link {} (attempt {attempt}): {e}; retrying in {:?}",
                        self.opener.describe(),
                        self.config.reopen_delay
                    );
                }
            }
            if !pause(self.config.reopen_delay, || !self.is_stopping()) {
                return None;
            }
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<SyncWorker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HubCommands for SerialSync {
    fn cmd(&self, button: Button, player: u8, pressed: bool) {
        self.state.set_button(button, player, pressed);
    }

    fn change_selection(&self, player: u8, car: Option<Car>) -> bool {
        match self.state.set_selection(player, car) {
            Ok(()) => true,
            Err(e) => {
                debug!("selection change refused: {e}");
                false
            }
        }
    }

    fn selections(&self) -> Selections {
        self.state.selections()
    }

    fn restart_hub(&self) {
        info!("restarting hub link");
        if !self.restart() {
            warn!("hub restart abandoned: server is stopping");
        }
    }
}

impl Drop for SerialSync {
    fn drop(&mut self) {
        if let Some(worker) = self.lock_worker().take() {
            worker.halt();
        }
    }
}

// ── Loop body ─────────────────────────────────────────────────────────────────

fn sync_loop(state: Arc<HubState>, mut link: HubLink, config: SyncConfig, keep_going: Arc<AtomicBool>) {
    if !pause(config.settle, || keep_going.load(Ordering::Acquire)) {
        return;
    }
    debug!("hub settle interval elapsed, streaming state");

    let mut next_tick = Instant::now();
    while keep_going.load(Ordering::Acquire) {
        let snapshot = state.snapshot();
        let frame = snapshot.to_sync_frame(config.priority);
        if let Err(e) = link.write_all(&frame).and_then(|()| link.flush()) {
            error!("hub link write failed: {e}; waiting for a restart");
            return;
        }
        state.record_delivered(&snapshot);

        next_tick += config.cadence;
        let now = Instant::now();
        match next_tick.checked_duration_since(now) {
            Some(wait) => thread::sleep(wait),
            None => next_tick = now,
        }
    }
    debug!("hub sync loop exiting");
}

/// Sleeps for `total` in short slices.  Returns `false` as soon as
/// `keep_waiting` does.
fn pause(total: Duration, keep_waiting: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if !keep_waiting() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(POLL_SLICE));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
