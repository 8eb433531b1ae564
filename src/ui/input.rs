/// Keyboard state tracker and key bindings.
///
/// Tracks which keys are held so that both edges can be reported:
///   - a fresh press starts movement or fires a one-shot action (flap)
///   - a release slows the canary down
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't
/// support it; a timed-out key is reported as released.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::sim::step::Action;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// Movement keys are held for long stretches, so they must outlast the
/// terminal's autorepeat delay (commonly 250-600 ms) before the first Repeat.
const MOVE_HOLD_TIMEOUT: Duration = Duration::from_millis(650);

// ── Key bindings ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_RELOAD: &[KeyCode] = &[KeyCode::Char('n'), KeyCode::Char('N')];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::Char('p'), KeyCode::Char('P')];

/// Actions fired by a fresh key press.
///
/// Space means Flap while playing and Start on the overlay. Both are
/// returned; the simulation ignores whichever does not apply to its mode.
/// Flap comes first so that starting never flaps in the same frame.
pub fn press_actions(code: KeyCode) -> &'static [Action] {
    match code {
        c if KEYS_LEFT.contains(&c) => &[Action::MoveLeft],
        c if KEYS_RIGHT.contains(&c) => &[Action::MoveRight],
        KeyCode::Char(' ') => &[Action::Flap, Action::Start],
        KeyCode::Up => &[Action::Flap],
        c if KEYS_RELOAD.contains(&c) => &[Action::ReloadLevel],
        c if KEYS_PAUSE.contains(&c) => &[Action::Pause],
        KeyCode::Backspace => &[Action::ToggleInvincible],
        _ => &[],
    }
}

/// How long a key stays held without fresh Press/Repeat events.
fn hold_timeout(code: KeyCode) -> Duration {
    if KEYS_LEFT.contains(&code) || KEYS_RIGHT.contains(&code) {
        MOVE_HOLD_TIMEOUT
    } else {
        HOLD_TIMEOUT
    }
}

/// Action fired when a key is let go.
pub fn release_action(code: KeyCode) -> Option<Action> {
    if KEYS_LEFT.contains(&code) || KEYS_RIGHT.contains(&code) {
        Some(Action::StopMove)
    } else {
        None
    }
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent drain.
    fresh_presses: Vec<KeyCode>,

    /// Keys that went from "held" to "not held" during the most recent drain.
    fresh_releases: Vec<KeyCode>,

    quit: bool,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            fresh_releases: Vec::with_capacity(8),
            quit: false,
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.begin_frame();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.feed(key, Instant::now());
            }
        }

        self.expire(Instant::now());
    }

    /// Actions for this frame, presses first, in arrival order.
    pub fn actions(&self) -> Vec<Action> {
        let mut out: Vec<Action> = self.fresh_presses.iter()
            .flat_map(|&c| press_actions(c).iter().copied())
            .collect();
        out.extend(self.fresh_releases.iter().filter_map(|&c| release_action(c)));
        out
    }

    /// Esc or Ctrl+C seen this frame.
    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    // ── Internal ──

    fn begin_frame(&mut self) {
        self.fresh_presses.clear();
        self.fresh_releases.clear();
        self.quit = false;
    }

    fn feed(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Release {
            let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL)
                && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'));
            if ctrl_c || key.code == KeyCode::Esc {
                self.quit = true;
            }
        }

        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                if self.last_active.remove(&key.code).is_some() {
                    self.fresh_releases.push(key.code);
                }
            }
            KeyEventKind::Release => {
                // Enhancement not confirmed; rely on timeout-based expiry.
            }
            _ => {
                let was_held = self.is_held_at(key.code, now);
                self.last_active.insert(key.code, now);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        let releases = &mut self.fresh_releases;
        self.last_active.retain(|code, t| {
            let alive = now.duration_since(*t) < hold_timeout(*code);
            if !alive {
                releases.push(*code);
            }
            alive
        });
    }

    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        self.last_active.get(&code)
            .map(|t| now.duration_since(*t) < hold_timeout(code))
            .unwrap_or(false)
    }
}
