/// WorldState: everything the simulation owns.
///
/// ## Entities
///   `barriers`, `borders`, `enemies` and `feathers` are rebuilt wholesale by
///   every level load. `player` survives loads and is only replaced by
///   `reset()` (new game after a win).
///
/// ## Modes
///   `OutOfGame` shows the overlay and waits for Start.
///   `InGame` runs the per-tick simulation.
///
///   OutOfGame --Start--> InGame        (full reset first if the last run was won)
///   InGame    --Pause--> OutOfGame
///   InGame    --win----> OutOfGame     (overlay switches to Finish)

use rand::rngs::StdRng;

use crate::domain::entity::{Barrier, Border, DroppedFeather, Enemy, Player};
use crate::error::GameError;
use crate::sim::level::{self, LevelSource};

/// Last level of the shipped campaign.
pub const DEFAULT_FINAL_LEVEL: i32 = 20;

/// Starting parallax offset of the background.
pub const BACKGROUND_ORIGIN: (i32, i32) = (-50, -50);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    OutOfGame,
    InGame,
}

/// Full-screen picture shown while out of game.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Overlay {
    Intro,
    Finish,
}

pub struct WorldState {
    // ── Entities ──
    pub barriers: Vec<Barrier>,
    pub borders: Vec<Border>,
    pub enemies: Vec<Enemy>,
    pub feathers: Vec<DroppedFeather>,
    pub player: Player,

    // ── Progress ──
    pub level: i32,
    pub final_level: i32,
    pub won: bool,
    pub invincible: bool,

    // ── Presentation state ──
    pub mode: Mode,
    pub overlay: Overlay,
    /// Parallax offset, shifted by 20 on every screen wrap.
    pub background: (i32, i32),
    /// World size of the loaded level image (`w*30`, `h*30`).
    pub level_extent: (i32, i32),
    pub message: String,
    pub message_timer: u32,

    // ── Bookkeeping ──
    pub rng: StdRng,
    pub tick: u64,
    /// Number of level loads so far.
    pub loads: u64,
}

impl WorldState {
    pub fn new(rng: StdRng) -> Self {
        WorldState {
            barriers: vec![],
            borders: vec![],
            enemies: vec![],
            feathers: vec![],
            player: Player::spawn(),
            level: 1,
            final_level: DEFAULT_FINAL_LEVEL,
            won: false,
            invincible: false,
            mode: Mode::OutOfGame,
            overlay: Overlay::Intro,
            background: BACKGROUND_ORIGIN,
            level_extent: (0, 0),
            message: String::new(),
            message_timer: 0,
            rng,
            tick: 0,
            loads: 0,
        }
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }
}

// ── Mode transitions ──

impl WorldState {
    /// Leave the overlay and play. A finished run starts over from level 1.
    pub fn start(&mut self, source: &dyn LevelSource) -> Result<(), GameError> {
        if self.mode == Mode::InGame {
            return Ok(());
        }
        if self.won {
            self.reset(source)?;
            self.overlay = Overlay::Intro;
        }
        self.mode = Mode::InGame;
        log::debug!("entering game at level {}", self.level);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.mode == Mode::InGame {
            self.mode = Mode::OutOfGame;
            log::debug!("paused at level {}", self.level);
        }
    }

    /// New game: back to level 1 with a fresh player at the spawn point.
    pub fn reset(&mut self, source: &dyn LevelSource) -> Result<(), GameError> {
        self.level = 1;
        level::load_level(self, source)?;
        self.player = Player::spawn();
        self.won = false;
        log::info!("game reset");
        Ok(())
    }

    /// The level counter ran past the last level. The counter is kept.
    pub fn win(&mut self) {
        self.overlay = Overlay::Finish;
        self.won = true;
        self.mode = Mode::OutOfGame;
        log::info!("campaign finished (level counter {})", self.level);
    }
}
