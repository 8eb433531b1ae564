/// Entry point and game loop.

mod config;
mod domain;
mod error;
mod sim;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::execute;
use rand::rngs::StdRng;
use rand::SeedableRng;

use config::GameConfig;
use error::GameError;
use sim::event::GameEvent;
use sim::level::{self, AssetDir, LevelSource};
use sim::step;
use sim::world::WorldState;
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    init_logging();
    let config = GameConfig::load();

    let rng = match config.seed {
        Some(seed) => {
            log::info!("fixed seed {seed}");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let assets = AssetDir::new(&config.assets_dir);
    let mut world = WorldState::new(rng);
    world.final_level = config.final_level;
    world.invincible = config.invincible;

    // Checked before touching the terminal so the error stays readable.
    if let Err(e) = level::boot_level(&mut world, &assets) {
        fatal(&e);
    }

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        fatal(&GameError::Io(e));
    }

    let mut kb = InputState::new();
    kb.honor_release = enable_key_release();

    let sound = SoundEngine::new(assets.root(), &config.audio);

    let result = game_loop(&mut world, &mut renderer, &mut kb, sound.as_ref(), &assets, &config);

    if kb.honor_release {
        if let Err(e) = execute!(io::stdout(), PopKeyboardEnhancementFlags) {
            log::warn!("could not restore keyboard flags: {e}");
        }
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    match result {
        Ok(()) => log::info!("bye (level {}, {} level loads)", world.level, world.loads),
        Err(e) => fatal(&e),
    }
}

/// Log to a file: the terminal belongs to the game while it runs.
/// `KUKAROO_LOG` picks the file, `RUST_LOG` the filter.
fn init_logging() {
    let path = std::env::var_os("KUKAROO_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("kukaroo.log"));

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match std::fs::File::create(&path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}", path.display());
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    if let Err(e) = builder.try_init() {
        eprintln!("Warning: logger already set: {e}");
    }
}

fn fatal(e: &GameError) -> ! {
    log::error!("{e}");
    eprintln!("Kukaroo: {e}");
    std::process::exit(1);
}

/// Ask the terminal for key release events. Without them, releases are
/// inferred from a hold timeout.
fn enable_key_release() -> bool {
    if !matches!(crossterm::terminal::supports_keyboard_enhancement(), Ok(true)) {
        log::info!("keyboard enhancement unsupported, using release timeout");
        return false;
    }
    let flags = KeyboardEnhancementFlags::REPORT_EVENT_TYPES;
    match execute!(io::stdout(), PushKeyboardEnhancementFlags(flags)) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("could not enable key release events: {e}");
            false
        }
    }
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    kb: &mut InputState,
    sound: Option<&SoundEngine>,
    source: &dyn LevelSource,
    config: &GameConfig,
) -> Result<(), GameError> {
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let tick_rate = Duration::from_millis(config.tick_rate_ms);
    let mut last_tick = Instant::now();

    loop {
        kb.drain_events();
        gp.update();

        if kb.quit_requested() {
            break;
        }

        let mut events = Vec::new();
        for action in kb.actions().into_iter().chain(gp.actions()) {
            step::apply_action(world, action, source, &mut events)?;
        }

        if last_tick.elapsed() >= tick_rate {
            events.extend(step::step(world, source)?);
            last_tick = Instant::now();
        }

        process_events(sound, &events);
        renderer.render(world, gp.connected)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn process_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::Flapped => {
                if let Some(sfx) = sound {
                    sfx.play_flap();
                }
            }
            GameEvent::BorderCrossed { from, to } => log::debug!("crossed {from} -> {to}"),
            GameEvent::LevelReloaded { level } => log::debug!("level {level} reloaded by hand"),
            GameEvent::InvincibilityToggled(on) => log::debug!("invincible: {on}"),
            GameEvent::PlayerHit | GameEvent::Won | GameEvent::Started | GameEvent::Paused => {
                log::debug!("{event:?}")
            }
        }
    }
}
