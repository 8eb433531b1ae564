/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Feathers (expire, then drift)
///   2. Enemies (move, then contact check → respawn + reload)
///   3. Player (horizontal push-out, gravity)
///   4. Borders (level change, screen wrap, reload or win)
///
/// Input arrives separately through `apply_action`, once per polled event,
/// before the tick runs.

use rand::Rng;

use crate::domain::entity::DroppedFeather;
use crate::domain::physics::{self, FLAP_IMPULSE, WALK_SPEED};
use crate::error::GameError;
use super::event::GameEvent;
use super::level::{self, LevelSource};
use super::world::{Mode, WorldState};

/// Screen-edge thresholds used to decide which way a border was crossed.
const RIGHT_EDGE: f64 = 630.0;
const LEFT_EDGE: f64 = 10.0;
const BOTTOM_EDGE: f64 = 350.0;
const TOP_EDGE: f64 = 10.0;

/// Where the player reappears after crossing an edge.
const WRAP_LEFT_X: f64 = 5.0;
const WRAP_RIGHT_X: f64 = 610.0;
const WRAP_TOP_Y: f64 = 5.0;
const WRAP_BOTTOM_Y: f64 = 360.0;

/// Background shift per wrap.
const PARALLAX_STEP: i32 = 20;

/// Discrete player intents, already decoded from keys or buttons.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
    MoveLeft,
    MoveRight,
    /// A movement key was let go: horizontal speed halves.
    StopMove,
    Flap,
    /// Debug: rebuild the current level in place.
    ReloadLevel,
    Pause,
    ToggleInvincible,
    Start,
}

// ══════════════════════════════════════════════════════════════
// Input
// ══════════════════════════════════════════════════════════════

pub fn apply_action(
    world: &mut WorldState,
    action: Action,
    source: &dyn LevelSource,
    events: &mut Vec<GameEvent>,
) -> Result<(), GameError> {
    if world.mode == Mode::OutOfGame {
        if action == Action::Start {
            world.start(source)?;
            events.push(GameEvent::Started);
        }
        return Ok(());
    }

    match action {
        Action::MoveLeft => world.player.block.dx = -WALK_SPEED,
        Action::MoveRight => world.player.block.dx = WALK_SPEED,
        Action::StopMove => world.player.block.dx *= 0.5,
        Action::Flap => flap(world, events),
        Action::ReloadLevel => {
            level::load_level(world, source)?;
            events.push(GameEvent::LevelReloaded { level: world.level });
        }
        Action::Pause => {
            world.pause();
            events.push(GameEvent::Paused);
        }
        Action::ToggleInvincible => {
            world.invincible = !world.invincible;
            log::info!("invincibility toggle: {}", world.invincible);
            let msg = if world.invincible { "Invincible" } else { "Mortal" };
            world.set_message(msg, 60);
            events.push(GameEvent::InvincibilityToggled(world.invincible));
        }
        Action::Start => {}
    }
    Ok(())
}

/// Jump upward and shed two or three feathers around the canary.
fn flap(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    world.player.block.dy = FLAP_IMPULSE;
    events.push(GameEvent::Flapped);

    let (px, py) = (world.player.block.x, world.player.block.y);
    let count = world.rng.gen_range(2..=3);
    for _ in 0..count {
        let x = px + world.rng.gen_range(-5..=5) as f64;
        let y = py + world.rng.gen_range(0..8) as f64;
        let feather = DroppedFeather::new(x, y, &mut world.rng);
        world.feathers.push(feather);
    }
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, source: &dyn LevelSource) -> Result<Vec<GameEvent>, GameError> {
    if world.mode != Mode::InGame {
        return Ok(vec![]);
    }

    let mut events = Vec::new();
    world.tick += 1;

    if world.message_timer > 0 {
        world.message_timer -= 1;
        if world.message_timer == 0 {
            world.message.clear();
        }
    }

    resolve_feathers(world);
    resolve_enemies(world, source, &mut events)?;
    physics::move_player(&mut world.player, &world.barriers);
    resolve_borders(world, source, &mut events)?;

    Ok(events)
}

// ══════════════════════════════════════════════════════════════
// Feathers
// ══════════════════════════════════════════════════════════════

/// A feather is drawn on the tick its lifetime reaches zero and dropped on
/// the next one. `retain_mut` visits every feather exactly once.
fn resolve_feathers(world: &mut WorldState) {
    world.feathers.retain_mut(|f| {
        if f.expired() {
            return false;
        }
        f.fall();
        true
    });
}

// ══════════════════════════════════════════════════════════════
// Enemies
// ══════════════════════════════════════════════════════════════

fn resolve_enemies(
    world: &mut WorldState,
    source: &dyn LevelSource,
    events: &mut Vec<GameEvent>,
) -> Result<(), GameError> {
    let mut hit = false;
    for enemy in world.enemies.iter_mut() {
        physics::step_enemy(enemy, &world.barriers, &world.player);
        if physics::touches_player(enemy, &world.player) && !world.invincible {
            hit = true;
            break;
        }
    }

    if hit {
        // The reload replaces the enemy list, so the rest of this pass is
        // dropped along with it.
        world.player.return_to_last();
        world.player.block.dy = 0.0;
        log::debug!("player hit on level {}", world.level);
        level::load_level(world, source)?;
        events.push(GameEvent::PlayerHit);
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════
// Borders
// ══════════════════════════════════════════════════════════════

fn resolve_borders(
    world: &mut WorldState,
    source: &dyn LevelSource,
    events: &mut Vec<GameEvent>,
) -> Result<(), GameError> {
    let player_rect = world.player.rect();
    let delta = match world.borders.iter().find(|b| b.rect().collides(&player_rect)) {
        Some(border) => border.level_delta,
        None => return Ok(()),
    };

    let from = world.level;
    world.level += delta;
    wrap_player(world);
    world.player.mark_safe();
    events.push(GameEvent::BorderCrossed { from, to: world.level });
    log::info!("border crossed: level {} -> {}", from, world.level);

    if world.level > world.final_level {
        world.win();
        events.push(GameEvent::Won);
        return Ok(());
    }

    level::load_level(world, source)
}

/// Teleport the player to the edge opposite the one it left through and
/// scroll the background with it. At most one axis wraps.
fn wrap_player(world: &mut WorldState) {
    let p = &mut world.player.block;
    let bg = &mut world.background;

    if p.x > RIGHT_EDGE {
        p.x = WRAP_LEFT_X;
        bg.0 -= PARALLAX_STEP;
    } else if p.x < LEFT_EDGE {
        p.x = WRAP_RIGHT_X;
        bg.0 += PARALLAX_STEP;
    } else if p.y > BOTTOM_EDGE {
        p.y = WRAP_TOP_Y;
        bg.1 -= PARALLAX_STEP;
    } else if p.y < TOP_EDGE {
        p.y = WRAP_BOTTOM_Y;
        bg.1 += PARALLAX_STEP;
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::domain::entity::{Border, DroppedFeather, Enemy, Player};
    use crate::sim::level::tests::{image_with, MemoryLevels, ELECTRIC, SAW, WALL};
    use crate::sim::world::{Overlay, BACKGROUND_ORIGIN};

    fn playing(src: &MemoryLevels) -> WorldState {
        let mut w = WorldState::new(StdRng::seed_from_u64(5));
        level::boot_level(&mut w, src).unwrap();
        w.mode = Mode::InGame;
        w
    }

    fn empty_levels(n: i32) -> MemoryLevels {
        (1..=n).fold(MemoryLevels::default(), |m, i| m.with(i, image_with(2, 2, &[])))
    }

    // ── Actions ──

    #[test]
    fn movement_actions_set_and_decay_speed() {
        let src = empty_levels(1);
        let mut w = playing(&src);
        let mut ev = vec![];
        apply_action(&mut w, Action::MoveRight, &src, &mut ev).unwrap();
        assert_eq!(w.player.block.dx, 2.0);
        apply_action(&mut w, Action::StopMove, &src, &mut ev).unwrap();
        assert_eq!(w.player.block.dx, 1.0);
        apply_action(&mut w, Action::MoveLeft, &src, &mut ev).unwrap();
        assert_eq!(w.player.block.dx, -2.0);
    }

    #[test]
    fn flap_jumps_and_drops_feathers() {
        let src = empty_levels(1);
        let mut w = playing(&src);
        let mut ev = vec![];
        apply_action(&mut w, Action::Flap, &src, &mut ev).unwrap();
        assert_eq!(w.player.block.dy, FLAP_IMPULSE);
        assert!((2..=3).contains(&w.feathers.len()));
        for f in &w.feathers {
            assert!((f.ox - w.player.block.x).abs() <= 5.0);
            assert!(f.oy >= w.player.block.y && f.oy < w.player.block.y + 8.0);
        }
        assert_eq!(ev, vec![GameEvent::Flapped]);
    }

    #[test]
    fn out_of_game_only_accepts_start() {
        let src = empty_levels(1);
        let mut w = playing(&src);
        w.mode = Mode::OutOfGame;
        let mut ev = vec![];
        apply_action(&mut w, Action::MoveRight, &src, &mut ev).unwrap();
        apply_action(&mut w, Action::Flap, &src, &mut ev).unwrap();
        assert_eq!(w.player.block.dx, 0.0);
        assert!(w.feathers.is_empty());
        apply_action(&mut w, Action::Start, &src, &mut ev).unwrap();
        assert_eq!(w.mode, Mode::InGame);
        apply_action(&mut w, Action::Pause, &src, &mut ev).unwrap();
        assert_eq!(w.mode, Mode::OutOfGame);
        assert_eq!(ev, vec![GameEvent::Started, GameEvent::Paused]);
    }

    #[test]
    fn step_does_nothing_out_of_game() {
        let src = empty_levels(1);
        let mut w = playing(&src);
        w.mode = Mode::OutOfGame;
        let y = w.player.block.y;
        assert!(step(&mut w, &src).unwrap().is_empty());
        assert_eq!(w.player.block.y, y);
        assert_eq!(w.tick, 0);
    }

    #[test]
    fn reload_action_rebuilds_current_level() {
        let src = MemoryLevels::default().with(1, image_with(4, 4, &[(1, 1, WALL)]));
        let mut w = playing(&src);
        w.barriers.clear();
        let mut ev = vec![];
        apply_action(&mut w, Action::ReloadLevel, &src, &mut ev).unwrap();
        assert_eq!(w.barriers.len(), 1);
        assert_eq!(w.level, 1);
    }

    // ── Feathers ──

    #[test]
    fn feather_lives_exactly_its_lifetime() {
        let src = empty_levels(1);
        let mut w = playing(&src);
        let mut rng = StdRng::seed_from_u64(1);
        w.feathers.push(DroppedFeather::new(200.0, 100.0, &mut rng));
        for tick in 1..=250 {
            step(&mut w, &src).unwrap();
            assert_eq!(w.feathers.len(), 1, "tick {tick}");
        }
        step(&mut w, &src).unwrap();
        assert!(w.feathers.is_empty());
    }

    #[test]
    fn expiring_feather_does_not_skip_siblings() {
        let src = empty_levels(1);
        let mut w = playing(&src);
        let mut rng = StdRng::seed_from_u64(2);
        w.feathers.push(DroppedFeather::new(100.0, 100.0, &mut rng).with_lifetime(1));
        w.feathers.push(DroppedFeather::new(110.0, 100.0, &mut rng).with_lifetime(1));
        w.feathers.push(DroppedFeather::new(120.0, 100.0, &mut rng).with_lifetime(5));

        step(&mut w, &src).unwrap();
        assert_eq!(w.feathers.len(), 3);
        assert!(w.feathers.iter().all(|f| f.block.y > 100.0));

        step(&mut w, &src).unwrap();
        assert_eq!(w.feathers.len(), 1);
        assert_eq!(w.feathers[0].ttl, 3);
    }

    // ── Enemy contact ──

    fn contact_world(src: &MemoryLevels) -> WorldState {
        let mut w = playing(src);
        w.enemies = vec![Enemy::electric_box(300.0, 200.0)];
        w.player = Player::new(80.0, 40.0);
        w.player.block.x = 305.0;
        w.player.block.y = 205.0;
        w
    }

    #[test]
    fn enemy_contact_respawns_and_reloads() {
        let src = MemoryLevels::default().with(1, image_with(4, 4, &[(2, 2, ELECTRIC)]));
        let mut w = contact_world(&src);
        w.player.block.dy = 4.0;
        let reads = src.reads.get();

        let ev = step(&mut w, &src).unwrap();
        assert!(ev.contains(&GameEvent::PlayerHit));
        assert_eq!(src.reads.get(), reads + 1);
        assert_eq!(w.enemies.len(), 1);
        assert_eq!(w.enemies[0].block().x, 30.0);
        // Respawned at the safe point, then one tick of gravity.
        assert_eq!(w.player.block.x, 80.0);
        assert!((w.player.block.y - 40.08).abs() < 1e-9);
        assert!((w.player.block.dy - 0.08).abs() < 1e-9);
    }

    #[test]
    fn invincible_player_ignores_contact() {
        let src = empty_levels(1);
        let mut w = contact_world(&src);
        w.invincible = true;
        let reads = src.reads.get();

        let ev = step(&mut w, &src).unwrap();
        assert!(!ev.contains(&GameEvent::PlayerHit));
        assert_eq!(src.reads.get(), reads);
        assert_eq!(w.player.block.x, 305.0);
        assert_eq!(w.enemies.len(), 1);
    }

    #[test]
    fn saw_blade_patrols_between_walls() {
        let src = empty_levels(1);
        let mut w = playing(&src);
        w.player = Player::new(600.0, 0.0);
        w.barriers = vec![
            crate::domain::entity::Barrier::wall(0.0, 300.0),
            crate::domain::entity::Barrier::wall(150.0, 300.0),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let mut saw = Enemy::saw_blade(60.0, 300.0, &mut rng);
        saw.block_mut().dx = 1.5;
        w.enemies = vec![saw];
        for _ in 0..500 {
            step(&mut w, &src).unwrap();
            let x = w.enemies[0].block().x;
            assert!(x > 0.0 && x < 150.0, "saw escaped to {x}");
        }
    }

    // ── Borders ──

    #[test]
    fn crossing_forward_border_advances_one_level() {
        let src = empty_levels(6).with(6, image_with(3, 3, &[(1, 1, SAW)]));
        let mut w = playing(&src);
        w.level = 5;
        w.player = Player::new(300.0, 200.0);
        w.borders = vec![Border::new(300.0, 200.0, 1)];
        let reads = src.reads.get();

        let ev = step(&mut w, &src).unwrap();
        assert_eq!(w.level, 6);
        assert_eq!(src.reads.get(), reads + 1);
        assert!(ev.contains(&GameEvent::BorderCrossed { from: 5, to: 6 }));
        assert!(w.borders.is_empty());
        assert_eq!(w.enemies.len(), 1);
    }

    #[test]
    fn crossing_right_edge_wraps_to_left() {
        let src = empty_levels(2);
        let mut w = playing(&src);
        w.player = Player::new(0.0, 0.0);
        w.player.block.x = 640.0;
        w.player.block.y = 200.0;
        w.borders = vec![Border::new(650.0, 195.0, 1)];

        step(&mut w, &src).unwrap();
        assert_eq!(w.level, 2);
        assert_eq!(w.player.block.x, WRAP_LEFT_X);
        assert_eq!(w.player.lx, WRAP_LEFT_X);
        assert_eq!(w.background, (BACKGROUND_ORIGIN.0 - 20, BACKGROUND_ORIGIN.1));
    }

    #[test]
    fn crossing_top_edge_wraps_to_bottom() {
        let src = empty_levels(3);
        let mut w = playing(&src);
        w.level = 3;
        w.player = Player::new(300.0, 0.0);
        w.player.block.y = 5.0;
        w.player.block.dy = -2.0;
        w.borders = vec![Border::new(300.0, -20.0, -1)];

        step(&mut w, &src).unwrap();
        assert_eq!(w.level, 2);
        assert_eq!(w.player.block.y, WRAP_BOTTOM_Y);
        assert_eq!(w.player.ly, WRAP_BOTTOM_Y);
        assert_eq!(w.background, (BACKGROUND_ORIGIN.0, BACKGROUND_ORIGIN.1 + 20));
    }

    #[test]
    fn crossing_left_edge_wraps_to_right() {
        let src = empty_levels(2);
        let mut w = playing(&src);
        w.level = 2;
        w.player = Player::new(4.0, 200.0);
        w.borders = vec![Border::new(-20.0, 200.0, -1)];

        step(&mut w, &src).unwrap();
        assert_eq!(w.level, 1);
        assert_eq!(w.player.block.x, WRAP_RIGHT_X);
        assert_eq!(w.player.lx, WRAP_RIGHT_X);
        assert_eq!(w.background, (BACKGROUND_ORIGIN.0 + 20, BACKGROUND_ORIGIN.1));
    }

    #[test]
    fn crossing_bottom_edge_wraps_to_top() {
        let src = empty_levels(4);
        let mut w = playing(&src);
        w.level = 3;
        w.player = Player::new(300.0, 360.0);
        w.borders = vec![Border::new(300.0, 370.0, 1)];

        step(&mut w, &src).unwrap();
        assert_eq!(w.level, 4);
        assert_eq!(w.player.block.x, 300.0);
        assert_eq!(w.player.block.y, WRAP_TOP_Y);
        assert_eq!(w.player.ly, WRAP_TOP_Y);
        assert_eq!(w.background, (BACKGROUND_ORIGIN.0, BACKGROUND_ORIGIN.1 - 20));
    }

    #[test]
    fn mid_screen_border_changes_level_without_wrap() {
        let src = empty_levels(2);
        let mut w = playing(&src);
        w.player = Player::new(300.0, 200.0);
        w.borders = vec![Border::new(310.0, 210.0, 1)];
        let reads = src.reads.get();

        step(&mut w, &src).unwrap();
        assert_eq!(w.level, 2);
        assert_eq!(src.reads.get(), reads + 1);
        assert_eq!(w.player.block.x, 300.0);
        assert!(w.player.block.y > 200.0 && w.player.block.y < 201.0);
        assert_eq!((w.player.lx, w.player.ly), (w.player.block.x, w.player.block.y));
        assert_eq!(w.background, BACKGROUND_ORIGIN);
        assert!(w.borders.is_empty());
    }

    #[test]
    fn passing_last_level_wins() {
        let src = empty_levels(20);
        let mut w = playing(&src);
        w.level = 20;
        w.player = Player::new(300.0, 200.0);
        w.borders = vec![Border::new(300.0, 200.0, 1)];
        let reads = src.reads.get();

        let ev = step(&mut w, &src).unwrap();
        assert!(ev.contains(&GameEvent::Won));
        assert!(w.won);
        assert_eq!(w.level, 21);
        assert_eq!(w.mode, Mode::OutOfGame);
        assert_eq!(w.overlay, Overlay::Finish);
        assert_eq!(src.reads.get(), reads);
    }

    #[test]
    fn arriving_inside_a_wall_is_pushed_below_it() {
        // Level 2 has a crate at (0, 60), right where the wrapped player lands.
        let src = empty_levels(1).with(2, image_with(4, 4, &[(1, 3, WALL)]));
        let mut w = playing(&src);
        w.player = Player::new(645.0, 70.0);
        w.borders = vec![Border::new(640.0, 50.0, 1)];

        step(&mut w, &src).unwrap();
        assert_eq!(w.level, 2);
        assert_eq!(w.player.block.x, WRAP_LEFT_X);
        assert_eq!(w.player.block.y, 88.0);
    }
}
