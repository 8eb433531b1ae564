/// Per-tick motion and collision response.
///
/// ## Player
///   1. Horizontal: move by `dx`, then push out of every overlapping barrier
///      along the direction of travel.
///   2. Vertical: gravity, then either a ceiling bump (ascending) or a
///      landing (descending). Rotation and frame follow the vertical state.
///
/// ## Enemies
///   - SawBlade bounces between barriers.
///   - ElectricBox blinks on a 9-tick cycle.
///   - FallingBlock drops once the player comes close.
///
/// Overlapping barriers are resolved one by one in collection order; the
/// last push wins and there is no second settling pass.

use super::entity::{Barrier, Enemy, Player, BLOCK_SIZE};

/// Downward acceleration per tick.
pub const GRAVITY: f64 = 0.08;
/// Degrees of tumble added per tick while descending.
pub const TUMBLE_RATE: f64 = 0.7;
/// Vertical speed applied by a flap.
pub const FLAP_IMPULSE: f64 = -2.5;
/// Horizontal speed while a direction is held.
pub const WALK_SPEED: f64 = 2.0;
/// Constant drop speed of a triggered falling block.
pub const FALL_SPEED: f64 = 9.0;
/// Horizontal distance at which a falling block lets go.
pub const FALL_TRIGGER_DISTANCE: f64 = 40.0;

const ELECTRIC_CYCLE: u8 = 9;
const ELECTRIC_ARMED_FROM: u8 = 4;

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

pub fn move_player(player: &mut Player, barriers: &[Barrier]) {
    move_horizontal(player, barriers);
    apply_gravity(player, barriers);
}

pub fn move_horizontal(player: &mut Player, barriers: &[Barrier]) {
    player.block.x += player.block.dx;

    for barrier in barriers {
        let r = barrier.rect();
        let p = player.rect();
        if !r.collides(&p) {
            continue;
        }
        let resolved_x = if player.block.dx > 0.0 {
            r.x - BLOCK_SIZE
        } else if player.block.dx < 0.0 {
            r.right()
        } else {
            p.x
        };
        player.block.x = resolved_x as f64;
    }
}

pub fn apply_gravity(player: &mut Player, barriers: &[Barrier]) {
    let b = &mut player.block;
    b.dy += GRAVITY;
    b.y += b.dy;

    if b.dy < 0.0 {
        // Ascending: wings up, facing the direction of travel.
        b.degrees = 0.0;
        b.frame = 0;
        player.flip = b.dx <= 0.0;

        for barrier in barriers {
            let r = barrier.rect();
            if r.collides(&player.rect()) {
                player.block.dy = 0.0;
                player.block.y = r.bottom() as f64;
            }
        }
    } else {
        // Descending: tumble until something catches us.
        b.frame = 1;
        if b.dx > 0.0 {
            b.degrees -= TUMBLE_RATE;
            player.flip = false;
        } else {
            b.degrees += TUMBLE_RATE;
            player.flip = true;
        }

        for barrier in barriers {
            let r = barrier.rect();
            if r.collides(&player.rect()) {
                player.block.y = (r.y - BLOCK_SIZE) as f64;
                player.block.dy = 0.0;
                player.block.degrees = 0.0;
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Enemies
// ══════════════════════════════════════════════════════════════

pub fn step_enemy(enemy: &mut Enemy, barriers: &[Barrier], player: &Player) {
    match enemy {
        Enemy::SawBlade(saw) => {
            saw.block.x += saw.block.dx;
            saw.block.frame = saw.phase;
            saw.phase = (saw.phase + 1) % 2;

            for barrier in barriers {
                if barrier.rect().collides(&saw.block.rect()) {
                    saw.block.dx = -saw.block.dx;
                    saw.block.x += saw.block.dx;
                }
            }
        }
        Enemy::ElectricBox(e) => {
            e.block.frame = if e.counter >= ELECTRIC_ARMED_FROM { 0 } else { 1 };
            e.counter += 1;
            if e.counter >= ELECTRIC_CYCLE {
                e.counter = 0;
            }
        }
        Enemy::FallingBlock(f) => {
            f.block.y += f.block.dy;
            if (f.block.x - player.block.x).abs() < FALL_TRIGGER_DISTANCE {
                f.block.dy = FALL_SPEED;
            }
        }
    }
}

/// Is this enemy currently touching the player?
#[inline]
pub fn touches_player(enemy: &Enemy, player: &Player) -> bool {
    enemy.rect().collides(&player.rect())
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Barrier, Block, Enemy, Player, SawBlade};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn player_at(x: f64, y: f64) -> Player {
        Player::new(x, y)
    }

    // ── Horizontal ──

    #[test]
    fn walking_right_stops_flush_against_wall() {
        for &dx in &[0.3, 1.0, 2.0, 7.5, 13.0, 28.0] {
            let walls = vec![Barrier::wall(100.0, 0.0)];
            let mut p = player_at(0.0, 0.0);
            p.block.dx = dx;
            for _ in 0..400 {
                move_horizontal(&mut p, &walls);
            }
            assert_eq!(p.rect().right(), 100, "dx = {dx}");
            assert!(!p.rect().collides(&walls[0].rect()));
        }
    }

    #[test]
    fn walking_left_stops_flush_against_wall() {
        let walls = vec![Barrier::wall(100.0, 0.0)];
        let mut p = player_at(130.0, 0.0);
        p.block.dx = -2.0;
        for _ in 0..10 {
            move_horizontal(&mut p, &walls);
        }
        assert_eq!(p.rect().x, 128);
        assert_eq!(p.block.x, 128.0);
    }

    #[test]
    fn later_barrier_wins_when_several_overlap() {
        // Both crates overlap after the move; the second push is final.
        let walls = vec![Barrier::wall(100.0, 0.0), Barrier::button(90.0, 20.0)];
        let mut p = player_at(80.0, 10.0);
        p.block.dx = 2.0;
        move_horizontal(&mut p, &walls);
        assert_eq!(p.block.x, 62.0);
    }

    #[test]
    fn buttons_block_like_walls() {
        let walls = vec![Barrier::button(100.0, 0.0)];
        let mut p = player_at(70.0, 0.0);
        p.block.dx = 5.0;
        move_horizontal(&mut p, &walls);
        assert_eq!(p.rect().right(), 100);
    }

    // ── Vertical ──

    #[test]
    fn ascending_into_ceiling_stops_at_its_bottom() {
        let walls = vec![Barrier::wall(60.0, 100.0)];
        let mut p = player_at(60.0, 131.0);
        p.block.dy = -5.0;
        p.block.degrees = 12.0;
        apply_gravity(&mut p, &walls);
        assert_eq!(p.block.dy, 0.0);
        assert_eq!(p.rect().y, walls[0].rect().bottom());
        assert_eq!(p.block.degrees, 0.0);
        assert_eq!(p.block.frame, 0);
    }

    #[test]
    fn descending_onto_floor_lands_on_top() {
        let walls = vec![Barrier::wall(60.0, 100.0)];
        let mut p = player_at(60.0, 70.0);
        p.block.dy = 3.0;
        p.block.degrees = 5.0;
        apply_gravity(&mut p, &walls);
        assert_eq!(p.block.dy, 0.0);
        assert_eq!(p.block.degrees, 0.0);
        assert_eq!(p.rect().bottom(), 100);
        assert_eq!(p.block.frame, 1);
    }

    #[test]
    fn gravity_accumulates_without_cap() {
        let mut p = player_at(0.0, 0.0);
        for _ in 0..1000 {
            apply_gravity(&mut p, &[]);
        }
        assert!((p.block.dy - 80.0).abs() < 1e-6);
    }

    #[test]
    fn free_fall_tumbles_with_direction() {
        let mut p = player_at(0.0, 0.0);
        p.block.dx = 2.0;
        apply_gravity(&mut p, &[]);
        apply_gravity(&mut p, &[]);
        assert!((p.block.degrees + 1.4).abs() < 1e-9);
        assert!(!p.flip);

        let mut q = player_at(0.0, 0.0);
        q.block.dx = -2.0;
        apply_gravity(&mut q, &[]);
        assert!((q.block.degrees - 0.7).abs() < 1e-9);
        assert!(q.flip);
    }

    #[test]
    fn ascending_faces_travel_direction() {
        let mut p = player_at(0.0, 200.0);
        p.block.dy = FLAP_IMPULSE;
        p.block.dx = 2.0;
        p.block.degrees = 9.0;
        apply_gravity(&mut p, &[]);
        assert!(!p.flip);
        assert_eq!(p.block.degrees, 0.0);

        p.block.dx = -2.0;
        apply_gravity(&mut p, &[]);
        assert!(p.flip);
    }

    #[test]
    fn resting_player_stays_on_floor() {
        let walls = vec![Barrier::wall(0.0, 100.0)];
        let mut p = player_at(0.0, 72.0);
        for _ in 0..100 {
            move_player(&mut p, &walls);
        }
        assert_eq!(p.rect().bottom(), 100);
    }

    // ── Enemies ──

    #[test]
    fn saw_blade_reverses_off_walls() {
        let walls = vec![Barrier::wall(100.0, 0.0)];
        let player = player_at(500.0, 500.0);
        let mut block = Block::new(71.0, 0.0);
        block.dx = 2.0;
        let mut e = Enemy::SawBlade(SawBlade { block, phase: 0 });
        step_enemy(&mut e, &walls, &player);
        assert_eq!(e.block().dx, -2.0);
        assert_eq!(e.block().x, 71.0);
        assert!(!e.rect().collides(&walls[0].rect()));
    }

    #[test]
    fn saw_blade_alternates_frames() {
        let player = player_at(500.0, 500.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut e = Enemy::saw_blade(0.0, 0.0, &mut rng);
        let frames: Vec<usize> = (0..4)
            .map(|_| {
                step_enemy(&mut e, &[], &player);
                e.block().frame
            })
            .collect();
        assert_eq!(frames, vec![0, 1, 0, 1]);
    }

    #[test]
    fn electric_box_blinks_on_nine_tick_cycle() {
        let player = player_at(500.0, 500.0);
        let mut e = Enemy::electric_box(0.0, 0.0);
        let frames: Vec<usize> = (0..10)
            .map(|_| {
                step_enemy(&mut e, &[], &player);
                e.block().frame
            })
            .collect();
        assert_eq!(frames, vec![1, 1, 1, 1, 0, 0, 0, 0, 0, 1]);
        assert_eq!(e.block().x, 0.0);
        assert_eq!(e.block().y, 0.0);
    }

    #[test]
    fn falling_block_waits_for_player() {
        let mut e = Enemy::falling_block(200.0, 0.0);
        let far = player_at(100.0, 0.0);
        for _ in 0..20 {
            step_enemy(&mut e, &[], &far);
        }
        assert_eq!(e.block().dy, 0.0);
        assert_eq!(e.block().y, 0.0);

        let near = player_at(170.0, 0.0);
        step_enemy(&mut e, &[], &near);
        assert_eq!(e.block().dy, FALL_SPEED);

        let mut last_y = e.block().y;
        for _ in 0..10 {
            step_enemy(&mut e, &[], &far);
            assert_eq!(e.block().dy, FALL_SPEED);
            assert!(e.block().y > last_y);
            last_y = e.block().y;
        }
    }

    #[test]
    fn falling_block_ignores_barriers() {
        let walls = vec![Barrier::wall(200.0, 60.0)];
        let mut e = Enemy::falling_block(200.0, 0.0);
        let near = player_at(200.0, 300.0);
        for _ in 0..5 {
            step_enemy(&mut e, &walls, &near);
        }
        assert_eq!(e.block().y, 36.0);
    }

    #[test]
    fn contact_uses_bounding_rects() {
        let e = Enemy::electric_box(100.0, 100.0);
        assert!(touches_player(&e, &player_at(120.0, 110.0)));
        assert!(!touches_player(&e, &player_at(128.0, 100.0)));
    }
}
