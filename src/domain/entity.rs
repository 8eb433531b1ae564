/// Entities: the shared Block aggregate and every kind built from it.
///
/// Each kind embeds a `Block` (position, velocity, rotation, frame) and
/// exposes two read-only views:
///   - `rect()`: bounding rectangle, derived from the current position
///   - `draw()`: parameters for the presentation layer
///
/// Motion lives in `physics`; this module only holds state.

use rand::Rng;

use super::rect::Rect;

/// Every block is a 28×28 square inside its 30×30 tile.
pub const BLOCK_SIZE: i32 = 28;

/// Where a freshly reset player appears.
pub const PLAYER_SPAWN: (f64, f64) = (50.0, 50.0);

/// Ticks a dropped feather stays alive.
pub const FEATHER_LIFETIME: u32 = 250;

// ── Appearance ──

/// Visual selector handed to the renderer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sprite {
    Crate,
    Button,
    SawBlade0,
    SawBlade1,
    Electric0,
    Electric1,
    /// Canary with wings up (ascending / standing).
    Canary0,
    /// Canary tumbling (descending).
    Canary1,
    Feather,
}

/// Read-only draw parameters for one entity.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DrawParams {
    pub sprite: Sprite,
    pub dest: Rect,
    /// Degrees, counter-clockwise positive.
    pub rotation: f64,
    pub flip: bool,
}

// ── Block ──

/// Shared movable block. The bounding rectangle is never stored: it is
/// recomputed from `(x, y)` on every read, so a position write is always
/// visible to the next collision test.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub degrees: f64,
    pub frame: usize,
}

impl Block {
    pub fn new(x: f64, y: f64) -> Self {
        Block { x, y, dx: 0.0, dy: 0.0, degrees: 0.0, frame: 0 }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x as i32, self.y as i32, BLOCK_SIZE, BLOCK_SIZE)
    }

    fn draw(&self, sprite: Sprite) -> DrawParams {
        DrawParams { sprite, dest: self.rect(), rotation: -self.degrees, flip: false }
    }
}

// ── Static geometry ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BarrierKind {
    Wall,
    Button,
}

/// Solid, immovable obstacle. Walls and buttons only differ in looks.
#[derive(Clone, Debug)]
pub struct Barrier {
    pub kind: BarrierKind,
    pub block: Block,
}

impl Barrier {
    pub fn wall(x: f64, y: f64) -> Self {
        Barrier { kind: BarrierKind::Wall, block: Block::new(x, y) }
    }

    pub fn button(x: f64, y: f64) -> Self {
        Barrier { kind: BarrierKind::Button, block: Block::new(x, y) }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.block.rect()
    }

    pub fn draw(&self) -> DrawParams {
        match self.kind {
            BarrierKind::Wall => self.block.draw(Sprite::Crate),
            BarrierKind::Button => self.block.draw(Sprite::Button),
        }
    }
}

/// Invisible gate to a neighbouring level.
#[derive(Clone, Debug)]
pub struct Border {
    pub block: Block,
    /// +1 forward, -1 backward.
    pub level_delta: i32,
}

impl Border {
    pub fn new(x: f64, y: f64, level_delta: i32) -> Self {
        Border { block: Block::new(x, y), level_delta }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.block.rect()
    }
}

// ── Enemies ──

#[derive(Clone, Debug)]
pub struct SawBlade {
    pub block: Block,
    /// Frame to show on the next step (0 or 1).
    pub phase: usize,
}

#[derive(Clone, Debug)]
pub struct ElectricBox {
    pub block: Block,
    /// 0..=8, wraps after 8.
    pub counter: u8,
}

#[derive(Clone, Debug)]
pub struct FallingBlock {
    pub block: Block,
}

/// Closed set of enemy behaviours; dispatched by `match`.
#[derive(Clone, Debug)]
pub enum Enemy {
    SawBlade(SawBlade),
    ElectricBox(ElectricBox),
    FallingBlock(FallingBlock),
}

impl Enemy {
    /// Saw blade with a random horizontal speed in [-2, 2).
    pub fn saw_blade<R: Rng + ?Sized>(x: f64, y: f64, rng: &mut R) -> Self {
        let mut block = Block::new(x, y);
        block.dx = rng.gen::<f64>() * 4.0 - 2.0;
        Enemy::SawBlade(SawBlade { block, phase: 0 })
    }

    pub fn electric_box(x: f64, y: f64) -> Self {
        Enemy::ElectricBox(ElectricBox { block: Block::new(x, y), counter: 0 })
    }

    pub fn falling_block(x: f64, y: f64) -> Self {
        Enemy::FallingBlock(FallingBlock { block: Block::new(x, y) })
    }

    pub fn block(&self) -> &Block {
        match self {
            Enemy::SawBlade(s) => &s.block,
            Enemy::ElectricBox(e) => &e.block,
            Enemy::FallingBlock(f) => &f.block,
        }
    }

    #[cfg(test)]
    pub fn block_mut(&mut self) -> &mut Block {
        match self {
            Enemy::SawBlade(s) => &mut s.block,
            Enemy::ElectricBox(e) => &mut e.block,
            Enemy::FallingBlock(f) => &mut f.block,
        }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.block().rect()
    }

    pub fn draw(&self) -> DrawParams {
        match self {
            Enemy::SawBlade(s) => {
                let sprite = if s.block.frame == 0 { Sprite::SawBlade0 } else { Sprite::SawBlade1 };
                s.block.draw(sprite)
            }
            Enemy::ElectricBox(e) => {
                let sprite = if e.block.frame == 0 { Sprite::Electric0 } else { Sprite::Electric1 };
                e.block.draw(sprite)
            }
            Enemy::FallingBlock(f) => f.block.draw(Sprite::Crate),
        }
    }
}

// ── Player ──

#[derive(Clone, Debug)]
pub struct Player {
    pub block: Block,
    /// Last safe position, restored on enemy contact.
    pub lx: f64,
    pub ly: f64,
    pub flip: bool,
}

impl Player {
    pub fn new(x: f64, y: f64) -> Self {
        Player { block: Block::new(x, y), lx: x, ly: y, flip: false }
    }

    pub fn spawn() -> Self {
        Player::new(PLAYER_SPAWN.0, PLAYER_SPAWN.1)
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.block.rect()
    }

    /// Remember the current position as the respawn point.
    pub fn mark_safe(&mut self) {
        self.lx = self.block.x;
        self.ly = self.block.y;
    }

    pub fn return_to_last(&mut self) {
        self.block.x = self.lx;
        self.block.y = self.ly;
    }

    /// The canary sprite sits 5 units left of its hitbox and bobs up
    /// 2 units while tilted.
    pub fn draw(&self) -> DrawParams {
        let sprite = if self.block.frame == 0 { Sprite::Canary0 } else { Sprite::Canary1 };
        let mut dest = self.rect();
        dest.x -= 5;
        if self.block.degrees != 0.0 {
            dest.y -= 2;
        }
        DrawParams { sprite, dest, rotation: -self.block.degrees, flip: self.flip }
    }
}

// ── Dropped feather ──

/// Cosmetic particle: sways around its origin while sinking, then expires.
#[derive(Clone, Debug)]
pub struct DroppedFeather {
    pub block: Block,
    pub ox: f64,
    pub oy: f64,
    /// -1 drifting left, +1 drifting right.
    pub dir: i32,
    /// How far from `ox` the feather may drift before turning.
    pub max_dist: f64,
    /// Ticks left to live.
    pub ttl: u32,
}

impl DroppedFeather {
    pub fn new<R: Rng + ?Sized>(x: f64, y: f64, rng: &mut R) -> Self {
        let mut block = Block::new(x, y);
        block.dx = (2.0 + rng.gen::<f64>() * 2.0) * 0.3;
        block.dy = (2.0 + rng.gen::<f64>() * 3.0) * 0.2;
        DroppedFeather {
            block,
            ox: x,
            oy: y,
            dir: if rng.gen_bool(0.5) { 1 } else { -1 },
            max_dist: rng.gen_range(4..46) as f64,
            ttl: FEATHER_LIFETIME,
        }
    }

    #[cfg(test)]
    pub fn with_lifetime(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Advance one tick.
    pub fn fall(&mut self) {
        let dir = self.dir as f64;
        self.block.x += dir * self.block.dx;
        self.block.degrees -= dir * 0.5;
        if (self.block.x - self.ox).abs() > self.max_dist {
            self.dir = -self.dir;
        }
        self.block.y += self.block.dy;
        self.ttl = self.ttl.saturating_sub(1);
    }

    pub fn expired(&self) -> bool {
        self.ttl == 0
    }

    pub fn draw(&self) -> DrawParams {
        self.block.draw(Sprite::Feather)
    }
}
