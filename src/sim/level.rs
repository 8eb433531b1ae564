/// Level loader: turns a level image into world entities.
///
/// ## Sources
///   `LevelSource` hands out one RGBA image per level number. The shipped
///   source is `AssetDir`, which reads `<assets>/Level<n>.png`.
///
/// ## Encoding
///   Each pixel is one 30×30 tile. Pixel `(x, y)` lands at world
///   `(x*30 - 30, y*30 - 30)`, so the image's outer ring of pixels sits just
///   off-screen. Pixels are scanned column by column.
///
/// ## Color legend (RGBA):
///   (255,255,0)   SawBlade         (255,255,255) Wall
///   (0,0,255)     ElectricBox      (255,0,255)   Button
///   (0,255,255)   FallingBlock     (255,0,0)     Border, back one level
///                                  (0,255,0)     Border, forward one level
///   All colors must be fully opaque; anything else is empty space.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use rand::Rng;

use crate::domain::entity::{Barrier, Border, Enemy, Player};
use crate::error::GameError;
use crate::sim::world::WorldState;

/// World units per image pixel.
pub const TILE_SIZE: i32 = 30;

/// Where a player knocked above the screen is put back.
const TOP_CLAMP_Y: f64 = 28.0;

/// Supplies level images by number (levels start at 1).
pub trait LevelSource {
    fn level_image(&self, level: i32) -> Result<RgbaImage, GameError>;
}

/// Level images stored as `Level<n>.png` in an assets directory.
#[derive(Clone, Debug)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        AssetDir { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn level_path(&self, level: i32) -> PathBuf {
        self.root.join(format!("Level{level}.png"))
    }
}

impl LevelSource for AssetDir {
    fn level_image(&self, level: i32) -> Result<RgbaImage, GameError> {
        let path = self.level_path(level);
        match image::open(&path) {
            Ok(img) => Ok(img.to_rgba8()),
            Err(source) => Err(GameError::LevelImage { path, source }),
        }
    }
}

/// Entities decoded from one level image.
#[derive(Debug, Default)]
pub struct LevelLayout {
    pub enemies: Vec<Enemy>,
    pub barriers: Vec<Barrier>,
    pub borders: Vec<Border>,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// World position of the tile encoded by pixel `(px, py)`.
#[inline]
pub fn tile_to_world(px: u32, py: u32) -> (f64, f64) {
    let x = px as i32 * TILE_SIZE - TILE_SIZE;
    let y = py as i32 * TILE_SIZE - TILE_SIZE;
    (x as f64, y as f64)
}

/// Decode a level image. Saw blade speeds are drawn from `rng`.
pub fn decode<R: Rng + ?Sized>(img: &RgbaImage, rng: &mut R) -> LevelLayout {
    let mut layout = LevelLayout::default();

    for px in 0..img.width() {
        for py in 0..img.height() {
            let (x, y) = tile_to_world(px, py);
            match img.get_pixel(px, py).0 {
                [255, 255, 0, 255] => layout.enemies.push(Enemy::saw_blade(x, y, &mut *rng)),
                [0, 0, 255, 255] => layout.enemies.push(Enemy::electric_box(x, y)),
                [0, 255, 255, 255] => layout.enemies.push(Enemy::falling_block(x, y)),
                [255, 255, 255, 255] => layout.barriers.push(Barrier::wall(x, y)),
                [255, 0, 255, 255] => layout.barriers.push(Barrier::button(x, y)),
                [255, 0, 0, 255] => layout.borders.push(Border::new(x, y, -1)),
                [0, 255, 0, 255] => layout.borders.push(Border::new(x, y, 1)),
                _ => {}
            }
        }
    }

    layout
}

/// Nudge a player who arrived mid-flight so it does not start inside the
/// new level's geometry.
///
/// If the player already overlaps a border the correction is skipped
/// entirely, even when that leaves it inside a barrier.
pub fn settle_player(player: &mut Player, barriers: &[Barrier], borders: &[Border]) {
    if borders.iter().any(|b| b.rect().collides(&player.rect())) {
        return;
    }

    if player.block.y < 0.0 {
        player.block.y = TOP_CLAMP_Y;
    }

    for barrier in barriers {
        let r = barrier.rect();
        if r.collides(&player.rect()) && player.block.y >= r.y as f64 {
            player.block.y = r.bottom() as f64;
        }
    }
}

/// Replace the world's entities with the current level, then settle the
/// player into it. The player itself is kept.
pub fn load_level(world: &mut WorldState, source: &dyn LevelSource) -> Result<(), GameError> {
    populate(world, source)?;
    settle_player(&mut world.player, &world.barriers, &world.borders);
    Ok(())
}

/// First load of a session: there is no player to settle yet, so a fresh
/// one is placed at the spawn point afterwards.
pub fn boot_level(world: &mut WorldState, source: &dyn LevelSource) -> Result<(), GameError> {
    populate(world, source)?;
    world.player = Player::spawn();
    Ok(())
}

// ══════════════════════════════════════════════════════════════
// Internal
// ══════════════════════════════════════════════════════════════

fn populate(world: &mut WorldState, source: &dyn LevelSource) -> Result<(), GameError> {
    let img = source.level_image(world.level)?;
    let layout = decode(&img, &mut world.rng);

    log::info!(
        "level {} loaded: {}x{} px, {} barriers, {} enemies, {} borders",
        world.level,
        img.width(),
        img.height(),
        layout.barriers.len(),
        layout.enemies.len(),
        layout.borders.len(),
    );

    world.enemies = layout.enemies;
    world.barriers = layout.barriers;
    world.borders = layout.borders;
    world.feathers.clear();
    world.level_extent = (img.width() as i32 * TILE_SIZE, img.height() as i32 * TILE_SIZE);
    world.loads += 1;
    Ok(())
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
