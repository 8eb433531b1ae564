/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The 660×390 playfield is drawn at 15 world units per column and 30 per
/// row, so one 30×30 tile becomes two terminal columns on one row.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::{DrawParams, Sprite};
use crate::sim::world::{Mode, Overlay, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the gaps
    /// between rows match the cells on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel cell used to invalidate the back buffer.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Background color currently at (x, y), so glyphs can sit on the sky.
    fn bg_at(&self, x: usize, y: usize) -> Color {
        self.get(x, y).bg
    }

    /// Write a string at (x, y). Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn put_centered(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let len = s.chars().count();
        let x = PLAYFIELD_COLS.saturating_sub(len) / 2;
        self.put_str(x, y, s, fg, bg);
    }
}

// ── Layout ──

/// World units covered by one terminal column / row.
const UNITS_PER_COL: f64 = 15.0;
const UNITS_PER_ROW: f64 = 30.0;

/// Visible playfield in terminal cells (660×390 world units).
pub const PLAYFIELD_COLS: usize = 44;
pub const PLAYFIELD_ROWS: usize = 13;

/// The invincibility tag blinks with this half-period, in ticks.
const BLINK_TICKS: u64 = 30;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
const MSG_ROW: usize = MAP_ROW + PLAYFIELD_ROWS + 1;
const HELP_ROW: usize = MSG_ROW + 1;

const SKY_TOP: (u8, u8, u8) = (70, 130, 190);
const SKY_BOTTOM: (u8, u8, u8) = (150, 200, 230);
const HUD_BG: Color = Color::Rgb { r: 30, g: 50, b: 90 };
const OVERLAY_BG: Color = Color::Rgb { r: 25, g: 25, b: 45 };
const CANARY: Color = Color::Rgb { r: 255, g: 220, b: 40 };

/// Terminal cell under the world point `(x, y)`, or `None` off-screen.
/// Points are rounded to the nearest cell so a 28-wide block lands on the
/// two columns it mostly covers.
pub fn world_to_cell(x: f64, y: f64) -> Option<(usize, usize)> {
    let col = ((x + UNITS_PER_COL / 2.0) / UNITS_PER_COL).floor();
    let row = ((y + UNITS_PER_ROW / 2.0) / UNITS_PER_ROW).floor();
    if col < 0.0 || row < 0.0 || col >= PLAYFIELD_COLS as f64 || row >= PLAYFIELD_ROWS as f64 {
        return None;
    }
    Some((col as usize, row as usize))
}

/// Two-column glyph and color for a sprite.
fn glyph(p: &DrawParams) -> ([char; 2], Color) {
    match p.sprite {
        Sprite::Crate => (['▓', '▓'], Color::Rgb { r: 150, g: 100, b: 50 }),
        Sprite::Button => (['◖', '◗'], Color::Rgb { r: 230, g: 80, b: 230 }),
        Sprite::SawBlade0 => (['<', '>'], Color::Rgb { r: 200, g: 200, b: 210 }),
        Sprite::SawBlade1 => (['>', '<'], Color::Rgb { r: 200, g: 200, b: 210 }),
        Sprite::Electric0 => (['#', '#'], Color::Rgb { r: 255, g: 255, b: 120 }),
        Sprite::Electric1 => (['[', ']'], Color::Rgb { r: 90, g: 110, b: 255 }),
        Sprite::Canary0 if p.flip => (['<', ')'], CANARY),
        Sprite::Canary0 => (['(', '>'], CANARY),
        Sprite::Canary1 => {
            // Tumbling: pick the body glyph from how far it has rolled.
            let turned = p.rotation.rem_euclid(360.0);
            let body = if (90.0..270.0).contains(&turned) { 'v' } else { '~' };
            if p.flip { (['<', body], CANARY) } else { ([body, '>'], CANARY) }
        }
        Sprite::Feather => {
            let ch = if p.rotation.rem_euclid(180.0) < 90.0 { '\'' } else { ',' };
            ([ch, ' '], Color::Rgb { r: 255, g: 240, b: 160 })
        }
    }
}

/// Columns and rows covered by the loaded level, capped to the playfield.
/// Nothing loaded yet means the whole field.
fn visible_cells(extent: (i32, i32)) -> (usize, usize) {
    if extent.0 <= 0 || extent.1 <= 0 {
        return (PLAYFIELD_COLS, PLAYFIELD_ROWS);
    }
    let cols = (extent.0 as f64 / UNITS_PER_COL).ceil() as usize;
    let rows = (extent.1 as f64 / UNITS_PER_ROW).ceil() as usize;
    (cols.min(PLAYFIELD_COLS), rows.min(PLAYFIELD_ROWS))
}

fn sky_color(row: usize) -> Color {
    let t = row as f32 / (PLAYFIELD_ROWS - 1) as f32;
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) as u8;
    Color::Rgb {
        r: mix(SKY_TOP.0, SKY_BOTTOM.0),
        g: mix(SKY_TOP.1, SKY_BOTTOM.1),
        b: mix(SKY_TOP.2, SKY_BOTTOM.2),
    }
}

/// Scattered cloud wisps that scroll with the background offset.
fn background_char(col: usize, row: usize, offset: (i32, i32)) -> char {
    let px = (col as i32 * UNITS_PER_COL as i32 - offset.0).rem_euclid(180);
    let py = (row as i32 * UNITS_PER_ROW as i32 - offset.1).rem_euclid(120);
    match (px / 15, py / 30) {
        (0, 0) | (1, 0) => '░',
        (6, 2) => '·',
        _ => ' ',
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_mode: Option<Mode>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_mode: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    /// Draw one frame. `pad_connected` adds a gamepad tag to the HUD.
    pub fn render(&mut self, world: &WorldState, pad_connected: bool) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        let resized = tw as usize != self.term_w || th as usize != self.term_h;
        if resized {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
        }

        // Clean transition on resize or mode change.
        if resized || self.last_mode != Some(world.mode) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_mode = Some(world.mode);
        }

        self.front.clear();
        compose(&mut self.front, world, pad_connected);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(Color::White), SetBackgroundColor(Cell::BASE_BG))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }
}

// ── Compose: build front buffer content ──

fn compose(buf: &mut FrameBuffer, w: &WorldState, pad_connected: bool) {
    compose_hud(buf, w, pad_connected);
    compose_playfield(buf, w);

    if w.mode == Mode::OutOfGame {
        match w.overlay {
            Overlay::Intro => compose_intro(buf),
            Overlay::Finish => compose_finish(buf, w),
        }
    }

    if !w.message.is_empty() {
        let msg = format!(" {} ", w.message);
        buf.put_str(0, MSG_ROW, &msg, Color::Black, Color::Rgb { r: 200, g: 180, b: 50 });
    }

    let help = " A/D move  SPACE flap  P pause  ESC quit";
    buf.put_str(0, HELP_ROW, help, Color::DarkGrey, Color::Reset);
}

fn compose_hud(buf: &mut FrameBuffer, w: &WorldState, pad_connected: bool) {
    for x in 0..PLAYFIELD_COLS {
        buf.set(x, HUD_ROW, Cell::new(' ', Color::White, HUD_BG));
    }
    let shown = w.level.min(w.final_level);
    let mut hud = format!(" Kukaroo!  Level {}/{}", shown, w.final_level);
    let blink_on = w.mode == Mode::OutOfGame || (w.tick / BLINK_TICKS) % 2 == 0;
    if w.invincible && blink_on {
        hud.push_str("  [INVINCIBLE]");
    }
    buf.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

    if pad_connected {
        let tag = "[PAD] ";
        buf.put_str(PLAYFIELD_COLS - tag.len(), HUD_ROW, tag, Color::Rgb { r: 120, g: 220, b: 120 }, HUD_BG);
    }
}

/// Sky and sprites, clipped to the loaded level's extent. Cells past the
/// level image stay blank.
fn compose_playfield(buf: &mut FrameBuffer, w: &WorldState) {
    let clip = visible_cells(w.level_extent);
    for row in 0..clip.1 {
        let sky = sky_color(row);
        for col in 0..clip.0 {
            let ch = background_char(col, row, w.background);
            buf.set(col, MAP_ROW + row, Cell::new(ch, Color::Rgb { r: 235, g: 240, b: 250 }, sky));
        }
    }

    for b in &w.barriers {
        put_sprite(buf, &b.draw(), clip);
    }
    for f in &w.feathers {
        put_sprite(buf, &f.draw(), clip);
    }
    for e in &w.enemies {
        put_sprite(buf, &e.draw(), clip);
    }
    put_sprite(buf, &w.player.draw(), clip);
}

fn put_sprite(buf: &mut FrameBuffer, p: &DrawParams, clip: (usize, usize)) {
    let Some((col, row)) = world_to_cell(p.dest.x as f64, p.dest.y as f64) else {
        return;
    };
    if row >= clip.1 {
        return;
    }
    let (chars, fg) = glyph(p);
    for (i, ch) in chars.into_iter().enumerate() {
        let x = col + i;
        if ch == ' ' || x >= clip.0 {
            continue;
        }
        let y = MAP_ROW + row;
        let bg = buf.bg_at(x, y);
        buf.set(x, y, Cell::new(ch, fg, bg));
    }
}

fn overlay_box(buf: &mut FrameBuffer, top: usize, height: usize) {
    for y in MAP_ROW + top..MAP_ROW + top + height {
        for x in 4..PLAYFIELD_COLS - 4 {
            buf.set(x, y, Cell::new(' ', Color::White, OVERLAY_BG));
        }
    }
}

fn compose_intro(buf: &mut FrameBuffer) {
    overlay_box(buf, 2, 9);
    let y = MAP_ROW + 3;
    buf.put_centered(y, "K U K A R O O !", CANARY, OVERLAY_BG);
    buf.put_centered(y + 2, "Fly the canary home.", Color::White, OVERLAY_BG);
    buf.put_centered(y + 3, "Dodge saws, sparks and", Color::White, OVERLAY_BG);
    buf.put_centered(y + 4, "falling crates.", Color::White, OVERLAY_BG);
    buf.put_centered(y + 6, "SPACE to start", Color::Rgb { r: 80, g: 255, b: 80 }, OVERLAY_BG);
}

fn compose_finish(buf: &mut FrameBuffer, w: &WorldState) {
    overlay_box(buf, 2, 9);
    let y = MAP_ROW + 3;
    buf.put_centered(y, "* YOU MADE IT! *", CANARY, OVERLAY_BG);
    let cleared = format!("All {} levels cleared.", w.final_level);
    buf.put_centered(y + 2, &cleared, Color::White, OVERLAY_BG);
    buf.put_centered(y + 6, "SPACE to fly again", Color::Rgb { r: 80, g: 255, b: 80 }, OVERLAY_BG);
}
