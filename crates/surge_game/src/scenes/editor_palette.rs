//! Grid of the entities the editor can place in its current mode.
//!
//! Closes with [`SceneResult::Palette`]: the chosen index, or `None` when the
//! palette was dismissed or had nothing to show.

use glam::Vec2;
use surge_core::{Button, Color, MouseBtn, Scene};
use surge_platform::video::SCREEN_WIDTH;

use crate::context::{GameContext, SceneArg, SceneResult};

const COLUMNS: usize = 3;
const ROWS: usize = 8;
const PAGE_SIZE: usize = COLUMNS * ROWS;
const CELL_SIZE: Vec2 = Vec2::new(SCREEN_WIDTH as f32 / COLUMNS as f32, 24.0);
const GRID_TOP: f32 = 24.0;

pub struct EditorPaletteScene {
    title: String,
    entries: Vec<String>,
    cursor: usize,
}

impl EditorPaletteScene {
    pub fn new() -> Self {
        Self {
            title: String::new(),
            entries: Vec::new(),
            cursor: 0,
        }
    }

    fn page(&self) -> usize {
        self.cursor / PAGE_SIZE
    }

    fn page_count(&self) -> usize {
        self.entries.len().div_ceil(PAGE_SIZE).max(1)
    }

    fn cell_origin(slot: usize) -> Vec2 {
        Vec2::new(
            (slot % COLUMNS) as f32 * CELL_SIZE.x,
            GRID_TOP + (slot / COLUMNS) as f32 * CELL_SIZE.y,
        )
    }

    /// Entry under a screen position on the current page.
    fn entry_at(&self, position: Vec2) -> Option<usize> {
        if position.x < 0.0 || position.y < GRID_TOP {
            return None;
        }
        let column = (position.x / CELL_SIZE.x) as usize;
        let row = ((position.y - GRID_TOP) / CELL_SIZE.y) as usize;
        if column >= COLUMNS || row >= ROWS {
            return None;
        }
        let index = self.page() * PAGE_SIZE + row * COLUMNS + column;
        (index < self.entries.len()).then_some(index)
    }

    fn move_cursor(&mut self, delta: isize) {
        let last = self.entries.len().saturating_sub(1) as isize;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    fn close(ctx: &mut GameContext, choice: Option<usize>) {
        ctx.set_result(SceneResult::Palette(choice));
        ctx.pop_scene();
    }
}

impl Default for EditorPaletteScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene<GameContext, SceneArg> for EditorPaletteScene {
    fn init(&mut self, _ctx: &mut GameContext, arg: SceneArg) {
        match arg {
            SceneArg::Palette { title, entries } => {
                self.title = title;
                self.entries = entries;
            }
            _ => log::warn!("Editor palette opened without entries"),
        }
        self.cursor = 0;
    }

    fn update(&mut self, ctx: &mut GameContext) {
        if self.entries.is_empty() || ctx.input.button_pressed(Button::Fire3) {
            Self::close(ctx, None);
            return;
        }
        if ctx.input.button_pressed(Button::Fire1) {
            Self::close(ctx, Some(self.cursor));
            return;
        }
        if ctx.input.is_mouse_just_pressed(MouseBtn::Left) {
            if let Some(index) = self.entry_at(ctx.input.mouse_position) {
                Self::close(ctx, Some(index));
                return;
            }
        }

        let input = &ctx.input;
        if input.button_pressed(Button::Right) {
            self.move_cursor(1);
        } else if input.button_pressed(Button::Left) {
            self.move_cursor(-1);
        } else if input.button_pressed(Button::Down) {
            self.move_cursor(COLUMNS as isize);
        } else if input.button_pressed(Button::Up) {
            self.move_cursor(-(COLUMNS as isize));
        } else if input.is_just_pressed(surge_core::Key::PageDown) {
            self.move_cursor(PAGE_SIZE as isize);
        } else if input.is_just_pressed(surge_core::Key::PageUp) {
            self.move_cursor(-(PAGE_SIZE as isize));
        }
    }

    fn render(&mut self, ctx: &mut GameContext) {
        let renderer = ctx.renderer.as_mut();
        let header = format!("{} ({}/{})", self.title, self.page() + 1, self.page_count());
        renderer.text(&header, Vec2::new(8.0, 8.0), Color::WHITE);

        let first = self.page() * PAGE_SIZE;
        let last = (first + PAGE_SIZE).min(self.entries.len());
        for (slot, index) in (first..last).enumerate() {
            let origin = Self::cell_origin(slot);
            let selected = index == self.cursor;
            if selected {
                renderer.rect(origin, CELL_SIZE, Color::rgba(255, 255, 0, 64), true);
            }
            let color = if selected { Color::YELLOW } else { Color::WHITE };
            renderer.text(&self.entries[index], origin + Vec2::new(4.0, 8.0), color);
        }
    }

    fn release(&mut self, _ctx: &mut GameContext) {}

    fn name(&self) -> &str {
        "editorpal"
    }
}
