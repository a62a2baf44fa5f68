//! Dialog regions and the dialog box they open.

use glam::Vec2;
use surge_core::Color;
use surge_platform::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use surge_platform::{Flip, Renderer};

use super::actor::Rect;
use super::lev::DialogLine;

/// Milliseconds a dialog box stays open.
pub const DLGBOX_MAXTIME: u32 = 7000;
/// Regions are ignored right after the level starts.
const WARMUP_SECONDS: f32 = 2.0;
const BOX_SIZE: Vec2 = Vec2::new(272.0, 60.0);

#[derive(Debug, Clone, PartialEq)]
pub struct DialogRegion {
    pub rect: Rect,
    pub title: String,
    pub message: String,
    pub disabled: bool,
}

impl From<&DialogLine> for DialogRegion {
    fn from(line: &DialogLine) -> Self {
        Self {
            rect: Rect::new(line.x as f32, line.y as f32, line.width as f32, line.height as f32),
            title: line.title.clone(),
            message: line.message.clone(),
            disabled: false,
        }
    }
}

impl DialogRegion {
    pub fn to_line(&self) -> DialogLine {
        DialogLine {
            x: self.rect.x as i32,
            y: self.rect.y as i32,
            width: self.rect.w as i32,
            height: self.rect.h as i32,
            title: self.title.clone(),
            message: self.message.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DialogBox {
    active: bool,
    title: String,
    message: String,
    elapsed_ms: u32,
    /// Region that opened the box, if any.
    region: Option<usize>,
    y: f32,
}

impl Default for DialogBox {
    fn default() -> Self {
        Self {
            active: false,
            title: String::new(),
            message: String::new(),
            elapsed_ms: 0,
            region: None,
            y: SCREEN_HEIGHT as f32,
        }
    }
}

impl DialogBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Opens the box. Calling it again with the same text keeps the timer running.
    pub fn show(&mut self, title: &str, message: &str) {
        if self.active && self.title == title && self.message == message {
            return;
        }
        self.active = true;
        self.elapsed_ms = 0;
        self.region = None;
        self.title = title.to_string();
        self.message = message.to_string();
    }

    pub fn hide(&mut self) {
        self.active = false;
        self.region = None;
    }

    /// Opens the first enabled region the player touches and closes the box
    /// when its timer runs out or the player leaves the region.
    pub fn update(&mut self, regions: &mut [DialogRegion], player_box: Option<Rect>, level_time: f32, dt: f32) {
        if level_time >= WARMUP_SECONDS {
            if let Some(bb) = player_box {
                if let Some(index) = regions.iter().position(|r| !r.disabled && r.rect.intersects(&bb)) {
                    let region = &mut regions[index];
                    region.disabled = true;
                    let (title, message) = (region.title.clone(), region.message.clone());
                    self.show(&title, &message);
                    self.region = Some(index);
                }
                if let Some(index) = self.region {
                    if regions.get(index).is_some_and(|r| !r.rect.intersects(&bb)) {
                        self.hide();
                    }
                }
            }
        }

        let speed = SCREEN_HEIGHT as f32 * 0.5;
        if self.active {
            self.elapsed_ms += (dt * 1000.0) as u32;
            if self.elapsed_ms >= DLGBOX_MAXTIME {
                self.hide();
                return;
            }
            let rest = SCREEN_HEIGHT as f32 - BOX_SIZE.y * 1.3;
            self.y = (self.y - speed * dt).max(rest);
        } else {
            self.y = (self.y + speed * dt).min(SCREEN_HEIGHT as f32);
        }
    }

    /// Draws in screen space.
    pub fn render(&self, renderer: &mut dyn Renderer) {
        if self.y >= SCREEN_HEIGHT as f32 {
            return;
        }
        let position = Vec2::new((SCREEN_WIDTH as f32 - BOX_SIZE.x) * 0.5, self.y);
        renderer.sprite("SD_DIALOGBOX", position, BOX_SIZE, Flip::default(), Color::WHITE);
        renderer.text(&self.title, position + Vec2::new(7.0, 8.0), Color::YELLOW);
        renderer.text(&self.message, position + Vec2::new(7.0, 20.0), Color::WHITE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> DialogRegion {
        DialogRegion {
            rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            title: "Hint".to_string(),
            message: "Jump!".to_string(),
            disabled: false,
        }
    }

    #[test]
    fn regions_open_once_after_warmup() {
        let mut regions = vec![region()];
        let mut dialog = DialogBox::new();
        let inside = Some(Rect::new(10.0, 10.0, 10.0, 10.0));

        dialog.update(&mut regions, inside, 1.0, 0.016);
        assert!(!dialog.is_active());

        dialog.update(&mut regions, inside, 2.5, 0.016);
        assert!(dialog.is_active());
        assert_eq!(dialog.title(), "Hint");
        assert!(regions[0].disabled);
    }

    #[test]
    fn dialog_closes_when_the_player_leaves() {
        let mut regions = vec![region()];
        let mut dialog = DialogBox::new();
        dialog.update(&mut regions, Some(Rect::new(10.0, 10.0, 10.0, 10.0)), 3.0, 0.016);
        dialog.update(&mut regions, Some(Rect::new(500.0, 10.0, 10.0, 10.0)), 3.0, 0.016);
        assert!(!dialog.is_active());
    }

    #[test]
    fn dialog_times_out() {
        let mut dialog = DialogBox::new();
        dialog.show("a", "b");
        for _ in 0..7 {
            dialog.update(&mut [], None, 0.0, 0.99);
        }
        assert!(dialog.is_active());
        dialog.update(&mut [], None, 0.0, 0.5);
        assert!(!dialog.is_active());
    }
}
