//! Parallax backgrounds and foregrounds (`bgtheme`).
//!
//! A theme is a JSON list of layers. Layers with a z-index above 0.5 are
//! drawn in front of the level.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::Deserialize;
use surge_core::Color;
use surge_platform::{screen_size, Flip, Renderer};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerBehavior {
    #[default]
    Default,
    /// Elliptical drift; angular speeds in radians per second.
    Circular {
        amplitude: [f32; 2],
        angular_speed: [f32; 2],
        #[serde(default)]
        initial_phase: [f32; 2],
    },
    /// Constant drift in pixels per second.
    Linear { speed: [f32; 2] },
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayerEntry {
    pub sprite: String,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub initial_position: [f32; 2],
    #[serde(default)]
    pub scroll_speed: [f32; 2],
    #[serde(default)]
    pub repeat_x: bool,
    #[serde(default)]
    pub repeat_y: bool,
    #[serde(default)]
    pub zindex: f32,
    #[serde(default)]
    pub behavior: LayerBehavior,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackgroundFile {
    pub layers: Vec<LayerEntry>,
}

#[derive(Debug, Clone)]
struct Layer {
    entry: LayerEntry,
    offset: Vec2,
    elapsed: f32,
}

impl Layer {
    fn update(&mut self, dt: f32) {
        match self.entry.behavior {
            LayerBehavior::Default => {}
            LayerBehavior::Linear { speed } => {
                self.offset += Vec2::from(speed) * dt;
            }
            LayerBehavior::Circular {
                amplitude,
                angular_speed,
                initial_phase,
            } => {
                self.elapsed += dt;
                let t = self.elapsed;
                let c = (angular_speed[0] * t + initial_phase[0]).cos();
                let s = (angular_speed[1] * t + initial_phase[1]).sin();
                self.offset.x += amplitude[0] * angular_speed[0] * c * dt;
                self.offset.y += amplitude[1] * angular_speed[1] * s * dt;
            }
        }
    }

    fn is_foreground(&self) -> bool {
        self.entry.zindex > 0.5
    }

    /// Screen positions of every visible tile of this layer.
    fn tiles(&self, camera: Vec2) -> Vec<Vec2> {
        let screen = screen_size();
        let top_left = camera - screen * 0.5;
        let scroll = Vec2::from(self.entry.scroll_speed) * top_left;
        let mut position = (Vec2::from(self.entry.initial_position) + self.offset + scroll).round();
        let size = Vec2::new(self.entry.width.max(1.0), self.entry.height.max(1.0));

        let (mut cols, mut rows) = (1, 1);
        if self.entry.repeat_x {
            position.x = position.x.rem_euclid(size.x) - size.x;
            cols = 3 + (screen.x / size.x) as i32;
        }
        if self.entry.repeat_y {
            position.y = position.y.rem_euclid(size.y) - size.y;
            rows = 3 + (screen.y / size.y) as i32;
        }

        let mut tiles = Vec::new();
        for y in 0..rows {
            for x in 0..cols {
                let p = position + Vec2::new(x as f32 * size.x, y as f32 * size.y);
                let visible = p.x < screen.x && p.y < screen.y && p.x + size.x > 0.0 && p.y + size.y > 0.0;
                if visible {
                    tiles.push(p);
                }
            }
        }
        tiles
    }

    fn render(&self, renderer: &mut dyn Renderer, camera: Vec2) {
        let size = Vec2::new(self.entry.width, self.entry.height);
        for tile in self.tiles(camera) {
            renderer.sprite(&self.entry.sprite, tile, size, Flip::default(), Color::WHITE);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Background {
    path: String,
    layers: Vec<Layer>,
}

impl Background {
    pub fn from_file(path: &str, file: BackgroundFile) -> Self {
        let mut layers: Vec<Layer> = file
            .layers
            .into_iter()
            .map(|entry| Layer {
                entry,
                offset: Vec2::ZERO,
                elapsed: 0.0,
            })
            .collect();
        layers.sort_by(|a, b| a.entry.zindex.total_cmp(&b.entry.zindex));
        Self {
            path: path.to_string(),
            layers,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn foreground_count(&self) -> usize {
        self.layers.iter().filter(|l| l.is_foreground()).count()
    }

    pub fn update(&mut self, dt: f32) {
        for layer in &mut self.layers {
            layer.update(dt);
        }
    }

    pub fn render_background(&self, renderer: &mut dyn Renderer, camera: Vec2) {
        for layer in self.layers.iter().filter(|l| !l.is_foreground()) {
            layer.render(renderer, camera);
        }
    }

    pub fn render_foreground(&self, renderer: &mut dyn Renderer, camera: Vec2) {
        for layer in self.layers.iter().filter(|l| l.is_foreground()) {
            layer.render(renderer, camera);
        }
    }
}

pub fn load_background_from_path(path: &Path, name: &str) -> Result<Background, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read background {}: {e}", path.display()))?;
    let file: BackgroundFile = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse background JSON {}: {e}", path.display()))?;
    validate_background(&file)?;
    log::info!("Loaded background {} ({} layers)", path.display(), file.layers.len());
    Ok(Background::from_file(name, file))
}

fn validate_background(file: &BackgroundFile) -> Result<(), String> {
    for (index, layer) in file.layers.iter().enumerate() {
        if layer.width <= 0.0 || layer.height <= 0.0 {
            return Err(format!(
                "Background validation failed: layer {index} ('{}') has an empty size",
                layer.sprite
            ));
        }
        if !(0.0..=1.0).contains(&layer.zindex) {
            return Err(format!(
                "Background validation failed: layer {index} zindex {} is outside 0..1",
                layer.zindex
            ));
        }
    }
    Ok(())
}
