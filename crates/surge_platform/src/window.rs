use std::sync::Arc;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Fullscreen, Window, WindowAttributes};

use crate::video::{SCREEN_HEIGHT, SCREEN_WIDTH};

pub struct PlatformConfig {
    pub title: String,
    /// Integer scale of the logical screen, 1..=4.
    pub scale: u32,
    pub fullscreen: bool,
}

impl PlatformConfig {
    pub fn width(&self) -> u32 {
        SCREEN_WIDTH * self.scale.clamp(1, 4)
    }

    pub fn height(&self) -> u32 {
        SCREEN_HEIGHT * self.scale.clamp(1, 4)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Open Surge".to_string(),
            scale: 2,
            fullscreen: false,
        }
    }
}

pub fn create_window(
    event_loop: &ActiveEventLoop,
    config: &PlatformConfig,
) -> Result<Arc<Window>, String> {
    let mut attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width(), config.height()));
    if config.fullscreen {
        attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }

    let window = event_loop
        .create_window(attrs)
        .map_err(|e| format!("Failed to create window: {e}"))?;
    Ok(Arc::new(window))
}
