pub mod color;
pub mod event;
pub mod input;
pub mod prefs;
pub mod scene;
pub mod time;

pub use color::Color;
pub use event::{EventDispatcher, ListenerId, Typed};
pub use input::{Button, InputMap, InputState, Key, MouseBtn};
pub use prefs::Preferences;
pub use scene::{Scene, SceneId, SceneStack, SCENE_STACK_CAPACITY};
pub use time::{Timer, TARGET_FPS};

/// Engine version as (major, minor, patch). Levels may require at least this.
pub const ENGINE_VERSION: (u32, u32, u32) = (0, 6, 1);

pub fn engine_version_string() -> String {
    let (major, minor, patch) = ENGINE_VERSION;
    format!("{major}.{minor}.{patch}")
}
