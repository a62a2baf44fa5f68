pub mod audio;
pub mod event;
pub mod video;
pub mod window;

pub use audio::{Audio, SilentAudio};
pub use event::{Event, EventKind, EventQueue, ManualQueue, TimerSource};
pub use video::{screen_size, DrawCommand, Flip, RecordingRenderer, Renderer};
