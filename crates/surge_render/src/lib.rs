pub mod camera;
pub mod render_queue;

pub use camera::Camera2D;
pub use render_queue::{zindex_offset, RenderKind, RenderNode, RenderQueue, Z_EPSILON};
