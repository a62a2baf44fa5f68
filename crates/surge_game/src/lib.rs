//! Open Surge engine core: the level runtime, the editor, the scenes and the
//! main loop that drives them.

pub mod cli;
pub mod context;
pub mod editor;
pub mod engine;
pub mod level;
pub mod resource;
pub mod scenes;
pub mod scripting;
pub mod storyboard;
