//! Lua-hosted script classes and the objects spawned from them.

pub mod entities;
pub mod level_object;
pub mod object_graph;
pub mod tags;
pub mod vm;

pub use entities::{ScriptEntityManager, ScriptedDrawable};
pub use level_object::{LevelObject, LEVEL_HOOKS, LEVEL_METHODS};
pub use object_graph::{Handle, ObjectGraph, Value, NULL_HANDLE, ROOT_HANDLE};
pub use vm::{ScriptStatus, ScriptVm};
