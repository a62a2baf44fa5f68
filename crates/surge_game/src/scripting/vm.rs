//! Rust <-> Lua bridge for scripted objects.
//!
//! Script classes are Lua tables of methods registered with
//! `class(name, { tags = {...}, properties = {...} }, { method = function(self, ...) end })`.
//! Objects themselves live in the Rust [`ObjectGraph`]; Lua only sees
//! `ScriptHandle` userdata whose methods read and write that graph. Because
//! all object state is on the Rust side, reloading the scripts creates a
//! fresh Lua state and keeps every live object.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use glam::Vec2;
use mlua::prelude::*;
use uuid::Uuid;

use super::level_object::{install_level_class, LevelBinding};
use super::object_graph::{EntityInfo, Handle, ObjectGraph, Value, NULL_HANDLE, ROOT_HANDLE};
use super::tags::{TagSystem, TAG_ENTITY};
use crate::level::actor::Rect;

/// Class used for objects whose class was never defined.
pub const PLACEHOLDER_CLASS: &str = ".placeholder";

const PRELUDE: &str = r#"
__classes = {}
__class_tags = {}
__class_props = {}
class(".placeholder", { tags = {} }, {})
"#;

/// State shared between the engine and the Lua callbacks.
#[derive(Debug)]
pub struct ScriptWorld {
    pub graph: ObjectGraph,
    pub tags: TagSystem,
    /// What the `Level` object's methods work on.
    pub level: LevelBinding,
    classes: BTreeSet<String>,
    warned: BTreeSet<String>,
    active: bool,
}

impl Default for ScriptWorld {
    fn default() -> Self {
        Self {
            graph: ObjectGraph::new(),
            tags: TagSystem::new(),
            level: LevelBinding::default(),
            classes: BTreeSet::new(),
            warned: BTreeSet::new(),
            active: true,
        }
    }
}

impl ScriptWorld {
    pub fn class_exists(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Live entity holding `id`, or `NULL_HANDLE`. Id 0 is never held.
    pub fn find_entity_by_id(&self, id: u64) -> Handle {
        if id == 0 {
            return NULL_HANDLE;
        }
        self.graph
            .iter()
            .find(|(_, o)| !o.killed && o.entity.is_some_and(|e| e.id == id))
            .map_or(NULL_HANDLE, |(h, _)| h)
    }

    pub fn entity_info(&self, handle: Handle) -> Option<EntityInfo> {
        self.graph.get(handle).and_then(|o| o.entity)
    }

    /// Gives `handle` the id `id` unless another live entity holds it.
    pub fn set_entity_id(&mut self, handle: Handle, id: u64) -> bool {
        if id == 0 {
            return false;
        }
        let holder = self.find_entity_by_id(id);
        if !holder.is_null() && holder != handle {
            return false;
        }
        match self.graph.get_mut(handle).and_then(|o| o.entity.as_mut()) {
            Some(info) => {
                info.id = id;
                true
            }
            None => false,
        }
    }

    pub fn set_persistent(&mut self, handle: Handle, persistent: bool) {
        if let Some(info) = self.graph.get_mut(handle).and_then(|o| o.entity.as_mut()) {
            info.persistent = persistent;
        }
    }

    /// Moves the level's region of interest and refreshes which entities
    /// are active. Returns how many transient entities were dropped.
    pub fn set_level_roi(&mut self, roi: Rect) -> usize {
        let mut entities = std::mem::take(&mut self.level.entities);
        entities.set_roi(roi);
        let killed = entities.refresh(self);
        self.level.entities = entities;
        killed
    }

    /// A nonzero id no live entity uses.
    pub fn fresh_entity_id(&self) -> u64 {
        loop {
            let (hi, lo) = Uuid::new_v4().as_u64_pair();
            let id = hi ^ lo;
            if id != 0 && self.find_entity_by_id(id).is_null() {
                return id;
            }
        }
    }
}

pub type SharedWorld = Arc<Mutex<ScriptWorld>>;

pub(super) fn lock(world: &SharedWorld) -> MutexGuard<'_, ScriptWorld> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Status of the script runtime for display in the debug overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStatus {
    /// Every script file loaded.
    Loaded,
    /// At least one script file failed; its classes are placeholders.
    Error,
    /// No script files were found.
    Empty,
}

impl ScriptStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Loaded => "Scripts: loaded",
            Self::Error => "Scripts: ERROR",
            Self::Empty => "Scripts: none",
        }
    }
}

impl std::fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What a script sees of an object. Methods of the object's class are
/// reachable through it, so `obj:method(...)` runs the class method.
#[derive(Clone)]
pub struct ScriptHandle {
    pub handle: Handle,
    world: SharedWorld,
}

impl ScriptHandle {
    pub(super) fn new(handle: Handle, world: &SharedWorld) -> Self {
        Self {
            handle,
            world: Arc::clone(world),
        }
    }
}

impl LuaUserData for ScriptHandle {
    fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("handle", |_, this| Ok(this.handle.0));
        fields.add_field_method_get("name", |_, this| {
            Ok(lock(&this.world).graph.name(this.handle).unwrap_or_default().to_string())
        });
    }

    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("get", |lua, this, key: String| {
            let value = lock(&this.world).graph.property(this.handle, &key);
            value_to_lua(lua, &this.world, &value)
        });

        methods.add_method("set", |_, this, (key, value): (String, LuaValue)| {
            let value = lua_to_value(&value);
            lock(&this.world).graph.set_property(this.handle, &key, value);
            Ok(())
        });

        methods.add_method("position", |_, this, ()| {
            let p = lock(&this.world).graph.world_position(this.handle);
            Ok((p.x, p.y))
        });

        methods.add_method("set_position", |_, this, (x, y): (f32, f32)| {
            lock(&this.world).graph.set_world_position(this.handle, Vec2::new(x, y));
            Ok(())
        });

        methods.add_method("kill", |_, this, ()| {
            lock(&this.world).graph.kill(this.handle);
            Ok(())
        });

        methods.add_method("is_killed", |_, this, ()| Ok(lock(&this.world).graph.is_killed(this.handle)));

        methods.add_method("spawn", |lua, this, class: String| {
            let handle = spawn_object(lua, &this.world, this.handle, &class, None)?;
            Ok(ScriptHandle {
                handle,
                world: Arc::clone(&this.world),
            })
        });

        methods.add_method("parent", |_, this, ()| {
            let parent = lock(&this.world).graph.parent(this.handle);
            Ok((!parent.is_null() && parent != this.handle).then(|| ScriptHandle {
                handle: parent,
                world: Arc::clone(&this.world),
            }))
        });

        methods.add_method("child", |_, this, name: String| {
            let child = lock(&this.world).graph.child(this.handle, &name);
            Ok((!child.is_null()).then(|| ScriptHandle {
                handle: child,
                world: Arc::clone(&this.world),
            }))
        });

        methods.add_meta_method(LuaMetaMethod::Index, |lua, this, key: LuaValue| {
            let LuaValue::String(key) = key else {
                return Ok(LuaValue::Nil);
            };
            let name = match lock(&this.world).graph.name(this.handle) {
                Some(name) => name.to_string(),
                None => return Ok(LuaValue::Nil),
            };
            class_table(lua, &name)?.get::<LuaValue>(key)
        });

        methods.add_meta_method(LuaMetaMethod::Eq, |_, this, other: LuaUserDataRef<ScriptHandle>| {
            Ok(this.handle == other.handle)
        });
    }
}

pub(super) fn value_to_lua(lua: &Lua, world: &SharedWorld, value: &Value) -> LuaResult<LuaValue> {
    Ok(match value {
        Value::Null => LuaValue::Nil,
        Value::Bool(b) => LuaValue::Boolean(*b),
        Value::Number(n) => LuaValue::Number(*n),
        Value::String(s) => LuaValue::String(lua.create_string(s)?),
        Value::Handle(h) => LuaValue::UserData(lua.create_userdata(ScriptHandle {
            handle: *h,
            world: Arc::clone(world),
        })?),
    })
}

pub(super) fn lua_to_value(value: &LuaValue) -> Value {
    match value {
        LuaValue::Boolean(b) => Value::Bool(*b),
        LuaValue::Integer(i) => Value::Number(*i as f64),
        LuaValue::Number(n) => Value::Number(*n),
        LuaValue::String(s) => Value::String(s.to_string_lossy().into()),
        LuaValue::UserData(ud) => ud
            .borrow::<ScriptHandle>()
            .map_or(Value::Null, |h| Value::Handle(h.handle)),
        _ => Value::Null,
    }
}

fn class_table(lua: &Lua, name: &str) -> LuaResult<LuaTable> {
    let classes: LuaTable = lua.globals().get("__classes")?;
    match classes.get::<Option<LuaTable>>(name)? {
        Some(table) => Ok(table),
        None => classes.get(PLACEHOLDER_CLASS),
    }
}

/// Spawns `class` under `parent`, copies its default properties and runs `init`.
pub(super) fn spawn_object(lua: &Lua, world: &SharedWorld, parent: Handle, class: &str, at: Option<Vec2>) -> LuaResult<Handle> {
    let props: LuaTable = lua.globals().get("__class_props")?;
    let defaults: Vec<(String, Value)> = match props.get::<Option<LuaTable>>(class)? {
        Some(table) => table
            .pairs::<String, LuaValue>()
            .filter_map(Result::ok)
            .map(|(k, v)| (k, lua_to_value(&v)))
            .collect(),
        None => Vec::new(),
    };

    let handle = {
        let mut w = lock(world);
        if !w.classes.contains(class) && w.warned.insert(class.to_string()) {
            log::warn!("Unknown script class '{class}'; spawning a placeholder");
        }
        let handle = w.graph.spawn(parent, class);
        if let Some(position) = at {
            w.graph.set_world_position(handle, position);
        }
        for (key, value) in defaults {
            w.graph.set_property(handle, &key, value);
        }
        if w.tags.has_tag(class, TAG_ENTITY) {
            let info = EntityInfo {
                spawn_point: w.graph.world_position(handle),
                id: w.fresh_entity_id(),
                persistent: false,
            };
            if let Some(object) = w.graph.get_mut(handle) {
                object.entity = Some(info);
            }
        }
        handle
    };

    call_method(lua, world, handle, "init", Vec::new())?;
    Ok(handle)
}

/// Calls `method` on a live object. `Ok(None)` if its class lacks the method.
pub(super) fn call_method(
    lua: &Lua,
    world: &SharedWorld,
    handle: Handle,
    method: &str,
    args: Vec<LuaValue>,
) -> LuaResult<Option<LuaValue>> {
    let name = match lock(world).graph.get(handle) {
        Some(object) if !object.killed => object.name.clone(),
        _ => return Ok(None),
    };
    let class = class_table(lua, &name)?;
    let Some(function) = class.get::<Option<LuaFunction>>(method)? else {
        return Ok(None);
    };
    let this = lua.create_userdata(ScriptHandle {
        handle,
        world: Arc::clone(world),
    })?;
    let mut all = Vec::with_capacity(args.len() + 1);
    all.push(LuaValue::UserData(this));
    all.extend(args);
    function.call::<LuaValue>(LuaVariadic::from(all)).map(Some)
}

pub struct ScriptVm {
    lua: Lua,
    world: SharedWorld,
    files: Vec<PathBuf>,
    last_modified: Vec<Option<SystemTime>>,
    status: ScriptStatus,
    last_error: Option<String>,
}

impl ScriptVm {
    pub fn new() -> Result<Self, String> {
        let world: SharedWorld = Arc::new(Mutex::new(ScriptWorld::default()));
        let lua = create_lua(&world).map_err(|e| format!("Failed to set up the script API: {e}"))?;
        let mut vm = Self {
            lua,
            world,
            files: Vec::new(),
            last_modified: Vec::new(),
            status: ScriptStatus::Empty,
            last_error: None,
        };
        vm.sync_classes().map_err(|e| format!("Failed to register built-in classes: {e}"))?;
        Ok(vm)
    }

    pub fn status(&self) -> ScriptStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn world(&self) -> MutexGuard<'_, ScriptWorld> {
        lock(&self.world)
    }

    pub fn is_active(&self) -> bool {
        self.world().active
    }

    pub fn quit(&self) {
        self.world().active = false;
    }

    /// Loads every `.lua` file of `dir`, in name order. A missing directory is not an error.
    pub fn load_dir(&mut self, dir: &Path) -> usize {
        let mut paths: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "lua"))
                .collect(),
            Err(e) => {
                log::warn!("No script directory {}: {e}", dir.display());
                return 0;
            }
        };
        paths.sort();
        paths.into_iter().filter(|p| self.load_file(p).is_ok()).count()
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), String> {
        if !self.files.iter().any(|f| f == path) {
            self.files.push(path.to_path_buf());
            self.last_modified.push(modified(path));
        }
        let source = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read script {}: {e}", path.display()))
            .inspect_err(|msg| self.fail(msg))?;
        self.load_source(&path.to_string_lossy(), &source)
    }

    /// Runs a chunk of class definitions.
    pub fn load_source(&mut self, name: &str, source: &str) -> Result<(), String> {
        if let Err(e) = self.lua.load(source).set_name(name).exec() {
            let msg = format!("Script load error in {name}: {e}");
            self.fail(&msg);
            return Err(msg);
        }
        if let Err(e) = self.sync_classes() {
            let msg = format!("Failed to register classes from {name}: {e}");
            self.fail(&msg);
            return Err(msg);
        }
        if self.status != ScriptStatus::Error {
            self.status = ScriptStatus::Loaded;
        }
        log::info!("Script loaded: {name}");
        Ok(())
    }

    fn fail(&mut self, msg: &str) {
        log::error!("{msg}");
        self.status = ScriptStatus::Error;
        self.last_error = Some(msg.to_string());
    }

    fn sync_classes(&mut self) -> LuaResult<()> {
        let globals = self.lua.globals();
        let classes: LuaTable = globals.get("__classes")?;
        let class_tags: LuaTable = globals.get("__class_tags")?;
        let mut w = lock(&self.world);
        for pair in classes.pairs::<String, LuaValue>() {
            let (name, _) = pair?;
            if name != PLACEHOLDER_CLASS {
                w.classes.insert(name);
            }
        }
        for pair in class_tags.pairs::<String, LuaTable>() {
            let (name, tags) = pair?;
            for tag in tags.sequence_values::<String>() {
                w.tags.add_tag(&name, &tag?);
            }
        }
        w.tags.enforce_private_detached();
        Ok(())
    }

    /// Reloads every script into a fresh Lua state when a file changed. Live
    /// objects are kept.
    pub fn check_reload(&mut self) -> bool {
        let current: Vec<Option<SystemTime>> = self.files.iter().map(|f| modified(f)).collect();
        if current == self.last_modified {
            return false;
        }
        log::info!("Scripts changed, reloading");
        self.force_reload();
        true
    }

    pub fn force_reload(&mut self) {
        match create_lua(&self.world) {
            Ok(lua) => self.lua = lua,
            Err(e) => {
                self.fail(&format!("Failed to set up the script API: {e}"));
                return;
            }
        }
        {
            let mut w = lock(&self.world);
            w.classes.clear();
            w.tags.clear();
            w.warned.clear();
        }
        self.status = ScriptStatus::Empty;
        self.last_error = None;
        if let Err(e) = self.sync_classes() {
            self.fail(&format!("Failed to register built-in classes: {e}"));
        }
        let files = std::mem::take(&mut self.files);
        self.last_modified.clear();
        for file in &files {
            let _ = self.load_file(file);
        }
    }

    pub fn class_exists(&self, class: &str) -> bool {
        self.world().class_exists(class)
    }

    pub fn has_tag(&self, class: &str, tag: &str) -> bool {
        self.world().tags.has_tag(class, tag)
    }

    pub fn foreach_tagged(&self, tag: &str, f: impl FnMut(&str)) {
        self.world().tags.foreach_tagged(tag, f);
    }

    /// Does `class` define `method`?
    pub fn program_exists(&self, class: &str, method: &str) -> bool {
        let Ok(classes) = self.lua.globals().get::<LuaTable>("__classes") else {
            return false;
        };
        classes
            .get::<Option<LuaTable>>(class)
            .ok()
            .flatten()
            .is_some_and(|t| matches!(t.get::<LuaValue>(method), Ok(LuaValue::Function(_))))
    }

    /// Calls `f` with every method name of `class`, in name order.
    pub fn program_foreach(&self, class: &str, mut f: impl FnMut(&str)) {
        let Ok(table) = class_table(&self.lua, class) else {
            return;
        };
        let mut names: Vec<String> = table
            .pairs::<String, LuaValue>()
            .filter_map(Result::ok)
            .filter(|(_, v)| matches!(v, LuaValue::Function(_)))
            .map(|(k, _)| k)
            .collect();
        names.sort();
        for name in &names {
            f(name);
        }
    }

    /// Spawns an object under the root.
    pub fn spawn_temp(&self, class: &str) -> Result<Handle, String> {
        self.spawn_child(ROOT_HANDLE, class)
    }

    pub fn spawn_child(&self, parent: Handle, class: &str) -> Result<Handle, String> {
        spawn_object(&self.lua, &self.world, parent, class, None)
            .map_err(|e| format!("Failed to spawn '{class}': {e}"))
    }

    pub fn spawn_child_at(&self, parent: Handle, class: &str, position: Vec2) -> Result<Handle, String> {
        spawn_object(&self.lua, &self.world, parent, class, Some(position))
            .map_err(|e| format!("Failed to spawn '{class}': {e}"))
    }

    pub fn get(&self, handle: Handle, property: &str) -> Value {
        self.world().graph.property(handle, property)
    }

    pub fn set(&self, handle: Handle, property: &str, value: Value) {
        self.world().graph.set_property(handle, property, value);
    }

    pub fn exists(&self, handle: Handle) -> bool {
        self.world().graph.exists(handle)
    }

    pub fn is_killed(&self, handle: Handle) -> bool {
        self.world().graph.is_killed(handle)
    }

    pub fn kill(&self, handle: Handle) {
        self.world().graph.kill(handle);
    }

    pub fn name(&self, handle: Handle) -> Option<String> {
        self.world().graph.name(handle).map(str::to_string)
    }

    /// Exposes an object to scripts as a global.
    pub fn set_global(&self, name: &str, handle: Handle) -> Result<(), String> {
        let this = ScriptHandle {
            handle,
            world: Arc::clone(&self.world),
        };
        self.lua
            .globals()
            .set(name, this)
            .map_err(|e| format!("Failed to set global '{name}': {e}"))
    }

    /// Calls `method` with `args`. Fails if the object is dead or lacks the method.
    pub fn call(&self, handle: Handle, method: &str, args: &[Value]) -> Result<Value, String> {
        let lua_args = args
            .iter()
            .map(|a| value_to_lua(&self.lua, &self.world, a))
            .collect::<LuaResult<Vec<_>>>()
            .map_err(|e| format!("Failed to convert arguments for '{method}': {e}"))?;
        match call_method(&self.lua, &self.world, handle, method, lua_args) {
            Ok(Some(value)) => Ok(lua_to_value(&value)),
            Ok(None) => Err(format!("Script object {} has no method '{method}'", handle.0)),
            Err(e) => Err(format!("Script error in '{method}': {e}")),
        }
    }

    /// Calls `method` on every live object under `from` in preorder, skipping
    /// the subtrees of `skip`. Errors are logged per object.
    pub fn broadcast(&self, from: Handle, method: &str, args: &[Value], skip: &HashSet<Handle>) {
        let order = self.world().graph.preorder(from, &mut |h, _| !skip.contains(&h));
        call_each(&self.lua, &self.world, &order, method, args);
    }

    /// One tick of `update(dt)`.
    pub fn update(&self, dt: f32, inactive: &HashSet<Handle>) {
        self.broadcast(ROOT_HANDLE, "update", &[Value::Number(dt as f64)], inactive);
    }

    /// Second pass after physics.
    pub fn late_update(&self, dt: f32, inactive: &HashSet<Handle>) {
        self.broadcast(ROOT_HANDLE, "lateUpdate", &[Value::Number(dt as f64)], inactive);
    }

    pub fn collect_garbage(&self) -> usize {
        self.world().graph.collect_garbage()
    }
}

/// Calls `method` on each object of `order`. Errors are logged per object.
pub(super) fn call_each(lua: &Lua, world: &SharedWorld, order: &[Handle], method: &str, args: &[Value]) {
    for &handle in order {
        let lua_args = match args
            .iter()
            .map(|a| value_to_lua(lua, world, a))
            .collect::<LuaResult<Vec<_>>>()
        {
            Ok(a) => a,
            Err(e) => {
                log::error!("Failed to convert arguments for '{method}': {e}");
                return;
            }
        };
        if let Err(e) = call_method(lua, world, handle, method, lua_args) {
            let name = lock(world).graph.name(handle).unwrap_or_default().to_string();
            log::error!("Script error in {name}.{method}: {e}");
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

/// A Lua state with the class API and the prelude installed.
fn create_lua(world: &SharedWorld) -> LuaResult<Lua> {
    let lua = Lua::new();
    let globals = lua.globals();

    let class = lua.create_function(|lua, (name, options, methods): (String, Option<LuaTable>, Option<LuaTable>)| {
        let globals = lua.globals();
        let classes: LuaTable = globals.get("__classes")?;
        let class_tags: LuaTable = globals.get("__class_tags")?;
        let class_props: LuaTable = globals.get("__class_props")?;
        let methods = match methods {
            Some(m) => m,
            None => lua.create_table()?,
        };
        let (tags, props) = match options {
            Some(options) => (
                options.get::<Option<LuaTable>>("tags")?,
                options.get::<Option<LuaTable>>("properties")?,
            ),
            None => (None, None),
        };
        classes.set(name.as_str(), methods)?;
        class_tags.set(name.as_str(), match tags {
            Some(t) => t,
            None => lua.create_table()?,
        })?;
        if let Some(props) = props {
            class_props.set(name.as_str(), props)?;
        }
        Ok(())
    })?;
    globals.set("class", class)?;

    let exit_world = Arc::clone(world);
    let exit = lua.create_function(move |_, ()| {
        lock(&exit_world).active = false;
        Ok(())
    })?;
    globals.set("exit", exit)?;

    let print = lua.create_function(|_, message: String| {
        log::info!("[script] {message}");
        Ok(())
    })?;
    globals.set("print", print)?;

    let spawn_world = Arc::clone(world);
    let spawn = lua.create_function(move |lua, class: String| {
        let handle = spawn_object(lua, &spawn_world, ROOT_HANDLE, &class, None)?;
        Ok(ScriptHandle {
            handle,
            world: Arc::clone(&spawn_world),
        })
    })?;
    globals.set("spawn", spawn)?;

    lua.load(PRELUDE).set_name("prelude").exec()?;
    install_level_class(&lua, world)?;
    Ok(lua)
}
