//! The `Level` script object.
//!
//! Scripts see the level as a regular object named `Level`, a child of the
//! application root, exposed through the global of the same name. Entities
//! and setup objects are spawned as its children. Every name in
//! [`LEVEL_METHODS`] is a native method of the `Level` class, so scripts and
//! the engine drive the same code. [`LEVEL_HOOKS`] are broadcast by the
//! engine to the level's objects.

use std::collections::HashSet;
use std::sync::Arc;

use glam::Vec2;
use mlua::prelude::*;

use super::entities::ScriptEntityManager;
use super::object_graph::{Handle, Value, NULL_HANDLE, ROOT_HANDLE};
use super::tags::TAG_ENTITY;
use super::vm::{call_each, lock, lua_to_value, spawn_object, ScriptHandle, ScriptVm, ScriptWorld, SharedWorld};
use crate::level::actor::Rect;
use crate::level::error::LevelError;

pub const LEVEL_CLASS: &str = "Level";

/// Methods of the `Level` class.
pub const LEVEL_METHODS: &[&str] = &[
    "spawn",
    "spawnEntity",
    "onLevelLoad",
    "onLevelUnload",
    "__spawnSetupObjects",
    "__registerSetupObjectName",
    "get_debugMode",
    "set_debugMode",
    "setROI",
    "notifyEntities",
    "entity",
    "entityId",
    "findEntity",
];

/// Methods the engine calls on the level's objects each frame.
pub const LEVEL_HOOKS: &[&str] = &["lateUpdate", "render"];

const DEBUG_MODE: &str = "debugMode";

/// Level state the `Level` methods share with the engine.
#[derive(Debug, Default)]
pub struct LevelBinding {
    pub handle: Handle,
    /// Setup object names, most recently registered first.
    pub setup: Vec<String>,
    pub entities: ScriptEntityManager,
}

impl LevelBinding {
    pub fn register_setup_object_name(&mut self, name: &str) {
        if !self.setup.iter().any(|s| s == name) {
            self.setup.insert(0, name.to_string());
        }
    }
}

/// Can `class` be spawned as an entity?
fn check_entity_class(world: &ScriptWorld, class: &str) -> Result<(), LevelError> {
    if !world.class_exists(class) {
        return Err(LevelError::UnknownEntity(class.to_string()));
    }
    if !world.tags.has_tag(class, TAG_ENTITY) {
        return Err(LevelError::NotAnEntity(class.to_string()));
    }
    Ok(())
}

/// Live objects under `level`, the level itself and inactive subtrees excluded.
fn level_objects(world: &ScriptWorld, level: Handle) -> Vec<Handle> {
    let inactive = world.level.entities.inactive();
    let mut order = world.graph.preorder(level, &mut |h, _| !inactive.contains(&h));
    order.retain(|h| *h != level);
    order
}

fn notify(lua: &Lua, world: &SharedWorld, level: Handle, method: &str, args: &[Value]) {
    let order = level_objects(&lock(world), level);
    call_each(lua, world, &order, method, args);
}

fn handle_or_nil(world: &SharedWorld, handle: Handle) -> Option<ScriptHandle> {
    (!handle.is_null()).then(|| ScriptHandle::new(handle, world))
}

/// Registers the `Level` class with its native methods. Runs for every new
/// Lua state, so the bindings survive a script reload.
pub(super) fn install_level_class(lua: &Lua, world: &SharedWorld) -> LuaResult<()> {
    let methods = lua.create_table()?;

    let w = Arc::clone(world);
    methods.set(
        "spawn",
        lua.create_function(move |lua, (this, class): (LuaUserDataRef<ScriptHandle>, String)| {
            let parent = this.handle;
            drop(this);
            let handle = spawn_object(lua, &w, parent, &class, None)?;
            Ok(ScriptHandle::new(handle, &w))
        })?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "spawnEntity",
        lua.create_function(
            move |lua, (this, class, x, y): (LuaUserDataRef<ScriptHandle>, String, Option<f32>, Option<f32>)| {
                let parent = this.handle;
                drop(this);
                check_entity_class(&lock(&w), &class).map_err(|e| LuaError::runtime(e.to_string()))?;
                let at = Vec2::new(x.unwrap_or(0.0), y.unwrap_or(0.0));
                let handle = spawn_object(lua, &w, parent, &class, Some(at))?;
                Ok(ScriptHandle::new(handle, &w))
            },
        )?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "setROI",
        lua.create_function(
            move |_, (_this, x, y, width, height): (LuaUserDataRef<ScriptHandle>, f32, f32, f32, f32)| {
                Ok(lock(&w).set_level_roi(Rect::new(x, y, width, height)))
            },
        )?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "notifyEntities",
        lua.create_function(
            move |lua, (this, method, args): (LuaUserDataRef<ScriptHandle>, String, LuaVariadic<LuaValue>)| {
                let level = this.handle;
                drop(this);
                let args: Vec<Value> = args.iter().map(lua_to_value).collect();
                notify(lua, &w, level, &method, &args);
                Ok(())
            },
        )?,
    )?;

    for event in ["onLevelLoad", "onLevelUnload"] {
        let w = Arc::clone(world);
        methods.set(
            event,
            lua.create_function(move |lua, this: LuaUserDataRef<ScriptHandle>| {
                let level = this.handle;
                drop(this);
                notify(lua, &w, level, event, &[]);
                Ok(())
            })?,
        )?;
    }

    let w = Arc::clone(world);
    methods.set(
        "get_debugMode",
        lua.create_function(move |_, this: LuaUserDataRef<ScriptHandle>| {
            Ok(lock(&w).graph.property(this.handle, DEBUG_MODE).as_bool().unwrap_or(false))
        })?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "set_debugMode",
        lua.create_function(move |_, (this, enabled): (LuaUserDataRef<ScriptHandle>, bool)| {
            lock(&w).graph.set_property(this.handle, DEBUG_MODE, Value::Bool(enabled));
            Ok(())
        })?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "__registerSetupObjectName",
        lua.create_function(move |_, (_this, name): (LuaUserDataRef<ScriptHandle>, String)| {
            lock(&w).level.register_setup_object_name(&name);
            Ok(())
        })?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "__spawnSetupObjects",
        lua.create_function(move |lua, this: LuaUserDataRef<ScriptHandle>| {
            let level = this.handle;
            drop(this);
            let names = lock(&w).level.setup.clone();
            let mut spawned = 0;
            for name in &names {
                if !lock(&w).class_exists(name) {
                    log::warn!("Can't find setup object \"{name}\"");
                    continue;
                }
                match spawn_object(lua, &w, level, name, None) {
                    Ok(_) => spawned += 1,
                    Err(e) => log::warn!("Failed to spawn setup object \"{name}\": {e}"),
                }
            }
            Ok(spawned)
        })?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "entity",
        lua.create_function(move |_, (_this, id): (LuaUserDataRef<ScriptHandle>, String)| {
            let handle = match u64::from_str_radix(id.trim(), 16) {
                Ok(id) => lock(&w).find_entity_by_id(id),
                Err(_) => NULL_HANDLE,
            };
            Ok(handle_or_nil(&w, handle))
        })?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "entityId",
        lua.create_function(
            move |_, (_this, entity): (LuaUserDataRef<ScriptHandle>, LuaUserDataRef<ScriptHandle>)| {
                let world = lock(&w);
                Ok(world
                    .entity_info(entity.handle)
                    .filter(|_| !world.graph.is_killed(entity.handle))
                    .map(|info| format!("{:016x}", info.id)))
            },
        )?,
    )?;

    let w = Arc::clone(world);
    methods.set(
        "findEntity",
        lua.create_function(move |_, (this, name): (LuaUserDataRef<ScriptHandle>, String)| {
            let found = {
                let world = lock(&w);
                level_objects(&world, this.handle)
                    .into_iter()
                    .find(|h| {
                        world.entity_info(*h).is_some() && !world.graph.is_killed(*h) && world.graph.name(*h) == Some(name.as_str())
                    })
                    .unwrap_or(NULL_HANDLE)
            };
            Ok(handle_or_nil(&w, found))
        })?,
    )?;

    let options = lua.create_table()?;
    options.set("tags", lua.create_table()?)?;
    let class: LuaFunction = lua.globals().get("class")?;
    class.call::<()>((LEVEL_CLASS, options, methods))?;

    let level = lock(world).level.handle;
    if !level.is_null() {
        lua.globals().set(LEVEL_CLASS, ScriptHandle::new(level, world))?;
    }
    Ok(())
}

/// The engine's side of the `Level` object.
#[derive(Debug)]
pub struct LevelObject {
    handle: Handle,
}

impl LevelObject {
    pub fn new(vm: &ScriptVm) -> Result<Self, String> {
        let handle = vm.spawn_child(ROOT_HANDLE, LEVEL_CLASS)?;
        vm.set_global(LEVEL_CLASS, handle)?;
        vm.set(handle, DEBUG_MODE, Value::Bool(false));
        vm.world().level = LevelBinding {
            handle,
            ..LevelBinding::default()
        };
        Ok(Self { handle })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// `spawn`: a plain child of the level.
    pub fn spawn(&self, vm: &ScriptVm, class: &str) -> Result<Handle, String> {
        vm.spawn_child(self.handle, class)
    }

    /// `spawnEntity`: a transient entity at `position`.
    pub fn spawn_entity(&self, vm: &ScriptVm, class: &str, position: Vec2) -> Result<Handle, LevelError> {
        self.checked_spawn(vm, class, position)
    }

    /// Spawns a persistent entity, restoring `id` when no live entity holds it.
    pub fn restore_entity(
        &self,
        vm: &ScriptVm,
        class: &str,
        position: Vec2,
        id: Option<u64>,
    ) -> Result<Handle, LevelError> {
        let handle = self.checked_spawn(vm, class, position)?;
        let mut world = vm.world();
        world.set_persistent(handle, true);
        if let Some(id) = id {
            if !world.set_entity_id(handle, id) {
                log::warn!("Entity id {id:016x} of {class} is already taken; assigning a new one");
            }
        }
        Ok(handle)
    }

    fn checked_spawn(&self, vm: &ScriptVm, class: &str, position: Vec2) -> Result<Handle, LevelError> {
        check_entity_class(&vm.world(), class)?;
        vm.spawn_child_at(self.handle, class, position).map_err(|e| {
            log::warn!("{e}");
            LevelError::UnknownEntity(class.to_string())
        })
    }

    pub fn on_level_load(&self, vm: &ScriptVm) {
        self.call(vm, "onLevelLoad", &[]);
    }

    pub fn on_level_unload(&self, vm: &ScriptVm) {
        self.call(vm, "onLevelUnload", &[]);
    }

    /// `__registerSetupObjectName`: setup objects are kept append-front.
    pub fn register_setup_object_name(&self, vm: &ScriptVm, name: &str) {
        vm.world().level.register_setup_object_name(name);
    }

    pub fn set_setup_objects(&self, vm: &ScriptVm, names: &[String]) {
        vm.world().level.setup = names.to_vec();
    }

    pub fn setup_objects(&self, vm: &ScriptVm) -> Vec<String> {
        vm.world().level.setup.clone()
    }

    /// `__spawnSetupObjects`: spawns every registered setup object whose class exists.
    pub fn spawn_setup_objects(&self, vm: &ScriptVm) -> usize {
        self.call(vm, "__spawnSetupObjects", &[])
            .as_number()
            .map_or(0, |n| n as usize)
    }

    pub fn debug_mode(&self, vm: &ScriptVm) -> bool {
        vm.get(self.handle, DEBUG_MODE).as_bool().unwrap_or(false)
    }

    pub fn set_debug_mode(&self, vm: &ScriptVm, enabled: bool) {
        vm.set(self.handle, DEBUG_MODE, Value::Bool(enabled));
    }

    /// `setROI`: also refreshes which entities are active. Returns how many
    /// transient entities were dropped.
    pub fn set_roi(&self, vm: &ScriptVm, roi: Rect) -> usize {
        vm.world().set_level_roi(roi)
    }

    pub fn update(&self, vm: &ScriptVm, dt: f32) {
        vm.update(dt, &self.inactive(vm));
    }

    pub fn late_update(&self, vm: &ScriptVm, dt: f32) {
        vm.late_update(dt, &self.inactive(vm));
    }

    fn inactive(&self, vm: &ScriptVm) -> HashSet<Handle> {
        vm.world().level.entities.inactive().clone()
    }

    pub fn is_active(&self, vm: &ScriptVm, handle: Handle) -> bool {
        vm.world().level.entities.is_active(handle)
    }

    /// `notifyEntities`: calls `method` on every active object under the level.
    pub fn notify_entities(&self, vm: &ScriptVm, method: &str, args: &[Value]) {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(Value::String(method.to_string()));
        all.extend_from_slice(args);
        self.call(vm, "notifyEntities", &all);
    }

    pub fn find_entity_by_id(&self, vm: &ScriptVm, id: u64) -> Handle {
        vm.world().find_entity_by_id(id)
    }

    fn call(&self, vm: &ScriptVm, method: &str, args: &[Value]) -> Value {
        vm.call(self.handle, method, args).unwrap_or_else(|e| {
            log::error!("{e}");
            Value::Null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPTS: &str = r#"
class("Crate", { tags = { "entity" } }, {
    onLevelLoad = function(self)
        self:set("loaded", true)
    end,
    ping = function(self, amount)
        self:set("pinged", amount)
    end,
})

class("Gizmo", {}, {})

class("Boot", { tags = { "setup" } }, {
    init = function(self)
        Level:set("booted", true)
    end,
})
"#;

    const DRIVERS: &str = r#"
class("Spawner", {}, {
    init = function(self)
        local crate = Level:spawnEntity("Crate", 1, 2)
        self:set("crate", crate)
        self:set("crateId", Level:entityId(crate))
        self:set("sameCrate", Level:entity(Level:entityId(crate)) == crate)
        self:set("found", Level:findEntity("Crate") == crate)
    end,
})

class("BadSpawner", {}, {
    init = function(self)
        local ok = pcall(function() Level:spawnEntity("Gizmo", 0, 0) end)
        self:set("ok", ok)
    end,
})

class("Shrinker", {}, {
    init = function(self)
        self:set("killed", Level:setROI(0, 0, 100, 100))
    end,
})

class("Debugger", {}, {
    init = function(self)
        self:set("before", Level:get_debugMode())
        Level:set_debugMode(true)
        self:set("after", Level:get_debugMode())
    end,
})

class("Notifier", {}, {
    init = function(self)
        Level:__registerSetupObjectName("Boot")
        Level:notifyEntities("ping", 7)
    end,
})
"#;

    fn setup() -> (ScriptVm, LevelObject) {
        let mut vm = ScriptVm::new().expect("vm");
        vm.load_source("test", SCRIPTS).expect("scripts");
        vm.load_source("drivers", DRIVERS).expect("drivers");
        let level = LevelObject::new(&vm).expect("level object");
        (vm, level)
    }

    #[test]
    fn method_names_are_unique() {
        let mut names: Vec<&str> = LEVEL_METHODS.iter().chain(LEVEL_HOOKS).copied().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn every_method_is_bound_on_the_class() {
        let (mut vm, _level) = setup();
        for &name in LEVEL_METHODS {
            assert!(vm.program_exists(LEVEL_CLASS, name), "{name} is not bound");
        }
        vm.force_reload();
        for &name in LEVEL_METHODS {
            assert!(vm.program_exists(LEVEL_CLASS, name), "{name} is lost on reload");
        }
    }

    #[test]
    fn spawn_entity_checks_the_class() {
        let (vm, level) = setup();
        assert!(matches!(
            level.spawn_entity(&vm, "Nope", Vec2::ZERO),
            Err(LevelError::UnknownEntity(_))
        ));
        assert!(matches!(
            level.spawn_entity(&vm, "Gizmo", Vec2::ZERO),
            Err(LevelError::NotAnEntity(_))
        ));
        let crate_handle = level.spawn_entity(&vm, "Crate", Vec2::new(10.0, 20.0)).expect("crate");
        let world = vm.world();
        assert_eq!(world.graph.parent(crate_handle), level.handle());
        assert_eq!(world.graph.world_position(crate_handle), Vec2::new(10.0, 20.0));
        let info = world.entity_info(crate_handle).expect("info");
        assert!(!info.persistent);
    }

    #[test]
    fn scripts_spawn_and_look_up_entities() {
        let (vm, level) = setup();
        let spawner = level.spawn(&vm, "Spawner").expect("spawner");
        let crate_handle = vm.get(spawner, "crate").as_handle().expect("crate handle");

        let world = vm.world();
        assert_eq!(world.graph.parent(crate_handle), level.handle());
        assert_eq!(world.graph.world_position(crate_handle), Vec2::new(1.0, 2.0));
        let id = world.entity_info(crate_handle).expect("info").id;
        drop(world);
        assert_eq!(vm.get(spawner, "crateId"), Value::String(format!("{id:016x}")));
        assert_eq!(vm.get(spawner, "sameCrate"), Value::Bool(true));
        assert_eq!(vm.get(spawner, "found"), Value::Bool(true));
    }

    #[test]
    fn scripts_cannot_spawn_plain_objects_as_entities() {
        let (vm, level) = setup();
        let spawner = level.spawn(&vm, "BadSpawner").expect("spawner");
        assert_eq!(vm.get(spawner, "ok"), Value::Bool(false));
    }

    #[test]
    fn scripts_move_the_region_of_interest() {
        let (vm, level) = setup();
        let near = level.spawn_entity(&vm, "Crate", Vec2::new(10.0, 10.0)).expect("near");
        let far = level.spawn_entity(&vm, "Crate", Vec2::new(5000.0, 10.0)).expect("far");
        let shrinker = level.spawn(&vm, "Shrinker").expect("shrinker");
        assert_eq!(vm.get(shrinker, "killed"), Value::Number(1.0));
        assert!(!vm.is_killed(near));
        assert!(vm.is_killed(far));
        assert_eq!(vm.world().level.entities.roi(), Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn scripts_toggle_debug_mode() {
        let (vm, level) = setup();
        let debugger = level.spawn(&vm, "Debugger").expect("debugger");
        assert_eq!(vm.get(debugger, "before"), Value::Bool(false));
        assert_eq!(vm.get(debugger, "after"), Value::Bool(true));
        assert!(level.debug_mode(&vm));

        level.set_debug_mode(&vm, false);
        assert_eq!(vm.get(level.handle(), "debugMode"), Value::Bool(false));
    }

    #[test]
    fn scripts_notify_entities_and_register_setup_objects() {
        let (vm, level) = setup();
        let crate_handle = level.spawn_entity(&vm, "Crate", Vec2::ZERO).expect("crate");
        level.spawn(&vm, "Notifier").expect("notifier");
        assert_eq!(vm.get(crate_handle, "pinged"), Value::Number(7.0));
        assert_eq!(level.setup_objects(&vm), ["Boot"]);
    }

    #[test]
    fn restored_entities_keep_their_id() {
        let (vm, level) = setup();
        let id = 0x0123_4567_89ab_cdef;
        let a = level
            .restore_entity(&vm, "Crate", Vec2::new(64.0, 32.0), Some(id))
            .expect("crate");
        assert_eq!(level.find_entity_by_id(&vm, id), a);

        let b = level
            .restore_entity(&vm, "Crate", Vec2::ZERO, Some(id))
            .expect("second crate");
        let world = vm.world();
        let info = world.entity_info(b).expect("info");
        assert_ne!(info.id, id);
        assert!(info.persistent);
    }

    #[test]
    fn level_load_reaches_entities() {
        let (vm, level) = setup();
        let crate_handle = level.spawn_entity(&vm, "Crate", Vec2::ZERO).expect("crate");
        level.on_level_load(&vm);
        assert_eq!(vm.get(crate_handle, "loaded"), Value::Bool(true));
    }

    #[test]
    fn setup_objects_are_prepended_and_spawned() {
        let (vm, level) = setup();
        level.register_setup_object_name(&vm, "Missing");
        level.register_setup_object_name(&vm, "Boot");
        level.register_setup_object_name(&vm, "Boot");
        assert_eq!(level.setup_objects(&vm), ["Boot", "Missing"]);
        assert_eq!(level.spawn_setup_objects(&vm), 1);
        assert_eq!(vm.get(level.handle(), "booted"), Value::Bool(true));
    }
}
