//! Scenes and the scene stack.
//!
//! The top of the stack receives `update()` and `render()`. `push` calls
//! `init` and `pop` calls `release`, so every scene that was initialised is
//! released exactly once. Scenes never touch the stack while they run: they
//! post requests that the engine applies after the update returns.

/// Maximum depth of the scene stack.
pub const SCENE_STACK_CAPACITY: usize = 16;

pub trait Scene<C, A> {
    fn init(&mut self, ctx: &mut C, arg: A);
    fn update(&mut self, ctx: &mut C);
    fn render(&mut self, ctx: &mut C);
    fn release(&mut self, ctx: &mut C);

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Identity of a pushed scene, unique for the lifetime of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(u64);

pub struct SceneStack<C, A> {
    scenes: Vec<(SceneId, Box<dyn Scene<C, A>>)>,
    next_id: u64,
    capacity: usize,
}

impl<C, A> SceneStack<C, A> {
    pub fn new() -> Self {
        Self::with_capacity(SCENE_STACK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scenes: Vec::with_capacity(capacity),
            next_id: 1,
            capacity,
        }
    }

    /// Pushes and initialises a scene.
    pub fn push(
        &mut self,
        mut scene: Box<dyn Scene<C, A>>,
        ctx: &mut C,
        arg: A,
    ) -> Result<SceneId, String> {
        if self.scenes.len() >= self.capacity {
            return Err(format!(
                "Scene stack overflow: can't push '{}' (capacity {})",
                scene.name(),
                self.capacity
            ));
        }
        let id = SceneId(self.next_id);
        self.next_id += 1;
        log::debug!("Pushing scene '{}'", scene.name());
        scene.init(ctx, arg);
        self.scenes.push((id, scene));
        Ok(id)
    }

    /// Pops and releases the top scene. Returns false on an empty stack.
    pub fn pop(&mut self, ctx: &mut C) -> bool {
        match self.scenes.pop() {
            Some((_, mut scene)) => {
                log::debug!("Popping scene '{}'", scene.name());
                scene.release(ctx);
                true
            }
            None => false,
        }
    }

    /// Pops every scene, releasing them in reverse order of init.
    pub fn clear(&mut self, ctx: &mut C) {
        while self.pop(ctx) {}
    }

    pub fn update_top(&mut self, ctx: &mut C) {
        if let Some((_, scene)) = self.scenes.last_mut() {
            scene.update(ctx);
        }
    }

    pub fn render_top(&mut self, ctx: &mut C) {
        if let Some((_, scene)) = self.scenes.last_mut() {
            scene.render(ctx);
        }
    }

    pub fn top_id(&self) -> Option<SceneId> {
        self.scenes.last().map(|(id, _)| *id)
    }

    pub fn top_name(&self) -> Option<&str> {
        self.scenes.last().map(|(_, scene)| scene.name())
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl<C, A> Default for SceneStack<C, A> {
    fn default() -> Self {
        Self::new()
    }
}
