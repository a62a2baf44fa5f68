//! Finding the object under the editor cursor.
//!
//! Candidates are the objects whose bounding box contains the cursor. Among
//! them the one drawn on top wins, except that a brick whose mask is solid
//! under the cursor beats one that is only hit by its box.

use std::cmp::Ordering;

use glam::Vec2;

use super::action_log::EditorObject;
use crate::level::brick::Brick;
use crate::level::entity_manager::EntityKey;
use crate::level::Level;
use crate::scripting::{Handle, ScriptVm};

/// What the cursor is over, as an object the action log can place again.
#[derive(Debug, Clone, PartialEq)]
pub struct Picked<K> {
    pub key: K,
    pub object: EditorObject,
    pub position: Vec2,
}

struct Candidate<K> {
    picked: Picked<K>,
    z: f64,
    solid_under_cursor: bool,
}

fn rank<K>(a: &Candidate<K>, b: &Candidate<K>) -> Ordering {
    a.solid_under_cursor
        .cmp(&b.solid_under_cursor)
        .then(a.z.total_cmp(&b.z))
}

/// Later candidates win ties, matching painter's order.
fn best<K>(candidates: impl Iterator<Item = Candidate<K>>) -> Option<Picked<K>> {
    candidates.max_by(rank).map(|c| c.picked)
}

/// Is the brick's mask solid at `point` (world space)?
pub fn mask_hit(brick: &Brick, point: Vec2) -> bool {
    let (x, y) = brick.position();
    let mask = &brick.template().mask;
    let (w, h) = (mask.width() as i32, mask.height() as i32);
    let mut px = point.x.floor() as i32 - x;
    let mut py = point.y.floor() as i32 - y;
    if brick.flip().horizontal() {
        px = w - 1 - px;
    }
    if brick.flip().vertical() {
        py = h - 1 - py;
    }
    mask.peek(px, py)
}

pub fn pick_brick(level: &Level, cursor: Vec2) -> Option<Picked<EntityKey>> {
    best(level.entities().bricks.iter().filter_map(|(key, brick)| {
        if !brick.is_alive() || !brick.bounding_box().contains(cursor) {
            return None;
        }
        let (x, y) = brick.spawn_point();
        Some(Candidate {
            picked: Picked {
                key,
                object: EditorObject::Brick {
                    id: brick.id(),
                    layer: brick.layer(),
                    flip: brick.flip(),
                },
                position: Vec2::new(x as f32, y as f32),
            },
            z: brick.z_index(),
            solid_under_cursor: mask_hit(brick, cursor),
        })
    }))
}

pub fn pick_item(level: &Level, cursor: Vec2) -> Option<Picked<EntityKey>> {
    best(level.entities().items.iter().filter_map(|(key, item)| {
        if item.is_dead() || !item.bounding_box().contains(cursor) {
            return None;
        }
        Some(Candidate {
            picked: Picked {
                key,
                object: EditorObject::Item { kind: item.kind() },
                position: item.spawn_point(),
            },
            z: item.z_index(),
            solid_under_cursor: true,
        })
    }))
}

pub fn pick_object(level: &Level, cursor: Vec2) -> Option<Picked<EntityKey>> {
    best(level.entities().objects.iter().filter_map(|(key, object)| {
        if object.is_dead() || !object.bounding_box().contains(cursor) {
            return None;
        }
        Some(Candidate {
            picked: Picked {
                key,
                object: EditorObject::Object {
                    name: object.name.clone(),
                },
                position: object.spawn_point(),
            },
            z: object.z_index(),
            solid_under_cursor: true,
        })
    }))
}

/// Scripted entities, hit through the box their drawable reports.
pub fn pick_entity(vm: &ScriptVm, cursor: Vec2) -> Option<Picked<Handle>> {
    let world = vm.world();
    best(world.level.entities.drawables(&world).into_iter().filter_map(|d| {
        if d.detached {
            return None;
        }
        let hit = cursor.cmpge(d.position).all() && cursor.cmplt(d.position + d.size).all();
        if !hit {
            return None;
        }
        let object = world.graph.get(d.handle)?;
        let info = object.entity?;
        Some(Candidate {
            picked: Picked {
                key: d.handle,
                object: EditorObject::Entity {
                    class: object.name.clone(),
                    id: Some(info.id),
                },
                position: world.graph.world_position(d.handle),
            },
            z: d.zindex,
            solid_under_cursor: true,
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::brick::tests::template;
    use crate::level::brick::{BrickBehavior, BrickFlip, BrickType, Brickset};
    use crate::level::collision_mask::CollisionMask;
    use crate::level::lev::parse_level;
    use crate::level::obstacle::Layer;
    use std::path::Path;
    use std::sync::Arc;

    fn level(vm: &ScriptVm, text: &str) -> Level {
        // brick 1: 64x32 box; brick 2: 64x32 with only the left half solid
        let mut half = template(2, BrickType::Solid, BrickBehavior::Default, &[]);
        let bits = (0..64 * 32).map(|i| i % 64 < 32).collect();
        half.mask = Arc::new(CollisionMask::from_bits(64, 32, bits));
        let mut front = template(3, BrickType::Solid, BrickBehavior::Default, &[]);
        front.zindex = 0.9;
        let brickset = Brickset::from_templates(vec![
            template(1, BrickType::Solid, BrickBehavior::Default, &[]),
            half,
            front,
        ]);
        let path = Path::new("pick.lev");
        let file = parse_level(text, path).expect("parses");
        Level::from_file(path, file, Arc::new(brickset), None, vm, None).expect("level")
    }

    fn vm() -> ScriptVm {
        let mut vm = ScriptVm::new().expect("vm");
        vm.load_source(
            "pick",
            r#"class("Sign", { tags = { "entity" } }, {
                init = function(self)
                    self:set("sprite", "sign")
                    self:set("width", 16)
                    self:set("height", 16)
                    self:set("zindex", 0.6)
                end,
            })"#,
        )
        .expect("scripts");
        vm
    }

    #[test]
    fn higher_zindex_wins() {
        let vm = vm();
        let level = level(&vm, "theme \"t\"\nbrick 3 0 0\nbrick 1 0 0\n");
        let picked = pick_brick(&level, Vec2::new(10.0, 10.0)).expect("a brick");
        assert!(matches!(picked.object, EditorObject::Brick { id: 3, .. }));
    }

    #[test]
    fn solid_mask_beats_a_box_hit() {
        let vm = vm();
        let level = level(&vm, "theme \"t\"\nbrick 1 0 0\nbrick 2 0 0 default hflip\n");
        // the flipped half brick is solid on its right side only
        let right = pick_brick(&level, Vec2::new(50.0, 10.0)).expect("right");
        assert!(matches!(right.object, EditorObject::Brick { id: 2, flip: BrickFlip::HFlip, .. }));
        let left = pick_brick(&level, Vec2::new(10.0, 10.0)).expect("left");
        assert!(matches!(left.object, EditorObject::Brick { id: 1, layer: Layer::Default, .. }));
    }

    #[test]
    fn nothing_under_the_cursor() {
        let vm = vm();
        let level = level(&vm, "theme \"t\"\nbrick 1 0 0\nitem 0 200 200\n");
        assert!(pick_brick(&level, Vec2::new(100.0, 100.0)).is_none());
        assert!(pick_item(&level, Vec2::new(100.0, 100.0)).is_none());
        let item = pick_item(&level, Vec2::new(200.0, 195.0)).expect("ring");
        assert_eq!(item.object, EditorObject::Item { kind: 0 });
        assert_eq!(item.position, Vec2::new(200.0, 200.0));
    }

    #[test]
    fn entities_are_picked_with_their_id() {
        let vm = vm();
        let _level = level(&vm, "theme \"t\"\nentity \"Sign\" 40 40 \"00000000000000aa\"\n");
        let picked = pick_entity(&vm, Vec2::new(45.0, 45.0)).expect("sign");
        assert_eq!(
            picked.object,
            EditorObject::Entity {
                class: "Sign".to_string(),
                id: Some(0xaa),
            }
        );
        assert_eq!(picked.position, Vec2::new(40.0, 40.0));
    }
}
