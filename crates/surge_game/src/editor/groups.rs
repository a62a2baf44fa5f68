//! Brick groups: prefabricated arrangements of bricks placed in one go.
//!
//! A group file (`grouptheme` in the level) is JSON:
//!
//! ```json
//! { "groups": [ { "name": "ledge", "bricks": [ { "id": 1, "dx": 0, "dy": 0, "layer": "green" } ] } ] }
//! ```

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::Deserialize;

use super::action_log::{EditorAction, EditorObject};
use crate::level::brick::{BrickFlip, Brickset};
use crate::level::obstacle::Layer;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GroupSet {
    #[serde(default)]
    pub groups: Vec<BrickGroup>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrickGroup {
    #[serde(default)]
    pub name: String,
    pub bricks: Vec<GroupBrick>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupBrick {
    pub id: u32,
    #[serde(default)]
    pub dx: i32,
    #[serde(default)]
    pub dy: i32,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub flip: Option<String>,
}

impl GroupBrick {
    pub fn layer(&self) -> Layer {
        self.layer.as_deref().map_or(Layer::Default, Layer::from_name)
    }

    pub fn flip(&self) -> BrickFlip {
        self.flip.as_deref().map_or(BrickFlip::NoFlip, BrickFlip::from_name)
    }
}

impl BrickGroup {
    /// One NEW_OBJECT per brick, relative to `origin`.
    pub fn actions(&self, origin: Vec2) -> Vec<EditorAction> {
        self.bricks
            .iter()
            .map(|b| EditorAction::NewObject {
                object: EditorObject::Brick {
                    id: b.id,
                    layer: b.layer(),
                    flip: b.flip(),
                },
                position: origin + Vec2::new(b.dx as f32, b.dy as f32),
            })
            .collect()
    }

    /// Sprite of the first brick, used as the cursor preview.
    pub fn preview_brick(&self) -> Option<u32> {
        self.bricks.first().map(|b| b.id)
    }
}

impl GroupSet {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BrickGroup> {
        self.groups.get(index)
    }

    /// Drops the bricks the brickset doesn't have, and then the empty groups.
    pub fn retain_valid(&mut self, brickset: &Brickset) {
        for group in &mut self.groups {
            group.bricks.retain(|b| {
                let ok = brickset.exists(b.id);
                if !ok {
                    log::warn!("Brick group '{}' refers to invalid brick {}", group.name, b.id);
                }
                ok
            });
        }
        self.groups.retain(|g| !g.bricks.is_empty());
    }
}

pub fn load_groups_from_path(path: &Path) -> Result<GroupSet, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read brick groups {}: {e}", path.display()))?;
    let groups: GroupSet = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse brick groups JSON {}: {e}", path.display()))?;
    validate_groups(&groups)?;
    Ok(groups)
}

fn validate_groups(groups: &GroupSet) -> Result<(), String> {
    for (index, group) in groups.groups.iter().enumerate() {
        if group.bricks.is_empty() {
            return Err(format!(
                "Brick groups validation failed: group {index} ('{}') has no bricks",
                group.name
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::brick::tests::template;
    use crate::level::brick::{BrickBehavior, BrickType};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "surge_groups_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn group_file_parses_and_expands_into_actions() {
        let path = temp_file_path("parse");
        fs::write(
            &path,
            r#"{ "groups": [
                { "name": "step", "bricks": [
                    { "id": 1 },
                    { "id": 2, "dx": 64, "dy": -32, "layer": "yellow", "flip": "hflip" }
                ] }
            ] }"#,
        )
        .expect("write groups file");

        let groups = load_groups_from_path(&path).expect("groups should load");
        let actions = groups.groups[0].actions(Vec2::new(100.0, 100.0));
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[1],
            EditorAction::NewObject {
                object: EditorObject::Brick {
                    id: 2,
                    layer: Layer::Yellow,
                    flip: BrickFlip::HFlip,
                },
                position: Vec2::new(164.0, 68.0),
            }
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn empty_groups_are_rejected() {
        let path = temp_file_path("empty");
        fs::write(&path, r#"{ "groups": [ { "name": "none", "bricks": [] } ] }"#).expect("write");
        let err = load_groups_from_path(&path).expect_err("empty group");
        assert!(err.contains("none"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn unknown_bricks_are_dropped() {
        let mut groups = GroupSet {
            groups: vec![
                BrickGroup {
                    name: "a".to_string(),
                    bricks: vec![
                        GroupBrick { id: 1, dx: 0, dy: 0, layer: None, flip: None },
                        GroupBrick { id: 9, dx: 0, dy: 0, layer: None, flip: None },
                    ],
                },
                BrickGroup {
                    name: "b".to_string(),
                    bricks: vec![GroupBrick { id: 9, dx: 0, dy: 0, layer: None, flip: None }],
                },
            ],
        };
        let brickset = Brickset::from_templates(vec![template(1, BrickType::Solid, BrickBehavior::Default, &[])]);
        groups.retain_valid(&brickset);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.groups[0].bricks.len(), 1);
    }
}
