//! The `.lev` level format.
//!
//! A level file is line-oriented UTF-8 text. Each line holds a command
//! followed by its arguments; string arguments are double-quoted and may
//! escape `"` and `\` with a backslash. Lines starting with `//` are
//! comments. This module only deals with text: turning a file into a
//! [`LevelFile`] and back. Spawning what the file describes is the job of
//! [`super::Level`].

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use surge_core::{engine_version_string, Color, ENGINE_VERSION};

use super::brick::BrickFlip;
use super::error::LevelError;
use super::obstacle::Layer;

/// Maximum number of players per level.
pub const TEAM_MAX: usize = 16;

/// Maximum number of dialog regions per level.
pub const DIALOGREGION_MAX: usize = 100;

pub const DEFAULT_WATERCOLOR: Color = Color::rgba(0, 32, 192, 128);
const DEFAULT_WATERCOLOR_ALPHA: u8 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrickLine {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub layer: Layer,
    pub flip: BrickFlip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLine {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLine {
    pub kind: u32,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLine {
    pub name: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogLine {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub title: String,
    pub message: String,
}

/// Everything a `.lev` file declares, in file order within each section.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelFile {
    pub name: String,
    pub author: String,
    pub version: String,
    pub license: String,
    pub requires: (u32, u32, u32),
    pub act: u16,
    pub theme: String,
    pub bgtheme: String,
    pub music: String,
    pub grouptheme: String,
    pub spawn_point: (i32, i32),
    pub waterlevel: Option<i32>,
    pub watercolor: Color,
    pub players: Vec<String>,
    pub readonly: bool,
    pub setup: Vec<String>,
    pub dialogs: Vec<DialogLine>,
    pub bricks: Vec<BrickLine>,
    pub entities: Vec<EntityLine>,
    pub items: Vec<ItemLine>,
    pub objects: Vec<ObjectLine>,
}

impl Default for LevelFile {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            author: String::new(),
            version: String::new(),
            license: String::new(),
            requires: ENGINE_VERSION,
            act: 1,
            theme: String::new(),
            bgtheme: String::new(),
            music: String::new(),
            grouptheme: String::new(),
            spawn_point: (0, 0),
            waterlevel: None,
            watercolor: DEFAULT_WATERCOLOR,
            players: Vec::new(),
            readonly: false,
            setup: Vec::new(),
            dialogs: Vec::new(),
            bricks: Vec::new(),
            entities: Vec::new(),
            items: Vec::new(),
            objects: Vec::new(),
        }
    }
}

pub fn load_level_file(path: &Path) -> Result<LevelFile, LevelError> {
    let raw = fs::read_to_string(path).map_err(|source| LevelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_level(&raw, path)
}

/// Parses level text. `path` only shows up in messages.
pub fn parse_level(text: &str, path: &Path) -> Result<LevelFile, LevelError> {
    let mut level = LevelFile::default();
    let mut has_theme = false;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let Some((identifier, params)) = tokenize(line) else {
            continue;
        };
        let params: Vec<&str> = params.iter().map(String::as_str).collect();
        interpret(
            &mut level,
            &mut has_theme,
            &identifier.to_ascii_lowercase(),
            &params,
            path,
            line_number,
        )?;
    }

    Ok(level)
}

fn interpret(
    level: &mut LevelFile,
    has_theme: &mut bool,
    identifier: &str,
    params: &[&str],
    path: &Path,
    line: usize,
) -> Result<(), LevelError> {
    let warn = |usage: &str| {
        log::warn!(
            "Level loader - command '{identifier}' expects {usage} ({} near line {line})",
            path.display()
        );
    };

    match identifier {
        "theme" => match params {
            [theme] if !*has_theme => {
                level.theme = theme.to_string();
                *has_theme = true;
            }
            [_] => {
                return Err(LevelError::DuplicateTheme {
                    path: path.to_path_buf(),
                    line,
                })
            }
            _ => warn("one parameter: brickset filepath"),
        },
        "bgtheme" => match params {
            [bgtheme] => level.bgtheme = bgtheme.to_string(),
            _ => warn("one parameter: background filepath"),
        },
        "grouptheme" => match params {
            [grouptheme] => level.grouptheme = grouptheme.to_string(),
            _ => warn("one parameter: grouptheme filepath"),
        },
        "music" => match params {
            [music] => level.music = music.to_string(),
            _ => warn("one parameter: music filepath"),
        },
        "name" => match params {
            [name] => level.name = name.to_string(),
            _ => warn("one parameter: level name"),
        },
        "author" => match params {
            [author] => level.author = author.to_string(),
            _ => warn("one parameter: author name"),
        },
        "version" => match params {
            [version] => level.version = version.to_string(),
            _ => warn("one parameter: level version"),
        },
        "license" => match params {
            [license] => level.license = license.to_string(),
            _ => warn("one parameter: license name"),
        },
        "requires" => match params {
            [requires] => {
                let required = parse_version(requires);
                if required > ENGINE_VERSION {
                    return Err(LevelError::RequiresNewerEngine {
                        required: format!("{}.{}.{}", required.0, required.1, required.2),
                        current: engine_version_string(),
                    });
                }
                level.requires = required;
            }
            _ => warn("one parameter: minimum required engine version"),
        },
        "act" => match params {
            [act] => level.act = atoi(act).clamp(0, u16::MAX as i32) as u16,
            _ => warn("one parameter: act number"),
        },
        "waterlevel" => match params {
            [y] => level.waterlevel = Some(atoi(y)),
            _ => warn("one parameter: water level (y-coordinate, in pixels)"),
        },
        "watercolor" => match params {
            [r, g, b] => {
                level.watercolor =
                    Color::from_ints(atoi(r), atoi(g), atoi(b), DEFAULT_WATERCOLOR_ALPHA as i32)
            }
            [r, g, b, a] => level.watercolor = Color::from_ints(atoi(r), atoi(g), atoi(b), atoi(a)),
            _ => warn("three or four parameters: red, green, blue [, alpha]"),
        },
        "spawn_point" => match params {
            [x, y] => level.spawn_point = (atoi(x), atoi(y)),
            _ => warn("two parameters: xpos, ypos"),
        },
        "dialogbox" => match params {
            [x, y, w, h, title, message] if level.dialogs.len() < DIALOGREGION_MAX => {
                level.dialogs.push(DialogLine {
                    x: atoi(x),
                    y: atoi(y),
                    width: atoi(w),
                    height: atoi(h),
                    title: title.to_string(),
                    message: message.to_string(),
                })
            }
            _ => warn("six parameters: xpos, ypos, width, height, title, message"),
        },
        "readonly" => match params {
            [] => level.readonly = true,
            _ => warn("no parameters"),
        },
        "brick" => match params {
            [id, x, y, rest @ ..] if rest.len() <= 2 => {
                if !*has_theme {
                    log::warn!(
                        "Level loader - can't create a brick before the theme is defined ({} near line {line})",
                        path.display()
                    );
                    return Ok(());
                }
                let mut layer = Layer::Default;
                let mut flip = BrickFlip::NoFlip;
                for arg in rest {
                    let as_layer = Layer::from_name(arg);
                    if layer == Layer::Default && as_layer != Layer::Default {
                        layer = as_layer;
                    } else if flip == BrickFlip::NoFlip {
                        flip = BrickFlip::from_name(arg);
                    }
                }
                let id = atoi(id);
                if id < 0 {
                    log::warn!("Level loader - invalid brick: {id}");
                    return Ok(());
                }
                level.bricks.push(BrickLine {
                    id: id as u32,
                    x: atoi(x),
                    y: atoi(y),
                    layer,
                    flip,
                });
            }
            _ => warn("three to five parameters: id, xpos, ypos [, layer_name [, flip_flags]]"),
        },
        "item" => match params {
            [kind, x, y] => level.items.push(ItemLine {
                kind: atoi(kind).clamp(0, super::item::ITEMDATA_MAX as i32 - 1) as u32,
                x: atoi(x),
                y: atoi(y),
            }),
            _ => warn("three parameters: type, xpos, ypos"),
        },
        "object" | "enemy" => match params {
            [name, x, y] => {
                if !level.setup.iter().any(|s| s == name) {
                    level.objects.push(ObjectLine {
                        name: name.to_string(),
                        x: atoi(x),
                        y: atoi(y),
                    });
                }
            }
            _ => warn("three parameters: name, xpos, ypos"),
        },
        "entity" => match params {
            [name, x, y, rest @ ..] if rest.len() <= 1 => {
                let id = match rest.first() {
                    Some(hex) => match parse_entity_id(hex) {
                        Some(id) => Some(id),
                        None => {
                            log::warn!(
                                "Level loader - invalid entity id '{hex}' ({} near line {line})",
                                path.display()
                            );
                            None
                        }
                    },
                    None => None,
                };
                if !level.setup.iter().any(|s| s == name) {
                    level.entities.push(EntityLine {
                        name: name.to_string(),
                        x: atoi(x),
                        y: atoi(y),
                        id,
                    });
                }
            }
            _ => warn("three or four parameters: name, xpos, ypos [, id]"),
        },
        "setup" | "startup" => {
            if params.is_empty() {
                warn("one or more parameters: object names");
            } else {
                let names: Vec<String> = params.iter().map(|s| s.to_string()).collect();
                level.setup.splice(0..0, names);
            }
        }
        "players" => {
            if params.is_empty() {
                warn("one or more parameters: character names");
            }
            for name in params {
                if level.players.len() >= TEAM_MAX {
                    return Err(LevelError::TooManyPlayers {
                        max: TEAM_MAX,
                        path: path.to_path_buf(),
                        line,
                    });
                }
                if level.players.iter().any(|p| p == name) {
                    return Err(LevelError::DuplicatePlayer {
                        name: name.to_string(),
                        path: path.to_path_buf(),
                        line,
                    });
                }
                level.players.push(name.to_string());
            }
        }
        _ => log::warn!(
            "Level loader - unknown command '{identifier}' in {} near line {line}",
            path.display()
        ),
    }

    Ok(())
}

/// Splits a line into its identifier and arguments. Blank lines and
/// comments yield `None`.
pub fn tokenize(line: &str) -> Option<(String, Vec<String>)> {
    let mut chars = line.trim_start().chars().peekable();
    let mut identifier = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            break;
        }
        identifier.push(c);
        chars.next();
    }
    if identifier.is_empty() || identifier.starts_with("//") || identifier == "#" {
        return None;
    }

    let mut params = Vec::new();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut param = String::new();
        if first == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped @ ('"' | '\\')) => param.push(escaped),
                        Some(other) => {
                            param.push('\\');
                            param.push(other);
                        }
                        None => param.push('\\'),
                    },
                    '"' => break,
                    _ => param.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                param.push(c);
                chars.next();
            }
        }
        params.push(param);
    }

    Some((identifier, params))
}

/// Lenient integer parsing: leading digits count, anything else is zero.
fn atoi(s: &str) -> i32 {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s.strip_prefix('+').unwrap_or(s)),
    };
    let mut value: i64 = 0;
    for c in digits.chars() {
        match c.to_digit(10) {
            Some(d) => value = (value * 10 + d as i64).min(i32::MAX as i64 + 1),
            None => break,
        }
    }
    (sign * value).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn parse_version(s: &str) -> (u32, u32, u32) {
    let mut parts = s.split('.').map(|p| atoi(p).clamp(0, 99) as u32);
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Entity ids are 16 lower-case hex digits. Zero is not an id.
pub fn parse_entity_id(hex: &str) -> Option<u64> {
    if hex.is_empty() || hex.len() > 16 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(hex, 16).ok().filter(|&id| id != 0)
}

pub fn format_entity_id(id: u64) -> String {
    format!("{id:016x}")
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl LevelFile {
    /// Canonical text of the level: header, metadata, setup list, players,
    /// options, dialog regions, bricks, entities, items, objects.
    pub fn to_lev_string(&self) -> String {
        let mut out = String::new();
        let (major, minor, patch) = ENGINE_VERSION;

        // writing into a String can't fail
        let _ = writeln!(out, "// ------------------------------------------------------------");
        let _ = writeln!(out, "// Open Surge {} level", engine_version_string());
        let _ = writeln!(out, "// This file was generated by the built-in level editor.");
        let _ = writeln!(out, "// ------------------------------------------------------------");
        let _ = writeln!(out);

        let _ = writeln!(out, "// header");
        let _ = writeln!(out, "name {}", quote(&self.name));
        let _ = writeln!(out, "author {}", quote(&self.author));
        if !self.license.is_empty() {
            let _ = writeln!(out, "license {}", quote(&self.license));
        }
        let _ = writeln!(out, "version {}", quote(&self.version));
        let _ = writeln!(out, "requires \"{major}.{minor}.{patch}\"");
        let _ = writeln!(out, "act {}", self.act);
        let _ = writeln!(out, "theme {}", quote(&self.theme));
        let _ = writeln!(out, "bgtheme {}", quote(&self.bgtheme));
        let _ = writeln!(out, "spawn_point {} {}", self.spawn_point.0, self.spawn_point.1);
        if !self.music.is_empty() {
            let _ = writeln!(out, "music {}", quote(&self.music));
        }
        if !self.grouptheme.is_empty() {
            let _ = writeln!(out, "grouptheme {}", quote(&self.grouptheme));
        }

        if !self.setup.is_empty() {
            let names: Vec<String> = self.setup.iter().map(|s| quote(s)).collect();
            let _ = writeln!(out, "setup {}", names.join(" "));
        }
        if !self.players.is_empty() {
            let names: Vec<String> = self.players.iter().map(|s| quote(s)).collect();
            let _ = writeln!(out, "players {}", names.join(" "));
        }
        if self.readonly {
            let _ = writeln!(out, "readonly");
        }
        if let Some(waterlevel) = self.waterlevel {
            let _ = writeln!(out, "waterlevel {waterlevel}");
        }
        if self.watercolor != DEFAULT_WATERCOLOR {
            let c = self.watercolor;
            if c.a == DEFAULT_WATERCOLOR_ALPHA {
                let _ = writeln!(out, "watercolor {} {} {}", c.r, c.g, c.b);
            } else {
                let _ = writeln!(out, "watercolor {} {} {} {}", c.r, c.g, c.b, c.a);
            }
        }

        let _ = writeln!(out, "\n// dialogs");
        for d in &self.dialogs {
            let _ = writeln!(
                out,
                "dialogbox {} {} {} {} {} {}",
                d.x,
                d.y,
                d.width,
                d.height,
                quote(&d.title),
                quote(&d.message)
            );
        }

        let _ = writeln!(out, "\n// bricks");
        for b in &self.bricks {
            let mut line = format!("brick {} {} {}", b.id, b.x, b.y);
            if b.layer != Layer::Default {
                line.push(' ');
                line.push_str(b.layer.name());
            }
            if b.flip != BrickFlip::NoFlip {
                line.push(' ');
                line.push_str(b.flip.name());
            }
            let _ = writeln!(out, "{line}");
        }

        let _ = writeln!(out, "\n// entities");
        for e in &self.entities {
            match e.id {
                Some(id) => {
                    let _ = writeln!(
                        out,
                        "entity {} {} {} \"{}\"",
                        quote(&e.name),
                        e.x,
                        e.y,
                        format_entity_id(id)
                    );
                }
                None => {
                    let _ = writeln!(out, "entity {} {} {}", quote(&e.name), e.x, e.y);
                }
            }
        }

        let _ = writeln!(out, "\n// legacy items");
        for i in &self.items {
            let _ = writeln!(out, "item {} {} {}", i.kind, i.x, i.y);
        }

        let _ = writeln!(out, "\n// legacy objects");
        for o in &self.objects {
            let _ = writeln!(out, "object {} {} {}", quote(&o.name), o.x, o.y);
        }

        let _ = write!(out, "\n// EOF");
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        fs::write(path, self.to_lev_string())
            .map_err(|e| format!("Failed to write level {}: {e}", path.display()))
    }
}
