use std::sync::Arc;

use super::collision_mask::{CollisionMask, GroundDir};

/// Loop layer. Obstacles and players live on one; see [`Layer::interacts_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layer {
    #[default]
    Default,
    Green,
    Yellow,
}

impl Layer {
    pub const ALL: &'static [Layer] = &[Layer::Default, Layer::Green, Layer::Yellow];

    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Green => "green",
            Self::Yellow => "yellow",
        }
    }

    /// Case-insensitive; unknown names map to `Default`.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("green") {
            Self::Green
        } else if name.eq_ignore_ascii_case("yellow") {
            Self::Yellow
        } else {
            Self::Default
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Default => Self::Green,
            Self::Green => Self::Yellow,
            Self::Yellow => Self::Default,
        }
    }

    /// Does an observer on `filter` see an obstacle on `self`?
    pub fn interacts_with(self, filter: Layer) -> bool {
        filter == Layer::Default || self == Layer::Default || self == filter
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObstacleFlags {
    pub cloud: bool,
    pub hflip: bool,
    pub vflip: bool,
}

impl ObstacleFlags {
    pub const SOLID: ObstacleFlags = ObstacleFlags {
        cloud: false,
        hflip: false,
        vflip: false,
    };
    pub const CLOUD: ObstacleFlags = ObstacleFlags {
        cloud: true,
        hflip: false,
        vflip: false,
    };
}

/// A mask placed in the world. Masks are shared; an obstacle never owns more
/// than a reference to one.
#[derive(Debug, Clone)]
pub struct Obstacle {
    mask: Arc<CollisionMask>,
    x: i32,
    y: i32,
    layer: Layer,
    flags: ObstacleFlags,
}

impl Obstacle {
    pub fn new(mask: Arc<CollisionMask>, x: i32, y: i32, layer: Layer, flags: ObstacleFlags) -> Self {
        Self {
            mask,
            x,
            y,
            layer,
            flags,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn width(&self) -> i32 {
        self.mask.width() as i32
    }

    pub fn height(&self) -> i32 {
        self.mask.height() as i32
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn is_solid(&self) -> bool {
        !self.flags.cloud
    }

    pub fn flags(&self) -> ObstacleFlags {
        self.flags
    }

    pub fn mask(&self) -> &Arc<CollisionMask> {
        &self.mask
    }

    /// Does the inclusive pixel range touch a solid pixel of the mask?
    pub fn got_collision(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        let (ox1, oy1) = (self.x, self.y);
        let (ox2, oy2) = (ox1 + self.width(), oy1 + self.height());
        if !(x1 < ox2 && x2 >= ox1 && y1 < oy2 && y2 >= oy1) {
            return false;
        }

        let (mut lx1, mut lx2) = (x1 - ox1, x2 - ox1);
        let (mut ly1, mut ly2) = (y1 - oy1, y2 - oy1);
        if self.flags.hflip {
            (lx1, lx2) = (self.width() - 1 - lx2, self.width() - 1 - lx1);
        }
        if self.flags.vflip {
            (ly1, ly2) = (self.height() - 1 - ly2, self.height() - 1 - ly1);
        }
        self.mask.area_test(lx1, ly1, lx2, ly2)
    }

    /// Absolute ground position as seen from world pixel (x, y).
    /// For `Up`/`Down` it's a y coordinate, for `Left`/`Right` an x coordinate.
    pub fn ground_position(&self, x: i32, y: i32, dir: GroundDir) -> i32 {
        let (w, h) = (self.width(), self.height());
        let mut lx = x - self.x;
        let mut ly = y - self.y;
        let mut local_dir = dir;
        if self.flags.hflip {
            lx = w - 1 - lx;
            local_dir = local_dir.mirrored_h();
        }
        if self.flags.vflip {
            ly = h - 1 - ly;
            local_dir = local_dir.mirrored_v();
        }

        let ground = self.mask.locate_ground(lx, ly, local_dir);
        match dir {
            GroundDir::Down | GroundDir::Up => {
                self.y + if self.flags.vflip { h - 1 - ground } else { ground }
            }
            GroundDir::Left | GroundDir::Right => {
                self.x + if self.flags.hflip { w - 1 - ground } else { ground }
            }
        }
    }
}
