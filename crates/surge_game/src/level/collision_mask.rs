//! Per-pixel collision masks.
//!
//! Besides the solidity bits, a mask keeps four ground maps. For a pixel
//! (x, y) and a direction, the ground map tells where the ground is: for
//! `Down`, the y of the top of the solid run at or below the pixel (or the
//! last row when there's none). The maps are filled by dynamic programming
//! once, when the mask is created, so ground queries are O(1).

use std::path::Path;

/// Masks can't be larger than this in either dimension.
pub const MASK_MAX_SIZE: u32 = u16::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroundDir {
    Down,
    Left,
    Up,
    Right,
}

impl GroundDir {
    pub fn mirrored_h(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            other => other,
        }
    }

    pub fn mirrored_v(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
    ground_down: Vec<u16>,
    ground_left: Vec<u16>,
    ground_up: Vec<u16>,
    ground_right: Vec<u16>,
}

impl CollisionMask {
    /// A fully solid `width` x `height` mask. Dimensions are clipped to 1..=65535.
    pub fn create_box(width: u32, height: u32) -> Self {
        let width = width.clamp(1, MASK_MAX_SIZE);
        let height = height.clamp(1, MASK_MAX_SIZE);
        Self::from_bits(width, height, vec![true; (width * height) as usize])
    }

    /// Builds a mask from row-major solidity bits.
    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Self {
        let width = width.clamp(1, MASK_MAX_SIZE);
        let height = height.clamp(1, MASK_MAX_SIZE);
        let mut bits = bits;
        bits.resize((width * height) as usize, false);
        let mut mask = Self {
            width,
            height,
            bits,
            ground_down: Vec::new(),
            ground_left: Vec::new(),
            ground_up: Vec::new(),
            ground_right: Vec::new(),
        };
        mask.ground_down = mask.build_vertical_map(GroundDir::Down);
        mask.ground_up = mask.build_vertical_map(GroundDir::Up);
        mask.ground_left = mask.build_horizontal_map(GroundDir::Left);
        mask.ground_right = mask.build_horizontal_map(GroundDir::Right);
        mask
    }

    /// Builds a mask from ASCII art: `#` is solid, anything else is empty.
    pub fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut bits = Vec::with_capacity((width * height) as usize);
        for row in rows {
            let bytes = row.as_bytes();
            for x in 0..width as usize {
                bits.push(bytes.get(x) == Some(&b'#'));
            }
        }
        Self::from_bits(width, height, bits)
    }

    /// Loads a mask from the rectangle of an image. Non-transparent pixels are solid.
    pub fn from_image(path: &Path, x: u32, y: u32, width: u32, height: u32) -> Result<Self, String> {
        let image = image::open(path)
            .map_err(|e| format!("Failed to open mask image {}: {e}", path.display()))?
            .to_rgba8();
        let (iw, ih) = image.dimensions();
        if x >= iw || y >= ih {
            return Err(format!(
                "Mask rectangle ({x},{y}) lies outside of {} ({iw}x{ih})",
                path.display()
            ));
        }
        let width = width.clamp(1, iw - x);
        let height = height.clamp(1, ih - y);
        if width > MASK_MAX_SIZE || height > MASK_MAX_SIZE {
            return Err(format!("Masks cannot be larger than {MASK_MAX_SIZE} pixels."));
        }

        let mut bits = Vec::with_capacity((width * height) as usize);
        for j in 0..height {
            for i in 0..width {
                bits.push(image.get_pixel(x + i, y + j).0[3] != 0);
            }
        }
        Ok(Self::from_bits(width, height, bits))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Is the pixel solid? Out-of-range pixels are empty.
    pub fn peek(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.at(x as u32, y as u32)
    }

    /// Is any pixel of the inclusive rectangle solid?
    pub fn area_test(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        let x1 = x1.max(0);
        let y1 = y1.max(0);
        let x2 = x2.min(self.width as i32 - 1);
        let y2 = y2.min(self.height as i32 - 1);
        (y1..=y2).any(|y| (x1..=x2).any(|x| self.at(x as u32, y as u32)))
    }

    /// Ground position relative to the mask, as seen from pixel (x, y).
    /// The pixel is clipped into the mask first.
    pub fn locate_ground(&self, x: i32, y: i32, dir: GroundDir) -> i32 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        let w = self.width as usize;
        let h = self.height as usize;
        let value = match dir {
            GroundDir::Down => self.ground_down[y * w + x],
            GroundDir::Up => self.ground_up[y * w + x],
            GroundDir::Left => self.ground_left[x * h + y],
            GroundDir::Right => self.ground_right[x * h + y],
        };
        value as i32
    }

    fn at(&self, x: u32, y: u32) -> bool {
        self.bits[(y * self.width + x) as usize]
    }

    /// Column-wise maps, indexed by `y * width + x`.
    fn build_vertical_map(&self, dir: GroundDir) -> Vec<u16> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut map = vec![0u16; w * h];
        let solid = |x: usize, y: usize| self.bits[y * w + x];
        for x in 0..w {
            match dir {
                GroundDir::Down => {
                    for y in 0..h {
                        if solid(x, y) {
                            map[y * w + x] = if y > 0 && solid(x, y - 1) {
                                map[(y - 1) * w + x]
                            } else {
                                y as u16
                            };
                        }
                    }
                    for y in (0..h).rev() {
                        if !solid(x, y) {
                            map[y * w + x] = if y + 1 < h {
                                map[(y + 1) * w + x]
                            } else {
                                y as u16
                            };
                        }
                    }
                }
                _ => {
                    for y in (0..h).rev() {
                        if solid(x, y) {
                            map[y * w + x] = if y + 1 < h && solid(x, y + 1) {
                                map[(y + 1) * w + x]
                            } else {
                                y as u16
                            };
                        }
                    }
                    for y in 0..h {
                        if !solid(x, y) {
                            map[y * w + x] = if y > 0 { map[(y - 1) * w + x] } else { 0 };
                        }
                    }
                }
            }
        }
        map
    }

    /// Row-wise maps, indexed by `x * height + y`.
    fn build_horizontal_map(&self, dir: GroundDir) -> Vec<u16> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut map = vec![0u16; w * h];
        let solid = |x: usize, y: usize| self.bits[y * w + x];
        for y in 0..h {
            match dir {
                GroundDir::Right => {
                    for x in 0..w {
                        if solid(x, y) {
                            map[x * h + y] = if x > 0 && solid(x - 1, y) {
                                map[(x - 1) * h + y]
                            } else {
                                x as u16
                            };
                        }
                    }
                    for x in (0..w).rev() {
                        if !solid(x, y) {
                            map[x * h + y] = if x + 1 < w {
                                map[(x + 1) * h + y]
                            } else {
                                x as u16
                            };
                        }
                    }
                }
                _ => {
                    for x in (0..w).rev() {
                        if solid(x, y) {
                            map[x * h + y] = if x + 1 < w && solid(x + 1, y) {
                                map[(x + 1) * h + y]
                            } else {
                                x as u16
                            };
                        }
                    }
                    for x in 0..w {
                        if !solid(x, y) {
                            map[x * h + y] = if x > 0 { map[(x - 1) * h + y] } else { 0 };
                        }
                    }
                }
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> CollisionMask {
        CollisionMask::from_ascii(&[
            "...#", //
            "..##",
            ".###",
            "####",
        ])
    }

    #[test]
    fn box_mask_is_fully_solid_and_clipped() {
        let mask = CollisionMask::create_box(0, 70_000);
        assert_eq!(mask.width(), 1);
        assert_eq!(mask.height(), MASK_MAX_SIZE);
        let mask = CollisionMask::create_box(4, 3);
        assert!(mask.peek(0, 0));
        assert!(mask.peek(3, 2));
        assert!(!mask.peek(4, 2));
        assert!(!mask.peek(-1, 0));
    }

    #[test]
    fn ground_down_finds_top_of_solid_run() {
        let mask = ramp();
        assert_eq!(mask.locate_ground(0, 0, GroundDir::Down), 3);
        assert_eq!(mask.locate_ground(1, 0, GroundDir::Down), 2);
        assert_eq!(mask.locate_ground(3, 0, GroundDir::Down), 0);
        // inside the solid run, the ground is still its top
        assert_eq!(mask.locate_ground(1, 3, GroundDir::Down), 2);
    }

    #[test]
    fn ground_up_finds_bottom_of_solid_run() {
        let mask = CollisionMask::from_ascii(&["####", "##..", "....", "...."]);
        assert_eq!(mask.locate_ground(0, 3, GroundDir::Up), 1);
        assert_eq!(mask.locate_ground(3, 3, GroundDir::Up), 0);
    }

    #[test]
    fn ground_right_and_left_follow_rows() {
        let mask = ramp();
        assert_eq!(mask.locate_ground(0, 1, GroundDir::Right), 2);
        assert_eq!(mask.locate_ground(0, 3, GroundDir::Right), 0);
        assert_eq!(mask.locate_ground(3, 3, GroundDir::Left), 3);
        let wall = CollisionMask::from_ascii(&["##.."]);
        assert_eq!(wall.locate_ground(3, 0, GroundDir::Left), 1);
    }

    #[test]
    fn locate_ground_clips_coordinates() {
        let mask = ramp();
        assert_eq!(
            mask.locate_ground(-10, -10, GroundDir::Down),
            mask.locate_ground(0, 0, GroundDir::Down)
        );
        assert_eq!(
            mask.locate_ground(99, 99, GroundDir::Down),
            mask.locate_ground(3, 3, GroundDir::Down)
        );
    }

    #[test]
    fn empty_column_reports_last_row_going_down() {
        let mask = CollisionMask::from_ascii(&["#.", "#."]);
        assert_eq!(mask.locate_ground(1, 0, GroundDir::Down), 1);
    }

    #[test]
    fn area_test_detects_any_solid_pixel() {
        let mask = ramp();
        assert!(!mask.area_test(0, 0, 2, 0));
        assert!(mask.area_test(0, 0, 3, 0));
        assert!(mask.area_test(-5, 3, 0, 10));
    }
}
