//! Spatial index of the obstacles of one frame.
//!
//! Obstacles are added, then `build()` partitions them into buckets along the
//! x-axis with a counting sort and locks the map. Queries only visit the
//! buckets the query range overlaps. The map is cleared and rebuilt on every
//! tick; it is read-only between `build()` and the next `clear()`.

use super::collision_mask::GroundDir;
use super::obstacle::{Layer, Obstacle};

/// Width of a bucket, in pixels. About the size of a brick.
const BUCKET_LENGTH: i32 = 64;

const MAX_ROI_WIDTH: i32 = 16384;
const MAX_BUCKETS: i32 = MAX_ROI_WIDTH / BUCKET_LENGTH;

/// Orientation of the physics actor asking the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovMode {
    Floor,
    RightWall,
    Ceiling,
    LeftWall,
}

#[derive(Debug, Default)]
pub struct ObstacleMap {
    obstacles: Vec<Obstacle>,
    sorted: Vec<usize>,
    bucket_start: Vec<usize>,
    min_x: i32,
    locked: bool,
}

impl ObstacleMap {
    pub fn new() -> Self {
        Self {
            min_x: i32::MAX,
            ..Self::default()
        }
    }

    pub fn add(&mut self, obstacle: Obstacle) -> Result<(), String> {
        if self.locked {
            return Err("Obstacle map is locked".to_string());
        }
        self.min_x = self.min_x.min(obstacle.position().0);
        self.obstacles.push(obstacle);
        Ok(())
    }

    /// Drops every obstacle and unlocks the map.
    pub fn clear(&mut self) {
        self.obstacles.clear();
        self.sorted.clear();
        self.bucket_start.clear();
        self.min_x = i32::MAX;
        self.locked = false;
    }

    /// Partitions the obstacles into buckets and locks the map.
    pub fn build(&mut self) {
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut number_of_buckets = 0usize;
        for (j, obstacle) in self.obstacles.iter().enumerate() {
            let x = obstacle.position().0;
            let first = ((x - self.min_x) / BUCKET_LENGTH) as usize;
            let last = (((x + obstacle.width() - 1) - self.min_x) / BUCKET_LENGTH)
                .min(MAX_BUCKETS - 1) as usize;
            number_of_buckets = number_of_buckets.max(last + 1);
            for b in first..=last {
                pairs.push((j, b));
            }
        }

        let mut count = vec![0usize; number_of_buckets];
        for &(_, b) in &pairs {
            count[b] += 1;
        }
        for b in 1..number_of_buckets {
            count[b] += count[b - 1];
        }

        self.bucket_start.clear();
        self.bucket_start.push(0);
        self.bucket_start.extend_from_slice(&count);

        self.sorted = vec![0; pairs.len()];
        for &(j, b) in pairs.iter().rev() {
            count[b] -= 1;
            self.sorted[count[b]] = j;
        }
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// The obstacle a sensor spanning (x1,y1)-(x2,y2) should react to.
    pub fn get_best_obstacle_at(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        mode: MovMode,
        layer: Layer,
    ) -> Option<&Obstacle> {
        if x1 > x2 || y1 > y2 {
            return None;
        }
        let mut best: Option<&Obstacle> = None;
        for obstacle in self.candidates(x1, x2) {
            if obstacle.layer().interacts_with(layer) && obstacle.got_collision(x1, y1, x2, y2) {
                best = Some(match best {
                    None => obstacle,
                    Some(b) => pick_best(obstacle, b, x1, y1, x2, y2, mode),
                });
            }
        }
        best
    }

    pub fn obstacle_exists(&self, x: i32, y: i32, layer: Layer) -> bool {
        self.candidates(x, x)
            .any(|o| o.layer().interacts_with(layer) && o.got_collision(x, y, x, y))
    }

    pub fn solid_exists(&self, x: i32, y: i32, layer: Layer) -> bool {
        self.candidates(x, x).any(|o| {
            o.layer().interacts_with(layer) && o.got_collision(x, y, x, y) && o.is_solid()
        })
    }

    /// The tallest ground touched by the sensor, with its position.
    pub fn find_ground(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        layer: Layer,
        dir: GroundDir,
    ) -> Option<(&Obstacle, i32)> {
        if x1 > x2 || y1 > y2 {
            return None;
        }
        // measured from the head of the sensor
        let (x, y) = match dir {
            GroundDir::Down | GroundDir::Right => (x1, y1),
            GroundDir::Up | GroundDir::Left => (x2, y2),
        };
        let mut tallest: Option<(&Obstacle, i32)> = None;
        for obstacle in self.candidates(x1, x2) {
            if !obstacle.layer().interacts_with(layer) || !obstacle.got_collision(x1, y1, x2, y2) {
                continue;
            }
            let ground = obstacle.ground_position(x, y, dir);
            tallest = match tallest {
                None => Some((obstacle, ground)),
                Some((current, current_ground)) => {
                    let better = match dir {
                        GroundDir::Down | GroundDir::Right => ground < current_ground,
                        GroundDir::Up | GroundDir::Left => ground > current_ground,
                    };
                    if better {
                        Some((obstacle, ground))
                    } else {
                        Some((current, current_ground))
                    }
                }
            };
        }
        tallest
    }

    fn candidates(&self, x1: i32, x2: i32) -> impl Iterator<Item = &Obstacle> + '_ {
        let range = self.partition_limits(x1, x2).unwrap_or((0, 0));
        self.sorted[range.0..range.1]
            .iter()
            .map(move |&j| &self.obstacles[j])
    }

    fn partition_limits(&self, x1: i32, x2: i32) -> Option<(usize, usize)> {
        if !self.locked {
            return None;
        }
        let number_of_buckets = self.bucket_start.len().saturating_sub(1) as i64;
        let first = ((x1 as i64 - self.min_x as i64).div_euclid(BUCKET_LENGTH as i64)).max(0);
        let last = (x2 as i64 - self.min_x as i64)
            .div_euclid(BUCKET_LENGTH as i64)
            .min(number_of_buckets - 1);
        if first > last {
            return None;
        }
        Some((
            self.bucket_start[first as usize],
            self.bucket_start[last as usize + 1],
        ))
    }
}

fn pick_best<'a>(
    a: &'a Obstacle,
    b: &'a Obstacle,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    mode: MovMode,
) -> &'a Obstacle {
    let (sa, sb) = (a.is_solid(), b.is_solid());

    if sa && sb {
        return match mode {
            MovMode::Floor => pick_min(a, b, x2, y2, GroundDir::Down),
            MovMode::RightWall => pick_min(a, b, x2, y1, GroundDir::Right),
            MovMode::Ceiling => pick_max(a, b, x2, y1, GroundDir::Up),
            MovMode::LeftWall => pick_max(a, b, x1, y1, GroundDir::Left),
        };
    }

    if !sa && !sb {
        // one-way platforms: closest to the tail of the sensor
        let (x, y, dir) = match mode {
            MovMode::Floor => (x2, y2, GroundDir::Down),
            MovMode::RightWall => (x2, y1, GroundDir::Right),
            MovMode::Ceiling => (x1, y1, GroundDir::Up),
            MovMode::LeftWall => (x1, y2, GroundDir::Left),
        };
        let ha = a.ground_position(x, y, dir);
        let hb = b.ground_position(x, y, dir);
        return if (ha - y).abs() < (hb - y).abs() { a } else { b };
    }

    if sa {
        a
    } else {
        b
    }
}

fn pick_min<'a>(a: &'a Obstacle, b: &'a Obstacle, x: i32, y: i32, dir: GroundDir) -> &'a Obstacle {
    if a.ground_position(x, y, dir) < b.ground_position(x, y, dir) {
        a
    } else {
        b
    }
}

fn pick_max<'a>(a: &'a Obstacle, b: &'a Obstacle, x: i32, y: i32, dir: GroundDir) -> &'a Obstacle {
    if a.ground_position(x, y, dir) >= b.ground_position(x, y, dir) {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::collision_mask::CollisionMask;
    use crate::level::obstacle::ObstacleFlags;
    use std::sync::Arc;

    fn block(x: i32, y: i32, w: u32, h: u32, layer: Layer, flags: ObstacleFlags) -> Obstacle {
        Obstacle::new(Arc::new(CollisionMask::create_box(w, h)), x, y, layer, flags)
    }

    fn built(obstacles: Vec<Obstacle>) -> ObstacleMap {
        let mut map = ObstacleMap::new();
        for o in obstacles {
            map.add(o).expect("map is unlocked");
        }
        map.build();
        map
    }

    #[test]
    fn add_after_build_is_rejected_until_clear() {
        let mut map = built(vec![block(0, 0, 8, 8, Layer::Default, ObstacleFlags::SOLID)]);
        assert!(map.is_locked());
        assert!(map
            .add(block(0, 0, 8, 8, Layer::Default, ObstacleFlags::SOLID))
            .is_err());
        map.clear();
        assert!(map.is_empty());
        assert!(map
            .add(block(0, 0, 8, 8, Layer::Default, ObstacleFlags::SOLID))
            .is_ok());
    }

    #[test]
    fn queries_find_obstacles_across_buckets() {
        let map = built(vec![
            block(-500, 0, 32, 32, Layer::Default, ObstacleFlags::SOLID),
            block(0, 0, 200, 16, Layer::Default, ObstacleFlags::SOLID),
            block(1000, 50, 16, 16, Layer::Default, ObstacleFlags::CLOUD),
        ]);
        assert!(map.obstacle_exists(-490, 10, Layer::Default));
        assert!(map.obstacle_exists(150, 5, Layer::Default));
        assert!(map.obstacle_exists(1008, 55, Layer::Default));
        assert!(!map.solid_exists(1008, 55, Layer::Default));
        assert!(!map.obstacle_exists(500, 5, Layer::Default));
        assert!(!map.obstacle_exists(5000, 5, Layer::Default));
        assert!(!map.obstacle_exists(-5000, 5, Layer::Default));
    }

    #[test]
    fn layer_filter_hides_other_loop_layers() {
        let map = built(vec![
            block(0, 0, 16, 16, Layer::Green, ObstacleFlags::SOLID),
            block(32, 0, 16, 16, Layer::Yellow, ObstacleFlags::SOLID),
        ]);
        assert!(map.obstacle_exists(5, 5, Layer::Green));
        assert!(!map.obstacle_exists(40, 5, Layer::Green));
        assert!(map.obstacle_exists(40, 5, Layer::Yellow));
        assert!(map.obstacle_exists(5, 5, Layer::Default));
        assert!(map.obstacle_exists(40, 5, Layer::Default));
    }

    #[test]
    fn solid_beats_cloud() {
        let map = built(vec![
            block(0, 10, 16, 16, Layer::Default, ObstacleFlags::CLOUD),
            block(0, 20, 16, 16, Layer::Default, ObstacleFlags::SOLID),
        ]);
        let best = map
            .get_best_obstacle_at(4, 0, 4, 30, MovMode::Floor, Layer::Default)
            .expect("something is there");
        assert!(best.is_solid());
    }

    #[test]
    fn floor_picks_tallest_solid() {
        let map = built(vec![
            block(0, 40, 16, 16, Layer::Default, ObstacleFlags::SOLID),
            block(0, 20, 16, 40, Layer::Default, ObstacleFlags::SOLID),
        ]);
        let best = map
            .get_best_obstacle_at(4, 0, 4, 50, MovMode::Floor, Layer::Default)
            .expect("something is there");
        assert_eq!(best.position(), (0, 20));
    }

    #[test]
    fn find_ground_reports_position_from_sensor_head() {
        let map = built(vec![
            block(0, 100, 64, 16, Layer::Default, ObstacleFlags::SOLID),
            block(0, 90, 64, 16, Layer::Default, ObstacleFlags::CLOUD),
        ]);
        let (obstacle, ground) = map
            .find_ground(10, 80, 10, 110, Layer::Default, GroundDir::Down)
            .expect("ground below");
        assert_eq!(ground, 90);
        assert!(!obstacle.is_solid());
        assert!(map
            .find_ground(10, 0, 10, 50, Layer::Default, GroundDir::Down)
            .is_none());
    }

    #[test]
    fn inverted_ranges_return_nothing() {
        let map = built(vec![block(0, 0, 16, 16, Layer::Default, ObstacleFlags::SOLID)]);
        assert!(map
            .get_best_obstacle_at(10, 0, 0, 10, MovMode::Floor, Layer::Default)
            .is_none());
        assert!(map
            .find_ground(0, 10, 10, 0, Layer::Default, GroundDir::Down)
            .is_none());
    }

    #[test]
    fn unbuilt_map_answers_no() {
        let mut map = ObstacleMap::new();
        map.add(block(0, 0, 16, 16, Layer::Default, ObstacleFlags::SOLID))
            .expect("unlocked");
        assert!(!map.obstacle_exists(5, 5, Layer::Default));
    }
}
