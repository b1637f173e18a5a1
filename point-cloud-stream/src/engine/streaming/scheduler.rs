use bevy::prelude::*;
use constants::stream::BOOTSTRAP_CHUNK;
use std::collections::HashSet;
use std::time::Duration;

/// Camera state the scheduler ranks chunks against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    pub world_position: Vec3,
    pub view_proj: Mat4,
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self::looking_at(Vec3::new(0.0, -10.0, 10.0), Vec3::ZERO)
    }
}

impl Viewpoint {
    pub fn new(world_position: Vec3, view_proj: Mat4) -> Self {
        Self {
            world_position,
            view_proj,
        }
    }

    /// Z-up perspective camera at `eye` looking at `target`.
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let view = Mat4::look_at_rh(eye, target, Vec3::Z);
        let proj = Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.1, 10_000.0);
        Self::new(eye, proj * view)
    }

    /// Normalised device coordinates of a world point.
    pub fn project(&self, point: Vec3) -> Vec3 {
        self.view_proj.project_point3(point)
    }

    /// Squared distance from the viewport centre; non-finite projections rank last.
    fn screen_distance(&self, point: Vec3) -> f32 {
        let ndc = self.project(point);
        let d = ndc.x * ndc.x + ndc.y * ndc.y;
        if d.is_finite() { d } else { f32::MAX }
    }
}

/// Pick the next chunk to fetch.
///
/// Chunk 0 comes first whenever it is missing. After that the unseen chunk whose seed
/// projects closest to the centre of the screen wins; ties go to the seed nearest the
/// camera, then to the lowest id. `None` means every chunk is loaded.
pub fn next_chunk(viewpoint: &Viewpoint, loaded: &HashSet<u32>, seeds: &[Vec3]) -> Option<u32> {
    if seeds.is_empty() {
        return None;
    }
    if !loaded.contains(&BOOTSTRAP_CHUNK) {
        return Some(BOOTSTRAP_CHUNK);
    }

    seeds
        .iter()
        .enumerate()
        .map(|(id, seed)| (id as u32, *seed))
        .filter(|(id, _)| !loaded.contains(id))
        .map(|(id, seed)| {
            (
                id,
                viewpoint.screen_distance(seed),
                viewpoint.world_position.distance_squared(seed),
            )
        })
        .min_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then(a.2.total_cmp(&b.2))
                .then(a.0.cmp(&b.0))
        })
        .map(|(id, _, _)| id)
}

/// Cooldown between one fetch completing and the next one starting.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
    ready_at: Option<Duration>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ready_at: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the cooldown from `now`.
    pub fn mark(&mut self, now: Duration) {
        self.ready_at = Some(now + self.interval);
    }

    pub fn is_ready(&self, now: Duration) -> bool {
        self.ready_at.is_none_or(|ready_at| now >= ready_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(40.0, 0.0, 0.0),
            Vec3::new(0.0, 40.0, 0.0),
            Vec3::new(-40.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn bootstrap_chunk_comes_first_from_any_viewpoint() {
        let loaded = HashSet::new();
        for eye in [
            Vec3::new(0.0, -10.0, 10.0),
            Vec3::new(500.0, 500.0, 50.0),
            Vec3::new(-40.0, 0.0, 5.0),
        ] {
            let viewpoint = Viewpoint::looking_at(eye, Vec3::new(40.0, 0.0, 0.0));
            assert_eq!(next_chunk(&viewpoint, &loaded, &seeds()), Some(0));
        }
    }

    #[test]
    fn picks_the_chunk_nearest_the_screen_centre() {
        let loaded: HashSet<u32> = [0].into();
        let viewpoint = Viewpoint::looking_at(Vec3::new(0.0, 0.0, 100.0), Vec3::new(0.0, 40.0, 0.0));
        assert_eq!(next_chunk(&viewpoint, &loaded, &seeds()), Some(2));

        let viewpoint =
            Viewpoint::looking_at(Vec3::new(-40.0, -40.0, 100.0), Vec3::new(-40.0, 0.0, 0.0));
        assert_eq!(next_chunk(&viewpoint, &loaded, &seeds()), Some(3));
    }

    #[test]
    fn screen_ties_prefer_the_nearer_seed() {
        let seeds = vec![
            Vec3::ZERO,
            Vec3::new(0.0, 50.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ];
        let viewpoint = Viewpoint::looking_at(Vec3::new(0.0, -100.0, 0.0), Vec3::ZERO);
        let loaded: HashSet<u32> = [0].into();
        assert_eq!(next_chunk(&viewpoint, &loaded, &seeds), Some(2));
    }

    #[test]
    fn none_once_everything_is_loaded() {
        let loaded: HashSet<u32> = (0..4).collect();
        assert_eq!(next_chunk(&Viewpoint::default(), &loaded, &seeds()), None);
        assert_eq!(next_chunk(&Viewpoint::default(), &HashSet::new(), &[]), None);
    }

    #[test]
    fn unprojectable_seeds_remain_candidates() {
        let eye = Vec3::new(0.0, -100.0, 0.0);
        let seeds = vec![Vec3::ZERO, eye];
        let viewpoint = Viewpoint::looking_at(eye, Vec3::ZERO);
        let loaded: HashSet<u32> = [0].into();
        assert_eq!(next_chunk(&viewpoint, &loaded, &seeds), Some(1));
    }

    #[test]
    fn throttle_waits_one_interval_after_each_mark() {
        let mut throttle = Throttle::new(Duration::from_millis(100));
        assert!(throttle.is_ready(Duration::ZERO));

        throttle.mark(Duration::from_millis(250));
        assert!(!throttle.is_ready(Duration::from_millis(300)));
        assert!(throttle.is_ready(Duration::from_millis(350)));
    }
}
