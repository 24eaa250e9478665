//! Bucket-based tracing of primary and shadow rays.
//!
//! Divides the image into tiles (buckets) that are traced independently
//! and in parallel using rayon.

use crate::camera::Camera;
use lumen_accel::{KdTree, PreliminaryIntersection, Ray, RayPacket, StackDiscipline, PACKET_WIDTH};
use lumen_math::Vec3;

/// A rectangular region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// X coordinate of bucket's top-left corner
    pub x: u32,
    /// Y coordinate of bucket's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Index of this bucket in the trace order
    pub index: usize,
}

impl Bucket {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self { x, y, width, height, index }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Default bucket size in pixels. Even, so 2x2 packets tile full buckets.
pub const DEFAULT_BUCKET_SIZE: u32 = 32;

/// Whether rays are traced one at a time or as 2x2 packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceMode {
    Scalar,
    Packet,
}

impl TraceMode {
    pub const ALL: [TraceMode; 2] = [TraceMode::Scalar, TraceMode::Packet];
}

/// Generate buckets for an image, sorted in spiral order from center.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let bucket_size = bucket_size.max(1);
    let mut buckets = Vec::new();

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            let bw = bucket_size.min(width - x);
            let bh = bucket_size.min(height - y);
            buckets.push(Bucket::new(x, y, bw, bh, buckets.len()));
            x += bucket_size;
        }
        y += bucket_size;
    }

    sort_spiral(&mut buckets, width, height);
    for (i, bucket) in buckets.iter_mut().enumerate() {
        bucket.index = i;
    }
    buckets
}

/// Sort buckets by distance from image center.
fn sort_spiral(buckets: &mut [Bucket], width: u32, height: u32) {
    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let distance = |b: &Bucket| {
        let x = b.x as f32 + b.width as f32 / 2.0;
        let y = b.y as f32 + b.height as f32 / 2.0;
        (x - center_x).powi(2) + (y - center_y).powi(2)
    };

    buckets.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}

/// Primary hits of one bucket, in row-major order within the bucket.
#[derive(Debug, Clone)]
pub struct BucketResult {
    pub bucket: Bucket,
    pub hits: Vec<PreliminaryIntersection>,
    /// World-space hit point per pixel, `None` where the ray escaped
    pub points: Vec<Option<Vec3>>,
}

impl BucketResult {
    fn new(bucket: Bucket) -> Self {
        let count = bucket.pixel_count() as usize;
        Self {
            bucket,
            hits: vec![PreliminaryIntersection::NONE; count],
            points: vec![None; count],
        }
    }

    fn record(&mut self, local_x: u32, local_y: u32, ray: &Ray, hit: PreliminaryIntersection) {
        let index = (local_y * self.bucket.width + local_x) as usize;
        self.points[index] = hit.is_valid().then(|| ray.at(hit.t));
        self.hits[index] = hit;
    }

    /// Number of pixels whose primary ray hit something.
    pub fn hit_count(&self) -> usize {
        self.hits.iter().filter(|hit| hit.is_valid()).count()
    }
}

/// Trace the closest hit of every pixel in `bucket`.
pub fn trace_bucket(
    bucket: &Bucket,
    camera: &Camera,
    tree: &KdTree,
    discipline: StackDiscipline,
    mode: TraceMode,
) -> BucketResult {
    let mut result = BucketResult::new(*bucket);

    match mode {
        TraceMode::Scalar => {
            for local_y in 0..bucket.height {
                for local_x in 0..bucket.width {
                    let ray = camera.get_ray(bucket.x + local_x, bucket.y + local_y);
                    let hit = tree.ray_intersect_preliminary_with(&ray, discipline);
                    result.record(local_x, local_y, &ray, hit);
                }
            }
        }
        TraceMode::Packet => {
            for local_y in (0..bucket.height).step_by(2) {
                for local_x in (0..bucket.width).step_by(2) {
                    let packet = camera.get_packet(bucket.x + local_x, bucket.y + local_y);
                    let hits = tree.ray_intersect_packet(&packet, discipline);
                    for (lane, hit) in hits.into_iter().enumerate() {
                        let x = local_x + lane as u32 % 2;
                        let y = local_y + lane as u32 / 2;
                        // Clamped lanes past the bucket edge are dropped
                        if x < bucket.width && y < bucket.height {
                            result.record(x, y, &packet.rays[lane], hit);
                        }
                    }
                }
            }
        }
    }

    result
}

/// Shadow ray from `point` towards `light`, stopping just short of both ends.
pub fn shadow_ray(point: Vec3, light: Vec3, epsilon: f32) -> Ray {
    let to_light = light - point;
    let distance = to_light.length();
    Ray::segment(point, to_light / distance, epsilon, distance * (1.0 - 1e-4))
}

/// Occlusion towards `light` for every hit pixel of `result`.
///
/// Pixels without a primary hit are reported as unoccluded.
pub fn shadow_bucket(
    result: &BucketResult,
    tree: &KdTree,
    light: Vec3,
    epsilon: f32,
    discipline: StackDiscipline,
    mode: TraceMode,
) -> Vec<bool> {
    let mut occluded = vec![false; result.points.len()];
    let pending: Vec<(usize, Ray)> = result
        .points
        .iter()
        .enumerate()
        .filter_map(|(index, point)| point.map(|p| (index, shadow_ray(p, light, epsilon))))
        .collect();

    match mode {
        TraceMode::Scalar => {
            for (index, ray) in &pending {
                occluded[*index] = tree.ray_test_with(ray, discipline);
            }
        }
        TraceMode::Packet => {
            for chunk in pending.chunks(PACKET_WIDTH) {
                // Short chunks repeat their last ray
                let rays = std::array::from_fn(|lane| chunk[lane.min(chunk.len() - 1)].1);
                let blocked = tree.ray_test_packet(&RayPacket::new(rays), discipline);
                for (lane, (index, _)) in chunk.iter().enumerate() {
                    occluded[*index] = blocked[lane];
                }
            }
        }
    }

    occluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_accel::{KdTreeConfig, TriangleMesh};

    #[test]
    fn test_generate_buckets_exact_fit() {
        let buckets = generate_buckets(128, 128, 64);
        assert_eq!(buckets.len(), 4);

        let total_pixels: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total_pixels, 128 * 128);
    }

    #[test]
    fn test_generate_buckets_partial_fit() {
        let buckets = generate_buckets(100, 100, 64);
        assert_eq!(buckets.len(), 4);

        let total_pixels: u32 = buckets.iter().map(|b| b.pixel_count()).sum();
        assert_eq!(total_pixels, 100 * 100);
    }

    #[test]
    fn test_spiral_order() {
        let buckets = generate_buckets(192, 192, 64);
        assert_eq!(buckets.len(), 9);

        // Center bucket first
        assert_eq!((buckets[0].x, buckets[0].y), (64, 64));
        assert!(buckets.iter().enumerate().all(|(i, b)| b.index == i));
    }

    #[test]
    fn test_scalar_and_packet_buckets_agree() {
        let mut tree = KdTree::new(KdTreeConfig::default());
        tree.add_shape(TriangleMesh::cuboid(Vec3::ZERO, Vec3::ONE)).unwrap();
        tree.build().unwrap();

        let mut camera = Camera::new().with_resolution(13, 9).framing(&tree.bbox());
        camera.initialize();

        // Odd sized bucket exercises the clamped packet lanes
        let bucket = Bucket::new(0, 0, 13, 9, 0);
        for discipline in StackDiscipline::ALL {
            let scalar = trace_bucket(&bucket, &camera, &tree, discipline, TraceMode::Scalar);
            let packet = trace_bucket(&bucket, &camera, &tree, discipline, TraceMode::Packet);
            assert!(scalar.hit_count() > 0);
            assert_eq!(scalar.hit_count(), packet.hit_count());
            for (a, b) in scalar.hits.iter().zip(&packet.hits) {
                assert_eq!(a.is_valid(), b.is_valid());
                if a.is_valid() {
                    assert!((a.t - b.t).abs() < 1e-4 * a.t.max(1.0));
                }
            }
        }
    }

    #[test]
    fn test_shadow_rays_blocked_by_occluder() {
        let mut tree = KdTree::new(KdTreeConfig::default());
        // Floor, with a box hovering between it and the light
        tree.add_shape(TriangleMesh::cuboid(Vec3::ZERO, Vec3::new(10.0, 0.1, 10.0)))
            .unwrap();
        tree.add_shape(TriangleMesh::cuboid(Vec3::new(0.0, 3.0, 0.0), Vec3::ONE))
            .unwrap();
        tree.build().unwrap();

        let light = Vec3::new(0.0, 10.0, 0.0);
        let mut result = BucketResult::new(Bucket::new(0, 0, 3, 1, 0));
        result.points = vec![
            Some(Vec3::new(0.0, 0.1, 0.0)),
            Some(Vec3::new(8.0, 0.1, 8.0)),
            None,
        ];

        for discipline in StackDiscipline::ALL {
            for mode in TraceMode::ALL {
                let occluded = shadow_bucket(&result, &tree, light, 1e-3, discipline, mode);
                assert_eq!(occluded, vec![true, false, false]);
            }
        }
    }
}
