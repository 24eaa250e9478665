//! Scene and ray generators shared by the integration tests.

#![allow(dead_code)]

use lumen_accel::{KdTree, KdTreeConfig, Shape, TriangleMesh};
use lumen_math::{Ray, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `count` small random triangles scattered through `[0, 100]^3`.
pub fn random_triangles(count: usize, seed: u64) -> Vec<[Vec3; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let center = Vec3::new(
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
            );
            let mut corner = || {
                let offset = Vec3::new(
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                );
                (center + offset).clamp(Vec3::ZERO, Vec3::splat(100.0))
            };
            [corner(), corner(), corner()]
        })
        .collect()
}

/// Random unit direction.
pub fn random_direction(rng: &mut StdRng) -> Vec3 {
    loop {
        let d = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let len2 = d.length_squared();
        if len2 > 1e-4 && len2 <= 1.0 {
            return d / len2.sqrt();
        }
    }
}

/// Rays starting inside and around the scene box, some of them bounded.
pub fn random_rays(count: usize, seed: u64) -> Vec<Ray> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let origin = Vec3::new(
                rng.gen_range(-20.0..120.0),
                rng.gen_range(-20.0..120.0),
                rng.gen_range(-20.0..120.0),
            );
            let direction = random_direction(&mut rng);
            if i % 3 == 0 {
                Ray::segment(origin, direction, 0.0, rng.gen_range(5.0..60.0))
            } else {
                Ray::new(origin, direction, 0.0)
            }
        })
        .collect()
}

pub fn build_tree(mesh: TriangleMesh, config: KdTreeConfig) -> KdTree {
    let mut tree = KdTree::new(config);
    tree.add_shape(mesh).unwrap();
    tree.build().unwrap();
    tree
}

/// Closest hit by testing every primitive of `shape`.
pub fn brute_force(shape: &dyn Shape, ray: &Ray) -> Option<f32> {
    let mut ray = *ray;
    let mut best = None;
    for index in 0..shape.primitive_count() {
        if let Some(hit) = shape.intersect_primitive(index, &ray) {
            best = Some(hit.t);
            ray.maxt = hit.t;
        }
    }
    best
}

/// Distances agree up to a relative tolerance.
pub fn same_t(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-4 * a.abs().max(b.abs()).max(1.0)
}
