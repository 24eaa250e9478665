//! Benchmark scenes: OBJ files loaded with tobj, or a procedural fallback.

use anyhow::{bail, Context, Result};
use lumen_accel::{KdTree, Sphere, TriangleMesh};
use lumen_math::{Mat4, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Load every model of an OBJ file into `tree` as one mesh per model.
///
/// Returns the number of triangles added.
pub fn load_obj(path: &Path, tree: &mut KdTree) -> Result<usize> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )
    .with_context(|| format!("Failed to load OBJ file {}", path.display()))?;

    if models.is_empty() {
        bail!("No models found in {}", path.display());
    }

    let mut triangles = 0;
    for model in models {
        let mesh = model.mesh;
        if mesh.indices.is_empty() {
            log::warn!("Skipping '{}': no faces", model.name);
            continue;
        }

        let positions: Vec<Vec3> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect();
        let uvs = (!mesh.texcoords.is_empty()).then(|| {
            mesh.texcoords
                .chunks_exact(2)
                .map(|uv| Vec2::new(uv[0], uv[1]))
                .collect::<Vec<_>>()
        });

        let shape = TriangleMesh::new_with_uvs(positions, mesh.indices, uvs)
            .with_context(|| format!("Invalid mesh '{}'", model.name))?;
        log::info!(
            "Loaded '{}': {} vertices, {} triangles",
            model.name,
            shape.vertex_count(),
            shape.triangle_count()
        );
        triangles += shape.triangle_count();
        tree.add_shape(shape)?;
    }

    Ok(triangles)
}

/// Ground plane, rotated boxes, spheres and a cloud of small triangles.
///
/// Returns the number of primitives added.
pub fn procedural(tree: &mut KdTree, triangles: usize, seed: u64) -> Result<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut primitives = 0;

    let ground = TriangleMesh::from_triangles(&[
        [
            Vec3::new(-60.0, 0.0, -60.0),
            Vec3::new(60.0, 0.0, 60.0),
            Vec3::new(60.0, 0.0, -60.0),
        ],
        [
            Vec3::new(-60.0, 0.0, -60.0),
            Vec3::new(-60.0, 0.0, 60.0),
            Vec3::new(60.0, 0.0, 60.0),
        ],
    ]);
    primitives += ground.triangle_count();
    tree.add_shape(ground)?;

    for _ in 0..8 {
        let half = Vec3::new(
            rng.gen_range(1.0..4.0),
            rng.gen_range(1.0..8.0),
            rng.gen_range(1.0..4.0),
        );
        let position = Vec3::new(rng.gen_range(-40.0..40.0), half.y, rng.gen_range(-40.0..40.0));
        let transform = Mat4::from_translation(position) * Mat4::from_rotation_y(rng.gen_range(0.0..1.5));
        let cuboid = TriangleMesh::cuboid(Vec3::ZERO, half).transformed(&transform);
        primitives += cuboid.triangle_count();
        tree.add_shape(cuboid)?;
    }

    for _ in 0..6 {
        let radius = rng.gen_range(1.0..5.0);
        let center = Vec3::new(rng.gen_range(-40.0..40.0), radius, rng.gen_range(-40.0..40.0));
        tree.add_shape(Sphere::new(center, radius))?;
        primitives += 1;
    }

    // Cloud of debris hovering over the ground, denser near the middle
    let debris: Vec<[Vec3; 3]> = (0..triangles)
        .map(|_| {
            let radius = 30.0 * rng.gen::<f32>().powi(2);
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let center = Vec3::new(
                radius * angle.cos(),
                rng.gen_range(2.0..25.0),
                radius * angle.sin(),
            );
            let mut corner = || {
                center
                    + Vec3::new(
                        rng.gen_range(-0.5..0.5),
                        rng.gen_range(-0.5..0.5),
                        rng.gen_range(-0.5..0.5),
                    )
            };
            [corner(), corner(), corner()]
        })
        .collect();
    if !debris.is_empty() {
        primitives += debris.len();
        tree.add_shape(TriangleMesh::from_triangles(&debris))?;
    }

    Ok(primitives)
}
