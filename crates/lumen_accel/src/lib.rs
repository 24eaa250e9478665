//! Lumen acceleration structure.
//!
//! A surface area heuristic kd-tree over heterogeneous shapes (triangle
//! meshes, spheres, or anything implementing [`Shape`]), with closest-hit
//! and any-hit ray queries for single rays and 4-wide packets.

mod error;
pub mod kdtree;
mod mesh;
mod shape;
mod sphere;
pub mod traversal;

pub use error::{KdTreeError, KdTreeResult};
pub use kdtree::{
    BuildContext, BuildStats, KdNode, KdTree, KdTreeConfig, PrimitiveMap, SurfaceAreaHeuristic, MAX_DEPTH,
};
pub use mesh::TriangleMesh;
pub use shape::{PreliminaryIntersection, PrimitiveHit, Shape, SurfaceInteraction};
pub use sphere::Sphere;
pub use traversal::{RayPacket, StackDiscipline, PACKET_WIDTH};

/// Re-export common math types from lumen_math
pub use lumen_math::{Aabb, Ray, Vec2, Vec3};
