//! SAH kd-tree over a set of shapes.
//!
//! Usage follows a strict two-phase lifecycle:
//!
//! 1. Register shapes with [`KdTree::add_shape`] and call [`KdTree::build`]
//!    exactly once.
//! 2. Query the finished tree from any number of threads through shared
//!    references; the tree is immutable after `build()`.
//!
//! # Example
//!
//! ```
//! use lumen_accel::{KdTree, KdTreeConfig, TriangleMesh};
//! use lumen_math::{Ray, Vec3};
//!
//! let mut tree = KdTree::new(KdTreeConfig::default());
//! tree.add_shape(TriangleMesh::cuboid(Vec3::ZERO, Vec3::ONE)).unwrap();
//! tree.build().unwrap();
//!
//! let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 0.0);
//! let hit = tree.ray_intersect_preliminary(&ray);
//! assert_eq!(hit.t, 4.0);
//! ```

mod builder;
mod config;
mod context;
mod node;
mod primitive_map;
mod sah;
mod split;
mod stats;

use std::sync::Arc;

use lumen_math::{Aabb, Ray};

use crate::error::{KdTreeError, KdTreeResult};
use crate::shape::{PreliminaryIntersection, Shape, SurfaceInteraction};
use crate::traversal::{QueryKind, RayPacket, StackDiscipline, TreeView, PACKET_WIDTH};
use builder::Builder;

pub use config::{KdTreeConfig, MAX_DEPTH};
pub use context::BuildContext;
pub use node::{KdNode, MAX_NODE_PAYLOAD};
pub use primitive_map::{PrimitiveMap, MAX_PRIMITIVES};
pub use sah::SurfaceAreaHeuristic;
pub use stats::{BuildStats, HISTOGRAM_BINS};

/// A kd-tree acceleration structure.
pub struct KdTree {
    config: KdTreeConfig,
    shapes: Vec<Arc<dyn Shape>>,
    map: PrimitiveMap,
    bbox: Aabb,
    nodes: Vec<KdNode>,
    indices: Vec<u32>,
    stats: Option<BuildStats>,
}

impl KdTree {
    /// Create an empty, unbuilt tree.
    pub fn new(config: KdTreeConfig) -> Self {
        Self {
            config,
            shapes: Vec::new(),
            map: PrimitiveMap::new(),
            bbox: Aabb::EMPTY,
            nodes: Vec::new(),
            indices: Vec::new(),
            stats: None,
        }
    }

    /// Register a shape and return its index.
    pub fn add_shape<S: Shape + 'static>(&mut self, shape: S) -> KdTreeResult<u32> {
        self.add_shared_shape(Arc::new(shape))
    }

    /// Register a shape that is also owned elsewhere.
    pub fn add_shared_shape(&mut self, shape: Arc<dyn Shape>) -> KdTreeResult<u32> {
        if self.is_built() {
            return Err(KdTreeError::AlreadyBuilt);
        }
        let index = self.map.push(shape.primitive_count())?;
        self.shapes.push(shape);
        Ok(index)
    }

    /// Build the tree over all registered shapes.
    ///
    /// A tree without shapes builds successfully and never reports a hit.
    /// On error the tree stays unbuilt.
    pub fn build(&mut self) -> KdTreeResult<()> {
        if self.is_built() {
            return Err(KdTreeError::AlreadyBuilt);
        }
        self.config.validate()?;

        let mut bbox = Aabb::EMPTY;
        for (index, shape) in self.shapes.iter().enumerate() {
            if self.map.range(index as u32).is_empty() {
                return Err(KdTreeError::EmptyShape { shape: index });
            }
            let shape_box = shape.bbox();
            if !shape_box.is_finite() {
                return Err(KdTreeError::DegenerateBounds { shape: index });
            }
            bbox.expand(&shape_box);
        }

        log::info!(
            "Building kd-tree over {} primitives from {} shapes",
            self.map.primitive_count(),
            self.shapes.len()
        );

        let built = Builder::new(&self.config, &self.shapes, &self.map).build(bbox)?;
        built.stats.log();

        self.bbox = bbox;
        self.nodes = built.nodes;
        self.indices = built.indices;
        self.stats = Some(built.stats);
        Ok(())
    }

    /// True once `build()` has succeeded.
    pub fn is_built(&self) -> bool {
        self.stats.is_some()
    }

    /// Bounds of all registered shapes. Empty before `build()`.
    pub fn bbox(&self) -> Aabb {
        self.bbox
    }

    pub fn primitive_count(&self) -> u32 {
        self.map.primitive_count()
    }

    pub fn shape_count(&self) -> u32 {
        self.map.shape_count()
    }

    pub fn shape(&self, index: u32) -> Option<&Arc<dyn Shape>> {
        self.shapes.get(index as usize)
    }

    pub fn primitive_map(&self) -> &PrimitiveMap {
        &self.map
    }

    pub fn config(&self) -> &KdTreeConfig {
        &self.config
    }

    pub fn stats(&self) -> Option<&BuildStats> {
        self.stats.as_ref()
    }

    /// Flat node array, root first.
    pub fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }

    /// Leaf index array of global primitive ids.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Raw bytes of the node array, e.g. for upload to a GPU buffer.
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Raw bytes of the leaf index array.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Number of leaves per primitive count (last bin collects the rest).
    pub fn leaf_histogram(&self) -> &[usize] {
        self.stats
            .as_ref()
            .map(|s| s.leaf_histogram.as_slice())
            .unwrap_or_default()
    }

    fn view(&self) -> TreeView<'_> {
        assert!(self.is_built(), "kd-tree queried before build()");
        TreeView {
            nodes: &self.nodes,
            indices: &self.indices,
            shapes: &self.shapes,
            map: &self.map,
            bbox: self.bbox,
        }
    }

    /// Closest hit along `ray` within `[ray.mint, ray.maxt]`.
    ///
    /// Returns [`PreliminaryIntersection::NONE`] on a miss.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been built.
    pub fn ray_intersect_preliminary(&self, ray: &Ray) -> PreliminaryIntersection {
        self.ray_intersect_preliminary_with(ray, StackDiscipline::default())
    }

    /// Closest hit using a specific traversal discipline.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been built.
    pub fn ray_intersect_preliminary_with(&self, ray: &Ray, discipline: StackDiscipline) -> PreliminaryIntersection {
        self.view().trace(ray, discipline, QueryKind::Closest).hits[0]
    }

    /// True if anything blocks `ray` within `[ray.mint, ray.maxt]`.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been built.
    pub fn ray_test(&self, ray: &Ray) -> bool {
        self.ray_test_with(ray, StackDiscipline::default())
    }

    /// Occlusion test using a specific traversal discipline.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been built.
    pub fn ray_test_with(&self, ray: &Ray, discipline: StackDiscipline) -> bool {
        self.view().trace(ray, discipline, QueryKind::Any).occluded
    }

    /// Closest hit with full surface attributes.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been built.
    pub fn ray_intersect(&self, ray: &Ray) -> Option<SurfaceInteraction> {
        let hit = self.ray_intersect_preliminary(ray);
        self.surface_interaction(ray, &hit)
    }

    /// Expand a preliminary hit into a full surface interaction.
    pub fn surface_interaction(&self, ray: &Ray, hit: &PreliminaryIntersection) -> Option<SurfaceInteraction> {
        if !hit.is_valid() {
            return None;
        }
        let shape = self.shapes.get(hit.shape_index as usize)?;
        let prim_hit = crate::shape::PrimitiveHit {
            t: hit.t,
            uv: hit.prim_uv,
        };
        let mut si = shape.surface_interaction(hit.prim_index, ray, &prim_hit);
        si.shape_index = hit.shape_index;
        si.prim_index = hit.prim_index;
        Some(si)
    }

    /// Closest hits for a packet of rays.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been built.
    pub fn ray_intersect_packet(
        &self,
        packet: &RayPacket,
        discipline: StackDiscipline,
    ) -> [PreliminaryIntersection; PACKET_WIDTH] {
        self.view().trace_packet(packet, discipline, QueryKind::Closest).hits
    }

    /// Occlusion tests for a packet of rays.
    ///
    /// # Panics
    ///
    /// Panics if the tree has not been built.
    pub fn ray_test_packet(&self, packet: &RayPacket, discipline: StackDiscipline) -> [bool; PACKET_WIDTH] {
        let occluded = self.view().trace_packet(packet, discipline, QueryKind::Any).occluded;
        let bits = occluded.bitmask();
        std::array::from_fn(|lane| (bits >> lane) & 1 != 0)
    }
}

impl Default for KdTree {
    fn default() -> Self {
        Self::new(KdTreeConfig::default())
    }
}

impl std::fmt::Debug for KdTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdTree")
            .field("shapes", &self.shapes.len())
            .field("primitives", &self.map.primitive_count())
            .field("nodes", &self.nodes.len())
            .field("built", &self.is_built())
            .finish()
    }
}
