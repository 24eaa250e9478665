//! Rays gathered for packet traversal.

use glam::Vec4;
use lumen_math::{Ray, Vec3};

use super::lanes::Lanes;

/// Number of rays in a packet.
pub const PACKET_WIDTH: usize = 4;

/// Ray data laid out for lane-parallel traversal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RayLanes<L: Lanes> {
    pub origin: [L; 3],
    pub d_rcp: [L; 3],
    pub mint: L,
    pub maxt: L,
}

impl RayLanes<f32> {
    pub fn from_ray(ray: &Ray) -> Self {
        let o = ray.origin;
        let inv = ray.d_rcp();
        Self {
            origin: [o.x, o.y, o.z],
            d_rcp: [inv.x, inv.y, inv.z],
            mint: ray.mint,
            maxt: ray.maxt,
        }
    }
}

/// Four rays traced together.
///
/// Rays are usually coherent (neighbouring camera pixels, or shadow rays
/// towards one light) but nothing requires it: lanes whose directions fall
/// into different octants are traversed in separate passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPacket {
    pub rays: [Ray; PACKET_WIDTH],
}

impl RayPacket {
    pub fn new(rays: [Ray; PACKET_WIDTH]) -> Self {
        Self { rays }
    }

    /// Packet with the same origin and range for every ray.
    pub fn from_origin(origin: Vec3, directions: [Vec3; PACKET_WIDTH], mint: f32, maxt: f32) -> Self {
        Self {
            rays: directions.map(|d| Ray::segment(origin, d, mint, maxt)),
        }
    }

    /// Direction sign bits of one ray: bit `a` is set when the ray travels
    /// towards negative `a`. Zero components use their sign bit, matching
    /// the sign of the infinite reciprocal.
    #[inline]
    pub fn octant(&self, lane: usize) -> u8 {
        octant(&self.rays[lane])
    }

    pub(crate) fn lanes(&self) -> RayLanes<Vec4> {
        let rays = &self.rays;
        RayLanes {
            origin: [
                gather(rays, |r| r.origin.x),
                gather(rays, |r| r.origin.y),
                gather(rays, |r| r.origin.z),
            ],
            d_rcp: [
                gather(rays, |r| r.d_rcp().x),
                gather(rays, |r| r.d_rcp().y),
                gather(rays, |r| r.d_rcp().z),
            ],
            mint: gather(rays, |r| r.mint),
            maxt: gather(rays, |r| r.maxt),
        }
    }
}

#[inline]
fn gather(rays: &[Ray; PACKET_WIDTH], f: impl Fn(&Ray) -> f32) -> Vec4 {
    Vec4::new(f(&rays[0]), f(&rays[1]), f(&rays[2]), f(&rays[3]))
}

/// Octant index of a single ray; see [`RayPacket::octant`].
#[inline]
pub(crate) fn octant(ray: &Ray) -> u8 {
    let d = ray.d_rcp();
    (d.x.is_sign_negative() as u8) | (d.y.is_sign_negative() as u8) << 1 | (d.z.is_sign_negative() as u8) << 2
}
