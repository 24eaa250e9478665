//! Pinhole camera for primary ray generation.

use lumen_accel::{RayPacket, PACKET_WIDTH};
use lumen_math::{Aabb, Ray, Vec3};

/// Camera generating one ray through the center of each pixel.
#[derive(Clone, Debug)]
pub struct Camera {
    // Image settings
    pub image_width: u32,
    pub image_height: u32,

    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view in degrees
    vfov: f32,

    // Cached computed values (set by initialize())
    center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            image_width: 640,
            image_height: 360,
            look_from: Vec3::new(0.0, 0.0, 0.0),
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::new(0.0, 1.0, 0.0),
            vfov: 45.0,
            center: Vec3::ZERO,
            pixel00_loc: Vec3::ZERO,
            pixel_delta_u: Vec3::ZERO,
            pixel_delta_v: Vec3::ZERO,
        }
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width.max(1);
        self.image_height = height.max(1);
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set vertical field of view in degrees.
    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov;
        self
    }

    /// Place the camera so the whole of `bbox` is in view, looking at its
    /// center from above and in front.
    pub fn framing(self, bbox: &Aabb) -> Self {
        if !bbox.is_valid() {
            return self;
        }
        let target = bbox.centroid();
        let radius = (bbox.extents().length() * 0.5).max(1e-3);
        let distance = radius / (self.vfov.to_radians() * 0.5).sin();
        let offset = Vec3::new(0.6, 0.45, 1.0).normalize() * distance;
        self.with_position(target + offset, target, Vec3::Y)
    }

    /// Initialize the camera (must be called before generating rays).
    pub fn initialize(&mut self) {
        self.center = self.look_from;

        let focal_length = (self.look_from - self.look_at).length();
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * focal_length;
        let viewport_width = viewport_height * (self.image_width as f32 / self.image_height as f32);

        // Camera basis
        let w = (self.look_from - self.look_at).normalize();
        let u = self.vup.cross(w).normalize();
        let v = w.cross(u);

        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;

        self.pixel_delta_u = viewport_u / self.image_width as f32;
        self.pixel_delta_v = viewport_v / self.image_height as f32;

        let viewport_upper_left = self.center - focal_length * w - viewport_u / 2.0 - viewport_v / 2.0;
        self.pixel00_loc = viewport_upper_left + 0.5 * (self.pixel_delta_u + self.pixel_delta_v);
    }

    /// Ray through the center of pixel (i, j).
    pub fn get_ray(&self, i: u32, j: u32) -> Ray {
        let pixel = self.pixel00_loc + i as f32 * self.pixel_delta_u + j as f32 * self.pixel_delta_v;
        Ray::new(self.center, (pixel - self.center).normalize(), 0.0)
    }

    /// Packet for the 2x2 pixel quad with top-left corner (i, j).
    ///
    /// Lanes are ordered (i, j), (i+1, j), (i, j+1), (i+1, j+1). Pixels past
    /// the image edge are clamped onto the last row or column.
    pub fn get_packet(&self, i: u32, j: u32) -> RayPacket {
        let max_i = self.image_width - 1;
        let max_j = self.image_height - 1;
        let mut directions = [Vec3::ZERO; PACKET_WIDTH];
        for (lane, direction) in directions.iter_mut().enumerate() {
            let x = (i + lane as u32 % 2).min(max_i);
            let y = (j + lane as u32 / 2).min(max_j);
            *direction = self.get_ray(x, y).direction();
        }
        RayPacket::from_origin(self.center, directions, 0.0, f32::INFINITY)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
