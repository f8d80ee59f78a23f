//! Types shared with the owning tileset and the renderer.

use glam::DVec3;

/// Sphere enclosing a tile's content, in ECEF metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::new(DVec3::ZERO, 0.0)
    }
}

/// What the content needs from the tile that owns it. All reads, no writes.
pub trait ContentOwner {
    /// Current camera distance, used as the request priority hint.
    fn distance_to_camera(&self) -> f64;

    /// Bounding sphere of the tile's content volume.
    fn content_bounding_sphere(&self) -> BoundingSphere;

    /// Identity of the endpoint that serves this tile, e.g. `"tiles.example.com:443"`.
    fn request_server(&self) -> &str;
}

/// Per-frame state handed down by the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameState {
    pub frame_number: u64,
    /// Seconds since the renderer started.
    pub time: f64,
    pub camera_position: DVec3,
}

impl FrameState {
    pub fn new(frame_number: u64, time: f64, camera_position: DVec3) -> Self {
        Self {
            frame_number,
            time,
            camera_position,
        }
    }
}
