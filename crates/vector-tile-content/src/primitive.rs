//! Contract with the renderer's batched geometry primitives.
//!
//! Tessellation, extrusion and GPU upload live on the other side of
//! [`PrimitiveFactory`]; this crate only decides what gets batched and how.

use glam::DVec3;
use vctr::{Cartographic, PrecreatedGeometry};

use crate::color::ColorAttribute;
use crate::types::FrameState;

/// Geometry of one instance, before tessellation.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Polygon ring to be triangulated by the primitive.
    Polygon { ring: Vec<Cartographic> },
    /// Mesh tessellated by the tile generator.
    Precreated(PrecreatedGeometry),
    /// Line strip along a ring.
    Polyline { positions: Vec<Cartographic>, width: f32 },
}

/// One shape plus its per-instance colour.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInstance {
    pub geometry: Geometry,
    pub color: ColorAttribute,
}

/// Per-instance-colour appearance flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appearance {
    pub closed: bool,
    pub translucent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    GroundClamped,
    Extruded,
    Outline,
}

/// Everything a primitive needs at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveDescriptor {
    /// Shadow-volume primitive draped on terrain; `None` heights mean the
    /// primitive picks its default extrusion.
    GroundClamped {
        instances: Vec<GeometryInstance>,
        minimum_height: Option<f64>,
        maximum_height: Option<f64>,
        asynchronous: bool,
        /// Every instance is [`Geometry::Precreated`].
        precreated: bool,
    },
    Extruded {
        instances: Vec<GeometryInstance>,
        appearance: Appearance,
        asynchronous: bool,
    },
    Outline {
        instances: Vec<GeometryInstance>,
        asynchronous: bool,
    },
}

impl PrimitiveDescriptor {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveDescriptor::GroundClamped { .. } => PrimitiveKind::GroundClamped,
            PrimitiveDescriptor::Extruded { .. } => PrimitiveKind::Extruded,
            PrimitiveDescriptor::Outline { .. } => PrimitiveKind::Outline,
        }
    }

    pub fn instances(&self) -> &[GeometryInstance] {
        match self {
            PrimitiveDescriptor::GroundClamped { instances, .. }
            | PrimitiveDescriptor::Extruded { instances, .. }
            | PrimitiveDescriptor::Outline { instances, .. } => instances,
        }
    }
}

/// Text anchored at an ECEF position.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub position: DVec3,
}

/// A GPU-side batch. Released on drop.
pub trait BatchedPrimitive {
    /// Called once per frame; realises GPU resources incrementally.
    fn update(&mut self, frame: &FrameState);

    /// True once the batch can be drawn.
    fn is_ready(&self) -> bool;
}

pub trait PrimitiveFactory {
    fn create(&self, descriptor: PrimitiveDescriptor) -> Box<dyn BatchedPrimitive>;

    fn create_labels(&self, labels: Vec<Label>) -> Box<dyn BatchedPrimitive>;
}
