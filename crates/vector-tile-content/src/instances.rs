//! Polygon records to geometry instances.

use vctr::{PolygonRecord, PolygonSource};

use crate::color::{Color, ColorAttribute};
use crate::primitive::{Geometry, GeometryInstance};

/// Width of outline polylines, in pixels.
pub const OUTLINE_WIDTH: f32 = 1.0;

/// Aggregated height bounds of a tile. `None` means no polygon supplied that
/// bound and the primitive should use its default extrusion. The two bounds
/// are aggregated independently and are not reordered.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeightRange {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// Running min/max seeded at +inf/-inf so "no bound seen" stays distinguishable from zero.
#[derive(Debug, Clone, Copy)]
struct HeightAccumulator {
    min: f64,
    max: f64,
}

impl HeightAccumulator {
    fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn include(&mut self, minimum: Option<f64>, maximum: Option<f64>) {
        if let Some(h) = minimum {
            self.min = self.min.min(h);
        }
        if let Some(h) = maximum {
            self.max = self.max.max(h);
        }
    }

    fn finish(self) -> HeightRange {
        HeightRange {
            minimum: (self.min != f64::INFINITY).then_some(self.min),
            maximum: (self.max != f64::NEG_INFINITY).then_some(self.max),
        }
    }
}

/// Output of [`build_instances`], handed as a whole to primitive construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltGeometry {
    /// One instance per polygon, input order.
    pub fill: Vec<GeometryInstance>,
    /// One polyline per polygon ring; empty unless outlines were requested.
    pub outlines: Vec<GeometryInstance>,
    pub heights: HeightRange,
    pub color: Color,
    /// Every fill instance came pre-tessellated.
    pub precreated: bool,
}

/// Builds the fill instances (all sharing `color`) and, when `outline` is set,
/// a red outline per ring.
pub fn build_instances(polygons: &[PolygonRecord], color: Color, outline: bool) -> BuiltGeometry {
    let fill_attr = ColorAttribute::from(color);
    let outline_attr = ColorAttribute::from(Color::RED);

    let mut fill = Vec::with_capacity(polygons.len());
    let mut outlines = Vec::new();
    let mut heights = HeightAccumulator::new();
    let mut precreated = true;

    for polygon in polygons {
        heights.include(polygon.minimum_height, polygon.maximum_height);

        if outline {
            if let Some(ring) = &polygon.positions {
                outlines.push(GeometryInstance {
                    geometry: Geometry::Polyline {
                        positions: ring.clone(),
                        width: OUTLINE_WIDTH,
                    },
                    color: outline_attr,
                });
            }
        }

        // Validated payloads always carry one of the two.
        let geometry = match polygon.source() {
            Some(PolygonSource::Geometry(mesh)) => Geometry::Precreated(mesh.clone()),
            Some(PolygonSource::Ring(ring)) => {
                precreated = false;
                Geometry::Polygon { ring: ring.to_vec() }
            }
            None => continue,
        };

        fill.push(GeometryInstance {
            geometry,
            color: fill_attr,
        });
    }

    BuiltGeometry {
        fill,
        outlines,
        heights: heights.finish(),
        color,
        precreated,
    }
}
