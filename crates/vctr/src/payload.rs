//! Serde model of the JSON body.

use serde::{Deserialize, Serialize};

use crate::error::{VctrError, VctrResult};

/// A geographic position: longitude/latitude in degrees, height in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    /// WGS-84 earth-centred, earth-fixed position in metres.
    pub fn to_ecef(self) -> [f64; 3] {
        crate::geodetic_to_ecef(self.latitude, self.longitude, self.height)
    }
}

impl TryFrom<Vec<f64>> for Cartographic {
    type Error = String;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        match v.as_slice() {
            [lon, lat] => Ok(Self::new(*lon, *lat, 0.0)),
            [lon, lat, h] => Ok(Self::new(*lon, *lat, *h)),
            other => Err(format!(
                "position must have 2 or 3 components, got {}",
                other.len()
            )),
        }
    }
}

impl From<Cartographic> for Vec<f64> {
    fn from(c: Cartographic) -> Self {
        vec![c.longitude, c.latitude, c.height]
    }
}

/// Mesh produced ahead of time by the tile generator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrecreatedGeometry {
    /// Flat ECEF xyz triples in metres.
    pub positions: Vec<f64>,
    /// Triangle list; empty means non-indexed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<u32>,
}

impl PrecreatedGeometry {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    fn check(&self) -> Result<(), String> {
        if self.positions.len() % 3 != 0 {
            return Err(format!(
                "geometry has {} position components, not a multiple of 3",
                self.positions.len()
            ));
        }

        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "geometry has {} indices, not a whole number of triangles",
                self.indices.len()
            ));
        }

        let vertices = self.vertex_count();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertices) {
            return Err(format!(
                "geometry index {bad} out of range for {vertices} vertices"
            ));
        }

        Ok(())
    }
}

/// One entry of the `polygons` array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<Cartographic>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<PrecreatedGeometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_height: Option<f64>,
}

/// What a polygon is built from. A pre-created mesh wins over the ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolygonSource<'a> {
    Geometry(&'a PrecreatedGeometry),
    Ring(&'a [Cartographic]),
}

impl PolygonRecord {
    pub fn source(&self) -> Option<PolygonSource<'_>> {
        match (&self.geometry, &self.positions) {
            (Some(g), _) => Some(PolygonSource::Geometry(g)),
            (None, Some(ring)) => Some(PolygonSource::Ring(ring)),
            (None, None) => None,
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.source().is_none() {
            return Err("neither positions nor geometry present".into());
        }

        if let Some(ring) = &self.positions {
            if ring.len() < 3 {
                return Err(format!("ring has {} positions, need at least 3", ring.len()));
            }
        }

        if let Some(geometry) = &self.geometry {
            geometry.check()?;
        }

        if let (Some(min), Some(max)) = (self.minimum_height, self.maximum_height) {
            if min > max {
                return Err(format!("minimumHeight {min} exceeds maximumHeight {max}"));
            }
        }

        Ok(())
    }
}

/// One entry of the optional `labels` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub text: String,
    pub position: Cartographic,
}

/// Root object of the JSON body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VectorTilePayload {
    pub polygons: Vec<PolygonRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelRecord>,
}

impl VectorTilePayload {
    /// Checks the polygon constraints serde cannot express. Labels are
    /// left to [`validate_labels`](Self::validate_labels).
    pub fn validate(&self) -> VctrResult<()> {
        for (index, polygon) in self.polygons.iter().enumerate() {
            polygon
                .check()
                .map_err(|reason| VctrError::InvalidPolygon { index, reason })?;
        }

        Ok(())
    }

    pub fn validate_labels(&self) -> VctrResult<()> {
        for (index, label) in self.labels.iter().enumerate() {
            if label.text.is_empty() {
                return Err(VctrError::InvalidLabel {
                    index,
                    reason: "empty text".into(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> VctrResult<VectorTilePayload> {
        let payload: VectorTilePayload = serde_json::from_str(json)?;
        payload.validate()?;
        Ok(payload)
    }

    #[test]
    fn two_component_positions_default_height_to_zero() {
        let p = parse(r#"{"polygons":[{"positions":[[1,2],[3,4,5],[6,7]]}]}"#).unwrap();
        let ring = p.polygons[0].positions.as_ref().unwrap();
        assert_eq!(ring[0], Cartographic::new(1.0, 2.0, 0.0));
        assert_eq!(ring[1], Cartographic::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn position_with_one_component_is_rejected() {
        let err = parse(r#"{"polygons":[{"positions":[[1],[3,4],[6,7]]}]}"#).unwrap_err();
        assert!(matches!(err, VctrError::Json(_)));
    }

    #[test]
    fn missing_polygons_array_is_rejected() {
        assert!(matches!(parse(r#"{"labels":[]}"#), Err(VctrError::Json(_))));
    }

    #[test]
    fn polygon_without_source_is_rejected() {
        let err = parse(r#"{"polygons":[{"minimumHeight":1}]}"#).unwrap_err();
        assert!(matches!(err, VctrError::InvalidPolygon { index: 0, .. }));
    }

    #[test]
    fn short_ring_is_rejected() {
        let err = parse(r#"{"polygons":[{"positions":[[0,0],[1,1]]}]}"#).unwrap_err();
        assert!(matches!(err, VctrError::InvalidPolygon { index: 0, .. }));
    }

    #[test]
    fn inverted_heights_are_rejected() {
        let err = parse(
            r#"{"polygons":[{"positions":[[0,0],[1,0],[1,1]]},
                {"positions":[[0,0],[1,0],[1,1]],"minimumHeight":9,"maximumHeight":3}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, VctrError::InvalidPolygon { index: 1, .. }));
    }

    #[test]
    fn bounds_from_different_polygons_are_not_compared() {
        let p = parse(
            r#"{"polygons":[{"positions":[[0,0],[1,0],[1,1]],"minimumHeight":50},
                {"positions":[[0,0],[1,0],[1,1]],"maximumHeight":10}]}"#,
        )
        .unwrap();
        assert_eq!(p.polygons.len(), 2);
    }

    #[test]
    fn geometry_is_preferred_over_ring() {
        let p = parse(
            r#"{"polygons":[{"positions":[[0,0],[1,0],[1,1]],
                "geometry":{"positions":[0,0,0, 1,0,0, 0,1,0],"indices":[0,1,2]}}]}"#,
        )
        .unwrap();
        assert!(matches!(p.polygons[0].source(), Some(PolygonSource::Geometry(g)) if g.vertex_count() == 3));
    }

    #[test]
    fn geometry_index_out_of_range_is_rejected() {
        let err = parse(r#"{"polygons":[{"geometry":{"positions":[0,0,0, 1,0,0, 0,1,0],"indices":[0,1,3]}}]}"#)
            .unwrap_err();
        assert!(matches!(err, VctrError::InvalidPolygon { .. }));
    }

    #[test]
    fn ragged_geometry_positions_are_rejected() {
        let err = parse(r#"{"polygons":[{"geometry":{"positions":[0,0,0,1]}}]}"#).unwrap_err();
        assert!(matches!(err, VctrError::InvalidPolygon { .. }));
    }

    #[test]
    fn labels_are_optional_and_parsed() {
        let p = parse(r#"{"polygons":[],"labels":[{"text":"Berlin","position":[13.4,52.52]}]}"#).unwrap();
        assert_eq!(p.labels.len(), 1);
        assert_eq!(p.labels[0].position.height, 0.0);
    }

    #[test]
    fn empty_label_text_only_fails_label_validation() {
        let p = parse(r#"{"polygons":[],"labels":[{"text":"ok","position":[0,0]},{"text":"","position":[0,0]}]}"#)
            .unwrap();
        let err = p.validate_labels().unwrap_err();
        assert!(matches!(err, VctrError::InvalidLabel { index: 1, .. }));
    }
}
