//! Geometry wire model.
//!
//! Geometries travel as maps shaped like the feature service's JSON
//! geometry objects (`{x, y}`, `{points}`, `{paths}`, `{rings}`,
//! `{xmin, ymin, xmax, ymax}`), each with an optional
//! `spatialReference: {wkid}`. The same shapes serialize to the canonical
//! JSON string reported as `geometryJson`.

use serde::{Deserialize, Serialize};

/// Spatial reference identified by its well-known id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

/// Single coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spatial_reference: Option<SpatialReference>,
}

/// Unordered set of coordinates; each coordinate is `[x, y]` or `[x, y, z]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Multipoint {
    pub points: Vec<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spatial_reference: Option<SpatialReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polyline {
    pub paths: Vec<Vec<Vec<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spatial_reference: Option<SpatialReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    pub rings: Vec<Vec<Vec<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spatial_reference: Option<SpatialReference>,
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spatial_reference: Option<SpatialReference>,
}

impl Envelope {
    #[must_use]
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            spatial_reference: None,
        }
    }

    /// Center of the rectangle as `(x, y)`.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// Closed-interval overlap test; touching edges intersect.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    /// Whether `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.xmin <= other.xmin
            && self.ymin <= other.ymin
            && other.xmax <= self.xmax
            && other.ymax <= self.ymax
    }
}

/// Any supported geometry.
///
/// Untagged: the variant is identified by which coordinate keys are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Geometry {
    Point(Point),
    Multipoint(Multipoint),
    Polyline(Polyline),
    Polygon(Polygon),
    Envelope(Envelope),
}

/// Failure to convert a geometry to or from its wire form.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("unrecognized geometry shape: {0}")]
    Decode(#[from] rmpv::ext::Error),
    #[error("geometry json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Geometry {
    /// Decode a geometry from its wire map.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Decode` if the value matches none of the
    /// supported shapes.
    pub fn from_wire(value: &rmpv::Value) -> Result<Self, GeometryError> {
        Ok(rmpv::ext::from_value(value.clone())?)
    }

    /// Encode the geometry into its wire map.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Decode` if serialization into the wire value
    /// model fails.
    pub fn to_wire(&self) -> Result<rmpv::Value, GeometryError> {
        Ok(rmpv::ext::to_value(self)?)
    }

    /// Canonical JSON serialization.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Json` if a coordinate is not representable in
    /// JSON.
    pub fn to_json(&self) -> Result<String, GeometryError> {
        Ok(serde_json::to_string(self)?)
    }

    #[must_use]
    pub fn spatial_reference(&self) -> Option<SpatialReference> {
        match self {
            Self::Point(g) => g.spatial_reference,
            Self::Multipoint(g) => g.spatial_reference,
            Self::Polyline(g) => g.spatial_reference,
            Self::Polygon(g) => g.spatial_reference,
            Self::Envelope(g) => g.spatial_reference,
        }
    }

    /// Bounding envelope. `None` for geometries without coordinates.
    #[must_use]
    pub fn extent(&self) -> Option<Envelope> {
        let mut bounds: Option<Envelope> = None;
        let mut include = |x: f64, y: f64| {
            let b = bounds.get_or_insert_with(|| Envelope::new(x, y, x, y));
            b.xmin = b.xmin.min(x);
            b.ymin = b.ymin.min(y);
            b.xmax = b.xmax.max(x);
            b.ymax = b.ymax.max(y);
        };
        match self {
            Self::Point(p) => include(p.x, p.y),
            Self::Multipoint(m) => each_coord(&m.points, &mut include),
            Self::Polyline(l) => l.paths.iter().for_each(|p| each_coord(p, &mut include)),
            Self::Polygon(g) => g.rings.iter().for_each(|r| each_coord(r, &mut include)),
            Self::Envelope(e) => {
                include(e.xmin, e.ymin);
                include(e.xmax, e.ymax);
            }
        }
        bounds.map(|mut b| {
            b.spatial_reference = self.spatial_reference();
            b
        })
    }
}

/// Feed every well-formed `[x, y, ..]` coordinate to `f`; shorter arrays are skipped.
fn each_coord(coords: &[Vec<f64>], f: &mut impl FnMut(f64, f64)) {
    for c in coords {
        if let [x, y, ..] = c.as_slice() {
            f(*x, *y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(pairs: Vec<(&str, rmpv::Value)>) -> rmpv::Value {
        rmpv::Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (rmpv::Value::from(k), v))
                .collect(),
        )
    }

    #[test]
    fn decodes_point_with_integer_coordinates() {
        let value = wire(vec![
            ("x", rmpv::Value::from(10)),
            ("y", rmpv::Value::F64(20.5)),
            (
                "spatialReference",
                wire(vec![("wkid", rmpv::Value::from(4326))]),
            ),
        ]);
        let geometry = Geometry::from_wire(&value).unwrap();
        assert_eq!(
            geometry,
            Geometry::Point(Point {
                x: 10.0,
                y: 20.5,
                z: None,
                spatial_reference: Some(SpatialReference { wkid: 4326 }),
            })
        );
    }

    #[test]
    fn decodes_envelope_and_polygon() {
        let env = wire(vec![
            ("xmin", rmpv::Value::from(0)),
            ("ymin", rmpv::Value::from(0)),
            ("xmax", rmpv::Value::from(4)),
            ("ymax", rmpv::Value::from(2)),
        ]);
        assert!(matches!(
            Geometry::from_wire(&env).unwrap(),
            Geometry::Envelope(_)
        ));

        let ring = rmpv::Value::Array(vec![
            rmpv::Value::Array(vec![0.into(), 0.into()]),
            rmpv::Value::Array(vec![2.into(), 0.into()]),
            rmpv::Value::Array(vec![2.into(), 2.into()]),
            rmpv::Value::Array(vec![0.into(), 0.into()]),
        ]);
        let polygon = wire(vec![("rings", rmpv::Value::Array(vec![ring]))]);
        let g = Geometry::from_wire(&polygon).unwrap();
        assert_eq!(g.extent(), Some(Envelope::new(0.0, 0.0, 2.0, 2.0)));
    }

    #[test]
    fn rejects_unknown_shape() {
        let value = wire(vec![("lat", rmpv::Value::from(1))]);
        assert!(Geometry::from_wire(&value).is_err());
    }

    #[test]
    fn json_omits_absent_spatial_reference() {
        let g = Geometry::Point(Point {
            x: 1.0,
            y: 2.0,
            z: None,
            spatial_reference: None,
        });
        assert_eq!(g.to_json().unwrap(), r#"{"x":1.0,"y":2.0}"#);
    }

    #[test]
    fn empty_polyline_has_no_extent() {
        let g = Geometry::Polyline(Polyline {
            paths: vec![],
            spatial_reference: None,
        });
        assert!(g.extent().is_none());
    }

    #[test]
    fn envelope_center_and_relations() {
        let outer = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let inner = Envelope::new(2.0, 2.0, 4.0, 6.0);
        let apart = Envelope::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(inner.center(), (3.0, 4.0));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.intersects(&inner));
        assert!(!outer.intersects(&apart));
    }
}
