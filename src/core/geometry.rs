//! Polygonal geometry as it flows through the dissolve engine.
//!
//! `Shape` is the tagged form read from a vector source. Before any union the
//! shape is repaired into a `MultiPolygon`; shapes that cannot be repaired are
//! dropped by the caller.
use geo::{Area, Buffer, Geometry, GeometryCollection, MultiPolygon, Polygon, Validation};

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Shape {
    /// Keep only polygonal geometry. Collections are flattened to their
    /// polygonal members; anything else yields `None`.
    pub fn from_geo(geometry: Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Polygon(p) => Some(Shape::Polygon(p)),
            Geometry::MultiPolygon(mp) => Some(Shape::MultiPolygon(mp)),
            Geometry::GeometryCollection(GeometryCollection(members)) => {
                let polygons: Vec<Polygon<f64>> = members
                    .into_iter()
                    .filter_map(Shape::from_geo)
                    .flat_map(Shape::into_polygons)
                    .collect();
                if polygons.is_empty() {
                    None
                } else {
                    Some(Shape::MultiPolygon(MultiPolygon::new(polygons)))
                }
            }
            _ => None,
        }
    }

    pub fn into_multi_polygon(self) -> MultiPolygon<f64> {
        match self {
            Shape::Polygon(p) => MultiPolygon::new(vec![p]),
            Shape::MultiPolygon(mp) => mp,
        }
    }

    pub fn into_polygons(self) -> Vec<Polygon<f64>> {
        self.into_multi_polygon().0
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Shape::Polygon(p) => p.is_valid(),
            Shape::MultiPolygon(mp) => mp.is_valid(),
        }
    }

    /// Zero-width buffer repair. Valid shapes pass through untouched; invalid
    /// ones are re-buffered. Anything still invalid or without area is dropped.
    pub fn repair(self) -> Option<MultiPolygon<f64>> {
        let mp = if self.is_valid() {
            self.into_multi_polygon()
        } else {
            self.into_multi_polygon().buffer(0.0)
        };
        if mp.0.is_empty() || mp.unsigned_area() <= 0.0 || !mp.is_valid() {
            return None;
        }
        Some(mp)
    }
}

/// Union of a set of repaired shapes. Empty input gives an empty multipolygon.
pub fn union_all<'a, I>(parts: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    let mut parts: Vec<&MultiPolygon<f64>> =
        parts.into_iter().filter(|mp| !mp.0.is_empty()).collect();
    match parts.len() {
        0 => MultiPolygon::new(vec![]),
        1 => parts.remove(0).clone(),
        _ => geo::unary_union(parts),
    }
}
