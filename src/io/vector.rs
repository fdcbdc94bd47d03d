//! Vector dataset access behind the traits the dissolve engine consumes.
//!
//! `OgrSource` streams polygonal features from the first layer of any
//! OGR-readable dataset; `OgrSink` writes the fixed output schema
//! `{geometry: Polygon, id: int}`.
use std::path::Path;

use gdal::spatial_ref::SpatialRef;
use gdal::vector::{
    Feature, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType, ToGdal,
};
use gdal::{Dataset, DriverManager};
use geo::Polygon;
use tracing::debug;

use crate::core::geometry::Shape;
use crate::io::gdal::GdalError;

/// Name of the integer identifier column in dissolve output.
pub const ID_FIELD: &str = "id";

/// What a source tells the engine before any worker starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    /// CRS as WKT, if the source has one.
    pub crs: Option<String>,
    /// OGR driver short name, e.g. "GPKG".
    pub driver: String,
    pub feature_count: usize,
}

pub trait VectorSource {
    fn info(&mut self) -> Result<SourceInfo, GdalError>;

    /// Stream the polygonal shapes once, handing the iterator to `f`.
    /// Features without usable polygonal geometry are skipped; their number
    /// is returned next to the value of `f`.
    fn with_shapes<R>(
        &mut self,
        f: impl FnOnce(&mut dyn Iterator<Item = Shape>) -> R,
    ) -> Result<(R, usize), GdalError>;
}

pub trait VectorSink {
    fn write_polygon(&mut self, id: i64, polygon: &Polygon<f64>) -> Result<(), GdalError>;

    /// Flush and close.
    fn finish(self) -> Result<(), GdalError>
    where
        Self: Sized;
}

/// First layer of an OGR dataset, opened read-only.
pub struct OgrSource {
    dataset: Dataset,
}

impl OgrSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        if dataset.layer_count() == 0 {
            return Err(GdalError::UnsupportedFormat(format!(
                "{} has no vector layers",
                path.as_ref().display()
            )));
        }
        Ok(OgrSource { dataset })
    }
}

impl VectorSource for OgrSource {
    fn info(&mut self) -> Result<SourceInfo, GdalError> {
        let layer = self.dataset.layer(0)?;
        let crs = match layer.spatial_ref() {
            Some(srs) => Some(srs.to_wkt()?),
            None => None,
        };
        Ok(SourceInfo {
            crs,
            driver: self.dataset.driver().short_name(),
            feature_count: layer.feature_count() as usize,
        })
    }

    fn with_shapes<R>(
        &mut self,
        f: impl FnOnce(&mut dyn Iterator<Item = Shape>) -> R,
    ) -> Result<(R, usize), GdalError> {
        let mut layer = self.dataset.layer(0)?;
        let mut skipped = 0;
        let value = {
            let mut shapes = layer.features().filter_map(|feature| {
                let shape = match feature.geometry().map(|g| g.to_geo()) {
                    Some(Ok(g)) => Shape::from_geo(g),
                    Some(Err(e)) => {
                        debug!("Skipping feature {:?}: {}", feature.fid(), e);
                        None
                    }
                    None => None,
                };
                if shape.is_none() {
                    skipped += 1;
                }
                shape
            });
            f(&mut shapes)
        };
        if skipped > 0 {
            debug!("Skipped {} features without polygonal geometry", skipped);
        }
        Ok((value, skipped))
    }
}

/// New single-layer dataset with the dissolve output schema.
pub struct OgrSink {
    dataset: Dataset,
    id_index: usize,
}

impl OgrSink {
    pub fn create<P: AsRef<Path>>(
        path: P,
        driver: &str,
        crs: Option<&str>,
    ) -> Result<Self, GdalError> {
        let path = path.as_ref();
        let layer_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dissolved")
            .to_string();
        let srs = match crs {
            Some(wkt) => Some(SpatialRef::from_wkt(wkt)?),
            None => None,
        };
        let driver = DriverManager::get_driver_by_name(driver)?;
        let mut dataset = driver.create_vector_only(path)?;
        let id_index = {
            let layer = dataset.create_layer(LayerOptions {
                name: &layer_name,
                srs: srs.as_ref(),
                ty: OGRwkbGeometryType::wkbPolygon,
                options: None,
            })?;
            layer.create_defn_fields(&[(ID_FIELD, OGRFieldType::OFTInteger64)])?;
            layer.defn().field_index(ID_FIELD)?
        };
        Ok(OgrSink { dataset, id_index })
    }
}

impl VectorSink for OgrSink {
    fn write_polygon(&mut self, id: i64, polygon: &Polygon<f64>) -> Result<(), GdalError> {
        let layer = self.dataset.layer(0)?;
        let mut feature = Feature::new(layer.defn())?;
        feature.set_geometry(polygon.to_gdal()?)?;
        feature.set_field_integer64(self.id_index, id)?;
        feature.create(&layer)?;
        Ok(())
    }

    fn finish(mut self) -> Result<(), GdalError> {
        self.dataset.flush_cache()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdal::vector::Geometry as GdalGeometry;
    use geo::{Area, LineString};

    const UTM_20S: &str = "EPSG:32720";

    fn square(x: f64, y: f64, side: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x, y),
                (x + side, y),
                (x + side, y + side),
                (x, y + side),
                (x, y),
            ]),
            vec![],
        )
    }

    fn utm_wkt() -> String {
        SpatialRef::from_definition(UTM_20S).unwrap().to_wkt().unwrap()
    }

    #[test]
    fn sink_output_reads_back_with_schema_crs_and_driver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dissolved.gpkg");
        let wkt = utm_wkt();

        let mut sink = OgrSink::create(&path, "GPKG", Some(&wkt)).unwrap();
        sink.write_polygon(0, &square(0.0, 0.0, 1.0)).unwrap();
        sink.write_polygon(1, &square(5.0, 5.0, 2.0)).unwrap();
        sink.finish().unwrap();

        let mut source = OgrSource::open(&path).unwrap();
        let info = source.info().unwrap();
        assert_eq!(info.driver, "GPKG");
        assert_eq!(info.feature_count, 2);
        assert!(info.crs.unwrap().contains("32720"));

        let (areas, skipped) = source
            .with_shapes(|shapes| {
                shapes
                    .map(|s| s.into_multi_polygon().unsigned_area())
                    .collect::<Vec<f64>>()
            })
            .unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(areas.len(), 2);
        assert!((areas.iter().sum::<f64>() - 5.0).abs() < 1e-9);

        let dataset = Dataset::open(&path).unwrap();
        let mut layer = dataset.layer(0).unwrap();
        assert_eq!(layer.name(), "dissolved");
        let id_index = layer.defn().field_index(ID_FIELD).unwrap();
        let mut ids = Vec::new();
        for feature in layer.features() {
            let geometry = feature.geometry().unwrap();
            assert_eq!(geometry.geometry_type(), OGRwkbGeometryType::wkbPolygon);
            ids.push(feature.field_as_integer64(id_index).unwrap().unwrap());
        }
        ids.sort();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn finished_sink_without_polygons_is_a_valid_empty_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gpkg");
        OgrSink::create(&path, "GPKG", None).unwrap().finish().unwrap();

        let mut source = OgrSource::open(&path).unwrap();
        let info = source.info().unwrap();
        assert_eq!(info.feature_count, 0);
        let (count, skipped) = source.with_shapes(|shapes| shapes.count()).unwrap();
        assert_eq!((count, skipped), (0, 0));
    }

    #[test]
    fn non_polygonal_features_are_counted_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.gpkg");
        {
            let driver = DriverManager::get_driver_by_name("GPKG").unwrap();
            let mut dataset = driver.create_vector_only(&path).unwrap();
            let mut layer = dataset
                .create_layer(LayerOptions {
                    name: "mixed",
                    srs: None,
                    ty: OGRwkbGeometryType::wkbUnknown,
                    options: None,
                })
                .unwrap();
            for wkt in [
                "POINT (1 1)",
                "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))",
                "LINESTRING (0 0, 3 3)",
            ] {
                layer
                    .create_feature(GdalGeometry::from_wkt(wkt).unwrap())
                    .unwrap();
            }
        }

        let mut source = OgrSource::open(&path).unwrap();
        let (count, skipped) = source.with_shapes(|shapes| shapes.count()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(OgrSource::open(dir.path().join("missing.gpkg")).is_err());
    }

    #[test]
    fn unknown_driver_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(OgrSink::create(dir.path().join("out.xyz"), "NoSuchDriver", None).is_err());
    }
}
