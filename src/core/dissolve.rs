//! Two-level dissolve of a large polygon dataset.
//!
//! Features are streamed into fixed-size groups; every group is repaired and
//! unioned on the compute pool, then the (much smaller) set of group unions is
//! unioned once more and exploded into single polygons with fresh sequential ids.
use geo::MultiPolygon;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::chunk::{Grouper, group_count};
use crate::core::geometry::{Shape, union_all};
use crate::core::params::DissolveParams;
use crate::core::parallel::WorkerPool;
use crate::error::Result;
use crate::io::vector::{VectorSink, VectorSource};

/// Output CRS and driver, settled before any worker starts.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub crs: Option<String>,
    pub driver: String,
}

/// Union of one group plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct GroupUnion {
    pub union: MultiPolygon<f64>,
    pub shapes: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DissolveReport {
    pub features_read: usize,
    /// Source features without usable polygonal geometry.
    pub skipped: usize,
    pub groups: usize,
    /// Shapes discarded because repair could not make them valid.
    pub dropped: usize,
    pub polygons_written: usize,
}

/// Repair and union one group. Padding slots are ignored.
pub fn dissolve_group(group: Vec<Option<Shape>>) -> GroupUnion {
    let shapes: Vec<Shape> = group.into_iter().flatten().collect();
    let total = shapes.len();
    let repaired: Vec<MultiPolygon<f64>> = shapes.into_iter().filter_map(Shape::repair).collect();
    let dropped = total - repaired.len();
    if dropped > 0 {
        debug!("Dropped {} of {} shapes that could not be repaired", dropped, total);
    }
    GroupUnion {
        union: union_all(&repaired),
        shapes: total,
        dropped,
    }
}

/// Dissolve every polygon of `source` and write the result through the sink
/// built by `create_sink`.
pub fn dissolve<S, K, C>(
    source: &mut S,
    pool: &WorkerPool,
    params: &DissolveParams,
    create_sink: C,
) -> Result<DissolveReport>
where
    S: VectorSource,
    K: VectorSink,
    C: FnOnce(&OutputSpec) -> Result<K>,
{
    params.validate()?;
    let source_info = source.info()?;
    let spec = OutputSpec {
        crs: source_info.crs.clone(),
        driver: params
            .driver
            .clone()
            .unwrap_or_else(|| source_info.driver.clone()),
    };
    let total_groups = group_count(source_info.feature_count, params.group_size);
    info!(
        "Total features: {}, total groups (of size {}): {}",
        source_info.feature_count, params.group_size, total_groups
    );

    let (results, skipped) = source.with_shapes(|shapes| -> Result<_> {
        let groups = Grouper::new(shapes, params.group_size)?;
        Ok(pool.map_stream(groups, Some(total_groups), "dissolve groups", |_, group| {
            Ok(dissolve_group(group))
        }))
    })?;
    let groups = results?.into_all()?;

    let mut report = DissolveReport {
        features_read: groups.iter().map(|g| g.shapes).sum(),
        skipped,
        groups: groups.len(),
        dropped: groups.iter().map(|g| g.dropped).sum(),
        polygons_written: 0,
    };

    info!("Dissolve {} group unions", groups.len());
    let dissolved = union_all(groups.iter().map(|g| &g.union));

    info!("Write output ({} polygons)", dissolved.0.len());
    let mut sink = create_sink(&spec)?;
    for (id, polygon) in dissolved.0.iter().enumerate() {
        sink.write_polygon(id as i64, polygon)?;
        report.polygons_written += 1;
    }
    sink.finish()?;

    info!(
        "Dissolved {} features ({} dropped, {} without polygons) into {} polygons",
        report.features_read, report.dropped, report.skipped, report.polygons_written
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::tests::square;
    use geo::{LineString, Polygon};

    #[test]
    fn group_padding_is_ignored() {
        let group = vec![
            Some(Shape::Polygon(square(0.0, 0.0, 1.0))),
            None,
            None,
        ];
        let g = dissolve_group(group);
        assert_eq!(g.shapes, 1);
        assert_eq!(g.dropped, 0);
        assert_eq!(g.union.0.len(), 1);
    }

    #[test]
    fn unrepairable_shapes_are_dropped_not_errors() {
        let flat = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 0.0)]),
            vec![],
        );
        let group = vec![
            Some(Shape::Polygon(flat)),
            Some(Shape::Polygon(square(0.0, 0.0, 1.0))),
        ];
        let g = dissolve_group(group);
        assert_eq!(g.shapes, 2);
        assert_eq!(g.dropped, 1);
        assert_eq!(g.union.0.len(), 1);
    }

    #[test]
    fn empty_group_gives_empty_union() {
        let g = dissolve_group(vec![None, None]);
        assert!(g.union.0.is_empty());
        assert_eq!(g.shapes, 0);
    }
}
