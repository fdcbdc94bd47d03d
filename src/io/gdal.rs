use gdal::{Dataset, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

/// Errors encountered when using GDAL reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
}

/// Metadata of a raster chip
#[derive(Debug, Clone)]
pub struct ChipMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection in WKT format
    pub projection: String,
}

/// Georeferenced footprint of a raster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Pixel window inside a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x_off: usize,
    pub y_off: usize,
    pub width: usize,
    pub height: usize,
}

impl ChipMetadata {
    /// Footprint from the (north-up) geotransform.
    pub fn bounds(&self) -> Bounds {
        let gt = &self.geotransform;
        let x0 = gt[0];
        let x1 = gt[0] + gt[1] * self.size_x as f64;
        let y0 = gt[3];
        let y1 = gt[3] + gt[5] * self.size_y as f64;
        Bounds {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// Pixel window covering the part of `bounds` that falls inside this raster,
    /// or `None` when they do not overlap.
    pub fn clip_window(&self, bounds: &Bounds) -> Option<PixelWindow> {
        let gt = &self.geotransform;
        if gt[1] == 0.0 || gt[5] == 0.0 {
            return None;
        }
        let col_a = (bounds.min_x - gt[0]) / gt[1];
        let col_b = (bounds.max_x - gt[0]) / gt[1];
        let row_a = (bounds.max_y - gt[3]) / gt[5];
        let row_b = (bounds.min_y - gt[3]) / gt[5];

        let clamp = |v: f64, hi: usize| v.max(0.0).min(hi as f64);
        let col_start = clamp(col_a.min(col_b).floor(), self.size_x);
        let col_end = clamp(col_a.max(col_b).ceil(), self.size_x);
        let row_start = clamp(row_a.min(row_b).floor(), self.size_y);
        let row_end = clamp(row_a.max(row_b).ceil(), self.size_y);

        if col_end <= col_start || row_end <= row_start {
            return None;
        }
        Some(PixelWindow {
            x_off: col_start as usize,
            y_off: row_start as usize,
            width: (col_end - col_start) as usize,
            height: (row_end - row_start) as usize,
        })
    }
}

/// Reader for raster chips and reference rasters via GDAL
pub struct ChipReader {
    pub dataset: Dataset,
    pub metadata: ChipMetadata,
}

impl ChipReader {
    /// Open a GDAL-supported raster (GeoTIFF chips, reference bands)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let projection = dataset.projection();
        Ok(ChipReader {
            dataset,
            metadata: ChipMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
            },
        })
    }

    fn check_band(&self, index: usize) -> Result<(), GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        Ok(())
    }

    /// Read a window of a band (1-based index) as u8, shape (height, width)
    pub fn read_window_u8(&self, index: usize, window: PixelWindow) -> Result<Array2<u8>, GdalError> {
        self.check_band(index)?;
        let band = self.dataset.rasterband(index)?;
        let size = (window.width, window.height);
        let buf = band.read_as::<u8>(
            (window.x_off as isize, window.y_off as isize),
            size,
            size,
            None,
        )?;
        let data_vec = buf.data().to_vec();
        Array2::from_shape_vec((window.height, window.width), data_vec).map_err(|_| {
            GdalError::DimensionMismatch(window.width, window.height, window.width, window.height)
        })
    }

    /// Read a whole band (1-based index) as u8
    pub fn read_band_u8(&self, index: usize) -> Result<Array2<u8>, GdalError> {
        self.read_window_u8(
            index,
            PixelWindow {
                x_off: 0,
                y_off: 0,
                width: self.metadata.size_x,
                height: self.metadata.size_y,
            },
        )
    }

    /// Read all bands as u8
    pub fn read_all_bands_u8(&self) -> Result<Vec<Array2<u8>>, GdalError> {
        let mut result = Vec::with_capacity(self.metadata.bands);
        for idx in 1..=self.metadata.bands {
            result.push(self.read_band_u8(idx)?);
        }
        Ok(result)
    }

    /// Maximum pixel value over every band
    pub fn max_value(&self) -> Result<f64, GdalError> {
        let window = (self.metadata.size_x, self.metadata.size_y);
        let mut max = f64::NEG_INFINITY;
        for idx in 1..=self.metadata.bands {
            let band = self.dataset.rasterband(idx)?;
            let buf = band.read_as::<f64>((0, 0), window, window, None)?;
            max = buf.data().iter().copied().fold(max, f64::max);
        }
        Ok(if max.is_finite() { max } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(gt: [f64; 6], size_x: usize, size_y: usize) -> ChipMetadata {
        ChipMetadata {
            size_x,
            size_y,
            bands: 1,
            geotransform: gt,
            projection: String::new(),
        }
    }

    #[test]
    fn bounds_of_north_up_raster() {
        let m = meta([100.0, 10.0, 0.0, 500.0, 0.0, -10.0], 20, 30);
        assert_eq!(
            m.bounds(),
            Bounds {
                min_x: 100.0,
                min_y: 200.0,
                max_x: 300.0,
                max_y: 500.0
            }
        );
    }

    #[test]
    fn clip_window_inside_reference() {
        // Reference: 1000x1000 px of 1 unit, origin (0, 1000).
        let reference = meta([0.0, 1.0, 0.0, 1000.0, 0.0, -1.0], 1000, 1000);
        let chip = Bounds {
            min_x: 100.0,
            min_y: 700.0,
            max_x: 164.0,
            max_y: 764.0,
        };
        assert_eq!(
            reference.clip_window(&chip),
            Some(PixelWindow {
                x_off: 100,
                y_off: 236,
                width: 64,
                height: 64
            })
        );
    }

    #[test]
    fn clip_window_is_clamped_to_reference_extent() {
        let reference = meta([0.0, 2.0, 0.0, 100.0, 0.0, -2.0], 50, 50);
        let chip = Bounds {
            min_x: -20.0,
            min_y: 90.0,
            max_x: 10.0,
            max_y: 120.0,
        };
        let w = reference.clip_window(&chip).unwrap();
        assert_eq!((w.x_off, w.y_off, w.width, w.height), (0, 0, 5, 5));
    }

    #[test]
    fn disjoint_footprints_have_no_window() {
        let reference = meta([0.0, 1.0, 0.0, 100.0, 0.0, -1.0], 100, 100);
        let chip = Bounds {
            min_x: 500.0,
            min_y: 500.0,
            max_x: 600.0,
            max_y: 600.0,
        };
        assert!(reference.clip_window(&chip).is_none());
    }
}
