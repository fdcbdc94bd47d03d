use gdal::DriverManager;
use gdal::raster::{Buffer, ColorInterpretation};
use ndarray::Array2;
use std::path::Path;

use crate::io::gdal::GdalError;

/// Write `bands` (all `rows x cols`) as a u8 GeoTIFF carrying the given georeferencing.
pub fn write_tiff_bands_u8(
    output: &Path,
    cols: usize,
    rows: usize,
    bands: &[Array2<u8>],
    geotransform: &[f64; 6],
    projection: &str,
) -> Result<(), GdalError> {
    if bands.is_empty() {
        return Err(GdalError::UnsupportedFormat("No bands to write".into()));
    }
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<u8, _>(output, cols, rows, bands.len())?;
    ds.set_geo_transform(geotransform)?;
    if !projection.is_empty() {
        ds.set_projection(projection)?;
    }

    for (i, data) in bands.iter().enumerate() {
        if data.dim() != (rows, cols) {
            let (r, c) = data.dim();
            return Err(GdalError::DimensionMismatch(cols, rows, c, r));
        }
        let mut handle = ds.rasterband(i + 1)?;
        handle.set_color_interpretation(ColorInterpretation::GrayIndex)?;
        let mut buf = Buffer::new((cols, rows), data.iter().copied().collect());
        handle.write((0, 0), (cols, rows), &mut buf)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::gdal::ChipReader;

    const GT: [f64; 6] = [500_000.0, 10.0, 0.0, 7_000_000.0, 0.0, -10.0];

    #[test]
    fn bands_and_georeferencing_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.tif");
        let bands = vec![Array2::from_elem((3, 5), 1u8), Array2::from_elem((3, 5), 2u8)];
        write_tiff_bands_u8(&path, 5, 3, &bands, &GT, "").unwrap();

        let reader = ChipReader::open(&path).unwrap();
        assert_eq!(reader.metadata.bands, 2);
        assert_eq!((reader.metadata.size_x, reader.metadata.size_y), (5, 3));
        assert_eq!(reader.metadata.geotransform, GT);
        assert_eq!(reader.read_band_u8(2).unwrap(), bands[1]);
    }

    #[test]
    fn mismatched_band_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bands = vec![Array2::from_elem((3, 5), 1u8), Array2::from_elem((4, 5), 1u8)];
        assert!(matches!(
            write_tiff_bands_u8(&dir.path().join("bad.tif"), 5, 3, &bands, &GT, ""),
            Err(GdalError::DimensionMismatch(5, 3, 5, 4))
        ));
    }

    #[test]
    fn no_bands_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_tiff_bands_u8(&dir.path().join("none.tif"), 1, 1, &[], &GT, "").is_err());
    }
}
