use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result};

/// Resample a u8 band to `target_cols x target_rows` (bilinear).
pub fn resize_band_u8(
    band: &Array2<u8>,
    target_cols: usize,
    target_rows: usize,
) -> Result<Array2<u8>> {
    let (original_rows, original_cols) = band.dim();
    if target_cols == 0 || target_rows == 0 || original_cols == 0 || original_rows == 0 {
        return Err(Error::Processing(format!(
            "Cannot resize {}x{} band to {}x{}",
            original_cols, original_rows, target_cols, target_rows
        )));
    }
    if (original_cols, original_rows) == (target_cols, target_rows) {
        return Ok(band.clone());
    }
    debug!(
        "Resizing band {}x{} -> {}x{}",
        original_cols, original_rows, target_cols, target_rows
    );

    let resize_options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    let mut resizer = Resizer::new();

    let src_image = Image::from_vec_u8(
        original_cols as u32,
        original_rows as u32,
        band.iter().copied().collect(),
        PixelType::U8,
    )
    .map_err(Error::external)?;
    let mut dst_image = Image::new(target_cols as u32, target_rows as u32, PixelType::U8);
    resizer
        .resize(&src_image, &mut dst_image, &resize_options)
        .map_err(Error::external)?;

    Array2::from_shape_vec((target_rows, target_cols), dst_image.into_vec())
        .map_err(Error::external)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_size_is_a_copy() {
        let band = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as u8);
        assert_eq!(resize_band_u8(&band, 4, 3).unwrap(), band);
    }

    #[test]
    fn constant_band_stays_constant() {
        let band = Array2::from_elem((10, 7), 42u8);
        let out = resize_band_u8(&band, 32, 25).unwrap();
        assert_eq!(out.dim(), (25, 32));
        assert!(out.iter().all(|&v| v == 42));
    }

    #[test]
    fn zero_target_is_rejected() {
        let band = Array2::from_elem((2, 2), 1u8);
        assert!(resize_band_u8(&band, 0, 2).is_err());
    }
}
