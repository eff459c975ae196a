//! Mask Assembly
//!
//! Combines the per-ship RLE strings of one image into a single dense mask.
//! Decoded instances are summed rather than OR-ed, so overlapping ships
//! accumulate above 1; the raw sum backs count-style diagnostics while every
//! training target goes through the boolean view.

use ndarray::{Array2, Array3};

use crate::dataset::records::MaskRecord;
use crate::dataset::rle;
use crate::utils::error::Result;

/// Sum the decoded masks of all non-null RLE strings into one accumulator.
///
/// Null entries contribute zero pixels. A record set with no ships yields an
/// all-zero accumulator.
pub fn sum_masks<S: AsRef<str>>(
    rles: &[Option<S>],
    shape: (usize, usize),
) -> Result<Array2<u16>> {
    let mut acc = Array2::<u16>::zeros(shape);
    for rle in rles.iter().flatten() {
        let decoded = rle::decode(rle.as_ref(), shape)?;
        acc.zip_mut_with(&decoded, |a, &d| *a += d as u16);
    }
    Ok(acc)
}

/// Boolean view of an accumulator: any value above zero is ship.
pub fn binary_view(acc: &Array2<u16>) -> Array2<u8> {
    acc.mapv(|v| u8::from(v > 0))
}

/// Assemble a training target of shape (height, width, 1).
///
/// The trailing channel dimension matches what the batcher expects; values
/// are the boolean view as 0.0/1.0 floats.
pub fn to_target<S: AsRef<str>>(
    rles: &[Option<S>],
    shape: (usize, usize),
) -> Result<Array3<f32>> {
    let acc = sum_masks(rles, shape)?;
    let (h, w) = shape;
    let mut target = Array3::<f32>::zeros((h, w, 1));
    for ((r, c), &v) in acc.indexed_iter() {
        if v > 0 {
            target[[r, c, 0]] = 1.0;
        }
    }
    Ok(target)
}

/// Total ship pixels across one image's RLE strings, nulls counting zero.
pub fn image_pixel_count<S: AsRef<str>>(rles: &[Option<S>]) -> Result<u64> {
    let mut total = 0u64;
    for rle in rles.iter().flatten() {
        total += rle::pixel_count(rle.as_ref())?;
    }
    Ok(total)
}

/// Ship/no-ship pixel totals over a set of mask records.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelDistribution {
    pub num_images: usize,
    pub ship_pixels: u64,
    pub total_pixels: u64,
}

impl PixelDistribution {
    pub fn ship_ratio(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.ship_pixels as f64 / self.total_pixels as f64
        }
    }
}

/// Count ship pixels across all records without decoding full masks.
///
/// `num_images` counts distinct image ids; the pixel total assumes the full
/// grid per image.
pub fn pixel_distribution(records: &[MaskRecord], shape: (usize, usize)) -> Result<PixelDistribution> {
    let mut seen = std::collections::HashSet::new();
    let mut ship_pixels = 0u64;

    for record in records {
        seen.insert(record.image_id.as_str());
        if let Some(rle) = &record.encoded_pixels {
            ship_pixels += rle::pixel_count(rle)?;
        }
    }

    let num_images = seen.len();
    Ok(PixelDistribution {
        num_images,
        ship_pixels,
        total_pixels: (num_images * shape.0 * shape.1) as u64,
    })
}
