//! Run-Length Encoding Codec
//!
//! Converts between the competition's RLE strings and dense binary masks.
//! An RLE string is a whitespace-separated list of alternating (start, length)
//! pairs, with 1-based starts indexing a column-major flattening of the
//! 768x768 grid. Decoding therefore fills a flat buffer, reshapes it row-major
//! to (width, height) and transposes to (height, width); the transpose is what
//! aligns the run direction with image axes and must not be skipped.

use ndarray::Array2;

use crate::utils::error::{Result, ShipSegError};

/// Parse an RLE string into (start, length) pairs.
///
/// Starts are converted from 1-based to 0-based offsets. Fails on an odd
/// token count or any token that does not parse as an unsigned integer.
fn parse_pairs(rle: &str) -> Result<Vec<(usize, usize)>> {
    let tokens: Vec<&str> = rle.split_whitespace().collect();
    if tokens.len() % 2 != 0 {
        return Err(ShipSegError::MalformedRle(format!(
            "odd token count ({})",
            tokens.len()
        )));
    }

    let mut pairs = Vec::with_capacity(tokens.len() / 2);
    for chunk in tokens.chunks_exact(2) {
        let start: usize = chunk[0]
            .parse()
            .map_err(|_| ShipSegError::MalformedRle(format!("non-numeric token '{}'", chunk[0])))?;
        let length: usize = chunk[1]
            .parse()
            .map_err(|_| ShipSegError::MalformedRle(format!("non-numeric token '{}'", chunk[1])))?;
        pairs.push((start.saturating_sub(1), length));
    }
    Ok(pairs)
}

/// Reshape a column-major flat buffer into an (height, width) mask.
///
/// The flat buffer is laid out with the row index varying fastest, so the
/// row-major reshape target is (width, height); transposing yields the
/// (height, width) mask oriented like the image.
fn column_major_grid(flat: Vec<u8>, height: usize, width: usize) -> Array2<u8> {
    Array2::from_shape_vec((width, height), flat)
        .expect("flat buffer length equals width * height")
        .reversed_axes()
}

/// Decode an RLE string into a dense binary mask of the given (height, width).
///
/// An empty or whitespace-only string decodes to an all-zero mask. Runs that
/// extend past the end of the grid are clamped.
pub fn decode(rle: &str, shape: (usize, usize)) -> Result<Array2<u8>> {
    let (height, width) = shape;
    let n = height * width;
    let mut flat = vec![0u8; n];

    for (start, length) in parse_pairs(rle)? {
        let end = (start + length).min(n);
        if start >= n {
            continue;
        }
        for slot in &mut flat[start..end] {
            *slot = 1;
        }
    }

    Ok(column_major_grid(flat, height, width))
}

/// Encode a dense binary mask (any value > 0 is foreground) into an RLE
/// string.
///
/// The mask is flattened column-major and runs are emitted as 1-based
/// `start length` pairs joined by spaces. An all-zero mask encodes to the
/// empty string.
pub fn encode(mask: &Array2<u8>) -> String {
    let mut runs: Vec<usize> = Vec::new();
    let mut prev = 0u8;

    // Iterating the transposed view walks the original column-major.
    for (i, &v) in mask.t().iter().enumerate() {
        let v = if v > 0 { 1 } else { 0 };
        if v != prev {
            if v == 1 {
                runs.push(i + 1); // run start, 1-based
                runs.push(0);
            } else {
                let start = runs[runs.len() - 2];
                let last = runs.len() - 1;
                runs[last] = i + 1 - start;
            }
            prev = v;
        }
    }
    if prev == 1 {
        let total = mask.len();
        let start = runs[runs.len() - 2];
        let last = runs.len() - 1;
        runs[last] = total + 1 - start;
    }

    runs.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Number of foreground pixels an RLE string covers, without decoding it.
pub fn pixel_count(rle: &str) -> Result<u64> {
    Ok(parse_pairs(rle)?.iter().map(|&(_, len)| len as u64).sum())
}
