//! Prediction Postprocessing
//!
//! Turns a thresholded probability mask back into per-ship RLE strings:
//! a morphological opening scrubs speckle from the thresholded output, then
//! connected-component labeling separates the surviving blobs and each one
//! is RLE-encoded on its own. Thresholding itself happens at the model
//! boundary before this module is invoked.

use ndarray::Array2;

use crate::dataset::rle;

/// Neighbor rule for component labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Horizontal and vertical neighbors only.
    Four,
    /// Diagonal neighbors count as connected. Default for ship blobs.
    Eight,
}

/// Offsets of a disk-shaped structuring element with the given radius.
pub fn disk(radius: usize) -> Vec<(i64, i64)> {
    let r = radius as i64;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dy * dy + dx * dx <= r * r {
                offsets.push((dy, dx));
            }
        }
    }
    offsets
}

fn erode(mask: &Array2<u8>, offsets: &[(i64, i64)]) -> Array2<u8> {
    let (h, w) = mask.dim();
    let mut out = Array2::<u8>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            if mask[[y, x]] == 0 {
                continue;
            }
            // A pixel survives only if the whole element fits in foreground;
            // pixels outside the grid count as background.
            let all_set = offsets.iter().all(|&(dy, dx)| {
                let ny = y as i64 + dy;
                let nx = x as i64 + dx;
                ny >= 0 && ny < h as i64 && nx >= 0 && nx < w as i64 && mask[[ny as usize, nx as usize]] > 0
            });
            if all_set {
                out[[y, x]] = 1;
            }
        }
    }
    out
}

fn dilate(mask: &Array2<u8>, offsets: &[(i64, i64)]) -> Array2<u8> {
    let (h, w) = mask.dim();
    let mut out = Array2::<u8>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            if mask[[y, x]] == 0 {
                continue;
            }
            for &(dy, dx) in offsets {
                let ny = y as i64 + dy;
                let nx = x as i64 + dx;
                if ny >= 0 && ny < h as i64 && nx >= 0 && nx < w as i64 {
                    out[[ny as usize, nx as usize]] = 1;
                }
            }
        }
    }
    out
}

/// Morphological opening (erosion then dilation) with a disk element.
///
/// Removes speckle smaller than the disk while keeping larger blobs roughly
/// intact.
pub fn binary_opening(mask: &Array2<u8>, radius: usize) -> Array2<u8> {
    let offsets = disk(radius);
    dilate(&erode(mask, &offsets), &offsets)
}

fn find_root(parents: &mut [usize], label: usize) -> usize {
    let mut current = label;
    while current != parents[current] {
        parents[current] = parents[parents[current]];
        current = parents[current];
    }
    current
}

fn union_labels(parents: &mut [usize], a: usize, b: usize) {
    let root_a = find_root(parents, a);
    let root_b = find_root(parents, b);
    if root_a != root_b {
        if root_a < root_b {
            parents[root_b] = root_a;
        } else {
            parents[root_a] = root_b;
        }
    }
}

/// Two-pass connected-component labeling with union-find.
///
/// Background pixels get 0; each component gets a consecutive positive label
/// starting from 1, in scan order of the component's first pixel.
pub fn label_components(mask: &Array2<u8>, connectivity: Connectivity) -> Array2<u32> {
    let (h, w) = mask.dim();
    let mut labels = Array2::<u32>::zeros((h, w));
    let mut parents: Vec<usize> = vec![0];
    let mut next_label = 0usize;

    for y in 0..h {
        for x in 0..w {
            if mask[[y, x]] == 0 {
                continue;
            }

            // Already-visited neighbors: left, up, and for 8-connectivity
            // the two upper diagonals.
            let mut neighbors: Vec<usize> = Vec::with_capacity(4);
            if x > 0 && labels[[y, x - 1]] > 0 {
                neighbors.push(labels[[y, x - 1]] as usize);
            }
            if y > 0 && labels[[y - 1, x]] > 0 {
                neighbors.push(labels[[y - 1, x]] as usize);
            }
            if connectivity == Connectivity::Eight && y > 0 {
                if x > 0 && labels[[y - 1, x - 1]] > 0 {
                    neighbors.push(labels[[y - 1, x - 1]] as usize);
                }
                if x + 1 < w && labels[[y - 1, x + 1]] > 0 {
                    neighbors.push(labels[[y - 1, x + 1]] as usize);
                }
            }

            if neighbors.is_empty() {
                next_label += 1;
                parents.push(next_label);
                labels[[y, x]] = next_label as u32;
            } else {
                let min = *neighbors.iter().min().expect("neighbors is non-empty");
                labels[[y, x]] = min as u32;
                for &n in &neighbors {
                    if n != min {
                        union_labels(&mut parents, min, n);
                    }
                }
            }
        }
    }

    // Flatten equivalences and map roots to consecutive labels.
    for i in 1..parents.len() {
        find_root(&mut parents, i);
    }
    let mut relabel = vec![0u32; parents.len()];
    let mut consecutive = 0u32;
    for i in 1..parents.len() {
        let root = parents[i];
        if relabel[root] == 0 {
            consecutive += 1;
            relabel[root] = consecutive;
        }
        relabel[i] = relabel[root];
    }

    for label in labels.iter_mut() {
        if *label > 0 {
            *label = relabel[*label as usize];
        }
    }
    labels
}

/// Split a binary mask into one RLE string per connected component, labels
/// ascending.
///
/// Returns an empty list when the mask has no foreground; the caller emits
/// the single no-ship record in that case.
pub fn split_instances(mask: &Array2<u8>, connectivity: Connectivity) -> Vec<String> {
    let labels = label_components(mask, connectivity);
    let max_label = labels.iter().copied().max().unwrap_or(0);

    (1..=max_label)
        .map(|k| {
            let instance = labels.mapv(|v| u8::from(v == k));
            rle::encode(&instance)
        })
        .collect()
}
