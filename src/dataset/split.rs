//! Train/Validation Splitting
//!
//! Splits the grouped images into training and validation sets, stratified by
//! ship count so both sets see the same ship-count histogram.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::records::ImageGroups;
use crate::utils::error::{Result, ShipSegError};

/// Split configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of images held out for validation (0.0 - 1.0).
    pub validation_fraction: f64,
    /// Seed for the stratified shuffle.
    pub seed: u64,
    /// Drop images without any ship before splitting. The released data is
    /// heavily skewed toward empty sea, so this is on by default.
    pub drop_empty_images: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.05,
            seed: 42,
            drop_empty_images: true,
        }
    }
}

/// Image ids assigned to each side of the split.
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train_ids: Vec<String>,
    pub validation_ids: Vec<String>,
}

impl DatasetSplits {
    /// Stratify grouped images by ship count and split each stratum.
    pub fn from_groups(groups: &ImageGroups, config: &SplitConfig) -> Result<Self> {
        if !(0.0..1.0).contains(&config.validation_fraction) {
            return Err(ShipSegError::Config(format!(
                "validation fraction must be in [0, 1), got {}",
                config.validation_fraction
            )));
        }

        // BTreeMap keeps strata in ship-count order so the split is stable
        // for a given seed.
        let mut strata: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for id in groups.image_ids() {
            let count = groups.ship_count(id);
            if count == 0 && config.drop_empty_images {
                continue;
            }
            strata.entry(count).or_default().push(id);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut train_ids = Vec::new();
        let mut validation_ids = Vec::new();

        for ids in strata.values_mut() {
            ids.shuffle(&mut rng);
            let n_val = ((ids.len() as f64) * config.validation_fraction).round() as usize;
            for (i, id) in ids.iter().enumerate() {
                if i < n_val {
                    validation_ids.push((*id).to_string());
                } else {
                    train_ids.push((*id).to_string());
                }
            }
        }

        if train_ids.is_empty() {
            return Err(ShipSegError::Dataset(
                "no training images left after splitting".to_string(),
            ));
        }

        Ok(Self {
            train_ids,
            validation_ids,
        })
    }

    pub fn stats(&self) -> SplitStats {
        SplitStats {
            train_size: self.train_ids.len(),
            validation_size: self.validation_ids.len(),
        }
    }
}

/// Summary counts for logging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitStats {
    pub train_size: usize,
    pub validation_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::records::{group_by_image, MaskRecord};

    fn groups_with_counts(layout: &[(usize, usize)]) -> ImageGroups {
        // layout: (ship_count, num_images) pairs.
        let mut records = Vec::new();
        for (count, num_images) in layout {
            for i in 0..*num_images {
                let id = format!("c{}_{}.jpg", count, i);
                if *count == 0 {
                    records.push(MaskRecord::new(id, None::<String>));
                } else {
                    for _ in 0..*count {
                        records.push(MaskRecord::new(id.clone(), Some("1 1")));
                    }
                }
            }
        }
        group_by_image(&records)
    }

    #[test]
    fn test_split_partitions_all_images() {
        let groups = groups_with_counts(&[(1, 40), (2, 20)]);
        let config = SplitConfig {
            validation_fraction: 0.25,
            seed: 7,
            drop_empty_images: true,
        };
        let splits = DatasetSplits::from_groups(&groups, &config).unwrap();
        assert_eq!(splits.train_ids.len() + splits.validation_ids.len(), 60);

        let mut all: Vec<&String> = splits.train_ids.iter().chain(&splits.validation_ids).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 60);
    }

    #[test]
    fn test_split_is_stratified() {
        let groups = groups_with_counts(&[(1, 40), (3, 20)]);
        let config = SplitConfig {
            validation_fraction: 0.25,
            seed: 7,
            drop_empty_images: true,
        };
        let splits = DatasetSplits::from_groups(&groups, &config).unwrap();

        let val_single = splits
            .validation_ids
            .iter()
            .filter(|id| id.starts_with("c1_"))
            .count();
        let val_triple = splits
            .validation_ids
            .iter()
            .filter(|id| id.starts_with("c3_"))
            .count();
        assert_eq!(val_single, 10);
        assert_eq!(val_triple, 5);
    }

    #[test]
    fn test_split_reproducible() {
        let groups = groups_with_counts(&[(1, 30)]);
        let config = SplitConfig::default();
        let a = DatasetSplits::from_groups(&groups, &config).unwrap();
        let b = DatasetSplits::from_groups(&groups, &config).unwrap();
        assert_eq!(a.train_ids, b.train_ids);
        assert_eq!(a.validation_ids, b.validation_ids);
    }

    #[test]
    fn test_empty_images_dropped() {
        let groups = groups_with_counts(&[(0, 10), (1, 10)]);
        let config = SplitConfig {
            validation_fraction: 0.0,
            seed: 1,
            drop_empty_images: true,
        };
        let splits = DatasetSplits::from_groups(&groups, &config).unwrap();
        assert_eq!(splits.train_ids.len(), 10);
        assert!(splits.train_ids.iter().all(|id| id.starts_with("c1_")));
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let groups = groups_with_counts(&[(1, 10)]);
        let config = SplitConfig {
            validation_fraction: 1.5,
            seed: 1,
            drop_empty_images: true,
        };
        assert!(DatasetSplits::from_groups(&groups, &config).is_err());
    }
}
