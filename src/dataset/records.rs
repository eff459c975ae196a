//! Mask Records and Dataset Indexing
//!
//! Reads the competition's `train_ship_segmentations_v2.csv` style files
//! (one row per ship instance, `ImageId` + `EncodedPixels`, a null
//! `EncodedPixels` marking a ship-free image) and regroups the rows into one
//! entry per image. The same grouping feeds both the training/validation
//! dataset and the per-image reorganization of submission rows.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::error::Result;

/// Image ids known to be unreadable in the released data; dropped on load.
pub const CORRUPTED_IMAGES: &[&str] = &["6384c3e78.jpg"];

/// One CSV row: a single ship instance, or a ship-free image when
/// `encoded_pixels` is null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaskRecord {
    #[serde(rename = "ImageId")]
    pub image_id: String,
    #[serde(rename = "EncodedPixels")]
    pub encoded_pixels: Option<String>,
}

impl MaskRecord {
    pub fn new(image_id: impl Into<String>, encoded_pixels: Option<impl Into<String>>) -> Self {
        Self {
            image_id: image_id.into(),
            encoded_pixels: encoded_pixels.map(Into::into),
        }
    }
}

/// Read mask records from a CSV file, dropping known-corrupted images.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<MaskRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: MaskRecord = row?;
        if CORRUPTED_IMAGES.contains(&record.image_id.as_str()) {
            continue;
        }
        records.push(record);
    }
    info!("Loaded {} mask records from CSV", records.len());
    Ok(records)
}

/// Rows of one image, grouped: the per-instance RLE strings in row order,
/// with nulls preserved.
#[derive(Debug, Clone, Default)]
pub struct ImageGroups {
    order: Vec<String>,
    groups: HashMap<String, Vec<Option<String>>>,
}

impl ImageGroups {
    /// Number of distinct images.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Image ids in first-seen order.
    pub fn image_ids(&self) -> &[String] {
        &self.order
    }

    /// RLE strings recorded for an image.
    pub fn masks(&self, image_id: &str) -> Option<&[Option<String>]> {
        self.groups.get(image_id).map(|v| v.as_slice())
    }

    /// Number of ship instances for an image (null rows excluded).
    pub fn ship_count(&self, image_id: &str) -> usize {
        self.groups
            .get(image_id)
            .map(|masks| masks.iter().filter(|m| m.is_some()).count())
            .unwrap_or(0)
    }

    /// Iterate (image id, masks) pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Option<String>])> {
        self.order
            .iter()
            .map(move |id| (id.as_str(), self.groups[id].as_slice()))
    }
}

/// Group records by image id, preserving the order image ids first appear in
/// the source sequence.
pub fn group_by_image(records: &[MaskRecord]) -> ImageGroups {
    let mut groups: HashMap<String, Vec<Option<String>>> = HashMap::new();
    let mut order = Vec::new();

    for record in records {
        let entry = groups.entry(record.image_id.clone()).or_insert_with(|| {
            order.push(record.image_id.clone());
            Vec::new()
        });
        entry.push(record.encoded_pixels.clone());
    }

    ImageGroups { order, groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<MaskRecord> {
        vec![
            MaskRecord::new("b.jpg", Some("1 3")),
            MaskRecord::new("a.jpg", None::<String>),
            MaskRecord::new("b.jpg", Some("9 2")),
            MaskRecord::new("c.jpg", Some("5 1")),
        ]
    }

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let groups = group_by_image(&sample_records());
        assert_eq!(groups.image_ids(), &["b.jpg", "a.jpg", "c.jpg"]);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_grouping_collects_all_instances() {
        let groups = group_by_image(&sample_records());
        assert_eq!(
            groups.masks("b.jpg").unwrap(),
            &[Some("1 3".to_string()), Some("9 2".to_string())]
        );
        assert_eq!(groups.masks("a.jpg").unwrap(), &[None]);
        assert!(groups.masks("missing.jpg").is_none());
    }

    #[test]
    fn test_ship_count_ignores_null_rows() {
        let groups = group_by_image(&sample_records());
        assert_eq!(groups.ship_count("b.jpg"), 2);
        assert_eq!(groups.ship_count("a.jpg"), 0);
        assert_eq!(groups.ship_count("missing.jpg"), 0);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("masks.csv");
        std::fs::write(&path, "ImageId,EncodedPixels\nx.jpg,1 3\ny.jpg,\n").unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].encoded_pixels.as_deref(), Some("1 3"));
        assert_eq!(records[1].encoded_pixels, None);
    }

    #[test]
    fn test_corrupted_images_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("masks.csv");
        std::fs::write(
            &path,
            "ImageId,EncodedPixels\n6384c3e78.jpg,1 3\nok.jpg,1 1\n",
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image_id, "ok.jpg");
    }
}
