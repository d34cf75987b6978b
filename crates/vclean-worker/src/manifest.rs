//! Job manifest loading.
//!
//! A manifest is a JSON array of cleaning jobs. Regions may be given either
//! as `"x,y,w,h"` strings or as `{x, y, width, height}` objects; strings are
//! parsed here so a malformed region fails before any video is opened.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use vclean_models::{CleaningRequest, Region};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RegionField {
    Text(String),
    Rect(Region),
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    input_path: PathBuf,
    output_path: PathBuf,
    #[serde(default)]
    region: Option<RegionField>,
    #[serde(default)]
    auto_detect: Option<bool>,
    #[serde(default)]
    batch_size: Option<usize>,
    #[serde(default)]
    caption_band_percent: Option<f32>,
}

impl ManifestEntry {
    fn into_request(self, config: &WorkerConfig) -> WorkerResult<CleaningRequest> {
        let mut request = CleaningRequest::new(self.input_path, self.output_path)
            .with_batch_size(self.batch_size.unwrap_or(config.batch_size));
        request.caption_band_percent = self
            .caption_band_percent
            .unwrap_or(config.caption_band_percent);

        if let Some(auto_detect) = self.auto_detect {
            request = request.with_auto_detect(auto_detect);
        }

        match self.region {
            Some(RegionField::Text(text)) => Ok(request.with_region(text.parse()?)),
            Some(RegionField::Rect(region)) => Ok(request.with_region(region)),
            None => Ok(request),
        }
    }
}

/// Parse manifest JSON into requests, applying worker defaults.
pub fn parse_manifest(json: &str, config: &WorkerConfig) -> WorkerResult<Vec<CleaningRequest>> {
    let entries: Vec<ManifestEntry> = serde_json::from_str(json)?;
    entries
        .into_iter()
        .map(|entry| entry.into_request(config))
        .collect()
}

/// Read and parse a manifest file.
pub async fn load_manifest(path: &Path, config: &WorkerConfig) -> WorkerResult<Vec<CleaningRequest>> {
    let json = tokio::fs::read_to_string(path).await?;
    parse_manifest(&json, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use vclean_models::{MaskMode, RegionParseError};

    #[test]
    fn test_parse_manifest() {
        let json = r#"[
            {"input_path": "a.mp4", "output_path": "a_clean.mp4", "region": "40,85,20,10"},
            {"input_path": "b.mp4", "output_path": "b_clean.mp4",
             "region": {"x": 0, "y": 0, "width": 10, "height": 10}, "batch_size": 4},
            {"input_path": "c.mp4", "output_path": "c_clean.mp4", "auto_detect": false}
        ]"#;

        let requests = parse_manifest(json, &WorkerConfig::default()).unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[0].mask_mode(),
            MaskMode::Fixed {
                region: Region::new(40, 85, 20, 10)
            }
        );
        assert_eq!(requests[0].batch_size, 8);
        assert_eq!(requests[1].batch_size, 4);
        assert_eq!(requests[2].mask_mode(), MaskMode::StaticBand { percent: 0.15 });
    }

    #[test]
    fn test_defaults_come_from_config() {
        let config = WorkerConfig {
            batch_size: 16,
            caption_band_percent: 0.2,
            ..WorkerConfig::default()
        };
        let json = r#"[{"input_path": "a.mp4", "output_path": "b.mp4"}]"#;

        let requests = parse_manifest(json, &config).unwrap();
        assert_eq!(requests[0].batch_size, 16);
        assert!(requests[0].auto_detect);
        assert!((requests[0].caption_band_percent - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_malformed_region_is_rejected() {
        let json = r#"[{"input_path": "a.mp4", "output_path": "b.mp4", "region": "1,2,3"}]"#;
        let result = parse_manifest(json, &WorkerConfig::default());
        assert!(matches!(
            result,
            Err(WorkerError::Format(RegionParseError::FieldCount { found: 3 }))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_manifest("{not json", &WorkerConfig::default()),
            Err(WorkerError::Json(_))
        ));
    }
}
