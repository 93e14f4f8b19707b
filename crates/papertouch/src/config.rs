//! Aggregate pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::background::BackgroundConfig;
use crate::control::ClassifierConfig;
use crate::fingertip::FingertipConfig;
use crate::paper::PaperDetectorConfig;
use crate::preprocess::EdgeMapConfig;
use crate::session::SessionConfig;

/// Every tunable of the pipeline. Missing sections and fields fall back to
/// the calibrated defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paper: PaperDetectorConfig,
    pub edge_map: EdgeMapConfig,
    pub classifier: ClassifierConfig,
    pub fingertip: FingertipConfig,
    pub background: BackgroundConfig,
    pub session: SessionConfig,
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
