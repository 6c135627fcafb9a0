//! JSON configuration and report helpers for map merging.

use map_merge_core::{OccupancyGrid, Pose};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum MergeIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_occupied_thresh() -> f64 {
    0.65
}

fn default_free_thresh() -> f64 {
    0.196
}

/// Metadata needed to interpret a map image (map_server YAML fields).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapImageParams {
    /// Metres per pixel.
    pub resolution: f64,
    /// Pose of the lower-left pixel's outer corner.
    #[serde(default)]
    pub origin: Pose,
    #[serde(default = "default_occupied_thresh")]
    pub occupied_thresh: f64,
    #[serde(default = "default_free_thresh")]
    pub free_thresh: f64,
    #[serde(default)]
    pub negate: bool,
}

impl MapImageParams {
    pub fn new(resolution: f64) -> Self {
        Self {
            resolution,
            origin: Pose::IDENTITY,
            occupied_thresh: default_occupied_thresh(),
            free_thresh: default_free_thresh(),
            negate: false,
        }
    }
}

/// One input map: an image file plus how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSource {
    pub image_path: String,
    #[serde(flatten)]
    pub params: MapImageParams,
}

/// How input maps are placed in the common frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlacementConfig {
    /// Maps share a world frame; use their origins.
    #[default]
    KnownOrigins,
    /// Explicit pose per map, in input order.
    Poses { poses: Vec<Pose> },
}

/// Configuration for the `map-merge` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    pub maps: Vec<MapSource>,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub report_path: Option<String>,
}

impl MergeConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, MergeIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), MergeIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the merged map image path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("merged_map.pgm"))
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        self.report_path.as_ref().map(PathBuf::from)
    }
}

/// Geometry of a merged grid, as written to the report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedGridInfo {
    pub width: u32,
    pub height: u32,
    pub resolution: f64,
    pub origin: Pose,
}

impl From<&OccupancyGrid> for MergedGridInfo {
    fn from(grid: &OccupancyGrid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            resolution: grid.resolution(),
            origin: grid.origin(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub config_path: String,
    pub image_paths: Vec<String>,
    #[serde(default)]
    pub poses: Vec<Pose>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub merged: Option<MergedGridInfo>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MergeReport {
    /// Build a base report from the input config.
    pub fn new(cfg: &MergeConfig, config_path: &Path) -> Self {
        Self {
            config_path: config_path.to_string_lossy().into_owned(),
            image_paths: cfg.maps.iter().map(|m| m.image_path.clone()).collect(),
            poses: Vec::new(),
            output_path: None,
            merged: None,
            error: None,
        }
    }

    /// Populate report fields from a successful merge.
    pub fn set_merged(&mut self, poses: Vec<Pose>, merged: &OccupancyGrid, output: &Path) {
        self.poses = poses;
        self.merged = Some(MergedGridInfo::from(merged));
        self.output_path = Some(output.to_string_lossy().into_owned());
        self.error = None;
    }

    /// Record a merge error.
    pub fn set_error(&mut self, err: impl std::fmt::Display) {
        self.error = Some(err.to_string());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, MergeIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), MergeIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
