use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    animation::{ControllerConfig, Sign, SignCatalog},
    gesture::ClassifierConfig,
};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub rig: RigConfig,
    #[serde(default)]
    pub source: SourceConfig,
    /// Replaces the built-in catalog when non-empty.
    #[serde(default)]
    pub signs: Vec<Sign>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    100
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl SamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RigConfig {
    #[serde(default = "default_skeleton_path")]
    pub skeleton_path: PathBuf,
    /// TOML rest-pose override; the built-in Mixamo table is used otherwise.
    #[serde(default)]
    pub pose_table_path: Option<PathBuf>,
    #[serde(flatten)]
    pub controller: ControllerConfig,
}

fn default_skeleton_path() -> PathBuf {
    PathBuf::from("assets").join("avatar_skeleton.json")
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            skeleton_path: default_skeleton_path(),
            pose_table_path: None,
            controller: ControllerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Replay,
    Camera,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    #[serde(default = "default_replay_path")]
    pub replay_path: PathBuf,
    #[serde(default)]
    pub replay_loop: bool,
    #[serde(default)]
    pub camera_index: u32,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
}

fn default_source_kind() -> SourceKind {
    SourceKind::Replay
}

fn default_replay_path() -> PathBuf {
    PathBuf::from("recordings").join("session.jsonl")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models").join("handpose_estimation_mediapipe_2023feb.onnx")
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            replay_path: default_replay_path(),
            replay_loop: false,
            camera_index: 0,
            model_path: default_model_path(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("using default config: {err:?}");
                Self::default()
            }
        }
    }

    pub fn sign_catalog(&self) -> SignCatalog {
        if self.signs.is_empty() {
            SignCatalog::default()
        } else {
            SignCatalog::new(self.signs.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::gesture::PalmOpenReading;

    #[test]
    fn defaults_match_reference_rig() {
        let config = Config::default();
        assert_eq!(config.sampling.interval(), Duration::from_millis(100));
        assert_eq!(config.classifier.fist_closed, 3);
        assert_eq!(config.rig.controller.root_scale, 1.5);
        assert_eq!(config.rig.controller.bone_prefix, "mixamorig");
        assert_eq!(config.source.kind, SourceKind::Replay);
        assert_eq!(config.sign_catalog(), SignCatalog::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config: Config = toml::from_str(
            r#"
            [classifier]
            thumb_up = 5
            palm_open_reading = "extended"

            [rig]
            bone_prefix = ""
            root_scale = 1.0

            [[signs]]
            name = "Hola"
            animation = "wave"
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.thumb_up, 5);
        assert_eq!(config.classifier.fist_closed, 3);
        assert_eq!(
            config.classifier.palm_open_reading,
            PalmOpenReading::Extended
        );
        assert_eq!(config.rig.controller.bone_prefix, "");
        assert_eq!(config.rig.skeleton_path, default_skeleton_path());
        assert_eq!(config.sampling.interval_ms, 100);
        assert_eq!(config.sign_catalog().signs().len(), 1);
    }

    #[test]
    fn load_reads_file_and_missing_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sampling]\ninterval_ms = 50").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sampling.interval_ms, 50);

        assert!(Config::load("no/such/config.toml").is_err());
        let fallback = Config::load_or_default("no/such/config.toml");
        assert_eq!(fallback.sampling.interval_ms, 100);
    }
}
