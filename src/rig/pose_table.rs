use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::Rotation;

pub const DEFAULT_BONE_PREFIX: &str = "mixamorig";

/// Rest rotations of the stock Mixamo avatar, keyed without the rig prefix.
const MIXAMO_REST_POSE: &[(&str, Rotation)] = &[
    ("Hips", [0.0, 0.0, 0.0]),
    ("Spine", [-0.05, 0.0, 0.0]),
    ("Spine1", [0.0, 0.0, 0.0]),
    ("Spine2", [0.05, 0.0, 0.0]),
    ("Neck", [0.1, 0.0, 0.0]),
    ("Head", [-0.1, 0.0, 0.0]),
    ("LeftShoulder", [1.57, 0.0, -1.57]),
    ("LeftArm", [0.0, 0.0, -1.2]),
    ("LeftForeArm", [0.0, 0.0, 0.0]),
    ("LeftHand", [0.0, 0.0, 0.0]),
    ("RightShoulder", [1.57, 0.0, 1.57]),
    ("RightArm", [0.0, 0.0, 1.2]),
    ("RightForeArm", [0.0, 0.0, 0.0]),
    ("RightHand", [0.0, 0.0, 0.0]),
    ("LeftUpLeg", [0.0, 0.0, 3.14]),
    ("LeftLeg", [0.0, 0.0, 0.0]),
    ("LeftFoot", [1.0, 0.0, 0.0]),
    ("RightUpLeg", [0.0, 0.0, -3.14]),
    ("RightLeg", [0.0, 0.0, 0.0]),
    ("RightFoot", [1.0, 0.0, 0.0]),
];

/// Bone name to rest rotation. Built once at startup and never mutated;
/// share it behind an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct DefaultPoseTable {
    rest: HashMap<String, Rotation>,
}

#[derive(Deserialize)]
struct PoseTableFile {
    bones: HashMap<String, Rotation>,
}

impl DefaultPoseTable {
    pub fn builtin(prefix: &str) -> Self {
        let rest = MIXAMO_REST_POSE
            .iter()
            .map(|(name, rotation)| (format!("{prefix}{name}"), *rotation))
            .collect();
        Self { rest }
    }

    /// TOML file with a `[bones]` table of `name = [x, y, z]`. Names are
    /// taken verbatim, prefix included.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read pose table {}", path.display()))?;
        let file: PoseTableFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse pose table {}", path.display()))?;
        Ok(Self { rest: file.bones })
    }

    pub fn rest_rotation(&self, bone: &str) -> Option<Rotation> {
        self.rest.get(bone).copied()
    }

    pub fn len(&self) -> usize {
        self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn builtin_table_uses_prefix() {
        let table = DefaultPoseTable::builtin(DEFAULT_BONE_PREFIX);
        assert_eq!(table.len(), MIXAMO_REST_POSE.len());
        assert_eq!(
            table.rest_rotation("mixamorigRightArm"),
            Some([0.0, 0.0, 1.2])
        );
        assert_eq!(table.rest_rotation("RightArm"), None);

        let bare = DefaultPoseTable::builtin("");
        assert!(bare.rest_rotation("RightArm").is_some());
    }

    #[test]
    fn table_loads_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bones]").unwrap();
        writeln!(file, "mixamorigHead = [0.2, 0.0, 0.0]").unwrap();
        writeln!(file, "mixamorigRightHand = [0.0, 0.1, 0.0]").unwrap();

        let table = DefaultPoseTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rest_rotation("mixamorigHead"), Some([0.2, 0.0, 0.0]));
    }

    #[test]
    fn missing_table_file_is_an_error() {
        assert!(DefaultPoseTable::load(Path::new("no/such/pose.toml")).is_err());
    }
}
