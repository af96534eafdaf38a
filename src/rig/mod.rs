pub mod pose_table;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    thread,
};

use anyhow::{Context, Result};
use serde::Deserialize;

pub use pose_table::DefaultPoseTable;

/// Euler rotation in radians, `[x, y, z]`.
pub type Rotation = [f32; 3];

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read skeleton {}", path.display()))?;
        let skeleton: Skeleton = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse skeleton {}", path.display()))?;
        Ok(skeleton)
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.bones.iter_mut().find(|bone| bone.name == name)
    }
}

#[cfg(test)]
impl Bone {
    pub fn new(name: impl Into<String>, rotation: Rotation) -> Self {
        Self {
            name: name.into(),
            rotation,
        }
    }
}

#[cfg(test)]
impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Self {
        Self { bones }
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|bone| bone.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation: Rotation,
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

/// The avatar: a root object plus the skeleton of its skinned mesh, if the
/// asset had one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rig {
    pub root: Transform,
    pub skeleton: Option<Skeleton>,
}

/// Written only by the sampling loop, read by whoever renders the rig.
/// `None` until the asset finished loading.
pub type SharedRig = Arc<RwLock<Option<Rig>>>;

pub fn empty_shared_rig() -> SharedRig {
    Arc::new(RwLock::new(None))
}

/// Load the rig on a background thread and publish it into `slot` once
/// ready. A failed load leaves the slot empty.
pub fn spawn_rig_loader(
    skeleton_path: PathBuf,
    root_scale: f32,
    slot: SharedRig,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let skeleton = match Skeleton::load(&skeleton_path) {
            Ok(skeleton) => {
                log::info!(
                    "skeleton loaded from {} ({} bones)",
                    skeleton_path.display(),
                    skeleton.bones.len()
                );
                Some(skeleton)
            }
            Err(err) => {
                log::error!("failed to load avatar: {err:?}");
                return;
            }
        };

        let rig = Rig {
            root: Transform {
                scale: [root_scale; 3],
                ..Transform::default()
            },
            skeleton,
        };

        match slot.write() {
            Ok(mut guard) => *guard = Some(rig),
            Err(err) => log::error!("rig slot poisoned: {err}"),
        }
    })
}
