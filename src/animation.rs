use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::{
    rig::{DefaultPoseTable, Rig, Rotation, Skeleton, Transform},
    types::Gesture,
};

pub const WAVE_HAND_Z: f32 = 0.8;
pub const NOD_HEAD_X: f32 = 0.3;
pub const DEFAULT_ROOT_SCALE: f32 = 1.5;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Sign {
    pub name: String,
    pub animation: String,
}

impl Sign {
    pub fn new(name: impl Into<String>, animation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            animation: animation.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignCatalog {
    signs: Vec<Sign>,
}

impl Default for SignCatalog {
    fn default() -> Self {
        Self {
            signs: vec![Sign::new("Hola", "wave"), Sign::new("Gracias", "thank_you")],
        }
    }
}

impl SignCatalog {
    pub fn new(signs: Vec<Sign>) -> Self {
        Self { signs }
    }

    pub fn signs(&self) -> &[Sign] {
        &self.signs
    }

    pub fn find(&self, name: &str) -> Option<&Sign> {
        self.signs
            .iter()
            .find(|sign| sign.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationKey {
    Wave,
    ThankYou,
}

impl AnimationKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "wave" => Some(AnimationKey::Wave),
            "thank_you" => Some(AnimationKey::ThankYou),
            _ => None,
        }
    }

    /// Bone suffix (after the rig prefix) this animation poses.
    pub fn bone(&self) -> &'static str {
        match self {
            AnimationKey::Wave => "RightHand",
            AnimationKey::ThankYou => "Head",
        }
    }

    fn pose(&self, rotation: &mut Rotation) {
        match self {
            AnimationKey::Wave => rotation[2] = WAVE_HAND_Z,
            AnimationKey::ThankYou => rotation[0] = NOD_HEAD_X,
        }
    }
}

/// What the rig should do in response to a gesture or a UI request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RigAction {
    /// Catalog sign requested by name.
    Sign(String),
    /// Sign played as given, whatever the catalog holds.
    Perform(Sign),
    Stop,
}

impl RigAction {
    pub fn for_gesture(gesture: Gesture) -> Self {
        match gesture {
            Gesture::FistClosed => RigAction::Stop,
            Gesture::PalmOpen => RigAction::Perform(Sign::new("Hola", "wave")),
            Gesture::ThumbUp => RigAction::Perform(Sign::new("Gracias", "thank_you")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnimationError {
    #[error("rig not loaded yet")]
    RigNotLoaded,
    #[error("skeleton not loaded yet")]
    SkeletonNotLoaded,
    #[error("bone {0} not found in skeleton")]
    MissingBone(String),
    #[error("animation {0} not found")]
    UnknownAnimation(String),
    #[error("sign {0} not in catalog")]
    UnknownSign(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StopReport {
    pub restored: usize,
    pub untouched: usize,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub bone_prefix: String,
    pub root_scale: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bone_prefix: crate::rig::pose_table::DEFAULT_BONE_PREFIX.to_string(),
            root_scale: DEFAULT_ROOT_SCALE,
        }
    }
}

/// Applies absolute bone poses for signs and restores the rest pose on stop.
/// Holds no rig state of its own; every call gets the rig it should touch.
pub struct AnimationController {
    pose_table: Arc<DefaultPoseTable>,
    catalog: SignCatalog,
    config: ControllerConfig,
}

impl AnimationController {
    pub fn new(
        pose_table: Arc<DefaultPoseTable>,
        catalog: SignCatalog,
        config: ControllerConfig,
    ) -> Self {
        Self {
            pose_table,
            catalog,
            config,
        }
    }

    pub fn bone_name(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.config.bone_prefix)
    }

    pub fn apply_sign(
        &self,
        sign: &Sign,
        skeleton: Option<&mut Skeleton>,
    ) -> Result<String, AnimationError> {
        log::debug!("animating sign {} ({})", sign.name, sign.animation);

        let Some(key) = AnimationKey::parse(&sign.animation) else {
            log::warn!("animation not found: {}", sign.animation);
            return Err(AnimationError::UnknownAnimation(sign.animation.clone()));
        };
        let Some(skeleton) = skeleton else {
            log::warn!("skeleton not loaded yet, cannot play {}", sign.name);
            return Err(AnimationError::SkeletonNotLoaded);
        };

        let bone_name = self.bone_name(key.bone());
        let Some(bone) = skeleton.bone_mut(&bone_name) else {
            log::warn!("bone {bone_name} not found, cannot play {}", sign.name);
            return Err(AnimationError::MissingBone(bone_name));
        };

        key.pose(&mut bone.rotation);
        log::debug!("{bone_name} posed to {:?}", bone.rotation);
        Ok(bone_name)
    }

    /// Reset the root transform and every skeleton bone the pose table
    /// knows. Bones missing from the table keep their rotation. Without a
    /// skeleton only the root is reset.
    pub fn stop(
        &self,
        root: &mut Transform,
        skeleton: Option<&mut Skeleton>,
    ) -> Result<StopReport, AnimationError> {
        *root = Transform {
            scale: [self.config.root_scale; 3],
            ..Transform::default()
        };

        let Some(skeleton) = skeleton else {
            log::warn!("skeleton not loaded yet, only the root transform was reset");
            return Err(AnimationError::SkeletonNotLoaded);
        };

        let mut report = StopReport::default();
        for bone in &mut skeleton.bones {
            match self.pose_table.rest_rotation(&bone.name) {
                Some(rest) => {
                    bone.rotation = rest;
                    report.restored += 1;
                }
                None => report.untouched += 1,
            }
        }

        log::debug!(
            "avatar stopped: {} bones restored, {} left as is",
            report.restored,
            report.untouched
        );
        Ok(report)
    }

    pub fn dispatch(
        &self,
        action: &RigAction,
        rig: Option<&mut Rig>,
    ) -> Result<(), AnimationError> {
        let Some(rig) = rig else {
            log::debug!("rig not loaded yet, dropping {action:?}");
            return Err(AnimationError::RigNotLoaded);
        };

        match action {
            RigAction::Stop => self
                .stop(&mut rig.root, rig.skeleton.as_mut())
                .map(|_| ()),
            RigAction::Sign(name) => {
                let Some(sign) = self.catalog.find(name) else {
                    log::warn!("sign {name} not in catalog");
                    return Err(AnimationError::UnknownSign(name.clone()));
                };
                self.apply_sign(sign, rig.skeleton.as_mut()).map(|_| ())
            }
            RigAction::Perform(sign) => self.apply_sign(sign, rig.skeleton.as_mut()).map(|_| ()),
        }
    }
}
