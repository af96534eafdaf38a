mod animation;
#[cfg(feature = "camera")]
mod camera;
mod config;
mod gesture;
#[cfg(feature = "camera")]
mod model_download;
mod pipeline;
mod rig;
mod types;

use std::{
    io::{self, BufRead},
    sync::Arc,
};

use anyhow::Result;
use crossbeam_channel::{Sender, unbounded};

use animation::{AnimationController, RigAction, SignCatalog};
use config::{Config, SourceConfig, SourceKind};
use gesture::GestureClassifier;
use pipeline::{Command, Recording, SamplingLoop, Trackers};
use rig::{DefaultPoseTable, empty_shared_rig, spawn_rig_loader};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);

    let pose_table = load_pose_table(&config);
    if pose_table.is_empty() {
        log::warn!("default pose table is empty, stop will only reset the root");
    } else {
        log::info!("default pose table: {} bones", pose_table.len());
    }

    let catalog = config.sign_catalog();
    print_catalog(&catalog);

    let rig = empty_shared_rig();
    let loader = spawn_rig_loader(
        config.rig.skeleton_path.clone(),
        config.rig.controller.root_scale,
        rig.clone(),
    );

    let sampling = SamplingLoop::new(
        GestureClassifier::new(config.classifier.clone()),
        AnimationController::new(
            Arc::new(pose_table),
            catalog,
            config.rig.controller.clone(),
        ),
        rig,
    );

    let trackers = build_trackers(&config.source);
    let (command_tx, command_rx) = unbounded();
    let sampler = pipeline::start_sampling_loop(
        sampling,
        config.sampling.interval(),
        trackers,
        command_rx,
    );

    read_commands(&command_tx);
    let _ = command_tx.send(Command::Shutdown);

    let _ = loader.join();
    let _ = sampler.join();
    Ok(())
}

fn load_pose_table(config: &Config) -> DefaultPoseTable {
    let builtin = || DefaultPoseTable::builtin(&config.rig.controller.bone_prefix);
    match &config.rig.pose_table_path {
        Some(path) => DefaultPoseTable::load(path).unwrap_or_else(|err| {
            log::error!("falling back to the built-in pose table: {err:?}");
            builtin()
        }),
        None => builtin(),
    }
}

fn print_catalog(catalog: &SignCatalog) {
    println!("Signs:");
    for sign in catalog.signs() {
        println!("  {} ({})", sign.name, sign.animation);
    }
    println!("Type a sign name, `stop`, or `quit`.");
}

/// Each tracker starts on its own; one failing leaves the other running.
fn build_trackers(source: &SourceConfig) -> Trackers {
    match source.kind {
        SourceKind::Replay => match Recording::load(&source.replay_path) {
            Ok(recording) if recording.is_empty() => {
                log::warn!("landmark recording is empty, nothing to classify");
                Trackers::default()
            }
            Ok(recording) => Trackers {
                hand: Some(Box::new(recording.hand_tracker(source.replay_loop))),
                pose: Some(Box::new(recording.pose_tracker(source.replay_loop))),
            },
            Err(err) => {
                log::error!("landmark recording unavailable: {err:?}");
                Trackers::default()
            }
        },
        SourceKind::Camera => camera_trackers(source),
    }
}

#[cfg(feature = "camera")]
fn camera_trackers(source: &SourceConfig) -> Trackers {
    let hand = match camera::CameraHandTracker::new(source.camera_index, &source.model_path) {
        Ok(tracker) => Some(Box::new(tracker) as Box<dyn pipeline::HandTracker>),
        Err(err) => {
            log::error!("error initializing hand tracking: {err:?}");
            None
        }
    };
    log::warn!("no pose model for the camera source, pose tracking disabled");
    Trackers { hand, pose: None }
}

#[cfg(not(feature = "camera"))]
fn camera_trackers(source: &SourceConfig) -> Trackers {
    log::error!(
        "camera {} with model {} requested, but built without the `camera` feature",
        source.camera_index,
        source.model_path.display()
    );
    Trackers::default()
}

fn read_commands(command_tx: &Sender<Command>) {
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        let input = line.trim();
        let command = match input {
            "" => continue,
            "quit" | "exit" => break,
            "stop" => Command::Rig(RigAction::Stop),
            name => Command::Rig(RigAction::Sign(name.to_string())),
        };
        if command_tx.send(command).is_err() {
            break;
        }
    }
}
