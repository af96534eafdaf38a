pub mod replay;

use std::{thread, time::Duration};

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};

use crate::{
    animation::{AnimationController, AnimationError, RigAction},
    gesture::{ConfidenceState, GestureClassifier},
    rig::SharedRig,
    types::{Gesture, Landmark, PoseFrame},
};

pub use replay::Recording;

/// Source of hand landmarks. An empty result means nothing was detected.
pub trait HandTracker: Send + 'static {
    fn estimate_hands(&mut self) -> anyhow::Result<Vec<Vec<Landmark>>>;
}

/// Source of body pose landmarks. An empty result means nothing was detected.
pub trait PoseTracker: Send + 'static {
    fn estimate_poses(&mut self) -> anyhow::Result<Vec<PoseFrame>>;
}

/// Either tracker may be missing when its startup failed.
#[derive(Default)]
pub struct Trackers {
    pub hand: Option<Box<dyn HandTracker>>,
    pub pose: Option<Box<dyn PoseTracker>>,
}

impl Trackers {
    /// Only the first detection of each kind is kept.
    fn sample(&mut self) -> LandmarkSample {
        let hand = self.hand.as_mut().and_then(|tracker| {
            tracker
                .estimate_hands()
                .map_err(|err| log::warn!("hand estimation failed: {err:?}"))
                .ok()
                .and_then(|hands| hands.into_iter().next())
        });

        let pose = self.pose.as_mut().and_then(|tracker| {
            tracker
                .estimate_poses()
                .map_err(|err| log::warn!("pose estimation failed: {err:?}"))
                .ok()
                .and_then(|poses| poses.into_iter().next())
        });

        LandmarkSample { hand, pose }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSample {
    pub hand: Option<Vec<Landmark>>,
    pub pose: Option<PoseFrame>,
}

/// Requests coming from the UI side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Rig(RigAction),
    Shutdown,
}

fn run_worker_loop(
    mut trackers: Trackers,
    request_rx: Receiver<()>,
    sample_tx: Sender<LandmarkSample>,
) {
    while request_rx.recv().is_ok() {
        let sample = trackers.sample();
        if sample_tx.send(sample).is_err() {
            break;
        }
    }
}

pub fn start_inference_worker(
    trackers: Trackers,
    request_rx: Receiver<()>,
    sample_tx: Sender<LandmarkSample>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || run_worker_loop(trackers, request_rx, sample_tx))
}

/// Keeps at most one inference request in flight. A tick that fires while
/// a request is outstanding is dropped, not queued.
#[derive(Debug, Default)]
pub struct TickGate {
    pending: bool,
    skipped: u64,
}

impl TickGate {
    /// Returns whether a new request should be issued for this tick.
    pub fn on_tick(&mut self) -> bool {
        if self.pending {
            self.skipped += 1;
            false
        } else {
            self.pending = true;
            true
        }
    }

    pub fn on_sample(&mut self) {
        self.pending = false;
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// Owns the classifier state and is the only writer of the rig.
pub struct SamplingLoop {
    classifier: GestureClassifier,
    state: ConfidenceState,
    controller: AnimationController,
    rig: SharedRig,
    last_primary: Option<Gesture>,
}

impl SamplingLoop {
    pub fn new(
        classifier: GestureClassifier,
        controller: AnimationController,
        rig: SharedRig,
    ) -> Self {
        Self {
            classifier,
            state: ConfidenceState::new(),
            controller,
            rig,
            last_primary: None,
        }
    }

    pub fn handle_sample(&mut self, sample: LandmarkSample) -> Option<Gesture> {
        if let Some(pose) = &sample.pose {
            log::trace!(
                "pose: {} landmarks, {} connections visible, shoulders={:?} hips={:?}",
                pose.landmarks.len(),
                pose.visible_connections().count(),
                pose.shoulders(),
                pose.hips()
            );
        }

        let Some(hand) = sample.hand else {
            log::debug!("no hands detected");
            return None;
        };

        let primary = self.classifier.classify_points(&mut self.state, &hand).primary;

        if primary != self.last_primary {
            match primary {
                Some(gesture) => log::info!(
                    "{}{} detected -> {:?}",
                    gesture.emoji(),
                    gesture.display_name(),
                    RigAction::for_gesture(gesture)
                ),
                None => log::info!("gesture released"),
            }
            self.last_primary = primary;
        }

        if let Some(gesture) = primary {
            match self.apply(&RigAction::for_gesture(gesture)) {
                Ok(()) | Err(AnimationError::RigNotLoaded) => {}
                Err(err) => log::warn!("{} not applied: {err}", gesture.display_name()),
            }
        }

        primary
    }

    pub fn handle_command(&mut self, action: &RigAction) -> Result<(), AnimationError> {
        log::info!("ui requested {action:?}");
        self.apply(action)
    }

    fn apply(&self, action: &RigAction) -> Result<(), AnimationError> {
        let mut guard = self
            .rig
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.controller.dispatch(action, guard.as_mut())
    }

    pub fn run(mut self, interval: Duration, trackers: Trackers, commands: Receiver<Command>) {
        let (request_tx, request_rx) = bounded::<()>(1);
        let (sample_tx, sample_rx) = bounded::<LandmarkSample>(1);
        let worker = start_inference_worker(trackers, request_rx, sample_tx);
        let ticker = tick(interval);
        let mut gate = TickGate::default();

        log::info!("sampling every {interval:?}");

        loop {
            select! {
                recv(ticker) -> _ => {
                    if !gate.on_tick() {
                        log::trace!("inference still pending, tick skipped");
                    } else if request_tx.send(()).is_err() {
                        log::error!("inference worker stopped");
                        break;
                    }
                }
                recv(sample_rx) -> sample => match sample {
                    Ok(sample) => {
                        gate.on_sample();
                        self.handle_sample(sample);
                    }
                    Err(_) => {
                        log::error!("inference worker disconnected");
                        break;
                    }
                },
                recv(commands) -> command => match command {
                    Ok(Command::Rig(action)) => {
                        let _ = self.handle_command(&action);
                    }
                    Ok(Command::Shutdown) | Err(_) => break,
                },
            }
        }

        log::info!("sampling loop stopped ({} ticks skipped)", gate.skipped());
        drop(request_tx);
        let _ = worker.join();
    }
}

#[cfg(test)]
impl SamplingLoop {
    pub fn state(&self) -> &ConfidenceState {
        &self.state
    }
}

pub fn start_sampling_loop(
    sampling: SamplingLoop,
    interval: Duration,
    trackers: Trackers,
    commands: Receiver<Command>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || sampling.run(interval, trackers, commands))
}
