use serde::Deserialize;

use crate::types::{
    FINGER_TIPS_AND_PIPS, GESTURE_COUNT, Gesture, HandFrame, INDEX_MCP, Landmark, THUMB_MCP,
    THUMB_TIP, WRIST,
};

pub const DEFAULT_THRESHOLD: u32 = 3;

/// Which geometric reading `PalmOpen` uses.
///
/// `Literal` is the historical test: all four fingers folded below their PIP
/// joints and the thumb tip across the palm. It contradicts the gesture's
/// name and every frame that satisfies it also satisfies `FistClosed`, so
/// with equal thresholds `FistClosed` always wins the tick. `Extended`
/// checks for spread fingers instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PalmOpenReading {
    #[default]
    Literal,
    Extended,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub fist_closed: u32,
    pub palm_open: u32,
    pub thumb_up: u32,
    /// Cap counters at their threshold so release takes as long as trigger.
    pub saturate: bool,
    pub palm_open_reading: PalmOpenReading,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            fist_closed: DEFAULT_THRESHOLD,
            palm_open: DEFAULT_THRESHOLD,
            thumb_up: DEFAULT_THRESHOLD,
            saturate: false,
            palm_open_reading: PalmOpenReading::Literal,
        }
    }
}

impl ClassifierConfig {
    /// Raise zero thresholds to 1; a zero threshold would recognize a
    /// gesture on every frame, evidence or not.
    pub fn validated(mut self) -> Self {
        for (gesture, threshold) in [
            (Gesture::FistClosed, &mut self.fist_closed),
            (Gesture::PalmOpen, &mut self.palm_open),
            (Gesture::ThumbUp, &mut self.thumb_up),
        ] {
            if *threshold == 0 {
                log::warn!("{} threshold of 0 raised to 1", gesture.display_name());
                *threshold = 1;
            }
        }
        self
    }

    pub fn threshold(&self, gesture: Gesture) -> u32 {
        match gesture {
            Gesture::FistClosed => self.fist_closed,
            Gesture::PalmOpen => self.palm_open,
            Gesture::ThumbUp => self.thumb_up,
        }
    }
}

/// Per-gesture evidence counters. Owned by the caller and threaded through
/// every `classify` call, so each hand or session can keep its own.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfidenceState {
    counters: [u32; GESTURE_COUNT],
}

impl ConfidenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confidence(&self, gesture: Gesture) -> u32 {
        self.counters[gesture.index()]
    }

    fn step(&mut self, gesture: Gesture, evidence: bool, cap: Option<u32>) -> u32 {
        let counter = &mut self.counters[gesture.index()];
        *counter = if evidence {
            let next = counter.saturating_add(1);
            cap.map_or(next, |cap| next.min(cap.max(*counter)))
        } else {
            counter.saturating_sub(1)
        };
        *counter
    }
}

type Predicate = fn(&HandFrame, PalmOpenReading) -> bool;

/// Evaluation order doubles as the tie-break policy: when several gestures
/// are recognized in the same tick, the first one listed drives the rig.
const RULES: [(Gesture, Predicate); 3] = [
    (Gesture::FistClosed, fist_closed_rule),
    (Gesture::PalmOpen, palm_open),
    (Gesture::ThumbUp, thumb_up_rule),
];

fn fist_closed_rule(frame: &HandFrame, _: PalmOpenReading) -> bool {
    fist_closed(frame)
}

fn thumb_up_rule(frame: &HandFrame, _: PalmOpenReading) -> bool {
    thumb_up(frame)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GestureTick {
    /// Every gesture at or above its threshold, in priority order.
    pub recognized: Vec<Gesture>,
    pub primary: Option<Gesture>,
}

#[derive(Clone, Debug, Default)]
pub struct GestureClassifier {
    config: ClassifierConfig,
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let config = config.validated();
        for gesture in Gesture::ALL {
            log::info!(
                "{} threshold: {} ticks",
                gesture.display_name(),
                config.threshold(gesture)
            );
        }
        log::info!(
            "palm open reading: {:?}, saturate: {}",
            config.palm_open_reading,
            config.saturate
        );
        Self { config }
    }

    /// Classify raw landmarks. Fewer than 21 points yields no gesture and
    /// leaves the counters untouched.
    pub fn classify_points(
        &self,
        state: &mut ConfidenceState,
        landmarks: &[Landmark],
    ) -> GestureTick {
        match HandFrame::from_points(landmarks) {
            Ok(frame) => self.classify(state, &frame),
            Err(err) => {
                log::debug!("skipping classification: {err}");
                GestureTick::default()
            }
        }
    }

    pub fn classify(&self, state: &mut ConfidenceState, frame: &HandFrame) -> GestureTick {
        let mut tick = GestureTick::default();

        for (gesture, predicate) in RULES {
            let threshold = self.config.threshold(gesture);
            let cap = self.config.saturate.then_some(threshold);
            let evidence = predicate(frame, self.config.palm_open_reading);
            let confidence = state.step(gesture, evidence, cap);

            log::trace!(
                "{}: evidence={evidence} confidence={confidence}/{threshold}",
                gesture.display_name()
            );

            if confidence >= threshold {
                tick.recognized.push(gesture);
            }
        }

        tick.primary = tick.recognized.first().copied();
        tick
    }
}

fn fingers_folded(frame: &HandFrame) -> bool {
    FINGER_TIPS_AND_PIPS
        .iter()
        .all(|&(tip, pip)| frame.point(tip).y > frame.point(pip).y)
}

fn fingers_extended(frame: &HandFrame) -> bool {
    FINGER_TIPS_AND_PIPS
        .iter()
        .all(|&(tip, pip)| frame.point(tip).y < frame.point(pip).y)
}

pub fn fist_closed(frame: &HandFrame) -> bool {
    fingers_folded(frame)
}

pub fn palm_open(frame: &HandFrame, reading: PalmOpenReading) -> bool {
    let thumb_tip = frame.point(THUMB_TIP);
    let index_mcp = frame.point(INDEX_MCP);

    match reading {
        PalmOpenReading::Literal => fingers_folded(frame) && thumb_tip.x < index_mcp.x,
        PalmOpenReading::Extended => fingers_extended(frame) && thumb_tip.x > index_mcp.x,
    }
}

pub fn thumb_up(frame: &HandFrame) -> bool {
    let thumb_tip = frame.point(THUMB_TIP);
    let thumb_base = frame.point(THUMB_MCP);
    let index_mcp = frame.point(INDEX_MCP);
    let wrist = frame.point(WRIST);

    thumb_tip.y < index_mcp.y && thumb_tip.x > thumb_base.x && wrist.y < thumb_tip.y
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::{HandFrame, Landmark, NUM_HAND_LANDMARKS};

    /// Every landmark at the origin: no predicate holds.
    pub fn neutral_hand() -> Vec<Landmark> {
        vec![Landmark::default(); NUM_HAND_LANDMARKS]
    }

    /// All four fingertips below their PIP joints, thumb tip right of the
    /// index MCP.
    pub fn fist_hand() -> Vec<Landmark> {
        let mut points = neutral_hand();
        for (tip, pip) in [(8, 6), (12, 10), (16, 14), (20, 18)] {
            points[pip] = Landmark::planar(0.0, 100.0);
            points[tip] = Landmark::planar(0.0, 120.0);
        }
        points[5] = Landmark::planar(50.0, 90.0);
        points[4] = Landmark::planar(60.0, 95.0);
        points
    }

    /// Fist with the thumb tip crossing left of the index MCP.
    pub fn thumb_across_hand() -> Vec<Landmark> {
        let mut points = fist_hand();
        points[4] = Landmark::planar(30.0, 95.0);
        points
    }

    /// Thumb tip above the index MCP and right of the thumb MCP, wrist above
    /// the thumb tip.
    pub fn thumb_up_hand() -> Vec<Landmark> {
        let mut points = neutral_hand();
        points[0] = Landmark::planar(40.0, 10.0);
        points[2] = Landmark::planar(40.0, 70.0);
        points[4] = Landmark::planar(55.0, 40.0);
        points[5] = Landmark::planar(50.0, 60.0);
        points
    }

    /// Fingers above their PIP joints with the thumb spread outward.
    pub fn spread_hand() -> Vec<Landmark> {
        let mut points = neutral_hand();
        for (tip, pip) in [(8, 6), (12, 10), (16, 14), (20, 18)] {
            points[pip] = Landmark::planar(0.0, 100.0);
            points[tip] = Landmark::planar(0.0, 40.0);
        }
        points[0] = Landmark::planar(40.0, 150.0);
        points[5] = Landmark::planar(50.0, 110.0);
        points[4] = Landmark::planar(90.0, 100.0);
        points
    }

    pub fn frame(points: &[Landmark]) -> HandFrame {
        HandFrame::from_points(points).expect("fixture has 21 points")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(ClassifierConfig::default())
    }

    #[test]
    fn predicates_match_fixtures() {
        assert!(fist_closed(&frame(&fist_hand())));
        assert!(!fist_closed(&frame(&neutral_hand())));
        assert!(thumb_up(&frame(&thumb_up_hand())));
        assert!(!thumb_up(&frame(&fist_hand())));
        assert!(palm_open(
            &frame(&thumb_across_hand()),
            PalmOpenReading::Literal
        ));
        assert!(!palm_open(&frame(&fist_hand()), PalmOpenReading::Literal));
        assert!(palm_open(&frame(&spread_hand()), PalmOpenReading::Extended));
        assert!(!palm_open(&frame(&spread_hand()), PalmOpenReading::Literal));
    }

    #[test]
    fn fist_recognized_on_third_tick() {
        let classifier = classifier();
        let mut state = ConfidenceState::new();
        let fist = frame(&fist_hand());

        assert_eq!(classifier.classify(&mut state, &fist).primary, None);
        assert_eq!(classifier.classify(&mut state, &fist).primary, None);
        assert_eq!(
            classifier.classify(&mut state, &fist).primary,
            Some(Gesture::FistClosed)
        );
        assert_eq!(state.confidence(Gesture::FistClosed), 3);
    }

    #[test]
    fn single_open_frame_requires_compensating_evidence() {
        let classifier = classifier();
        let mut state = ConfidenceState::new();
        let fist = frame(&fist_hand());
        let open = frame(&neutral_hand());

        classifier.classify(&mut state, &fist);
        classifier.classify(&mut state, &fist);
        classifier.classify(&mut state, &open);
        assert_eq!(state.confidence(Gesture::FistClosed), 1);

        assert_eq!(classifier.classify(&mut state, &fist).primary, None);
        assert_eq!(
            classifier.classify(&mut state, &fist).primary,
            Some(Gesture::FistClosed)
        );
    }

    #[test]
    fn counters_move_by_exactly_one_and_floor_at_zero() {
        let classifier = classifier();
        let mut state = ConfidenceState::new();
        let sequence = [
            fist_hand(),
            neutral_hand(),
            neutral_hand(),
            thumb_up_hand(),
            thumb_up_hand(),
            fist_hand(),
            fist_hand(),
            fist_hand(),
            fist_hand(),
            neutral_hand(),
            thumb_across_hand(),
        ];

        for points in &sequence {
            let before = state.clone();
            classifier.classify(&mut state, &frame(points));
            for gesture in Gesture::ALL {
                let old = before.confidence(gesture);
                let new = state.confidence(gesture);
                assert!(
                    new == old + 1 || new == old.saturating_sub(1),
                    "{gesture:?}: {old} -> {new}"
                );
            }
        }
    }

    #[test]
    fn short_frame_leaves_counters_untouched() {
        let classifier = classifier();
        let mut state = ConfidenceState::new();
        classifier.classify_points(&mut state, &fist_hand());
        let before = state.clone();

        let tick = classifier.classify_points(&mut state, &fist_hand()[..20]);
        assert_eq!(tick, GestureTick::default());
        assert_eq!(state, before);
    }

    #[test]
    fn fist_outranks_palm_when_both_recognized() {
        let classifier = classifier();
        let mut state = ConfidenceState::new();
        let points = thumb_across_hand();

        let mut tick = GestureTick::default();
        for _ in 0..3 {
            tick = classifier.classify_points(&mut state, &points);
        }
        assert_eq!(tick.recognized, vec![Gesture::FistClosed, Gesture::PalmOpen]);
        assert_eq!(tick.primary, Some(Gesture::FistClosed));
    }

    #[test]
    fn lower_palm_threshold_lets_palm_win_first() {
        let classifier = GestureClassifier::new(ClassifierConfig {
            palm_open: 2,
            ..ClassifierConfig::default()
        });
        let mut state = ConfidenceState::new();
        let points = thumb_across_hand();

        classifier.classify_points(&mut state, &points);
        let tick = classifier.classify_points(&mut state, &points);
        assert_eq!(tick.primary, Some(Gesture::PalmOpen));
    }

    #[test]
    fn thumb_up_released_after_sustained_absence() {
        let classifier = classifier();
        let mut state = ConfidenceState::new();
        for _ in 0..4 {
            classifier.classify_points(&mut state, &thumb_up_hand());
        }
        assert_eq!(state.confidence(Gesture::ThumbUp), 4);

        let tick = classifier.classify_points(&mut state, &neutral_hand());
        assert_eq!(tick.primary, Some(Gesture::ThumbUp));
        let tick = classifier.classify_points(&mut state, &neutral_hand());
        assert_eq!(tick.primary, None);
    }

    #[test]
    fn saturation_caps_counter_at_threshold() {
        let classifier = GestureClassifier::new(ClassifierConfig {
            saturate: true,
            ..ClassifierConfig::default()
        });
        let mut state = ConfidenceState::new();
        for _ in 0..10 {
            classifier.classify_points(&mut state, &fist_hand());
        }
        assert_eq!(state.confidence(Gesture::FistClosed), 3);

        let tick = classifier.classify_points(&mut state, &neutral_hand());
        assert_eq!(tick.primary, None);
    }

    #[test]
    fn zero_threshold_is_raised_to_one() {
        let classifier = GestureClassifier::new(ClassifierConfig {
            thumb_up: 0,
            ..ClassifierConfig::default()
        });
        let mut state = ConfidenceState::new();

        let tick = classifier.classify_points(&mut state, &neutral_hand());
        assert_eq!(tick.primary, None);

        let tick = classifier.classify_points(&mut state, &thumb_up_hand());
        assert_eq!(tick.primary, Some(Gesture::ThumbUp));
    }

    #[test]
    fn extended_reading_recognizes_spread_hand() {
        let classifier = GestureClassifier::new(ClassifierConfig {
            palm_open_reading: PalmOpenReading::Extended,
            ..ClassifierConfig::default()
        });
        let mut state = ConfidenceState::new();
        let mut tick = GestureTick::default();
        for _ in 0..3 {
            tick = classifier.classify_points(&mut state, &spread_hand());
        }
        assert_eq!(tick.primary, Some(Gesture::PalmOpen));
    }
}
