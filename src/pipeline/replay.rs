use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{HandTracker, PoseTracker};
use crate::types::{Landmark, PoseFrame};

/// One sampling tick as captured from the inference models.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RecordedTick {
    #[serde(default)]
    pub hands: Vec<Vec<Landmark>>,
    #[serde(default)]
    pub poses: Vec<PoseFrame>,
}

/// A JSON-lines landmark recording. Blank lines are ignored.
#[derive(Clone, Debug)]
pub struct Recording {
    ticks: Arc<[RecordedTick]>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open recording {}", path.display()))?;
        let recording = Self::parse(BufReader::new(file))
            .with_context(|| format!("failed to parse recording {}", path.display()))?;
        log::info!(
            "loaded {} recorded ticks from {}",
            recording.len(),
            path.display()
        );
        Ok(recording)
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut ticks = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.context("failed to read recording line")?;
            if line.trim().is_empty() {
                continue;
            }
            let tick: RecordedTick = serde_json::from_str(&line)
                .with_context(|| format!("invalid tick on line {}", index + 1))?;
            ticks.push(tick);
        }
        Ok(Self {
            ticks: ticks.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn hand_tracker(&self, looping: bool) -> ReplayHands {
        ReplayHands(Cursor::new(self.ticks.clone(), looping))
    }

    pub fn pose_tracker(&self, looping: bool) -> ReplayPoses {
        ReplayPoses(Cursor::new(self.ticks.clone(), looping))
    }
}

struct Cursor {
    ticks: Arc<[RecordedTick]>,
    position: usize,
    looping: bool,
}

impl Cursor {
    fn new(ticks: Arc<[RecordedTick]>, looping: bool) -> Self {
        Self {
            ticks,
            position: 0,
            looping,
        }
    }

    fn next(&mut self) -> Option<&RecordedTick> {
        if self.position >= self.ticks.len() {
            if !self.looping || self.ticks.is_empty() {
                return None;
            }
            self.position = 0;
        }
        let tick = &self.ticks[self.position];
        self.position += 1;
        Some(tick)
    }
}

/// Replays recorded hands; reports no detection once the recording ends.
pub struct ReplayHands(Cursor);

impl HandTracker for ReplayHands {
    fn estimate_hands(&mut self) -> Result<Vec<Vec<Landmark>>> {
        Ok(self
            .0
            .next()
            .map(|tick| tick.hands.clone())
            .unwrap_or_default())
    }
}

pub struct ReplayPoses(Cursor);

impl PoseTracker for ReplayPoses {
    fn estimate_poses(&mut self) -> Result<Vec<PoseFrame>> {
        Ok(self
            .0
            .next()
            .map(|tick| tick.poses.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor as IoCursor, Write};

    use super::*;

    const TWO_TICKS: &str = r#"{"hands": [[[1, 2, 0], [3, 4, 0]]], "poses": [[[5, 6], [7, 8]]]}

{"poses": []}
"#;

    #[test]
    fn parses_ticks_and_skips_blank_lines() {
        let recording = Recording::parse(IoCursor::new(TWO_TICKS)).unwrap();
        assert_eq!(recording.len(), 2);
        assert_eq!(recording.ticks[0].hands[0][1], Landmark::planar(3.0, 4.0));
        assert_eq!(recording.ticks[0].poses[0].landmarks.len(), 2);
        assert!(recording.ticks[1].hands.is_empty());
    }

    #[test]
    fn reports_offending_line() {
        let err = Recording::parse(IoCursor::new("{}\nnot json\n")).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn trackers_advance_independently_and_stop_at_end() {
        let recording = Recording::parse(IoCursor::new(TWO_TICKS)).unwrap();
        let mut hands = recording.hand_tracker(false);
        let mut poses = recording.pose_tracker(false);

        assert_eq!(hands.estimate_hands().unwrap().len(), 1);
        assert_eq!(hands.estimate_hands().unwrap().len(), 0);
        assert_eq!(hands.estimate_hands().unwrap().len(), 0);
        assert_eq!(poses.estimate_poses().unwrap().len(), 1);
    }

    #[test]
    fn looping_tracker_wraps_around() {
        let recording = Recording::parse(IoCursor::new(TWO_TICKS)).unwrap();
        let mut hands = recording.hand_tracker(true);
        hands.estimate_hands().unwrap();
        hands.estimate_hands().unwrap();
        assert_eq!(hands.estimate_hands().unwrap().len(), 1);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_TICKS.as_bytes()).unwrap();
        assert_eq!(Recording::load(file.path()).unwrap().len(), 2);
    }
}
