//! Durable record of what has already been produced.
//!
//! Serialized shape:
//!
//! ```json
//! {
//!   "hrrr": {
//!     "run_time": "2024-01-15T12:00:00Z",
//!     "display_name": "HRRR",
//!     "frames": [{"fxx": 0, "valid": "2024-01-15T12:00:00Z", "temp": "hrrr/temp/f000.png"}]
//!   },
//!   "rrfs": null
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Model id -> latest run record, or `None` when discovery failed.
pub type StatusStore = BTreeMap<String, Option<RunRecord>>;

/// One rendered forecast hour. Its presence marks the hour as done, whatever
/// subset of variables succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub fxx: u32,
    pub valid: String,
    /// Variable key -> artifact reference
    #[serde(flatten)]
    pub artifacts: BTreeMap<String, String>,
}

impl FrameRecord {
    pub fn new(fxx: u32, valid: impl Into<String>) -> Self {
        Self {
            fxx,
            valid: valid.into(),
            artifacts: BTreeMap::new(),
        }
    }
}

/// Frames produced for the current run of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_time: String,
    pub display_name: String,
    #[serde(default)]
    pub frames: Vec<FrameRecord>,
}

impl RunRecord {
    pub fn new(run_time: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            run_time: run_time.into(),
            display_name: display_name.into(),
            frames: Vec::new(),
        }
    }

    pub fn has_frame(&self, fxx: u32) -> bool {
        self.frames.iter().any(|f| f.fxx == fxx)
    }

    /// Replace the frame for the same hour in place, or append; frames stay
    /// sorted by forecast hour.
    pub fn merge_frame(&mut self, frame: FrameRecord) {
        match self.frames.iter_mut().find(|f| f.fxx == frame.fxx) {
            Some(existing) => *existing = frame,
            None => self.frames.push(frame),
        }
        self.frames.sort_by_key(|f| f.fxx);
    }

    /// Restore ordering and uniqueness after loading a hand-edited file.
    /// The last occurrence of a duplicated hour wins.
    pub fn normalize(&mut self) {
        let frames = std::mem::take(&mut self.frames);
        for frame in frames {
            self.merge_frame(frame);
        }
    }
}
