//! Modal-group classification.
//!
//! Every executable word belongs to at most one modal group, and a block
//! may carry at most one member of each group. The interpreter pulls words
//! out group by group, in priority order.

use thiserror::Error;

use super::{Block, Word};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("multiple words from modal group {group} in one block")]
pub struct ModalError {
    pub group: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalGroup {
    Motion,
    PlaneSelection,
    DistanceMode,
    ArcDistanceMode,
    FeedRateMode,
    Units,
    CutterCompensation,
    ToolLength,
    CoordinateSystem,
    ControlMode,
    Polar,
    Stopping,
    ToolChange,
    Spindle,
    Coolant,
    NonModal,
}

const fn g(command: f64) -> Word {
    Word::new('G', command)
}

const fn m(command: f64) -> Word {
    Word::new('M', command)
}

const MOTION: &[Word] = &[
    g(0.0),
    g(1.0),
    g(2.0),
    g(3.0),
    g(33.0),
    g(38.2),
    g(38.3),
    g(38.4),
    g(38.5),
    g(73.0),
    g(76.0),
    g(80.0),
    g(81.0),
    g(82.0),
    g(83.0),
    g(84.0),
    g(85.0),
    g(86.0),
    g(87.0),
    g(88.0),
    g(89.0),
];

const PLANE_SELECTION: &[Word] = &[g(17.0), g(18.0), g(19.0), g(17.1), g(18.1), g(19.1)];
const DISTANCE_MODE: &[Word] = &[g(90.0), g(91.0)];
const ARC_DISTANCE_MODE: &[Word] = &[g(90.1), g(91.1)];
const FEED_RATE_MODE: &[Word] = &[g(93.0), g(94.0), g(95.0)];
const UNITS: &[Word] = &[g(20.0), g(21.0)];
const CUTTER_COMPENSATION: &[Word] = &[g(40.0), g(41.0), g(41.1), g(42.0), g(42.1)];
const TOOL_LENGTH: &[Word] = &[g(43.0), g(43.1), g(49.0)];

const COORDINATE_SYSTEM: &[Word] = &[
    g(54.0),
    g(55.0),
    g(56.0),
    g(57.0),
    g(58.0),
    g(59.0),
    g(59.1),
    g(59.2),
    g(59.3),
];

const CONTROL_MODE: &[Word] = &[g(61.0), g(61.1), g(64.0)];
const POLAR: &[Word] = &[g(15.0), g(16.0)];
const STOPPING: &[Word] = &[m(0.0), m(1.0), m(2.0), m(30.0), m(60.0)];
const TOOL_CHANGE: &[Word] = &[m(6.0), m(61.0)];
const SPINDLE: &[Word] = &[m(3.0), m(4.0), m(5.0)];
const COOLANT: &[Word] = &[m(7.0), m(8.0), m(9.0)];

const NON_MODAL: &[Word] = &[
    g(4.0),
    g(10.0),
    g(28.0),
    g(28.1),
    g(30.0),
    g(30.1),
    g(53.0),
    g(92.0),
    g(92.1),
    g(92.2),
    g(92.3),
];

impl ModalGroup {
    pub fn members(self) -> &'static [Word] {
        match self {
            ModalGroup::Motion => MOTION,
            ModalGroup::PlaneSelection => PLANE_SELECTION,
            ModalGroup::DistanceMode => DISTANCE_MODE,
            ModalGroup::ArcDistanceMode => ARC_DISTANCE_MODE,
            ModalGroup::FeedRateMode => FEED_RATE_MODE,
            ModalGroup::Units => UNITS,
            ModalGroup::CutterCompensation => CUTTER_COMPENSATION,
            ModalGroup::ToolLength => TOOL_LENGTH,
            ModalGroup::CoordinateSystem => COORDINATE_SYSTEM,
            ModalGroup::ControlMode => CONTROL_MODE,
            ModalGroup::Polar => POLAR,
            ModalGroup::Stopping => STOPPING,
            ModalGroup::ToolChange => TOOL_CHANGE,
            ModalGroup::Spindle => SPINDLE,
            ModalGroup::Coolant => COOLANT,
            ModalGroup::NonModal => NON_MODAL,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModalGroup::Motion => "motion",
            ModalGroup::PlaneSelection => "plane-selection",
            ModalGroup::DistanceMode => "distance-mode",
            ModalGroup::ArcDistanceMode => "arc-distance-mode",
            ModalGroup::FeedRateMode => "feed-rate-mode",
            ModalGroup::Units => "units",
            ModalGroup::CutterCompensation => "cutter-compensation",
            ModalGroup::ToolLength => "tool-length",
            ModalGroup::CoordinateSystem => "coordinate-system",
            ModalGroup::ControlMode => "control-mode",
            ModalGroup::Polar => "polar",
            ModalGroup::Stopping => "stopping",
            ModalGroup::ToolChange => "tool-change",
            ModalGroup::Spindle => "spindle",
            ModalGroup::Coolant => "coolant",
            ModalGroup::NonModal => "non-modal",
        }
    }

    pub fn contains(self, word: &Word) -> bool {
        self.members().contains(word)
    }
}

impl Block {
    /// The block's member of `group`, if any. Two distinct members of the
    /// same group in one block is an error.
    pub fn get_modal(&self, group: ModalGroup) -> Result<Option<Word>, ModalError> {
        let mut found: Option<Word> = None;
        for w in self.words() {
            if group.contains(w) {
                match found {
                    Some(prev) if prev != *w => {
                        return Err(ModalError { group: group.name() })
                    }
                    _ => found = Some(*w),
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::parser::parse;

    #[test]
    fn classifies_words() {
        assert!(ModalGroup::Motion.contains(&g(38.2)));
        assert!(ModalGroup::NonModal.contains(&g(92.2)));
        assert!(ModalGroup::CoordinateSystem.contains(&g(59.3)));
        assert!(!ModalGroup::Motion.contains(&g(4.0)));
        assert!(ModalGroup::ToolChange.contains(&m(61.0)));
    }

    #[test]
    fn modal_lookup_and_conflict() {
        let doc = parse("G1 X5 M3\nG1 G0 X5").unwrap();
        let motion = doc.blocks[0].get_modal(ModalGroup::Motion).unwrap();
        assert_eq!(motion, Some(g(1.0)));
        assert_eq!(doc.blocks[0].get_modal(ModalGroup::Coolant).unwrap(), None);

        let err = doc.blocks[1].get_modal(ModalGroup::Motion).unwrap_err();
        assert_eq!(err.group, "motion");
    }

    #[test]
    fn repeated_identical_member_is_tolerated() {
        let doc = parse("G1 G1 X5").unwrap();
        let motion = doc.blocks[0].get_modal(ModalGroup::Motion).unwrap();
        assert_eq!(motion, Some(g(1.0)));
    }
}
