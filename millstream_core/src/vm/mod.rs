//! The interpreting machine model.
//!
//! [`Machine::process`] executes a parsed [`Document`] block by block,
//! resolving modal state in RS-274 priority order and appending every
//! resulting motion to the position trace. Arcs are tessellated into
//! linear segments on the way in, so downstream consumers only ever see
//! `Rapid`, `Linear`, `Dwell` and `None` moves.

pub mod coordinates;
pub mod positioning;
pub mod statement;
pub mod transform;

use std::fmt::Write as _;

use glam::DVec3;
use thiserror::Error;

use crate::gcode::modal::ModalGroup;
use crate::gcode::{Block, Document, Word};

pub use coordinates::CoordinateSystem;
pub use statement::Statement;
pub use transform::MachineInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    None,
    Rapid,
    Linear,
    CwArc,
    CcwArc,
    Dwell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    UnitsPerMin,
    UnitsPerRev,
    InverseTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutterCompensation {
    None,
    Outer,
    Inner,
}

/// Arc plane selected by G17/G18/G19.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Xy,
    Xz,
    Yz,
}

/// Modal machine state, snapshotted into every [`Position`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State {
    pub feedrate: f64,
    pub spindle_speed: f64,
    pub move_mode: MoveMode,
    pub feed_mode: FeedMode,
    pub spindle_enabled: bool,
    pub spindle_clockwise: bool,
    pub flood_coolant: bool,
    pub mist_coolant: bool,
    pub tool_index: i32,
    pub tool_length_index: i32,
    pub cutter_compensation: CutterCompensation,
    pub dwell_time: f64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            feedrate: 0.0,
            spindle_speed: 0.0,
            move_mode: MoveMode::None,
            feed_mode: FeedMode::UnitsPerMin,
            spindle_enabled: false,
            spindle_clockwise: false,
            flood_coolant: false,
            mist_coolant: false,
            tool_index: -1,
            tool_length_index: -1,
            cutter_compensation: CutterCompensation::None,
            dwell_time: 0.0,
        }
    }
}

/// One entry of the position trace: machine coordinates in millimetres
/// plus the state in force when the move was issued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub state: State,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            state: State::default(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl Position {
    pub fn vector(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    pub fn with_vector(mut self, v: DVec3) -> Self {
        self.x = v.x;
        self.y = v.y;
        self.z = v.z;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmErrorKind {
    #[error("multiple {address} words in one block")]
    DuplicateWord { address: char },
    #[error("multiple words from modal group {0} in one block")]
    ModalConflict(&'static str),
    #[error("unsupported word {0}")]
    Unsupported(String),
    #[error("axis word {0} is outside the supported XYZ volume")]
    UnsupportedAxis(char),
    #[error("negative feedrate {0}")]
    NegativeFeedrate(f64),
    #[error("negative spindle speed {0}")]
    NegativeSpindleSpeed(f64),
    #[error("negative tool index {0}")]
    NegativeTool(f64),
    #[error("negative tool length index {0}")]
    NegativeToolLength(f64),
    #[error("tool change requested before any T word")]
    ToolChangeWithoutTool,
    #[error("M61 requires a Q tool number")]
    ToolSetWithoutNumber,
    #[error("G43 requires an H length index")]
    ToolLengthWithoutIndex,
    #[error("dwell without a P time word")]
    DwellWithoutTime,
    #[error("negative dwell time {0}")]
    NegativeDwell(f64),
    #[error("work offset slot {0} is outside 1 through 9")]
    OffsetSlotInvalid(f64),
    #[error("G10 forms other than L2 are not supported")]
    OffsetFormUnsupported,
    #[error("G92 without axis words")]
    OffsetWithoutAxes,
    #[error("polar coordinates are not supported")]
    PolarUnsupported,
    #[error("feedrate required in inverse-time mode")]
    MissingInverseTimeFeedrate,
    #[error("move issued with no active motion mode")]
    NoMotionMode,
    #[error("machine coordinates cannot be combined with cutter compensation")]
    OverrideWithCutterCompensation,
    #[error("machine coordinates cannot be combined with arc motion")]
    ArcUnderOverride,
    #[error("coordinate system change with active cutter compensation")]
    CoordinateChangeWithCutterCompensation,
    #[error("arc with zero radius")]
    ZeroRadiusArc,
    #[error("arc radius deviation of {percent:.3} percent and {millimetres:.3} mm")]
    ArcRadiusMismatch { percent: f64, millimetres: f64 },
    #[error("unhandled words in block: {0}")]
    ResidualWords(String),
}

/// A [`VmErrorKind`] located at its 1-based source line.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("line {line}: {kind}")]
pub struct VmError {
    pub line: usize,
    pub kind: VmErrorKind,
}

const INCH_TO_MM: f64 = 25.4;
const UNSUPPORTED_AXES: [char; 6] = ['A', 'B', 'C', 'U', 'V', 'W'];

/// The interpreting virtual machine.
#[derive(Debug, Clone)]
pub struct Machine {
    pub state: State,
    pub positions: Vec<Position>,
    pub imperial: bool,
    pub absolute_move: bool,
    pub absolute_arc: bool,
    pub move_plane: Plane,
    pub max_arc_deviation: f64,
    pub min_arc_line_length: f64,
    pub tolerance: f64,
    /// Warn about residual words instead of failing the block.
    pub lenient: bool,
    pub next_tool: i32,
    pub coordinates: CoordinateSystem,
    pub stored_position_1: DVec3,
    pub stored_position_2: DVec3,
    completed: bool,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            state: State::default(),
            positions: vec![Position::default()],
            imperial: false,
            absolute_move: true,
            absolute_arc: false,
            move_plane: Plane::Xy,
            max_arc_deviation: 0.002,
            min_arc_line_length: 0.01,
            tolerance: 0.001,
            lenient: false,
            next_tool: -1,
            coordinates: CoordinateSystem::default(),
            stored_position_1: DVec3::ZERO,
            stored_position_2: DVec3::ZERO,
            completed: false,
        }
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn current_position(&self) -> Position {
        *self.positions.last().expect("trace always holds the origin")
    }

    fn unit_scale(&self) -> f64 {
        if self.imperial {
            INCH_TO_MM
        } else {
            1.0
        }
    }

    /// Executes every block of `doc`, appending to the position trace.
    pub fn process(&mut self, doc: &Document) -> Result<(), VmError> {
        for (idx, block) in doc.blocks.iter().enumerate() {
            if block.block_delete || self.completed {
                continue;
            }
            self.execute_block(block)
                .map_err(|kind| VmError { line: idx + 1, kind })?;
        }
        self.finalize();
        Ok(())
    }

    /// Appends a trailing `MoveMode::None` snapshot when state changed
    /// after the last motion, so generators see the final state.
    fn finalize(&mut self) {
        let last = self.current_position();
        if self.state != last.state {
            let mut state = self.state;
            state.move_mode = MoveMode::None;
            self.positions.push(Position { state, ..last });
        }
    }

    fn execute_block(&mut self, block: &Block) -> Result<(), VmErrorKind> {
        let mut stmt = Statement::from_block(block);

        for axis in UNSUPPORTED_AXES {
            if stmt.has_word(axis) {
                return Err(VmErrorKind::UnsupportedAxis(axis));
            }
        }

        // Line numbers and program names carry no meaning here.
        stmt.take_all('N');
        stmt.take_all('O');

        if let Some(w) = stmt.take_modal(ModalGroup::FeedRateMode)? {
            let mode = match decicode(w.command) {
                930 => FeedMode::InverseTime,
                940 => FeedMode::UnitsPerMin,
                950 => FeedMode::UnitsPerRev,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            };
            if mode != self.state.feed_mode {
                self.state.feed_mode = mode;
                self.state.feedrate = 0.0;
            }
        }

        let mut feed_worded = false;
        if let Some(f) = stmt.take_word('F')? {
            if f < 0.0 {
                return Err(VmErrorKind::NegativeFeedrate(f));
            }
            self.state.feedrate = f * self.unit_scale();
            feed_worded = true;
        }

        if let Some(s) = stmt.take_word('S')? {
            if s < 0.0 {
                return Err(VmErrorKind::NegativeSpindleSpeed(s));
            }
            self.state.spindle_speed = s;
        }

        if let Some(t) = stmt.take_word('T')? {
            if t < 0.0 {
                return Err(VmErrorKind::NegativeTool(t));
            }
            self.next_tool = t as i32;
        }

        if let Some(w) = stmt.take_modal(ModalGroup::ToolChange)? {
            match decicode(w.command) {
                60 => {
                    if self.next_tool < 0 {
                        return Err(VmErrorKind::ToolChangeWithoutTool);
                    }
                    self.state.tool_index = self.next_tool;
                }
                610 => {
                    let q = stmt
                        .take_word('Q')?
                        .ok_or(VmErrorKind::ToolSetWithoutNumber)?;
                    if q < 0.0 {
                        return Err(VmErrorKind::NegativeTool(q));
                    }
                    self.state.tool_index = q as i32;
                }
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::Spindle)? {
            match decicode(w.command) {
                30 => {
                    self.state.spindle_enabled = true;
                    self.state.spindle_clockwise = true;
                }
                40 => {
                    self.state.spindle_enabled = true;
                    self.state.spindle_clockwise = false;
                }
                50 => self.state.spindle_enabled = false,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::Coolant)? {
            match decicode(w.command) {
                70 => self.state.mist_coolant = true,
                80 => self.state.flood_coolant = true,
                90 => {
                    self.state.mist_coolant = false;
                    self.state.flood_coolant = false;
                }
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::Polar)? {
            match decicode(w.command) {
                150 => {} // cartesian input, the only mode we run in
                _ => return Err(VmErrorKind::PolarUnsupported),
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::PlaneSelection)? {
            self.move_plane = match decicode(w.command) {
                170 => Plane::Xy,
                180 => Plane::Xz,
                190 => Plane::Yz,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            };
        }

        if let Some(w) = stmt.take_modal(ModalGroup::Units)? {
            match decicode(w.command) {
                200 => self.imperial = true,
                210 => self.imperial = false,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::CutterCompensation)? {
            self.state.cutter_compensation = match decicode(w.command) {
                400 => CutterCompensation::None,
                410 | 411 => CutterCompensation::Outer,
                420 | 421 => CutterCompensation::Inner,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            };
        }

        if let Some(w) = stmt.take_modal(ModalGroup::ToolLength)? {
            match decicode(w.command) {
                430 => {
                    let h = stmt
                        .take_word('H')?
                        .ok_or(VmErrorKind::ToolLengthWithoutIndex)?;
                    if h < 0.0 {
                        return Err(VmErrorKind::NegativeToolLength(h));
                    }
                    self.state.tool_length_index = h as i32;
                }
                490 => self.state.tool_length_index = -1,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::CoordinateSystem)? {
            if self.state.cutter_compensation != CutterCompensation::None {
                return Err(VmErrorKind::CoordinateChangeWithCutterCompensation);
            }
            let slot = match decicode(w.command) {
                540 => 1,
                550 => 2,
                560 => 3,
                570 => 4,
                580 => 5,
                590 => 6,
                591 => 7,
                592 => 8,
                593 => 9,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            };
            self.coordinates.select(slot);
        }

        if let Some(w) = stmt.take_modal(ModalGroup::DistanceMode)? {
            match decicode(w.command) {
                900 => self.absolute_move = true,
                910 => self.absolute_move = false,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::ArcDistanceMode)? {
            match decicode(w.command) {
                901 => self.absolute_arc = true,
                911 => self.absolute_arc = false,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::ControlMode)? {
            // Exact-stop versus blending does not change the trace; G64's
            // optional blend tolerance rides along with it.
            if decicode(w.command) == 640 {
                stmt.take_word('P')?;
            }
        }

        if let Some(w) = stmt.take_modal(ModalGroup::NonModal)? {
            self.run_non_modal(&w, &mut stmt)?;
        }

        if let Some(w) = stmt.take_modal(ModalGroup::Motion)? {
            self.state.move_mode = match decicode(w.command) {
                0 => MoveMode::Rapid,
                10 => MoveMode::Linear,
                20 => MoveMode::CwArc,
                30 => MoveMode::CcwArc,
                800 => MoveMode::None, // canned-cycle cancel
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            };
        }

        self.perform_move(&mut stmt, feed_worded)?;

        if let Some(w) = stmt.take_modal(ModalGroup::Stopping)? {
            match decicode(w.command) {
                0 | 10 | 600 => {} // optional/unconditional pauses have no trace effect
                20 | 300 => self.completed = true,
                _ => return Err(VmErrorKind::Unsupported(w.to_string())),
            }
        }

        if !stmt.is_empty() {
            let residue = stmt
                .remaining()
                .iter()
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            if self.lenient {
                tracing::warn!(words = %residue, "ignoring unhandled words in block");
            } else {
                return Err(VmErrorKind::ResidualWords(residue));
            }
        }

        self.coordinates.cancel_override();
        Ok(())
    }

    fn run_non_modal(&mut self, word: &Word, stmt: &mut Statement) -> Result<(), VmErrorKind> {
        match decicode(word.command) {
            40 => {
                let p = stmt.take_word('P')?.ok_or(VmErrorKind::DwellWithoutTime)?;
                if p < 0.0 {
                    return Err(VmErrorKind::NegativeDwell(p));
                }
                self.state.dwell_time = p;
                let cur = self.current_position();
                let mut state = self.state;
                state.move_mode = MoveMode::Dwell;
                self.positions.push(Position { state, ..cur });
            }
            100 => {
                let l = stmt.take_word('L')?;
                if l != Some(2.0) {
                    return Err(VmErrorKind::OffsetFormUnsupported);
                }
                let p = stmt
                    .take_word('P')?
                    .ok_or(VmErrorKind::OffsetSlotInvalid(0.0))?;
                if p.fract() != 0.0 || !(1.0..=9.0).contains(&p) {
                    return Err(VmErrorKind::OffsetSlotInvalid(p));
                }
                let slot = p as usize;
                let scale = self.unit_scale();
                let mut offset = self.coordinates.get(slot);
                if let Some(x) = stmt.take_word('X')? {
                    offset.x = x * scale;
                }
                if let Some(y) = stmt.take_word('Y')? {
                    offset.y = y * scale;
                }
                if let Some(z) = stmt.take_word('Z')? {
                    offset.z = z * scale;
                }
                self.coordinates.set(slot, offset);
            }
            280 => self.go_stored(stmt, self.stored_position_1)?,
            281 => self.stored_position_1 = self.current_position().vector(),
            300 => self.go_stored(stmt, self.stored_position_2)?,
            301 => self.stored_position_2 = self.current_position().vector(),
            530 => {
                if self.state.cutter_compensation != CutterCompensation::None {
                    return Err(VmErrorKind::OverrideWithCutterCompensation);
                }
                self.coordinates.set_override();
            }
            920 => {
                let scale = self.unit_scale();
                let x = stmt.take_word('X')?;
                let y = stmt.take_word('Y')?;
                let z = stmt.take_word('Z')?;
                if x.is_none() && y.is_none() && z.is_none() {
                    return Err(VmErrorKind::OffsetWithoutAxes);
                }
                let cur = self.current_position().vector();
                let work = self.coordinates.work_offset();
                let mut offset = self.coordinates.offset();
                if let Some(x) = x {
                    offset.x = cur.x - work.x - x * scale;
                }
                if let Some(y) = y {
                    offset.y = cur.y - work.y - y * scale;
                }
                if let Some(z) = z {
                    offset.z = cur.z - work.z - z * scale;
                }
                self.coordinates.set_offset(offset);
                self.coordinates.enable_offset();
            }
            921 => self.coordinates.erase_offset(),
            922 => self.coordinates.disable_offset(),
            923 => self.coordinates.enable_offset(),
            _ => return Err(VmErrorKind::Unsupported(word.to_string())),
        }
        Ok(())
    }

    /// G28/G30: optional intermediate point, then the stored position, all
    /// in rapid mode.
    fn go_stored(&mut self, stmt: &mut Statement, stored: DVec3) -> Result<(), VmErrorKind> {
        let saved = self.state.move_mode;
        self.state.move_mode = MoveMode::Rapid;
        if stmt.has_word('X') || stmt.has_word('Y') || stmt.has_word('Z') {
            let target = self.resolve_target(stmt)?;
            self.push_move(target);
        }
        self.push_move(stored);
        self.state.move_mode = saved;
        Ok(())
    }

    fn perform_move(&mut self, stmt: &mut Statement, feed_worded: bool) -> Result<(), VmErrorKind> {
        if !(stmt.has_word('X') || stmt.has_word('Y') || stmt.has_word('Z')) {
            return Ok(());
        }

        let mode = self.state.move_mode;
        if mode == MoveMode::None || mode == MoveMode::Dwell {
            return Err(VmErrorKind::NoMotionMode);
        }
        if mode != MoveMode::Rapid
            && self.state.feed_mode == FeedMode::InverseTime
            && !feed_worded
        {
            return Err(VmErrorKind::MissingInverseTimeFeedrate);
        }

        match mode {
            MoveMode::Rapid | MoveMode::Linear => {
                let target = self.resolve_target(stmt)?;
                self.push_move(target);
            }
            MoveMode::CwArc | MoveMode::CcwArc => {
                if self.coordinates.override_active() {
                    return Err(VmErrorKind::ArcUnderOverride);
                }
                let target = self.resolve_target(stmt)?;
                let (center, turns) = self.resolve_arc_center(stmt)?;
                self.arc(target, center, turns, mode == MoveMode::CwArc)?;
            }
            MoveMode::None | MoveMode::Dwell => unreachable!(),
        }
        Ok(())
    }

    /// Human-readable rendition of the position trace.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for p in &self.positions {
            let kind = match p.state.move_mode {
                MoveMode::None => "null move",
                MoveMode::Rapid => "rapid move",
                MoveMode::Linear => "linear move",
                MoveMode::CwArc => "clockwise arc",
                MoveMode::CcwArc => "counterclockwise arc",
                MoveMode::Dwell => "dwell",
            };
            let _ = writeln!(out, "{kind}");
            let _ = writeln!(out, "   feedrate: {}", p.state.feedrate);
            let _ = writeln!(
                out,
                "   spindle: {}, clockwise: {}, speed: {}",
                p.state.spindle_enabled, p.state.spindle_clockwise, p.state.spindle_speed
            );
            let _ = writeln!(
                out,
                "   mist coolant: {}, flood coolant: {}",
                p.state.mist_coolant, p.state.flood_coolant
            );
            let _ = writeln!(out, "   X: {}, Y: {}, Z: {}", p.x, p.y, p.z);
        }
        out
    }
}

/// Commands dispatch on tenths so fractional codes stay distinct
/// (G38.2 -> 382, G92.1 -> 921).
fn decicode(command: f64) -> i64 {
    (command * 10.0).round() as i64
}
