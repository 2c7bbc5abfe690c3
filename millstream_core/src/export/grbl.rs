//! Grbl wire dialect.
//!
//! Stricter than the text generator: no cutter compensation, no arcs
//! (the machine tessellates them away), no tool changer. Grbl drops its
//! modal motion word across M-code lines, so a latch forces the mode
//! word back onto the next move after any of them.

use crate::vm::{CutterCompensation, FeedMode, MoveMode, Position};

use super::{format_float, CodeGenerator, ExportError};

pub struct GrblGenerator {
    position: Position,
    precision: usize,
    force_mode_write: bool,
    lines: Vec<String>,
}

impl GrblGenerator {
    pub fn new(precision: usize) -> Self {
        Self {
            position: Position::default(),
            precision,
            force_mode_write: false,
            lines: Vec::new(),
        }
    }

    fn put(&mut self, line: String) {
        if !line.is_empty() {
            self.lines.push(line);
        }
    }

    fn fmt(&self, value: f64) -> String {
        format_float(value, self.precision)
    }

    /// Drains the lines produced since the last call. The streamer calls
    /// this after every dispatched position to tag checkpoints.
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

impl CodeGenerator for GrblGenerator {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, pos: Position) {
        self.position = pos;
    }

    fn init(&mut self) {
        self.position = Position::default();
        self.force_mode_write = false;
        self.lines.clear();
    }

    fn toolchange(&mut self, tool: i32) -> Result<(), ExportError> {
        // No tool changer on a Grbl machine; the operator swaps by hand.
        tracing::warn!(tool, "grbl cannot change tools; insert T{tool} manually");
        Ok(())
    }

    fn tool_length_change(&mut self, index: i32) -> Result<(), ExportError> {
        tracing::warn!(index, "grbl has no tool length table; offset ignored");
        Ok(())
    }

    fn spindle(&mut self, enabled: bool, clockwise: bool, speed: f64) -> Result<(), ExportError> {
        let state = self.position.state;
        let mut line = String::new();
        if state.spindle_enabled != enabled || state.spindle_clockwise != clockwise {
            self.force_mode_write = true;
            line += if enabled && clockwise {
                "M3"
            } else if enabled {
                "M4"
            } else {
                "M5"
            };
        }
        if enabled && state.spindle_speed != speed {
            line += &format!("S{}", self.fmt(speed));
        }
        self.put(line);
        Ok(())
    }

    fn coolant(&mut self, flood: bool, mist: bool) -> Result<(), ExportError> {
        if !flood && !mist {
            self.put("M9".to_string());
        } else {
            if flood {
                self.put("M8".to_string());
            }
            if mist {
                self.put("M7".to_string());
            }
        }
        self.force_mode_write = true;
        Ok(())
    }

    fn feed_mode(&mut self, mode: FeedMode) -> Result<(), ExportError> {
        self.put(
            match mode {
                FeedMode::InverseTime => "G93",
                FeedMode::UnitsPerMin => "G94",
                FeedMode::UnitsPerRev => "G95",
            }
            .to_string(),
        );
        Ok(())
    }

    fn feedrate(&mut self, feedrate: f64) -> Result<(), ExportError> {
        let line = format!("F{}", self.fmt(feedrate));
        self.put(line);
        Ok(())
    }

    fn cutter_compensation(&mut self, mode: CutterCompensation) -> Result<(), ExportError> {
        if mode != CutterCompensation::None {
            return Err(ExportError::CutterCompensationUnsupported);
        }
        Ok(())
    }

    fn dwell(&mut self, seconds: f64) -> Result<(), ExportError> {
        let line = format!("G4P{}", self.fmt(seconds));
        self.put(line);
        Ok(())
    }

    fn move_to(&mut self, x: f64, y: f64, z: f64, mode: MoveMode) -> Result<(), ExportError> {
        let pos = self.position;
        let mut line = String::new();
        if pos.state.move_mode != mode || self.force_mode_write {
            match mode {
                MoveMode::None | MoveMode::Dwell => return Ok(()),
                MoveMode::Rapid => line += "G0",
                MoveMode::Linear => line += "G1",
                MoveMode::CwArc | MoveMode::CcwArc => return Err(ExportError::ArcMove),
            }
        }
        self.force_mode_write = false;

        if pos.x != x {
            line += &format!("X{}", self.fmt(x));
        }
        if pos.y != y {
            line += &format!("Y{}", self.fmt(y));
        }
        if pos.z != z {
            line += &format!("Z{}", self.fmt(z));
        }
        self.put(line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{handle_all_positions, handle_position};
    use crate::gcode::parser::parse;
    use crate::vm::Machine;

    fn lines_for(src: &str) -> Vec<String> {
        let doc = parse(src).unwrap();
        let mut machine = Machine::new();
        machine.process(&doc).unwrap();
        let mut gen = GrblGenerator::new(4);
        handle_all_positions(&mut gen, &machine).unwrap();
        gen.take_lines()
    }

    #[test]
    fn m_codes_relatch_the_motion_word() {
        let lines = lines_for("G1 X1 F60\nM3 S2000\nG1 X2");
        // After the spindle line the G1 word is written again even though
        // the mode never changed.
        let m3 = lines.iter().position(|l| l.starts_with("M3")).unwrap();
        assert!(lines[m3 + 1..].iter().any(|l| l.starts_with("G1X2")));
    }

    #[test]
    fn cutter_compensation_is_fatal() {
        let doc = parse("G41\nG1 X1 F60").unwrap();
        let mut machine = Machine::new();
        machine.process(&doc).unwrap();
        let mut gen = GrblGenerator::new(4);
        let err = handle_all_positions(&mut gen, &machine).unwrap_err();
        assert_eq!(err, ExportError::CutterCompensationUnsupported);
    }

    #[test]
    fn toolchange_produces_no_wire_line() {
        let lines = lines_for("T4 M6\nG0 X1");
        assert!(lines.iter().all(|l| !l.contains('T')));
    }

    #[test]
    fn take_lines_drains() {
        let doc = parse("G0 X1\nG0 X2").unwrap();
        let mut machine = Machine::new();
        machine.process(&doc).unwrap();
        let mut gen = GrblGenerator::new(4);
        handle_position(&mut gen, &machine.positions[1]).unwrap();
        assert_eq!(gen.take_lines(), vec!["G0X1".to_string()]);
        handle_position(&mut gen, &machine.positions[2]).unwrap();
        assert_eq!(gen.take_lines(), vec!["X2".to_string()]);
        assert!(gen.take_lines().is_empty());
    }
}
