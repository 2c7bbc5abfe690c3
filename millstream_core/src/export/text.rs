//! Plain-text G-code generator.

use crate::vm::{CutterCompensation, FeedMode, MoveMode, Position};

use super::{format_float, CodeGenerator, ExportError};

pub struct TextGenerator {
    position: Position,
    precision: usize,
    lines: Vec<String>,
}

impl TextGenerator {
    pub fn new(precision: usize) -> Self {
        let mut gen = Self {
            position: Position::default(),
            precision,
            lines: Vec::new(),
        };
        gen.init();
        gen
    }

    fn put(&mut self, line: String) {
        if !line.is_empty() {
            self.lines.push(line);
        }
    }

    fn fmt(&self, value: f64) -> String {
        format_float(value, self.precision)
    }

    /// The generated program, one line per operation, LF terminated.
    pub fn retrieve(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl CodeGenerator for TextGenerator {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, pos: Position) {
        self.position = pos;
    }

    fn init(&mut self) {
        self.position = Position::default();
        self.lines = vec!["(Exported by millstream)".to_string(), "G21G90".to_string()];
    }

    fn toolchange(&mut self, tool: i32) -> Result<(), ExportError> {
        self.put(format!("M6 T{tool}"));
        Ok(())
    }

    fn tool_length_change(&mut self, index: i32) -> Result<(), ExportError> {
        if index < 0 {
            self.put("G49".to_string());
        } else {
            self.put(format!("G43H{index}"));
        }
        Ok(())
    }

    fn spindle(&mut self, enabled: bool, clockwise: bool, speed: f64) -> Result<(), ExportError> {
        let state = self.position.state;
        let mut line = String::new();
        if state.spindle_enabled != enabled || state.spindle_clockwise != clockwise {
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
        self.put(
            match mode {
                CutterCompensation::None => "G40",
                CutterCompensation::Outer => "G41",
                CutterCompensation::Inner => "G42",
            }
            .to_string(),
        );
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
        if pos.state.move_mode != mode {
            match mode {
                MoveMode::None | MoveMode::Dwell => return Ok(()),
                MoveMode::Rapid => line += "G0",
                MoveMode::Linear => line += "G1",
                MoveMode::CwArc | MoveMode::CcwArc => return Err(ExportError::ArcMove),
            }
        }
        if pos.x != x {
            line += &format!("X{}", self.fmt(x));
        }
        if pos.y != y {
            line += &format!("Y{}", self.fmt(y));
        }
        if pos.z != z {
            line += &format!("Z{}", self.fmt(z));
        }
        if !line.is_empty() {
            self.put(line);
        }
        Ok(())
    }
}
