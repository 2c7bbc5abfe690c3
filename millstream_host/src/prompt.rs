//! Operator prompts, composed in front of the wire generator so the
//! machine waits for a human before the corresponding lines stream out.

use std::io::{self, BufRead, Write};

use millstream_core::export::{CodeGenerator, ExportError};
use millstream_core::vm::{CutterCompensation, FeedMode, MoveMode, Position};

pub struct ManualPrompts {
    position: Position,
    toolchange: bool,
    spindle: bool,
    coolant: bool,
}

impl ManualPrompts {
    pub fn new(toolchange: bool, spindle: bool, coolant: bool) -> Self {
        Self {
            position: Position::default(),
            toolchange,
            spindle,
            coolant,
        }
    }

    fn wait_for_operator(&self, message: &str) {
        eprint!("{message} -- press enter to continue ");
        let _ = io::stderr().flush();
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    }
}

impl CodeGenerator for ManualPrompts {
    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, pos: Position) {
        self.position = pos;
    }

    fn init(&mut self) {
        self.position = Position::default();
    }

    fn toolchange(&mut self, tool: i32) -> Result<(), ExportError> {
        if self.toolchange {
            self.wait_for_operator(&format!("insert tool {tool}"));
        }
        Ok(())
    }

    fn tool_length_change(&mut self, _index: i32) -> Result<(), ExportError> {
        Ok(())
    }

    fn spindle(&mut self, enabled: bool, clockwise: bool, speed: f64) -> Result<(), ExportError> {
        if self.spindle {
            let wanted = if !enabled {
                "stop the spindle".to_string()
            } else {
                format!(
                    "set the spindle to {speed} rpm {}",
                    if clockwise { "clockwise" } else { "counter-clockwise" }
                )
            };
            self.wait_for_operator(&wanted);
        }
        Ok(())
    }

    fn coolant(&mut self, flood: bool, mist: bool) -> Result<(), ExportError> {
        if self.coolant {
            let wanted = match (flood, mist) {
                (false, false) => "turn coolant off",
                (true, false) => "turn flood coolant on",
                (false, true) => "turn mist coolant on",
                (true, true) => "turn flood and mist coolant on",
            };
            self.wait_for_operator(wanted);
        }
        Ok(())
    }

    fn feed_mode(&mut self, _mode: FeedMode) -> Result<(), ExportError> {
        Ok(())
    }

    fn feedrate(&mut self, _feedrate: f64) -> Result<(), ExportError> {
        Ok(())
    }

    fn cutter_compensation(&mut self, _mode: CutterCompensation) -> Result<(), ExportError> {
        Ok(())
    }

    fn dwell(&mut self, _seconds: f64) -> Result<(), ExportError> {
        Ok(())
    }

    fn move_to(&mut self, _x: f64, _y: f64, _z: f64, _mode: MoveMode) -> Result<(), ExportError> {
        Ok(())
    }
}
