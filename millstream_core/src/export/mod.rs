//! Differential G-code emission.
//!
//! A [`CodeGenerator`] exposes one operation per state concern; the
//! [`handle_position`] dispatcher compares a target [`Position`] against
//! the generator's current one and invokes only the operations needed to
//! get there. Generators compose: a manual-prompt shim and a wire emitter
//! can both watch the same trace through [`handle_position_all`].

pub mod grbl;
pub mod text;

use thiserror::Error;

use crate::vm::{CutterCompensation, FeedMode, Machine, MoveMode, Position};

pub use grbl::GrblGenerator;
pub use text::TextGenerator;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("arcs must be tessellated before export")]
    ArcMove,
    #[error("cutter compensation is not supported by this target")]
    CutterCompensationUnsupported,
}

pub trait CodeGenerator: Send {
    fn position(&self) -> Position;
    fn set_position(&mut self, pos: Position);

    /// Resets the generator to the default machine state.
    fn init(&mut self);

    fn toolchange(&mut self, tool: i32) -> Result<(), ExportError>;
    fn tool_length_change(&mut self, index: i32) -> Result<(), ExportError>;
    fn spindle(&mut self, enabled: bool, clockwise: bool, speed: f64) -> Result<(), ExportError>;
    fn coolant(&mut self, flood: bool, mist: bool) -> Result<(), ExportError>;
    fn feed_mode(&mut self, mode: FeedMode) -> Result<(), ExportError>;
    fn feedrate(&mut self, feedrate: f64) -> Result<(), ExportError>;
    fn cutter_compensation(&mut self, mode: CutterCompensation) -> Result<(), ExportError>;
    fn dwell(&mut self, seconds: f64) -> Result<(), ExportError>;
    fn move_to(&mut self, x: f64, y: f64, z: f64, mode: MoveMode) -> Result<(), ExportError>;
}

/// Emits the minimum set of operations taking `gen` from its current
/// position to `pos`, then records `pos` as current. Calling it twice
/// with the same target emits nothing the second time.
pub fn handle_position<G: CodeGenerator + ?Sized>(
    gen: &mut G,
    pos: &Position,
) -> Result<(), ExportError> {
    let cur = gen.position();
    let cs = cur.state;
    let ns = pos.state;

    if ns.tool_index != cs.tool_index {
        gen.toolchange(ns.tool_index)?;
    }
    if ns.tool_length_index != cs.tool_length_index {
        gen.tool_length_change(ns.tool_length_index)?;
    }
    if ns.spindle_enabled != cs.spindle_enabled
        || ns.spindle_clockwise != cs.spindle_clockwise
        || ns.spindle_speed != cs.spindle_speed
    {
        gen.spindle(ns.spindle_enabled, ns.spindle_clockwise, ns.spindle_speed)?;
    }
    if ns.flood_coolant != cs.flood_coolant || ns.mist_coolant != cs.mist_coolant {
        gen.coolant(ns.flood_coolant, ns.mist_coolant)?;
    }
    if ns.feed_mode != cs.feed_mode {
        gen.feed_mode(ns.feed_mode)?;
    }
    if ns.feedrate != cs.feedrate {
        gen.feedrate(ns.feedrate)?;
    }
    if ns.cutter_compensation != cs.cutter_compensation {
        gen.cutter_compensation(ns.cutter_compensation)?;
    }

    if ns.move_mode == MoveMode::Dwell {
        if cs.move_mode != MoveMode::Dwell || ns.dwell_time != cs.dwell_time {
            gen.dwell(ns.dwell_time)?;
        }
    } else if pos.x != cur.x
        || pos.y != cur.y
        || pos.z != cur.z
        || ns.move_mode != cs.move_mode
    {
        gen.move_to(pos.x, pos.y, pos.z, ns.move_mode)?;
    }

    gen.set_position(*pos);
    Ok(())
}

/// Replays a whole machine trace through one generator.
pub fn handle_all_positions<G: CodeGenerator + ?Sized>(
    gen: &mut G,
    machine: &Machine,
) -> Result<(), ExportError> {
    for pos in &machine.positions {
        handle_position(gen, pos)?;
    }
    Ok(())
}

/// Dispatches one position to several generators, each tracking its own
/// state.
pub fn handle_position_all(
    gens: &mut [&mut dyn CodeGenerator],
    pos: &Position,
) -> Result<(), ExportError> {
    for gen in gens.iter_mut() {
        handle_position(&mut **gen, pos)?;
    }
    Ok(())
}

/// Fixed-precision float with trailing zeros (and a bare point) stripped.
pub fn format_float(value: f64, precision: usize) -> String {
    let mut s = format!("{value:.precision$}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}
