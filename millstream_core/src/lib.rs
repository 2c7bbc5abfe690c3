//! millstream_core: G-code in, simplified motion out.
//!
//! The pipeline is strictly staged: [`gcode::parser::parse`] builds a
//! [`gcode::Document`], [`vm::Machine::process`] interprets it into a
//! position trace, the `optimize` passes and `vm::transform` rewrites
//! shape that trace, and the `export` generators replay it as compact
//! differential G-code for a file or a Grbl controller.

pub mod export;
pub mod gcode;
pub mod optimize;
pub mod vm;

pub use export::{handle_all_positions, handle_position, CodeGenerator};
pub use gcode::parser::{parse, ParseError};
pub use gcode::{Block, Document, Node, Word};
pub use optimize::OptimizeError;
pub use vm::{Machine, MoveMode, Position, State, VmError};
