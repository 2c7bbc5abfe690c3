//! Byte-level transport to a motion controller.

pub mod grbl;

use async_trait::async_trait;
use thiserror::Error;

use millstream_core::export::ExportError;
use millstream_core::vm::Machine;

pub use grbl::GrblStreamer;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("serial port: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("no initialized grbl detected on the line")]
    Handshake,
    #[error("controller error: {message} (while sending {line:?})")]
    Controller {
        message: String,
        line: Option<String>,
    },
    #[error("controller alarm: {0}")]
    Alarm(String),
    #[error("{0}")]
    Export(#[from] ExportError),
    #[error("interrupted; soft reset sent")]
    Interrupted,
}

/// The controller-facing surface: validation, lifecycle and the
/// position-trace send loop.
#[async_trait]
pub trait Streamer {
    /// Dry-runs the wire dialect against a machine without touching the
    /// port.
    fn check(&self, machine: &Machine) -> Result<(), ExportError>;

    async fn send(&mut self, machine: &Machine) -> Result<(), StreamError>;

    /// Cycle start (`~`).
    async fn start(&mut self) -> Result<(), StreamError>;

    /// Feed hold (`!`).
    async fn pause(&mut self) -> Result<(), StreamError>;

    /// Soft reset (`\x18`) and close.
    async fn stop(&mut self) -> Result<(), StreamError>;
}
