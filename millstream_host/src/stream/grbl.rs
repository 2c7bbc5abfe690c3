//! Grbl serial streamer.
//!
//! Grbl exposes a 127-byte input buffer and acknowledges each line with
//! `ok` (or `error:`/`alarm:`). The streamer keeps a FIFO of in-flight
//! lines, blocks for an acknowledgement whenever the next line would
//! overflow the window, and maps every acknowledgement back to the
//! source position it completed so progress advances one step per
//! position regardless of wire expansion.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use millstream_core::export::{
    handle_all_positions, handle_position, handle_position_all, CodeGenerator, ExportError,
    GrblGenerator,
};
use millstream_core::vm::Machine;

use super::{StreamError, Streamer};

const GRBL_BUFFER: usize = 127;

#[derive(Debug, PartialEq, Eq)]
enum Response {
    Ok,
    Error(String),
    Alarm(String),
    Info(String),
}

#[derive(Debug)]
struct PendingLine {
    len: usize,
    text: String,
    /// Index of the source position this line completes.
    checkpoint: Option<usize>,
}

#[derive(Debug)]
pub struct GrblStreamer<T> {
    reader: BufReader<ReadHalf<T>>,
    writer: WriteHalf<T>,
    precision: usize,
    pending: VecDeque<PendingLine>,
    outstanding: usize,
    interrupt: Arc<AtomicBool>,
}

/// Validates a machine trace against the wire dialect without a port.
pub fn check(machine: &Machine, precision: usize) -> Result<(), ExportError> {
    let mut gen = GrblGenerator::new(precision);
    handle_all_positions(&mut gen, machine)?;
    gen.take_lines();
    Ok(())
}

impl GrblStreamer<SerialStream> {
    pub async fn connect(path: &str, baud: u32, precision: usize) -> Result<Self, StreamError> {
        let port = tokio_serial::new(path, baud).open_native_async()?;
        Self::handshake(port, precision).await
    }
}

impl<T> GrblStreamer<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Waits for the Grbl greeting on a freshly opened transport.
    pub async fn handshake(transport: T, precision: usize) -> Result<Self, StreamError> {
        let (read_half, writer) = tokio::io::split(transport);
        let mut reader = BufReader::new(read_half);
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(StreamError::Handshake);
            }
            if line == "\r\n" {
                continue;
            }
            if is_greeting(&line) {
                tracing::info!(version = &line[5..9], "grbl initialized");
                break;
            }
            tracing::debug!(line = line.trim_end(), "pre-handshake chatter");
        }
        Ok(Self {
            reader,
            writer,
            precision,
            pending: VecDeque::new(),
            outstanding: 0,
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared flag a signal handler can raise to abort the stream with a
    /// soft reset.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// Streams the whole trace. `companions` see every position before it
    /// goes on the wire (operator prompts); `progress` receives the index
    /// of each completed source position.
    pub async fn send_with<F>(
        &mut self,
        machine: &Machine,
        companions: &mut [&mut dyn CodeGenerator],
        mut progress: F,
    ) -> Result<(), StreamError>
    where
        F: FnMut(usize),
    {
        let mut gen = GrblGenerator::new(self.precision);
        for (idx, pos) in machine.positions.iter().enumerate() {
            if self.interrupt.load(Ordering::SeqCst) {
                self.soft_reset().await?;
                return Err(StreamError::Interrupted);
            }

            handle_position_all(companions, pos)?;
            handle_position(&mut gen, pos)?;
            let lines = gen.take_lines();
            if lines.is_empty() {
                progress(idx);
                continue;
            }

            let last = lines.len() - 1;
            for (nth, text) in lines.into_iter().enumerate() {
                let wire = format!("{text}\n");
                while self.outstanding + wire.len() > GRBL_BUFFER {
                    self.wait_ack(&mut progress).await?;
                }
                self.writer.write_all(wire.as_bytes()).await?;
                self.writer.flush().await?;
                self.outstanding += wire.len();
                self.pending.push_back(PendingLine {
                    len: wire.len(),
                    text,
                    checkpoint: (nth == last).then_some(idx),
                });
            }
        }

        while !self.pending.is_empty() {
            self.wait_ack(&mut progress).await?;
        }
        tracing::info!(positions = machine.positions.len(), "stream complete");
        Ok(())
    }

    /// Blocks until one pending line is acknowledged.
    async fn wait_ack<F>(&mut self, progress: &mut F) -> Result<(), StreamError>
    where
        F: FnMut(usize),
    {
        loop {
            match self.read_response().await? {
                Response::Ok => {
                    match self.pending.pop_front() {
                        Some(entry) => {
                            self.outstanding -= entry.len;
                            if let Some(idx) = entry.checkpoint {
                                progress(idx);
                            }
                        }
                        None => tracing::warn!("spurious ok from controller"),
                    }
                    return Ok(());
                }
                Response::Info(message) => {
                    tracing::info!(%message, "controller");
                }
                Response::Error(message) => {
                    return Err(StreamError::Controller {
                        message,
                        line: self.pending.front().map(|p| p.text.clone()),
                    });
                }
                Response::Alarm(message) => return Err(StreamError::Alarm(message)),
            }
        }
    }

    async fn read_response(&mut self) -> Result<Response, StreamError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(StreamError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "controller closed the line",
            )));
        }
        Ok(classify(&line))
    }

    async fn soft_reset(&mut self) -> Result<(), StreamError> {
        self.writer.write_all(b"\x18\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn write_control(&mut self, byte: u8) -> Result<(), StreamError> {
        self.writer.write_all(&[byte]).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<T> Streamer for GrblStreamer<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin,
{
    fn check(&self, machine: &Machine) -> Result<(), ExportError> {
        check(machine, self.precision)
    }

    async fn send(&mut self, machine: &Machine) -> Result<(), StreamError> {
        let mut none: [&mut dyn CodeGenerator; 0] = [];
        self.send_with(machine, &mut none, |_| {}).await
    }

    async fn start(&mut self) -> Result<(), StreamError> {
        self.write_control(b'~').await
    }

    async fn pause(&mut self) -> Result<(), StreamError> {
        self.write_control(b'!').await
    }

    async fn stop(&mut self) -> Result<(), StreamError> {
        self.soft_reset().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

fn is_greeting(line: &str) -> bool {
    line.len() == 26 && line.starts_with("Grbl ") && &line[9..] == " ['$' for help]\r\n"
}

fn classify(line: &str) -> Response {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed == "ok" {
        Response::Ok
    } else if let Some(rest) = strip_keyword(trimmed, "error") {
        Response::Error(rest)
    } else if let Some(rest) = strip_keyword(trimmed, "alarm") {
        Response::Alarm(rest)
    } else {
        Response::Info(trimmed.to_string())
    }
}

fn strip_keyword(line: &str, keyword: &str) -> Option<String> {
    let rest = line.strip_prefix(keyword)?;
    Some(rest.strip_prefix([':', ' ']).unwrap_or(rest).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_requires_a_four_character_version() {
        assert!(is_greeting("Grbl 1.1f ['$' for help]\r\n"));
        assert!(is_greeting("Grbl 0.9j ['$' for help]\r\n"));
        assert!(!is_greeting("Grbl 1.1 ['$' for help]\r\n"));
        assert!(!is_greeting("grbl 1.1f ['$' for help]\r\n"));
        assert!(!is_greeting("Grbl 1.1f\r\n"));
    }

    #[test]
    fn responses_are_classified() {
        assert_eq!(classify("ok\r\n"), Response::Ok);
        assert_eq!(classify("error:22\r\n"), Response::Error("22".into()));
        assert_eq!(classify("error bad\r\n"), Response::Error("bad".into()));
        assert_eq!(classify("alarm:1\r\n"), Response::Alarm("1".into()));
        assert_eq!(
            classify("[MSG:check door]\r\n"),
            Response::Info("[MSG:check door]".into())
        );
    }
}
