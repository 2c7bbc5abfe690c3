// Streamer protocol tests over an in-memory duplex transport.

use std::time::Duration;

use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use millstream_core::parse;
use millstream_core::vm::Machine;
use millstream_host::stream::{GrblStreamer, StreamError, Streamer};

const GREETING: &[u8] = b"\r\nGrbl 1.1f ['$' for help]\r\n";

fn machine_for(src: &str) -> Machine {
    let doc = parse(src).unwrap();
    let mut machine = Machine::new();
    machine.process(&doc).unwrap();
    machine
}

#[tokio::test]
async fn handshake_accepts_the_greeting() {
    let (local, remote) = duplex(4096);
    let responder = tokio::spawn(async move {
        let (_r, mut w) = tokio::io::split(remote);
        w.write_all(b"\r\n[MSG:boot]\r\n").await.unwrap();
        w.write_all(GREETING).await.unwrap();
        w
    });
    GrblStreamer::handshake(local, 4).await.unwrap();
    responder.await.unwrap();
}

#[tokio::test]
async fn handshake_fails_without_a_greeting() {
    let (local, remote) = duplex(4096);
    let responder = tokio::spawn(async move {
        let (_r, mut w) = tokio::io::split(remote);
        w.write_all(b"hello world\r\n").await.unwrap();
        w.shutdown().await.unwrap();
    });
    let err = GrblStreamer::handshake(local, 4).await.unwrap_err();
    assert!(matches!(err, StreamError::Handshake));
    responder.await.unwrap();
}

#[tokio::test]
async fn streams_every_line_and_checkpoints_every_position() {
    let (local, remote) = duplex(4096);
    let responder = tokio::spawn(async move {
        let (r, mut w) = tokio::io::split(remote);
        let mut reader = BufReader::new(r);
        w.write_all(GREETING).await.unwrap();
        let mut received = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            received.push(line.trim_end().to_string());
            w.write_all(b"ok\r\n").await.unwrap();
        }
        received
    });

    let machine = machine_for("G0 X1\nG1 X2 F50\nG0 Z5");
    let mut streamer = GrblStreamer::handshake(local, 4).await.unwrap();
    let mut progress = Vec::new();
    let mut none: [&mut dyn millstream_core::CodeGenerator; 0] = [];
    streamer
        .send_with(&machine, &mut none, |idx| progress.push(idx))
        .await
        .unwrap();
    drop(streamer);

    let received = responder.await.unwrap();
    assert_eq!(received, vec!["G0X1", "F50", "G1X2", "G0Z5"]);
    // One checkpoint per source position, in order.
    assert_eq!(progress, (0..machine.positions.len()).collect::<Vec<_>>());
}

#[tokio::test]
async fn outstanding_bytes_never_exceed_the_window() {
    let (local, remote) = duplex(64 * 1024);
    let responder = tokio::spawn(async move {
        let (r, mut w) = tokio::io::split(remote);
        let mut reader = BufReader::new(r);
        w.write_all(GREETING).await.unwrap();

        let mut in_flight: Vec<usize> = Vec::new();
        let mut unacked = 0usize;
        let mut max_unacked = 0usize;
        let mut line = String::new();
        loop {
            line.clear();
            match tokio::time::timeout(
                Duration::from_millis(10),
                reader.read_line(&mut line),
            )
            .await
            {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    in_flight.push(n);
                    unacked += n;
                    max_unacked = max_unacked.max(unacked);
                }
                Ok(Err(err)) => panic!("responder read failed: {err}"),
                Err(_) => {
                    // The emitter has stalled on the window; drain one.
                    if in_flight.is_empty() {
                        continue;
                    }
                    unacked -= in_flight.remove(0);
                    w.write_all(b"ok\r\n").await.unwrap();
                }
            }
        }
        max_unacked
    });

    let mut src = String::new();
    for i in 0..200 {
        src.push_str(&format!("G1 X{} F60\n", i % 90));
    }
    let machine = machine_for(&src);
    let mut streamer = GrblStreamer::handshake(local, 4).await.unwrap();
    streamer.send(&machine).await.unwrap();
    drop(streamer);

    let max_unacked = responder.await.unwrap();
    assert!(max_unacked > 100, "window never filled: {max_unacked}");
    assert!(max_unacked <= 127, "window overflowed: {max_unacked}");
}

#[tokio::test]
async fn controller_error_aborts_with_the_offending_line() {
    let (local, remote) = duplex(4096);
    let responder = tokio::spawn(async move {
        let (r, mut w) = tokio::io::split(remote);
        let mut reader = BufReader::new(r);
        w.write_all(GREETING).await.unwrap();

        let mut lines = Vec::new();
        let mut line = String::new();
        for _ in 0..4 {
            line.clear();
            reader.read_line(&mut line).await.unwrap();
            lines.push(line.trim_end().to_string());
        }
        // Acknowledge three lines, then reject the fourth.
        w.write_all(b"ok\r\nok\r\nok\r\nerror:foo\r\n").await.unwrap();
        lines
    });

    let machine = machine_for("G0 X1\nG0 X2\nG0 X3\nG0 X4\nG0 X5");
    let mut streamer = GrblStreamer::handshake(local, 4).await.unwrap();
    let err = streamer.send(&machine).await.unwrap_err();
    let lines = responder.await.unwrap();

    match err {
        StreamError::Controller { message, line } => {
            assert_eq!(message, "foo");
            assert_eq!(line.as_deref(), Some(lines[3].as_str()));
        }
        other => panic!("expected controller error, got {other:?}"),
    }
}

#[tokio::test]
async fn alarm_is_fatal() {
    let (local, remote) = duplex(4096);
    let responder = tokio::spawn(async move {
        let (r, mut w) = tokio::io::split(remote);
        let mut reader = BufReader::new(r);
        w.write_all(GREETING).await.unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        w.write_all(b"alarm:hard limit\r\n").await.unwrap();
    });

    // Enough bytes to force a blocking read before completion.
    let mut src = String::new();
    for i in 0..40 {
        src.push_str(&format!("G1 X{}.123 F60\n", i));
    }
    let machine = machine_for(&src);
    let mut streamer = GrblStreamer::handshake(local, 4).await.unwrap();
    let err = streamer.send(&machine).await.unwrap_err();
    assert!(matches!(err, StreamError::Alarm(m) if m == "hard limit"));
    responder.await.unwrap();
}

#[tokio::test]
async fn info_lines_are_ignored() {
    let (local, remote) = duplex(4096);
    let responder = tokio::spawn(async move {
        let (r, mut w) = tokio::io::split(remote);
        let mut reader = BufReader::new(r);
        w.write_all(GREETING).await.unwrap();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            w.write_all(b"[MSG:probe]\r\nok\r\n").await.unwrap();
        }
    });

    let machine = machine_for("G0 X1\nG0 X2");
    let mut streamer = GrblStreamer::handshake(local, 4).await.unwrap();
    streamer.send(&machine).await.unwrap();
    drop(streamer);
    responder.await.unwrap();
}

#[tokio::test]
async fn control_bytes_bypass_the_queue() {
    let (local, remote) = duplex(4096);
    let responder = tokio::spawn(async move {
        let (mut r, mut w) = tokio::io::split(remote);
        w.write_all(GREETING).await.unwrap();
        let mut buf = Vec::new();
        r.read_to_end(&mut buf).await.unwrap();
        buf
    });

    let mut streamer = GrblStreamer::handshake(local, 4).await.unwrap();
    streamer.pause().await.unwrap();
    streamer.start().await.unwrap();
    streamer.stop().await.unwrap();
    drop(streamer);

    let bytes = responder.await.unwrap();
    assert_eq!(bytes, b"!~\x18\n");
}
