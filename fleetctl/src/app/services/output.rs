// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::time::Duration;

use thiserror::Error as ThisError;
use tokio::sync::{mpsc, oneshot};

use crate::app::types::RemoteResult;

pub const TIMEOUT_MARKER: &str = "Run Command Timeout!";

/// The producer went away without reporting that the command finished.
#[derive(Debug, ThisError)]
#[error("output from {address} ended before the command finished")]
pub struct StreamLost {
    pub address: String,
}

/// Receiving half of a streamed remote command: one channel per output stream and a
/// completion signal carrying the exit status when the server sent one.
pub struct OutputStreams {
    pub stdout: mpsc::Receiver<String>,
    pub stderr: mpsc::Receiver<String>,
    pub done: oneshot::Receiver<Option<u32>>,
}

/// Sending half handed to whatever produces the output.
pub struct OutputSenders {
    pub stdout: mpsc::Sender<String>,
    pub stderr: mpsc::Sender<String>,
    pub done: oneshot::Sender<Option<u32>>,
}

pub fn output_channels(capacity: usize) -> (OutputSenders, OutputStreams) {
    let (out_tx, out_rx) = mpsc::channel(capacity);
    let (err_tx, err_rx) = mpsc::channel(capacity);
    let (done_tx, done_rx) = oneshot::channel();
    (
        OutputSenders {
            stdout: out_tx,
            stderr: err_tx,
            done: done_tx,
        },
        OutputStreams {
            stdout: out_rx,
            stderr: err_rx,
            done: done_rx,
        },
    )
}

fn push_line(buf: &mut String, line: &str) {
    if !line.is_empty() {
        buf.push_str(line);
        buf.push('\n');
    }
}

/// Collects streamed lines until the producer signals completion or `timeout` elapses.
///
/// On timeout the result is marked incomplete and the timeout marker is appended to
/// stderr. Nothing is sent to the remote side; the producer is simply abandoned.
/// A producer that drops the completion signal without sending it yields [`StreamLost`].
pub async fn collect_output(
    address: &str,
    mut streams: OutputStreams,
    timeout: Duration,
) -> Result<RemoteResult, StreamLost> {
    let mut result = RemoteResult {
        address: address.to_string(),
        ..RemoteResult::default()
    };
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut stdout_open = true;
    let mut stderr_open = true;

    loop {
        tokio::select! {
            biased;
            line = streams.stdout.recv(), if stdout_open => match line {
                Some(line) => push_line(&mut result.stdout, &line),
                None => stdout_open = false,
            },
            line = streams.stderr.recv(), if stderr_open => match line {
                Some(line) => push_line(&mut result.stderr, &line),
                None => stderr_open = false,
            },
            status = &mut streams.done => {
                let Ok(status) = status else {
                    return Err(StreamLost {
                        address: address.to_string(),
                    });
                };
                // Lines sent before the done signal may still be queued.
                while let Ok(line) = streams.stdout.try_recv() {
                    push_line(&mut result.stdout, &line);
                }
                while let Ok(line) = streams.stderr.try_recv() {
                    push_line(&mut result.stderr, &line);
                }
                result.completed = true;
                result.exit_code = status;
                break;
            }
            _ = &mut deadline => {
                push_line(&mut result.stderr, TIMEOUT_MARKER);
                result.completed = false;
                break;
            }
        }
    }
    Ok(result)
}

/// Splits a byte stream into lines, keeping an unterminated tail until more data arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
