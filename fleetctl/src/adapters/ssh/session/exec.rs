// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use russh::ChannelMsg;
use std::time::Duration;

use crate::app::services::output::{LineBuffer, OutputSenders, collect_output, output_channels};
use crate::app::types::RemoteResult;

use super::HostSession;

#[derive(Debug, PartialEq, Eq)]
enum Pumped<'a> {
    Stdout(&'a [u8]),
    Stderr(&'a [u8]),
    Exit(u32),
    Closed,
    Ignored,
}

fn classify(msg: &ChannelMsg) -> Pumped<'_> {
    match msg {
        ChannelMsg::Data { data } => Pumped::Stdout(data),
        ChannelMsg::ExtendedData { data, ext: 1 } => Pumped::Stderr(data),
        ChannelMsg::ExitStatus { exit_status } => Pumped::Exit(*exit_status),
        ChannelMsg::Close => Pumped::Closed,
        _ => Pumped::Ignored,
    }
}

/// A command finished when the server closed the channel or reported a status;
/// anything else means the connection went away underneath it.
fn finished(closed: bool, exit_code: Option<u32>) -> bool {
    closed || exit_code.is_some()
}

async fn forward(tx: &tokio::sync::mpsc::Sender<String>, lines: Vec<String>) {
    for line in lines {
        // The collector may have given up already.
        let _ = tx.send(line).await;
    }
}

impl HostSession {
    /// Runs `command` and streams its output line by line until it exits or `timeout` passes.
    ///
    /// On timeout only the local wait is abandoned: the pump task keeps the session and
    /// channel until the remote side closes them.
    pub async fn run(self, command: &str, timeout: Duration) -> Result<RemoteResult> {
        let mut chan = self
            .handle
            .channel_open_session()
            .await
            .context("open session")?;
        log::debug!("executing '{}' on {}", command, self.address());
        chan.exec(true, command).await.context("exec request")?;

        let address = self.address().to_string();
        let (senders, streams) = output_channels(256);
        tokio::spawn(async move {
            let OutputSenders {
                stdout,
                stderr,
                done,
            } = senders;
            let mut out_buf = LineBuffer::default();
            let mut err_buf = LineBuffer::default();
            let mut exit_code = None;
            let mut closed = false;
            while let Some(msg) = chan.wait().await {
                match classify(&msg) {
                    Pumped::Stdout(data) => forward(&stdout, out_buf.push(data)).await,
                    Pumped::Stderr(data) => forward(&stderr, err_buf.push(data)).await,
                    Pumped::Exit(code) => exit_code = Some(code),
                    Pumped::Closed => {
                        closed = true;
                        break;
                    }
                    Pumped::Ignored => {}
                }
            }
            forward(&stdout, out_buf.finish().into_iter().collect()).await;
            forward(&stderr, err_buf.finish().into_iter().collect()).await;
            if finished(closed, exit_code) {
                let _ = done.send(exit_code);
            } else {
                // Dropping `done` tells the collector the stream was lost.
                log::warn!("channel to {} ended without exit status or close", self.address());
                drop(done);
            }
            let _ = chan.close().await;
            self.close().await;
        });

        Ok(collect_output(&address, streams, timeout).await?)
    }
}
