// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::env;
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_ENV_VAR: &str = "FLEETCTL_LOG";
const FORMAT_ENV_VAR: &str = "FLEETCTL_LOG_FORMAT";
const SPAN_EVENTS_ENV_VAR: &str = "FLEETCTL_LOG_SPAN_EVENTS";
const FILE_ENV_VAR: &str = "FLEETCTL_LOG_FILE";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Installs the global subscriber. Events go to stderr; stdout is reserved for host output.
pub fn init(verbose: bool) {
    let filter = build_filter(env::var(LOG_ENV_VAR).ok(), verbose);
    let span_events = parse_span_events(env::var(SPAN_EVENTS_ENV_VAR).ok().as_deref());
    let format = parse_format(env::var(FORMAT_ENV_VAR).ok().as_deref());
    let registry = Registry::default()
        .with(filter)
        .with(tracing_error::ErrorLayer::default());

    macro_rules! install {
        ($style:ident) => {{
            let stderr_layer = tracing_subscriber::fmt::layer()
                .$style()
                .with_writer(std::io::stderr)
                .with_timer(UtcTime::rfc_3339())
                .with_span_events(span_events.clone());
            if let Some((writer, guard)) = build_file_writer() {
                let file_layer = tracing_subscriber::fmt::layer()
                    .$style()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_span_events(span_events)
                    .with_writer(writer);
                let _ = registry.with(stderr_layer).with(file_layer).try_init();
                let _ = FILE_GUARD.set(guard);
            } else {
                let _ = registry.with(stderr_layer).try_init();
            }
        }};
    }

    match format {
        LogFormat::Json => install!(json),
        LogFormat::Pretty => install!(pretty),
        LogFormat::Compact => install!(compact),
    }
}

fn build_filter(value: Option<String>, verbose: bool) -> EnvFilter {
    match value.filter(|value| !value.trim().is_empty()) {
        Some(value) => EnvFilter::new(value),
        None if verbose => EnvFilter::new("debug"),
        // russh is chatty at info; keep it to warnings unless asked.
        None => EnvFilter::new("info,russh=warn"),
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_ascii_lowercase())
}

fn parse_format(value: Option<&str>) -> LogFormat {
    match normalized(value).as_deref() {
        Some("json") => LogFormat::Json,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::Compact,
    }
}

fn parse_span_events(value: Option<&str>) -> FmtSpan {
    match normalized(value).as_deref() {
        Some("new") => FmtSpan::NEW,
        Some("enter") => FmtSpan::ENTER,
        Some("exit") => FmtSpan::EXIT,
        Some("close") => FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

fn build_file_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let file_path = env::var(FILE_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())?;

    let path = Path::new(&file_path);
    let file_name = path.file_name()?.to_string_lossy().to_string();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}
