// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::HashMap;

/// Parses `key=value` lines. Keys are trimmed, values kept as written; other lines are skipped.
pub fn parse_properties<'a, I>(lines: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
