// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;

/// Normalize a name to lowercase alphanumeric.
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Location for persistent state files: `~/.local/share/pwr-rs/<file>`,
/// or `./<file>` when no data dir is known.
pub fn default_data_path(file: &str) -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("pwr-rs").join(file))
        .unwrap_or_else(|| PathBuf::from(file))
}
