// ============================================================================
// File: src/config/env_file.rs
// ----------------------------------------------------------------------------
// KEY=VALUE settings file parsing (.env)
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;

/// Load settings from a `.env`-style file
///
/// Missing files yield an empty map. Blank lines and `#` comments are
/// skipped; lines split on the first `=` so values may contain `=`.
pub fn load(path: &Path) -> HashMap<String, String> {
    debug!("loading settings file from {}", path.display());

    let Ok(contents) = fs::read_to_string(path) else {
        debug!("settings file {} not readable; using defaults", path.display());
        return HashMap::new();
    };

    let mut values = HashMap::new();
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        values.insert(key.trim().to_string(), value.trim().to_string());
    }

    debug!("loaded {} settings from {}", values.len(), path.display());
    values
}
