//! Rendering of `server.properties` and `ops.json`.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use moddock_common::constants::DEFAULT_GAME_PORT;
use moddock_common::error::Result;
use moddock_common::settings::ServerBuildSettings;
use serde::Serialize;

/// Operator permission level granted to listed operators.
const OP_LEVEL: u8 = 4;

/// Escapes a value for a Java properties file.
///
/// Separators, comment markers, backslashes, and leading spaces are
/// backslash-escaped; line breaks and every non-printable or non-ASCII
/// character become escape sequences, so the value stays on one line.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if i == 0 => out.push_str("\\ "),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
        }
    }
    out
}

/// Renders `server.properties` for a server.
///
/// Keys are sorted. The game listens on its default port inside the
/// container; the host port is applied by the port mapping.
#[must_use]
pub fn render_properties(settings: &ServerBuildSettings) -> String {
    let mut entries = settings.properties.entries();
    let _ = entries.insert("server-port", DEFAULT_GAME_PORT.to_string());

    let mut out = String::from("#Minecraft server properties\n");
    for (key, value) in entries {
        let _ = writeln!(out, "{key}={}", escape_value(&value));
    }
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OpEntry<'a> {
    name: &'a str,
    level: u8,
    bypasses_player_limit: bool,
}

/// Renders `ops.json` for a server: each distinct operator, sorted.
///
/// # Errors
///
/// Returns `Serialization` if encoding fails.
pub fn render_ops(settings: &ServerBuildSettings) -> Result<String> {
    let names: BTreeSet<&str> = settings
        .ops
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let entries: Vec<OpEntry<'_>> = names
        .into_iter()
        .map(|name| OpEntry {
            name,
            level: OP_LEVEL,
            bypasses_player_limit: false,
        })
        .collect();
    let mut json = serde_json::to_string_pretty(&entries)?;
    json.push('\n');
    Ok(json)
}
