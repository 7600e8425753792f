// SPDX-License-Identifier: LGPL-3.0-only
//! Minimal desktop-entry key-file access.
//!
//! Only the keys the record loader needs are read: `Icon` and `Name` from
//! the `[Desktop Entry]` group. Writing is limited to replacing the `Name`
//! key when a desktop entry is renamed.

use std::fs;
use std::io;
use std::path::Path;

const GROUP_HEADER: &str = "[Desktop Entry]";

/// The subset of a desktop entry the file cache cares about.
#[derive(Debug, Clone, Default)]
pub struct DesktopEntry {
    /// The `Icon` key, with any themed-icon filename suffix stripped.
    pub icon: Option<String>,
    /// The `Name` key, used as a display-name override.
    pub name: Option<String>,
}

impl DesktopEntry {
    /// Parse the `[Desktop Entry]` group of the key file at `path`.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Parse key-file text. Keys outside the `[Desktop Entry]` group are
    /// ignored, as are comments and malformed lines.
    pub fn parse(content: &str) -> Self {
        let mut entry = DesktopEntry::default();
        let mut in_group = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_group = line == GROUP_HEADER;
                continue;
            }
            if !in_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "Icon" => {
                    let value = value.trim();
                    if value.is_empty() {
                        entry.icon = None;
                    } else {
                        entry.icon = Some(strip_icon_suffix(value).to_string());
                    }
                }
                "Name" => {
                    let value = value.trim();
                    if !value.is_empty() {
                        entry.name = Some(value.to_string());
                    }
                }
                _ => {}
            }
        }

        entry
    }

    /// Replace (or insert) the `Name` key of the key file at `path`.
    ///
    /// The rewrite goes through a temporary file and rename so a failure
    /// cannot corrupt the entry.
    pub fn write_name(path: &Path, new_name: &str) -> io::Result<()> {
        let content = fs::read_to_string(path)?;
        let mut lines: Vec<String> = Vec::new();
        let mut in_group = false;
        let mut replaced = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') {
                // Append a missing Name key at the end of the group.
                if in_group && !replaced {
                    lines.push(format!("Name={}", new_name));
                    replaced = true;
                }
                in_group = trimmed == GROUP_HEADER;
                lines.push(line.to_string());
                continue;
            }
            if in_group && trimmed.starts_with("Name=") {
                lines.push(format!("Name={}", new_name));
                replaced = true;
                continue;
            }
            lines.push(line.to_string());
        }
        if in_group && !replaced {
            lines.push(format!("Name={}", new_name));
            replaced = true;
        }
        if !replaced {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "no [Desktop Entry] group",
            ));
        }

        let mut output = lines.join("\n");
        output.push('\n');

        let tmp = path.with_extension("desktop.tmp");
        fs::write(&tmp, output)?;
        fs::rename(&tmp, path)
    }
}

/// Strip a trailing `.png`, `.svg` or `.xpm` from a themed icon name.
fn strip_icon_suffix(icon: &str) -> &str {
    for suffix in [".png", ".svg", ".xpm"] {
        if let Some(stripped) = icon.strip_suffix(suffix) {
            return stripped;
        }
    }
    icon
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[Desktop Entry]
Type=Application
Name=Music Player
Icon=multimedia-player.png

[Other Group]
Name=Should Be Ignored
";

    #[test]
    fn parse_reads_name_and_icon() {
        let entry = DesktopEntry::parse(SAMPLE);
        assert_eq!(entry.name.as_deref(), Some("Music Player"));
        assert_eq!(entry.icon.as_deref(), Some("multimedia-player"));
    }

    #[test]
    fn empty_icon_is_cleared() {
        let entry = DesktopEntry::parse("[Desktop Entry]\nIcon=\n");
        assert_eq!(entry.icon, None);
    }

    #[test]
    fn write_name_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.desktop");
        std::fs::write(&path, SAMPLE).unwrap();

        DesktopEntry::write_name(&path, "Renamed Player").unwrap();

        let entry = DesktopEntry::load(&path).unwrap();
        assert_eq!(entry.name.as_deref(), Some("Renamed Player"));
        // Other groups left untouched.
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[Other Group]"));
        assert!(content.contains("Name=Should Be Ignored"));
    }

    #[test]
    fn write_name_appends_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.desktop");
        std::fs::write(&path, "[Desktop Entry]\nType=Link\n").unwrap();

        DesktopEntry::write_name(&path, "Added").unwrap();
        let entry = DesktopEntry::load(&path).unwrap();
        assert_eq!(entry.name.as_deref(), Some("Added"));
    }
}
