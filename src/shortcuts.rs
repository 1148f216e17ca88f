//! Mapping tag ids and key names to something playable.
//!
//! A shortcut is an entry named after the identifier inside the shortcuts
//! directory: either a directory (usually a symlink) pointing at an audio
//! folder, or a one-line text file holding a folder path, `cmd://<action>`
//! or `extcmd://<shell command>`. Identifiers without an entry are looked up
//! by folder name in the audio tree.

use crate::config::BoxLayout;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const CMD_PREFIX: &str = "cmd://";
const EXTCMD_PREFIX: &str = "extcmd://";

/// How the folder-name scan compares an identifier with a directory name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRule {
    /// One of the hyphen separated parts of the name equals the identifier
    #[default]
    Token,
    /// The name contains the identifier anywhere
    Substring,
}

impl MatchRule {
    pub fn matches(&self, name: &str, id: &str) -> bool {
        match self {
            MatchRule::Token => name.split('-').any(|part| part == id),
            MatchRule::Substring => name.contains(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Folder relative to the audio root
    Folder,
    /// A dispatcher action name
    InlineCommand,
    /// A shell command line
    ExternalCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub kind: TargetKind,
    pub target: String,
}

impl Shortcut {
    fn folder(target: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Folder,
            target: target.into(),
        }
    }

    /// Parse the content of a shortcut file
    pub fn parse(content: &str) -> Option<Self> {
        let line = content.lines().next()?.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(action) = line.strip_prefix(CMD_PREFIX) {
            Some(Self {
                kind: TargetKind::InlineCommand,
                target: action.trim().to_string(),
            })
        } else if let Some(command) = line.strip_prefix(EXTCMD_PREFIX) {
            Some(Self {
                kind: TargetKind::ExternalCommand,
                target: command.trim().to_string(),
            })
        } else {
            Some(Self::folder(line.trim_end_matches('/')))
        }
    }
}

pub struct ShortcutResolver {
    shortcuts_dir: PathBuf,
    audio_dir: PathBuf,
    rule: MatchRule,
}

impl ShortcutResolver {
    pub fn new(layout: &BoxLayout, rule: MatchRule) -> Self {
        Self {
            shortcuts_dir: layout.shortcuts_dir.clone(),
            audio_dir: layout.audio_dir.clone(),
            rule,
        }
    }

    /// Resolve `id` to a target. `None` means the identifier is unknown,
    /// which is logged but not an error.
    pub fn resolve(&self, id: &str) -> Option<Shortcut> {
        if id.is_empty() {
            return None;
        }

        let entry = self.shortcuts_dir.join(id);
        let resolved = if is_plain_name(id) && entry.exists() {
            self.read_entry(&entry)
        } else {
            self.scan(id).map(Shortcut::folder)
        };

        match &resolved {
            Some(shortcut) => debug!("{} -> {:?}", id, shortcut),
            None => info!("ignoring id {}", id),
        }
        resolved
    }

    fn read_entry(&self, entry: &Path) -> Option<Shortcut> {
        if entry.is_dir() {
            return self.link_target(entry).map(Shortcut::folder);
        }

        match fs::read_to_string(entry) {
            Ok(content) => {
                let shortcut = Shortcut::parse(&content);
                if shortcut.is_none() {
                    warn!("empty shortcut file {}", entry.display());
                }
                shortcut
            }
            Err(e) => {
                warn!("cannot read shortcut {}: {}", entry.display(), e);
                None
            }
        }
    }

    /// Folder a directory entry points at, relative to the audio root.
    /// Relative link targets are taken relative to the audio root.
    fn link_target(&self, entry: &Path) -> Option<String> {
        let target = match fs::read_link(entry) {
            Ok(link) if link.is_absolute() => link,
            Ok(link) => {
                let from_root = self.audio_dir.join(&link);
                if from_root.exists() {
                    from_root
                } else {
                    // a link made with `ln -s ../audiofolders/x` still works
                    self.shortcuts_dir.join(link)
                }
            }
            Err(_) => entry.to_path_buf(),
        };

        let target = target.canonicalize().ok()?;
        let root = self.audio_dir.canonicalize().ok()?;
        match target.strip_prefix(&root) {
            Ok(rel) => Some(rel.to_string_lossy().into_owned()),
            Err(_) => {
                warn!(
                    "shortcut {} points outside the audio folder: {}",
                    entry.display(),
                    target.display()
                );
                None
            }
        }
    }

    /// First directory under the audio root whose name matches `id`.
    ///
    /// Depth first; inside each directory files come before directories and
    /// names compare case-insensitively.
    pub fn scan(&self, id: &str) -> Option<String> {
        WalkDir::new(&self.audio_dir)
            .min_depth(1)
            .follow_links(true)
            .sort_by(|a, b| scan_order(a.file_type().is_dir(), a.file_name(), b.file_type().is_dir(), b.file_name()))
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .find(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| self.rule.matches(name, id))
                    .unwrap_or(false)
            })
            .and_then(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.audio_dir)
                    .ok()
                    .map(|rel| rel.to_string_lossy().into_owned())
            })
    }

    /// Every shortcut entry by identifier; `None` for unreadable entries
    pub fn entries(&self) -> BTreeMap<String, Option<Shortcut>> {
        let mut result = BTreeMap::new();
        let dir = match fs::read_dir(&self.shortcuts_dir) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("cannot list {}: {}", self.shortcuts_dir.display(), e);
                return result;
            }
        };

        for entry in dir.filter_map(|e| e.ok()) {
            let id = entry.file_name().to_string_lossy().into_owned();
            let shortcut = self.read_entry(&entry.path());
            result.insert(id, shortcut);
        }
        result
    }

    /// Identifiers whose entry is unreadable or names a missing folder
    pub fn broken(&self) -> Vec<(String, Option<String>)> {
        self.entries()
            .into_iter()
            .filter_map(|(id, shortcut)| match shortcut {
                None => Some((id, None)),
                Some(s) if s.kind == TargetKind::Folder && !self.audio_dir.join(&s.target).is_dir() => {
                    Some((id, Some(s.target)))
                }
                Some(_) => None,
            })
            .collect()
    }

    /// Folders reachable through more than one identifier
    pub fn duplicates(&self) -> BTreeMap<String, Vec<String>> {
        let mut by_folder: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (id, shortcut) in self.entries() {
            if let Some(s) = shortcut.filter(|s| s.kind == TargetKind::Folder) {
                by_folder.entry(s.target).or_default().push(id);
            }
        }
        by_folder.retain(|_, ids| ids.len() > 1);
        by_folder
    }
}

fn is_plain_name(id: &str) -> bool {
    !id.contains('/') && id != "." && id != ".."
}

fn scan_order(a_dir: bool, a: &std::ffi::OsStr, b_dir: bool, b: &std::ffi::OsStr) -> Ordering {
    a_dir.cmp(&b_dir).then_with(|| {
        a.to_string_lossy()
            .to_lowercase()
            .cmp(&b.to_string_lossy().to_lowercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, ShortcutResolver) {
        let base = TempDir::new().unwrap();
        let layout = BoxLayout::new(base.path());
        fs::create_dir_all(&layout.shortcuts_dir).unwrap();
        for dir in [
            "Stories/42-RedRidingHood",
            "Stories/7-Snow-White",
            "Music/a-42b",
            "Music/Zebra-9",
            "music2/9-late",
        ] {
            fs::create_dir_all(layout.audio_dir.join(dir)).unwrap();
        }
        let resolver = ShortcutResolver::new(&layout, MatchRule::Token);
        (base, resolver)
    }

    #[test]
    fn test_token_rule() {
        assert!(MatchRule::Token.matches("42-RedRidingHood", "42"));
        assert!(!MatchRule::Token.matches("a-42b", "42"));
        assert!(MatchRule::Substring.matches("a-42b", "42"));
    }

    #[test]
    fn test_parse_file_content() {
        assert_eq!(
            Shortcut::parse("cmd://next\n"),
            Some(Shortcut {
                kind: TargetKind::InlineCommand,
                target: "next".to_string()
            })
        );
        assert_eq!(
            Shortcut::parse("extcmd://sudo poweroff"),
            Some(Shortcut {
                kind: TargetKind::ExternalCommand,
                target: "sudo poweroff".to_string()
            })
        );
        assert_eq!(Shortcut::parse("Stories/Moomins/\n"), Some(Shortcut::folder("Stories/Moomins")));
        assert_eq!(Shortcut::parse("  \n"), None);
    }

    #[test]
    fn test_scan_fallback() {
        let (_base, resolver) = fixture();
        let found = resolver.resolve("42").unwrap();
        assert_eq!(found, Shortcut::folder("Stories/42-RedRidingHood"));
        assert_eq!(resolver.resolve("404"), None);
    }

    #[test]
    fn test_scan_order_is_case_insensitive_depth_first() {
        let (_base, resolver) = fixture();
        // Music/Zebra-9 sorts before music2/9-late
        assert_eq!(resolver.scan("9").as_deref(), Some("Music/Zebra-9"));
    }

    #[test]
    fn test_substring_rule() {
        let (base, _) = fixture();
        let resolver = ShortcutResolver::new(&BoxLayout::new(base.path()), MatchRule::Substring);
        assert_eq!(resolver.scan("42").as_deref(), Some("Music/a-42b"));
    }

    #[test]
    fn test_file_entry_beats_scan() {
        let (base, resolver) = fixture();
        let layout = BoxLayout::new(base.path());
        fs::write(layout.shortcuts_dir.join("42"), "cmd://next\n").unwrap();

        let found = resolver.resolve("42").unwrap();
        assert_eq!(found.kind, TargetKind::InlineCommand);
        assert_eq!(found.target, "next");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_entries() {
        let (base, resolver) = fixture();
        let layout = BoxLayout::new(base.path());

        std::os::unix::fs::symlink(
            layout.audio_dir.join("Stories/7-Snow-White"),
            layout.shortcuts_dir.join("abs"),
        )
        .unwrap();
        std::os::unix::fs::symlink("Stories/42-RedRidingHood", layout.shortcuts_dir.join("rel")).unwrap();

        assert_eq!(resolver.resolve("abs"), Some(Shortcut::folder("Stories/7-Snow-White")));
        assert_eq!(resolver.resolve("rel"), Some(Shortcut::folder("Stories/42-RedRidingHood")));
    }

    #[test]
    fn test_ids_cannot_escape_shortcut_dir() {
        let (_base, resolver) = fixture();
        assert_eq!(resolver.resolve("../audiofolders"), None);
        assert_eq!(resolver.resolve(""), None);
    }

    #[test]
    fn test_broken_and_duplicates() {
        let (base, resolver) = fixture();
        let layout = BoxLayout::new(base.path());
        fs::write(layout.shortcuts_dir.join("1"), "Stories/42-RedRidingHood").unwrap();
        fs::write(layout.shortcuts_dir.join("2"), "Stories/42-RedRidingHood").unwrap();
        fs::write(layout.shortcuts_dir.join("3"), "Stories/Gone").unwrap();
        fs::write(layout.shortcuts_dir.join("4"), "").unwrap();
        fs::write(layout.shortcuts_dir.join("5"), "cmd://pause").unwrap();

        let broken = resolver.broken();
        assert_eq!(
            broken,
            vec![
                ("3".to_string(), Some("Stories/Gone".to_string())),
                ("4".to_string(), None)
            ]
        );

        let dups = resolver.duplicates();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups["Stories/42-RedRidingHood"], vec!["1".to_string(), "2".to_string()]);
    }
}
