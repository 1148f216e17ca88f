//! Per-folder metadata stored next to the audio files.
//!
//! * `folder.json`: playback settings, merged from the audio root down to
//!   the folder being played; deeper folders win.
//! * `lastPos.json`: where playback stopped, for folders with `resume`.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

pub const FOLDER_CONFIG_FILE: &str = "folder.json";
pub const RESUME_FILE: &str = "lastPos.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderType {
    /// Audio files inside the folder itself
    Music,
    /// A single stream URI
    Stream,
    /// A saved playlist
    Playlist,
    /// A saved playlist of streams
    PlaylistStream,
}

impl FolderType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "music" => Some(Self::Music),
            "stream" => Some(Self::Stream),
            "playlist" => Some(Self::Playlist),
            "playlist-stream" => Some(Self::PlaylistStream),
            _ => None,
        }
    }
}

/// Merged `folder.json` settings for one folder.
///
/// Unknown keys are kept so that newer settings survive a round trip through
/// older binaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderConfig {
    values: Map<String, Value>,
}

impl FolderConfig {
    /// Merge layers given as `(depth, settings)`; a deeper layer overrides
    /// the same key of a shallower one no matter the order they arrive in.
    pub fn merged<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = (usize, Map<String, Value>)>,
    {
        let mut layers: Vec<_> = layers.into_iter().collect();
        // stable: equal depths keep their given order
        layers.sort_by_key(|(depth, _)| *depth);

        let mut values = Map::new();
        for (_, layer) in layers {
            values.extend(layer);
        }
        Self { values }
    }

    /// Read every `folder.json` on the way from `audio_root` to `folder`
    /// (`folder` is relative to `audio_root`). The root's own file is not
    /// part of the chain.
    pub fn load(audio_root: &Path, folder: &Path) -> Self {
        let mut dir = audio_root.to_path_buf();
        let mut layers = Vec::new();

        for (depth, part) in folder.components().enumerate() {
            let Component::Normal(part) = part else {
                continue;
            };
            dir.push(part);
            if let Some(layer) = read_layer(&dir.join(FOLDER_CONFIG_FILE)) {
                layers.push((depth, layer));
            }
        }

        Self::merged(layers)
    }

    /// Folder type name, `music` when unset
    pub fn kind(&self) -> &str {
        self.values
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("music")
    }

    pub fn folder_type(&self) -> Option<FolderType> {
        FolderType::parse(self.kind())
    }

    pub fn uri(&self) -> Option<&str> {
        self.values.get("uri").and_then(Value::as_str)
    }

    /// The configured URI with a leading `./` resolved against `folder`
    pub fn resolved_uri(&self, folder: &Path) -> Option<String> {
        let uri = self.uri()?;
        match uri.strip_prefix("./") {
            Some(rest) => Some(folder.join(rest).to_string_lossy().into_owned()),
            None => Some(uri.to_string()),
        }
    }

    pub fn resume(&self) -> bool {
        self.values
            .get("resume")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

fn read_layer(path: &Path) -> Option<Map<String, Value>> {
    if !path.is_file() {
        return None;
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<Map<String, Value>>(&content) {
        Ok(layer) => Some(layer),
        Err(e) => {
            warn!("ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

/// Saved playback position of a folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumePosition {
    #[serde(default, deserialize_with = "lenient_number")]
    pub song: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub elapsed: Option<f64>,
}

impl ResumePosition {
    pub fn path(folder_abs: &Path) -> PathBuf {
        folder_abs.join(RESUME_FILE)
    }

    /// `None` when nothing was saved or the file cannot be parsed
    pub fn read(folder_abs: &Path) -> Option<Self> {
        let path = Self::path(folder_abs);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(pos) => Some(pos),
            Err(e) => {
                warn!("failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn write(&self, folder_abs: &Path) -> Result<()> {
        let path = Self::path(folder_abs);
        let content = serde_json::to_string(self)?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Older files carry the daemon's raw status strings (`"song": "3"`).
fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr + serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(other) => serde_json::from_value(other).ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn layer(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_deeper_layer_wins_regardless_of_order() {
        let parent = layer(json!({"type": "stream", "resume": false, "uri": "http://a"}));
        let child = layer(json!({"resume": true}));

        let forward = FolderConfig::merged(vec![(0, parent.clone()), (1, child.clone())]);
        let backward = FolderConfig::merged(vec![(1, child), (0, parent)]);

        assert_eq!(forward, backward);
        assert!(forward.resume());
        assert_eq!(forward.kind(), "stream");
        assert_eq!(forward.uri(), Some("http://a"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = layer(json!({"type": "playlist"}));
        let once = FolderConfig::merged(vec![(0, a.clone())]);
        let twice = FolderConfig::merged(vec![(0, a.clone()), (0, a)]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_load_walks_folder_chain() {
        let root = TempDir::new().unwrap();
        let deep = root.path().join("Radio/Kids");
        fs::create_dir_all(&deep).unwrap();
        fs::write(root.path().join("folder.json"), r#"{"type": "playlist"}"#).unwrap();
        fs::write(root.path().join("Radio/folder.json"), r#"{"type": "stream", "uri": "./live.m3u"}"#).unwrap();
        fs::write(deep.join("folder.json"), r#"{"resume": true}"#).unwrap();

        let conf = FolderConfig::load(root.path(), Path::new("Radio/Kids"));
        assert_eq!(conf.folder_type(), Some(FolderType::Stream));
        assert!(conf.resume());
        assert_eq!(
            conf.resolved_uri(Path::new("Radio/Kids")).as_deref(),
            Some("Radio/Kids/live.m3u")
        );
    }

    #[test]
    fn test_malformed_layer_is_skipped() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("A/B")).unwrap();
        fs::write(root.path().join("A/folder.json"), r#"{"resume": true}"#).unwrap();
        fs::write(root.path().join("A/B/folder.json"), "{ not json").unwrap();

        let conf = FolderConfig::load(root.path(), Path::new("A/B"));
        assert!(conf.resume());
        assert_eq!(conf.folder_type(), Some(FolderType::Music));
    }

    #[test]
    fn test_unknown_type() {
        let conf = FolderConfig::merged(vec![(0, layer(json!({"type": "vinyl"})))]);
        assert_eq!(conf.kind(), "vinyl");
        assert_eq!(conf.folder_type(), None);
    }

    #[test]
    fn test_resume_position_round_trip() {
        let dir = TempDir::new().unwrap();
        let pos = ResumePosition {
            song: Some(4),
            elapsed: Some(83.25),
        };
        pos.write(dir.path()).unwrap();
        assert_eq!(ResumePosition::read(dir.path()), Some(pos));
    }

    #[test]
    fn test_resume_position_accepts_legacy_strings() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(RESUME_FILE), r#"{"song": "3", "elapsed": "31.200"}"#).unwrap();

        let pos = ResumePosition::read(dir.path()).unwrap();
        assert_eq!(pos.song, Some(3));
        assert_eq!(pos.elapsed, Some(31.2));
    }

    #[test]
    fn test_resume_position_missing_fields() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(RESUME_FILE), r#"{"song": null}"#).unwrap();

        let pos = ResumePosition::read(dir.path()).unwrap();
        assert_eq!(pos, ResumePosition::default());
        assert!(ResumePosition::read(&dir.path().join("nope")).is_none());
    }
}
