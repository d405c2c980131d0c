//! Configuration resolution.
//!
//! A run is configured by one immutable [`Config`] snapshot, built by deep-merging
//! a built-in default tree with up to three override trees, in order:
//!
//! 1. an optional YAML/JSON override file (`--config` or `DEPTHCAM_CONFIG`)
//! 2. scalar environment overrides (`DEPTHCAM_DEVICE_URL`, `DEPTHCAM_OUTPUT_DIR`)
//! 3. command-line flags
//!
//! Merge rule: where both sides hold a mapping the merge recurses; any other
//! override value (scalar or list) replaces the default wholesale.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::render::Colormap;

pub const CONFIG_ENV: &str = "DEPTHCAM_CONFIG";
pub const DEVICE_URL_ENV: &str = "DEPTHCAM_DEVICE_URL";
pub const OUTPUT_DIR_ENV: &str = "DEPTHCAM_OUTPUT_DIR";

const DEFAULT_CONFIG_YAML: &str = r#"
mode: record
device:
  url: "stub://oak-d"
camera:
  rgb_resolution: [1280, 800]
  fps: 30
  recording_time: 10
output:
  base_path: "./data"
  rgb_filename: "rgb_video.y4m"
  depth_filename: "depth_video.y4m"
  detection_filename: "object_detection.y4m"
depth:
  colormap: "COLORMAP_JET"
  normalize: true
  equalize_hist: true
detection:
  confidence_threshold: 0.5
  preview_size: [304, 304]
  save_video: false
  display_info: true
  first_frame_timeout_secs: 10
logging:
  level: "info"
  file: null
"#;

/// Where the optional override tree comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// No override requested; defaults are used silently.
    Defaults,
    /// Override requested; a missing or unparseable file is an error.
    File(PathBuf),
}

impl ConfigSource {
    /// Explicit path wins, then `DEPTHCAM_CONFIG`, then defaults.
    pub fn from_arg_or_env(path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            return Self::File(path);
        }
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::File(PathBuf::from(path)),
            _ => Self::Defaults,
        }
    }
}

// ----------------------------------------------------------------------------
// Tree operations
// ----------------------------------------------------------------------------

/// Parse the built-in default tree. Every call returns a fresh, unshared copy.
pub fn default_tree() -> Result<Value> {
    serde_yaml::from_str(DEFAULT_CONFIG_YAML)
        .map_err(|e| Error::invalid_config(format!("built-in defaults: {e}")))
}

/// Recursively merge `overrides` into `base`.
pub fn deep_merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Mapping(base_map), Value::Mapping(over_map)) => {
            for (key, over_value) in over_map {
                let recurse = matches!(
                    (base_map.get(key), over_value),
                    (Some(Value::Mapping(_)), Value::Mapping(_))
                );
                if recurse {
                    if let Some(base_value) = base_map.get_mut(key) {
                        deep_merge(base_value, over_value);
                    }
                } else {
                    base_map.insert(key.clone(), over_value.clone());
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// Merge into a deep copy of `default`; neither input is modified.
pub fn merged(default: &Value, overrides: Option<&Value>) -> Value {
    let mut tree = default.clone();
    if let Some(overrides) = overrides {
        deep_merge(&mut tree, overrides);
    }
    tree
}

/// Resolve a typed snapshot from a default tree and an optional override tree.
pub fn resolve(default: &Value, overrides: Option<&Value>) -> Result<Config> {
    Config::from_tree(merged(default, overrides))
}

/// Read an override file. Empty documents resolve to an empty mapping.
pub fn read_override_file(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let tree: Value = serde_yaml::from_str(&raw).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    match tree {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        Value::Mapping(_) => Ok(tree),
        _ => Err(Error::ConfigParse {
            path: path.to_path_buf(),
            reason: "top-level document must be a mapping".to_string(),
        }),
    }
}

/// Builder for override trees addressed by dotted keys (`camera.fps`).
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    tree: Mapping,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, dotted_key: &str, value: impl Into<Value>) -> &mut Self {
        let parts: Vec<&str> = dotted_key.split('.').filter(|p| !p.is_empty()).collect();
        insert_path(&mut self.tree, &parts, value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn into_tree(self) -> Value {
        Value::Mapping(self.tree)
    }
}

fn insert_path(node: &mut Mapping, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [leaf] => {
            node.insert(Value::from(*leaf), value);
        }
        [head, rest @ ..] => {
            let key = Value::from(*head);
            if !matches!(node.get(&key), Some(Value::Mapping(_))) {
                node.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            if let Some(Value::Mapping(inner)) = node.get_mut(&key) {
                insert_path(inner, rest, value);
            }
        }
    }
}

fn env_overrides() -> Overrides {
    let mut overrides = Overrides::new();
    if let Ok(url) = std::env::var(DEVICE_URL_ENV) {
        if !url.trim().is_empty() {
            overrides.set("device.url", url);
        }
    }
    if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
        if !dir.trim().is_empty() {
            overrides.set("output.base_path", dir);
        }
    }
    overrides
}

// ----------------------------------------------------------------------------
// Typed snapshot
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ConfigFile {
    mode: Mode,
    device: DeviceFile,
    camera: CameraFile,
    output: OutputFile,
    depth: DepthFile,
    detection: DetectionFile,
    logging: LoggingFile,
}

#[derive(Debug, Deserialize)]
struct DeviceFile {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CameraFile {
    rgb_resolution: [u32; 2],
    fps: u32,
    recording_time: u64,
}

#[derive(Debug, Deserialize)]
struct OutputFile {
    base_path: PathBuf,
    rgb_filename: String,
    depth_filename: String,
    detection_filename: String,
}

#[derive(Debug, Deserialize)]
struct DepthFile {
    colormap: String,
    normalize: bool,
    equalize_hist: bool,
}

#[derive(Debug, Deserialize)]
struct DetectionFile {
    confidence_threshold: f32,
    preview_size: [u32; 2],
    save_video: bool,
    display_info: bool,
    first_frame_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct LoggingFile {
    level: String,
    file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Record,
    ObjectDetection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn from_pair(pair: [u32; 2], what: &str) -> Result<Self> {
        let [width, height] = pair;
        if width == 0 || height == 0 {
            return Err(Error::invalid_config(format!(
                "{what} must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }
}

#[derive(Clone, Debug)]
pub struct DeviceSettings {
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub rgb_resolution: Resolution,
    pub fps: u32,
    pub recording_time: Duration,
}

#[derive(Clone, Debug)]
pub struct OutputSettings {
    pub base_path: PathBuf,
    pub rgb_filename: String,
    pub depth_filename: String,
    pub detection_filename: String,
}

impl OutputSettings {
    pub fn rgb_path(&self) -> PathBuf {
        self.base_path.join(&self.rgb_filename)
    }

    pub fn depth_path(&self) -> PathBuf {
        self.base_path.join(&self.depth_filename)
    }

    pub fn detection_path(&self) -> PathBuf {
        self.base_path.join(&self.detection_filename)
    }
}

#[derive(Clone, Debug)]
pub struct DepthSettings {
    pub colormap: Colormap,
    pub normalize: bool,
    pub equalize_hist: bool,
}

#[derive(Clone, Debug)]
pub struct DetectionSettings {
    pub confidence_threshold: f32,
    pub preview_size: Resolution,
    pub save_video: bool,
    pub display_info: bool,
    pub first_frame_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

/// Immutable configuration snapshot for one run.
#[derive(Clone, Debug)]
pub struct Config {
    pub mode: Mode,
    pub device: DeviceSettings,
    pub camera: CameraSettings,
    pub output: OutputSettings,
    pub depth: DepthSettings,
    pub detection: DetectionSettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Built-in defaults with no overrides at all.
    pub fn defaults() -> Result<Self> {
        resolve(&default_tree()?, None)
    }

    /// Full resolution chain: defaults, override file, environment, CLI flags.
    pub fn load(source: &ConfigSource, cli: Option<&Value>) -> Result<Self> {
        let mut tree = default_tree()?;
        match source {
            ConfigSource::Defaults => {}
            ConfigSource::File(path) => {
                let file_tree = read_override_file(path)?;
                deep_merge(&mut tree, &file_tree);
                log::info!("loaded configuration from {}", path.display());
            }
        }
        let env = env_overrides();
        if !env.is_empty() {
            deep_merge(&mut tree, &env.into_tree());
        }
        if let Some(cli) = cli {
            deep_merge(&mut tree, cli);
        }
        Self::from_tree(tree)
    }

    fn from_tree(tree: Value) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_value(tree)
            .map_err(|e| Error::invalid_config(e.to_string()))?;
        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let rgb_resolution = Resolution::from_pair(file.camera.rgb_resolution, "camera.rgb_resolution")?;
        if file.camera.fps == 0 {
            return Err(Error::invalid_config("camera.fps must be >= 1"));
        }
        let threshold = file.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::invalid_config(format!(
                "detection.confidence_threshold must be within [0, 1], got {threshold}"
            )));
        }
        let preview_size = Resolution::from_pair(file.detection.preview_size, "detection.preview_size")?;
        if file.detection.first_frame_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "detection.first_frame_timeout_secs must be greater than zero",
            ));
        }
        for (key, name) in [
            ("output.rgb_filename", &file.output.rgb_filename),
            ("output.depth_filename", &file.output.depth_filename),
            ("output.detection_filename", &file.output.detection_filename),
        ] {
            if name.trim().is_empty() {
                return Err(Error::invalid_config(format!("{key} must not be empty")));
            }
        }
        if file.device.url.trim().is_empty() {
            return Err(Error::invalid_config("device.url must not be empty"));
        }
        let colormap: Colormap = file.depth.colormap.parse()?;

        Ok(Self {
            mode: file.mode,
            device: DeviceSettings {
                url: file.device.url,
            },
            camera: CameraSettings {
                rgb_resolution,
                fps: file.camera.fps,
                recording_time: Duration::from_secs(file.camera.recording_time),
            },
            output: OutputSettings {
                base_path: file.output.base_path,
                rgb_filename: file.output.rgb_filename,
                depth_filename: file.output.depth_filename,
                detection_filename: file.output.detection_filename,
            },
            depth: DepthSettings {
                colormap,
                normalize: file.depth.normalize,
                equalize_hist: file.depth.equalize_hist,
            },
            detection: DetectionSettings {
                confidence_threshold: threshold,
                preview_size,
                save_video: file.detection.save_video,
                display_info: file.detection.display_info,
                first_frame_timeout: Duration::from_secs(file.detection.first_frame_timeout_secs),
            },
            logging: LoggingSettings {
                level: file.logging.level,
                file: file.logging.file,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn defaults_resolve() {
        let cfg = Config::defaults().unwrap();
        assert_eq!(cfg.camera.fps, 30);
        assert_eq!(cfg.camera.rgb_resolution, Resolution::new(1280, 800));
        assert_eq!(cfg.camera.recording_time, Duration::from_secs(10));
        assert_eq!(cfg.depth.colormap, Colormap::Jet);
        assert_eq!(cfg.mode, Mode::Record);
        assert!(cfg.detection.display_info);
    }

    #[test]
    fn merge_recurses_into_mappings_and_keeps_siblings() {
        let base = tree("camera: {fps: 30, recording_time: 10}\noutput: {base_path: a}");
        let out = merged(&base, Some(&tree("camera: {fps: 60}")));
        assert_eq!(out["camera"]["fps"], Value::from(60));
        assert_eq!(out["camera"]["recording_time"], Value::from(10));
        assert_eq!(out["output"]["base_path"], Value::from("a"));
    }

    #[test]
    fn merge_replaces_lists_wholesale() {
        let base = tree("camera: {rgb_resolution: [1280, 800]}");
        let out = merged(&base, Some(&tree("camera: {rgb_resolution: [640]}")));
        assert_eq!(out["camera"]["rgb_resolution"], tree("[640]"));
    }

    #[test]
    fn merge_adds_override_only_keys() {
        let base = tree("camera: {fps: 30}");
        let out = merged(&base, Some(&tree("extra: {flag: true}")));
        assert_eq!(out["extra"]["flag"], Value::from(true));
    }

    #[test]
    fn merge_does_not_touch_inputs() {
        let base = tree("camera: {fps: 30}");
        let overrides = tree("camera: {fps: 60}");
        let _ = merged(&base, Some(&overrides));
        assert_eq!(base["camera"]["fps"], Value::from(30));
    }

    #[test]
    fn overrides_builder_nests_dotted_keys() {
        let mut overrides = Overrides::new();
        overrides.set("camera.fps", 60u32).set("camera.recording_time", 2u64);
        overrides.set("output.base_path", "/tmp/x");
        let tree = overrides.into_tree();
        assert_eq!(tree["camera"]["fps"], Value::from(60u32));
        assert_eq!(tree["camera"]["recording_time"], Value::from(2u64));
        assert_eq!(tree["output"]["base_path"], Value::from("/tmp/x"));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = resolve(
            &default_tree().unwrap(),
            Some(&tree("detection: {confidence_threshold: 1.5}")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_resolution() {
        let err = resolve(
            &default_tree().unwrap(),
            Some(&tree("camera: {rgb_resolution: [0, 800]}")),
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn unknown_colormap_fails_fast() {
        let err = resolve(
            &default_tree().unwrap(),
            Some(&tree("depth: {colormap: COLORMAP_PLAID}")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownColormap(name) if name == "COLORMAP_PLAID"));
    }
}
