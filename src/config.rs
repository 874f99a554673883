use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aircraft::TelloConfig;
use crate::detect::{DetectorConfig, Labels, TargetSelection};
use crate::policy::PolicyConfig;

const DEFAULT_SOURCE_URL: &str = "stub://tello";
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_BACKEND: &str = "cpu";
const DEFAULT_INPUT_SIZE: u32 = 416;
const DEFAULT_TELLO_ADDR: &str = "192.168.10.1:8889";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8889";
const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 7_000;
const DEFAULT_PAUSE_MS: u64 = 400;
const KNOWN_BACKENDS: [&str; 3] = ["cpu", "stub", "tract"];

#[derive(Debug, Deserialize, Default)]
struct AvoidConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    policy: Option<PolicyConfig>,
    aircraft: Option<AircraftConfigFile>,
    control: Option<ControlConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_size: Option<u32>,
    pixel_boxes: Option<bool>,
    confidence_threshold: Option<f32>,
    nms_score_threshold: Option<f32>,
    nms_iou_threshold: Option<f32>,
    target_label: Option<String>,
    selection: Option<TargetSelection>,
}

#[derive(Debug, Deserialize, Default)]
struct AircraftConfigFile {
    addr: Option<String>,
    bind_addr: Option<String>,
    response_timeout_ms: Option<u64>,
    takeoff: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ControlConfigFile {
    pause_ms: Option<u64>,
    max_cycles: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AvoidConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub policy: PolicyConfig,
    pub aircraft: AircraftSettings,
    pub control: ControlSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub pixel_boxes: bool,
    pub detection: DetectorConfig,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: None,
            labels_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            pixel_boxes: false,
            detection: DetectorConfig::default(),
        }
    }
}

impl DetectorSettings {
    /// Labels from `labels_path`, or the built-in COCO table.
    pub fn labels(&self) -> Result<Labels> {
        match &self.labels_path {
            Some(path) => Labels::load(path),
            None => Ok(Labels::coco()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AircraftSettings {
    pub addr: String,
    pub bind_addr: String,
    pub response_timeout: Duration,
    pub takeoff: bool,
}

impl AircraftSettings {
    pub fn tello_config(&self) -> TelloConfig {
        TelloConfig {
            addr: self.addr.clone(),
            bind_addr: self.bind_addr.clone(),
            response_timeout: self.response_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub pause: Duration,
    pub max_cycles: Option<u64>,
}

impl AvoidConfig {
    /// Load using the file named by `AVOID_CONFIG`, if set.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("AVOID_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// File (if any), then defaults, then environment overrides, then validation.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AvoidConfigFile) -> Self {
        let source = file.source.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let aircraft = file.aircraft.unwrap_or_default();
        let control = file.control.unwrap_or_default();
        let defaults = DetectorConfig::default();

        Self {
            source: SourceSettings {
                url: source
                    .url
                    .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
            },
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: detector.model_path,
                labels_path: detector.labels_path,
                input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                pixel_boxes: detector.pixel_boxes.unwrap_or(false),
                detection: DetectorConfig {
                    confidence_threshold: detector
                        .confidence_threshold
                        .unwrap_or(defaults.confidence_threshold),
                    nms_score_threshold: detector
                        .nms_score_threshold
                        .unwrap_or(defaults.nms_score_threshold),
                    nms_iou_threshold: detector
                        .nms_iou_threshold
                        .unwrap_or(defaults.nms_iou_threshold),
                    target_label: detector.target_label.unwrap_or(defaults.target_label),
                    selection: detector.selection.unwrap_or(defaults.selection),
                },
            },
            policy: file.policy.unwrap_or_default(),
            aircraft: AircraftSettings {
                addr: aircraft
                    .addr
                    .unwrap_or_else(|| DEFAULT_TELLO_ADDR.to_string()),
                bind_addr: aircraft
                    .bind_addr
                    .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
                response_timeout: Duration::from_millis(
                    aircraft
                        .response_timeout_ms
                        .unwrap_or(DEFAULT_RESPONSE_TIMEOUT_MS),
                ),
                takeoff: aircraft.takeoff.unwrap_or(true),
            },
            control: ControlSettings {
                pause: Duration::from_millis(control.pause_ms.unwrap_or(DEFAULT_PAUSE_MS)),
                max_cycles: control.max_cycles,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("AVOID_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(backend) = std::env::var("AVOID_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("AVOID_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(selection) = std::env::var("AVOID_SELECTION") {
            if !selection.trim().is_empty() {
                self.detector.detection.selection = selection.parse()?;
            }
        }
        if let Ok(addr) = std::env::var("AVOID_TELLO_ADDR") {
            if !addr.trim().is_empty() {
                self.aircraft.addr = addr;
            }
        }
        if let Ok(pause) = std::env::var("AVOID_PAUSE_MS") {
            let millis: u64 = pause.trim().parse().map_err(|_| {
                anyhow!("AVOID_PAUSE_MS must be an integer number of milliseconds")
            })?;
            self.control.pause = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.policy.validate()?;
        self.detector.detection.validate()?;

        if !KNOWN_BACKENDS.contains(&self.detector.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of {})",
                self.detector.backend,
                KNOWN_BACKENDS.join(", ")
            ));
        }
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("detector backend 'tract' requires model_path"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.aircraft.response_timeout.is_zero() {
            return Err(anyhow!("aircraft response timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AvoidConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
