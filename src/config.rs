use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::ClassifierSettings;
use crate::detect::DetectorSettings;
use crate::ingest::SourceSettings;
use crate::pipeline::{LoopSettings, DEFAULT_MAX_CAPTURE_RETRIES};
use crate::publish::{
    parse_mqtt_endpoint, MqttSettings, TlsMaterials, DEFAULT_CLIENT_ID, DEFAULT_QUEUE_CAPACITY,
};
use crate::schedule::{Cadence, MAX_INTERVAL_MS};

pub const CONFIG_ENV: &str = "CAPTURE_RELAY_CONFIG";
const DEFAULT_BROKER_ADDR: &str = "localhost:1883";

#[derive(Debug, Deserialize, Default)]
struct RelayConfigFile {
    captured_images_path: Option<PathBuf>,
    check_still_images_path: Option<PathBuf>,
    schedule: Option<ScheduleConfigFile>,
    mqtt: Option<MqttConfigFile>,
    source: Option<SourceConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ScheduleConfigFile {
    capture_interval_ms: Option<u64>,
    snapshot_interval_ms: Option<u64>,
    max_capture_retries: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    broker_addr: Option<String>,
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    use_tls: Option<bool>,
    tls_ca_path: Option<PathBuf>,
    tls_client_cert_path: Option<PathBuf>,
    tls_client_key_path: Option<PathBuf>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    input_uri: Option<String>,
    camera: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    network: Option<String>,
    models_dir: Option<PathBuf>,
    labels: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model: Option<PathBuf>,
    labels: Option<PathBuf>,
    threshold: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub captured_dir: PathBuf,
    pub still_dir: PathBuf,
    /// Preview directory for `latest.jpg`. None disables the preview.
    pub preview_dir: Option<PathBuf>,
    pub cadence: Cadence,
    pub max_capture_retries: u32,
    pub mqtt: MqttConfig,
    pub source: SourceSettings,
    pub classifier: ClassifierSettings,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_addr: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub tls_ca_path: Option<PathBuf>,
    pub tls_client_cert_path: Option<PathBuf>,
    pub tls_client_key_path: Option<PathBuf>,
    pub queue_capacity: usize,
}

/// Command-line values. Anything set here wins over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_uri: Option<String>,
    pub output_uri: Option<String>,
    pub headless: bool,
    pub network: Option<String>,
    pub camera: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub models_dir: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub detector: Option<String>,
    pub detector_model: Option<PathBuf>,
    pub threshold: Option<f32>,
    pub mqtt_broker_addr: Option<String>,
    pub capture_interval_ms: Option<u64>,
    pub snapshot_interval_ms: Option<u64>,
}

impl RelayConfig {
    /// Defaults, then the file named by `CAPTURE_RELAY_CONFIG`, then the
    /// environment.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        Self::load_with(config_path.as_deref(), &ConfigOverrides::default())
    }

    pub fn load_with(config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RelayConfigFile) -> Self {
        let schedule = file.schedule.unwrap_or_default();
        let mqtt = file.mqtt.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        let classifier = file.classifier.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();

        let default_cadence = Cadence::default();
        let default_source = SourceSettings::default();
        let default_classifier = ClassifierSettings::default();
        let default_detector = DetectorSettings::default();

        Self {
            captured_dir: file.captured_images_path.unwrap_or_default(),
            still_dir: file.check_still_images_path.unwrap_or_default(),
            preview_dir: None,
            cadence: Cadence {
                capture_interval_ms: schedule
                    .capture_interval_ms
                    .unwrap_or(default_cadence.capture_interval_ms),
                snapshot_interval_ms: schedule
                    .snapshot_interval_ms
                    .unwrap_or(default_cadence.snapshot_interval_ms),
            },
            max_capture_retries: schedule
                .max_capture_retries
                .unwrap_or(DEFAULT_MAX_CAPTURE_RETRIES),
            mqtt: MqttConfig {
                broker_addr: mqtt
                    .broker_addr
                    .unwrap_or_else(|| DEFAULT_BROKER_ADDR.to_string()),
                client_id: mqtt
                    .client_id
                    .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
                username: mqtt.username,
                password: mqtt.password,
                use_tls: mqtt.use_tls.unwrap_or(false),
                tls_ca_path: mqtt.tls_ca_path,
                tls_client_cert_path: mqtt.tls_client_cert_path,
                tls_client_key_path: mqtt.tls_client_key_path,
                queue_capacity: mqtt.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            },
            source: SourceSettings {
                input_uri: source.input_uri.unwrap_or(default_source.input_uri),
                camera: source.camera.unwrap_or(default_source.camera),
                width: source.width.unwrap_or(default_source.width),
                height: source.height.unwrap_or(default_source.height),
            },
            classifier: ClassifierSettings {
                network: classifier.network.unwrap_or(default_classifier.network),
                models_dir: classifier
                    .models_dir
                    .unwrap_or(default_classifier.models_dir),
                labels_path: classifier.labels,
                input_size: default_classifier.input_size,
            },
            detector: DetectorSettings {
                backend: detector.backend.unwrap_or(default_detector.backend),
                model_path: detector.model,
                labels_path: detector.labels,
                threshold: detector.threshold.unwrap_or(default_detector.threshold),
                ..default_detector
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_nonempty("CAPTURED_IMAGES_PATH") {
            self.captured_dir = PathBuf::from(path);
        }
        if let Some(path) = env_nonempty("CHECK_STILL_IMAGES_PATH") {
            self.still_dir = PathBuf::from(path);
        }
        if let Some(addr) = env_nonempty("MQTT_BROKER_ADDR") {
            self.mqtt.broker_addr = addr;
        }
        if let Some(client_id) = env_nonempty("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(user) = env_nonempty("MQTT_USERNAME") {
            self.mqtt.username = Some(user);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(flag) = env_nonempty("MQTT_USE_TLS") {
            self.mqtt.use_tls = parse_bool(&flag)
                .ok_or_else(|| anyhow!("MQTT_USE_TLS must be true/false, got '{}'", flag))?;
        }
        if let Some(path) = env_nonempty("MQTT_TLS_CA_PATH") {
            self.mqtt.tls_ca_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_nonempty("MQTT_TLS_CLIENT_CERT_PATH") {
            self.mqtt.tls_client_cert_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_nonempty("MQTT_TLS_CLIENT_KEY_PATH") {
            self.mqtt.tls_client_key_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    fn apply_overrides(&mut self, o: &ConfigOverrides) {
        if let Some(uri) = &o.input_uri {
            self.source.input_uri = uri.clone();
        }
        if let Some(camera) = &o.camera {
            self.source.camera = camera.clone();
        }
        if let Some(width) = o.width {
            self.source.width = width;
        }
        if let Some(height) = o.height {
            self.source.height = height;
        }
        self.preview_dir = match (&o.output_uri, o.headless) {
            (Some(output), false) => Some(preview_path(output)),
            _ => None,
        };
        if let Some(network) = &o.network {
            self.classifier.network = network.clone();
        }
        if let Some(dir) = &o.models_dir {
            self.classifier.models_dir = dir.clone();
        }
        if let Some(labels) = &o.labels {
            self.classifier.labels_path = Some(labels.clone());
        }
        if let Some(backend) = &o.detector {
            self.detector.backend = backend.clone();
        }
        if let Some(model) = &o.detector_model {
            self.detector.model_path = Some(model.clone());
        }
        if let Some(threshold) = o.threshold {
            self.detector.threshold = threshold;
        }
        if let Some(addr) = &o.mqtt_broker_addr {
            self.mqtt.broker_addr = addr.clone();
        }
        if let Some(ms) = o.capture_interval_ms {
            self.cadence.capture_interval_ms = ms;
        }
        if let Some(ms) = o.snapshot_interval_ms {
            self.cadence.snapshot_interval_ms = ms;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.captured_dir.as_os_str().is_empty() {
            return Err(anyhow!(
                "CAPTURED_IMAGES_PATH is not set (environment or captured_images_path in the config file)"
            ));
        }
        if self.still_dir.as_os_str().is_empty() {
            return Err(anyhow!(
                "CHECK_STILL_IMAGES_PATH is not set (environment or check_still_images_path in the config file)"
            ));
        }
        if self.cadence.capture_interval_ms == 0 {
            return Err(anyhow!("capture interval must be greater than zero"));
        }
        if self.cadence.snapshot_interval_ms == 0 {
            return Err(anyhow!("snapshot interval must be greater than zero"));
        }
        for (name, value) in [
            ("capture", self.cadence.capture_interval_ms),
            ("snapshot", self.cadence.snapshot_interval_ms),
        ] {
            if value > MAX_INTERVAL_MS {
                return Err(anyhow!(
                    "{} interval of {}ms exceeds the {}ms limit",
                    name,
                    value,
                    MAX_INTERVAL_MS
                ));
            }
        }
        if self.mqtt.queue_capacity == 0 {
            return Err(anyhow!("mqtt queue capacity must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "frame size must be non-zero, got {}x{}",
                self.source.width,
                self.source.height
            ));
        }
        Ok(())
    }

    /// Resolve the broker endpoint and read TLS materials from disk.
    pub fn mqtt_settings(&self) -> Result<MqttSettings> {
        let endpoint = parse_mqtt_endpoint(&self.mqtt.broker_addr, self.mqtt.use_tls)?;
        let tls = TlsMaterials::load(
            self.mqtt.tls_ca_path.as_ref(),
            self.mqtt.tls_client_cert_path.as_ref(),
            self.mqtt.tls_client_key_path.as_ref(),
        )?;
        Ok(MqttSettings {
            endpoint,
            tls,
            client_id: self.mqtt.client_id.clone(),
            username: self.mqtt.username.clone(),
            password: self.mqtt.password.clone(),
            queue_capacity: self.mqtt.queue_capacity,
        })
    }

    pub fn loop_settings(&self) -> LoopSettings {
        let mut settings = LoopSettings::new(self.captured_dir.display().to_string());
        settings.cadence = self.cadence;
        settings.max_capture_retries = self.max_capture_retries;
        settings
    }
}

fn read_config_file(path: &Path) -> Result<RelayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `output_URI` may be a plain path or a `file://` URI.
fn preview_path(output: &str) -> PathBuf {
    PathBuf::from(output.strip_prefix("file://").unwrap_or(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bool_flags() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn file_defaults_fill_every_section() {
        let cfg = RelayConfig::from_file(RelayConfigFile::default());
        assert_eq!(cfg.cadence, Cadence::default());
        assert_eq!(cfg.max_capture_retries, DEFAULT_MAX_CAPTURE_RETRIES);
        assert_eq!(cfg.mqtt.broker_addr, "localhost:1883");
        assert_eq!(cfg.mqtt.client_id, "client_1");
        assert_eq!(cfg.mqtt.queue_capacity, 10);
        assert_eq!(cfg.source.width, 1280);
        assert_eq!(cfg.classifier.network, "googlenet");
        assert_eq!(cfg.detector.backend, "cpu");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn headless_disables_preview() {
        let mut cfg = RelayConfig::from_file(RelayConfigFile::default());
        let mut overrides = ConfigOverrides {
            output_uri: Some("file:///tmp/preview".to_string()),
            ..Default::default()
        };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.preview_dir, Some(PathBuf::from("/tmp/preview")));

        overrides.headless = true;
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.preview_dir, None);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut cfg = RelayConfig::from_file(RelayConfigFile::default());
        cfg.captured_dir = PathBuf::from("captured");
        cfg.still_dir = PathBuf::from("still");
        assert!(cfg.validate().is_ok());

        cfg.cadence.snapshot_interval_ms = 0;
        assert!(cfg.validate().is_err());
        cfg.cadence.snapshot_interval_ms = 2400;
        cfg.mqtt.queue_capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        let mut cfg = RelayConfig::from_file(RelayConfigFile::default());
        cfg.captured_dir = PathBuf::from("captured");
        cfg.still_dir = PathBuf::from("still");
        cfg.cadence.capture_interval_ms = MAX_INTERVAL_MS;
        assert!(cfg.validate().is_ok());

        cfg.cadence.capture_interval_ms = u64::MAX;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("capture interval"));

        cfg.cadence.capture_interval_ms = 400;
        cfg.cadence.snapshot_interval_ms = MAX_INTERVAL_MS + 1;
        assert!(cfg.validate().is_err());
    }
}
