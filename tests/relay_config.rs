use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use capture_relay::config::{ConfigOverrides, RelayConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CAPTURE_RELAY_CONFIG",
        "CAPTURED_IMAGES_PATH",
        "CHECK_STILL_IMAGES_PATH",
        "MQTT_BROKER_ADDR",
        "MQTT_CLIENT_ID",
        "MQTT_USERNAME",
        "MQTT_PASSWORD",
        "MQTT_USE_TLS",
        "MQTT_TLS_CA_PATH",
        "MQTT_TLS_CLIENT_CERT_PATH",
        "MQTT_TLS_CLIENT_KEY_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "captured_images_path": "/srv/captured",
        "check_still_images_path": "/srv/still",
        "schedule": {
            "capture_interval_ms": 500,
            "max_capture_retries": 3
        },
        "mqtt": {
            "broker_addr": "broker.local:1883",
            "client_id": "relay-7",
            "queue_capacity": 32
        },
        "source": {
            "input_uri": "stub://bench?frames=5",
            "width": 640,
            "height": 480
        },
        "classifier": {
            "network": "stub"
        },
        "detector": {
            "backend": "stub",
            "threshold": 0.7
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("CAPTURE_RELAY_CONFIG", file.path());
    std::env::set_var("CHECK_STILL_IMAGES_PATH", "/data/still");
    std::env::set_var("MQTT_BROKER_ADDR", "mqtts://broker.example.com");
    std::env::set_var("MQTT_USERNAME", "relay");
    std::env::set_var("MQTT_PASSWORD", "secret");

    let cfg = RelayConfig::load().expect("load config");

    assert_eq!(cfg.captured_dir, PathBuf::from("/srv/captured"));
    assert_eq!(cfg.still_dir, PathBuf::from("/data/still"));
    assert_eq!(cfg.cadence.capture_interval_ms, 500);
    assert_eq!(cfg.cadence.snapshot_interval_ms, 2400);
    assert_eq!(cfg.max_capture_retries, 3);
    assert_eq!(cfg.mqtt.client_id, "relay-7");
    assert_eq!(cfg.mqtt.queue_capacity, 32);
    assert_eq!(cfg.source.input_uri, "stub://bench?frames=5");
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.classifier.network, "stub");
    assert_eq!(cfg.detector.backend, "stub");
    assert!((cfg.detector.threshold - 0.7).abs() < f32::EPSILON);
    assert!(cfg.preview_dir.is_none());

    let mqtt = cfg.mqtt_settings().expect("mqtt settings");
    assert_eq!(mqtt.endpoint.host, "broker.example.com");
    assert_eq!(mqtt.endpoint.port, 8883);
    assert!(mqtt.endpoint.use_tls);
    assert_eq!(mqtt.username.as_deref(), Some("relay"));
    assert_eq!(mqtt.password.as_deref(), Some("secret"));

    let loop_settings = cfg.loop_settings();
    assert_eq!(loop_settings.captured_path, "/srv/captured");
    assert_eq!(loop_settings.max_capture_retries, 3);

    clear_env();
}

#[test]
fn command_line_wins_over_environment() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAPTURED_IMAGES_PATH", "/data/captured");
    std::env::set_var("CHECK_STILL_IMAGES_PATH", "/data/still");
    std::env::set_var("MQTT_BROKER_ADDR", "env-broker:1883");

    let overrides = ConfigOverrides {
        input_uri: Some("stub://cli".to_string()),
        output_uri: Some("/tmp/preview".to_string()),
        network: Some("stub".to_string()),
        mqtt_broker_addr: Some("cli-broker:2883".to_string()),
        capture_interval_ms: Some(250),
        ..Default::default()
    };
    let cfg = RelayConfig::load_with(None, &overrides).expect("load config");

    assert_eq!(cfg.source.input_uri, "stub://cli");
    assert_eq!(cfg.preview_dir, Some(PathBuf::from("/tmp/preview")));
    assert_eq!(cfg.mqtt.broker_addr, "cli-broker:2883");
    assert_eq!(cfg.cadence.capture_interval_ms, 250);
    assert_eq!(cfg.classifier.network, "stub");
    assert_eq!(cfg.mqtt.client_id, "client_1");

    clear_env();
}

#[test]
fn toml_config_is_accepted() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
captured_images_path = "/srv/captured"
check_still_images_path = "/srv/still"

[schedule]
snapshot_interval_ms = 4800

[mqtt]
use_tls = true
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = RelayConfig::load_with(Some(file.path()), &ConfigOverrides::default())
        .expect("load config");
    assert_eq!(cfg.cadence.snapshot_interval_ms, 4800);
    assert!(cfg.mqtt.use_tls);
    assert_eq!(cfg.still_dir, PathBuf::from("/srv/still"));

    clear_env();
}

#[test]
fn missing_image_directories_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let err = RelayConfig::load().expect_err("captured path is required");
    assert!(err.to_string().contains("CAPTURED_IMAGES_PATH"));

    std::env::set_var("CAPTURED_IMAGES_PATH", "/data/captured");
    let err = RelayConfig::load().expect_err("still path is required");
    assert!(err.to_string().contains("CHECK_STILL_IMAGES_PATH"));

    clear_env();
}

#[test]
fn invalid_tls_flag_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAPTURED_IMAGES_PATH", "/data/captured");
    std::env::set_var("CHECK_STILL_IMAGES_PATH", "/data/still");
    std::env::set_var("MQTT_USE_TLS", "sometimes");
    assert!(RelayConfig::load().is_err());

    clear_env();
}
