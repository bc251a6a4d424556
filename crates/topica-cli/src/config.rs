//! Broker configuration – reads/writes `~/.topica/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use topica_serial::RegistrySink;
use topica_server::{DEFAULT_PORT, ServerConfig};

/// Persisted broker configuration stored in `~/.topica/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Heartbeat ping period in milliseconds.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    /// Smallest SUBSCRIBE interval accepted.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: i32,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Per-session subscription cap.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,

    /// Refuse topic creation from clients.
    #[serde(default)]
    pub strict: bool,

    /// Log topic creation and session lifecycle at `info`.
    #[serde(default = "default_verbose")]
    pub verbose: bool,

    /// Serial device carrying the LiDAR stream (e.g. `/dev/ttyACM0`).
    /// The device must already be configured (baud rate, raw mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_device: Option<String>,

    /// Topic prefix for serial records.
    #[serde(default = "default_serial_prefix")]
    pub serial_prefix: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_heartbeat_ms() -> u64 {
    500
}
fn default_min_interval_ms() -> i32 {
    10
}
fn default_send_timeout_ms() -> u64 {
    1000
}
fn default_max_subscriptions() -> usize {
    64
}
fn default_verbose() -> bool {
    true
}
fn default_serial_prefix() -> String {
    RegistrySink::DEFAULT_PREFIX.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            heartbeat_ms: default_heartbeat_ms(),
            min_interval_ms: default_min_interval_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            max_subscriptions: default_max_subscriptions(),
            strict: false,
            verbose: default_verbose(),
            serial_device: None,
            serial_prefix: default_serial_prefix(),
        }
    }
}

impl Config {
    /// Broker tunables derived from this config.
    pub fn server_config(&self) -> Result<ServerConfig, String> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|e| format!("Invalid bind_address {:?}: {}", self.bind_address, e))?;
        if self.heartbeat_ms == 0 {
            return Err("heartbeat_ms must be greater than zero".to_string());
        }
        Ok(ServerConfig {
            bind_addr: SocketAddr::new(ip, self.port),
            heartbeat: Duration::from_millis(self.heartbeat_ms),
            min_interval_ms: self.min_interval_ms.max(1),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            max_subscriptions: self.max_subscriptions,
        })
    }
}

/// Return the path to `~/.topica/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".topica").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `TOPICA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TOPICA_PORT` | `port` |
/// | `TOPICA_STRICT` | `strict` (`true`/`false`) |
/// | `TOPICA_VERBOSE` | `verbose` (`true`/`false`) |
/// | `TOPICA_SERIAL_DEVICE` | `serial_device` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TOPICA_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Ok(v) = std::env::var("TOPICA_STRICT")
        && let Ok(on) = v.parse::<bool>()
    {
        cfg.strict = on;
    }
    if let Ok(v) = std::env::var("TOPICA_VERBOSE")
        && let Ok(on) = v.parse::<bool>()
    {
        cfg.verbose = on;
    }
    if let Ok(v) = std::env::var("TOPICA_SERIAL_DEVICE")
        && !v.is_empty()
    {
        cfg.serial_device = Some(v);
    }
}

/// Save the config to disk, creating `~/.topica/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.port, 5443);
        assert_eq!(loaded.heartbeat_ms, 500);
        assert_eq!(loaded.serial_prefix, "/lidar");
        assert!(loaded.serial_device.is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "strict = true\nserial_device = \"/dev/ttyACM0\"\n").expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert!(loaded.strict);
        assert!(loaded.verbose);
        assert_eq!(loaded.min_interval_ms, 10);
        assert_eq!(loaded.max_subscriptions, 64);
        assert_eq!(loaded.serial_device.as_deref(), Some("/dev/ttyACM0"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "port = \"not a number\"").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn config_path_points_to_topica_dir() {
        let p = config_path_for_home("/home/robot");
        assert_eq!(p, PathBuf::from("/home/robot/.topica/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn server_config_uses_bind_address_and_port() {
        let cfg = Config {
            bind_address: "127.0.0.1".to_string(),
            port: 6000,
            heartbeat_ms: 250,
            ..Config::default()
        };
        let server = cfg.server_config().expect("valid");
        assert_eq!(server.bind_addr, SocketAddr::from(([127, 0, 0, 1], 6000)));
        assert_eq!(server.heartbeat, Duration::from_millis(250));
    }

    #[test]
    fn server_config_rejects_bad_address() {
        let cfg = Config {
            bind_address: "robot.local".to_string(),
            ..Config::default()
        };
        assert!(cfg.server_config().is_err());
    }

    #[test]
    fn apply_env_overrides_changes_port() {
        // SAFETY: single-threaded test; no other test reads this env-var.
        unsafe { std::env::set_var("TOPICA_PORT", "7443") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.port, 7443);
        unsafe { std::env::remove_var("TOPICA_PORT") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_bool() {
        // SAFETY: single-threaded test; no other test reads this env-var.
        unsafe { std::env::set_var("TOPICA_STRICT", "maybe") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!(!cfg.strict);
        unsafe { std::env::remove_var("TOPICA_STRICT") };
    }

    #[test]
    fn apply_env_overrides_sets_serial_device() {
        // SAFETY: single-threaded test; no other test reads this env-var.
        unsafe { std::env::set_var("TOPICA_SERIAL_DEVICE", "/dev/ttyUSB1") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.serial_device.as_deref(), Some("/dev/ttyUSB1"));
        unsafe { std::env::remove_var("TOPICA_SERIAL_DEVICE") };
    }
}
