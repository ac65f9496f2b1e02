use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::constants::{
    ART_SIZE, ART_TIMEOUT_SECS, ART_X_OFFSET, DECODE_TIMEOUT_SECS, DISPLAY_HEIGHT, DISPLAY_WIDTH,
    ERROR_THRESHOLD, IDLE_THRESHOLD, NTP_SERVER, POLL_INTERVAL_MS,
    RESIZE_PROXY, TIME_SYNC_ATTEMPTS, TIME_SYNC_BACKOFF_SECS,
};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level file configuration. Every field is optional so files, CLI and
/// defaults can be layered.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub device: Option<DeviceConfig>,
    pub poll: Option<PollConfig>,
    pub art: Option<ArtConfig>,
    pub network: Option<NetworkConfig>,
    pub display: Option<DisplayConfig>,
}

/// The renderer being watched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceConfig {
    pub host: Option<String>,
    pub timezone_offset_secs: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PollConfig {
    pub interval_ms: Option<u64>,
    pub idle_threshold: Option<u32>,
    pub error_threshold: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArtConfig {
    pub size: Option<u32>,
    pub proxy: Option<String>,
    pub timeout_secs: Option<u64>,
    pub decode_timeout_secs: Option<u64>,
    pub sniff_format: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    /// shell command that brings the link back, e.g. "nmcli radio wifi off && nmcli radio wifi on"
    pub reconnect_command: Option<String>,
    pub ntp_server: Option<String>,
    pub time_sync_attempts: Option<u32>,
    pub time_sync_backoff_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub driver: Option<DriverKind>,
    pub device: Option<PathBuf>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Fbdev,
    Headless,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "wiimon", version, about = "WiiM now playing display")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Renderer IP address or host name
    #[arg(long, short = 'H')]
    pub host: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub timezone_offset_secs: Option<i32>,
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    #[arg(long, value_enum)]
    pub driver: Option<DriverKind>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub fb_device: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Resolved, validated settings handed to the services.
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_level: String,
    pub host: String,
    pub timezone_offset_secs: i32,
    pub poll: PollSettings,
    pub art: ArtSettings,
    pub network: NetworkSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub idle_threshold: u32,
    pub error_threshold: u32,
}

#[derive(Debug, Clone)]
pub struct ArtSettings {
    pub size: u32,
    pub proxy: String,
    pub timeout: Duration,
    pub decode_timeout: Duration,
    pub sniff_format: bool,
}

#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub reconnect_command: Option<String>,
    pub ntp_server: String,
    pub time_sync_attempts: u32,
    pub time_sync_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub driver: DriverKind,
    pub device: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Settings {
    /// Defaults for everything but the renderer address.
    pub fn for_host(host: &str) -> Self {
        Self {
            log_level: "info".to_string(),
            host: host.to_string(),
            timezone_offset_secs: 0,
            poll: PollSettings::default(),
            art: ArtSettings::default(),
            network: NetworkSettings::default(),
            display: DisplaySettings::default(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(POLL_INTERVAL_MS),
            idle_threshold: IDLE_THRESHOLD,
            error_threshold: ERROR_THRESHOLD,
        }
    }
}

impl Default for ArtSettings {
    fn default() -> Self {
        Self {
            size: ART_SIZE,
            proxy: RESIZE_PROXY.to_string(),
            timeout: Duration::from_secs(ART_TIMEOUT_SECS),
            decode_timeout: Duration::from_secs(DECODE_TIMEOUT_SECS),
            sniff_format: false,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            reconnect_command: None,
            ntp_server: NTP_SERVER.to_string(),
            time_sync_attempts: TIME_SYNC_ATTEMPTS,
            time_sync_backoff: Duration::from_secs(TIME_SYNC_BACKOFF_SECS),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            driver: DriverKind::Fbdev,
            device: PathBuf::from("/dev/fb0"),
            width: DISPLAY_WIDTH,
            height: DISPLAY_HEIGHT,
        }
    }
}

/// Public entry point: read YAML, merge CLI, validate.
///
/// Returns the merged file-level config alongside the settings so
/// `--dump-config` can print what was actually used.
pub fn load(cli: &Cli) -> Result<(Config, Settings), ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Resolve + validate
    let settings = resolve(&cfg)?;
    Ok((cfg, settings))
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/wiimon/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/wiimon/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/wiimon.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["wiimon.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    Ok(serde_yaml::from_str(s)?)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
pub fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() { dst.log_level = src.log_level; }
    merge_group(&mut dst.device, src.device, |d, s| {
        if s.host.is_some()                 { d.host = s.host; }
        if s.timezone_offset_secs.is_some() { d.timezone_offset_secs = s.timezone_offset_secs; }
    });
    merge_group(&mut dst.poll, src.poll, |d, s| {
        if s.interval_ms.is_some()     { d.interval_ms = s.interval_ms; }
        if s.idle_threshold.is_some()  { d.idle_threshold = s.idle_threshold; }
        if s.error_threshold.is_some() { d.error_threshold = s.error_threshold; }
    });
    merge_group(&mut dst.art, src.art, |d, s| {
        if s.size.is_some()                { d.size = s.size; }
        if s.proxy.is_some()               { d.proxy = s.proxy; }
        if s.timeout_secs.is_some()        { d.timeout_secs = s.timeout_secs; }
        if s.decode_timeout_secs.is_some() { d.decode_timeout_secs = s.decode_timeout_secs; }
        if s.sniff_format.is_some()        { d.sniff_format = s.sniff_format; }
    });
    merge_group(&mut dst.network, src.network, |d, s| {
        if s.reconnect_command.is_some()      { d.reconnect_command = s.reconnect_command; }
        if s.ntp_server.is_some()             { d.ntp_server = s.ntp_server; }
        if s.time_sync_attempts.is_some()     { d.time_sync_attempts = s.time_sync_attempts; }
        if s.time_sync_backoff_secs.is_some() { d.time_sync_backoff_secs = s.time_sync_backoff_secs; }
    });
    merge_group(&mut dst.display, src.display, |d, s| {
        if s.driver.is_some()     { d.driver = s.driver; }
        if s.device.is_some()     { d.device = s.device; }
        if s.width.is_some()      { d.width = s.width; }
        if s.height.is_some()     { d.height = s.height; }
    });
}

fn merge_group<T>(dst: &mut Option<T>, src: Option<T>, f: impl FnOnce(&mut T, T)) {
    match (dst.as_mut(), src) {
        (None, Some(s)) => *dst = Some(s),
        (Some(d), Some(s)) => f(d, s),
        _ => {}
    }
}

pub fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }

    if cli.host.is_some() || cli.timezone_offset_secs.is_some() {
        let device = cfg.device.get_or_insert_with(DeviceConfig::default);
        if cli.host.is_some()                 { device.host = cli.host.clone(); }
        if cli.timezone_offset_secs.is_some() { device.timezone_offset_secs = cli.timezone_offset_secs; }
    }
    if cli.poll_interval_ms.is_some() {
        cfg.poll.get_or_insert_with(PollConfig::default).interval_ms = cli.poll_interval_ms;
    }
    if cli.driver.is_some() || cli.fb_device.is_some() {
        let display = cfg.display.get_or_insert_with(DisplayConfig::default);
        if cli.driver.is_some()    { display.driver = cli.driver; }
        if cli.fb_device.is_some() { display.device = cli.fb_device.clone(); }
    }
}

/// Fill defaults and check invariants (required fields, ranges, etc.)
pub fn resolve(cfg: &Config) -> Result<Settings, ConfigError> {
    let device = cfg.device.clone().unwrap_or_default();
    let host = device.host.map(|h| h.trim().to_string()).unwrap_or_default();
    if host.is_empty() {
        return Err(ConfigError::Validation("device host is required".into()));
    }
    if host.contains('/') {
        return Err(ConfigError::Validation("device host must be a bare host name or address".into()));
    }
    let timezone_offset_secs = device.timezone_offset_secs.unwrap_or(0);
    if timezone_offset_secs.unsigned_abs() >= 86_400 {
        return Err(ConfigError::Validation("timezone offset must be within one day".into()));
    }

    let mut poll = PollSettings::default();
    if let Some(p) = cfg.poll.as_ref() {
        if let Some(ms) = p.interval_ms { poll.interval = Duration::from_millis(ms); }
        if let Some(t) = p.idle_threshold { poll.idle_threshold = t; }
        if let Some(t) = p.error_threshold { poll.error_threshold = t; }
    }
    if poll.idle_threshold == 0 || poll.error_threshold == 0 {
        return Err(ConfigError::Validation("poll thresholds must be > 0".into()));
    }

    let mut art = ArtSettings::default();
    if let Some(a) = cfg.art.as_ref() {
        if let Some(size) = a.size { art.size = size; }
        if let Some(proxy) = a.proxy.clone() { art.proxy = proxy; }
        if let Some(s) = a.timeout_secs { art.timeout = Duration::from_secs(s); }
        if let Some(s) = a.decode_timeout_secs { art.decode_timeout = Duration::from_secs(s); }
        if let Some(sniff) = a.sniff_format { art.sniff_format = sniff; }
    }
    if art.size == 0 {
        return Err(ConfigError::Validation("art size must be > 0".into()));
    }
    if !art.proxy.starts_with("https://") && !art.proxy.starts_with("http://") {
        return Err(ConfigError::Validation("art proxy must be an http(s) url".into()));
    }

    let mut network = NetworkSettings::default();
    if let Some(n) = cfg.network.as_ref() {
        network.reconnect_command = n.reconnect_command.clone().filter(|c| !c.trim().is_empty());
        if let Some(server) = n.ntp_server.clone() { network.ntp_server = server; }
        if let Some(a) = n.time_sync_attempts { network.time_sync_attempts = a; }
        if let Some(s) = n.time_sync_backoff_secs { network.time_sync_backoff = Duration::from_secs(s); }
    }

    let mut display = DisplaySettings::default();
    if let Some(d) = cfg.display.as_ref() {
        if let Some(driver) = d.driver { display.driver = driver; }
        if let Some(device) = d.device.clone() { display.device = device; }
        if let Some(w) = d.width { display.width = w; }
        if let Some(h) = d.height { display.height = h; }
    }
    if display.width == 0 || display.height == 0 {
        return Err(ConfigError::Validation("display width/height must be > 0".into()));
    }
    if display.width < ART_X_OFFSET as u32 + ART_SIZE || display.height < ART_SIZE {
        return Err(ConfigError::Validation(format!(
            "display {}x{} is smaller than the album art card", display.width, display.height
        )));
    }

    Ok(Settings {
        log_level: cfg.log_level.clone().unwrap_or_else(|| "info".to_string()),
        host,
        timezone_offset_secs,
        poll,
        art,
        network,
        display,
    })
}
