use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "SQUAT_COACH_CONFIG";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub workout: WorkoutConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NetworkConfig {
    /// Headset endpoint receiving telemetry
    #[serde(default = "default_headset_addr")]
    pub headset_addr: String,
    /// Local endpoint for start/stop control messages
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_standby_poll_ms")]
    pub standby_poll_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CameraConfig {
    /// Camera indices tried in order
    #[serde(default = "default_camera_indices")]
    pub indices: Vec<u32>,
    #[serde(default = "default_true")]
    pub mirror: bool,
    /// A workout ends when no frame arrives for this long
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorkoutConfig {
    #[serde(default = "default_depth_down")]
    pub depth_down: f64,
    #[serde(default = "default_depth_up")]
    pub depth_up: f64,
    /// Minimum current/standing torso length ratio for a straight back
    #[serde(default = "default_spine_limit_ratio")]
    pub spine_limit_ratio: f64,
    #[serde(default = "default_valgus_limit")]
    pub valgus_limit: f64,
    #[serde(default = "default_baseline_frames")]
    pub baseline_frames: u32,
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,
    #[serde(default = "default_tpose_frames")]
    pub tpose_frames: u32,
    #[serde(default = "default_tpose_tolerance")]
    pub tpose_tolerance: f64,
    #[serde(default = "default_tpose_loss_frames")]
    pub tpose_loss_frames: u32,
    #[serde(default = "default_coach_interval_secs")]
    pub coach_interval_secs: f64,
    #[serde(default = "default_depth_coach_interval_secs")]
    pub depth_coach_interval_secs: f64,
    #[serde(default = "default_kcal_per_rep")]
    pub kcal_per_rep: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_overlay_title")]
    pub title: String,
}

fn default_headset_addr() -> String { "192.168.137.15:5005".to_string() }
fn default_listen_addr() -> String { "0.0.0.0:6000".to_string() }
fn default_standby_poll_ms() -> u64 { 1_000 }
fn default_camera_indices() -> Vec<u32> { vec![0, 1] }
fn default_true() -> bool { true }
fn default_stall_timeout_ms() -> u64 { 5_000 }
fn default_model_path() -> PathBuf { crate::model_download::default_pose_model_path() }
fn default_min_confidence() -> f32 { 0.5 }
fn default_depth_down() -> f64 { 0.50 }
fn default_depth_up() -> f64 { 0.20 }
fn default_spine_limit_ratio() -> f64 { 0.55 }
fn default_valgus_limit() -> f64 { 0.25 }
fn default_baseline_frames() -> u32 { 45 }
fn default_ema_alpha() -> f64 { 0.20 }
fn default_tpose_frames() -> u32 { 60 }
fn default_tpose_tolerance() -> f64 { 0.1 }
fn default_tpose_loss_frames() -> u32 { 15 }
fn default_coach_interval_secs() -> f64 { 4.0 }
fn default_depth_coach_interval_secs() -> f64 { 6.0 }
fn default_kcal_per_rep() -> f64 { 0.8 }
fn default_overlay_title() -> String { "HealthOnFit PC".to_string() }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            headset_addr: default_headset_addr(),
            listen_addr: default_listen_addr(),
            standby_poll_ms: default_standby_poll_ms(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            indices: default_camera_indices(),
            mirror: true,
            stall_timeout_ms: default_stall_timeout_ms(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            depth_down: default_depth_down(),
            depth_up: default_depth_up(),
            spine_limit_ratio: default_spine_limit_ratio(),
            valgus_limit: default_valgus_limit(),
            baseline_frames: default_baseline_frames(),
            ema_alpha: default_ema_alpha(),
            tpose_frames: default_tpose_frames(),
            tpose_tolerance: default_tpose_tolerance(),
            tpose_loss_frames: default_tpose_loss_frames(),
            coach_interval_secs: default_coach_interval_secs(),
            depth_coach_interval_secs: default_depth_coach_interval_secs(),
            kcal_per_rep: default_kcal_per_rep(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_overlay_title(),
        }
    }
}

impl NetworkConfig {
    pub fn standby_poll(&self) -> Duration {
        Duration::from_millis(self.standby_poll_ms)
    }
}

impl CameraConfig {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("falling back to default config: {err:#}");
                Self::default()
            }
        }
    }

    pub fn from_env_or_default() -> Self {
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_or_default(path)
    }
}
