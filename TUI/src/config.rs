/// Application configuration and constants.
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

pub struct Config {
    /// Main loop tick rate in milliseconds (target 60 FPS = ~16ms)
    pub tick_rate_ms: u64,

    /// How many ticks an invalid-expression notice stays up (~2s)
    pub invalid_expression_ticks: u64,

    /// How many ticks camera/AI notices stay up (~4s)
    pub notice_timeout_ticks: u64,

    /// How many ticks to show status messages (180 = ~3s at 60fps)
    pub status_timeout_ticks: u64,

    /// Modulo for animation frame counter
    pub animation_frame_mod: usize,

    /// Width of the history sidebar in characters
    pub sidebar_width: u16,

    /// Solver settings
    pub ai: AiConfig,

    /// Camera device node and capture program
    pub camera_device: PathBuf,
    pub ffmpeg_program: String,
    pub camera_enabled: bool,

    /// A frame grab that takes longer than this fails and keeps the stream
    pub capture_timeout_secs: u64,

    /// Where tracing output goes; the terminal belongs to the UI
    pub log_file: Option<PathBuf>,
}

pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    /// Transport safeguard only; solves are never cancelled by the UI
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate_ms: 16,
            invalid_expression_ticks: 125,
            notice_timeout_ticks: 250,
            status_timeout_ticks: 180,
            animation_frame_mod: 360,
            sidebar_width: 30,
            ai: AiConfig::default(),
            camera_device: PathBuf::from(DEFAULT_CAMERA_DEVICE),
            ffmpeg_program: "ffmpeg".to_string(),
            camera_enabled: true,
            capture_timeout_secs: 10,
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// Defaults overlaid with `NEOCALC_*` / `GEMINI_API_KEY` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        config.ai.api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY"));
        if let Some(model) = non_empty("NEOCALC_MODEL") {
            config.ai.model = model;
        }
        if let Some(base) = non_empty("NEOCALC_API_BASE") {
            config.ai.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(secs) = non_empty("NEOCALC_TIMEOUT_SECS") {
            config.ai.request_timeout_secs =
                secs.parse().map_err(|_| ConfigError::InvalidNumber {
                    name: "NEOCALC_TIMEOUT_SECS",
                    value: secs.clone(),
                })?;
        }
        if let Some(secs) = non_empty("NEOCALC_CAPTURE_TIMEOUT_SECS") {
            config.capture_timeout_secs =
                secs.parse().map_err(|_| ConfigError::InvalidNumber {
                    name: "NEOCALC_CAPTURE_TIMEOUT_SECS",
                    value: secs.clone(),
                })?;
        }
        if let Some(device) = non_empty("NEOCALC_CAMERA_DEVICE") {
            config.camera_device = PathBuf::from(device);
        }
        if let Some(program) = non_empty("NEOCALC_FFMPEG") {
            config.ffmpeg_program = program;
        }
        if let Some(log) = non_empty("NEOCALC_LOG") {
            config.log_file = Some(PathBuf::from(log));
        }

        Ok(config)
    }
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("neocalc").join("neocalc.log"))
}

/// Slash commands available in the SMART and VISION input line
pub const COMMANDS: &[(&str, &str)] = &[
    ("/open", "Load an image file: /open <path>"),
    ("/paste", "Use the clipboard image"),
    ("/capture", "Capture a camera frame"),
    ("/discard", "Drop the captured image"),
    ("/camera", "Restart the camera"),
    ("/history", "Toggle history sidebar"),
    ("/help", "Show available commands"),
    ("/quit", "Exit NeoCalc"),
];
