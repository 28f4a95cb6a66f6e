use ini::Ini;
use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Mutex;

const CONFIG_PATH: &str = "tilesync.ini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

/// Gameplay tunables. Geometry is in screen units (y grows downward), times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub screen_width: f32,
    pub screen_height: f32,
    /// Height of one tap tile; one tile height of travel is one grid row.
    pub tile_height: f32,
    /// Hit line position as a fraction of screen height.
    pub hit_line_ratio: f32,
    pub look_ahead_seconds: f32,
    pub countdown_seconds: f32,
    /// Upper bound on a single frame delta fed to the song clock.
    pub max_delta_seconds: f32,
    pub fail_animation_seconds: f32,
    /// Notes longer than this (in beats) become hold tiles.
    pub hold_threshold_beats: f32,
    pub fall_speed_min: f32,
    pub fall_speed_max: f32,
    pub speed_step_tiles: u32,
    pub speed_step_bonus: f32,
    pub loop_speed_bonus: f32,
    pub max_speed_multiplier: f32,
    // 0 = endless: the score loops until the player fails.
    pub target_play_seconds: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            screen_width: 1080.0,
            screen_height: 1920.0,
            tile_height: 320.0,
            hit_line_ratio: 0.75,
            look_ahead_seconds: 4.0,
            countdown_seconds: 3.0,
            max_delta_seconds: 0.05,
            fail_animation_seconds: 1.5,
            hold_threshold_beats: 1.5,
            fall_speed_min: 600.0,
            fall_speed_max: 2400.0,
            speed_step_tiles: 50,
            speed_step_bonus: 0.05,
            loop_speed_bonus: 0.1,
            max_speed_multiplier: 2.0,
            target_play_seconds: 0.0,
        }
    }
}

impl Config {
    /// Builds a config from INI text, using defaults for missing or malformed keys.
    pub fn from_ini_str(content: &str) -> Result<Self, ini::ParseError> {
        let conf = Ini::load_from_str(content)?;
        Ok(Self::from_ini(&conf))
    }

    fn from_ini(conf: &Ini) -> Self {
        let default = Self::default();
        let gameplay_f32 = |key: &str, fallback: f32| -> f32 {
            conf.get_from(Some("Gameplay"), key)
                .and_then(|v| v.trim().parse::<f32>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(fallback)
        };

        let mut cfg = Self {
            log_level: conf
                .get_from(Some("Options"), "LogLevel")
                .and_then(|v| LogLevel::from_str(v).ok())
                .unwrap_or(default.log_level),
            screen_width: gameplay_f32("ScreenWidth", default.screen_width),
            screen_height: gameplay_f32("ScreenHeight", default.screen_height),
            tile_height: gameplay_f32("TileHeight", default.tile_height),
            hit_line_ratio: gameplay_f32("HitLineRatio", default.hit_line_ratio),
            look_ahead_seconds: gameplay_f32("LookAheadSeconds", default.look_ahead_seconds),
            countdown_seconds: gameplay_f32("CountdownSeconds", default.countdown_seconds),
            max_delta_seconds: gameplay_f32("MaxDeltaSeconds", default.max_delta_seconds),
            fail_animation_seconds: gameplay_f32(
                "FailAnimationSeconds",
                default.fail_animation_seconds,
            ),
            hold_threshold_beats: gameplay_f32("HoldThresholdBeats", default.hold_threshold_beats),
            fall_speed_min: gameplay_f32("FallSpeedMin", default.fall_speed_min),
            fall_speed_max: gameplay_f32("FallSpeedMax", default.fall_speed_max),
            speed_step_tiles: conf
                .get_from(Some("Gameplay"), "SpeedStepTiles")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(default.speed_step_tiles),
            speed_step_bonus: gameplay_f32("SpeedStepBonus", default.speed_step_bonus),
            loop_speed_bonus: gameplay_f32("LoopSpeedBonus", default.loop_speed_bonus),
            max_speed_multiplier: gameplay_f32(
                "MaxSpeedMultiplier",
                default.max_speed_multiplier,
            ),
            target_play_seconds: gameplay_f32("TargetPlaySeconds", default.target_play_seconds),
        };

        // Values that would break the clock or the grid fall back to defaults.
        if cfg.screen_width <= 0.0 || cfg.screen_height <= 0.0 {
            cfg.screen_width = default.screen_width;
            cfg.screen_height = default.screen_height;
        }
        if cfg.tile_height <= 0.0 {
            cfg.tile_height = default.tile_height;
        }
        cfg.hit_line_ratio = cfg.hit_line_ratio.clamp(0.0, 1.0);
        if cfg.fall_speed_min <= 0.0 || cfg.fall_speed_max < cfg.fall_speed_min {
            cfg.fall_speed_min = default.fall_speed_min;
            cfg.fall_speed_max = default.fall_speed_max;
        }
        cfg.countdown_seconds = cfg.countdown_seconds.max(0.0);
        cfg.max_delta_seconds = cfg.max_delta_seconds.max(0.0);
        cfg.fail_animation_seconds = cfg.fail_animation_seconds.max(0.0);
        cfg.max_speed_multiplier = cfg.max_speed_multiplier.max(1.0);
        cfg.target_play_seconds = cfg.target_play_seconds.max(0.0);
        cfg
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn default_config_content() -> String {
    let default = Config::default();
    let mut content = String::new();

    content.push_str("[Options]\n");
    content.push_str(&format!("LogLevel={}\n", default.log_level.as_str()));
    content.push('\n');

    // [Gameplay] section - keys in alphabetical order
    content.push_str("[Gameplay]\n");
    content.push_str(&format!("CountdownSeconds={}\n", default.countdown_seconds));
    content.push_str(&format!(
        "FailAnimationSeconds={}\n",
        default.fail_animation_seconds
    ));
    content.push_str(&format!("FallSpeedMax={}\n", default.fall_speed_max));
    content.push_str(&format!("FallSpeedMin={}\n", default.fall_speed_min));
    content.push_str(&format!("HitLineRatio={}\n", default.hit_line_ratio));
    content.push_str(&format!(
        "HoldThresholdBeats={}\n",
        default.hold_threshold_beats
    ));
    content.push_str(&format!("LookAheadSeconds={}\n", default.look_ahead_seconds));
    content.push_str(&format!("LoopSpeedBonus={}\n", default.loop_speed_bonus));
    content.push_str(&format!("MaxDeltaSeconds={}\n", default.max_delta_seconds));
    content.push_str(&format!(
        "MaxSpeedMultiplier={}\n",
        default.max_speed_multiplier
    ));
    content.push_str(&format!("ScreenHeight={}\n", default.screen_height));
    content.push_str(&format!("ScreenWidth={}\n", default.screen_width));
    content.push_str(&format!("SpeedStepBonus={}\n", default.speed_step_bonus));
    content.push_str(&format!("SpeedStepTiles={}\n", default.speed_step_tiles));
    content.push_str(&format!("TargetPlaySeconds={}\n", default.target_play_seconds));
    content.push_str(&format!("TileHeight={}\n", default.tile_height));
    content
}

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    std::fs::write(CONFIG_PATH, default_config_content())
}

pub fn load() {
    if !std::path::Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(CONFIG_PATH) {
        Ok(conf) => {
            let cfg = Config::from_ini(&conf);
            *CONFIG.lock().unwrap() = cfg;
            info!("Configuration loaded from '{CONFIG_PATH}'.");
        }
        Err(e) => {
            warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values.");
        }
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap()
}
