use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for every configured interval, in seconds.
const MAX_INTERVAL_SECS: f32 = 3600.0;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Samples per analysis block
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Requested capture rate; file replay uses the file's own rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Blocks whose peak absolute sample is not above this are silence
    #[serde(default = "default_silence_gate")]
    pub silence_gate: i16,
    /// Minimum spectral magnitude for a peak to count
    #[serde(default = "default_min_power")]
    pub min_power: f32,
    #[serde(default = "default_min_frequency")]
    pub min_frequency: f32,
    #[serde(default = "default_max_frequency")]
    pub max_frequency: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmenterConfig {
    /// stddev / mean above which a segment is considered unstable
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f32,
    /// Seconds without an accepted peak before the segment closes
    #[serde(default = "default_gap")]
    pub gap: f32,
    /// Segments must hold more than this many peaks to become a note
    #[serde(default = "default_min_segment_len")]
    pub min_segment_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GestureConfig {
    /// Seconds of silence after the last note that complete a gesture
    #[serde(default = "default_end_gap")]
    pub end_gap: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionsConfig {
    #[serde(default)]
    pub switch_a: Option<String>,
    #[serde(default)]
    pub switch_b: Option<String>,
    #[serde(default)]
    pub mpd_host: Option<String>,
    #[serde(default = "default_mpd_port")]
    pub mpd_port: u16,
    #[serde(default)]
    pub mpd_password: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Network timeout in seconds for every sink
    #[serde(default = "default_timeout")]
    pub timeout: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            silence_gate: default_silence_gate(),
            min_power: default_min_power(),
            min_frequency: default_min_frequency(),
            max_frequency: default_max_frequency(),
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_error_rate: default_max_error_rate(),
            gap: default_gap(),
            min_segment_len: default_min_segment_len(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            end_gap: default_end_gap(),
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            switch_a: None,
            switch_b: None,
            mpd_host: None,
            mpd_port: default_mpd_port(),
            mpd_password: None,
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

impl SegmenterConfig {
    pub fn gap(&self) -> Duration {
        Duration::from_secs_f32(self.gap)
    }
}

impl GestureConfig {
    pub fn end_gap(&self) -> Duration {
        Duration::from_secs_f32(self.end_gap)
    }
}

impl ActionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f32(self.timeout)
    }
}

fn default_block_size() -> usize { 1024 }
fn default_sample_rate() -> u32 { 48_000 }
fn default_silence_gate() -> i16 { 4000 }
fn default_min_power() -> f32 { 700_000.0 }
fn default_min_frequency() -> f32 { 750.0 }
fn default_max_frequency() -> f32 { 2000.0 }
fn default_max_error_rate() -> f32 { 0.03 }
fn default_gap() -> f32 { 0.1 }
fn default_min_segment_len() -> usize { 10 }
fn default_end_gap() -> f32 { 1.0 }
fn default_mpd_port() -> u16 { 6600 }
fn default_user_agent() -> String { "whistle/0.1".into() }
fn default_timeout() -> f32 { 5.0 }

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.audio.block_size == 0 {
            anyhow::bail!("audio.block_size must be greater than zero");
        }
        if self.audio.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate must be greater than zero");
        }
        if self.detector.silence_gate < 0 {
            anyhow::bail!("detector.silence_gate must not be negative");
        }
        if !(self.detector.min_power >= 0.0) {
            anyhow::bail!("detector.min_power must not be negative");
        }
        if !(self.detector.min_frequency > 0.0)
            || !(self.detector.max_frequency >= self.detector.min_frequency)
        {
            anyhow::bail!(
                "detector frequency band {}..={} Hz is empty or inverted",
                self.detector.min_frequency,
                self.detector.max_frequency
            );
        }
        if !(self.segmenter.max_error_rate > 0.0) {
            anyhow::bail!("segmenter.max_error_rate must be positive");
        }
        for (name, secs) in [
            ("segmenter.gap", self.segmenter.gap),
            ("gesture.end_gap", self.gesture.end_gap),
            ("actions.timeout", self.actions.timeout),
        ] {
            if !(secs > 0.0) || !secs.is_finite() {
                anyhow::bail!("{} must be a positive number of seconds, got {}", name, secs);
            }
            if secs > MAX_INTERVAL_SECS {
                anyhow::bail!(
                    "{} must be at most {} seconds, got {}",
                    name,
                    MAX_INTERVAL_SECS,
                    secs
                );
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Explicit path, else `whistle.toml`, else the per-user config file.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("whistle.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("whistle").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("whistle").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
