use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub waveform: WaveformConfig,
}

#[derive(Debug, Deserialize)]
pub struct WaveformConfig {
    #[serde(default = "default_points")]
    pub points: usize,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub flush_tail: bool,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            points: default_points(),
            scale: default_scale(),
            flush_tail: false,
        }
    }
}

fn default_points() -> usize { 100 }
fn default_scale() -> f64 { 0.25 }

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}
