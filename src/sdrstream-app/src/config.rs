//! TOML configuration loading. Every field has a default so a bare
//! invocation with no config file still runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0:?}: {1}")]
    ReadError(PathBuf, String),
    #[error("failed to parse config file {0:?}: {1}")]
    ParseError(PathBuf, String),
}

/// Implemented by any TOML-backed config struct; provides the standard
/// CWD -> XDG config dir -> /etc search order.
pub trait ConfigFile: Sized + Default + for<'de> Deserialize<'de> {
    fn config_filename() -> &'static str;

    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(Self::config_filename())];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sdrstream").join(Self::config_filename()));
        }
        paths.push(PathBuf::from("/etc/sdrstream").join(Self::config_filename()));
        paths
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    fn load_from_default_paths() -> Self {
        for path in Self::default_search_paths() {
            if path.exists() {
                if let Ok(cfg) = Self::load_from_file(&path) {
                    return cfg;
                }
            }
        }
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    pub ring_name_prefix: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
            ring_name_prefix: "sdrstream".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSectionConfig {
    pub backend: String,
    pub device_args: String,
    pub center_freq_hz: f64,
    pub sample_rate_hz: f64,
    pub gain_db: f64,
    pub bandwidth_hz: f64,
    pub channel_mask: u16,
    pub block_size: usize,
}

impl Default for RadioSectionConfig {
    fn default() -> Self {
        RadioSectionConfig {
            backend: "sim".to_string(),
            device_args: String::new(),
            center_freq_hz: 100_000_000.0,
            sample_rate_hz: 2_000_000.0,
            gain_db: 20.0,
            bandwidth_hz: 2_000_000.0,
            channel_mask: 1,
            block_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DspConfig {
    pub fft_size: usize,
    pub window: String,
    pub coherent_gain_correction: bool,
}

impl Default for DspConfig {
    fn default() -> Self {
        DspConfig {
            fft_size: 1024,
            window: "hann".to_string(),
            coherent_gain_correction: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub slot_count: u32,
    pub name: String,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            slot_count: 64,
            name: "sdrstream-spectrum".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub socket_addr: String,
    pub read_deadline_ms: u64,
    pub write_deadline_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            socket_addr: "127.0.0.1:7654".to_string(),
            read_deadline_ms: 5000,
            write_deadline_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub listen_addr: String,
    pub high_watermark_bytes: usize,
    pub low_watermark_bytes: usize,
    pub ping_interval_secs: u64,
    pub idle_timeout_secs: u64,
    pub compression_threshold_bytes: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        FanoutConfig {
            listen_addr: "0.0.0.0:8765".to_string(),
            high_watermark_bytes: 1024 * 1024,
            low_watermark_bytes: 512 * 1024,
            ping_interval_secs: 10,
            idle_timeout_secs: 30,
            compression_threshold_bytes: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub pool_size: usize,
    pub block_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            pool_size: 64,
            block_capacity: 65536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub averages: u32,
    pub settle_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            averages: 4,
            settle_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StreamerConfig {
    pub general: GeneralConfig,
    pub radio: RadioSectionConfig,
    pub dsp: DspConfig,
    pub ring: RingConfig,
    pub control: ControlConfig,
    pub fanout: FanoutConfig,
    pub recorder: RecorderConfig,
    pub scanner: ScannerConfig,
}

impl ConfigFile for StreamerConfig {
    fn config_filename() -> &'static str {
        "sdrstream.toml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_radio_values() {
        let cfg = StreamerConfig::default();
        assert_eq!(cfg.dsp.fft_size, 1024);
        assert_eq!(cfg.radio.backend, "sim");
    }

    #[test]
    fn partial_toml_fills_the_rest_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdrstream.toml");
        std::fs::write(&path, "[radio]\ncenter_freq_hz = 433920000.0\n").unwrap();
        let cfg = StreamerConfig::load_from_file(&path).unwrap();
        assert_eq!(cfg.radio.center_freq_hz, 433_920_000.0);
        assert_eq!(cfg.dsp.fft_size, 1024);
    }

    #[test]
    fn missing_file_at_default_paths_falls_back_to_defaults() {
        let cfg = StreamerConfig::load_from_default_paths();
        assert_eq!(cfg.ring.slot_count, 64);
    }
}
