//! YAML configuration.
//!
//! Every section is optional and falls back to the defaults below, so a
//! configuration file only needs the keys that differ.
//!
//! ```yaml
//! pyramid: { number: 2, scalefactor: 2, windowsize: 32 }
//! slider:
//!   number: 4
//!   step: 16
//!   window: { width: 32, height: 32 }
//! roi: { number: 4, bundle: bundle.yaml }
//! ingestor:
//!   number: 1
//!   sink: { hostname: mill.local, port: 9999, system: RoiMill, actor: PyramidPool }
//! output: { folder: results }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RoiMillError;
use crate::remote::Address;
use crate::stages::{FINDER_POOL, PYRAMID_POOL};

pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_SYSTEM: &str = "RoiMill";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pyramid: PyramidConfig,
    pub slider: SliderConfig,
    pub roi: RoiConfig,
    pub ingestor: IngestorConfig,
    pub receiver: ReceiverConfig,
    pub output: OutputConfig,
    pub endpoint: EndpointConfig,
    pub consolidation: ConsolidationConfig,
    pub resolver: ResolverConfig,
}

impl Config {
    /// Reads and parses a configuration file.
    ///
    /// Relative `roi.bundle` and `output.folder` paths are taken relative to
    /// the directory holding the file.
    pub fn load(path: &Path) -> Result<Self, RoiMillError> {
        let text = fs::read_to_string(path).map_err(|_| RoiMillError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let mut config = Self::from_yaml(&text, path)?;
        if let Some(base) = path.parent() {
            config.roi.bundle = base.join(&config.roi.bundle);
            config.output.folder = base.join(&config.output.folder);
        }
        Ok(config)
    }

    /// Parses configuration text; `origin` is only used in errors.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, RoiMillError> {
        // An empty document means "all defaults"
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| RoiMillError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    pub number: usize,
    pub scalefactor: usize,
    pub windowsize: usize,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            number: 2,
            scalefactor: 2,
            windowsize: 32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderConfig {
    pub number: usize,
    pub step: usize,
    pub window: WindowConfig,
}

impl Default for SliderConfig {
    fn default() -> Self {
        Self {
            number: 2,
            step: 16,
            window: WindowConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: usize,
    pub height: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    pub number: usize,
    pub bundle: PathBuf,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            number: 2,
            bundle: PathBuf::from("bundle.yaml"),
        }
    }
}

/// Where a remote pool lives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub hostname: String,
    pub port: u16,
    pub system: String,
    pub actor: String,
    /// Full address; takes precedence over the individual keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl RemoteConfig {
    fn with_actor(actor: &str) -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            system: DEFAULT_SYSTEM.to_string(),
            actor: actor.to_string(),
            address: None,
        }
    }

    pub fn address(&self) -> Result<Address, RoiMillError> {
        if let Some(text) = &self.address {
            return Ok(text.parse::<Address>()?);
        }
        let host = if self.hostname.trim().is_empty() {
            DEFAULT_HOSTNAME
        } else {
            self.hostname.trim()
        };
        Ok(Address::new(&self.system, host, self.port, &self.actor))
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::with_actor(PYRAMID_POOL)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestorConfig {
    pub number: usize,
    pub sink: RemoteConfig,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            number: 1,
            sink: RemoteConfig::with_actor(PYRAMID_POOL),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub number: usize,
    pub source: RemoteConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            number: 1,
            source: RemoteConfig::with_actor(FINDER_POOL),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub folder: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
        }
    }
}

/// Where this process exposes its own pools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub hostname: String,
    pub port: u16,
    pub system: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            system: DEFAULT_SYSTEM.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub enhance_factor: f64,
    pub overlap_threshold: f64,
    pub mode: String,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            enhance_factor: crate::consolidate::DEFAULT_ENHANCE_FACTOR,
            overlap_threshold: crate::consolidate::DEFAULT_OVERLAP_THRESHOLD,
            mode: "all".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub timeout_ms: u64,
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = Config::from_yaml("", Path::new("empty.yaml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(
            cfg.ingestor.sink.address().unwrap().to_string(),
            "roimill.tcp://RoiMill@localhost:9999/user/PyramidPool"
        );
        assert_eq!(cfg.receiver.source.actor, "ROIFinderPool");
        assert_eq!(cfg.resolver.timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let yaml = "slider:\n  step: 4\n  window:\n    width: 8\ningestor:\n  sink:\n    hostname: ''\n    port: 2552\n";
        let cfg = Config::from_yaml(yaml, Path::new("cfg.yaml")).unwrap();
        assert_eq!(cfg.slider.step, 4);
        assert_eq!(cfg.slider.window.width, 8);
        assert_eq!(cfg.slider.window.height, 32);
        assert_eq!(cfg.slider.number, 2);
        // empty hostnames fall back to localhost
        assert_eq!(cfg.ingestor.sink.address().unwrap().socket_addr(), "localhost:2552");
    }

    #[test]
    fn test_full_address_overrides_keys() {
        let yaml = "receiver:\n  source:\n    port: 1\n    address: roimill.tcp://Mill@10.1.2.3:2552/user/ROIFinderPool\n";
        let cfg = Config::from_yaml(yaml, Path::new("cfg.yaml")).unwrap();
        let address = cfg.receiver.source.address().unwrap();
        assert_eq!(address.socket_addr(), "10.1.2.3:2552");
        assert_eq!(address.system, "Mill");

        let yaml = "receiver:\n  source:\n    address: akka.tcp://Mill@h:1/user/x\n";
        let cfg = Config::from_yaml(yaml, Path::new("cfg.yaml")).unwrap();
        assert!(matches!(
            cfg.receiver.source.address(),
            Err(RoiMillError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roimill.yaml");
        fs::write(&path, "roi:\n  bundle: detector.yaml\noutput:\n  folder: /abs/out\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.roi.bundle, dir.path().join("detector.yaml"));
        assert_eq!(cfg.output.folder, PathBuf::from("/abs/out"));
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            Config::load(Path::new("missing/roimill.yaml")),
            Err(RoiMillError::MissingFile { .. })
        ));
        assert!(matches!(
            Config::from_yaml("pyramid: [1, 2", Path::new("bad.yaml")),
            Err(RoiMillError::ConfigParse { .. })
        ));
    }
}
