// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving manager settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::events::{EventSink, HealthEvent};
use crate::hdp::{HardwareAddress, SessionConfig, DEFAULT_ASSOCIATION_PACING, DEFAULT_QUEUE_DEPTH};

/// Manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session timing and queueing.
    pub session: SessionSection,

    /// Identity announced to agents.
    pub identity: IdentityConfig,

    /// Event delivery.
    pub events: EventConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Delay between the association response and the attribute request.
    pub association_pacing_ms: u64,

    /// Outbound frames queued per session before senders wait.
    pub writer_queue_depth: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            association_pacing_ms: DEFAULT_ASSOCIATION_PACING.as_millis() as u64,
            writer_queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Overrides the adapter address reported by the platform.
    pub local_address: Option<HardwareAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Capacity of the event channel.
    pub capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { capacity: 32 }
    }
}

impl Config {
    /// Load configuration from the user config directory or create default.
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hdp-manager");

        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Session settings, preferring the configured address over the platform's.
    pub fn session_config(&self, platform_address: HardwareAddress) -> SessionConfig {
        SessionConfig {
            association_pacing: Duration::from_millis(self.session.association_pacing_ms),
            writer_queue_depth: self.session.writer_queue_depth.max(1),
            local_address: self.identity.local_address.unwrap_or(platform_address),
        }
    }

    /// Event sink and the dispatcher's receiver, sized by `[events]`.
    pub fn event_sink(&self) -> (EventSink, mpsc::Receiver<HealthEvent>) {
        EventSink::channel(self.events.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdp::{DeviceClass, Measurement, MeasurementKind};
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.session.association_pacing_ms, 100);
        assert_eq!(config.session.writer_queue_depth, 8);
        assert_eq!(config.identity.local_address, None);
        assert_eq!(config.events.capacity, 32);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.session.association_pacing_ms = 250;
        config.identity.local_address = Some("00:1A:7D:DA:71:13".parse().unwrap());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[identity]\nlocal_address = \"aa:bb:cc:dd:ee:ff\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.session, SessionSection::default());
        assert_eq!(
            config.identity.local_address,
            Some(HardwareAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]))
        );
    }

    #[test]
    fn test_bad_address_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[identity]\nlocal_address = \"not-an-address\"\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[tokio::test]
    async fn test_event_sink_uses_capacity() {
        let mut config = Config::default();
        config.events.capacity = 2;
        let (sink, mut rx) = config.event_sink();

        for value in [97, 98, 99] {
            sink.measurement(Measurement::new(DeviceClass::Oximeter, MeasurementKind::SpO2, value));
        }

        let mut received = Vec::new();
        while let Ok(HealthEvent::Measurement(m)) = rx.try_recv() {
            received.push(m.value);
        }
        assert_eq!(received, vec![97, 98]);
    }

    #[test]
    fn test_session_config() {
        let platform = HardwareAddress::new([1, 2, 3, 4, 5, 6]);
        let mut config = Config::default();

        let session = config.session_config(platform);
        assert_eq!(session.association_pacing, Duration::from_millis(100));
        assert_eq!(session.writer_queue_depth, 8);
        assert_eq!(session.local_address, platform);

        let configured = HardwareAddress::new([6, 5, 4, 3, 2, 1]);
        config.identity.local_address = Some(configured);
        config.session.writer_queue_depth = 0;
        let session = config.session_config(platform);
        assert_eq!(session.local_address, configured);
        assert_eq!(session.writer_queue_depth, 1);
    }
}
