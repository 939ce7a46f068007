use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::coordinator::CoordinatorSettings;
use crate::finalizer::StorageLayout;
use crate::orchestrator::DockerSettings;

/// Prefix for environment overrides, e.g. `BOT_MANAGER__NATS__URL`
pub const ENV_PREFIX: &str = "BOT_MANAGER";

/// Headroom the coordinator allows past the docker run bound for removing
/// a container whose run timed out
const SPAWN_CLEANUP_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub storage: StorageConfig,
    pub orchestrator: OrchestratorConfig,
    pub finalizer: FinalizerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "bot-manager".to_string(),
            log_level: "info".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8082,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub status_subject_prefix: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            status_subject_prefix: "bot.status".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub chunk_extension: String,
    pub cleanup_delay_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./storage/recordings"),
            chunk_extension: "webm".to_string(),
            cleanup_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub docker_binary: PathBuf,
    pub bot_image: String,
    pub network: Option<String>,
    pub memory_limit: String,
    pub cpus: String,
    pub chunk_duration_secs: u64,
    pub audio_bitrate: u32,
    pub spawn_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    pub stop_grace_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            docker_binary: PathBuf::from("docker"),
            bot_image: "newar-recording-bot:latest".to_string(),
            network: Some("newar-network".to_string()),
            memory_limit: "2g".to_string(),
            cpus: "1".to_string(),
            chunk_duration_secs: 10,
            audio_bitrate: 128_000,
            spawn_timeout_secs: 30,
            stop_timeout_secs: 30,
            stop_grace_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FinalizerConfig {
    pub ffmpeg_binary: PathBuf,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl Config {
    /// Load `path` (any format the `config` crate detects, extension optional)
    /// and overlay `BOT_MANAGER__*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn storage_layout(&self) -> StorageLayout {
        StorageLayout::new(&self.storage.root, &self.storage.chunk_extension)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.storage.cleanup_delay_secs)
    }

    pub fn docker_settings(&self) -> DockerSettings {
        let o = &self.orchestrator;
        DockerSettings {
            docker_binary: o.docker_binary.clone(),
            bot_image: o.bot_image.clone(),
            network: o.network.clone().filter(|n| !n.is_empty()),
            memory_limit: o.memory_limit.clone(),
            cpus: o.cpus.clone(),
            nats_url: self.nats.url.clone(),
            status_subject_prefix: self.nats.status_subject_prefix.clone(),
            storage_root: self.storage.root.clone(),
            chunk_duration_secs: o.chunk_duration_secs,
            audio_bitrate: o.audio_bitrate,
            run_timeout: Duration::from_secs(o.spawn_timeout_secs),
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        let o = &self.orchestrator;
        CoordinatorSettings {
            // Outlives the docker run bound so an expired run is cleaned up
            // by the orchestrator before the coordinator gives up on it
            spawn_timeout: Duration::from_secs(o.spawn_timeout_secs + SPAWN_CLEANUP_SECS),
            stop_timeout: Duration::from_secs(o.stop_timeout_secs),
            stop_grace: Duration::from_secs(o.stop_grace_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot-manager.toml");
        std::fs::write(
            &path,
            "[service.http]\nport = 9000\n\n[storage]\nroot = \"/data/recordings\"\n",
        )
        .unwrap();

        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.service.http.port, 9000);
        assert_eq!(cfg.service.http.bind, "0.0.0.0");
        assert_eq!(cfg.storage.root, PathBuf::from("/data/recordings"));
        assert_eq!(cfg.storage.chunk_extension, "webm");
        assert_eq!(cfg.nats.status_subject_prefix, "bot.status");
        assert_eq!(cfg.orchestrator.spawn_timeout_secs, 30);
        assert_eq!(cfg.coordinator_settings().stop_grace, Duration::from_secs(20));
    }

    #[test]
    fn test_docker_settings_share_nats_and_storage() {
        let cfg = Config::default();
        let docker = cfg.docker_settings();
        assert_eq!(docker.nats_url, cfg.nats.url);
        assert_eq!(docker.storage_root, cfg.storage.root);
        assert_eq!(docker.network.as_deref(), Some("newar-network"));
    }

    #[test]
    fn test_docker_run_bound_expires_before_coordinator_timeout() {
        let cfg = Config::default();
        let docker = cfg.docker_settings();
        let coordinator = cfg.coordinator_settings();
        assert_eq!(docker.run_timeout, Duration::from_secs(30));
        assert!(coordinator.spawn_timeout > docker.run_timeout);
    }
}
