use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use tokio::sync::broadcast::error::RecvError;
use tus_axum::{tus, TusAxumApp, TusOptions};
use tus_core::{TusConfig, TusConfigSnapshot};
use tus_upload::{
    FileSystemStorage, MemoryRecordStore, UploadConfig, UploadEngine, UploadEvent,
    DEFAULT_EXPIRATION_SECS, DEFAULT_MAX_SIZE,
};

/// Environment variables with this prefix override config keys
pub const ENV_PREFIX: &str = "TUSRS__";

/// Defaults, then `TUSRS__*` environment overrides
pub fn load_config() -> TusConfig {
    let mut config = TusConfig::new();
    config.set_default("http.host", "127.0.0.1");
    config.set_default("http.port", "8000");
    config.set_default("upload.dir", "/tmp/files");
    config.set_default("upload.base_path", "/files");
    config.set_default("upload.max_size", DEFAULT_MAX_SIZE.to_string());
    config.set_default("upload.expiration_secs", DEFAULT_EXPIRATION_SECS.to_string());

    let loaded = config.load_env(ENV_PREFIX);
    tracing::debug!(loaded, "Loaded config overrides from environment");
    config
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub base_path: String,
    pub location_base: Option<String>,
    pub max_size: u64,
    /// 0 disables expiration
    pub expiration_secs: u64,
}

fn parse_or<T: FromStr>(snapshot: &TusConfigSnapshot, key: &str, default: T) -> Result<T> {
    match snapshot.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid value for {}: {:?}", key, raw)),
    }
}

impl ServerSettings {
    pub fn from_config(config: &TusConfig) -> Result<Self> {
        let snapshot = config.snapshot();
        Ok(Self {
            host: snapshot
                .get_string("http.host")
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&snapshot, "http.port", 8000)?,
            upload_dir: snapshot
                .get_string("upload.dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp/files")),
            base_path: snapshot
                .get_string("upload.base_path")
                .unwrap_or_else(|| "/files".to_string()),
            location_base: snapshot
                .get_string("upload.location_base")
                .filter(|base| !base.trim().is_empty()),
            max_size: parse_or(&snapshot, "upload.max_size", DEFAULT_MAX_SIZE)?,
            expiration_secs: parse_or(
                &snapshot,
                "upload.expiration_secs",
                DEFAULT_EXPIRATION_SECS as u64,
            )?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upload_config(&self) -> Result<UploadConfig> {
        let expiration = match self.expiration_secs {
            0 => None,
            secs => {
                let secs = i64::try_from(secs)
                    .map_err(|_| anyhow!("upload.expiration_secs is too large"))?;
                Some(
                    chrono::Duration::try_seconds(secs)
                        .ok_or_else(|| anyhow!("upload.expiration_secs is too large"))?,
                )
            }
        };
        Ok(UploadConfig::new()
            .with_max_size(self.max_size)
            .with_expiration(expiration))
    }

    pub fn options(&self) -> TusOptions {
        let options = TusOptions::new(self.base_path.as_str());
        match &self.location_base {
            Some(base) => options.with_location_base(base.as_str()),
            None => options,
        }
    }
}

/// Filesystem storage, in-memory records, tus routes
pub async fn build(settings: &ServerSettings) -> Result<TusAxumApp> {
    let storage = FileSystemStorage::open(settings.upload_dir.clone()).await?;
    let engine = UploadEngine::new(storage, MemoryRecordStore::new(), settings.upload_config()?);

    tokio::spawn(log_events(engine.subscribe()));

    tracing::info!(
        dir = %settings.upload_dir.display(),
        max_size = settings.max_size,
        expiration_secs = settings.expiration_secs,
        "Upload engine ready"
    );
    Ok(tus(engine, settings.options()))
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<UploadEvent>) {
    loop {
        match events.recv().await {
            Ok(UploadEvent::Completed {
                upload_id, length, ..
            }) => {
                tracing::info!(upload_id = %upload_id, length, "Upload finished");
            }
            Ok(event) => {
                tracing::trace!(upload_id = %event.upload_id(), event = event.event_name(), "Upload event");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Upload event log fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let mut config = TusConfig::new();
        config.set("http.port", "8000");
        let settings = ServerSettings::from_config(&config).unwrap();
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.upload_dir, PathBuf::from("/tmp/files"));
        assert_eq!(settings.base_path, "/files");
        assert_eq!(settings.location_base, None);
        assert_eq!(settings.expiration_secs, 86_400);
        assert_eq!(settings.max_size, 128_849_018_880);
        assert_eq!(settings.addr(), "127.0.0.1:8000");
    }

    #[test]
    fn zero_expiration_disables_expiry() {
        let mut config = TusConfig::new();
        config.set("upload.expiration_secs", "0");
        config.set("upload.max_size", "1024");
        let upload = ServerSettings::from_config(&config)
            .unwrap()
            .upload_config()
            .unwrap();
        assert_eq!(upload.expiration, None);
        assert_eq!(upload.max_size, 1024);
    }

    #[test]
    fn bad_numbers_are_reported() {
        let mut config = TusConfig::new();
        config.set("http.port", "eighty");
        let err = ServerSettings::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("http.port"));
    }

    #[test]
    fn location_base_feeds_options() {
        let mut config = TusConfig::new();
        config.set("upload.base_path", "uploads");
        config.set("upload.location_base", "https://up.example.com/uploads");
        let options = ServerSettings::from_config(&config).unwrap().options();
        assert_eq!(options.base_path, "/uploads");
        assert_eq!(
            options.location_for(&tus_upload::UploadId::from_string("x".into())),
            "https://up.example.com/uploads/x"
        );
    }

    #[tokio::test]
    async fn build_serves_capabilities() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let dir = tempfile::tempdir().unwrap();
        let mut config = TusConfig::new();
        config.set("upload.dir", dir.path().join("files").to_string_lossy().to_string());
        let settings = ServerSettings::from_config(&config).unwrap();

        let app = build(&settings).await.unwrap();
        assert!(dir.path().join("files").is_dir());

        let res = app
            .router
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/files")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }
}
