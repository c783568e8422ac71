use std::sync::Arc;

use tus_upload::{UploadEngine, UploadId};

/// Where the upload routes live and how `Location` is built
#[derive(Debug, Clone)]
pub struct TusOptions {
    /// Route prefix, e.g. `/files`
    pub base_path: String,
    /// Absolute URL prefix for `Location`; relative to `base_path` when unset
    pub location_base: Option<String>,
}

impl Default for TusOptions {
    fn default() -> Self {
        Self {
            base_path: "/files".to_string(),
            location_base: None,
        }
    }
}

impl TusOptions {
    pub fn new<S: Into<String>>(base_path: S) -> Self {
        Self {
            base_path: normalize_base(&base_path.into()),
            location_base: None,
        }
    }

    pub fn with_location_base<S: Into<String>>(mut self, base: S) -> Self {
        self.location_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// `Location` of an upload resource
    pub fn location_for(&self, id: &UploadId) -> String {
        let base = self.location_base.as_deref().unwrap_or(&self.base_path);
        format!("{}/{}", base, id)
    }
}

fn normalize_base(raw: &str) -> String {
    // "" mounts at the root
    match raw.trim().trim_matches('/') {
        "" => String::new(),
        trimmed => format!("/{}", trimmed),
    }
}

pub struct TusAxumState {
    pub engine: Arc<UploadEngine>,
    pub options: Arc<TusOptions>,
}

impl Clone for TusAxumState {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            options: Arc::clone(&self.options),
        }
    }
}

impl TusAxumState {
    pub fn new(engine: UploadEngine, options: TusOptions) -> Self {
        Self {
            engine: Arc::new(engine),
            options: Arc::new(options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_prefers_absolute_base() {
        let id = UploadId::from_string("abc".into());
        assert_eq!(TusOptions::default().location_for(&id), "/files/abc");
        assert_eq!(TusOptions::new("uploads/").location_for(&id), "/uploads/abc");

        let options = TusOptions::new("/files").with_location_base("https://example.com/files/");
        assert_eq!(options.location_for(&id), "https://example.com/files/abc");
    }
}
