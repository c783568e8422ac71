use chrono::Duration;

/// Protocol version spoken by the engine
pub const TUS_VERSION: &str = "1.0.0";

/// Default upper bound on a single upload (120 GiB)
pub const DEFAULT_MAX_SIZE: u64 = 120 * 1024 * 1024 * 1024;

/// Default lifetime of an unfinished upload
pub const DEFAULT_EXPIRATION_SECS: i64 = 24 * 60 * 60;

/// Configuration for the upload engine
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Largest upload length accepted (declared or resolved)
    pub max_size: u64,

    /// How long an upload stays appendable after creation or its last
    /// full append. `None` disables expiration.
    pub expiration: Option<Duration>,

    /// Protocol extensions advertised to clients
    pub extensions: Vec<String>,

    /// Checksum algorithms advertised to clients.
    /// Advertised only: chunk checksums are not verified.
    pub checksum_algorithms: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            expiration: Some(Duration::seconds(DEFAULT_EXPIRATION_SECS)),
            extensions: [
                "creation",
                "creation-defer-length",
                "creation-with-upload",
                "expiration",
                "termination",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            checksum_algorithms: ["md5", "sha1", "crc32"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max upload size
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Set (or disable with `None`) the expiration window
    pub fn with_expiration(mut self, expiration: Option<Duration>) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_checksum_algorithms<I, S>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.checksum_algorithms = algorithms.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the expiration extension is in effect
    pub fn expires(&self) -> bool {
        self.expiration.is_some()
    }
}

/// What the server supports, as returned by `UploadEngine::capabilities`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub version: &'static str,
    pub supported_versions: Vec<&'static str>,
    pub extensions: Vec<String>,
    pub max_size: u64,
    pub checksum_algorithms: Vec<String>,
}

impl Capabilities {
    pub fn from_config(config: &UploadConfig) -> Self {
        let mut extensions = config.extensions.clone();
        if !config.expires() {
            extensions.retain(|ext| ext != "expiration");
        }
        Self {
            version: TUS_VERSION,
            supported_versions: vec![TUS_VERSION],
            extensions,
            max_size: config.max_size,
            checksum_algorithms: config.checksum_algorithms.clone(),
        }
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.extensions.iter().any(|ext| ext == extension)
    }
}
