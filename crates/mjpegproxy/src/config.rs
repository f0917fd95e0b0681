use {
    crate::ConfigError,
    std::{path::PathBuf, str::FromStr, time::Duration},
};

// chunk size of a single upstream read
pub const DEFAULT_PART_READ_BUFFER_BYTES: usize = 125_000;

// frames longer than this are truncated
pub const DEFAULT_MAX_FRAME_BYTES: usize = 625_000;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_LISTEN_PATH: &str = "/";

pub const ENV_URL: &str = "MJPEGPROXY_URL";
pub const ENV_USER: &str = "MJPEGPROXY_USER";
pub const ENV_PASS: &str = "MJPEGPROXY_PASS";
pub const ENV_LISTEN_ADDR: &str = "MJPEGPROXY_LISTEN_ADDR";
pub const ENV_LISTEN_PATH: &str = "MJPEGPROXY_LISTEN_PATH";
pub const ENV_IDLE_TIMEOUT_MS: &str = "MJPEGPROXY_IDLE_TIMEOUT_MS";
pub const ENV_PART_BUFFER_BYTES: &str = "MJPEGPROXY_PART_BUFFER_BYTES";
pub const ENV_MAX_FRAME_BYTES: &str = "MJPEGPROXY_MAX_FRAME_BYTES";
pub const ENV_LOG_DIR: &str = "MJPEGPROXY_LOG_DIR";

/// Configuration of one proxy instance.
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    url: String,
    user: String,
    pass: String,
    listen_addr: String,
    listen_path: String,
    idle_timeout: Duration,
    part_read_buffer_bytes: usize,
    max_frame_bytes: usize,
    log_dir: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            pass: String::new(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            listen_path: DEFAULT_LISTEN_PATH.to_string(),
            idle_timeout: Duration::ZERO,
            part_read_buffer_bytes: DEFAULT_PART_READ_BUFFER_BYTES,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            log_dir: None,
        }
    }
}

impl ProxyConfig {
    /// Defaults overlaid with the `MJPEGPROXY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for the `MJPEGPROXY_*` names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_URL) {
            config.url = url;
        }
        if let Some(user) = lookup(ENV_USER) {
            config.user = user;
        }
        if let Some(pass) = lookup(ENV_PASS) {
            config.pass = pass;
        }
        if let Some(addr) = lookup(ENV_LISTEN_ADDR) {
            config.listen_addr = addr;
        }
        if let Some(path) = lookup(ENV_LISTEN_PATH) {
            config.listen_path = path;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_IDLE_TIMEOUT_MS)? {
            config.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = parse_var(&lookup, ENV_PART_BUFFER_BYTES)? {
            config.part_read_buffer_bytes = bytes;
        }
        if let Some(bytes) = parse_var(&lookup, ENV_MAX_FRAME_BYTES)? {
            config.max_frame_bytes = bytes;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    /// Check the values that would otherwise fail at serve or crawl time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid("stream url is empty".to_string()));
        }
        if !self.listen_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "listen path {:?} must start with '/'",
                self.listen_path
            )));
        }
        // axum reads `:` and `{..}` segments as captures
        if let Some(segment) = self
            .listen_path
            .split('/')
            .find(|segment| segment.starts_with(':') || segment.contains(['{', '}']))
        {
            return Err(ConfigError::Invalid(format!(
                "listen path segment {:?} is not a literal",
                segment
            )));
        }
        if self.part_read_buffer_bytes == 0 {
            return Err(ConfigError::Invalid(
                "part read buffer must not be empty".to_string(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid("max frame size must not be zero".to_string()));
        }
        Ok(())
    }

    /// Set the upstream MJPEG stream URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the basic auth credentials, used only when both are non-empty.
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = user.into();
        self.pass = pass.into();
        self
    }

    /// Set the address the downstream listener binds to.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the HTTP path frames are served on.
    pub fn with_listen_path(mut self, path: impl Into<String>) -> Self {
        self.listen_path = path.into();
        self
    }

    /// Set how long the upstream stays connected without requests. Zero disables.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Set the maximum size of a single upstream read.
    pub fn with_part_read_buffer_bytes(mut self, bytes: usize) -> Self {
        self.part_read_buffer_bytes = bytes;
        self
    }

    /// Set the size frames are truncated to.
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Log into date-named files in `dir` instead of stdout.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    // Getters
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn listen_path(&self) -> &str {
        &self.listen_path
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn part_read_buffer_bytes(&self) -> usize {
        self.part_read_buffer_bytes
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.log_dir.as_ref()
    }

    pub(crate) fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.pass.is_empty()
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
    }
}
