use {http::StatusCode, std::fmt};

/// Failure of one upstream connection attempt or of the downstream listener.
#[derive(Debug)]
pub enum ProxyError {
    Connect(reqwest::Error),
    Unavailable(StatusCode),
    Status(StatusCode),
    InvalidUrl(String),
    MissingBoundary(String),
    Decode(multer::Error),
    StreamClosed,
    Io(std::io::Error),
}

impl ProxyError {
    /// Whether the failure is expected to clear up by itself.
    ///
    /// Transient failures are logged as warnings, the others as errors. The
    /// crawler retries both on the next activity signal.
    pub fn is_transient(&self) -> bool {
        match self {
            ProxyError::Connect(_)
            | ProxyError::Unavailable(_)
            | ProxyError::Decode(_)
            | ProxyError::StreamClosed
            | ProxyError::Io(_) => true,
            ProxyError::Status(_) | ProxyError::InvalidUrl(_) | ProxyError::MissingBoundary(_) => {
                false
            }
        }
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Connect(err) => write!(f, "upstream connection error: {err}"),
            ProxyError::Unavailable(status) => write!(f, "upstream unavailable: {status}"),
            ProxyError::Status(status) => write!(f, "invalid upstream response status: {status}"),
            ProxyError::InvalidUrl(msg) => write!(f, "invalid stream url: {msg}"),
            ProxyError::MissingBoundary(content_type) => {
                write!(f, "no multipart boundary in content type {content_type:?}")
            }
            ProxyError::Decode(err) => write!(f, "multipart decode error: {err}"),
            ProxyError::StreamClosed => write!(f, "upstream stream closed"),
            ProxyError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Connect(err) => Some(err),
            ProxyError::Decode(err) => Some(err),
            ProxyError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::Connect(err)
    }
}

impl From<multer::Error> for ProxyError {
    fn from(err: multer::Error) -> Self {
        ProxyError::Decode(err)
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(err)
    }
}

/// Invalid proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { name: String, value: String },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { name, value } => {
                write!(f, "invalid value for {name}: {value:?}")
            }
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
