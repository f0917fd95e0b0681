use {
    http::StatusCode,
    mjpegproxy::{ConfigError, ProxyError},
    std::{error::Error, io},
};

#[test]
fn test_transient_errors() {
    assert!(ProxyError::Unavailable(StatusCode::SERVICE_UNAVAILABLE).is_transient());
    assert!(ProxyError::Decode(multer::Error::IncompleteStream).is_transient());
    assert!(ProxyError::StreamClosed.is_transient());
    assert!(ProxyError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")).is_transient());
}

#[test]
fn test_permanent_errors() {
    assert!(!ProxyError::Status(StatusCode::NOT_FOUND).is_transient());
    assert!(!ProxyError::InvalidUrl("nope".to_string()).is_transient());
    assert!(!ProxyError::MissingBoundary("image/jpeg".to_string()).is_transient());
}

#[test]
fn test_from_io_error() {
    let err: ProxyError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broken").into();
    match err {
        ProxyError::Io(_) => {}
        _ => panic!("Expected ProxyError::Io variant"),
    }
    assert!(err.source().is_some());
}

#[test]
fn test_from_multer_error() {
    let err: ProxyError = multer::Error::IncompleteStream.into();
    match err {
        ProxyError::Decode(_) => {}
        _ => panic!("Expected ProxyError::Decode variant"),
    }
}

#[test]
fn test_display_status() {
    let display = format!("{}", ProxyError::Status(StatusCode::NOT_FOUND));
    assert!(display.contains("invalid upstream response status"));
    assert!(display.contains("404"));

    let display = format!("{}", ProxyError::Unavailable(StatusCode::SERVICE_UNAVAILABLE));
    assert!(display.contains("upstream unavailable"));
    assert!(display.contains("503"));
}

#[test]
fn test_display_missing_boundary() {
    let display = format!("{}", ProxyError::MissingBoundary("image/jpeg".to_string()));
    assert!(display.contains("no multipart boundary"));
    assert!(display.contains("image/jpeg"));
}

#[test]
fn test_display_stream_closed() {
    let display = format!("{}", ProxyError::StreamClosed);
    assert!(display.contains("stream closed"));
    assert!(ProxyError::StreamClosed.source().is_none());
}

#[test]
fn test_display_config_errors() {
    let err = ConfigError::InvalidValue {
        name: "MJPEGPROXY_IDLE_TIMEOUT_MS".to_string(),
        value: "soon".to_string(),
    };
    let display = format!("{}", err);
    assert!(display.contains("MJPEGPROXY_IDLE_TIMEOUT_MS"));
    assert!(display.contains("soon"));

    let display = format!("{}", ConfigError::Invalid("stream url is empty".to_string()));
    assert!(display.contains("invalid configuration"));
}
