//! JPEG snapshots of an MJPEG camera stream.
//!
//! Serves the latest frame of a `multipart/x-mixed-replace` stream over HTTP,
//! and only keeps the upstream connection open while frames are being asked for.

pub mod activity;
pub mod boundary;
pub mod config;
pub mod crawler;
pub mod error;
pub mod framecache;
pub mod handler;
pub mod proxy;

pub use activity::ActivitySignal;
pub use boundary::{BoundaryStreamReader, Part, boundary_from_content_type};
pub use config::ProxyConfig;
pub use crawler::{Crawler, CrawlerState, PartBuffer};
pub use error::{ConfigError, ProxyError};
pub use framecache::FrameCache;
pub use proxy::MjpegProxy;
