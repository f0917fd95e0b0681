use {
    crate::*,
    bytes::{Bytes, BytesMut},
    http::{StatusCode, header::CONTENT_TYPE},
    std::{future::Future, sync::Arc, time::Duration, time::Instant},
    tokio::{sync::watch, task::JoinHandle},
    tokio_util::sync::CancellationToken,
};

// bound on establishing the upstream TCP/TLS connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the crawler currently is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlerState {
    Stopped,
    WaitingForActivity,
    Connecting,
    Streaming,
}

/// Accumulates the chunks of one part, keeping at most `limit` bytes.
///
/// Bytes past the limit are counted but dropped, so an oversized part ends up
/// truncated to exactly `limit` bytes.
#[derive(Debug)]
pub struct PartBuffer {
    data: BytesMut,
    limit: usize,
    received: usize,
}

impl PartBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            data: BytesMut::new(),
            limit,
            received: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.received += chunk.len();
        let room = self.limit.saturating_sub(self.data.len());
        self.data.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    /// Number of bytes pushed since the last `take`, including dropped ones.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_truncated(&self) -> bool {
        self.received > self.data.len()
    }

    /// Hand out the frame and reset the buffer.
    pub fn take(&mut self) -> Bytes {
        self.received = 0;
        self.data.split().freeze()
    }
}

// why a connection to upstream ended without an error
enum Disconnect {
    Idle,
    Cancelled,
}

// outcome of awaiting upstream I/O
enum Step<T> {
    Ready(T),
    Idle,
    Cancelled,
}

/// Handle to the background task that pulls frames from upstream on demand.
///
/// The task sleeps until a request handler pings the `ActivitySignal`, then
/// streams frames into the `FrameCache` until no request arrived for the idle
/// timeout. Upstream failures send it back to waiting, never end it.
///
/// Requests that arrive while streaming also count as activity, so the idle
/// timeout runs from the latest request, not from the one that woke the task.
pub struct Crawler {
    cancel: CancellationToken,
    state: watch::Receiver<CrawlerState>,
    join_handle: Option<JoinHandle<()>>,
}

impl Crawler {
    /// Spawn the crawler task on the current tokio runtime.
    pub fn start(
        config: ProxyConfig,
        cache: Arc<FrameCache>,
        signal: Arc<ActivitySignal>,
    ) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let cancel = CancellationToken::new();
        let (state_tx, state) = watch::channel(CrawlerState::WaitingForActivity);

        let worker = Worker {
            config,
            client,
            cache,
            signal,
            cancel: cancel.clone(),
            state: state_tx,
        };
        let join_handle = tokio::spawn(worker.run());

        Ok(Self {
            cancel,
            state,
            join_handle: Some(join_handle),
        })
    }

    pub fn state(&self) -> CrawlerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<CrawlerState> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the task, dropping any upstream connection, and wait for it to end.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            if let Err(error) = handle.await {
                log::error!("crawler: task failed: {}", error);
            }
        }
    }
}

impl Drop for Crawler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    config: ProxyConfig,
    client: reqwest::Client,
    cache: Arc<FrameCache>,
    signal: Arc<ActivitySignal>,
    cancel: CancellationToken,
    state: watch::Sender<CrawlerState>,
}

impl Worker {
    async fn run(self) {
        log::info!("crawler: started for {}", self.config.url());
        loop {
            self.set_state(CrawlerState::WaitingForActivity);
            let last_activity = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                at = self.signal.wait() => at,
            };
            if !self.is_fresh(last_activity) {
                continue;
            }

            match self.crawl(last_activity).await {
                Ok(Disconnect::Cancelled) => break,
                Ok(Disconnect::Idle) => {
                    log::info!(
                        "crawler: no requests for {:?}, disconnecting from upstream",
                        self.config.idle_timeout()
                    );
                }
                Err(error) if error.is_transient() => {
                    log::warn!("crawler: {}, waiting for next request", error);
                }
                Err(error) => {
                    log::error!("crawler: {}, waiting for next request", error);
                }
            }
        }
        self.set_state(CrawlerState::Stopped);
        log::info!("crawler: stopped");
    }

    // one upstream connection, from request to disconnect
    async fn crawl(&self, mut last_activity: Instant) -> Result<Disconnect, ProxyError> {
        self.set_state(CrawlerState::Connecting);
        let mut reader = match self.race(self.connect(), &mut last_activity).await {
            Step::Ready(reader) => reader?,
            Step::Idle => return Ok(Disconnect::Idle),
            Step::Cancelled => return Ok(Disconnect::Cancelled),
        };

        self.set_state(CrawlerState::Streaming);

        let mut buffer = PartBuffer::new(self.config.max_frame_bytes());
        loop {
            last_activity = self.refresh(last_activity);
            if self.is_idle(last_activity) {
                return Ok(Disconnect::Idle);
            }

            let mut part = match self.race(reader.next_part(), &mut last_activity).await {
                Step::Ready(part) => part?.ok_or(ProxyError::StreamClosed)?,
                Step::Idle => return Ok(Disconnect::Idle),
                Step::Cancelled => return Ok(Disconnect::Cancelled),
            };

            loop {
                match self.race(part.chunk(), &mut last_activity).await {
                    Step::Ready(chunk) => match chunk? {
                        Some(chunk) => buffer.push(&chunk),
                        None => break,
                    },
                    Step::Idle => return Ok(Disconnect::Idle),
                    Step::Cancelled => return Ok(Disconnect::Cancelled),
                }
            }
            drop(part);

            if buffer.is_truncated() {
                log::debug!(
                    "crawler: frame of {} bytes truncated to {}",
                    buffer.received(),
                    self.config.max_frame_bytes()
                );
            }
            let frame = buffer.take();
            log::debug!("crawler: cached frame of {} bytes", frame.len());
            self.cache.set(frame);
        }
    }

    async fn connect(&self) -> Result<BoundaryStreamReader, ProxyError> {
        let url = reqwest::Url::parse(self.config.url())
            .map_err(|error| ProxyError::InvalidUrl(format!("{}: {}", self.config.url(), error)))?;
        let mut request = self.client.get(url);
        if self.config.has_credentials() {
            request = request.basic_auth(self.config.user(), Some(self.config.pass()));
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::SERVICE_UNAVAILABLE => {
                return Err(ProxyError::Unavailable(response.status()));
            }
            status => return Err(ProxyError::Status(status)),
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let boundary = boundary_from_content_type(&content_type)
            .ok_or(ProxyError::MissingBoundary(content_type))?;
        log::debug!("crawler: upstream boundary {:?}", boundary);

        Ok(BoundaryStreamReader::new(
            response.bytes_stream(),
            boundary,
            self.config.part_read_buffer_bytes(),
        ))
    }

    // await upstream I/O until it completes, the crawler is stopped, or nobody
    // asked for a frame within the idle timeout
    async fn race<F: Future>(&self, future: F, last_activity: &mut Instant) -> Step<F::Output> {
        tokio::pin!(future);
        loop {
            let deadline = self.idle_deadline(*last_activity);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Step::Cancelled,
                output = &mut future => return Step::Ready(output),
                _ = sleep_until(deadline) => {
                    *last_activity = self.refresh(*last_activity);
                    if self.is_idle(*last_activity) {
                        return Step::Idle;
                    }
                }
            }
        }
    }

    // pings that arrive while streaming are not waited for, but still count
    fn refresh(&self, last_activity: Instant) -> Instant {
        match self.signal.last_ping() {
            Some(at) if at > last_activity => at,
            _ => last_activity,
        }
    }

    fn is_fresh(&self, last_activity: Instant) -> bool {
        let timeout = self.config.idle_timeout();
        timeout.is_zero() || last_activity.elapsed() < timeout
    }

    fn is_idle(&self, last_activity: Instant) -> bool {
        !self.is_fresh(last_activity)
    }

    fn idle_deadline(&self, last_activity: Instant) -> Option<Instant> {
        let timeout = self.config.idle_timeout();
        if timeout.is_zero() {
            None
        } else {
            Some(last_activity + timeout)
        }
    }

    fn set_state(&self, state: CrawlerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::info!("crawler: {:?} -> {:?}", previous, state);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
