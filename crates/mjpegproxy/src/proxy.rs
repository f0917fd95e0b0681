use {
    crate::*,
    axum::Router,
    bytes::Bytes,
    std::{future::Future, sync::Arc},
    tokio::net::TcpListener,
};

/// A frame cache in front of one MJPEG stream, with the crawler that fills it
/// and the HTTP route that serves it.
pub struct MjpegProxy {
    config: ProxyConfig,
    cache: Arc<FrameCache>,
    signal: Arc<ActivitySignal>,
    crawler: Option<Crawler>,
}

impl MjpegProxy {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            cache: Arc::new(FrameCache::new()),
            signal: Arc::new(ActivitySignal::new()),
            crawler: None,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The currently cached frame.
    pub fn frame(&self) -> Bytes {
        self.cache.get()
    }

    /// Start crawling the upstream stream on demand.
    ///
    /// A crawler that is already running is stopped first.
    pub async fn open_stream(&mut self) -> Result<(), ProxyError> {
        self.close_stream().await;
        self.crawler = Some(Crawler::start(
            self.config.clone(),
            Arc::clone(&self.cache),
            Arc::clone(&self.signal),
        )?);
        Ok(())
    }

    /// Stop crawling and drop the upstream connection.
    pub async fn close_stream(&mut self) {
        if let Some(crawler) = self.crawler.take() {
            crawler.stop().await;
        }
    }

    pub fn crawler_state(&self) -> CrawlerState {
        self.crawler
            .as_ref()
            .map_or(CrawlerState::Stopped, Crawler::state)
    }

    pub fn is_streaming(&self) -> bool {
        self.crawler_state() == CrawlerState::Streaming
    }

    pub fn router(&self) -> Router {
        handler::router(
            self.config.listen_path(),
            Arc::clone(&self.cache),
            Arc::clone(&self.signal),
        )
    }

    /// Serve frames on `listener` until `shutdown` completes.
    pub fn serve<F>(
        &self,
        listener: TcpListener,
        shutdown: F,
    ) -> impl Future<Output = Result<(), ProxyError>> + Send + use<F>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await?;
            Ok(())
        }
    }
}
