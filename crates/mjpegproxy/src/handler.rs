use {
    crate::*,
    axum::{Router, extract::State, response::IntoResponse, routing::get},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    std::sync::Arc,
};

#[derive(Clone)]
struct SnapshotState {
    cache: Arc<FrameCache>,
    signal: Arc<ActivitySignal>,
}

/// Router serving the cached frame as `image/jpeg` on `GET path`.
///
/// Every request pings `signal` after reading the cache. Before the first frame
/// arrives, or while upstream is failing, the body is empty; upstream errors are
/// never turned into HTTP errors.
pub fn router(path: &str, cache: Arc<FrameCache>, signal: Arc<ActivitySignal>) -> Router {
    Router::new()
        .route(path, get(serve_frame))
        .with_state(SnapshotState { cache, signal })
}

async fn serve_frame(State(state): State<SnapshotState>) -> impl IntoResponse {
    let response = (
        [(CONTENT_TYPE, "image/jpeg"), (CACHE_CONTROL, "no-store")],
        state.cache.get(),
    );
    // the frame is read before pinging, a woken crawler never delays this response
    state.signal.ping();
    response
}
