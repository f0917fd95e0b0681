use {
    base::*,
    mjpegproxy::{MjpegProxy, ProxyConfig},
    tokio::net::TcpListener,
};

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        log::error!("cannot listen for ctrl-c: {}", error);
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stream url from the first argument or the environment
    let mut config = ProxyConfig::from_env()?;
    if let Some(url) = std::env::args().nth(1) {
        config = config.with_url(url);
    }
    init_logger(config.log_dir().cloned())?;
    config.validate()?;

    log::info!("MJPEG proxy for {}", config.url());
    if config.idle_timeout().is_zero() {
        log::info!("idle timeout disabled, upstream stays connected once opened");
    } else {
        log::info!("idle timeout: {:?}", config.idle_timeout());
    }

    let listener = match TcpListener::bind(config.listen_addr()).await {
        Ok(listener) => listener,
        Err(error) => log_fatal!("cannot bind {}: {}", config.listen_addr(), error),
    };
    log::info!(
        "serving frames on http://{}{}",
        listener.local_addr()?,
        config.listen_path()
    );

    let mut proxy = MjpegProxy::new(config);
    proxy.open_stream().await?;
    let result = proxy.serve(listener, shutdown_signal()).await;
    proxy.close_stream().await;
    result?;

    Ok(())
}
