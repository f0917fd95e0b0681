#![allow(dead_code)]

use {
    mjpegproxy::{ActivitySignal, Crawler, CrawlerState},
    std::{
        net::SocketAddr,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    },
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        sync::Semaphore,
        task::JoinHandle,
        time::{Duration, Instant, sleep},
    },
};

/// How the fake camera answers one connection.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Respond with this status and an empty body.
    Status(u16),
    /// Respond 200 without a multipart boundary.
    NoBoundary,
    /// Respond 200 with a multipart stream of parts with these sizes.
    Stream {
        boundary: String,
        sizes: Vec<usize>,
        mode: Mode,
    },
}

#[derive(Clone, Copy, Debug)]
pub enum Mode {
    /// Send all parts, then keep the connection open without sending more.
    Hold,
    /// Send each part only after the test calls `release`, then hold.
    Gated,
    /// Send all parts, then close the connection.
    Close,
    /// Send the parts over and over with a pause in between.
    Repeat(Duration),
}

impl Reply {
    pub fn stream(sizes: &[usize], mode: Mode) -> Self {
        Reply::Stream {
            boundary: "X".to_string(),
            sizes: sizes.to_vec(),
            mode,
        }
    }
}

/// Byte every frame of part `index` is filled with.
pub fn fill_byte(index: usize) -> u8 {
    b'a' + (index % 26) as u8
}

struct Shared {
    script: Mutex<Vec<Reply>>,
    requests: AtomicUsize,
    open: AtomicUsize,
    heads: Mutex<Vec<String>>,
    gate: Semaphore,
}

/// Scripted MJPEG camera on a loopback port.
///
/// Connection `n` is answered with reply `n` of the script, the last reply
/// repeats once the script runs out.
pub struct FakeCamera {
    addr: SocketAddr,
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
}

impl FakeCamera {
    pub async fn start(script: Vec<Reply>) -> Self {
        assert!(!script.is_empty());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind failed");
        let addr = listener.local_addr().expect("no local addr");
        let shared = Arc::new(Shared {
            script: Mutex::new(script),
            requests: AtomicUsize::new(0),
            open: AtomicUsize::new(0),
            heads: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        });

        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let shared = Arc::clone(&accept_shared);
                tokio::spawn(async move {
                    shared.open.fetch_add(1, Ordering::SeqCst);
                    handle_connection(socket, &shared).await;
                    shared.open.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            shared,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/video.mjpg", self.addr)
    }

    /// Number of HTTP requests received so far.
    pub fn requests(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }

    /// Number of connections currently open.
    pub fn open_connections(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Lowercased request heads in arrival order.
    pub fn request_heads(&self) -> Vec<String> {
        self.shared.heads.lock().unwrap().clone()
    }

    /// Let `count` more parts of a gated stream through.
    pub fn release(&self, count: usize) {
        self.shared.gate.add_permits(count);
    }
}

impl Drop for FakeCamera {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn handle_connection(mut socket: TcpStream, shared: &Shared) {
    let Some(head) = read_head(&mut socket).await else {
        return;
    };
    let index = shared.requests.fetch_add(1, Ordering::SeqCst);
    shared.heads.lock().unwrap().push(head.to_ascii_lowercase());
    let reply = {
        let script = shared.script.lock().unwrap();
        script[index.min(script.len() - 1)].clone()
    };

    match reply {
        Reply::Status(code) => {
            let response = format!(
                "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Reply::NoBoundary => {
            let response =
                "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Reply::Stream {
            boundary,
            sizes,
            mode,
        } => {
            let _ = stream_parts(&mut socket, shared, &boundary, &sizes, mode).await;
            if let Mode::Close = mode {
                let _ = socket.shutdown().await;
            }
            // hold until the client hangs up
            let mut buf = [0u8; 1024];
            while let Ok(n) = socket.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
        }
    }
}

async fn stream_parts(
    socket: &mut TcpStream,
    shared: &Shared,
    boundary: &str,
    sizes: &[usize],
    mode: Mode,
) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary={}\r\nConnection: close\r\n\r\n--{}\r\n",
        boundary, boundary
    );
    socket.write_all(head.as_bytes()).await?;

    loop {
        for (index, size) in sizes.iter().enumerate() {
            if let Mode::Gated = mode {
                match shared.gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(_) => return Ok(()),
                }
            }
            // each part is complete once the next delimiter is written
            let part_head = format!(
                "Content-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                size
            );
            socket.write_all(part_head.as_bytes()).await?;
            socket.write_all(&vec![fill_byte(index); *size]).await?;
            socket
                .write_all(format!("\r\n--{}\r\n", boundary).as_bytes())
                .await?;
            socket.flush().await?;
            if let Mode::Repeat(pause) = mode {
                sleep(pause).await;
            }
        }
        if !matches!(mode, Mode::Repeat(_)) {
            return Ok(());
        }
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        head.extend_from_slice(&buf[..n]);
    }
    Some(String::from_utf8_lossy(&head).into_owned())
}

/// Poll `condition` every 10ms until it holds or `limit` passes.
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Ping like a polling client every 10ms until `condition` holds or `limit` passes.
pub async fn ping_until(
    signal: &ActivitySignal,
    limit: Duration,
    condition: impl Fn() -> bool,
) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        signal.ping();
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub async fn wait_for_state(crawler: &Crawler, state: CrawlerState, limit: Duration) -> bool {
    wait_until(limit, || crawler.state() == state).await
}
