//! Control socket. One JSON request per connection, one JSON reply.

use std::io::{Read, Write};
use std::net::Shutdown;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub mod protocol;

pub use protocol::{Request, Response};

use crate::actor::reactor::{self, Event};

const MAX_REQUEST_BYTES: u64 = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("could not connect to {}: {source}; is way-layout running?", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not bind {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request too large")]
    TooLarge,
    #[error("timed out waiting for the request")]
    Timeout,
}

pub fn socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").ok();
    let vtnr = std::env::var("XDG_VTNR").ok();
    socket_path_in(runtime_dir.as_deref(), vtnr.as_deref())
}

pub fn socket_path_in(runtime_dir: Option<&str>, vtnr: Option<&str>) -> PathBuf {
    let dir = match runtime_dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("/tmp"),
    };
    match vtnr {
        Some(vt) if !vt.is_empty() => dir.join(format!("way-layout.{vt}.sock")),
        _ => dir.join("way-layout.sock"),
    }
}

/// Accepts control connections on the current `LocalSet`. The socket file
/// is removed when this is dropped.
pub struct IpcServer {
    path: PathBuf,
}

impl IpcServer {
    pub fn bind(path: &Path, events_tx: reactor::Sender) -> Result<IpcServer, IpcError> {
        // Only one daemon runs per terminal, so a leftover socket is stale.
        if path.exists() {
            debug!("removing stale socket {}", path.display());
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)
            .map_err(|source| IpcError::Bind { path: path.to_path_buf(), source })?;
        info!("listening on {}", path.display());

        tokio::task::spawn_local(accept_loop(listener, events_tx));
        Ok(IpcServer { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl Drop for IpcServer {
    fn drop(&mut self) { _ = std::fs::remove_file(&self.path); }
}

async fn accept_loop(listener: UnixListener, events_tx: reactor::Sender) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::task::spawn_local(serve_connection(stream, events_tx.clone()));
            }
            Err(e) => warn!("accept failed: {e}"),
        }
    }
}

async fn serve_connection(mut stream: UnixStream, events_tx: reactor::Sender) {
    let response = match read_request(&mut stream, REQUEST_TIMEOUT).await {
        Ok(request) => dispatch(request, &events_tx).await,
        Err(e) => {
            warn!("bad control request: {e}");
            Response::error(e.to_string())
        }
    };

    if let Err(e) = write_response(&mut stream, &response).await {
        debug!("could not reply: {e}");
    }
}

async fn read_request(stream: &mut UnixStream, timeout: Duration) -> Result<Request, IpcError> {
    let mut buf = Vec::new();
    let mut limited = (&mut *stream).take(MAX_REQUEST_BYTES + 1);
    tokio::time::timeout(timeout, limited.read_to_end(&mut buf))
        .await
        .map_err(|_| IpcError::Timeout)??;
    if buf.len() as u64 > MAX_REQUEST_BYTES {
        return Err(IpcError::TooLarge);
    }
    Ok(serde_json::from_slice(&buf)?)
}

async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<(), IpcError> {
    let buf = serde_json::to_vec(response)?;
    stream.write_all(&buf).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn dispatch(request: Request, events_tx: &reactor::Sender) -> Response {
    let (tx, rx) = oneshot::channel();
    if events_tx.try_send(Event::Command { request, response: Some(tx) }).is_err() {
        return Response::error("way-layout is shutting down");
    }
    rx.await.unwrap_or_else(|_| Response::error("way-layout is shutting down"))
}

/// Blocking client used by the command line.
pub struct IpcClient {
    path: PathBuf,
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self { IpcClient { path: path.into() } }

    pub fn send(&self, request: &Request) -> Result<Response, IpcError> {
        let mut stream = std::os::unix::net::UnixStream::connect(&self.path)
            .map_err(|source| IpcError::Connect { path: self.path.clone(), source })?;

        serde_json::to_writer(&mut stream, request)?;
        stream.flush()?;
        stream.shutdown(Shutdown::Write)?;

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;
        Ok(serde_json::from_slice(&buf)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::actor;
    use crate::sys::executor::Executor;

    #[test]
    fn socket_path_follows_the_environment() {
        assert_eq!(
            socket_path_in(Some("/run/user/1000"), Some("1")),
            PathBuf::from("/run/user/1000/way-layout.1.sock")
        );
        assert_eq!(
            socket_path_in(Some("/run/user/1000"), None),
            PathBuf::from("/run/user/1000/way-layout.sock")
        );
        assert_eq!(socket_path_in(None, None), PathBuf::from("/tmp/way-layout.sock"));
    }

    #[test]
    fn request_reaches_the_reactor_and_reply_comes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");

        let response = Executor::run(async {
            let (tx, mut rx) = actor::channel();
            let server = IpcServer::bind(&path, tx).unwrap();

            let client = IpcClient::new(server.path());
            let request = tokio::task::spawn_blocking(move || client.send(&Request::GetConfig));

            let (_, event) = rx.recv().await.unwrap();
            let Event::Command { request: received, response: Some(reply) } = event else {
                panic!("unexpected event {event:?}");
            };
            assert_eq!(received, Request::GetConfig);
            reply.send(Response::Success { data: json!({ "ok": true }) }).unwrap();

            request.await.unwrap().unwrap()
        })
        .unwrap();

        assert_eq!(response, Response::Success { data: json!({ "ok": true }) });
        assert!(!path.exists());
    }

    #[test]
    fn malformed_request_gets_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");

        let reply = Executor::run(async {
            let (tx, _rx) = actor::channel();
            let _server = IpcServer::bind(&path, tx).unwrap();

            let path = path.clone();
            tokio::task::spawn_blocking(move || {
                let mut stream = std::os::unix::net::UnixStream::connect(path).unwrap();
                stream.write_all(b"{\"command\": \"reboot\"}").unwrap();
                stream.shutdown(Shutdown::Write).unwrap();
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).unwrap();
                serde_json::from_slice::<Response>(&buf).unwrap()
            })
            .await
            .unwrap()
        })
        .unwrap();

        assert!(!reply.is_success());
    }

    #[test]
    fn silent_client_times_out() {
        let (server, client) = std::os::unix::net::UnixStream::pair().unwrap();

        let result = Executor::run(async move {
            server.set_nonblocking(true).unwrap();
            let mut stream = UnixStream::from_std(server).unwrap();
            read_request(&mut stream, Duration::from_millis(50)).await
        })
        .unwrap();

        assert!(matches!(result, Err(IpcError::Timeout)));
        drop(client);
    }

    #[test]
    fn connect_error_names_the_socket() {
        let err = IpcError::Connect {
            path: PathBuf::from("/run/user/1000/way-layout.sock"),
            source: std::io::ErrorKind::NotFound.into(),
        };
        assert!(
            err.to_string().starts_with("could not connect to /run/user/1000/way-layout.sock: ")
        );
    }

    #[test]
    fn client_reports_missing_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let err = IpcClient::new(dir.path().join("absent.sock")).send(&Request::GetConfig);
        assert!(matches!(err, Err(IpcError::Connect { .. })));
    }
}
