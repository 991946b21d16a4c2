//! Outbound connection establishment.
//!
//! All port-25 egress funnels through [`dial`]. Production traffic goes
//! through the configured SOCKS5 tunnel with no fallback: a proxy failure
//! is a failed attempt, never a direct connect from the worker's own IP.

use std::io;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

/// One established outbound stream, direct or tunnelled.
#[derive(Debug)]
pub enum Connection {
    Direct(TcpStream),
    Proxied(Socks5Stream<TcpStream>),
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Direct(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Proxied(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Direct(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Proxied(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Direct(stream) => Pin::new(stream).poll_flush(cx),
            Self::Proxied(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Direct(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Proxied(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Establishes a TCP connection to `(host, port)` under the configured
/// egress policy, bounded by the connect timeout.
///
/// | Mode | Proxy | Action |
/// |------|-------|--------|
/// | dev  | any   | direct dial |
/// | prod | yes   | SOCKS5, authenticated when both credentials are set |
/// | prod | no    | refused |
///
/// # Errors
///
/// Fails on timeout, refused/unreachable targets, SOCKS5 handshake
/// problems, or a missing proxy in production. Never falls back to a
/// direct connection in production.
pub async fn dial(host: &str, port: u16, config: &Config) -> Result<Connection> {
    let target = format!("{host}:{port}");

    if config.is_dev {
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| timeout_error(&target))??;
        return Ok(Connection::Direct(stream));
    }

    let Some(proxy) = &config.proxy else {
        return Err(AppError::Config(
            "SOCKS5_PROXY not configured in production mode (safety requirement)".to_string(),
        ));
    };

    let connect = async {
        match proxy.credentials() {
            Some((username, password)) => {
                Socks5Stream::connect_with_password(
                    proxy.address.as_str(),
                    (host, port),
                    username,
                    password,
                )
                .await
            }
            None => Socks5Stream::connect(proxy.address.as_str(), (host, port)).await,
        }
    };

    let stream = tokio::time::timeout(config.connect_timeout, connect)
        .await
        .map_err(|_| timeout_error(&target))??;

    tracing::debug!(target = %target, proxy = %proxy.address, "Connected via proxy");
    Ok(Connection::Proxied(stream))
}

fn timeout_error(target: &str) -> AppError {
    AppError::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("connect to {target} timed out"),
    ))
}
