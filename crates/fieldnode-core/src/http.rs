//! One-shot HTTP/1.1 GET over a platform TCP stack
//!
//! The response is not parsed: every received chunk is handed verbatim to a
//! caller-supplied sink and only the running byte count is kept.

use core::fmt::{self, Write as _};
use core::net::{Ipv4Addr, SocketAddrV4};

use embedded_io_async::{Error as _, ErrorKind, Read, Write};
use log::{error, info};
use thiserror_no_std::Error;

use crate::config::{HTTP_RX_BUFFER_SIZE, HttpTarget};

/// Upper bound for the request line plus the `Host` header
pub const MAX_REQUEST_LEN: usize = 256;

pub type Request = heapless::String<MAX_REQUEST_LEN>;

/// Hostname to IPv4 lookup
pub trait Resolver {
    type Error: fmt::Debug;

    /// Resolve `host` and return its first IPv4 address.
    fn resolve_ipv4(&mut self, host: &str) -> impl Future<Output = Result<Ipv4Addr, Self::Error>>;
}

/// An open stream socket
pub trait Connection: Read + Write {
    /// Shut the socket down. Called exactly once per connection.
    fn close(&mut self);
}

/// Opens stream sockets. A connection may borrow buffers from the connector.
pub trait TcpConnector {
    type Error: fmt::Debug;
    type Connection<'c>: Connection
    where
        Self: 'c;

    fn connect(
        &mut self,
        remote: SocketAddrV4,
    ) -> impl Future<Output = Result<Self::Connection<'_>, Self::Error>>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    #[error("request for this host and path exceeds {MAX_REQUEST_LEN} bytes")]
    RequestTooLong,
    #[error("could not resolve host")]
    Resolve,
    #[error("could not connect to {0}")]
    Connect(SocketAddrV4),
    #[error("send failed: {0:?}")]
    Send(ErrorKind),
    #[error("receive failed: {0:?}")]
    Receive(ErrorKind),
}

/// Outcome of a completed GET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpGetSummary {
    pub remote: SocketAddrV4,
    pub bytes_received: usize,
}

/// Build `GET <path> HTTP/1.1` with a single `Host` header and no body.
pub fn build_request(host: &str, path: &str) -> Result<Request, HttpError> {
    let mut request = Request::new();
    write!(request, "GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", path, host)
        .map_err(|_| HttpError::RequestTooLong)?;
    Ok(request)
}

pub struct HttpClient<R, C> {
    resolver: R,
    connector: C,
}

impl<R: Resolver, C: TcpConnector> HttpClient<R, C> {
    pub fn new(resolver: R, connector: C) -> Self {
        Self {
            resolver,
            connector,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Perform one GET against `target` and drain the response into `sink`.
    ///
    /// Ends when the peer closes the connection. The socket is closed on every
    /// path once it has been opened.
    pub async fn get<F>(
        &mut self,
        target: &HttpTarget<'_>,
        mut sink: F,
    ) -> Result<HttpGetSummary, HttpError>
    where
        F: FnMut(&[u8]),
    {
        let request = build_request(target.host, target.path)?;

        let address = self
            .resolver
            .resolve_ipv4(target.host)
            .await
            .map_err(|e| {
                error!("Unable to resolve '{}': {:?}", target.host, e);
                HttpError::Resolve
            })?;
        let remote = SocketAddrV4::new(address, target.port);

        info!("Connecting to {} ({})", target.host, remote);
        let mut connection = self.connector.connect(remote).await.map_err(|e| {
            error!("Cannot connect to remote {}: {:?}", remote, e);
            HttpError::Connect(remote)
        })?;

        let result = exchange(&mut connection, request.as_bytes(), &mut sink).await;
        connection.close();

        let bytes_received = result?;
        info!("Received {} bytes from {}", bytes_received, remote);
        Ok(HttpGetSummary {
            remote,
            bytes_received,
        })
    }
}

async fn exchange<S, F>(
    connection: &mut S,
    request: &[u8],
    sink: &mut F,
) -> Result<usize, HttpError>
where
    S: Read + Write,
    F: FnMut(&[u8]),
{
    connection.write_all(request).await.map_err(|e| {
        error!("Error sending: {:?}", e);
        HttpError::Send(e.kind())
    })?;
    connection.flush().await.map_err(|e| {
        error!("Error sending: {:?}", e);
        HttpError::Send(e.kind())
    })?;

    let mut buffer = [0u8; HTTP_RX_BUFFER_SIZE];
    let mut total = 0;
    loop {
        let n = connection.read(&mut buffer).await.map_err(|e| {
            error!("Error receiving after {} bytes: {:?}", total, e);
            HttpError::Receive(e.kind())
        })?;
        if n == 0 {
            break;
        }
        sink(&buffer[..n]);
        total += n;
    }
    Ok(total)
}
