//! embassy-net implementations of the core HTTP client's resolver and connector

use core::net::{Ipv4Addr, SocketAddrV4};

use embassy_net::dns::{self, DnsQueryType};
use embassy_net::tcp::{self, ConnectError, TcpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_time::Duration;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use fieldnode_core::http::{Connection, Resolver, TcpConnector};
use thiserror_no_std::Error;

use crate::config::{TCP_RX_BUFFER_SIZE, TCP_SOCKET_TIMEOUT_SECS, TCP_TX_BUFFER_SIZE};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("DNS query failed: {0:?}")]
    Dns(dns::Error),
    #[error("DNS answer holds no IPv4 address")]
    NoIpv4Address,
}

/// Resolves hostnames through the stack's DNS servers. Dotted-decimal input is
/// returned without a query.
pub struct StackResolver {
    stack: Stack<'static>,
}

impl StackResolver {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl Resolver for StackResolver {
    type Error = ResolveError;

    async fn resolve_ipv4(&mut self, host: &str) -> Result<Ipv4Addr, ResolveError> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(ip);
        }

        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(ResolveError::Dns)?;

        addresses
            .iter()
            .find_map(|address| match address {
                IpAddress::Ipv4(v4) => Some(*v4),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .ok_or(ResolveError::NoIpv4Address)
    }
}

/// Opens TCP sockets on the stack. Each connection borrows the connector's
/// buffers, so only one can be open at a time.
pub struct StackConnector {
    stack: Stack<'static>,
    rx_buffer: &'static mut [u8; TCP_RX_BUFFER_SIZE],
    tx_buffer: &'static mut [u8; TCP_TX_BUFFER_SIZE],
}

impl StackConnector {
    pub fn new(
        stack: Stack<'static>,
        rx_buffer: &'static mut [u8; TCP_RX_BUFFER_SIZE],
        tx_buffer: &'static mut [u8; TCP_TX_BUFFER_SIZE],
    ) -> Self {
        Self {
            stack,
            rx_buffer,
            tx_buffer,
        }
    }
}

impl TcpConnector for StackConnector {
    type Error = ConnectError;
    type Connection<'c> = StackConnection<'c>;

    async fn connect(
        &mut self,
        remote: SocketAddrV4,
    ) -> Result<StackConnection<'_>, ConnectError> {
        let mut socket =
            TcpSocket::new(self.stack, &mut self.rx_buffer[..], &mut self.tx_buffer[..]);
        socket.set_timeout(Some(Duration::from_secs(TCP_SOCKET_TIMEOUT_SECS)));
        socket.connect((*remote.ip(), remote.port())).await?;
        Ok(StackConnection { socket })
    }
}

pub struct StackConnection<'a> {
    socket: TcpSocket<'a>,
}

fn error_kind(e: tcp::Error) -> ErrorKind {
    match e {
        tcp::Error::ConnectionReset => ErrorKind::ConnectionReset,
        #[allow(unreachable_patterns)]
        _ => ErrorKind::Other,
    }
}

impl ErrorType for StackConnection<'_> {
    type Error = ErrorKind;
}

impl Read for StackConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        self.socket.read(buf).await.map_err(error_kind)
    }
}

impl Write for StackConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        self.socket.write(buf).await.map_err(error_kind)
    }

    async fn flush(&mut self) -> Result<(), ErrorKind> {
        self.socket.flush().await.map_err(error_kind)
    }
}

impl Connection for StackConnection<'_> {
    fn close(&mut self) {
        self.socket.close();
    }
}
