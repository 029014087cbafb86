//! Channels carry raw CalcProtocol bytes
//!
//! A channel knows nothing about message formats. It sends byte buffers and
//! hands back whatever a single receive produced, optionally bounded by a
//! timeout.

use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use crate::protocol::Transport;

/// Channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    Closed,

    #[error("Message lost (timeout after {0:?})")]
    Timeout(Duration),

    #[error("Connection timeout")]
    ConnectTimeout,
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// A bidirectional byte channel to the server
#[async_trait]
pub trait Channel: Send {
    /// Transport this channel runs over
    fn transport(&self) -> Transport;

    /// Send one message
    async fn send(&mut self, bytes: &[u8]) -> ChannelResult<()>;

    /// Receive at most `max_bytes` from one read or one datagram
    async fn receive(&mut self, max_bytes: usize, timeout: Option<Duration>) -> ChannelResult<Bytes>;

    /// Release the channel
    async fn close(&mut self) -> ChannelResult<()>;
}

/// Opens fresh channels to one server
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn open_stream(&self) -> ChannelResult<Box<dyn Channel>>;

    async fn open_datagram(&self) -> ChannelResult<Box<dyn Channel>>;

    async fn open(&self, transport: Transport) -> ChannelResult<Box<dyn Channel>> {
        match transport {
            Transport::Tcp => self.open_stream().await,
            Transport::Udp => self.open_datagram().await,
        }
    }
}

async fn with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> ChannelResult<T>
where
    F: Future<Output = ChannelResult<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout(limit)),
        },
        None => fut.await,
    }
}

/// Channel over any byte stream; a TCP connection in production
pub struct StreamChannel<S> {
    stream: S,
}

impl<S> StreamChannel<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl StreamChannel<TcpStream> {
    /// Connect to `addr`, giving up after `connect_timeout`
    pub async fn connect(addr: SocketAddr, connect_timeout: Duration) -> ChannelResult<Self> {
        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ChannelError::Io(e)),
            Err(_) => return Err(ChannelError::ConnectTimeout),
        };
        tracing::debug!("Connected to {}", addr);
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl<S> Channel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn transport(&self) -> Transport {
        Transport::Tcp
    }

    async fn send(&mut self, bytes: &[u8]) -> ChannelResult<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize, timeout: Option<Duration>) -> ChannelResult<Bytes> {
        let stream = &mut self.stream;
        with_timeout(timeout, async move {
            let mut buf = vec![0u8; max_bytes];
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Err(ChannelError::Closed);
            }
            buf.truncate(n);
            Ok::<_, ChannelError>(Bytes::from(buf))
        })
        .await
    }

    async fn close(&mut self) -> ChannelResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Channel over a UDP socket connected to a single peer
pub struct DatagramChannel {
    socket: UdpSocket,
}

impl DatagramChannel {
    /// Bind an ephemeral local port and associate it with `peer`
    pub async fn connect(peer: SocketAddr) -> ChannelResult<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        tracing::debug!("Datagram socket {} associated with {}", socket.local_addr()?, peer);
        Ok(Self { socket })
    }
}

#[async_trait]
impl Channel for DatagramChannel {
    fn transport(&self) -> Transport {
        Transport::Udp
    }

    async fn send(&mut self, bytes: &[u8]) -> ChannelResult<()> {
        self.socket.send(bytes).await?;
        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize, timeout: Option<Duration>) -> ChannelResult<Bytes> {
        let socket = &self.socket;
        with_timeout(timeout, async move {
            let mut buf = vec![0u8; max_bytes];
            let n = socket.recv(&mut buf).await?;
            buf.truncate(n);
            Ok::<_, ChannelError>(Bytes::from(buf))
        })
        .await
    }

    async fn close(&mut self) -> ChannelResult<()> {
        Ok(())
    }
}

/// Opens real sockets to `host:port`
#[derive(Debug, Clone)]
pub struct NetChannelFactory {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl NetChannelFactory {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_millis(5000),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl ChannelFactory for NetChannelFactory {
    async fn open_stream(&self) -> ChannelResult<Box<dyn Channel>> {
        let addr = super::resolve_host(&self.host, self.port, false).await?;
        tracing::info!("Connecting to {} over TCP", addr);
        let channel = StreamChannel::connect(addr, self.connect_timeout).await?;
        Ok(Box::new(channel))
    }

    async fn open_datagram(&self) -> ChannelResult<Box<dyn Channel>> {
        let addr = super::resolve_host(&self.host, self.port, true).await?;
        tracing::info!("Opening UDP channel to {}", addr);
        let channel = DatagramChannel::connect(addr).await?;
        Ok(Box::new(channel))
    }
}
