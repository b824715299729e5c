//! TCP stream that reconnects in the background.
use std::{
    fmt,
    io::{Error as IOError, ErrorKind as IOErrorKind, Result as IOResult},
    net::SocketAddr,
    time::Duration,
};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::oneshot::{channel, error::TryRecvError, Receiver},
    time::sleep,
};

const MIN_RECONNECT_DELAY_MS: u64 = 50;
const MAX_RECONNECT_DELAY_MS: u64 = 10_000;

enum Link {
    Connected(TcpStream),
    Connecting(Receiver<TcpStream>),
}

pub(super) struct RetrySocket {
    address: SocketAddr,
    link: Link,
}

impl fmt::Debug for RetrySocket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RetrySocket")
            .field("address", &self.address)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl RetrySocket {
    /// Must be called inside a tokio runtime, connection is established by a spawned task.
    pub(super) fn new(address: SocketAddr) -> Self {
        Self {
            address,
            link: Link::Connecting(Self::spawn_connect(address)),
        }
    }

    pub(super) fn is_connected(&self) -> bool {
        matches!(self.link, Link::Connected(_))
    }

    fn spawn_connect(address: SocketAddr) -> Receiver<TcpStream> {
        let (tx, rx) = channel();
        tokio::spawn(async move {
            let mut delay = MIN_RECONNECT_DELAY_MS;
            while !tx.is_closed() {
                match TcpStream::connect(address).await {
                    Ok(stream) => {
                        if tx.send(stream).is_err() {
                            debug!("connection to {} is not needed anymore", address);
                        }
                        return;
                    }
                    Err(e) => trace!("can't connect to {}: {}", address, e),
                }
                sleep(Duration::from_millis(delay)).await;
                delay = MAX_RECONNECT_DELAY_MS.min(delay << 1);
            }
        });
        rx
    }

    fn stream(&mut self) -> IOResult<&mut TcpStream> {
        if let Link::Connecting(rx) = &mut self.link {
            match rx.try_recv() {
                Ok(stream) => {
                    info!("connected to {}", self.address);
                    self.link = Link::Connected(stream);
                }
                Err(TryRecvError::Closed) => {
                    warn!("connection task for {} is gone, respawn", self.address);
                    self.link = Link::Connecting(Self::spawn_connect(self.address));
                    return Err(Self::not_connected());
                }
                Err(TryRecvError::Empty) => return Err(Self::not_connected()),
            }
        }
        match &mut self.link {
            Link::Connected(stream) => Ok(stream),
            Link::Connecting(_) => Err(Self::not_connected()),
        }
    }

    fn not_connected() -> IOError {
        IOError::new(
            IOErrorKind::NotConnected,
            "not connected, connection establishment is in progress",
        )
    }

    /// Writes and flushes `buf`. A failed write drops the connection and starts reconnecting.
    pub(super) async fn send(&mut self, buf: &[u8]) -> IOResult<()> {
        let stream = self.stream()?;
        let res = match stream.write_all(buf).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = &res {
            warn!("disconnected from {}: {}", self.address, e);
            self.link = Link::Connecting(Self::spawn_connect(self.address));
        }
        res
    }
}
