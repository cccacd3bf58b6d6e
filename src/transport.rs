//! Per-device request/response channel.
//!
//! Every send opens a fresh TCP connection, writes one frame, waits for the
//! first chunk of data (or a timeout) and closes the connection again. Sends
//! for the same device go through a FIFO queue so that at most one is on
//! the wire at any time.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use log::debug;

use crate::codec;
use crate::errors::Error;
use crate::history::{MessageHistory, MessageType};
use crate::runtime::{self, AsyncTcpStream, TcpStream};

type Result<T> = std::result::Result<T, Error>;

/// Outcome of a send that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The first chunk of data sent back by the controller.
    Data(Vec<u8>),
    /// Nothing came back before the deadline.
    ///
    /// Controllers only answer queries, so this is the normal outcome of a
    /// set command. A connection closed by the peer without data counts too.
    Timeout,
}

impl Reply {
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Reply::Data(data) => Some(data),
            Reply::Timeout => None,
        }
    }
}

/// Serialized TCP channel to one controller.
///
/// Cloning yields another handle onto the same queue.
#[derive(Debug, Clone)]
pub struct Transport {
    addr: Arc<RwLock<SocketAddr>>,
    queue: Arc<runtime::Mutex<()>>,
    history: Arc<runtime::Mutex<MessageHistory>>,
    connect_timeout: Duration,
}

impl Transport {
    const BUFFER_SIZE: usize = 1024;

    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> Self {
        Transport {
            addr: Arc::new(RwLock::new(addr)),
            queue: Arc::new(runtime::Mutex::new(())),
            history: Arc::new(runtime::Mutex::new(MessageHistory::new())),
            connect_timeout,
        }
    }

    /// Current target of the channel.
    pub fn addr(&self) -> SocketAddr {
        *self.addr.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point the channel at a new IP; the port is kept.
    ///
    /// A send already waiting in the queue picks the new address up.
    pub fn set_ip(&self, ip: Ipv4Addr) {
        let mut addr = self.addr.write().unwrap_or_else(PoisonError::into_inner);
        addr.set_ip(ip.into());
    }

    /// Snapshot of the frames exchanged so far.
    pub async fn history(&self) -> MessageHistory {
        self.history.lock().await.clone()
    }

    /// Send a frame and wait for the first reply.
    ///
    /// `use_checksum` appends the checksum byte before sending. `timeout`
    /// bounds the wait for a reply; the connect is bounded separately.
    pub async fn send(&self, frame: &[u8], use_checksum: bool, timeout: Duration) -> Result<Reply> {
        let bytes = if use_checksum {
            codec::with_checksum(frame)
        } else {
            frame.to_vec()
        };

        let _turn = self.queue.lock().await;
        let addr = self.addr();
        debug!("{} <- {:02x?}", addr, bytes);
        self.history.lock().await.record(MessageType::Send, &bytes);

        let result = self.exchange(addr, &bytes, timeout).await;
        match &result {
            Ok(Reply::Data(data)) => {
                debug!("{} -> {:02x?}", addr, data);
                self.history.lock().await.record(MessageType::Receive, data);
            }
            Ok(Reply::Timeout) => debug!("{} -> no reply", addr),
            Err(e) => self.history.lock().await.record_error(&e.to_string()),
        }
        result
    }

    async fn exchange(&self, addr: SocketAddr, bytes: &[u8], timeout: Duration) -> Result<Reply> {
        let mut stream = match runtime::timeout(self.connect_timeout, TcpStream::connect(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(Error::connect(addr, err)),
            Err(_) => {
                return Err(Error::connect(
                    addr,
                    io::Error::new(io::ErrorKind::TimedOut, "connect timeout"),
                ));
            }
        };

        let result = request(&mut stream, bytes, timeout).await;
        if let Err(err) = stream.shutdown().await {
            debug!("{}: close failed: {}", addr, err);
        }
        result
    }
}

async fn request(stream: &mut TcpStream, bytes: &[u8], timeout: Duration) -> Result<Reply> {
    stream
        .write_all(bytes)
        .await
        .map_err(|e| Error::socket("write", e))?;

    let mut buffer = [0u8; Transport::BUFFER_SIZE];
    match runtime::timeout(timeout, stream.read(&mut buffer)).await {
        Err(_) | Ok(Ok(0)) => Ok(Reply::Timeout),
        Ok(Ok(n)) => Ok(Reply::Data(buffer[..n].to_vec())),
        Ok(Err(e)) => Err(Error::socket("read", e)),
    }
}

#[cfg(all(test, feature = "runtime-tokio"))]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_millis(200);

    async fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        let (listener, addr) = listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let transport = Transport::new(addr, TIMEOUT);
        let reply = transport
            .send(&[0x71, 0x23, 0x0F], true, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(reply, Reply::Timeout);
    }

    #[tokio::test]
    async fn test_unreachable_device_is_an_error() {
        let (listener, addr) = listener().await;
        drop(listener);

        let transport = Transport::new(addr, TIMEOUT);
        let err = transport
            .send(&[0x81, 0x8A, 0x8B], false, TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
        assert!(transport.history().await.last_error().is_some());
    }

    #[tokio::test]
    async fn test_reply_and_checksum() {
        let (listener, addr) = listener().await;
        let device = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&[0x81, 0x33, 0x23]).await.unwrap();
            buf[..n].to_vec()
        });

        let transport = Transport::new(addr, TIMEOUT);
        let reply = transport.send(&[0x71, 0x23, 0x0F], true, TIMEOUT).await.unwrap();
        assert_eq!(reply.data(), Some(&[0x81, 0x33, 0x23][..]));
        assert_eq!(device.await.unwrap(), vec![0x71, 0x23, 0x0F, 0xA3]);

        let history = transport.history().await;
        assert_eq!(history.summary().send_count, 1);
        assert_eq!(history.summary().receive_count, 1);
    }

    #[tokio::test]
    async fn test_sends_keep_submission_order() {
        let (listener, addr) = listener().await;
        let device = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..3 {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 16];
                let n = socket.read(&mut buf).await.unwrap();
                seen.push(buf[1]);
                assert!(n > 0);
            }
            seen
        });

        let transport = Transport::new(addr, TIMEOUT);
        let sends = (0..3u8).map(|i| {
            let transport = transport.clone();
            async move { transport.send(&[0x71, i], false, TIMEOUT).await }
        });
        for result in futures::future::join_all(sends).await {
            assert_eq!(result.unwrap(), Reply::Timeout);
        }
        assert_eq!(device.await.unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_set_ip_keeps_port() {
        let transport = Transport::new("10.0.0.5:5577".parse().unwrap(), TIMEOUT);
        transport.set_ip(Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(transport.addr(), "10.0.0.9:5577".parse().unwrap());
    }
}
