use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use mavlink::common::{MavDataStream, MavMessage, REQUEST_DATA_STREAM_DATA};
use mavlink::error::MessageReadError;
use mavlink::{MavHeader, MavlinkVersion, Message, MAV_STX, MAV_STX_V2};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::address::ConnectionAddress;
use crate::message::{FcMessage, Frame};

/// Largest read in one go. A UDP datagram may carry several frames.
const READ_CHUNK: usize = 4096;

/// Pause after an I/O error so a dead link does not spin the ingest task.
const IO_ERROR_BACKOFF: Duration = Duration::from_millis(100);

// bytes around the payload: v1 = stx + 5 header + 2 crc, v2 = stx + 9 header + 2 crc
const V1_OVERHEAD: usize = 8;
const V2_OVERHEAD: usize = 12;
const V2_SIGNATURE_LEN: usize = 13;
const V2_FLAG_SIGNED: u8 = 0x01;

/// A receive that did not produce a frame.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("message source closed")]
    Closed,
}

/// Who to ask for data streams: the system/component that sent the
/// handshake heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTarget {
    pub system_id: u8,
    pub component_id: u8,
}

/// A stream of decoded vehicle messages.
///
/// `recv` must be cancel safe: the ingestor wraps every call in a timeout
/// and drops the future when it expires.
#[async_trait]
pub trait MessageSource: Send {
    async fn recv(&mut self) -> Result<Frame, SourceError>;

    /// Asks the vehicle to start sending all data streams at `rate_hz`.
    async fn request_streams(&mut self, target: StreamTarget, rate_hz: u16) -> Result<(), SourceError>;

    /// Releases the transport. Called once, after the last `recv`.
    async fn close(&mut self) {}
}

/// The byte transport under a [`MavlinkSource`].
enum Link {
    Udp {
        sock: UdpSocket,
        /// Where replies go. A listening socket learns it from the last sender.
        peer: Option<SocketAddr>,
        listening: bool,
    },
    Tcp(TcpStream),
    Serial(SerialStream),
}

impl Link {
    async fn open(address: &ConnectionAddress) -> io::Result<Self> {
        let url = match address {
            ConnectionAddress::Serial { device, baud } => {
                let port = tokio_serial::new(device.as_str(), *baud)
                    .open_native_async()
                    .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("open serial {}: {}", device, e)))?;
                return Ok(Link::Serial(port));
            }
            ConnectionAddress::Network(url) => url,
        };

        let (scheme, host_port) = url
            .split_once(':')
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("bad address {}", url)))?;
        let addr = tokio::net::lookup_host(host_port)
            .await?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no address for {}", host_port)))?;

        let link = match scheme {
            "udpin" => Link::Udp {
                sock: UdpSocket::bind(addr).await?,
                peer: None,
                listening: true,
            },
            "udpout" => Link::Udp {
                sock: UdpSocket::bind(unspecified(&addr)).await?,
                peer: Some(addr),
                listening: false,
            },
            "udpbcast" => {
                let sock = UdpSocket::bind(unspecified(&addr)).await?;
                sock.set_broadcast(true)?;
                Link::Udp {
                    sock,
                    peer: Some(addr),
                    listening: false,
                }
            }
            "tcpout" => Link::Tcp(TcpStream::connect(addr).await?),
            "tcpin" => {
                // one vehicle per link; the listener goes away once it connects
                let listener = TcpListener::bind(addr).await?;
                let (stream, from) = listener.accept().await?;
                debug!("mavlink: accepted {}", from);
                Link::Tcp(stream)
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported scheme {}", other),
                ))
            }
        };
        Ok(link)
    }

    /// Cancel safe: bytes land in `chunk` only once the read completes.
    async fn read(&mut self, chunk: &mut [u8]) -> Result<usize, SourceError> {
        match self {
            Link::Udp { sock, peer, listening } => {
                let (n, from) = sock.recv_from(chunk).await?;
                if *listening && *peer != Some(from) {
                    debug!("mavlink: peer is {}", from);
                    *peer = Some(from);
                }
                Ok(n)
            }
            Link::Tcp(s) => stream_read(s.read(chunk).await),
            Link::Serial(s) => stream_read(s.read(chunk).await),
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Link::Udp { sock, peer, .. } => {
                let to = peer.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no peer heard yet"))?;
                sock.send_to(bytes, to).await?;
                Ok(())
            }
            Link::Tcp(s) => s.write_all(bytes).await,
            Link::Serial(s) => s.write_all(bytes).await,
        }
    }
}

fn unspecified(addr: &SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

fn stream_read(res: io::Result<usize>) -> Result<usize, SourceError> {
    match res {
        Ok(0) => Err(SourceError::Closed),
        Ok(n) => Ok(n),
        Err(e) if is_closed(&e) => Err(SourceError::Closed),
        Err(e) => Err(SourceError::Io(e)),
    }
}

fn is_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
    )
}

/// Pulls the next frame out of `buf`, or `None` when more bytes are needed.
///
/// Bytes before a start marker are dropped. A frame that fails its checksum
/// costs one byte, so a marker inside garbage cannot hide the real frame
/// after it. Well-formed frames with ids outside the common dialect come
/// back as [`FcMessage::Other`].
pub fn decode_next(buf: &mut BytesMut) -> Option<Result<Frame, SourceError>> {
    let start = match buf.iter().position(|&b| b == MAV_STX || b == MAV_STX_V2) {
        Some(i) => i,
        None => {
            buf.clear();
            return None;
        }
    };
    buf.advance(start);

    let (version, len, sys, comp, id) = if buf[0] == MAV_STX {
        if buf.len() < 6 {
            return None;
        }
        (MavlinkVersion::V1, buf[1] as usize + V1_OVERHEAD, buf[3], buf[4], buf[5] as u32)
    } else {
        if buf.len() < 10 {
            return None;
        }
        let mut len = buf[1] as usize + V2_OVERHEAD;
        if buf[2] & V2_FLAG_SIGNED != 0 {
            len += V2_SIGNATURE_LEN;
        }
        let id = u32::from_le_bytes([buf[7], buf[8], buf[9], 0]);
        (MavlinkVersion::V2, len, buf[5], buf[6], id)
    };
    if buf.len() < len {
        return None;
    }

    let decoded = mavlink::read_versioned_msg::<MavMessage, _>(&mut &buf[..len], version);
    match decoded {
        Ok((hdr, msg)) => {
            buf.advance(len);
            Some(Ok(Frame::new(hdr.system_id, hdr.component_id, FcMessage::from(&msg))))
        }
        Err(_) if MavMessage::default_message_from_id(id).is_err() => {
            buf.advance(len);
            Some(Ok(Frame::new(sys, comp, FcMessage::Other { id })))
        }
        Err(e) => {
            buf.advance(1);
            let reason = match e {
                MessageReadError::Io(_) => format!("bad checksum on message {}", id),
                MessageReadError::Parse(p) => p.to_string(),
            };
            Some(Err(SourceError::Decode(reason)))
        }
    }
}

/// MAVLink over serial, UDP or TCP, read and written on the runtime.
///
/// Dropping the source (or [`close`](MessageSource::close)) releases the
/// socket or port at once, so the same address can be opened again.
pub struct MavlinkSource {
    link: Option<Link>,
    buf: BytesMut,
    chunk: Box<[u8]>,
    hdr: MavHeader,
    address: ConnectionAddress,
}

impl MavlinkSource {
    pub async fn open(address: &ConnectionAddress, sys_id: u8, comp_id: u8) -> io::Result<Self> {
        info!("mavlink: connecting to {}", address);
        let link = Link::open(address).await?;
        Ok(Self {
            link: Some(link),
            buf: BytesMut::with_capacity(READ_CHUNK),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
            hdr: MavHeader {
                system_id: sys_id,
                component_id: comp_id,
                sequence: 0,
            },
            address: address.clone(),
        })
    }

    async fn send(&mut self, msg: &MavMessage) -> Result<(), SourceError> {
        let link = self.link.as_mut().ok_or(SourceError::Closed)?;
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        let mut out = Vec::with_capacity(mavlink::MAX_FRAME_SIZE);
        mavlink::write_versioned_msg(&mut out, MavlinkVersion::V2, self.hdr, msg)
            .map_err(|e| SourceError::Io(io::Error::new(io::ErrorKind::InvalidData, format!("encode: {:?}", e))))?;
        link.write(&out).await?;
        Ok(())
    }
}

#[async_trait]
impl MessageSource for MavlinkSource {
    async fn recv(&mut self) -> Result<Frame, SourceError> {
        loop {
            if let Some(item) = decode_next(&mut self.buf) {
                return item;
            }
            let link = self.link.as_mut().ok_or(SourceError::Closed)?;
            match link.read(&mut self.chunk).await {
                Ok(n) => self.buf.extend_from_slice(&self.chunk[..n]),
                Err(SourceError::Io(e)) => {
                    tokio::time::sleep(IO_ERROR_BACKOFF).await;
                    return Err(SourceError::Io(e));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_streams(&mut self, target: StreamTarget, rate_hz: u16) -> Result<(), SourceError> {
        info!(
            "mavlink: requesting all streams at {} Hz from {}/{}",
            rate_hz, target.system_id, target.component_id
        );
        let req = REQUEST_DATA_STREAM_DATA {
            req_message_rate: rate_hz,
            target_system: target.system_id,
            target_component: target.component_id,
            req_stream_id: MavDataStream::MAV_DATA_STREAM_ALL as u8,
            start_stop: 1,
        };
        self.send(&MavMessage::REQUEST_DATA_STREAM(req)).await
    }

    async fn close(&mut self) {
        if self.link.take().is_some() {
            self.buf.clear();
            info!("mavlink: closed {}", self.address);
        }
    }
}
