//! Host-side client over a byte transport.

use std::collections::VecDeque;

use crate::protocol::framer::Framer;
use crate::protocol::parse::{MessageError, MessageParse};
use crate::protocol::serialize::SerializerWrap;
use crate::protocol::{DeviceMessage, HostMessage, MessageSerialize, MAX_PAYLOAD};

/// Client failures.
#[derive(Debug)]
pub enum ClientError {
    Io(std::io::Error),
    /// The transport closed before a full frame arrived.
    UnexpectedEof,
    /// A frame arrived but its payload did not parse.
    Parse(MessageError),
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {}", e),
            Self::UnexpectedEof => write!(f, "unexpected end of stream"),
            Self::Parse(MessageError::UnknownCommand) => write!(f, "unknown command"),
            Self::Parse(MessageError::Malformed) => write!(f, "malformed payload"),
        }
    }
}

impl std::error::Error for ClientError {}

pub type ClientResult<T> = Result<T, ClientError>;

/// A client for the PMU-30 serial protocol.
///
/// Reads are framed by the byte-wise parser; leftover transport bytes
/// stay buffered for the next read.
pub struct Client<F> {
    port: F,
    framer: Framer,
    pending: VecDeque<u8>,
    frame_cmd: u8,
    frame_len: usize,
    frame_buf: [u8; MAX_PAYLOAD],
}

impl<F> Client<F> {
    pub fn new(port: F) -> Self {
        Self {
            port,
            framer: Framer::new(),
            pending: VecDeque::new(),
            frame_cmd: 0,
            frame_len: 0,
            frame_buf: [0; MAX_PAYLOAD],
        }
    }

    pub fn port(&self) -> &F {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut F {
        &mut self.port
    }

    pub fn into_port(self) -> F {
        self.port
    }

    /// Write a message to the port as one frame.
    pub fn write<M>(&mut self, msg: &M) -> std::io::Result<()>
    where
        F: std::io::Write,
        M: MessageSerialize,
    {
        let mut ser = SerializerWrap::new(&mut self.port);
        msg.frame(&mut ser)?;
        self.port.flush()
    }

    /// Block until one whole frame arrives, then parse it.
    pub fn read<'a, M>(&'a mut self) -> ClientResult<M>
    where
        F: std::io::Read,
        M: MessageParse<'a>,
    {
        loop {
            while let Some(b) = self.pending.pop_front() {
                if let Some(frame) = self.framer.push_byte(b) {
                    self.frame_cmd = frame.cmd;
                    self.frame_len = frame.payload.len();
                    let payload = &frame.payload[..self.frame_len];
                    self.frame_buf[..self.frame_len].copy_from_slice(payload);

                    return M::parse_payload(self.frame_cmd, &self.frame_buf[..self.frame_len])
                        .map_err(ClientError::Parse);
                }
            }

            let mut chunk = [0u8; 256];
            let n = self.port.read(&mut chunk)?;
            if n == 0 {
                return Err(ClientError::UnexpectedEof);
            }
            self.pending.extend(&chunk[..n]);
        }
    }

    /// Read a device-to-host message.
    pub fn read_device(&mut self) -> ClientResult<DeviceMessage<&[u8]>>
    where
        F: std::io::Read,
    {
        self.read()
    }

    /// Read a host-to-device message.
    pub fn read_host(&mut self) -> ClientResult<HostMessage<&[u8]>>
    where
        F: std::io::Read,
    {
        self.read()
    }
}
