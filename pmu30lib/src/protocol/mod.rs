//! The host/device wire protocol: framing, commands, messages, and the
//! telemetry packet codec.

/// First frame sync byte.
pub const SYNC_H: u8 = 0xaa;

/// Second frame sync byte.
pub const SYNC_L: u8 = 0x55;

/// Largest payload carried by one frame.
///
/// The protocol requires at least 256; 512 leaves room for a telemetry
/// packet with every section present.
pub const MAX_PAYLOAD: usize = 0x200;

/// Largest size for an entire frame: sync, command, length, payload, CRC.
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD + 7;

/// Default baud rate for the service UART.
pub const BAUD_RATE: u32 = 115_200;

/// CRC-16-CCITT (poly 0x1021, init 0xffff), computed over command,
/// length, and payload. Sync bytes are excluded.
pub static FRAME_CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

pub mod framer;
pub use framer::{Frame, Framer, FramerStats};

pub mod parse;
pub use parse::MessageParse;

pub mod serialize;
pub use serialize::{MessageSerialize, Serializer};

pub mod messages;
pub use messages::{DeviceMessage, HostMessage, Message};

pub mod telemetry;

/// One-byte command identifiers, grouped by function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Ping = 0x01,
    Pong = 0x02,

    GetVersion = 0x10,
    Version = 0x11,
    GetSerial = 0x12,
    Serial = 0x13,
    GetCapabilities = 0x14,
    Capabilities = 0x15,

    ConfigChunk = 0x20,
    ConfigChunkAck = 0x21,
    ApplySavedConfig = 0x22,
    ReadConfig = 0x23,
    ConfigData = 0x24,
    SetChannelConfig = 0x25,
    SetChannelConfigReply = 0x26,

    GetChannelValue = 0x30,
    ChannelValue = 0x31,
    ForceChannel = 0x32,
    SetOutput = 0x33,
    SetPwm = 0x34,
    SetHBridge = 0x35,

    TelemetrySubscribe = 0x40,
    TelemetryUnsubscribe = 0x41,
    TelemetryData = 0x42,

    Restart = 0x50,
    RestartAck = 0x51,
    BootComplete = 0x52,

    Ack = 0x70,
    Nack = 0x71,
    Error = 0x72,
}

impl Command {
    pub fn from_u8(v: u8) -> Option<Self> {
        use Command::*;
        Some(match v {
            0x01 => Ping,
            0x02 => Pong,
            0x10 => GetVersion,
            0x11 => Version,
            0x12 => GetSerial,
            0x13 => Serial,
            0x14 => GetCapabilities,
            0x15 => Capabilities,
            0x20 => ConfigChunk,
            0x21 => ConfigChunkAck,
            0x22 => ApplySavedConfig,
            0x23 => ReadConfig,
            0x24 => ConfigData,
            0x25 => SetChannelConfig,
            0x26 => SetChannelConfigReply,
            0x30 => GetChannelValue,
            0x31 => ChannelValue,
            0x32 => ForceChannel,
            0x33 => SetOutput,
            0x34 => SetPwm,
            0x35 => SetHBridge,
            0x40 => TelemetrySubscribe,
            0x41 => TelemetryUnsubscribe,
            0x42 => TelemetryData,
            0x50 => Restart,
            0x51 => RestartAck,
            0x52 => BootComplete,
            0x70 => Ack,
            0x71 => Nack,
            0x72 => Error,
            _ => return None,
        })
    }
}
