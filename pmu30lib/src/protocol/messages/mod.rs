//! Typed commands carried in protocol frames.

use nom::{error::Error, Parser};

use crate::protocol::parse::MessageParse;
use crate::protocol::serialize::{MessageSerialize, Serializer};

pub mod config;
pub mod runtime;
pub mod system;
pub mod telemetry;
pub mod util;

/// A trait for messages with a statically-known command byte.
pub trait MessageCommand {
    const CMD: u8;
}

/// Any message, either a [HostMessage] or a [DeviceMessage].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message<I> {
    Host(HostMessage<I>),
    Device(DeviceMessage<I>),
}

impl<I> Message<I> {
    pub fn map<F, J>(self, f: F) -> Message<J>
    where
        F: FnOnce(I) -> J,
    {
        match self {
            Self::Host(m) => Message::Host(m.map(f)),
            Self::Device(m) => Message::Device(m.map(f)),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> Message<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        match self {
            Self::Host(m) => Message::Host(m.map_ref(f)),
            Self::Device(m) => Message::Device(m.map_ref(f)),
        }
    }

    #[cfg(feature = "alloc")]
    pub fn to_owned(&self) -> Message<alloc::vec::Vec<u8>>
    where
        I: AsRef<[u8]>,
    {
        self.map_ref(|d| d.as_ref().to_vec())
    }
}

impl<I> MessageSerialize for Message<I>
where
    I: AsRef<[u8]>,
{
    fn command(&self) -> u8 {
        match self {
            Self::Host(m) => m.command(),
            Self::Device(m) => m.command(),
        }
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Host(m) => m.message_body(ser),
            Self::Device(m) => m.message_body(ser),
        }
    }
}

impl<'a> MessageParse<'a> for Message<&'a [u8]> {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        nom::branch::alt((
            nom::combinator::map(HostMessage::parse_body(cmd), Message::Host),
            nom::combinator::map(DeviceMessage::parse_body(cmd), Message::Device),
        ))
    }
}

/// Messages sent from the host to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostMessage<I> {
    /// 0x01 liveness probe
    Ping(system::Ping),
    /// 0x10 firmware version request
    GetVersion(system::GetVersion),
    /// 0x12 serial number request
    GetSerial(system::GetSerial),
    /// 0x14 capability discovery
    GetCapabilities(system::GetCapabilities),
    /// 0x20 one chunk of a configuration blob upload
    ConfigChunk(config::ConfigChunk<I>),
    /// 0x22 apply the configuration saved in flash
    ApplySavedConfig(config::ApplySavedConfig),
    /// 0x23 stream back the active configuration
    ReadConfig(config::ReadConfig),
    /// 0x25 atomic single-channel replacement
    SetChannelConfig(config::SetChannelConfig<I>),
    /// 0x30 read one channel value
    GetChannelValue(runtime::GetChannelValue),
    /// 0x32 force a channel value
    ForceChannel(runtime::ForceChannel),
    /// 0x33 drive a power output directly
    SetOutput(runtime::SetOutput),
    /// 0x34 drive a PWM output directly
    SetPwm(runtime::SetPwm),
    /// 0x35 drive an H-bridge directly
    SetHBridge(runtime::SetHBridge),
    /// 0x40 telemetry subscription
    TelemetrySubscribe(telemetry::TelemetrySubscribe),
    /// 0x41 telemetry stop
    TelemetryUnsubscribe(telemetry::TelemetryUnsubscribe),
    /// 0x50 restart request
    Restart(system::Restart),
}

impl<I> HostMessage<I> {
    pub fn map<F, J>(self, f: F) -> HostMessage<J>
    where
        F: FnOnce(I) -> J,
    {
        match self {
            Self::Ping(m) => HostMessage::Ping(m),
            Self::GetVersion(m) => HostMessage::GetVersion(m),
            Self::GetSerial(m) => HostMessage::GetSerial(m),
            Self::GetCapabilities(m) => HostMessage::GetCapabilities(m),
            Self::ConfigChunk(m) => HostMessage::ConfigChunk(m.map(f)),
            Self::ApplySavedConfig(m) => HostMessage::ApplySavedConfig(m),
            Self::ReadConfig(m) => HostMessage::ReadConfig(m),
            Self::SetChannelConfig(m) => HostMessage::SetChannelConfig(m.map(f)),
            Self::GetChannelValue(m) => HostMessage::GetChannelValue(m),
            Self::ForceChannel(m) => HostMessage::ForceChannel(m),
            Self::SetOutput(m) => HostMessage::SetOutput(m),
            Self::SetPwm(m) => HostMessage::SetPwm(m),
            Self::SetHBridge(m) => HostMessage::SetHBridge(m),
            Self::TelemetrySubscribe(m) => HostMessage::TelemetrySubscribe(m),
            Self::TelemetryUnsubscribe(m) => HostMessage::TelemetryUnsubscribe(m),
            Self::Restart(m) => HostMessage::Restart(m),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> HostMessage<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        match self {
            Self::Ping(m) => HostMessage::Ping(m.clone()),
            Self::GetVersion(m) => HostMessage::GetVersion(m.clone()),
            Self::GetSerial(m) => HostMessage::GetSerial(m.clone()),
            Self::GetCapabilities(m) => HostMessage::GetCapabilities(m.clone()),
            Self::ConfigChunk(m) => HostMessage::ConfigChunk(m.map_ref(f)),
            Self::ApplySavedConfig(m) => HostMessage::ApplySavedConfig(m.clone()),
            Self::ReadConfig(m) => HostMessage::ReadConfig(m.clone()),
            Self::SetChannelConfig(m) => HostMessage::SetChannelConfig(m.map_ref(f)),
            Self::GetChannelValue(m) => HostMessage::GetChannelValue(m.clone()),
            Self::ForceChannel(m) => HostMessage::ForceChannel(m.clone()),
            Self::SetOutput(m) => HostMessage::SetOutput(m.clone()),
            Self::SetPwm(m) => HostMessage::SetPwm(m.clone()),
            Self::SetHBridge(m) => HostMessage::SetHBridge(m.clone()),
            Self::TelemetrySubscribe(m) => HostMessage::TelemetrySubscribe(m.clone()),
            Self::TelemetryUnsubscribe(m) => HostMessage::TelemetryUnsubscribe(m.clone()),
            Self::Restart(m) => HostMessage::Restart(m.clone()),
        }
    }

    #[cfg(feature = "alloc")]
    pub fn to_owned(&self) -> HostMessage<alloc::vec::Vec<u8>>
    where
        I: AsRef<[u8]>,
    {
        self.map_ref(|d| d.as_ref().to_vec())
    }
}

impl<I> MessageSerialize for HostMessage<I>
where
    I: AsRef<[u8]>,
{
    fn command(&self) -> u8 {
        match self {
            Self::Ping(m) => m.command(),
            Self::GetVersion(m) => m.command(),
            Self::GetSerial(m) => m.command(),
            Self::GetCapabilities(m) => m.command(),
            Self::ConfigChunk(m) => m.command(),
            Self::ApplySavedConfig(m) => m.command(),
            Self::ReadConfig(m) => m.command(),
            Self::SetChannelConfig(m) => m.command(),
            Self::GetChannelValue(m) => m.command(),
            Self::ForceChannel(m) => m.command(),
            Self::SetOutput(m) => m.command(),
            Self::SetPwm(m) => m.command(),
            Self::SetHBridge(m) => m.command(),
            Self::TelemetrySubscribe(m) => m.command(),
            Self::TelemetryUnsubscribe(m) => m.command(),
            Self::Restart(m) => m.command(),
        }
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Ping(m) => m.message_body(ser),
            Self::GetVersion(m) => m.message_body(ser),
            Self::GetSerial(m) => m.message_body(ser),
            Self::GetCapabilities(m) => m.message_body(ser),
            Self::ConfigChunk(m) => m.message_body(ser),
            Self::ApplySavedConfig(m) => m.message_body(ser),
            Self::ReadConfig(m) => m.message_body(ser),
            Self::SetChannelConfig(m) => m.message_body(ser),
            Self::GetChannelValue(m) => m.message_body(ser),
            Self::ForceChannel(m) => m.message_body(ser),
            Self::SetOutput(m) => m.message_body(ser),
            Self::SetPwm(m) => m.message_body(ser),
            Self::SetHBridge(m) => m.message_body(ser),
            Self::TelemetrySubscribe(m) => m.message_body(ser),
            Self::TelemetryUnsubscribe(m) => m.message_body(ser),
            Self::Restart(m) => m.message_body(ser),
        }
    }
}

impl<'a> MessageParse<'a> for HostMessage<&'a [u8]> {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| match cmd {
            system::Ping::CMD => system::Ping::parse_body(cmd).map(Self::Ping).parse(input),
            system::GetVersion::CMD => system::GetVersion::parse_body(cmd)
                .map(Self::GetVersion)
                .parse(input),
            system::GetSerial::CMD => system::GetSerial::parse_body(cmd)
                .map(Self::GetSerial)
                .parse(input),
            system::GetCapabilities::CMD => system::GetCapabilities::parse_body(cmd)
                .map(Self::GetCapabilities)
                .parse(input),
            config::ConfigChunk::<()>::CMD => config::ConfigChunk::parse_body(cmd)
                .map(Self::ConfigChunk)
                .parse(input),
            config::ApplySavedConfig::CMD => config::ApplySavedConfig::parse_body(cmd)
                .map(Self::ApplySavedConfig)
                .parse(input),
            config::ReadConfig::CMD => config::ReadConfig::parse_body(cmd)
                .map(Self::ReadConfig)
                .parse(input),
            config::SetChannelConfig::<()>::CMD => config::SetChannelConfig::parse_body(cmd)
                .map(Self::SetChannelConfig)
                .parse(input),
            runtime::GetChannelValue::CMD => runtime::GetChannelValue::parse_body(cmd)
                .map(Self::GetChannelValue)
                .parse(input),
            runtime::ForceChannel::CMD => runtime::ForceChannel::parse_body(cmd)
                .map(Self::ForceChannel)
                .parse(input),
            runtime::SetOutput::CMD => runtime::SetOutput::parse_body(cmd)
                .map(Self::SetOutput)
                .parse(input),
            runtime::SetPwm::CMD => runtime::SetPwm::parse_body(cmd)
                .map(Self::SetPwm)
                .parse(input),
            runtime::SetHBridge::CMD => runtime::SetHBridge::parse_body(cmd)
                .map(Self::SetHBridge)
                .parse(input),
            telemetry::TelemetrySubscribe::CMD => telemetry::TelemetrySubscribe::parse_body(cmd)
                .map(Self::TelemetrySubscribe)
                .parse(input),
            telemetry::TelemetryUnsubscribe::CMD => {
                telemetry::TelemetryUnsubscribe::parse_body(cmd)
                    .map(Self::TelemetryUnsubscribe)
                    .parse(input)
            }
            system::Restart::CMD => system::Restart::parse_body(cmd)
                .map(Self::Restart)
                .parse(input),

            // we don't recognize the command
            _ => nom::combinator::fail(input),
        }
    }
}

/// Messages sent from the device to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceMessage<I> {
    /// 0x02 liveness answer
    Pong(system::Pong),
    /// 0x11 firmware version
    Version(system::Version),
    /// 0x13 serial number
    Serial(system::Serial),
    /// 0x15 capability report
    Capabilities(system::Capabilities),
    /// 0x21 per-chunk upload acknowledgement
    ConfigChunkAck(config::ConfigChunkAck),
    /// 0x24 one chunk of the active configuration
    ConfigData(config::ConfigData<I>),
    /// 0x26 single-channel replacement outcome
    SetChannelConfigReply(config::SetChannelConfigReply<I>),
    /// 0x31 one channel value
    ChannelValue(runtime::ChannelValue),
    /// 0x42 unsolicited telemetry
    TelemetryData(telemetry::TelemetryData),
    /// 0x51 restart acknowledgement
    RestartAck(system::RestartAck),
    /// 0x52 unsolicited, after reinitialization
    BootComplete(system::BootComplete),
    /// 0x70 generic acknowledgement
    Ack(system::Ack),
    /// 0x71 generic rejection with reason text
    Nack(system::Nack<I>),
    /// 0x72 error report
    ErrorReply(system::ErrorReply),
}

impl<I> DeviceMessage<I> {
    pub fn map<F, J>(self, f: F) -> DeviceMessage<J>
    where
        F: FnOnce(I) -> J,
    {
        match self {
            Self::Pong(m) => DeviceMessage::Pong(m),
            Self::Version(m) => DeviceMessage::Version(m),
            Self::Serial(m) => DeviceMessage::Serial(m),
            Self::Capabilities(m) => DeviceMessage::Capabilities(m),
            Self::ConfigChunkAck(m) => DeviceMessage::ConfigChunkAck(m),
            Self::ConfigData(m) => DeviceMessage::ConfigData(m.map(f)),
            Self::SetChannelConfigReply(m) => DeviceMessage::SetChannelConfigReply(m.map(f)),
            Self::ChannelValue(m) => DeviceMessage::ChannelValue(m),
            Self::TelemetryData(m) => DeviceMessage::TelemetryData(m),
            Self::RestartAck(m) => DeviceMessage::RestartAck(m),
            Self::BootComplete(m) => DeviceMessage::BootComplete(m),
            Self::Ack(m) => DeviceMessage::Ack(m),
            Self::Nack(m) => DeviceMessage::Nack(m.map(f)),
            Self::ErrorReply(m) => DeviceMessage::ErrorReply(m),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> DeviceMessage<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        match self {
            Self::Pong(m) => DeviceMessage::Pong(m.clone()),
            Self::Version(m) => DeviceMessage::Version(m.clone()),
            Self::Serial(m) => DeviceMessage::Serial(m.clone()),
            Self::Capabilities(m) => DeviceMessage::Capabilities(m.clone()),
            Self::ConfigChunkAck(m) => DeviceMessage::ConfigChunkAck(m.clone()),
            Self::ConfigData(m) => DeviceMessage::ConfigData(m.map_ref(f)),
            Self::SetChannelConfigReply(m) => {
                DeviceMessage::SetChannelConfigReply(m.map_ref(f))
            }
            Self::ChannelValue(m) => DeviceMessage::ChannelValue(m.clone()),
            Self::TelemetryData(m) => DeviceMessage::TelemetryData(m.clone()),
            Self::RestartAck(m) => DeviceMessage::RestartAck(m.clone()),
            Self::BootComplete(m) => DeviceMessage::BootComplete(m.clone()),
            Self::Ack(m) => DeviceMessage::Ack(m.clone()),
            Self::Nack(m) => DeviceMessage::Nack(m.map_ref(f)),
            Self::ErrorReply(m) => DeviceMessage::ErrorReply(m.clone()),
        }
    }

    #[cfg(feature = "alloc")]
    pub fn to_owned(&self) -> DeviceMessage<alloc::vec::Vec<u8>>
    where
        I: AsRef<[u8]>,
    {
        self.map_ref(|d| d.as_ref().to_vec())
    }
}

impl<I> MessageSerialize for DeviceMessage<I>
where
    I: AsRef<[u8]>,
{
    fn command(&self) -> u8 {
        match self {
            Self::Pong(m) => m.command(),
            Self::Version(m) => m.command(),
            Self::Serial(m) => m.command(),
            Self::Capabilities(m) => m.command(),
            Self::ConfigChunkAck(m) => m.command(),
            Self::ConfigData(m) => m.command(),
            Self::SetChannelConfigReply(m) => m.command(),
            Self::ChannelValue(m) => m.command(),
            Self::TelemetryData(m) => m.command(),
            Self::RestartAck(m) => m.command(),
            Self::BootComplete(m) => m.command(),
            Self::Ack(m) => m.command(),
            Self::Nack(m) => m.command(),
            Self::ErrorReply(m) => m.command(),
        }
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Pong(m) => m.message_body(ser),
            Self::Version(m) => m.message_body(ser),
            Self::Serial(m) => m.message_body(ser),
            Self::Capabilities(m) => m.message_body(ser),
            Self::ConfigChunkAck(m) => m.message_body(ser),
            Self::ConfigData(m) => m.message_body(ser),
            Self::SetChannelConfigReply(m) => m.message_body(ser),
            Self::ChannelValue(m) => m.message_body(ser),
            Self::TelemetryData(m) => m.message_body(ser),
            Self::RestartAck(m) => m.message_body(ser),
            Self::BootComplete(m) => m.message_body(ser),
            Self::Ack(m) => m.message_body(ser),
            Self::Nack(m) => m.message_body(ser),
            Self::ErrorReply(m) => m.message_body(ser),
        }
    }
}

impl<'a> MessageParse<'a> for DeviceMessage<&'a [u8]> {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| match cmd {
            system::Pong::CMD => system::Pong::parse_body(cmd).map(Self::Pong).parse(input),
            system::Version::CMD => system::Version::parse_body(cmd)
                .map(Self::Version)
                .parse(input),
            system::Serial::CMD => system::Serial::parse_body(cmd)
                .map(Self::Serial)
                .parse(input),
            system::Capabilities::CMD => system::Capabilities::parse_body(cmd)
                .map(Self::Capabilities)
                .parse(input),
            config::ConfigChunkAck::CMD => config::ConfigChunkAck::parse_body(cmd)
                .map(Self::ConfigChunkAck)
                .parse(input),
            config::ConfigData::<()>::CMD => config::ConfigData::parse_body(cmd)
                .map(Self::ConfigData)
                .parse(input),
            config::SetChannelConfigReply::<()>::CMD => {
                config::SetChannelConfigReply::parse_body(cmd)
                    .map(Self::SetChannelConfigReply)
                    .parse(input)
            }
            runtime::ChannelValue::CMD => runtime::ChannelValue::parse_body(cmd)
                .map(Self::ChannelValue)
                .parse(input),
            telemetry::TelemetryData::CMD => telemetry::TelemetryData::parse_body(cmd)
                .map(Self::TelemetryData)
                .parse(input),
            system::RestartAck::CMD => system::RestartAck::parse_body(cmd)
                .map(Self::RestartAck)
                .parse(input),
            system::BootComplete::CMD => system::BootComplete::parse_body(cmd)
                .map(Self::BootComplete)
                .parse(input),
            system::Ack::CMD => system::Ack::parse_body(cmd).map(Self::Ack).parse(input),
            system::Nack::<()>::CMD => system::Nack::parse_body(cmd).map(Self::Nack).parse(input),
            system::ErrorReply::CMD => system::ErrorReply::parse_body(cmd)
                .map(Self::ErrorReply)
                .parse(input),

            // we don't recognize the command
            _ => nom::combinator::fail(input),
        }
    }
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use alloc::vec::Vec;

    use crate::protocol::framer::Framer;
    use crate::protocol::serialize::{infallible, SerializerVec};

    use super::*;

    /// Serialize a message into a frame and walk it back through the
    /// byte-wise framer, returning the recovered command and payload.
    pub(super) fn reframe<M>(msg: &M) -> Option<(u8, Vec<u8>)>
    where
        M: MessageSerialize,
    {
        let mut ser = SerializerVec::new();
        infallible(msg.frame(&mut ser));
        let bytes = ser.done();

        let mut framer = Framer::new();
        let mut parsed = None;
        for b in bytes {
            if let Some(frame) = framer.push_byte(b) {
                parsed = Some((frame.cmd, frame.payload.to_vec()));
            }
        }
        parsed
    }

    /// Round-trip for messages that own all their data.
    pub(super) fn roundtrip<M>(msg: M) -> bool
    where
        M: for<'a> MessageParse<'a> + MessageSerialize + PartialEq,
    {
        let Some((cmd, payload)) = reframe(&msg) else {
            return false;
        };
        match M::parse_payload(cmd, &payload) {
            Ok(back) => back == msg,
            Err(_) => false,
        }
    }
}
