//! Telemetry control and data messages.

use nom::{error::Error, Parser};

use crate::protocol::parse::{expect_command, MessageParse};
use crate::protocol::serialize::{MessageSerialize, Serializer};
use crate::protocol::telemetry::{TelemetryFlags, TelemetryPacket};
use crate::protocol::Command;

use super::MessageCommand;

/// 0x40 subscribe to the telemetry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySubscribe {
    /// Requested sections.
    pub flags: TelemetryFlags,
    /// Requested period. The device may round to its pass cadence.
    pub rate_ms: u16,
}

impl MessageCommand for TelemetrySubscribe {
    const CMD: u8 = Command::TelemetrySubscribe as u8;
}

impl MessageSerialize for TelemetrySubscribe {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u16(self.flags.bits())?;
        ser.write_le_u16(self.rate_ms)
    }
}

impl<'a> MessageParse<'a> for TelemetrySubscribe {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, flags) = nom::number::complete::le_u16(input)?;
            let (input, rate_ms) = nom::number::complete::le_u16(input)?;
            Ok((
                input,
                TelemetrySubscribe {
                    flags: TelemetryFlags::from_bits_truncate(flags),
                    rate_ms,
                },
            ))
        }
    }
}

/// 0x41 stop the telemetry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryUnsubscribe;

impl MessageCommand for TelemetryUnsubscribe {
    const CMD: u8 = Command::TelemetryUnsubscribe as u8;
}

impl MessageSerialize for TelemetryUnsubscribe {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, _ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        Ok(())
    }
}

impl<'a> MessageParse<'a> for TelemetryUnsubscribe {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            Ok((input, Self))
        }
    }
}

/// 0x42 one unsolicited telemetry packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryData {
    pub packet: TelemetryPacket,
}

impl MessageCommand for TelemetryData {
    const CMD: u8 = Command::TelemetryData as u8;
}

impl MessageSerialize for TelemetryData {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        self.packet.serialize(ser)
    }
}

impl<'a> MessageParse<'a> for TelemetryData {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, packet) = TelemetryPacket::parse_nom(input)?;
            Ok((input, TelemetryData { packet }))
        }
    }
}
