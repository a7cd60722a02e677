//! Configuration transfer messages.

use nom::{error::Error, Parser};

use crate::error::ErrorCode;
use crate::protocol::parse::{expect_command, MessageParse};
use crate::protocol::serialize::{MessageSerialize, Serializer};
use crate::protocol::Command;

use super::MessageCommand;

/// 0x20 one chunk of a configuration blob upload.
///
/// Chunk zero starts a fresh upload; chunks must arrive in sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigChunk<I> {
    pub seq: u16,
    pub data: I,
}

impl<I> MessageCommand for ConfigChunk<I> {
    const CMD: u8 = Command::ConfigChunk as u8;
}

impl<I> ConfigChunk<I> {
    pub fn map<F, J>(self, f: F) -> ConfigChunk<J>
    where
        F: FnOnce(I) -> J,
    {
        ConfigChunk {
            seq: self.seq,
            data: f(self.data),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> ConfigChunk<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        ConfigChunk {
            seq: self.seq,
            data: f(&self.data),
        }
    }
}

impl<I> MessageSerialize for ConfigChunk<I>
where
    I: AsRef<[u8]>,
{
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u16(self.seq)?;
        ser.write_bytes(self.data.as_ref())
    }
}

impl<'a> MessageParse<'a> for ConfigChunk<&'a [u8]> {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, seq) = nom::number::complete::le_u16(input)?;
            let (input, data) = nom::combinator::rest(input)?;
            Ok((input, ConfigChunk { seq, data }))
        }
    }
}

/// 0x21 per-chunk acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigChunkAck {
    pub seq: u16,
    /// [ErrorCode::None] when the chunk was accepted.
    pub code: ErrorCode,
}

impl MessageCommand for ConfigChunkAck {
    const CMD: u8 = Command::ConfigChunkAck as u8;
}

impl MessageSerialize for ConfigChunkAck {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u16(self.seq)?;
        ser.write_u8(self.code as u8)
    }
}

impl<'a> MessageParse<'a> for ConfigChunkAck {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, seq) = nom::number::complete::le_u16(input)?;
            let (input, code) =
                nom::combinator::map_opt(nom::number::complete::u8, ErrorCode::from_u8)(input)?;
            Ok((input, ConfigChunkAck { seq, code }))
        }
    }
}

/// 0x22 apply the configuration saved in flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ApplySavedConfig;

impl MessageCommand for ApplySavedConfig {
    const CMD: u8 = Command::ApplySavedConfig as u8;
}

impl MessageSerialize for ApplySavedConfig {
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

impl<'a> MessageParse<'a> for ApplySavedConfig {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            Ok((input, Self))
        }
    }
}

/// 0x23 stream back the active configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadConfig;

impl MessageCommand for ReadConfig {
    const CMD: u8 = Command::ReadConfig as u8;
}

impl MessageSerialize for ReadConfig {
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

impl<'a> MessageParse<'a> for ReadConfig {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            Ok((input, Self))
        }
    }
}

/// 0x24 one chunk of the active configuration, device to host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigData<I> {
    pub seq: u16,
    /// Total number of chunks in this read.
    pub total: u16,
    pub data: I,
}

impl<I> MessageCommand for ConfigData<I> {
    const CMD: u8 = Command::ConfigData as u8;
}

impl<I> ConfigData<I> {
    pub fn map<F, J>(self, f: F) -> ConfigData<J>
    where
        F: FnOnce(I) -> J,
    {
        ConfigData {
            seq: self.seq,
            total: self.total,
            data: f(self.data),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> ConfigData<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        ConfigData {
            seq: self.seq,
            total: self.total,
            data: f(&self.data),
        }
    }
}

impl<I> MessageSerialize for ConfigData<I>
where
    I: AsRef<[u8]>,
{
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u16(self.seq)?;
        ser.write_le_u16(self.total)?;
        ser.write_bytes(self.data.as_ref())
    }
}

impl<'a> MessageParse<'a> for ConfigData<&'a [u8]> {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, seq) = nom::number::complete::le_u16(input)?;
            let (input, total) = nom::number::complete::le_u16(input)?;
            let (input, data) = nom::combinator::rest(input)?;
            Ok((input, ConfigData { seq, total, data }))
        }
    }
}

/// 0x25 atomic single-channel replacement, carrying one channel entry
/// in the blob entry format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetChannelConfig<I> {
    pub entry: I,
}

impl<I> MessageCommand for SetChannelConfig<I> {
    const CMD: u8 = Command::SetChannelConfig as u8;
}

impl<I> SetChannelConfig<I> {
    pub fn map<F, J>(self, f: F) -> SetChannelConfig<J>
    where
        F: FnOnce(I) -> J,
    {
        SetChannelConfig {
            entry: f(self.entry),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> SetChannelConfig<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        SetChannelConfig {
            entry: f(&self.entry),
        }
    }
}

impl<I> MessageSerialize for SetChannelConfig<I>
where
    I: AsRef<[u8]>,
{
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_bytes(self.entry.as_ref())
    }
}

impl<'a> MessageParse<'a> for SetChannelConfig<&'a [u8]> {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, entry) = nom::combinator::rest(input)?;
            Ok((input, SetChannelConfig { entry }))
        }
    }
}

/// 0x26 outcome of a single-channel replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetChannelConfigReply<I> {
    pub id: u16,
    pub ok: u8,
    /// [ErrorCode::None] on success.
    pub code: ErrorCode,
    /// Human-readable detail, UTF-8, possibly empty.
    pub message: I,
}

impl<I> MessageCommand for SetChannelConfigReply<I> {
    const CMD: u8 = Command::SetChannelConfigReply as u8;
}

impl<I> SetChannelConfigReply<I> {
    pub fn map<F, J>(self, f: F) -> SetChannelConfigReply<J>
    where
        F: FnOnce(I) -> J,
    {
        SetChannelConfigReply {
            id: self.id,
            ok: self.ok,
            code: self.code,
            message: f(self.message),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> SetChannelConfigReply<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        SetChannelConfigReply {
            id: self.id,
            ok: self.ok,
            code: self.code,
            message: f(&self.message),
        }
    }
}

impl<I> MessageSerialize for SetChannelConfigReply<I>
where
    I: AsRef<[u8]>,
{
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u16(self.id)?;
        ser.write_u8(self.ok)?;
        ser.write_u8(self.code as u8)?;
        ser.write_bytes(self.message.as_ref())
    }
}

impl<'a> MessageParse<'a> for SetChannelConfigReply<&'a [u8]> {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, id) = nom::number::complete::le_u16(input)?;
            let (input, ok) = nom::number::complete::u8(input)?;
            let (input, code) =
                nom::combinator::map_opt(nom::number::complete::u8, ErrorCode::from_u8)(input)?;
            let (input, message) = nom::combinator::rest(input)?;
            Ok((
                input,
                SetChannelConfigReply {
                    id,
                    ok,
                    code,
                    message,
                },
            ))
        }
    }
}
