//! Runtime value access messages.

use nom::{error::Error, Parser};

use crate::protocol::messages::util::Padding;
use crate::protocol::parse::{expect_command, MessageParse};
use crate::protocol::serialize::{MessageSerialize, Serializer};
use crate::protocol::Command;

use super::MessageCommand;

/// 0x30 read one channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetChannelValue {
    pub id: u16,
}

impl MessageCommand for GetChannelValue {
    const CMD: u8 = Command::GetChannelValue as u8;
}

impl MessageSerialize for GetChannelValue {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u16(self.id)
    }
}

impl<'a> MessageParse<'a> for GetChannelValue {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, id) = nom::number::complete::le_u16(input)?;
            Ok((input, GetChannelValue { id }))
        }
    }
}

/// 0x31 one channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelValue {
    pub id: u16,
    pub value: i32,
}

impl MessageCommand for ChannelValue {
    const CMD: u8 = Command::ChannelValue as u8;
}

impl MessageSerialize for ChannelValue {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u16(self.id)?;
        ser.write_le_i32(self.value)
    }
}

impl<'a> MessageParse<'a> for ChannelValue {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, id) = nom::number::complete::le_u16(input)?;
            let (input, value) = nom::number::complete::le_i32(input)?;
            Ok((input, ChannelValue { id, value }))
        }
    }
}

/// 0x32 force a channel value from outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ForceChannel {
    pub id: u16,
    pub value: i32,
}

impl MessageCommand for ForceChannel {
    const CMD: u8 = Command::ForceChannel as u8;
}

impl MessageSerialize for ForceChannel {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u16(self.id)?;
        ser.write_le_i32(self.value)
    }
}

impl<'a> MessageParse<'a> for ForceChannel {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, id) = nom::number::complete::le_u16(input)?;
            let (input, value) = nom::number::complete::le_i32(input)?;
            Ok((input, ForceChannel { id, value }))
        }
    }
}

/// 0x33 drive a power output by hardware index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetOutput {
    pub index: u8,
    pub on: u8,
}

impl MessageCommand for SetOutput {
    const CMD: u8 = Command::SetOutput as u8;
}

impl MessageSerialize for SetOutput {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_u8(self.index)?;
        ser.write_u8(self.on)
    }
}

impl<'a> MessageParse<'a> for SetOutput {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, index) = nom::number::complete::u8(input)?;
            let (input, on) = nom::number::complete::u8(input)?;
            Ok((input, SetOutput { index, on }))
        }
    }
}

/// 0x34 drive a PWM output by hardware index. Duty in 10000ths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetPwm {
    pub index: u8,
    pub _pad: Padding<1>,
    pub duty: u16,
}

impl MessageCommand for SetPwm {
    const CMD: u8 = Command::SetPwm as u8;
}

impl MessageSerialize for SetPwm {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_u8(self.index)?;
        self._pad.serialize(ser)?;
        ser.write_le_u16(self.duty)
    }
}

impl<'a> MessageParse<'a> for SetPwm {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, index) = nom::number::complete::u8(input)?;
            let (input, _pad) = Padding::parse(input)?;
            let (input, duty) = nom::number::complete::le_u16(input)?;
            Ok((input, SetPwm { index, _pad, duty }))
        }
    }
}

/// 0x35 drive an H-bridge by hardware index.
///
/// Positive forward, negative reverse, zero coast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetHBridge {
    pub index: u8,
    pub _pad: Padding<1>,
    pub value: i16,
}

impl MessageCommand for SetHBridge {
    const CMD: u8 = Command::SetHBridge as u8;
}

impl MessageSerialize for SetHBridge {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_u8(self.index)?;
        self._pad.serialize(ser)?;
        ser.write_le_i16(self.value)
    }
}

impl<'a> MessageParse<'a> for SetHBridge {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, index) = nom::number::complete::u8(input)?;
            let (input, _pad) = Padding::parse(input)?;
            let (input, value) = nom::number::complete::le_i16(input)?;
            Ok((input, SetHBridge { index, _pad, value }))
        }
    }
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use super::super::test::roundtrip;
    use super::*;

    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn roundtrip_get_channel_value(id: u16) -> bool {
        roundtrip(GetChannelValue { id })
    }

    #[quickcheck]
    fn roundtrip_channel_value(id: u16, value: i32) -> bool {
        roundtrip(ChannelValue { id, value })
    }

    #[quickcheck]
    fn roundtrip_force_channel(id: u16, value: i32) -> bool {
        roundtrip(ForceChannel { id, value })
    }

    #[quickcheck]
    fn roundtrip_set_output(index: u8, on: bool) -> bool {
        roundtrip(SetOutput {
            index,
            on: on as u8,
        })
    }

    #[quickcheck]
    fn roundtrip_set_pwm(index: u8, duty: u16) -> bool {
        roundtrip(SetPwm {
            index,
            _pad: Padding::arbitrary(&mut Gen::new(4)),
            duty,
        })
    }

    #[quickcheck]
    fn roundtrip_set_h_bridge(index: u8, value: i16) -> bool {
        roundtrip(SetHBridge {
            index,
            _pad: Padding::new(),
            value,
        })
    }
}
