//! Liveness, identification, device control, and generic response
//! messages.

use nom::{error::Error, Parser};

use crate::error::ErrorCode;
use crate::protocol::messages::util::{parse_array, Padding};
use crate::protocol::parse::{expect_command, MessageParse};
use crate::protocol::serialize::{MessageSerialize, Serializer};
use crate::protocol::Command;

use super::MessageCommand;

/// Max size of the firmware version string, NUL-padded.
pub const VERSION_LEN: usize = 16;

/// Firmware version, ASCII, NUL-padded.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FirmwareVersion([u8; VERSION_LEN]);

impl FirmwareVersion {
    pub fn new(data: [u8; VERSION_LEN]) -> Self {
        Self(data)
    }

    /// Build from a string, truncating to fit.
    pub fn from_str_lossy(s: &str) -> Self {
        let mut data = [0; VERSION_LEN];
        let bytes = s.as_bytes();
        let n = bytes.len().min(VERSION_LEN - 1);
        data[..n].copy_from_slice(&bytes[..n]);
        Self(data)
    }

    pub fn as_str(&self) -> Result<&str, core::str::Utf8Error> {
        let len = self.0.iter().position(|b| *b == 0).unwrap_or(VERSION_LEN);
        core::str::from_utf8(&self.0[..len])
    }

    pub fn as_bytes(&self) -> &[u8; VERSION_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for FirmwareVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self.as_str() {
            Ok(s) => f.debug_tuple("FirmwareVersion").field(&s).finish(),
            Err(_) => f.debug_tuple("FirmwareVersion").field(&self.0).finish(),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FirmwareVersion {
    fn format(&self, f: defmt::Formatter) {
        match self.as_str() {
            Ok(s) => defmt::write!(f, "{}", s),
            Err(_) => defmt::write!(f, "{}", &self.0[..]),
        }
    }
}

macro_rules! empty_message {
    ($(#[$meta:meta])* $name:ident, $cmd:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name;

        impl MessageCommand for $name {
            const CMD: u8 = $cmd as u8;
        }

        impl MessageSerialize for $name {
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

        impl<'a> MessageParse<'a> for $name {
            fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
                move |input| {
                    let (input, _) = expect_command(cmd, Self::CMD, input)?;
                    Ok((input, Self))
                }
            }
        }
    };
}

empty_message!(
    /// 0x01 liveness probe.
    Ping,
    Command::Ping
);
empty_message!(
    /// 0x02 liveness answer.
    Pong,
    Command::Pong
);
empty_message!(
    /// 0x10 firmware version request.
    GetVersion,
    Command::GetVersion
);
empty_message!(
    /// 0x12 serial number request.
    GetSerial,
    Command::GetSerial
);
empty_message!(
    /// 0x14 capability discovery request.
    GetCapabilities,
    Command::GetCapabilities
);
empty_message!(
    /// 0x50 restart request.
    Restart,
    Command::Restart
);
empty_message!(
    /// 0x51 restart acknowledgement, sent before the device resets.
    RestartAck,
    Command::RestartAck
);

/// 0x11 firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Version {
    pub version: FirmwareVersion,
}

impl MessageCommand for Version {
    const CMD: u8 = Command::Version as u8;
}

impl MessageSerialize for Version {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_bytes(self.version.as_bytes())
    }
}

impl<'a> MessageParse<'a> for Version {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, data) = parse_array(nom::number::complete::u8)(input)?;
            Ok((
                input,
                Version {
                    version: FirmwareVersion::new(data),
                },
            ))
        }
    }
}

/// 0x13 serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Serial {
    pub serial: u32,
}

impl MessageCommand for Serial {
    const CMD: u8 = Command::Serial as u8;
}

impl MessageSerialize for Serial {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u32(self.serial)
    }
}

impl<'a> MessageParse<'a> for Serial {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, serial) = nom::number::complete::le_u32(input)?;
            Ok((input, Serial { serial }))
        }
    }
}

/// 0x15 capability report, a fixed 64-byte record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    pub hardware_flags: u32,
    pub software_flags: u32,
    pub power_outputs: u8,
    pub pwm_outputs: u8,
    pub hbridges: u8,
    pub digital_inputs: u8,
    pub analog_inputs: u8,
    pub frequency_inputs: u8,
    pub can_buses: u8,
    pub _pad: Padding<1>,
    pub max_channels: u16,
    pub max_virtuals: u16,
    pub config_flash_size: u32,
    pub config_ram_size: u32,
    pub total_current_limit_ma: u16,
    pub channel_current_limit_ma: u16,
    pub frames_received: u32,
    pub framing_errors: u32,
    pub crc_errors: u32,
    pub serial: u32,
    pub _reserved: Padding<16>,
}

/// Capability record wire size.
pub const CAPABILITIES_SIZE: usize = 64;

impl MessageCommand for Capabilities {
    const CMD: u8 = Command::Capabilities as u8;
}

impl MessageSerialize for Capabilities {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_le_u32(self.hardware_flags)?;
        ser.write_le_u32(self.software_flags)?;
        ser.write_u8(self.power_outputs)?;
        ser.write_u8(self.pwm_outputs)?;
        ser.write_u8(self.hbridges)?;
        ser.write_u8(self.digital_inputs)?;
        ser.write_u8(self.analog_inputs)?;
        ser.write_u8(self.frequency_inputs)?;
        ser.write_u8(self.can_buses)?;
        self._pad.serialize(ser)?;
        ser.write_le_u16(self.max_channels)?;
        ser.write_le_u16(self.max_virtuals)?;
        ser.write_le_u32(self.config_flash_size)?;
        ser.write_le_u32(self.config_ram_size)?;
        ser.write_le_u16(self.total_current_limit_ma)?;
        ser.write_le_u16(self.channel_current_limit_ma)?;
        ser.write_le_u32(self.frames_received)?;
        ser.write_le_u32(self.framing_errors)?;
        ser.write_le_u32(self.crc_errors)?;
        ser.write_le_u32(self.serial)?;
        self._reserved.serialize(ser)
    }
}

impl<'a> MessageParse<'a> for Capabilities {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, hardware_flags) = nom::number::complete::le_u32(input)?;
            let (input, software_flags) = nom::number::complete::le_u32(input)?;
            let (input, power_outputs) = nom::number::complete::u8(input)?;
            let (input, pwm_outputs) = nom::number::complete::u8(input)?;
            let (input, hbridges) = nom::number::complete::u8(input)?;
            let (input, digital_inputs) = nom::number::complete::u8(input)?;
            let (input, analog_inputs) = nom::number::complete::u8(input)?;
            let (input, frequency_inputs) = nom::number::complete::u8(input)?;
            let (input, can_buses) = nom::number::complete::u8(input)?;
            let (input, _pad) = Padding::parse(input)?;
            let (input, max_channels) = nom::number::complete::le_u16(input)?;
            let (input, max_virtuals) = nom::number::complete::le_u16(input)?;
            let (input, config_flash_size) = nom::number::complete::le_u32(input)?;
            let (input, config_ram_size) = nom::number::complete::le_u32(input)?;
            let (input, total_current_limit_ma) = nom::number::complete::le_u16(input)?;
            let (input, channel_current_limit_ma) = nom::number::complete::le_u16(input)?;
            let (input, frames_received) = nom::number::complete::le_u32(input)?;
            let (input, framing_errors) = nom::number::complete::le_u32(input)?;
            let (input, crc_errors) = nom::number::complete::le_u32(input)?;
            let (input, serial) = nom::number::complete::le_u32(input)?;
            let (input, _reserved) = Padding::parse(input)?;
            Ok((
                input,
                Capabilities {
                    hardware_flags,
                    software_flags,
                    power_outputs,
                    pwm_outputs,
                    hbridges,
                    digital_inputs,
                    analog_inputs,
                    frequency_inputs,
                    can_buses,
                    _pad,
                    max_channels,
                    max_virtuals,
                    config_flash_size,
                    config_ram_size,
                    total_current_limit_ma,
                    channel_current_limit_ma,
                    frames_received,
                    framing_errors,
                    crc_errors,
                    serial,
                    _reserved,
                },
            ))
        }
    }
}

/// Boot status bits carried by [BootComplete].
pub const BOOT_FLAG_DEGRADED: u8 = 0x01;

/// 0x52 sent unsolicited after a successful reinitialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootComplete {
    /// [BOOT_FLAG_DEGRADED] when the saved configuration was refused
    /// and the device started defaults-only.
    pub flags: u8,
}

impl MessageCommand for BootComplete {
    const CMD: u8 = Command::BootComplete as u8;
}

impl MessageSerialize for BootComplete {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_u8(self.flags)
    }
}

impl<'a> MessageParse<'a> for BootComplete {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, flags) = nom::number::complete::u8(input)?;
            Ok((input, BootComplete { flags }))
        }
    }
}

/// 0x70 generic acknowledgement, echoing the acknowledged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ack {
    pub cmd: u8,
}

impl MessageCommand for Ack {
    const CMD: u8 = Command::Ack as u8;
}

impl MessageSerialize for Ack {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_u8(self.cmd)
    }
}

impl<'a> MessageParse<'a> for Ack {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, acked) = nom::number::complete::u8(input)?;
            Ok((input, Ack { cmd: acked }))
        }
    }
}

/// 0x71 generic rejection: the refused command and a reason string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Nack<I> {
    pub cmd: u8,
    /// Human-readable reason, UTF-8.
    pub reason: I,
}

impl<I> MessageCommand for Nack<I> {
    const CMD: u8 = Command::Nack as u8;
}

impl<I> Nack<I> {
    pub fn map<F, J>(self, f: F) -> Nack<J>
    where
        F: FnOnce(I) -> J,
    {
        Nack {
            cmd: self.cmd,
            reason: f(self.reason),
        }
    }

    pub fn map_ref<'a, F, J>(&'a self, f: F) -> Nack<J>
    where
        F: FnOnce(&'a I) -> J,
    {
        Nack {
            cmd: self.cmd,
            reason: f(&self.reason),
        }
    }
}

impl<I> MessageSerialize for Nack<I>
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
        ser.write_u8(self.cmd)?;
        ser.write_bytes(self.reason.as_ref())
    }
}

impl<'a> MessageParse<'a> for Nack<&'a [u8]> {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, nacked) = nom::number::complete::u8(input)?;
            let (input, reason) = nom::combinator::rest(input)?;
            Ok((
                input,
                Nack {
                    cmd: nacked,
                    reason,
                },
            ))
        }
    }
}

/// 0x72 error report: a closed-set code and the offending command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorReply {
    pub code: ErrorCode,
    pub cmd: u8,
}

impl MessageCommand for ErrorReply {
    const CMD: u8 = Command::Error as u8;
}

impl MessageSerialize for ErrorReply {
    fn command(&self) -> u8 {
        Self::CMD
    }

    fn message_body<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_u8(self.code as u8)?;
        ser.write_u8(self.cmd)
    }
}

impl<'a> MessageParse<'a> for ErrorReply {
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>> {
        move |input| {
            let (input, _) = expect_command(cmd, Self::CMD, input)?;
            let (input, code) =
                nom::combinator::map_opt(nom::number::complete::u8, ErrorCode::from_u8)(input)?;
            let (input, offending) = nom::number::complete::u8(input)?;
            Ok((
                input,
                ErrorReply {
                    code,
                    cmd: offending,
                },
            ))
        }
    }
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use super::super::test::{reframe, roundtrip};
    use super::*;

    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    impl Arbitrary for FirmwareVersion {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut data = [0u8; VERSION_LEN];
            let len = usize::arbitrary(g) % VERSION_LEN;
            for b in data[..len].iter_mut() {
                *b = u8::arbitrary(g).max(1);
            }
            FirmwareVersion::new(data)
        }
    }

    impl Arbitrary for Capabilities {
        fn arbitrary(g: &mut Gen) -> Self {
            Self {
                hardware_flags: u32::arbitrary(g),
                software_flags: u32::arbitrary(g),
                power_outputs: u8::arbitrary(g),
                pwm_outputs: u8::arbitrary(g),
                hbridges: u8::arbitrary(g),
                digital_inputs: u8::arbitrary(g),
                analog_inputs: u8::arbitrary(g),
                frequency_inputs: u8::arbitrary(g),
                can_buses: u8::arbitrary(g),
                _pad: Padding::arbitrary(g),
                max_channels: u16::arbitrary(g),
                max_virtuals: u16::arbitrary(g),
                config_flash_size: u32::arbitrary(g),
                config_ram_size: u32::arbitrary(g),
                total_current_limit_ma: u16::arbitrary(g),
                channel_current_limit_ma: u16::arbitrary(g),
                frames_received: u32::arbitrary(g),
                framing_errors: u32::arbitrary(g),
                crc_errors: u32::arbitrary(g),
                serial: u32::arbitrary(g),
                _reserved: Padding::arbitrary(g),
            }
        }
    }

    #[test]
    fn empty_messages_roundtrip() {
        assert!(roundtrip(Ping));
        assert!(roundtrip(Pong));
        assert!(roundtrip(GetVersion));
        assert!(roundtrip(GetSerial));
        assert!(roundtrip(GetCapabilities));
        assert!(roundtrip(Restart));
        assert!(roundtrip(RestartAck));
    }

    #[quickcheck]
    fn roundtrip_version(msg: Version) -> bool {
        roundtrip(msg)
    }

    impl Arbitrary for Version {
        fn arbitrary(g: &mut Gen) -> Self {
            Self {
                version: FirmwareVersion::arbitrary(g),
            }
        }
    }

    #[quickcheck]
    fn roundtrip_serial(serial: u32) -> bool {
        roundtrip(Serial { serial })
    }

    #[quickcheck]
    fn roundtrip_capabilities(msg: Capabilities) -> bool {
        roundtrip(msg)
    }

    #[test]
    fn capabilities_wire_size_is_frozen() {
        use crate::protocol::serialize::{infallible, SerializerLength};
        let mut len = SerializerLength::new();
        let msg = Capabilities::arbitrary(&mut Gen::new(8));
        infallible(msg.message_body(&mut len));
        assert_eq!(len.len(), CAPABILITIES_SIZE);
    }

    #[quickcheck]
    fn roundtrip_boot_complete(flags: u8) -> bool {
        roundtrip(BootComplete { flags })
    }

    #[quickcheck]
    fn roundtrip_ack(cmd: u8) -> bool {
        roundtrip(Ack { cmd })
    }

    #[quickcheck]
    fn roundtrip_error_reply(cmd: u8) -> bool {
        roundtrip(ErrorReply {
            code: ErrorCode::CrcMismatch,
            cmd,
        })
    }

    #[test]
    fn roundtrip_nack() {
        let msg = Nack {
            cmd: 0x20,
            reason: b"channel 300: bounds inverted".as_ref(),
        };
        let (cmd, payload) = reframe(&msg).unwrap();
        let back = Nack::parse_payload(cmd, &payload).unwrap();
        assert_eq!(back.cmd, msg.cmd);
        assert_eq!(back.reason, msg.reason);
    }
}
