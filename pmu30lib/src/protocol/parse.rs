use nom::error::Error;
use nom::Parser;

use super::framer::Frame;

/// Why a frame payload did not produce a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// The command byte is not one this message set handles.
    UnknownCommand,
    /// The payload did not match the command's layout.
    Malformed,
}

/// A trait for parseable messages.
///
/// The input is always one complete, CRC-verified frame payload; the
/// framer has already stripped sync, length, and CRC.
pub trait MessageParse<'a>: Sized {
    /// Parse the payload of a message, given the command byte.
    fn parse_body(cmd: u8) -> impl Parser<&'a [u8], Self, Error<&'a [u8]>>;

    /// Parse a complete payload. The whole payload must be consumed.
    fn parse_payload(cmd: u8, payload: &'a [u8]) -> Result<Self, MessageError> {
        let mut parser = nom::combinator::all_consuming(Self::parse_body(cmd));
        match parser.parse(payload) {
            Ok((_, msg)) => Ok(msg),
            Err(_) => {
                if super::Command::from_u8(cmd).is_none() {
                    Err(MessageError::UnknownCommand)
                } else {
                    Err(MessageError::Malformed)
                }
            }
        }
    }

    /// Parse a frame produced by the [Framer][super::Framer].
    fn parse_frame(frame: &Frame<'a>) -> Result<Self, MessageError> {
        Self::parse_payload(frame.cmd, frame.payload)
    }
}

/// Fail the surrounding parser unless the command matches.
///
/// Message `parse_body` impls call this first, so a mismatched command
/// falls through enum dispatch instead of mis-parsing.
pub fn expect_command(cmd: u8, expected: u8, input: &[u8]) -> nom::IResult<&[u8], ()> {
    if cmd != expected {
        nom::combinator::fail(input)
    } else {
        Ok((input, ()))
    }
}
