//! General parsing utilities shared by messages and the configuration
//! codec.

use crate::protocol::serialize::Serializer;
use crate::ChannelName;

/// Parse a statically-sized array with a parser.
pub fn parse_array<'a, P, A, const LEN: usize>(
    parser: P,
) -> impl FnMut(&'a [u8]) -> nom::IResult<&'a [u8], [A; LEN]>
where
    P: Fn(&'a [u8]) -> nom::IResult<&'a [u8], A>,
    A: Default + Copy,
{
    move |input| {
        let mut data = [A::default(); LEN];
        let (input, _) = nom::multi::fill(&parser, &mut data[..])(input)?;
        Ok((input, data))
    }
}

/// Parse a [ChannelName] of the given on-wire length.
pub fn parse_name(len: u8) -> impl FnMut(&[u8]) -> nom::IResult<&[u8], ChannelName> {
    move |input| {
        let (input, bytes) = nom::bytes::complete::take(len as usize)(input)?;
        match ChannelName::new_from_bytes(bytes) {
            Ok(name) => Ok((input, name)),
            Err(_) => nom::combinator::fail(input),
        }
    }
}

/// Padding, in a struct.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Padding<const LEN: usize>([u8; LEN]);

impl<const LEN: usize> Padding<LEN> {
    pub fn new() -> Self {
        Self::new_data([0; LEN])
    }

    pub fn new_data(data: [u8; LEN]) -> Self {
        Self(data)
    }

    pub fn data(&self) -> &[u8; LEN] {
        &self.0
    }

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, data) = parse_array(nom::number::complete::u8)(input)?;
        Ok((input, Self::new_data(data)))
    }

    pub fn serialize<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        ser.write_bytes(&self.0)
    }
}

impl<const LEN: usize> Default for Padding<LEN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LEN: usize> core::fmt::Debug for Padding<LEN> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        if self.0.iter().all(|b| *b == 0) {
            f.debug_tuple("Padding").finish()
        } else {
            f.debug_tuple("Padding").field(&self.0).finish()
        }
    }
}

#[cfg(feature = "defmt")]
impl<const LEN: usize> defmt::Format for Padding<LEN> {
    fn format(&self, f: defmt::Formatter) {
        if self.0.iter().all(|b| *b == 0) {
            defmt::write!(f, "Padding");
        } else {
            defmt::write!(f, "Padding({})", self.0);
        }
    }
}
