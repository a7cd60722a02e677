//! The telemetry packet: a fixed header plus optional sections keyed
//! by a flag bitmap, in the fixed order of the flag bits.

use crate::channel::{NUM_ANALOG_INPUTS, NUM_HBRIDGES, NUM_POWER_OUTPUTS};
use crate::protocol::messages::util::Padding;
use crate::protocol::serialize::Serializer;

/// Most virtual channel entries one packet can carry.
pub const TELEM_VIRTUAL_MAX: usize = 32;

/// Header wire size, flags included.
pub const TELEM_HEADER_SIZE: usize = 20;

bitflags::bitflags! {
    /// Section presence bits in the packet header.
    pub struct TelemetryFlags: u16 {
        const ADC = 0x0001;
        const OUTPUTS = 0x0002;
        const HBRIDGE = 0x0004;
        const DIN = 0x0008;
        const VIRTUALS = 0x0010;
        const FAULTS = 0x0020;
        const CURRENTS = 0x0040;
        const EXTENDED = 0x0080;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TelemetryFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "TelemetryFlags({=u16:#x})", self.bits())
    }
}

/// Always-present packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryHeader {
    pub counter: u32,
    pub timestamp_ms: u32,
    pub input_mv: u16,
    /// 0.1 degC steps.
    pub mcu_temp: i16,
    /// 0.1 degC steps.
    pub board_temp: i16,
    pub total_current_ma: u32,
}

/// Per-H-bridge status in the HBRIDGE section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HBridgeStatus {
    pub position: i16,
    pub current_ma: u16,
}

/// FAULTS section body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Faults {
    pub status: u8,
    pub fault_flags: u8,
    pub _reserved: Padding<2>,
}

/// One virtual channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VirtualEntry {
    pub id: u16,
    pub value: i32,
}

/// VIRTUALS section: a counted list, capped at [TELEM_VIRTUAL_MAX].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Virtuals {
    count: u16,
    entries: [VirtualEntry; TELEM_VIRTUAL_MAX],
}

impl Virtuals {
    pub fn new() -> Self {
        Self {
            count: 0,
            entries: [VirtualEntry::default(); TELEM_VIRTUAL_MAX],
        }
    }

    /// Append an entry. Returns false once the packet cap is reached.
    pub fn push(&mut self, id: u16, value: i32) -> bool {
        if (self.count as usize) >= TELEM_VIRTUAL_MAX {
            return false;
        }
        self.entries[self.count as usize] = VirtualEntry { id, value };
        self.count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn entries(&self) -> &[VirtualEntry] {
        &self.entries[..self.count as usize]
    }
}

impl Default for Virtuals {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a packet failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    /// The packet is shorter than its flags imply.
    Truncated,
}

/// A complete telemetry packet. Section presence mirrors the flag
/// bits; [TelemetryPacket::flags] derives the bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryPacket {
    pub header: TelemetryHeader,
    pub adc: Option<[u16; NUM_ANALOG_INPUTS]>,
    pub outputs: Option<[u8; NUM_POWER_OUTPUTS]>,
    pub hbridge: Option<[HBridgeStatus; NUM_HBRIDGES]>,
    /// Digital input bitmask.
    pub din: Option<u32>,
    pub virtuals: Option<Virtuals>,
    pub faults: Option<Faults>,
    pub currents: Option<[u16; NUM_POWER_OUTPUTS]>,
    /// Reserved flag with no section body.
    pub extended: bool,
}

impl TelemetryPacket {
    pub fn flags(&self) -> TelemetryFlags {
        let mut flags = TelemetryFlags::empty();
        flags.set(TelemetryFlags::ADC, self.adc.is_some());
        flags.set(TelemetryFlags::OUTPUTS, self.outputs.is_some());
        flags.set(TelemetryFlags::HBRIDGE, self.hbridge.is_some());
        flags.set(TelemetryFlags::DIN, self.din.is_some());
        flags.set(TelemetryFlags::VIRTUALS, self.virtuals.is_some());
        flags.set(TelemetryFlags::FAULTS, self.faults.is_some());
        flags.set(TelemetryFlags::CURRENTS, self.currents.is_some());
        flags.set(TelemetryFlags::EXTENDED, self.extended);
        flags
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u32(self.header.counter)?;
        ser.write_le_u32(self.header.timestamp_ms)?;
        ser.write_le_u16(self.header.input_mv)?;
        ser.write_le_i16(self.header.mcu_temp)?;
        ser.write_le_i16(self.header.board_temp)?;
        ser.write_le_u32(self.header.total_current_ma)?;
        ser.write_le_u16(self.flags().bits())?;

        if let Some(adc) = &self.adc {
            for v in adc.iter() {
                ser.write_le_u16(*v)?;
            }
        }
        if let Some(outputs) = &self.outputs {
            ser.write_bytes(outputs)?;
        }
        if let Some(hbridge) = &self.hbridge {
            for hb in hbridge.iter() {
                ser.write_le_i16(hb.position)?;
                ser.write_le_u16(hb.current_ma)?;
            }
        }
        if let Some(din) = self.din {
            ser.write_le_u32(din)?;
        }
        if let Some(virtuals) = &self.virtuals {
            ser.write_le_u16(virtuals.count)?;
            for entry in virtuals.entries() {
                ser.write_le_u16(entry.id)?;
                ser.write_le_i32(entry.value)?;
            }
        }
        if let Some(faults) = &self.faults {
            ser.write_u8(faults.status)?;
            ser.write_u8(faults.fault_flags)?;
            faults._reserved.serialize(ser)?;
        }
        if let Some(currents) = &self.currents {
            for v in currents.iter() {
                ser.write_le_u16(*v)?;
            }
        }
        Ok(())
    }

    /// nom-style parser, for embedding in message parsing.
    pub fn parse_nom(input: &[u8]) -> nom::IResult<&[u8], Self> {
        use crate::protocol::messages::util::parse_array;
        use nom::number::complete::{le_i16, le_i32, le_u16, le_u32, u8 as le_u8};

        let (input, counter) = le_u32(input)?;
        let (input, timestamp_ms) = le_u32(input)?;
        let (input, input_mv) = le_u16(input)?;
        let (input, mcu_temp) = le_i16(input)?;
        let (input, board_temp) = le_i16(input)?;
        let (input, total_current_ma) = le_u32(input)?;
        let (input, flags) = le_u16(input)?;
        let flags = TelemetryFlags::from_bits_truncate(flags);

        let header = TelemetryHeader {
            counter,
            timestamp_ms,
            input_mv,
            mcu_temp,
            board_temp,
            total_current_ma,
        };

        let (input, adc) = if flags.contains(TelemetryFlags::ADC) {
            let (input, v) = parse_array(le_u16)(input)?;
            (input, Some(v))
        } else {
            (input, None)
        };

        let (input, outputs) = if flags.contains(TelemetryFlags::OUTPUTS) {
            let (input, v) = parse_array(le_u8)(input)?;
            (input, Some(v))
        } else {
            (input, None)
        };

        let (input, hbridge) = if flags.contains(TelemetryFlags::HBRIDGE) {
            let mut items = [HBridgeStatus::default(); NUM_HBRIDGES];
            let mut rest = input;
            for item in items.iter_mut() {
                let (r, position) = le_i16(rest)?;
                let (r, current_ma) = le_u16(r)?;
                *item = HBridgeStatus {
                    position,
                    current_ma,
                };
                rest = r;
            }
            (rest, Some(items))
        } else {
            (input, None)
        };

        let (input, din) = if flags.contains(TelemetryFlags::DIN) {
            let (input, v) = le_u32(input)?;
            (input, Some(v))
        } else {
            (input, None)
        };

        let (input, virtuals) = if flags.contains(TelemetryFlags::VIRTUALS) {
            let (mut rest, count) = le_u16(input)?;
            // a hostile count clamps to the packet cap
            let take = (count as usize).min(TELEM_VIRTUAL_MAX);
            let mut v = Virtuals::new();
            for _ in 0..take {
                let (r, id) = le_u16(rest)?;
                let (r, value) = le_i32(r)?;
                v.push(id, value);
                rest = r;
            }
            (rest, Some(v))
        } else {
            (input, None)
        };

        let (input, faults) = if flags.contains(TelemetryFlags::FAULTS) {
            let (input, status) = le_u8(input)?;
            let (input, fault_flags) = le_u8(input)?;
            let (input, _reserved) = Padding::parse(input)?;
            (
                input,
                Some(Faults {
                    status,
                    fault_flags,
                    _reserved,
                }),
            )
        } else {
            (input, None)
        };

        let (input, currents) = if flags.contains(TelemetryFlags::CURRENTS) {
            let (input, v) = parse_array(le_u16)(input)?;
            (input, Some(v))
        } else {
            (input, None)
        };

        Ok((
            input,
            Self {
                header,
                adc,
                outputs,
                hbridge,
                din,
                virtuals,
                faults,
                currents,
                extended: flags.contains(TelemetryFlags::EXTENDED),
            },
        ))
    }

    /// Parse a complete packet. Shorter-than-implied input reports
    /// [TelemetryError::Truncated].
    pub fn parse(input: &[u8]) -> Result<Self, TelemetryError> {
        match nom::combinator::all_consuming(Self::parse_nom)(input) {
            Ok((_, packet)) => Ok(packet),
            Err(_) => Err(TelemetryError::Truncated),
        }
    }
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use super::*;
    use crate::protocol::serialize::{infallible, SerializerVec};

    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    fn bytes_of(packet: &TelemetryPacket) -> alloc::vec::Vec<u8> {
        let mut ser = SerializerVec::new();
        infallible(packet.serialize(&mut ser));
        ser.done()
    }

    impl Arbitrary for TelemetryHeader {
        fn arbitrary(g: &mut Gen) -> Self {
            Self {
                counter: u32::arbitrary(g),
                timestamp_ms: u32::arbitrary(g),
                input_mv: u16::arbitrary(g),
                mcu_temp: i16::arbitrary(g),
                board_temp: i16::arbitrary(g),
                total_current_ma: u32::arbitrary(g),
            }
        }
    }

    impl Arbitrary for Virtuals {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut v = Virtuals::new();
            let n = usize::arbitrary(g) % (TELEM_VIRTUAL_MAX + 1);
            for _ in 0..n {
                v.push(u16::arbitrary(g), i32::arbitrary(g));
            }
            v
        }
    }

    impl Arbitrary for TelemetryPacket {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut adc = [0u16; NUM_ANALOG_INPUTS];
            for v in adc.iter_mut() {
                *v = u16::arbitrary(g);
            }
            let mut outputs = [0u8; NUM_POWER_OUTPUTS];
            for v in outputs.iter_mut() {
                *v = u8::arbitrary(g) & 1;
            }
            let mut currents = [0u16; NUM_POWER_OUTPUTS];
            for v in currents.iter_mut() {
                *v = u16::arbitrary(g);
            }
            let mut hbridge = [HBridgeStatus::default(); NUM_HBRIDGES];
            for v in hbridge.iter_mut() {
                *v = HBridgeStatus {
                    position: i16::arbitrary(g),
                    current_ma: u16::arbitrary(g),
                };
            }

            Self {
                header: TelemetryHeader::arbitrary(g),
                adc: bool::arbitrary(g).then_some(adc),
                outputs: bool::arbitrary(g).then_some(outputs),
                hbridge: bool::arbitrary(g).then_some(hbridge),
                din: bool::arbitrary(g).then_some(u32::arbitrary(g)),
                virtuals: bool::arbitrary(g).then(|| Virtuals::arbitrary(g)),
                faults: bool::arbitrary(g).then(|| Faults {
                    status: u8::arbitrary(g),
                    fault_flags: u8::arbitrary(g),
                    _reserved: Padding::new(),
                }),
                currents: bool::arbitrary(g).then_some(currents),
                extended: bool::arbitrary(g),
            }
        }
    }

    #[quickcheck]
    fn packet_roundtrip(packet: TelemetryPacket) -> bool {
        TelemetryPacket::parse(&bytes_of(&packet)) == Ok(packet)
    }

    #[test]
    fn header_only_packet() {
        let packet = TelemetryPacket {
            header: TelemetryHeader {
                counter: 7,
                timestamp_ms: 123_456,
                input_mv: 13_800,
                mcu_temp: 415,
                board_temp: 380,
                total_current_ma: 22_500,
            },
            ..Default::default()
        };

        let bytes = bytes_of(&packet);
        assert_eq!(bytes.len(), TELEM_HEADER_SIZE);
        assert_eq!(TelemetryPacket::parse(&bytes), Ok(packet));
    }

    #[test]
    fn truncated_packet_reported() {
        let packet = TelemetryPacket {
            adc: Some([0; NUM_ANALOG_INPUTS]),
            din: Some(0xdeadbeef),
            ..Default::default()
        };

        let bytes = bytes_of(&packet);
        for cut in [bytes.len() - 1, TELEM_HEADER_SIZE + 3, 5, 0] {
            assert_eq!(
                TelemetryPacket::parse(&bytes[..cut]),
                Err(TelemetryError::Truncated),
                "cut at {}",
                cut
            );
        }
    }

    #[test]
    fn hostile_virtual_count_clamped() {
        let mut v = Virtuals::new();
        v.push(300, -5);
        let packet = TelemetryPacket {
            virtuals: Some(v),
            ..Default::default()
        };

        let mut bytes = bytes_of(&packet);
        // claim an absurd count with a single entry present
        let at = TELEM_HEADER_SIZE;
        bytes[at..at + 2].copy_from_slice(&u16::MAX.to_le_bytes());
        // the claimed entries are not there, which must not panic
        assert_eq!(
            TelemetryPacket::parse(&bytes),
            Err(TelemetryError::Truncated)
        );

        // with exactly the cap present, a larger count still parses
        let mut v = Virtuals::new();
        for i in 0..TELEM_VIRTUAL_MAX {
            v.push(i as u16, i as i32);
        }
        let packet = TelemetryPacket {
            virtuals: Some(v),
            ..Default::default()
        };
        let mut bytes = bytes_of(&packet);
        bytes[at..at + 2].copy_from_slice(&u16::MAX.to_le_bytes());
        let parsed = TelemetryPacket::parse(&bytes).unwrap();
        assert_eq!(parsed.virtuals.unwrap().len(), TELEM_VIRTUAL_MAX);
    }

    #[test]
    fn section_order_is_flag_order() {
        let packet = TelemetryPacket {
            din: Some(0x0000_0800),
            faults: Some(Faults {
                status: 1,
                fault_flags: 0x42,
                _reserved: Padding::new(),
            }),
            ..Default::default()
        };

        let bytes = bytes_of(&packet);
        // header, then DIN (4 bytes), then FAULTS (4 bytes)
        assert_eq!(bytes.len(), TELEM_HEADER_SIZE + 8);
        assert_eq!(&bytes[TELEM_HEADER_SIZE..TELEM_HEADER_SIZE + 4], &[0x00, 0x08, 0x00, 0x00]);
        assert_eq!(bytes[TELEM_HEADER_SIZE + 4], 1);
        assert_eq!(bytes[TELEM_HEADER_SIZE + 5], 0x42);
    }
}
