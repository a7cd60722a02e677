//! The packed configuration blob: file header plus a run of channel
//! entries, CRC-32 protected.

use crate::channel::{ChannelFlags, ChannelId, ChannelKind};
use crate::config::ChannelConfig;
use crate::error::ErrorCode;
use crate::protocol::messages::util::{parse_name, Padding};
use crate::protocol::serialize::{Serializer, SerializerSlice};
use crate::{ChannelName, NAME_LEN};

/// Blob magic, "CFG3".
pub const CONFIG_MAGIC: u32 = 0x43464733;

/// Current blob format version.
pub const CONFIG_VERSION: u16 = 2;

/// File header wire size.
pub const BLOB_HEADER_SIZE: usize = 32;

/// Channel entry header wire size.
pub const ENTRY_HEADER_SIZE: usize = 14;

/// CRC-32 (IEEE 802.3) over every byte following the file header.
pub const BLOB_CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

bitflags::bitflags! {
    /// Blob file flags.
    pub struct BlobFlags: u16 {
        const COMPRESSED = 0x0001;
        const ENCRYPTED = 0x0002;
        /// The blob holds a subset of entries, applied as an overlay.
        const PARTIAL = 0x0004;
        /// The device generated this blob from built-in defaults.
        const DEFAULTS_ONLY = 0x0008;
    }
}

impl Default for BlobFlags {
    fn default() -> Self {
        BlobFlags::empty()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BlobFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "BlobFlags({=u16:#x})", self.bits())
    }
}

/// An error from the blob codec, with the entry it concerns.
///
/// `id` is zero for file-level errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlobError {
    pub code: ErrorCode,
    pub id: ChannelId,
}

impl BlobError {
    fn file(code: ErrorCode) -> Self {
        Self { code, id: 0 }
    }
}

impl core::fmt::Display for BlobError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if self.id == 0 {
            write!(f, "{}", self.code)
        } else {
            write!(f, "channel {}: {}", self.id, self.code)
        }
    }
}

/// Blob file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlobHeader {
    pub magic: u32,
    pub version: u16,
    pub device_type: u16,
    /// Whole blob size, header included.
    pub total_size: u32,
    /// CRC-32 of all bytes following the header.
    pub crc32: u32,
    pub channel_count: u16,
    pub flags: BlobFlags,
    pub timestamp: u32,
    pub _reserved: Padding<8>,
}

impl BlobHeader {
    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, magic) = nom::number::complete::le_u32(input)?;
        let (input, version) = nom::number::complete::le_u16(input)?;
        let (input, device_type) = nom::number::complete::le_u16(input)?;
        let (input, total_size) = nom::number::complete::le_u32(input)?;
        let (input, crc32) = nom::number::complete::le_u32(input)?;
        let (input, channel_count) = nom::number::complete::le_u16(input)?;
        let (input, flags) = nom::number::complete::le_u16(input)?;
        let flags = BlobFlags::from_bits_truncate(flags);
        let (input, timestamp) = nom::number::complete::le_u32(input)?;
        let (input, _reserved) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                magic,
                version,
                device_type,
                total_size,
                crc32,
                channel_count,
                flags,
                timestamp,
                _reserved,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u32(self.magic)?;
        ser.write_le_u16(self.version)?;
        ser.write_le_u16(self.device_type)?;
        ser.write_le_u32(self.total_size)?;
        ser.write_le_u32(self.crc32)?;
        ser.write_le_u16(self.channel_count)?;
        ser.write_le_u16(self.flags.bits())?;
        ser.write_le_u32(self.timestamp)?;
        self._reserved.serialize(ser)
    }
}

/// Channel entry header.
///
/// The on-wire header also carries the name length and config size;
/// those are derived from the entry body and not stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EntryHeader {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub flags: ChannelFlags,
    pub hw_device: u8,
    pub hw_index: u8,
    pub source_id: ChannelId,
    pub default_value: i32,
}

/// One complete channel entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelEntry {
    pub header: EntryHeader,
    pub name: ChannelName,
    pub config: ChannelConfig,
}

impl ChannelEntry {
    /// On-wire size of this entry.
    pub fn wire_size(&self) -> usize {
        ENTRY_HEADER_SIZE + self.name.len() + self.config.wire_size()
    }

    /// Parse one entry, returning it and the remaining input.
    ///
    /// Errors carry the precise [ErrorCode] so a failed load can be
    /// reported to the host.
    pub fn parse(input: &[u8]) -> Result<(Self, &[u8]), ErrorCode> {
        if input.len() < ENTRY_HEADER_SIZE {
            return Err(ErrorCode::InvalidLength);
        }

        let id = u16::from_le_bytes([input[0], input[1]]);
        let kind = ChannelKind::from_u8(input[2]).ok_or(ErrorCode::InvalidConfigKind)?;
        let flags = ChannelFlags::from_bits_truncate(input[3]);
        let hw_device = input[4];
        let hw_index = input[5];
        let source_id = u16::from_le_bytes([input[6], input[7]]);
        let default_value = i32::from_le_bytes([input[8], input[9], input[10], input[11]]);
        let name_len = input[12] as usize;
        let config_size = input[13] as usize;

        if name_len >= NAME_LEN {
            return Err(ErrorCode::NameTooLong);
        }
        if config_size != ChannelConfig::wire_size_of(kind) {
            return Err(ErrorCode::ConfigSizeMismatch);
        }

        let rest = &input[ENTRY_HEADER_SIZE..];
        if rest.len() < name_len + config_size {
            return Err(ErrorCode::InvalidLength);
        }

        let (rest, name) = parse_name(name_len as u8)(rest).map_err(|_| ErrorCode::NameTooLong)?;
        let (config_bytes, rest) = rest.split_at(config_size);
        let config = match nom::combinator::all_consuming(|i| ChannelConfig::parse(kind, i))(
            config_bytes,
        ) {
            Ok((_, config)) => config,
            Err(_) => return Err(ErrorCode::ConfigSizeMismatch),
        };

        Ok((
            Self {
                header: EntryHeader {
                    id,
                    kind,
                    flags,
                    hw_device,
                    hw_index,
                    source_id,
                    default_value,
                },
                name,
                config,
            },
            rest,
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.header.id)?;
        ser.write_u8(self.header.kind as u8)?;
        ser.write_u8(self.header.flags.bits())?;
        ser.write_u8(self.header.hw_device)?;
        ser.write_u8(self.header.hw_index)?;
        ser.write_le_u16(self.header.source_id)?;
        ser.write_le_i32(self.header.default_value)?;
        ser.write_u8(self.name.len() as u8)?;
        ser.write_u8(self.config.wire_size() as u8)?;
        ser.write_bytes(self.name.as_bytes())?;
        self.config.serialize(ser)
    }
}

/// A verified view over a configuration blob.
///
/// Construction checks magic, version, total size, and CRC before any
/// entry is touched.
#[derive(Debug)]
pub struct BlobReader<'a> {
    header: BlobHeader,
    entries: &'a [u8],
    remaining: u16,
}

impl<'a> BlobReader<'a> {
    pub fn new(blob: &'a [u8]) -> Result<Self, BlobError> {
        let (entries, header) = match BlobHeader::parse(blob) {
            Ok(v) => v,
            Err(_) => return Err(BlobError::file(ErrorCode::InvalidLength)),
        };

        if header.magic != CONFIG_MAGIC {
            return Err(BlobError::file(ErrorCode::VersionMismatch));
        }
        if header.version != CONFIG_VERSION {
            return Err(BlobError::file(ErrorCode::VersionMismatch));
        }
        if header.total_size as usize != blob.len() {
            return Err(BlobError::file(ErrorCode::InvalidLength));
        }
        if BLOB_CRC.checksum(entries) != header.crc32 {
            return Err(BlobError::file(ErrorCode::CrcMismatch));
        }

        Ok(Self {
            header,
            entries,
            remaining: header.channel_count,
        })
    }

    pub fn header(&self) -> &BlobHeader {
        &self.header
    }
}

impl<'a> Iterator for BlobReader<'a> {
    type Item = Result<ChannelEntry, BlobError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            // declared entries must precisely fill the blob
            if !self.entries.is_empty() {
                self.entries = &[];
                return Some(Err(BlobError::file(ErrorCode::InvalidLength)));
            }
            return None;
        }

        self.remaining -= 1;
        match ChannelEntry::parse(self.entries) {
            Ok((entry, rest)) => {
                self.entries = rest;
                Some(Ok(entry))
            }
            Err(code) => {
                // id may not be recoverable from a torn entry
                let id = if self.entries.len() >= 2 {
                    u16::from_le_bytes([self.entries[0], self.entries[1]])
                } else {
                    0
                };
                self.remaining = 0;
                self.entries = &[];
                Some(Err(BlobError { code, id }))
            }
        }
    }
}

/// Assemble a blob from entries into `out`. Returns the blob length.
pub fn build_blob(
    entries: &[ChannelEntry],
    device_type: u16,
    flags: BlobFlags,
    timestamp: u32,
    out: &mut [u8],
) -> Result<usize, ErrorCode> {
    if out.len() < BLOB_HEADER_SIZE {
        return Err(ErrorCode::BufferTooSmall);
    }

    let (head, body) = out.split_at_mut(BLOB_HEADER_SIZE);

    let mut ser = SerializerSlice::new(body);
    for entry in entries.iter() {
        entry
            .serialize(&mut ser)
            .map_err(|_| ErrorCode::BufferTooSmall)?;
    }
    let body_len = ser.len();

    let header = BlobHeader {
        magic: CONFIG_MAGIC,
        version: CONFIG_VERSION,
        device_type,
        total_size: (BLOB_HEADER_SIZE + body_len) as u32,
        crc32: BLOB_CRC.checksum(&body[..body_len]),
        channel_count: entries.len() as u16,
        flags,
        timestamp,
        _reserved: Padding::new(),
    };

    let mut ser = SerializerSlice::new(head);
    header
        .serialize(&mut ser)
        .map_err(|_| ErrorCode::BufferTooSmall)?;

    Ok(BLOB_HEADER_SIZE + body_len)
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use super::*;
    use crate::config::records::*;

    fn entry(id: ChannelId, name: &str, config: ChannelConfig) -> ChannelEntry {
        ChannelEntry {
            header: EntryHeader {
                id,
                kind: config.kind(),
                flags: ChannelFlags::ENABLED,
                hw_device: 0,
                hw_index: 0,
                source_id: crate::channel::CH_REF_NONE,
                default_value: 0,
            },
            name: ChannelName::new_from_str(name).unwrap(),
            config,
        }
    }

    fn sample_entries() -> alloc::vec::Vec<ChannelEntry> {
        alloc::vec![
            entry(
                10,
                "coolant",
                ChannelConfig::AnalogIn(AnalogInConfig::default()),
            ),
            entry(
                300,
                "fan demand",
                ChannelConfig::Hysteresis(HysteresisConfig {
                    input_id: 10,
                    kind: HysteresisKind::Schmitt,
                    invert: 0,
                    threshold_high: 85,
                    threshold_low: 75,
                }),
            ),
            entry(101, "fan", ChannelConfig::PowerOut(PowerOutConfig::default())),
        ]
    }

    #[test]
    fn empty_blob_roundtrip() {
        let mut buf = [0u8; 64];
        let len = build_blob(&[], crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf).unwrap();
        assert_eq!(len, BLOB_HEADER_SIZE);

        let reader = BlobReader::new(&buf[..len]).unwrap();
        assert_eq!(reader.header().magic, CONFIG_MAGIC);
        assert_eq!(reader.header().version, CONFIG_VERSION);
        assert_eq!(reader.header().total_size, 32);
        assert_eq!(reader.header().crc32, 0);
        assert_eq!(reader.header().channel_count, 0);
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn blob_roundtrip() {
        let entries = sample_entries();
        let mut buf = [0u8; 1024];
        let len = build_blob(
            &entries,
            crate::DEVICE_TYPE,
            BlobFlags::empty(),
            1_700_000_000,
            &mut buf,
        )
        .unwrap();

        let reader = BlobReader::new(&buf[..len]).unwrap();
        assert_eq!(reader.header().channel_count, 3);

        let parsed: Result<alloc::vec::Vec<_>, _> = reader.collect();
        assert_eq!(parsed.unwrap(), entries);
    }

    #[test]
    fn corrupt_payload_byte_rejected() {
        let entries = sample_entries();
        let mut buf = [0u8; 1024];
        let len = build_blob(&entries, crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf).unwrap();

        buf[BLOB_HEADER_SIZE + 4] ^= 0x01;
        let err = BlobReader::new(&buf[..len]).unwrap_err();
        assert_eq!(err.code, ErrorCode::CrcMismatch);
    }

    #[test]
    fn truncated_blob_rejected() {
        let entries = sample_entries();
        let mut buf = [0u8; 1024];
        let len = build_blob(&entries, crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf).unwrap();

        let err = BlobReader::new(&buf[..len - 1]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidLength);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut buf = [0u8; 64];
        let len = build_blob(&[], crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf).unwrap();
        buf[0] = 0x00;
        let err = BlobReader::new(&buf[..len]).unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionMismatch);
    }

    #[test]
    fn count_entry_mismatch_rejected() {
        // a blob claiming one more entry than it carries
        let entries = sample_entries();
        let mut buf = [0u8; 1024];
        let len = build_blob(&entries, crate::DEVICE_TYPE, BlobFlags::empty(), 0, &mut buf).unwrap();

        // bump channel_count and fix up the crc (count is inside the
        // header, which the crc does not cover)
        buf[16] += 1;
        let reader = BlobReader::new(&buf[..len]).unwrap();
        let parsed: Result<alloc::vec::Vec<_>, _> = reader.collect();
        assert!(parsed.is_err());
    }

    #[test]
    fn entry_size_mismatch_rejected() {
        let mut ser = crate::protocol::serialize::SerializerVec::new();
        let e = entry(205, "t", ChannelConfig::Timer(TimerConfig::default()));
        crate::protocol::serialize::infallible(e.serialize(&mut ser));
        let mut bytes = ser.done();

        // lie about the config size
        bytes[13] += 1;
        bytes.push(0);
        assert_eq!(
            ChannelEntry::parse(&bytes).unwrap_err(),
            ErrorCode::ConfigSizeMismatch
        );
    }
}
