//! The hardware boundary: read/write callbacks the environment
//! provides, and the flash image that persists the configuration.

use crate::channel::ChannelKind;
use crate::error::ErrorCode;
use crate::protocol::FRAME_CRC;

/// Hardware device classes addressed by `(device, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HwDevice {
    DigitalIn = 0x01,
    AnalogIn = 0x02,
    FrequencyIn = 0x03,
    CanRx = 0x04,
    PowerOut = 0x10,
    PwmOut = 0x11,
    HBridge = 0x12,
    CanTx = 0x13,
    System = 0x40,
}

impl HwDevice {
    pub fn from_u8(v: u8) -> Option<Self> {
        use HwDevice::*;
        Some(match v {
            0x01 => DigitalIn,
            0x02 => AnalogIn,
            0x03 => FrequencyIn,
            0x04 => CanRx,
            0x10 => PowerOut,
            0x11 => PwmOut,
            0x12 => HBridge,
            0x13 => CanTx,
            0x40 => System,
            _ => return None,
        })
    }

    /// The device class serving a hardware-bound channel kind.
    pub fn for_kind(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::DigitalIn => Self::DigitalIn,
            ChannelKind::AnalogIn => Self::AnalogIn,
            ChannelKind::FrequencyIn => Self::FrequencyIn,
            ChannelKind::CanIn => Self::CanRx,
            ChannelKind::PowerOut => Self::PowerOut,
            ChannelKind::PwmOut => Self::PwmOut,
            ChannelKind::HBridge => Self::HBridge,
            ChannelKind::CanOut => Self::CanTx,
            _ => Self::System,
        }
    }
}

/// System channel indices for `read_input(HwDevice::System, ..)`.
pub mod system_index {
    pub const BATTERY_MV: u8 = 0;
    pub const TOTAL_CURRENT_MA: u8 = 1;
    pub const MCU_TEMP: u8 = 2;
    pub const BOARD_TEMP1: u8 = 3;
    pub const BOARD_TEMP2: u8 = 4;
    pub const STATUS: u8 = 5;
}

/// Sampled input access and output actuation, provided by the
/// peripheral layer. Must be safe to call from the executor's thread.
pub trait Hardware {
    fn read_input(&mut self, device: HwDevice, index: u8) -> i32;
    fn write_output(&mut self, device: HwDevice, index: u8, value: i32);
}

/// Flash access errors, reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    OutOfBounds,
    WriteFailed,
}

/// Single-sector configuration storage, provided by the flash driver.
pub trait Flash {
    fn capacity(&self) -> usize;
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError>;
    fn erase(&mut self) -> Result<(), FlashError>;
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError>;
}

/// Flash image magic, "PMUC".
pub const FLASH_IMAGE_MAGIC: u32 = 0x504d5543;

/// Flash image header size: magic, u16 payload size, u16 CRC-16.
pub const FLASH_IMAGE_HEADER: usize = 8;

/// Wrap a configuration blob in the flash image layout.
pub fn encode_image(blob: &[u8], out: &mut [u8]) -> Result<usize, ErrorCode> {
    let total = FLASH_IMAGE_HEADER + blob.len();
    if out.len() < total || blob.len() > u16::MAX as usize {
        return Err(ErrorCode::BufferTooSmall);
    }

    out[0..4].copy_from_slice(&FLASH_IMAGE_MAGIC.to_le_bytes());
    out[4..6].copy_from_slice(&(blob.len() as u16).to_le_bytes());
    out[6..8].copy_from_slice(&FRAME_CRC.checksum(blob).to_le_bytes());
    out[8..total].copy_from_slice(blob);
    Ok(total)
}

/// Unwrap and verify a flash image, returning the blob inside.
pub fn decode_image(image: &[u8]) -> Result<&[u8], ErrorCode> {
    if image.len() < FLASH_IMAGE_HEADER {
        return Err(ErrorCode::InvalidLength);
    }

    let magic = u32::from_le_bytes([image[0], image[1], image[2], image[3]]);
    if magic != FLASH_IMAGE_MAGIC {
        return Err(ErrorCode::VersionMismatch);
    }

    let size = u16::from_le_bytes([image[4], image[5]]) as usize;
    if image.len() < FLASH_IMAGE_HEADER + size {
        return Err(ErrorCode::InvalidLength);
    }

    let blob = &image[FLASH_IMAGE_HEADER..FLASH_IMAGE_HEADER + size];
    let crc = u16::from_le_bytes([image[6], image[7]]);
    if FRAME_CRC.checksum(blob) != crc {
        return Err(ErrorCode::CrcMismatch);
    }

    Ok(blob)
}

/// RAM-backed flash, for the simulator and tests.
#[cfg(feature = "alloc")]
pub struct MemFlash {
    data: alloc::vec::Vec<u8>,
}

#[cfg(feature = "alloc")]
impl MemFlash {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: alloc::vec![0xff; capacity],
        }
    }

    pub fn from_data(data: alloc::vec::Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(feature = "alloc")]
impl Flash for MemFlash {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let offset = offset as usize;
        if offset + buf.len() > self.data.len() {
            return Err(FlashError::OutOfBounds);
        }
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), FlashError> {
        self.data.fill(0xff);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        let offset = offset as usize;
        if offset + data.len() > self.data.len() {
            return Err(FlashError::OutOfBounds);
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}
