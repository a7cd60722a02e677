//! Channel identity, classification, and the runtime row stored in the
//! registry.

use crate::ChannelName;

/// Channel identifier. `0` is invalid, [CH_REF_NONE] means "no channel".
pub type ChannelId = u16;

/// Sentinel for config fields that accept an optional channel reference.
pub const CH_REF_NONE: ChannelId = 0xffff;

/// Physical input channels.
pub const INPUT_ID_MIN: ChannelId = 1;
pub const INPUT_ID_MAX: ChannelId = 99;
/// Physical output channels.
pub const OUTPUT_ID_MIN: ChannelId = 100;
pub const OUTPUT_ID_MAX: ChannelId = 199;
/// Computed (virtual) channels.
pub const VIRTUAL_ID_MIN: ChannelId = 200;
pub const VIRTUAL_ID_MAX: ChannelId = 999;
/// System read-only channels, maintained by the hardware layer.
pub const SYSTEM_ID_MIN: ChannelId = 1000;
pub const SYSTEM_ID_MAX: ChannelId = 1023;

/// One past the largest valid channel id.
pub const ID_SPACE: usize = SYSTEM_ID_MAX as usize + 1;

// System channel ids.
pub const SYS_BATTERY_MV: ChannelId = 1000;
pub const SYS_TOTAL_CURRENT_MA: ChannelId = 1001;
pub const SYS_MCU_TEMP: ChannelId = 1002;
pub const SYS_BOARD_TEMP1: ChannelId = 1003;
pub const SYS_BOARD_TEMP2: ChannelId = 1004;
pub const SYS_UPTIME_S: ChannelId = 1005;
pub const SYS_STATUS: ChannelId = 1006;
pub const SYS_CONST_ZERO: ChannelId = 1007;
pub const SYS_CONST_ONE: ChannelId = 1008;

// Board population, PMU-30.
pub const NUM_POWER_OUTPUTS: usize = 30;
pub const NUM_HBRIDGES: usize = 2;
pub const NUM_DIGITAL_INPUTS: usize = 12;
pub const NUM_ANALOG_INPUTS: usize = 16;
pub const NUM_FREQUENCY_INPUTS: usize = 4;
pub const NUM_CAN_BUSES: usize = 2;

pub const fn is_input_id(id: ChannelId) -> bool {
    id >= INPUT_ID_MIN && id <= INPUT_ID_MAX
}

pub const fn is_output_id(id: ChannelId) -> bool {
    id >= OUTPUT_ID_MIN && id <= OUTPUT_ID_MAX
}

pub const fn is_virtual_id(id: ChannelId) -> bool {
    id >= VIRTUAL_ID_MIN && id <= VIRTUAL_ID_MAX
}

pub const fn is_system_id(id: ChannelId) -> bool {
    id >= SYSTEM_ID_MIN && id <= SYSTEM_ID_MAX
}

/// Any id a channel may be registered under.
pub const fn is_valid_id(id: ChannelId) -> bool {
    id != 0 && (id as usize) < ID_SPACE
}

/// Any id a config field may reference, including the none sentinel.
pub const fn is_valid_ref(id: ChannelId) -> bool {
    id == CH_REF_NONE || is_valid_id(id)
}

/// Closed set of channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChannelKind {
    DigitalIn = 0x01,
    AnalogIn = 0x02,
    FrequencyIn = 0x03,
    CanIn = 0x04,

    PowerOut = 0x10,
    PwmOut = 0x11,
    HBridge = 0x12,
    CanOut = 0x13,

    Timer = 0x20,
    Logic = 0x21,
    Math = 0x22,
    Table2d = 0x23,
    Table3d = 0x24,
    Filter = 0x25,
    Pid = 0x26,
    Number = 0x27,
    Switch = 0x28,
    Counter = 0x29,
    FlipFlop = 0x2a,
    Hysteresis = 0x2b,

    System = 0x40,
}

impl ChannelKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        use ChannelKind::*;
        Some(match v {
            0x01 => DigitalIn,
            0x02 => AnalogIn,
            0x03 => FrequencyIn,
            0x04 => CanIn,
            0x10 => PowerOut,
            0x11 => PwmOut,
            0x12 => HBridge,
            0x13 => CanOut,
            0x20 => Timer,
            0x21 => Logic,
            0x22 => Math,
            0x23 => Table2d,
            0x24 => Table3d,
            0x25 => Filter,
            0x26 => Pid,
            0x27 => Number,
            0x28 => Switch,
            0x29 => Counter,
            0x2a => FlipFlop,
            0x2b => Hysteresis,
            0x40 => System,
            _ => return None,
        })
    }

    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Self::DigitalIn | Self::AnalogIn | Self::FrequencyIn | Self::CanIn
        )
    }

    pub fn is_output(&self) -> bool {
        matches!(
            self,
            Self::PowerOut | Self::PwmOut | Self::HBridge | Self::CanOut
        )
    }

    pub fn is_computed(&self) -> bool {
        !self.is_input() && !self.is_output() && *self != Self::System
    }

    /// Display descriptor for values of this kind.
    pub fn display(&self) -> DisplayInfo {
        use ChannelKind::*;
        match self {
            DigitalIn | Logic | FlipFlop | Hysteresis | Timer => DisplayInfo::flag(),
            AnalogIn => DisplayInfo::new("mV", 0, 0, 65_000),
            FrequencyIn => DisplayInfo::new("Hz", 0, 0, 100_000),
            PowerOut => DisplayInfo::flag(),
            PwmOut => DisplayInfo::new("%", 2, 0, 10_000),
            HBridge => DisplayInfo::new("%", 2, -10_000, 10_000),
            _ => DisplayInfo::new("", 0, i32::MIN, i32::MAX),
        }
    }
}

/// How a channel value is meant to be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayInfo {
    pub unit: &'static str,
    pub decimals: u8,
    pub min: i32,
    pub max: i32,
}

impl DisplayInfo {
    pub const fn new(unit: &'static str, decimals: u8, min: i32, max: i32) -> Self {
        Self {
            unit,
            decimals,
            min,
            max,
        }
    }

    const fn flag() -> Self {
        Self::new("", 0, 0, 1)
    }
}

bitflags::bitflags! {
    /// Per-channel runtime flags.
    pub struct ChannelFlags: u8 {
        const ENABLED = 0x01;
        const INVERTED = 0x02;
        const BUILTIN = 0x04;
        const READ_ONLY = 0x08;
        const HIDDEN = 0x10;
        const FAULT = 0x20;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ChannelFlags({=u8:#x})", self.bits())
    }
}

impl Default for ChannelFlags {
    fn default() -> Self {
        ChannelFlags::ENABLED
    }
}

/// The runtime row for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub flags: ChannelFlags,
    /// Hardware device class this channel is bound to, 0 if none.
    pub hw_device: u8,
    /// Index within the hardware device class.
    pub hw_index: u8,
    /// Channel feeding this one, for output kinds. [CH_REF_NONE] if unused.
    pub source_id: ChannelId,
    pub default_value: i32,
    pub name: ChannelName,
    pub value: i32,
    pub prev_value: i32,
}

impl Channel {
    pub fn new(id: ChannelId, kind: ChannelKind) -> Self {
        Self {
            id,
            kind,
            flags: ChannelFlags::default(),
            hw_device: 0,
            hw_index: 0,
            source_id: CH_REF_NONE,
            default_value: 0,
            name: ChannelName::new_empty(),
            value: 0,
            prev_value: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ChannelFlags::ENABLED)
    }

    pub fn set_value(&mut self, value: i32) {
        self.prev_value = self.value;
        self.value = value;
    }
}
