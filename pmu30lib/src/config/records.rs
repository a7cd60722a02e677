//! Typed per-kind configuration records and their wire layout.
//!
//! Every record has a frozen wire size, asserted at the bottom of this
//! module. All integers are little-endian.

use crate::channel::{ChannelId, CH_REF_NONE};
use crate::protocol::messages::util::{parse_array, Padding};
use crate::protocol::serialize::Serializer;

/// Most inputs a logic or math node accepts.
pub const NODE_MAX_INPUTS: usize = 8;

/// Most points on a 2-D table axis.
pub const TABLE2D_MAX_POINTS: usize = 16;

/// Most points on each 3-D table axis.
pub const TABLE3D_MAX_POINTS: usize = 8;

/// Most cases in a switch node.
pub const SWITCH_MAX_CASES: usize = 8;

/// Most samples any windowed filter may hold.
pub const FILTER_MAX_SAMPLES: usize = 16;

/// Duty cycle fixed point: 10000 = 100.0%.
pub const DUTY_FULL_SCALE: i32 = 10_000;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            pub fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
                nom::combinator::map_opt(nom::number::complete::u8, Self::from_u8)(input)
            }
        }
    };
}

wire_enum! {
    /// Input conditioning filter selection.
    FilterKind {
        #[default]
        Sma = 0,
        Ema = 1,
        Lpf = 2,
        Median = 3,
        RateLimit = 4,
        Debounce = 5,
    }
}

wire_enum! {
    /// Which edges a frequency input counts.
    EdgeMode {
        #[default]
        Rising = 0,
        Falling = 1,
        Both = 2,
    }
}

wire_enum! {
    /// Byte order of a CAN signal.
    ByteOrder {
        #[default]
        LittleEndian = 0,
        BigEndian = 1,
    }
}

wire_enum! {
    /// H-bridge behavior at zero command.
    BrakeMode {
        #[default]
        Coast = 0,
        Brake = 1,
    }
}

wire_enum! {
    /// Timer element operating mode.
    TimerMode {
        #[default]
        DelayOn = 0,
        DelayOff = 1,
        OneShot = 2,
        Blink = 3,
    }
}

wire_enum! {
    /// Trigger polarity for timers and counters.
    TriggerMode {
        #[default]
        Level = 0,
        Rising = 1,
        Falling = 2,
        Either = 3,
    }
}

wire_enum! {
    /// Logic node operation.
    LogicOp {
        #[default]
        And = 0,
        Or = 1,
        Xor = 2,
        Nand = 3,
        Nor = 4,
        Not = 5,
        Gt = 6,
        Ge = 7,
        Lt = 8,
        Le = 9,
        Eq = 10,
        Ne = 11,
        InRange = 12,
        OutsideRange = 13,
    }
}

wire_enum! {
    /// Math node operation.
    MathOp {
        #[default]
        Add = 0,
        Sub = 1,
        Mul = 2,
        Div = 3,
        Min = 4,
        Max = 5,
        Avg = 6,
        Clamp = 7,
        Map = 8,
        Scale = 9,
        Lerp = 10,
    }
}

wire_enum! {
    /// How a switch node matches its selector.
    SwitchMode {
        #[default]
        ValueMatch = 0,
        RangeMatch = 1,
        Index = 2,
    }
}

wire_enum! {
    /// Whether a counter reacts to edges or levels.
    CounterMode {
        #[default]
        Edge = 0,
        Level = 1,
    }
}

wire_enum! {
    /// Flip-flop element variant.
    FlipFlopKind {
        #[default]
        Sr = 0,
        D = 1,
        T = 2,
        Jk = 3,
        SrLatch = 4,
        DLatch = 5,
    }
}

wire_enum! {
    /// Hysteresis element variant.
    HysteresisKind {
        #[default]
        Schmitt = 0,
        Window = 1,
        Multilevel = 2,
    }
}

bitflags::bitflags! {
    /// Power output option bits.
    pub struct PowerOutFlags: u8 {
        const INRUSH_ENABLE = 0x01;
        const RETRY_ENABLE = 0x02;
        const SOFT_START = 0x04;
        const OPEN_LOAD_DETECT = 0x08;
    }
}

impl Default for PowerOutFlags {
    fn default() -> Self {
        PowerOutFlags::empty()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PowerOutFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PowerOutFlags({=u8:#x})", self.bits())
    }
}

/// Digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigitalInConfig {
    /// Input level treated as active: 0 = low, 1 = high.
    pub active_level: u8,
    pub use_pullup: u8,
    pub debounce_ms: u16,
}

impl DigitalInConfig {
    pub const SIZE: usize = 4;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, active_level) = nom::number::complete::u8(input)?;
        let (input, use_pullup) = nom::number::complete::u8(input)?;
        let (input, debounce_ms) = nom::number::complete::le_u16(input)?;
        Ok((
            input,
            Self {
                active_level,
                use_pullup,
                debounce_ms,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_u8(self.active_level)?;
        ser.write_u8(self.use_pullup)?;
        ser.write_le_u16(self.debounce_ms)
    }
}

/// Analog input with raw-to-scaled mapping and optional conditioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogInConfig {
    pub raw_min: i32,
    pub raw_max: i32,
    pub scaled_min: i32,
    pub scaled_max: i32,
    pub filter_ms: u16,
    pub filter_kind: FilterKind,
    pub sample_count: u8,
}

impl AnalogInConfig {
    pub const SIZE: usize = 20;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, raw_min) = nom::number::complete::le_i32(input)?;
        let (input, raw_max) = nom::number::complete::le_i32(input)?;
        let (input, scaled_min) = nom::number::complete::le_i32(input)?;
        let (input, scaled_max) = nom::number::complete::le_i32(input)?;
        let (input, filter_ms) = nom::number::complete::le_u16(input)?;
        let (input, filter_kind) = FilterKind::parse(input)?;
        let (input, sample_count) = nom::number::complete::u8(input)?;
        Ok((
            input,
            Self {
                raw_min,
                raw_max,
                scaled_min,
                scaled_max,
                filter_ms,
                filter_kind,
                sample_count,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_i32(self.raw_min)?;
        ser.write_le_i32(self.raw_max)?;
        ser.write_le_i32(self.scaled_min)?;
        ser.write_le_i32(self.scaled_max)?;
        ser.write_le_u16(self.filter_ms)?;
        ser.write_u8(self.filter_kind as u8)?;
        ser.write_u8(self.sample_count)
    }
}

/// Frequency input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrequencyInConfig {
    pub min_hz: u32,
    pub max_hz: u32,
    pub timeout_ms: u16,
    pub edge_mode: EdgeMode,
    pub pulses_per_rev: u8,
    pub scale_num: i32,
    pub scale_den: i32,
}

impl FrequencyInConfig {
    pub const SIZE: usize = 20;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, min_hz) = nom::number::complete::le_u32(input)?;
        let (input, max_hz) = nom::number::complete::le_u32(input)?;
        let (input, timeout_ms) = nom::number::complete::le_u16(input)?;
        let (input, edge_mode) = EdgeMode::parse(input)?;
        let (input, pulses_per_rev) = nom::number::complete::u8(input)?;
        let (input, scale_num) = nom::number::complete::le_i32(input)?;
        let (input, scale_den) = nom::number::complete::le_i32(input)?;
        Ok((
            input,
            Self {
                min_hz,
                max_hz,
                timeout_ms,
                edge_mode,
                pulses_per_rev,
                scale_num,
                scale_den,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u32(self.min_hz)?;
        ser.write_le_u32(self.max_hz)?;
        ser.write_le_u16(self.timeout_ms)?;
        ser.write_u8(self.edge_mode as u8)?;
        ser.write_u8(self.pulses_per_rev)?;
        ser.write_le_i32(self.scale_num)?;
        ser.write_le_i32(self.scale_den)
    }
}

impl Default for FrequencyInConfig {
    fn default() -> Self {
        Self {
            min_hz: 0,
            max_hz: 10_000,
            timeout_ms: 1000,
            edge_mode: EdgeMode::Rising,
            pulses_per_rev: 1,
            scale_num: 1,
            scale_den: 1,
        }
    }
}

/// CAN receive signal extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanInConfig {
    pub can_id: u32,
    pub bus: u8,
    pub start_bit: u8,
    pub bit_length: u8,
    pub byte_order: ByteOrder,
    pub signed: u8,
    pub extended: u8,
    pub scale_num: i16,
    pub scale_den: i16,
    pub offset: i16,
    pub timeout_ms: u16,
}

impl CanInConfig {
    pub const SIZE: usize = 18;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, can_id) = nom::number::complete::le_u32(input)?;
        let (input, bus) = nom::number::complete::u8(input)?;
        let (input, start_bit) = nom::number::complete::u8(input)?;
        let (input, bit_length) = nom::number::complete::u8(input)?;
        let (input, byte_order) = ByteOrder::parse(input)?;
        let (input, signed) = nom::number::complete::u8(input)?;
        let (input, extended) = nom::number::complete::u8(input)?;
        let (input, scale_num) = nom::number::complete::le_i16(input)?;
        let (input, scale_den) = nom::number::complete::le_i16(input)?;
        let (input, offset) = nom::number::complete::le_i16(input)?;
        let (input, timeout_ms) = nom::number::complete::le_u16(input)?;
        Ok((
            input,
            Self {
                can_id,
                bus,
                start_bit,
                bit_length,
                byte_order,
                signed,
                extended,
                scale_num,
                scale_den,
                offset,
                timeout_ms,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u32(self.can_id)?;
        ser.write_u8(self.bus)?;
        ser.write_u8(self.start_bit)?;
        ser.write_u8(self.bit_length)?;
        ser.write_u8(self.byte_order as u8)?;
        ser.write_u8(self.signed)?;
        ser.write_u8(self.extended)?;
        ser.write_le_i16(self.scale_num)?;
        ser.write_le_i16(self.scale_den)?;
        ser.write_le_i16(self.offset)?;
        ser.write_le_u16(self.timeout_ms)
    }
}

impl Default for CanInConfig {
    fn default() -> Self {
        Self {
            can_id: 0,
            bus: 0,
            start_bit: 0,
            bit_length: 8,
            byte_order: ByteOrder::LittleEndian,
            signed: 0,
            extended: 0,
            scale_num: 1,
            scale_den: 1,
            offset: 0,
            timeout_ms: 1000,
        }
    }
}

/// High-side power output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerOutConfig {
    pub current_limit_ma: u16,
    pub inrush_limit_ma: u16,
    pub inrush_window_ms: u16,
    pub pwm_freq_hz: u16,
    pub retry_count: u8,
    /// Delay before a retry, in 10 ms units.
    pub retry_delay: u8,
    /// Soft-start ramp, in 10 ms units.
    pub soft_start: u8,
    pub flags: PowerOutFlags,
}

impl PowerOutConfig {
    pub const SIZE: usize = 12;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, current_limit_ma) = nom::number::complete::le_u16(input)?;
        let (input, inrush_limit_ma) = nom::number::complete::le_u16(input)?;
        let (input, inrush_window_ms) = nom::number::complete::le_u16(input)?;
        let (input, pwm_freq_hz) = nom::number::complete::le_u16(input)?;
        let (input, retry_count) = nom::number::complete::u8(input)?;
        let (input, retry_delay) = nom::number::complete::u8(input)?;
        let (input, soft_start) = nom::number::complete::u8(input)?;
        let (input, flags) = nom::number::complete::u8(input)?;
        let flags = PowerOutFlags::from_bits_truncate(flags);
        Ok((
            input,
            Self {
                current_limit_ma,
                inrush_limit_ma,
                inrush_window_ms,
                pwm_freq_hz,
                retry_count,
                retry_delay,
                soft_start,
                flags,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.current_limit_ma)?;
        ser.write_le_u16(self.inrush_limit_ma)?;
        ser.write_le_u16(self.inrush_window_ms)?;
        ser.write_le_u16(self.pwm_freq_hz)?;
        ser.write_u8(self.retry_count)?;
        ser.write_u8(self.retry_delay)?;
        ser.write_u8(self.soft_start)?;
        ser.write_u8(self.flags.bits())
    }
}

impl Default for PowerOutConfig {
    fn default() -> Self {
        Self {
            current_limit_ma: 10_000,
            inrush_limit_ma: 20_000,
            inrush_window_ms: 500,
            pwm_freq_hz: 200,
            retry_count: 3,
            retry_delay: 50,
            soft_start: 0,
            flags: PowerOutFlags::empty(),
        }
    }
}

/// PWM output. Duty fields use [DUTY_FULL_SCALE] fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmOutConfig {
    pub freq_hz: u16,
    pub duty_min: u16,
    pub duty_max: u16,
    pub duty_default: u16,
    pub invert: u8,
    pub _pad: Padding<1>,
}

impl PwmOutConfig {
    pub const SIZE: usize = 10;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, freq_hz) = nom::number::complete::le_u16(input)?;
        let (input, duty_min) = nom::number::complete::le_u16(input)?;
        let (input, duty_max) = nom::number::complete::le_u16(input)?;
        let (input, duty_default) = nom::number::complete::le_u16(input)?;
        let (input, invert) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                freq_hz,
                duty_min,
                duty_max,
                duty_default,
                invert,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.freq_hz)?;
        ser.write_le_u16(self.duty_min)?;
        ser.write_le_u16(self.duty_max)?;
        ser.write_le_u16(self.duty_default)?;
        ser.write_u8(self.invert)?;
        self._pad.serialize(ser)
    }
}

impl Default for PwmOutConfig {
    fn default() -> Self {
        Self {
            freq_hz: 1000,
            duty_min: 0,
            duty_max: DUTY_FULL_SCALE as u16,
            duty_default: 0,
            invert: 0,
            _pad: Padding::new(),
        }
    }
}

/// H-bridge output. Positive = forward, negative = reverse, zero = coast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HBridgeConfig {
    pub pwm_freq_hz: u16,
    pub current_limit_ma: u16,
    /// Duty units per second while magnitude is increasing.
    pub accel_rate: u16,
    /// Duty units per second while magnitude is decreasing.
    pub decel_rate: u16,
    pub deadband: u16,
    pub brake_mode: BrakeMode,
    pub _pad: Padding<1>,
}

impl HBridgeConfig {
    pub const SIZE: usize = 12;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, pwm_freq_hz) = nom::number::complete::le_u16(input)?;
        let (input, current_limit_ma) = nom::number::complete::le_u16(input)?;
        let (input, accel_rate) = nom::number::complete::le_u16(input)?;
        let (input, decel_rate) = nom::number::complete::le_u16(input)?;
        let (input, deadband) = nom::number::complete::le_u16(input)?;
        let (input, brake_mode) = BrakeMode::parse(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                pwm_freq_hz,
                current_limit_ma,
                accel_rate,
                decel_rate,
                deadband,
                brake_mode,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.pwm_freq_hz)?;
        ser.write_le_u16(self.current_limit_ma)?;
        ser.write_le_u16(self.accel_rate)?;
        ser.write_le_u16(self.decel_rate)?;
        ser.write_le_u16(self.deadband)?;
        ser.write_u8(self.brake_mode as u8)?;
        self._pad.serialize(ser)
    }
}

impl Default for HBridgeConfig {
    fn default() -> Self {
        Self {
            pwm_freq_hz: 20_000,
            current_limit_ma: 10_000,
            accel_rate: 10_000,
            decel_rate: 10_000,
            deadband: 100,
            brake_mode: BrakeMode::Coast,
            _pad: Padding::new(),
        }
    }
}

/// CAN transmit signal placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanOutConfig {
    pub can_id: u32,
    pub bus: u8,
    pub dlc: u8,
    pub start_bit: u8,
    pub bit_length: u8,
    pub extended: u8,
    pub _pad: Padding<1>,
    pub period_ms: u16,
    pub scale_num: i16,
    pub scale_den: i16,
    pub offset: i16,
}

impl CanOutConfig {
    pub const SIZE: usize = 18;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, can_id) = nom::number::complete::le_u32(input)?;
        let (input, bus) = nom::number::complete::u8(input)?;
        let (input, dlc) = nom::number::complete::u8(input)?;
        let (input, start_bit) = nom::number::complete::u8(input)?;
        let (input, bit_length) = nom::number::complete::u8(input)?;
        let (input, extended) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        let (input, period_ms) = nom::number::complete::le_u16(input)?;
        let (input, scale_num) = nom::number::complete::le_i16(input)?;
        let (input, scale_den) = nom::number::complete::le_i16(input)?;
        let (input, offset) = nom::number::complete::le_i16(input)?;
        Ok((
            input,
            Self {
                can_id,
                bus,
                dlc,
                start_bit,
                bit_length,
                extended,
                _pad,
                period_ms,
                scale_num,
                scale_den,
                offset,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u32(self.can_id)?;
        ser.write_u8(self.bus)?;
        ser.write_u8(self.dlc)?;
        ser.write_u8(self.start_bit)?;
        ser.write_u8(self.bit_length)?;
        ser.write_u8(self.extended)?;
        self._pad.serialize(ser)?;
        ser.write_le_u16(self.period_ms)?;
        ser.write_le_i16(self.scale_num)?;
        ser.write_le_i16(self.scale_den)?;
        ser.write_le_i16(self.offset)
    }
}

impl Default for CanOutConfig {
    fn default() -> Self {
        Self {
            can_id: 0,
            bus: 0,
            dlc: 8,
            start_bit: 0,
            bit_length: 16,
            extended: 0,
            _pad: Padding::new(),
            period_ms: 100,
            scale_num: 1,
            scale_den: 1,
            offset: 0,
        }
    }
}

/// Timer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    pub mode: TimerMode,
    pub trigger_mode: TriggerMode,
    pub trigger_id: ChannelId,
    pub delay_ms: u32,
    pub on_ms: u16,
    pub off_ms: u16,
    pub auto_reset: u8,
    pub _pad: Padding<3>,
}

impl TimerConfig {
    pub const SIZE: usize = 16;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, mode) = TimerMode::parse(input)?;
        let (input, trigger_mode) = TriggerMode::parse(input)?;
        let (input, trigger_id) = nom::number::complete::le_u16(input)?;
        let (input, delay_ms) = nom::number::complete::le_u32(input)?;
        let (input, on_ms) = nom::number::complete::le_u16(input)?;
        let (input, off_ms) = nom::number::complete::le_u16(input)?;
        let (input, auto_reset) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                mode,
                trigger_mode,
                trigger_id,
                delay_ms,
                on_ms,
                off_ms,
                auto_reset,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_u8(self.mode as u8)?;
        ser.write_u8(self.trigger_mode as u8)?;
        ser.write_le_u16(self.trigger_id)?;
        ser.write_le_u32(self.delay_ms)?;
        ser.write_le_u16(self.on_ms)?;
        ser.write_le_u16(self.off_ms)?;
        ser.write_u8(self.auto_reset)?;
        self._pad.serialize(ser)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            mode: TimerMode::DelayOn,
            trigger_mode: TriggerMode::Level,
            trigger_id: CH_REF_NONE,
            delay_ms: 1000,
            on_ms: 500,
            off_ms: 500,
            auto_reset: 1,
            _pad: Padding::new(),
        }
    }
}

/// Logic node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogicConfig {
    pub op: LogicOp,
    pub input_count: u8,
    pub inputs: [ChannelId; NODE_MAX_INPUTS],
    pub compare_value: i32,
    pub invert_output: u8,
    pub _pad: Padding<1>,
}

impl LogicConfig {
    pub const SIZE: usize = 24;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, op) = LogicOp::parse(input)?;
        let (input, input_count) = nom::number::complete::u8(input)?;
        let (input, inputs) = parse_array(nom::number::complete::le_u16)(input)?;
        let (input, compare_value) = nom::number::complete::le_i32(input)?;
        let (input, invert_output) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                op,
                input_count,
                inputs,
                compare_value,
                invert_output,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_u8(self.op as u8)?;
        ser.write_u8(self.input_count)?;
        for id in self.inputs.iter() {
            ser.write_le_u16(*id)?;
        }
        ser.write_le_i32(self.compare_value)?;
        ser.write_u8(self.invert_output)?;
        self._pad.serialize(ser)
    }
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            op: LogicOp::And,
            input_count: 0,
            inputs: [CH_REF_NONE; NODE_MAX_INPUTS],
            compare_value: 0,
            invert_output: 0,
            _pad: Padding::new(),
        }
    }
}

/// Math node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MathConfig {
    pub op: MathOp,
    pub input_count: u8,
    pub inputs: [ChannelId; NODE_MAX_INPUTS],
    pub constant: i32,
    pub clamp_min: i32,
    pub clamp_max: i32,
    pub scale_num: i8,
    pub scale_den: i8,
}

impl MathConfig {
    pub const SIZE: usize = 32;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, op) = MathOp::parse(input)?;
        let (input, input_count) = nom::number::complete::u8(input)?;
        let (input, inputs) = parse_array(nom::number::complete::le_u16)(input)?;
        let (input, constant) = nom::number::complete::le_i32(input)?;
        let (input, clamp_min) = nom::number::complete::le_i32(input)?;
        let (input, clamp_max) = nom::number::complete::le_i32(input)?;
        let (input, scale_num) = nom::number::complete::i8(input)?;
        let (input, scale_den) = nom::number::complete::i8(input)?;
        Ok((
            input,
            Self {
                op,
                input_count,
                inputs,
                constant,
                clamp_min,
                clamp_max,
                scale_num,
                scale_den,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_u8(self.op as u8)?;
        ser.write_u8(self.input_count)?;
        for id in self.inputs.iter() {
            ser.write_le_u16(*id)?;
        }
        ser.write_le_i32(self.constant)?;
        ser.write_le_i32(self.clamp_min)?;
        ser.write_le_i32(self.clamp_max)?;
        ser.write_u8(self.scale_num as u8)?;
        ser.write_u8(self.scale_den as u8)
    }
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            op: MathOp::Add,
            input_count: 0,
            inputs: [CH_REF_NONE; NODE_MAX_INPUTS],
            constant: 0,
            clamp_min: 0,
            clamp_max: 0,
            scale_num: 1,
            scale_den: 1,
        }
    }
}

/// 2-D interpolation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Table2dConfig {
    pub input_id: ChannelId,
    pub point_count: u8,
    pub _pad: Padding<1>,
    pub x: [i16; TABLE2D_MAX_POINTS],
    pub y: [i16; TABLE2D_MAX_POINTS],
}

impl Table2dConfig {
    pub const SIZE: usize = 68;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, input_id) = nom::number::complete::le_u16(input)?;
        let (input, point_count) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        let (input, x) = parse_array(nom::number::complete::le_i16)(input)?;
        let (input, y) = parse_array(nom::number::complete::le_i16)(input)?;
        Ok((
            input,
            Self {
                input_id,
                point_count,
                _pad,
                x,
                y,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.input_id)?;
        ser.write_u8(self.point_count)?;
        self._pad.serialize(ser)?;
        for v in self.x.iter() {
            ser.write_le_i16(*v)?;
        }
        for v in self.y.iter() {
            ser.write_le_i16(*v)?;
        }
        Ok(())
    }
}

impl Default for Table2dConfig {
    fn default() -> Self {
        Self {
            input_id: CH_REF_NONE,
            point_count: 0,
            _pad: Padding::new(),
            x: [0; TABLE2D_MAX_POINTS],
            y: [0; TABLE2D_MAX_POINTS],
        }
    }
}

/// 3-D interpolation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Table3dConfig {
    pub input_x: ChannelId,
    pub input_y: ChannelId,
    pub x_size: u8,
    pub y_size: u8,
    pub x: [i16; TABLE3D_MAX_POINTS],
    pub y: [i16; TABLE3D_MAX_POINTS],
    /// Indexed `z[yi][xi]`.
    pub z: [[i16; TABLE3D_MAX_POINTS]; TABLE3D_MAX_POINTS],
    pub _pad: Padding<2>,
}

impl Table3dConfig {
    pub const SIZE: usize = 168;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, input_x) = nom::number::complete::le_u16(input)?;
        let (input, input_y) = nom::number::complete::le_u16(input)?;
        let (input, x_size) = nom::number::complete::u8(input)?;
        let (input, y_size) = nom::number::complete::u8(input)?;
        let (input, x) = parse_array(nom::number::complete::le_i16)(input)?;
        let (mut input, y) = parse_array(nom::number::complete::le_i16)(input)?;
        let mut z = [[0i16; TABLE3D_MAX_POINTS]; TABLE3D_MAX_POINTS];
        for row in z.iter_mut() {
            let (rest, parsed) = parse_array(nom::number::complete::le_i16)(input)?;
            *row = parsed;
            input = rest;
        }
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                input_x,
                input_y,
                x_size,
                y_size,
                x,
                y,
                z,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.input_x)?;
        ser.write_le_u16(self.input_y)?;
        ser.write_u8(self.x_size)?;
        ser.write_u8(self.y_size)?;
        for v in self.x.iter() {
            ser.write_le_i16(*v)?;
        }
        for v in self.y.iter() {
            ser.write_le_i16(*v)?;
        }
        for row in self.z.iter() {
            for v in row.iter() {
                ser.write_le_i16(*v)?;
            }
        }
        self._pad.serialize(ser)
    }
}

impl Default for Table3dConfig {
    fn default() -> Self {
        Self {
            input_x: CH_REF_NONE,
            input_y: CH_REF_NONE,
            x_size: 0,
            y_size: 0,
            x: [0; TABLE3D_MAX_POINTS],
            y: [0; TABLE3D_MAX_POINTS],
            z: [[0; TABLE3D_MAX_POINTS]; TABLE3D_MAX_POINTS],
            _pad: Padding::new(),
        }
    }
}

/// Standalone filter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterConfig {
    pub input_id: ChannelId,
    pub kind: FilterKind,
    pub window_size: u8,
    pub time_const_ms: u16,
    /// EMA smoothing factor, 1..=255 out of 256.
    pub alpha: u8,
    pub _pad: Padding<1>,
}

impl FilterConfig {
    pub const SIZE: usize = 8;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, input_id) = nom::number::complete::le_u16(input)?;
        let (input, kind) = FilterKind::parse(input)?;
        let (input, window_size) = nom::number::complete::u8(input)?;
        let (input, time_const_ms) = nom::number::complete::le_u16(input)?;
        let (input, alpha) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                input_id,
                kind,
                window_size,
                time_const_ms,
                alpha,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.input_id)?;
        ser.write_u8(self.kind as u8)?;
        ser.write_u8(self.window_size)?;
        ser.write_le_u16(self.time_const_ms)?;
        ser.write_u8(self.alpha)?;
        self._pad.serialize(ser)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            input_id: CH_REF_NONE,
            kind: FilterKind::Sma,
            window_size: 4,
            time_const_ms: 100,
            alpha: 64,
            _pad: Padding::new(),
        }
    }
}

/// PID controller. Gains are scaled integers over [crate::engine::pid::PID_GAIN_SCALE].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidConfig {
    pub setpoint_id: ChannelId,
    pub feedback_id: ChannelId,
    pub kp: i16,
    pub ki: i16,
    pub kd: i16,
    pub output_min: i16,
    pub output_max: i16,
    pub integral_min: i16,
    pub integral_max: i16,
    pub deadband: u16,
    pub d_on_measurement: u8,
    pub _pad: Padding<1>,
}

impl PidConfig {
    pub const SIZE: usize = 22;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, setpoint_id) = nom::number::complete::le_u16(input)?;
        let (input, feedback_id) = nom::number::complete::le_u16(input)?;
        let (input, kp) = nom::number::complete::le_i16(input)?;
        let (input, ki) = nom::number::complete::le_i16(input)?;
        let (input, kd) = nom::number::complete::le_i16(input)?;
        let (input, output_min) = nom::number::complete::le_i16(input)?;
        let (input, output_max) = nom::number::complete::le_i16(input)?;
        let (input, integral_min) = nom::number::complete::le_i16(input)?;
        let (input, integral_max) = nom::number::complete::le_i16(input)?;
        let (input, deadband) = nom::number::complete::le_u16(input)?;
        let (input, d_on_measurement) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                setpoint_id,
                feedback_id,
                kp,
                ki,
                kd,
                output_min,
                output_max,
                integral_min,
                integral_max,
                deadband,
                d_on_measurement,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.setpoint_id)?;
        ser.write_le_u16(self.feedback_id)?;
        ser.write_le_i16(self.kp)?;
        ser.write_le_i16(self.ki)?;
        ser.write_le_i16(self.kd)?;
        ser.write_le_i16(self.output_min)?;
        ser.write_le_i16(self.output_max)?;
        ser.write_le_i16(self.integral_min)?;
        ser.write_le_i16(self.integral_max)?;
        ser.write_le_u16(self.deadband)?;
        ser.write_u8(self.d_on_measurement)?;
        self._pad.serialize(ser)
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            setpoint_id: CH_REF_NONE,
            feedback_id: CH_REF_NONE,
            kp: 1000,
            ki: 0,
            kd: 0,
            output_min: 0,
            output_max: 10_000,
            integral_min: -10_000,
            integral_max: 10_000,
            deadband: 0,
            d_on_measurement: 0,
            _pad: Padding::new(),
        }
    }
}

/// Adjustable constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NumberConfig {
    pub value: i32,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub read_only: u8,
    /// Persist the value to flash when it changes.
    pub persist: u8,
    pub _pad: Padding<2>,
}

impl NumberConfig {
    pub const SIZE: usize = 20;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, value) = nom::number::complete::le_i32(input)?;
        let (input, min) = nom::number::complete::le_i32(input)?;
        let (input, max) = nom::number::complete::le_i32(input)?;
        let (input, step) = nom::number::complete::le_i32(input)?;
        let (input, read_only) = nom::number::complete::u8(input)?;
        let (input, persist) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                value,
                min,
                max,
                step,
                read_only,
                persist,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_i32(self.value)?;
        ser.write_le_i32(self.min)?;
        ser.write_le_i32(self.max)?;
        ser.write_le_i32(self.step)?;
        ser.write_u8(self.read_only)?;
        ser.write_u8(self.persist)?;
        self._pad.serialize(ser)
    }
}

impl Default for NumberConfig {
    fn default() -> Self {
        Self {
            value: 0,
            min: i32::MIN,
            max: i32::MAX,
            step: 1,
            read_only: 0,
            persist: 0,
            _pad: Padding::new(),
        }
    }
}

/// One switch case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwitchCase {
    pub match_value: i32,
    /// Upper bound, inclusive, in range-match mode.
    pub max_value: i32,
    pub result: i32,
}

impl SwitchCase {
    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, match_value) = nom::number::complete::le_i32(input)?;
        let (input, max_value) = nom::number::complete::le_i32(input)?;
        let (input, result) = nom::number::complete::le_i32(input)?;
        Ok((
            input,
            Self {
                match_value,
                max_value,
                result,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_i32(self.match_value)?;
        ser.write_le_i32(self.max_value)?;
        ser.write_le_i32(self.result)
    }
}

/// Selector node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwitchConfig {
    pub selector_id: ChannelId,
    pub mode: SwitchMode,
    pub case_count: u8,
    pub cases: [SwitchCase; SWITCH_MAX_CASES],
    pub default: i32,
}

impl SwitchConfig {
    pub const SIZE: usize = 104;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, selector_id) = nom::number::complete::le_u16(input)?;
        let (input, mode) = SwitchMode::parse(input)?;
        let (input, case_count) = nom::number::complete::u8(input)?;
        let (input, cases) = parse_array(SwitchCase::parse)(input)?;
        let (input, default) = nom::number::complete::le_i32(input)?;
        Ok((
            input,
            Self {
                selector_id,
                mode,
                case_count,
                cases,
                default,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.selector_id)?;
        ser.write_u8(self.mode as u8)?;
        ser.write_u8(self.case_count)?;
        for case in self.cases.iter() {
            case.serialize(ser)?;
        }
        ser.write_le_i32(self.default)
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            selector_id: CH_REF_NONE,
            mode: SwitchMode::ValueMatch,
            case_count: 0,
            cases: [SwitchCase::default(); SWITCH_MAX_CASES],
            default: 0,
        }
    }
}

/// Counter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CounterConfig {
    pub increment_id: ChannelId,
    pub decrement_id: ChannelId,
    pub reset_id: ChannelId,
    pub initial: i16,
    pub min: i16,
    pub max: i16,
    pub step: i16,
    pub mode: CounterMode,
    /// Wrap around at the bounds instead of saturating.
    pub wrap: u8,
    pub _pad: Padding<2>,
}

impl CounterConfig {
    pub const SIZE: usize = 18;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, increment_id) = nom::number::complete::le_u16(input)?;
        let (input, decrement_id) = nom::number::complete::le_u16(input)?;
        let (input, reset_id) = nom::number::complete::le_u16(input)?;
        let (input, initial) = nom::number::complete::le_i16(input)?;
        let (input, min) = nom::number::complete::le_i16(input)?;
        let (input, max) = nom::number::complete::le_i16(input)?;
        let (input, step) = nom::number::complete::le_i16(input)?;
        let (input, mode) = CounterMode::parse(input)?;
        let (input, wrap) = nom::number::complete::u8(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                increment_id,
                decrement_id,
                reset_id,
                initial,
                min,
                max,
                step,
                mode,
                wrap,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.increment_id)?;
        ser.write_le_u16(self.decrement_id)?;
        ser.write_le_u16(self.reset_id)?;
        ser.write_le_i16(self.initial)?;
        ser.write_le_i16(self.min)?;
        ser.write_le_i16(self.max)?;
        ser.write_le_i16(self.step)?;
        ser.write_u8(self.mode as u8)?;
        ser.write_u8(self.wrap)?;
        self._pad.serialize(ser)
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            increment_id: CH_REF_NONE,
            decrement_id: CH_REF_NONE,
            reset_id: CH_REF_NONE,
            initial: 0,
            min: 0,
            max: i16::MAX,
            step: 1,
            mode: CounterMode::Edge,
            wrap: 0,
            _pad: Padding::new(),
        }
    }
}

/// Flip-flop node. Input roles depend on the variant: set/J/data on
/// `set_id`, reset/K on `reset_id`, clock on `clock_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlipFlopConfig {
    pub kind: FlipFlopKind,
    pub initial_state: u8,
    pub set_id: ChannelId,
    pub reset_id: ChannelId,
    pub clock_id: ChannelId,
    pub enable_id: ChannelId,
    pub _pad: Padding<2>,
}

impl FlipFlopConfig {
    pub const SIZE: usize = 12;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, kind) = FlipFlopKind::parse(input)?;
        let (input, initial_state) = nom::number::complete::u8(input)?;
        let (input, set_id) = nom::number::complete::le_u16(input)?;
        let (input, reset_id) = nom::number::complete::le_u16(input)?;
        let (input, clock_id) = nom::number::complete::le_u16(input)?;
        let (input, enable_id) = nom::number::complete::le_u16(input)?;
        let (input, _pad) = Padding::parse(input)?;
        Ok((
            input,
            Self {
                kind,
                initial_state,
                set_id,
                reset_id,
                clock_id,
                enable_id,
                _pad,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_u8(self.kind as u8)?;
        ser.write_u8(self.initial_state)?;
        ser.write_le_u16(self.set_id)?;
        ser.write_le_u16(self.reset_id)?;
        ser.write_le_u16(self.clock_id)?;
        ser.write_le_u16(self.enable_id)?;
        self._pad.serialize(ser)
    }
}

impl Default for FlipFlopConfig {
    fn default() -> Self {
        Self {
            kind: FlipFlopKind::Sr,
            initial_state: 0,
            set_id: CH_REF_NONE,
            reset_id: CH_REF_NONE,
            clock_id: CH_REF_NONE,
            enable_id: CH_REF_NONE,
            _pad: Padding::new(),
        }
    }
}

/// Hysteresis node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HysteresisConfig {
    pub input_id: ChannelId,
    pub kind: HysteresisKind,
    pub invert: u8,
    pub threshold_high: i32,
    pub threshold_low: i32,
}

impl HysteresisConfig {
    pub const SIZE: usize = 12;

    pub fn parse(input: &[u8]) -> nom::IResult<&[u8], Self> {
        let (input, input_id) = nom::number::complete::le_u16(input)?;
        let (input, kind) = HysteresisKind::parse(input)?;
        let (input, invert) = nom::number::complete::u8(input)?;
        let (input, threshold_high) = nom::number::complete::le_i32(input)?;
        let (input, threshold_low) = nom::number::complete::le_i32(input)?;
        Ok((
            input,
            Self {
                input_id,
                kind,
                invert,
                threshold_high,
                threshold_low,
            },
        ))
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        ser.write_le_u16(self.input_id)?;
        ser.write_u8(self.kind as u8)?;
        ser.write_u8(self.invert)?;
        ser.write_le_i32(self.threshold_high)?;
        ser.write_le_i32(self.threshold_low)
    }
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            input_id: CH_REF_NONE,
            kind: HysteresisKind::Schmitt,
            invert: 0,
            threshold_high: 0,
            threshold_low: 0,
        }
    }
}
