//! Typed channel configuration: records, the blob codec, and the
//! validator.

use crate::channel::ChannelKind;
use crate::protocol::serialize::Serializer;

pub mod codec;
pub use codec::{BlobFlags, BlobHeader, ChannelEntry, EntryHeader, CONFIG_MAGIC, CONFIG_VERSION};

pub mod records;
pub use records::*;

pub mod validate;
pub use validate::{validate, Limits, ValidateError};

/// Configuration for one channel, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelConfig {
    /// System channels carry no configuration.
    System,
    DigitalIn(DigitalInConfig),
    AnalogIn(AnalogInConfig),
    FrequencyIn(FrequencyInConfig),
    CanIn(CanInConfig),
    PowerOut(PowerOutConfig),
    PwmOut(PwmOutConfig),
    HBridge(HBridgeConfig),
    CanOut(CanOutConfig),
    Timer(TimerConfig),
    Logic(LogicConfig),
    Math(MathConfig),
    Table2d(Table2dConfig),
    Table3d(Table3dConfig),
    Filter(FilterConfig),
    Pid(PidConfig),
    Number(NumberConfig),
    Switch(SwitchConfig),
    Counter(CounterConfig),
    FlipFlop(FlipFlopConfig),
    Hysteresis(HysteresisConfig),
}

impl ChannelConfig {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::System => ChannelKind::System,
            Self::DigitalIn(_) => ChannelKind::DigitalIn,
            Self::AnalogIn(_) => ChannelKind::AnalogIn,
            Self::FrequencyIn(_) => ChannelKind::FrequencyIn,
            Self::CanIn(_) => ChannelKind::CanIn,
            Self::PowerOut(_) => ChannelKind::PowerOut,
            Self::PwmOut(_) => ChannelKind::PwmOut,
            Self::HBridge(_) => ChannelKind::HBridge,
            Self::CanOut(_) => ChannelKind::CanOut,
            Self::Timer(_) => ChannelKind::Timer,
            Self::Logic(_) => ChannelKind::Logic,
            Self::Math(_) => ChannelKind::Math,
            Self::Table2d(_) => ChannelKind::Table2d,
            Self::Table3d(_) => ChannelKind::Table3d,
            Self::Filter(_) => ChannelKind::Filter,
            Self::Pid(_) => ChannelKind::Pid,
            Self::Number(_) => ChannelKind::Number,
            Self::Switch(_) => ChannelKind::Switch,
            Self::Counter(_) => ChannelKind::Counter,
            Self::FlipFlop(_) => ChannelKind::FlipFlop,
            Self::Hysteresis(_) => ChannelKind::Hysteresis,
        }
    }

    /// On-wire size of the type-specific record.
    pub fn wire_size(&self) -> usize {
        Self::wire_size_of(self.kind())
    }

    /// On-wire size of the record for a kind.
    pub const fn wire_size_of(kind: ChannelKind) -> usize {
        match kind {
            ChannelKind::System => 0,
            ChannelKind::DigitalIn => DigitalInConfig::SIZE,
            ChannelKind::AnalogIn => AnalogInConfig::SIZE,
            ChannelKind::FrequencyIn => FrequencyInConfig::SIZE,
            ChannelKind::CanIn => CanInConfig::SIZE,
            ChannelKind::PowerOut => PowerOutConfig::SIZE,
            ChannelKind::PwmOut => PwmOutConfig::SIZE,
            ChannelKind::HBridge => HBridgeConfig::SIZE,
            ChannelKind::CanOut => CanOutConfig::SIZE,
            ChannelKind::Timer => TimerConfig::SIZE,
            ChannelKind::Logic => LogicConfig::SIZE,
            ChannelKind::Math => MathConfig::SIZE,
            ChannelKind::Table2d => Table2dConfig::SIZE,
            ChannelKind::Table3d => Table3dConfig::SIZE,
            ChannelKind::Filter => FilterConfig::SIZE,
            ChannelKind::Pid => PidConfig::SIZE,
            ChannelKind::Number => NumberConfig::SIZE,
            ChannelKind::Switch => SwitchConfig::SIZE,
            ChannelKind::Counter => CounterConfig::SIZE,
            ChannelKind::FlipFlop => FlipFlopConfig::SIZE,
            ChannelKind::Hysteresis => HysteresisConfig::SIZE,
        }
    }

    /// A zeroed default record for a kind.
    pub fn default_for(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::System => Self::System,
            ChannelKind::DigitalIn => Self::DigitalIn(Default::default()),
            ChannelKind::AnalogIn => Self::AnalogIn(Default::default()),
            ChannelKind::FrequencyIn => Self::FrequencyIn(Default::default()),
            ChannelKind::CanIn => Self::CanIn(Default::default()),
            ChannelKind::PowerOut => Self::PowerOut(Default::default()),
            ChannelKind::PwmOut => Self::PwmOut(Default::default()),
            ChannelKind::HBridge => Self::HBridge(Default::default()),
            ChannelKind::CanOut => Self::CanOut(Default::default()),
            ChannelKind::Timer => Self::Timer(Default::default()),
            ChannelKind::Logic => Self::Logic(Default::default()),
            ChannelKind::Math => Self::Math(Default::default()),
            ChannelKind::Table2d => Self::Table2d(Default::default()),
            ChannelKind::Table3d => Self::Table3d(Default::default()),
            ChannelKind::Filter => Self::Filter(Default::default()),
            ChannelKind::Pid => Self::Pid(Default::default()),
            ChannelKind::Number => Self::Number(Default::default()),
            ChannelKind::Switch => Self::Switch(Default::default()),
            ChannelKind::Counter => Self::Counter(Default::default()),
            ChannelKind::FlipFlop => Self::FlipFlop(Default::default()),
            ChannelKind::Hysteresis => Self::Hysteresis(Default::default()),
        }
    }

    /// Parse the record for a kind.
    pub fn parse(kind: ChannelKind, input: &[u8]) -> nom::IResult<&[u8], Self> {
        match kind {
            ChannelKind::System => Ok((input, Self::System)),
            ChannelKind::DigitalIn => {
                nom::combinator::map(DigitalInConfig::parse, Self::DigitalIn)(input)
            }
            ChannelKind::AnalogIn => {
                nom::combinator::map(AnalogInConfig::parse, Self::AnalogIn)(input)
            }
            ChannelKind::FrequencyIn => {
                nom::combinator::map(FrequencyInConfig::parse, Self::FrequencyIn)(input)
            }
            ChannelKind::CanIn => nom::combinator::map(CanInConfig::parse, Self::CanIn)(input),
            ChannelKind::PowerOut => {
                nom::combinator::map(PowerOutConfig::parse, Self::PowerOut)(input)
            }
            ChannelKind::PwmOut => nom::combinator::map(PwmOutConfig::parse, Self::PwmOut)(input),
            ChannelKind::HBridge => {
                nom::combinator::map(HBridgeConfig::parse, Self::HBridge)(input)
            }
            ChannelKind::CanOut => nom::combinator::map(CanOutConfig::parse, Self::CanOut)(input),
            ChannelKind::Timer => nom::combinator::map(TimerConfig::parse, Self::Timer)(input),
            ChannelKind::Logic => nom::combinator::map(LogicConfig::parse, Self::Logic)(input),
            ChannelKind::Math => nom::combinator::map(MathConfig::parse, Self::Math)(input),
            ChannelKind::Table2d => {
                nom::combinator::map(Table2dConfig::parse, Self::Table2d)(input)
            }
            ChannelKind::Table3d => {
                nom::combinator::map(Table3dConfig::parse, Self::Table3d)(input)
            }
            ChannelKind::Filter => nom::combinator::map(FilterConfig::parse, Self::Filter)(input),
            ChannelKind::Pid => nom::combinator::map(PidConfig::parse, Self::Pid)(input),
            ChannelKind::Number => nom::combinator::map(NumberConfig::parse, Self::Number)(input),
            ChannelKind::Switch => nom::combinator::map(SwitchConfig::parse, Self::Switch)(input),
            ChannelKind::Counter => {
                nom::combinator::map(CounterConfig::parse, Self::Counter)(input)
            }
            ChannelKind::FlipFlop => {
                nom::combinator::map(FlipFlopConfig::parse, Self::FlipFlop)(input)
            }
            ChannelKind::Hysteresis => {
                nom::combinator::map(HysteresisConfig::parse, Self::Hysteresis)(input)
            }
        }
    }

    pub fn serialize<S: Serializer>(&self, ser: &mut S) -> Result<(), S::Error> {
        match self {
            Self::System => Ok(()),
            Self::DigitalIn(c) => c.serialize(ser),
            Self::AnalogIn(c) => c.serialize(ser),
            Self::FrequencyIn(c) => c.serialize(ser),
            Self::CanIn(c) => c.serialize(ser),
            Self::PowerOut(c) => c.serialize(ser),
            Self::PwmOut(c) => c.serialize(ser),
            Self::HBridge(c) => c.serialize(ser),
            Self::CanOut(c) => c.serialize(ser),
            Self::Timer(c) => c.serialize(ser),
            Self::Logic(c) => c.serialize(ser),
            Self::Math(c) => c.serialize(ser),
            Self::Table2d(c) => c.serialize(ser),
            Self::Table3d(c) => c.serialize(ser),
            Self::Filter(c) => c.serialize(ser),
            Self::Pid(c) => c.serialize(ser),
            Self::Number(c) => c.serialize(ser),
            Self::Switch(c) => c.serialize(ser),
            Self::Counter(c) => c.serialize(ser),
            Self::FlipFlop(c) => c.serialize(ser),
            Self::Hysteresis(c) => c.serialize(ser),
        }
    }
}

// Record wire sizes are frozen.
const _: () = assert!(DigitalInConfig::SIZE == 4);
const _: () = assert!(AnalogInConfig::SIZE == 20);
const _: () = assert!(FrequencyInConfig::SIZE == 20);
const _: () = assert!(CanInConfig::SIZE == 18);
const _: () = assert!(PowerOutConfig::SIZE == 12);
const _: () = assert!(PwmOutConfig::SIZE == 10);
const _: () = assert!(HBridgeConfig::SIZE == 12);
const _: () = assert!(CanOutConfig::SIZE == 18);
const _: () = assert!(TimerConfig::SIZE == 16);
const _: () = assert!(LogicConfig::SIZE == 24);
const _: () = assert!(MathConfig::SIZE == 32);
const _: () = assert!(Table2dConfig::SIZE == 68);
const _: () = assert!(Table3dConfig::SIZE == 168);
const _: () = assert!(FilterConfig::SIZE == 8);
const _: () = assert!(PidConfig::SIZE == 22);
const _: () = assert!(NumberConfig::SIZE == 20);
const _: () = assert!(SwitchConfig::SIZE == 104);
const _: () = assert!(CounterConfig::SIZE == 18);
const _: () = assert!(FlipFlopConfig::SIZE == 12);
const _: () = assert!(HysteresisConfig::SIZE == 12);
