//! Pure configuration validation, shared verbatim by the host (before
//! upload) and the device (before apply).

use crate::channel::{
    self, ChannelKind, CH_REF_NONE, NUM_ANALOG_INPUTS, NUM_CAN_BUSES, NUM_DIGITAL_INPUTS,
    NUM_FREQUENCY_INPUTS, NUM_HBRIDGES, NUM_POWER_OUTPUTS,
};
use crate::config::records::*;
use crate::config::{ChannelConfig, EntryHeader};
use crate::error::ErrorCode;
use crate::{ChannelName, NAME_LEN};

/// Tunable validation limits.
///
/// Host and device share the defaults; tests drive the corner cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Limits {
    pub name_max: usize,
    pub debounce_max_ms: u16,
    pub filter_ms_max: u16,
    pub sample_count_max: u8,
    pub filter_window_max: u8,
    pub min_pwm_freq_hz: u16,
    pub max_pwm_freq_hz: u16,
    pub can_std_id_max: u32,
    pub can_ext_id_max: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            name_max: NAME_LEN - 1,
            debounce_max_ms: 10_000,
            filter_ms_max: 60_000,
            sample_count_max: 64,
            filter_window_max: FILTER_MAX_SAMPLES as u8,
            min_pwm_freq_hz: 10,
            max_pwm_freq_hz: 25_000,
            can_std_id_max: 0x7ff,
            can_ext_id_max: 0x1fff_ffff,
        }
    }
}

/// A precise validation failure: which field, what it held, what was
/// allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValidateError {
    pub code: ErrorCode,
    pub field: &'static str,
    pub actual: i32,
    pub min: i32,
    pub max: i32,
}

impl core::fmt::Display for ValidateError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{}: {} = {}, expected {}..={}",
            self.code, self.field, self.actual, self.min, self.max
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValidateError {}

fn err(
    code: ErrorCode,
    field: &'static str,
    actual: i32,
    min: i32,
    max: i32,
) -> Result<(), ValidateError> {
    Err(ValidateError {
        code,
        field,
        actual,
        min,
        max,
    })
}

fn check_ref(field: &'static str, id: u16) -> Result<(), ValidateError> {
    if channel::is_valid_ref(id) {
        Ok(())
    } else {
        err(
            ErrorCode::InvalidSourceId,
            field,
            id as i32,
            1,
            channel::SYSTEM_ID_MAX as i32,
        )
    }
}

fn check_required_ref(field: &'static str, id: u16) -> Result<(), ValidateError> {
    if id == CH_REF_NONE || !channel::is_valid_ref(id) {
        err(
            ErrorCode::InvalidSourceId,
            field,
            id as i32,
            1,
            channel::SYSTEM_ID_MAX as i32,
        )
    } else {
        Ok(())
    }
}

fn check_hw_index(field: &'static str, index: u8, count: usize) -> Result<(), ValidateError> {
    if (index as usize) < count {
        Ok(())
    } else {
        err(ErrorCode::ValueOutOfRange, field, index as i32, 0, count as i32 - 1)
    }
}

fn check_ascending(
    field: &'static str,
    axis: &[i16],
    count: usize,
) -> Result<(), ValidateError> {
    for i in 1..count {
        if axis[i] <= axis[i - 1] {
            return err(
                ErrorCode::NonMonotonicAxis,
                field,
                axis[i] as i32,
                axis[i - 1] as i32 + 1,
                i16::MAX as i32,
            );
        }
    }
    Ok(())
}

fn check_can_id(
    limits: &Limits,
    can_id: u32,
    extended: u8,
) -> Result<(), ValidateError> {
    let max = if extended != 0 {
        limits.can_ext_id_max
    } else {
        limits.can_std_id_max
    };
    if can_id > max {
        err(ErrorCode::InvalidCanId, "can_id", can_id as i32, 0, max as i32)
    } else {
        Ok(())
    }
}

/// Validate one channel entry.
///
/// Pure and side-effect free: the same inputs always produce the same
/// verdict, on host or device.
pub fn validate(
    header: &EntryHeader,
    config: &ChannelConfig,
    name: &ChannelName,
    limits: &Limits,
) -> Result<(), ValidateError> {
    validate_header(header, limits)?;

    if name.len() > limits.name_max {
        err(
            ErrorCode::NameTooLong,
            "name",
            name.len() as i32,
            0,
            limits.name_max as i32,
        )?;
    }

    if config.kind() != header.kind {
        err(
            ErrorCode::InvalidKind,
            "kind",
            config.kind() as u8 as i32,
            header.kind as u8 as i32,
            header.kind as u8 as i32,
        )?;
    }

    match config {
        ChannelConfig::System => err(
            ErrorCode::InvalidKind,
            "kind",
            ChannelKind::System as u8 as i32,
            ChannelKind::DigitalIn as u8 as i32,
            ChannelKind::Hysteresis as u8 as i32,
        ),
        ChannelConfig::DigitalIn(c) => validate_digital_in(c, limits),
        ChannelConfig::AnalogIn(c) => validate_analog_in(c, limits),
        ChannelConfig::FrequencyIn(c) => validate_frequency_in(c),
        ChannelConfig::CanIn(c) => validate_can_in(c, limits),
        ChannelConfig::PowerOut(c) => validate_power_out(c, limits),
        ChannelConfig::PwmOut(c) => validate_pwm_out(c, limits),
        ChannelConfig::HBridge(c) => validate_h_bridge(c, limits),
        ChannelConfig::CanOut(c) => validate_can_out(c, limits),
        ChannelConfig::Timer(c) => validate_timer(c),
        ChannelConfig::Logic(c) => validate_logic(c),
        ChannelConfig::Math(c) => validate_math(c),
        ChannelConfig::Table2d(c) => validate_table_2d(c),
        ChannelConfig::Table3d(c) => validate_table_3d(c),
        ChannelConfig::Filter(c) => validate_filter(c, limits),
        ChannelConfig::Pid(c) => validate_pid(c),
        ChannelConfig::Number(c) => validate_number(c),
        ChannelConfig::Switch(c) => validate_switch(c),
        ChannelConfig::Counter(c) => validate_counter(c),
        ChannelConfig::FlipFlop(c) => validate_flip_flop(c),
        ChannelConfig::Hysteresis(c) => validate_hysteresis(c),
    }
}

fn validate_header(header: &EntryHeader, _limits: &Limits) -> Result<(), ValidateError> {
    let id = header.id;
    if !channel::is_valid_id(id) {
        return err(
            ErrorCode::InvalidId,
            "id",
            id as i32,
            channel::INPUT_ID_MIN as i32,
            channel::SYSTEM_ID_MAX as i32,
        );
    }

    // hardware-bound kinds must sit in their reserved id range
    let (ok, min, max) = if header.kind.is_input() {
        (
            channel::is_input_id(id),
            channel::INPUT_ID_MIN,
            channel::INPUT_ID_MAX,
        )
    } else if header.kind.is_output() {
        (
            channel::is_output_id(id),
            channel::OUTPUT_ID_MIN,
            channel::OUTPUT_ID_MAX,
        )
    } else if header.kind.is_computed() {
        (
            channel::is_virtual_id(id),
            channel::VIRTUAL_ID_MIN,
            channel::VIRTUAL_ID_MAX,
        )
    } else {
        (
            channel::is_system_id(id),
            channel::SYSTEM_ID_MIN,
            channel::SYSTEM_ID_MAX,
        )
    };
    if !ok {
        return err(ErrorCode::InvalidId, "id", id as i32, min as i32, max as i32);
    }

    check_ref("source_id", header.source_id)?;

    match header.kind {
        ChannelKind::DigitalIn => check_hw_index("hw_index", header.hw_index, NUM_DIGITAL_INPUTS),
        ChannelKind::AnalogIn => check_hw_index("hw_index", header.hw_index, NUM_ANALOG_INPUTS),
        ChannelKind::FrequencyIn => {
            check_hw_index("hw_index", header.hw_index, NUM_FREQUENCY_INPUTS)
        }
        ChannelKind::PowerOut | ChannelKind::PwmOut => {
            check_hw_index("hw_index", header.hw_index, NUM_POWER_OUTPUTS)
        }
        ChannelKind::HBridge => check_hw_index("hw_index", header.hw_index, NUM_HBRIDGES),
        ChannelKind::CanIn | ChannelKind::CanOut => Ok(()),
        _ => Ok(()),
    }
}

fn validate_digital_in(c: &DigitalInConfig, limits: &Limits) -> Result<(), ValidateError> {
    if c.debounce_ms > limits.debounce_max_ms {
        return err(
            ErrorCode::InvalidDebounce,
            "debounce_ms",
            c.debounce_ms as i32,
            0,
            limits.debounce_max_ms as i32,
        );
    }
    Ok(())
}

fn validate_analog_in(c: &AnalogInConfig, limits: &Limits) -> Result<(), ValidateError> {
    if c.raw_min >= c.raw_max {
        return err(ErrorCode::InvalidBounds, "raw_max", c.raw_max, c.raw_min + 1, i32::MAX);
    }
    if c.filter_ms > limits.filter_ms_max {
        return err(
            ErrorCode::InvalidFilterMs,
            "filter_ms",
            c.filter_ms as i32,
            0,
            limits.filter_ms_max as i32,
        );
    }
    if c.sample_count == 0 || c.sample_count > limits.sample_count_max {
        return err(
            ErrorCode::ValueOutOfRange,
            "sample_count",
            c.sample_count as i32,
            1,
            limits.sample_count_max as i32,
        );
    }
    Ok(())
}

fn validate_frequency_in(c: &FrequencyInConfig) -> Result<(), ValidateError> {
    if c.min_hz >= c.max_hz {
        return err(
            ErrorCode::InvalidBounds,
            "max_hz",
            c.max_hz as i32,
            c.min_hz as i32 + 1,
            i32::MAX,
        );
    }
    if c.pulses_per_rev == 0 {
        return err(ErrorCode::ValueOutOfRange, "pulses_per_rev", 0, 1, u8::MAX as i32);
    }
    if c.scale_den == 0 {
        return err(ErrorCode::ZeroDivisor, "scale_den", 0, 1, i32::MAX);
    }
    Ok(())
}

fn validate_can_in(c: &CanInConfig, limits: &Limits) -> Result<(), ValidateError> {
    if c.bus as usize >= NUM_CAN_BUSES {
        return err(
            ErrorCode::InvalidCanBus,
            "bus",
            c.bus as i32,
            0,
            NUM_CAN_BUSES as i32 - 1,
        );
    }
    check_can_id(limits, c.can_id, c.extended)?;
    if c.bit_length == 0 || c.bit_length > 32 {
        return err(ErrorCode::InvalidBitPlacement, "bit_length", c.bit_length as i32, 1, 32);
    }
    if c.start_bit as u32 + c.bit_length as u32 > 64 {
        return err(
            ErrorCode::InvalidBitPlacement,
            "start_bit",
            c.start_bit as i32,
            0,
            64 - c.bit_length as i32,
        );
    }
    if c.scale_den == 0 {
        return err(ErrorCode::ZeroDivisor, "scale_den", 0, 1, i16::MAX as i32);
    }
    Ok(())
}

fn validate_power_out(c: &PowerOutConfig, limits: &Limits) -> Result<(), ValidateError> {
    if c.pwm_freq_hz < limits.min_pwm_freq_hz || c.pwm_freq_hz > limits.max_pwm_freq_hz {
        return err(
            ErrorCode::InvalidPwmFrequency,
            "pwm_freq_hz",
            c.pwm_freq_hz as i32,
            limits.min_pwm_freq_hz as i32,
            limits.max_pwm_freq_hz as i32,
        );
    }
    if c.current_limit_ma == 0 {
        return err(ErrorCode::ValueOutOfRange, "current_limit_ma", 0, 1, u16::MAX as i32);
    }
    if c.flags.contains(PowerOutFlags::INRUSH_ENABLE) && c.inrush_limit_ma < c.current_limit_ma {
        return err(
            ErrorCode::InvalidBounds,
            "inrush_limit_ma",
            c.inrush_limit_ma as i32,
            c.current_limit_ma as i32,
            u16::MAX as i32,
        );
    }
    Ok(())
}

fn validate_pwm_out(c: &PwmOutConfig, limits: &Limits) -> Result<(), ValidateError> {
    if c.freq_hz < limits.min_pwm_freq_hz || c.freq_hz > limits.max_pwm_freq_hz {
        return err(
            ErrorCode::InvalidPwmFrequency,
            "freq_hz",
            c.freq_hz as i32,
            limits.min_pwm_freq_hz as i32,
            limits.max_pwm_freq_hz as i32,
        );
    }
    if c.duty_max as i32 > DUTY_FULL_SCALE || c.duty_min > c.duty_max {
        return err(
            ErrorCode::InvalidDutyRange,
            "duty_max",
            c.duty_max as i32,
            c.duty_min as i32,
            DUTY_FULL_SCALE,
        );
    }
    if c.duty_default < c.duty_min || c.duty_default > c.duty_max {
        return err(
            ErrorCode::InvalidDutyRange,
            "duty_default",
            c.duty_default as i32,
            c.duty_min as i32,
            c.duty_max as i32,
        );
    }
    Ok(())
}

fn validate_h_bridge(c: &HBridgeConfig, limits: &Limits) -> Result<(), ValidateError> {
    if c.pwm_freq_hz < limits.min_pwm_freq_hz || c.pwm_freq_hz > limits.max_pwm_freq_hz {
        return err(
            ErrorCode::InvalidPwmFrequency,
            "pwm_freq_hz",
            c.pwm_freq_hz as i32,
            limits.min_pwm_freq_hz as i32,
            limits.max_pwm_freq_hz as i32,
        );
    }
    if c.deadband as i32 > DUTY_FULL_SCALE {
        return err(ErrorCode::ValueOutOfRange, "deadband", c.deadband as i32, 0, DUTY_FULL_SCALE);
    }
    if c.current_limit_ma == 0 {
        return err(ErrorCode::ValueOutOfRange, "current_limit_ma", 0, 1, u16::MAX as i32);
    }
    Ok(())
}

fn validate_can_out(c: &CanOutConfig, limits: &Limits) -> Result<(), ValidateError> {
    if c.bus as usize >= NUM_CAN_BUSES {
        return err(
            ErrorCode::InvalidCanBus,
            "bus",
            c.bus as i32,
            0,
            NUM_CAN_BUSES as i32 - 1,
        );
    }
    check_can_id(limits, c.can_id, c.extended)?;
    if c.dlc == 0 || c.dlc > 8 {
        return err(ErrorCode::InvalidDlc, "dlc", c.dlc as i32, 1, 8);
    }
    if c.bit_length == 0 || c.bit_length > 32 {
        return err(ErrorCode::InvalidBitPlacement, "bit_length", c.bit_length as i32, 1, 32);
    }
    if c.start_bit as u32 + c.bit_length as u32 > c.dlc as u32 * 8 {
        return err(
            ErrorCode::InvalidBitPlacement,
            "start_bit",
            c.start_bit as i32,
            0,
            c.dlc as i32 * 8 - c.bit_length as i32,
        );
    }
    if c.scale_den == 0 {
        return err(ErrorCode::ZeroDivisor, "scale_den", 0, 1, i16::MAX as i32);
    }
    if c.period_ms == 0 {
        return err(ErrorCode::ValueOutOfRange, "period_ms", 0, 1, u16::MAX as i32);
    }
    Ok(())
}

fn validate_timer(c: &TimerConfig) -> Result<(), ValidateError> {
    check_required_ref("trigger_id", c.trigger_id)?;
    match c.mode {
        TimerMode::Blink => {
            if c.on_ms == 0 {
                return err(ErrorCode::ValueOutOfRange, "on_ms", 0, 1, u16::MAX as i32);
            }
            if c.off_ms == 0 {
                return err(ErrorCode::ValueOutOfRange, "off_ms", 0, 1, u16::MAX as i32);
            }
        }
        _ => {
            if c.delay_ms == 0 {
                return err(ErrorCode::ValueOutOfRange, "delay_ms", 0, 1, i32::MAX);
            }
        }
    }
    Ok(())
}

fn node_min_inputs_logic(op: LogicOp) -> u8 {
    match op {
        LogicOp::And | LogicOp::Or | LogicOp::Xor | LogicOp::Nand | LogicOp::Nor => 2,
        LogicOp::InRange | LogicOp::OutsideRange => 2,
        _ => 1,
    }
}

fn validate_logic(c: &LogicConfig) -> Result<(), ValidateError> {
    let min = node_min_inputs_logic(c.op);
    if c.input_count < min {
        return err(
            ErrorCode::InsufficientInputs,
            "input_count",
            c.input_count as i32,
            min as i32,
            NODE_MAX_INPUTS as i32,
        );
    }
    if c.input_count as usize > NODE_MAX_INPUTS {
        return err(
            ErrorCode::ValueOutOfRange,
            "input_count",
            c.input_count as i32,
            min as i32,
            NODE_MAX_INPUTS as i32,
        );
    }
    for i in 0..c.input_count as usize {
        check_required_ref("inputs", c.inputs[i])?;
    }
    Ok(())
}

fn node_min_inputs_math(op: MathOp) -> u8 {
    match op {
        MathOp::Sub | MathOp::Div | MathOp::Min | MathOp::Max | MathOp::Avg | MathOp::Lerp => 2,
        _ => 1,
    }
}

fn validate_math(c: &MathConfig) -> Result<(), ValidateError> {
    let min = node_min_inputs_math(c.op);
    if c.input_count < min {
        return err(
            ErrorCode::InsufficientInputs,
            "input_count",
            c.input_count as i32,
            min as i32,
            NODE_MAX_INPUTS as i32,
        );
    }
    if c.input_count as usize > NODE_MAX_INPUTS {
        return err(
            ErrorCode::ValueOutOfRange,
            "input_count",
            c.input_count as i32,
            min as i32,
            NODE_MAX_INPUTS as i32,
        );
    }
    for i in 0..c.input_count as usize {
        check_required_ref("inputs", c.inputs[i])?;
    }
    if c.scale_den == 0 {
        return err(ErrorCode::ZeroDivisor, "scale_den", 0, 1, i8::MAX as i32);
    }
    if c.clamp_min > c.clamp_max {
        return err(ErrorCode::InvalidBounds, "clamp_max", c.clamp_max, c.clamp_min, i32::MAX);
    }
    Ok(())
}

fn validate_table_2d(c: &Table2dConfig) -> Result<(), ValidateError> {
    check_required_ref("input_id", c.input_id)?;
    if c.point_count < 2 || c.point_count as usize > TABLE2D_MAX_POINTS {
        return err(
            ErrorCode::ValueOutOfRange,
            "point_count",
            c.point_count as i32,
            2,
            TABLE2D_MAX_POINTS as i32,
        );
    }
    check_ascending("x", &c.x, c.point_count as usize)
}

fn validate_table_3d(c: &Table3dConfig) -> Result<(), ValidateError> {
    check_required_ref("input_x", c.input_x)?;
    check_required_ref("input_y", c.input_y)?;
    if c.x_size < 2 || c.x_size as usize > TABLE3D_MAX_POINTS {
        return err(
            ErrorCode::ValueOutOfRange,
            "x_size",
            c.x_size as i32,
            2,
            TABLE3D_MAX_POINTS as i32,
        );
    }
    if c.y_size < 2 || c.y_size as usize > TABLE3D_MAX_POINTS {
        return err(
            ErrorCode::ValueOutOfRange,
            "y_size",
            c.y_size as i32,
            2,
            TABLE3D_MAX_POINTS as i32,
        );
    }
    check_ascending("x", &c.x, c.x_size as usize)?;
    check_ascending("y", &c.y, c.y_size as usize)
}

fn validate_filter(c: &FilterConfig, limits: &Limits) -> Result<(), ValidateError> {
    check_required_ref("input_id", c.input_id)?;
    match c.kind {
        FilterKind::Sma | FilterKind::Median => {
            if c.window_size == 0 || c.window_size > limits.filter_window_max {
                return err(
                    ErrorCode::InvalidFilterWindow,
                    "window_size",
                    c.window_size as i32,
                    1,
                    limits.filter_window_max as i32,
                );
            }
        }
        FilterKind::Ema => {
            if c.alpha == 0 {
                return err(ErrorCode::ValueOutOfRange, "alpha", 0, 1, u8::MAX as i32);
            }
        }
        FilterKind::Lpf | FilterKind::RateLimit | FilterKind::Debounce => {
            if c.time_const_ms == 0 {
                return err(
                    ErrorCode::InvalidFilterMs,
                    "time_const_ms",
                    0,
                    1,
                    limits.filter_ms_max as i32,
                );
            }
        }
    }
    if c.time_const_ms > limits.filter_ms_max {
        return err(
            ErrorCode::InvalidFilterMs,
            "time_const_ms",
            c.time_const_ms as i32,
            0,
            limits.filter_ms_max as i32,
        );
    }
    Ok(())
}

fn validate_pid(c: &PidConfig) -> Result<(), ValidateError> {
    check_required_ref("setpoint_id", c.setpoint_id)?;
    check_required_ref("feedback_id", c.feedback_id)?;
    if c.output_min >= c.output_max {
        return err(
            ErrorCode::InvalidBounds,
            "output_max",
            c.output_max as i32,
            c.output_min as i32 + 1,
            i16::MAX as i32,
        );
    }
    if c.integral_min >= c.integral_max {
        return err(
            ErrorCode::InvalidBounds,
            "integral_max",
            c.integral_max as i32,
            c.integral_min as i32 + 1,
            i16::MAX as i32,
        );
    }
    Ok(())
}

fn validate_number(c: &NumberConfig) -> Result<(), ValidateError> {
    if c.min > c.max {
        return err(ErrorCode::InvalidBounds, "max", c.max, c.min, i32::MAX);
    }
    if c.value < c.min || c.value > c.max {
        return err(ErrorCode::ValueOutOfRange, "value", c.value, c.min, c.max);
    }
    if c.step <= 0 {
        return err(ErrorCode::ValueOutOfRange, "step", c.step, 1, i32::MAX);
    }
    Ok(())
}

fn validate_switch(c: &SwitchConfig) -> Result<(), ValidateError> {
    check_required_ref("selector_id", c.selector_id)?;
    if c.case_count == 0 {
        return err(ErrorCode::NoCases, "case_count", 0, 1, SWITCH_MAX_CASES as i32);
    }
    if c.case_count as usize > SWITCH_MAX_CASES {
        return err(
            ErrorCode::ValueOutOfRange,
            "case_count",
            c.case_count as i32,
            1,
            SWITCH_MAX_CASES as i32,
        );
    }
    if c.mode == SwitchMode::RangeMatch {
        for i in 0..c.case_count as usize {
            let case = &c.cases[i];
            if case.match_value > case.max_value {
                return err(
                    ErrorCode::InvalidBounds,
                    "cases",
                    case.max_value,
                    case.match_value,
                    i32::MAX,
                );
            }
        }
    }
    Ok(())
}

fn validate_counter(c: &CounterConfig) -> Result<(), ValidateError> {
    if c.increment_id == CH_REF_NONE && c.decrement_id == CH_REF_NONE {
        return err(ErrorCode::NoTriggers, "increment_id", CH_REF_NONE as i32, 1, 1023);
    }
    check_ref("increment_id", c.increment_id)?;
    check_ref("decrement_id", c.decrement_id)?;
    check_ref("reset_id", c.reset_id)?;
    if c.min >= c.max {
        return err(
            ErrorCode::InvalidBounds,
            "max",
            c.max as i32,
            c.min as i32 + 1,
            i16::MAX as i32,
        );
    }
    if c.initial < c.min || c.initial > c.max {
        return err(
            ErrorCode::ValueOutOfRange,
            "initial",
            c.initial as i32,
            c.min as i32,
            c.max as i32,
        );
    }
    if c.step <= 0 {
        return err(ErrorCode::ValueOutOfRange, "step", c.step as i32, 1, i16::MAX as i32);
    }
    Ok(())
}

fn validate_flip_flop(c: &FlipFlopConfig) -> Result<(), ValidateError> {
    check_ref("set_id", c.set_id)?;
    check_ref("reset_id", c.reset_id)?;
    check_ref("clock_id", c.clock_id)?;
    check_ref("enable_id", c.enable_id)?;
    match c.kind {
        FlipFlopKind::D | FlipFlopKind::T | FlipFlopKind::Jk => {
            check_required_ref("clock_id", c.clock_id)
        }
        FlipFlopKind::Sr | FlipFlopKind::SrLatch => {
            if c.set_id == CH_REF_NONE && c.reset_id == CH_REF_NONE {
                return err(ErrorCode::NoTriggers, "set_id", CH_REF_NONE as i32, 1, 1023);
            }
            Ok(())
        }
        FlipFlopKind::DLatch => check_required_ref("set_id", c.set_id),
    }
}

fn validate_hysteresis(c: &HysteresisConfig) -> Result<(), ValidateError> {
    check_required_ref("input_id", c.input_id)?;
    if c.threshold_low >= c.threshold_high {
        return err(
            ErrorCode::InvalidBounds,
            "threshold_high",
            c.threshold_high,
            c.threshold_low + 1,
            i32::MAX,
        );
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::ChannelFlags;

    fn header(id: u16, kind: ChannelKind) -> EntryHeader {
        EntryHeader {
            id,
            kind,
            flags: ChannelFlags::ENABLED,
            hw_device: 0,
            hw_index: 0,
            source_id: CH_REF_NONE,
            default_value: 0,
        }
    }

    fn check(
        id: u16,
        config: ChannelConfig,
        expect: Result<(), (ErrorCode, &'static str, i32)>,
    ) {
        let h = header(id, config.kind());
        let name = ChannelName::new_empty();
        let result = validate(&h, &config, &name, &Limits::default());
        match expect {
            Ok(()) => assert!(result.is_ok(), "unexpected {:?}", result),
            Err((code, field, actual)) => {
                let e = result.expect_err("expected a validation error");
                assert_eq!((e.code, e.field, e.actual), (code, field, actual));
            }
        }
    }

    #[test]
    fn id_range_enforced_per_kind() {
        check(
            300,
            ChannelConfig::DigitalIn(DigitalInConfig::default()),
            Err((ErrorCode::InvalidId, "id", 300)),
        );
        check(
            5,
            ChannelConfig::Logic(LogicConfig {
                op: LogicOp::Not,
                input_count: 1,
                inputs: [1; NODE_MAX_INPUTS],
                ..Default::default()
            }),
            Err((ErrorCode::InvalidId, "id", 5)),
        );
        check(
            150,
            ChannelConfig::PowerOut(PowerOutConfig::default()),
            Ok(()),
        );
    }

    #[test]
    fn debounce_bounds() {
        check(
            5,
            ChannelConfig::DigitalIn(DigitalInConfig {
                debounce_ms: 10_001,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidDebounce, "debounce_ms", 10_001)),
        );
    }

    #[test]
    fn can_id_width() {
        check(
            20,
            ChannelConfig::CanIn(CanInConfig {
                can_id: 0x800,
                extended: 0,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidCanId, "can_id", 0x800)),
        );
        check(
            20,
            ChannelConfig::CanIn(CanInConfig {
                can_id: 0x800,
                extended: 1,
                ..Default::default()
            }),
            Ok(()),
        );
    }

    #[test]
    fn can_out_dlc_and_placement() {
        check(
            110,
            ChannelConfig::CanOut(CanOutConfig {
                dlc: 9,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidDlc, "dlc", 9)),
        );
        check(
            110,
            ChannelConfig::CanOut(CanOutConfig {
                dlc: 2,
                start_bit: 8,
                bit_length: 16,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidBitPlacement, "start_bit", 8)),
        );
    }

    #[test]
    fn zero_divisor_rejected() {
        check(
            20,
            ChannelConfig::CanIn(CanInConfig {
                scale_den: 0,
                ..Default::default()
            }),
            Err((ErrorCode::ZeroDivisor, "scale_den", 0)),
        );
        check(
            210,
            ChannelConfig::Math(MathConfig {
                op: MathOp::Add,
                input_count: 1,
                inputs: [10; NODE_MAX_INPUTS],
                scale_den: 0,
                ..Default::default()
            }),
            Err((ErrorCode::ZeroDivisor, "scale_den", 0)),
        );
    }

    #[test]
    fn pwm_frequency_window() {
        check(
            120,
            ChannelConfig::PwmOut(PwmOutConfig {
                freq_hz: 5,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidPwmFrequency, "freq_hz", 5)),
        );
        check(
            120,
            ChannelConfig::PwmOut(PwmOutConfig {
                freq_hz: 30_000,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidPwmFrequency, "freq_hz", 30_000)),
        );
    }

    #[test]
    fn duty_range() {
        check(
            120,
            ChannelConfig::PwmOut(PwmOutConfig {
                duty_min: 5000,
                duty_max: 4000,
                duty_default: 4500,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidDutyRange, "duty_max", 4000)),
        );
        check(
            120,
            ChannelConfig::PwmOut(PwmOutConfig {
                duty_min: 1000,
                duty_max: 9000,
                duty_default: 9500,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidDutyRange, "duty_default", 9500)),
        );
    }

    #[test]
    fn logic_input_counts() {
        check(
            210,
            ChannelConfig::Logic(LogicConfig {
                op: LogicOp::And,
                input_count: 1,
                inputs: [1; NODE_MAX_INPUTS],
                ..Default::default()
            }),
            Err((ErrorCode::InsufficientInputs, "input_count", 1)),
        );
        check(
            210,
            ChannelConfig::Logic(LogicConfig {
                op: LogicOp::Not,
                input_count: 1,
                inputs: [1; NODE_MAX_INPUTS],
                ..Default::default()
            }),
            Ok(()),
        );
    }

    #[test]
    fn table_axes_monotonic() {
        let mut c = Table2dConfig {
            input_id: 10,
            point_count: 4,
            ..Default::default()
        };
        c.x[..4].copy_from_slice(&[0, 10, 10, 30]);
        check(
            220,
            ChannelConfig::Table2d(c),
            Err((ErrorCode::NonMonotonicAxis, "x", 10)),
        );
    }

    #[test]
    fn filter_window_by_kind() {
        check(
            230,
            ChannelConfig::Filter(FilterConfig {
                input_id: 10,
                kind: FilterKind::Sma,
                window_size: 0,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidFilterWindow, "window_size", 0)),
        );
        check(
            230,
            ChannelConfig::Filter(FilterConfig {
                input_id: 10,
                kind: FilterKind::Lpf,
                time_const_ms: 0,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidFilterMs, "time_const_ms", 0)),
        );
    }

    #[test]
    fn pid_bound_inversion() {
        check(
            240,
            ChannelConfig::Pid(PidConfig {
                setpoint_id: 200,
                feedback_id: 10,
                output_min: 1000,
                output_max: 1000,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidBounds, "output_max", 1000)),
        );
    }

    #[test]
    fn counter_needs_triggers() {
        check(
            250,
            ChannelConfig::Counter(CounterConfig::default()),
            Err((ErrorCode::NoTriggers, "increment_id", CH_REF_NONE as i32)),
        );
    }

    #[test]
    fn switch_needs_cases() {
        check(
            260,
            ChannelConfig::Switch(SwitchConfig {
                selector_id: 10,
                case_count: 0,
                ..Default::default()
            }),
            Err((ErrorCode::NoCases, "case_count", 0)),
        );
    }

    #[test]
    fn number_value_within_own_bounds() {
        check(
            270,
            ChannelConfig::Number(NumberConfig {
                value: 11,
                min: 0,
                max: 10,
                ..Default::default()
            }),
            Err((ErrorCode::ValueOutOfRange, "value", 11)),
        );
    }

    #[test]
    fn hysteresis_threshold_order() {
        check(
            280,
            ChannelConfig::Hysteresis(HysteresisConfig {
                input_id: 10,
                threshold_high: 75,
                threshold_low: 85,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidBounds, "threshold_high", 75)),
        );
    }

    #[test]
    fn flip_flop_clock_required() {
        check(
            290,
            ChannelConfig::FlipFlop(FlipFlopConfig {
                kind: FlipFlopKind::D,
                set_id: 10,
                ..Default::default()
            }),
            Err((ErrorCode::InvalidSourceId, "clock_id", CH_REF_NONE as i32)),
        );
    }

    #[test]
    fn invalid_reference_rejected() {
        check(
            210,
            ChannelConfig::Logic(LogicConfig {
                op: LogicOp::Not,
                input_count: 1,
                inputs: [1024; NODE_MAX_INPUTS],
                ..Default::default()
            }),
            Err((ErrorCode::InvalidSourceId, "inputs", 1024)),
        );
    }
}
