//! Shared helpers for blob-file commands.

use pmu30lib::channel::ChannelKind;
use pmu30lib::config::ChannelConfig;
use pmu30lib::hardware;

/// Read a blob file, unwrapping a flash image if the file is one.
pub fn load_blob(path: &str) -> anyhow::Result<Vec<u8>> {
    let raw = std::fs::read(path)?;

    match hardware::decode_image(&raw) {
        Ok(blob) => Ok(blob.to_vec()),
        // not a flash image, take the file as a bare blob
        Err(_) => Ok(raw),
    }
}

pub fn kind_name(kind: ChannelKind) -> &'static str {
    use ChannelKind::*;
    match kind {
        DigitalIn => "digital input",
        AnalogIn => "analog input",
        FrequencyIn => "frequency input",
        CanIn => "CAN input",
        PowerOut => "power output",
        PwmOut => "PWM output",
        HBridge => "H-bridge",
        CanOut => "CAN output",
        Timer => "timer",
        Logic => "logic",
        Math => "math",
        Table2d => "table 2D",
        Table3d => "table 3D",
        Filter => "filter",
        Pid => "PID",
        Number => "number",
        Switch => "switch",
        Counter => "counter",
        FlipFlop => "flip-flop",
        Hysteresis => "hysteresis",
        System => "system",
    }
}

/// A one-line summary of the interesting fields of a record.
pub fn config_summary(config: &ChannelConfig) -> String {
    match config {
        ChannelConfig::System => String::new(),
        ChannelConfig::DigitalIn(c) => format!(
            "active {}, debounce {} ms",
            if c.active_level != 0 { "high" } else { "low" },
            c.debounce_ms
        ),
        ChannelConfig::AnalogIn(c) => format!(
            "raw {}..{} -> {}..{}, filter {:?}",
            c.raw_min, c.raw_max, c.scaled_min, c.scaled_max, c.filter_kind
        ),
        ChannelConfig::FrequencyIn(c) => format!(
            "{}..{} Hz, {} pulses/rev, scale {}/{}",
            c.min_hz, c.max_hz, c.pulses_per_rev, c.scale_num, c.scale_den
        ),
        ChannelConfig::CanIn(c) => format!(
            "id {:#x} bus {}, bits {}+{}, timeout {} ms",
            c.can_id, c.bus, c.start_bit, c.bit_length, c.timeout_ms
        ),
        ChannelConfig::PowerOut(c) => format!(
            "limit {} mA, inrush {} mA/{} ms, {} retries",
            c.current_limit_ma, c.inrush_limit_ma, c.inrush_window_ms, c.retry_count
        ),
        ChannelConfig::PwmOut(c) => format!(
            "{} Hz, duty {}..{}, default {}",
            c.freq_hz, c.duty_min, c.duty_max, c.duty_default
        ),
        ChannelConfig::HBridge(c) => format!(
            "{} Hz, limit {} mA, accel {}/s decel {}/s",
            c.pwm_freq_hz, c.current_limit_ma, c.accel_rate, c.decel_rate
        ),
        ChannelConfig::CanOut(c) => format!(
            "id {:#x} bus {}, dlc {}, every {} ms",
            c.can_id, c.bus, c.dlc, c.period_ms
        ),
        ChannelConfig::Timer(c) => format!(
            "{:?}/{:?}, trigger {}, delay {} ms",
            c.mode, c.trigger_mode, c.trigger_id, c.delay_ms
        ),
        ChannelConfig::Logic(c) => format!(
            "{:?} over {} inputs{}",
            c.op,
            c.input_count,
            if c.invert_output != 0 { ", inverted" } else { "" }
        ),
        ChannelConfig::Math(c) => format!(
            "{:?} over {} inputs, scale {}/{}",
            c.op, c.input_count, c.scale_num, c.scale_den
        ),
        ChannelConfig::Table2d(c) => {
            format!("input {}, {} points", c.input_id, c.point_count)
        }
        ChannelConfig::Table3d(c) => format!(
            "inputs {}/{}, {}x{} points",
            c.input_x, c.input_y, c.x_size, c.y_size
        ),
        ChannelConfig::Filter(c) => format!(
            "{:?} of {}, window {}, tau {} ms",
            c.kind, c.input_id, c.window_size, c.time_const_ms
        ),
        ChannelConfig::Pid(c) => format!(
            "sp {} fb {}, kp {} ki {} kd {}, out {}..{}",
            c.setpoint_id, c.feedback_id, c.kp, c.ki, c.kd, c.output_min, c.output_max
        ),
        ChannelConfig::Number(c) => format!(
            "{} in {}..{} step {}{}",
            c.value,
            c.min,
            c.max,
            c.step,
            if c.persist != 0 { ", persisted" } else { "" }
        ),
        ChannelConfig::Switch(c) => format!(
            "{:?} on {}, {} cases, default {}",
            c.mode, c.selector_id, c.case_count, c.default
        ),
        ChannelConfig::Counter(c) => format!(
            "inc {} dec {} reset {}, {}..{}",
            c.increment_id, c.decrement_id, c.reset_id, c.min, c.max
        ),
        ChannelConfig::FlipFlop(c) => {
            format!("{:?}, set {} reset {} clock {}", c.kind, c.set_id, c.reset_id, c.clock_id)
        }
        ChannelConfig::Hysteresis(c) => format!(
            "{:?} of {}, low {} high {}",
            c.kind, c.input_id, c.threshold_low, c.threshold_high
        ),
    }
}
