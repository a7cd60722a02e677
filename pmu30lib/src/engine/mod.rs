//! Per-channel workspaces and the single-threaded executor.

pub mod counter;
pub mod filter;
pub mod flipflop;
pub mod hysteresis;
pub mod logic;
pub mod math;
pub mod pid;
pub mod table;
pub mod timer;

use crate::channel::{ChannelFlags, CH_REF_NONE};
use crate::config::records::*;
use crate::config::ChannelConfig;
use crate::hardware::{Hardware, HwDevice};
use crate::registry::Registry;

use counter::CounterState;
use filter::{Debounce, FilterState, RateLimit};
use flipflop::FlipFlopState;
use hysteresis::HysteresisState;
use pid::PidState;
use timer::TimerState;

/// Per-channel mutable state for stateful kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Workspace {
    None,
    Filter(FilterState),
    Timer(TimerState),
    Pid(PidState),
    Counter(CounterState),
    FlipFlop(FlipFlopState),
    Hysteresis(HysteresisState),
}

impl Workspace {
    /// Fresh workspace for a channel configuration.
    pub fn for_config(config: &ChannelConfig) -> Self {
        match config {
            ChannelConfig::DigitalIn(_) => Self::Filter(FilterState::Debounce(Debounce::new())),
            ChannelConfig::AnalogIn(c) => Self::Filter(FilterState::new(c.filter_kind)),
            ChannelConfig::Filter(c) => Self::Filter(FilterState::new(c.kind)),
            ChannelConfig::HBridge(_) => Self::Filter(FilterState::RateLimit(RateLimit::new())),
            ChannelConfig::Timer(_) => Self::Timer(TimerState::new()),
            ChannelConfig::Pid(_) => Self::Pid(PidState::new()),
            ChannelConfig::Counter(c) => Self::Counter(CounterState::new(c)),
            ChannelConfig::FlipFlop(c) => Self::FlipFlop(FlipFlopState::new(c)),
            ChannelConfig::Hysteresis(_) => Self::Hysteresis(HysteresisState::new()),
            _ => Self::None,
        }
    }

    /// Forget all history, as if the channel were just created.
    pub fn reset(&mut self, config: &ChannelConfig) {
        match (self, config) {
            (Self::Filter(s), _) => s.reset(),
            (Self::Timer(s), _) => s.reset(),
            (Self::Pid(s), _) => s.reset(),
            (Self::Counter(s), ChannelConfig::Counter(c)) => s.reset(c),
            (Self::FlipFlop(s), ChannelConfig::FlipFlop(c)) => s.reset(c),
            (Self::Hysteresis(s), _) => s.reset(),
            _ => {}
        }
    }
}

/// The cooperative, single-threaded evaluator.
///
/// One [pass][Executor::pass] reads hardware inputs, evaluates every
/// computed channel in registration order, and routes output channels
/// to the hardware writer. A pass runs to completion; evaluation never
/// aborts, unresolved inputs read as zero.
pub struct Executor {
    last_ms: u32,
    dt_ms: u32,
    primed: bool,
    pass_count: u32,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            last_ms: 0,
            dt_ms: 0,
            primed: false,
            pass_count: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Delta-time of the most recent pass.
    pub fn dt_ms(&self) -> u32 {
        self.dt_ms
    }

    pub fn pass_count(&self) -> u32 {
        self.pass_count
    }

    /// Run one full pass at monotonic time `now_ms`.
    pub fn pass<H: Hardware>(&mut self, registry: &mut Registry, hw: &mut H, now_ms: u32) {
        // dt saturates to zero on the first pass
        let dt = if self.primed {
            now_ms.wrapping_sub(self.last_ms)
        } else {
            0
        };
        self.last_ms = now_ms;
        self.dt_ms = dt;
        self.primed = true;
        self.pass_count = self.pass_count.wrapping_add(1);

        let len = registry.len();
        for at in 0..len {
            run_input(registry, hw, at, dt);
        }
        for at in 0..len {
            run_computed(registry, at, dt);
        }
        for at in 0..len {
            run_output(registry, hw, at, dt);
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

fn runnable(registry: &Registry, at: usize) -> Option<(crate::channel::Channel, ChannelConfig)> {
    let slot = registry.slot_at(at)?;
    let ch = slot.channel;
    if !ch.is_enabled() || ch.flags.contains(ChannelFlags::FAULT) {
        return None;
    }
    Some((ch, slot.config))
}

fn store(registry: &mut Registry, at: usize, value: i32) {
    if let Some(slot) = registry.slot_at_mut(at) {
        slot.channel.set_value(value);
    }
}

fn rational(value: i64, num: i64, den: i64) -> i64 {
    if den == 0 {
        value
    } else {
        value * num / den
    }
}

fn run_input<H: Hardware>(registry: &mut Registry, hw: &mut H, at: usize, dt: u32) {
    let Some((ch, config)) = runnable(registry, at) else {
        return;
    };
    if !ch.kind.is_input() {
        return;
    }

    let raw = hw.read_input(HwDevice::for_kind(ch.kind), ch.hw_index);
    let inverted = ch.flags.contains(ChannelFlags::INVERTED);

    let value = match config {
        ChannelConfig::DigitalIn(c) => {
            let mut level = raw != 0;
            if c.active_level == 0 {
                level = !level;
            }
            if inverted {
                level = !level;
            }

            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            match &mut slot.workspace {
                Workspace::Filter(FilterState::Debounce(d)) => {
                    d.update(c.debounce_ms as u32, 0, level as i32, dt)
                }
                _ => level as i32,
            }
        }

        ChannelConfig::AnalogIn(c) => {
            let span = c.raw_max as i64 - c.raw_min as i64;
            let scaled = if span == 0 {
                c.scaled_min as i64
            } else {
                c.scaled_min as i64
                    + (raw as i64 - c.raw_min as i64) * (c.scaled_max as i64 - c.scaled_min as i64)
                        / span
            };
            let lo = c.scaled_min.min(c.scaled_max) as i64;
            let hi = c.scaled_min.max(c.scaled_max) as i64;
            let scaled = scaled.clamp(lo, hi) as i32;

            // ema responsiveness follows the sample count
            let alpha = (256 / (c.sample_count.max(1) as i32)).clamp(1, 255) as u8;
            let fcfg = FilterConfig {
                input_id: CH_REF_NONE,
                kind: c.filter_kind,
                window_size: c.sample_count,
                time_const_ms: c.filter_ms,
                alpha,
                _pad: Default::default(),
            };

            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            match &mut slot.workspace {
                Workspace::Filter(f) => f.update(&fcfg, scaled, dt),
                _ => scaled,
            }
        }

        ChannelConfig::FrequencyIn(c) => {
            let per_rev = rational(raw as i64, 1, c.pulses_per_rev.max(1) as i64);
            rational(per_rev, c.scale_num as i64, c.scale_den as i64)
                .clamp(i32::MIN as i64, i32::MAX as i64) as i32
        }

        ChannelConfig::CanIn(c) => {
            let scaled = rational(raw as i64, c.scale_num as i64, c.scale_den as i64)
                + c.offset as i64;
            scaled.clamp(i32::MIN as i64, i32::MAX as i64) as i32
        }

        _ => raw,
    };

    store(registry, at, value);
}

fn gather(registry: &Registry, ids: &[u16], count: usize, out: &mut [i32]) -> usize {
    let n = count.min(ids.len()).min(out.len());
    for i in 0..n {
        out[i] = registry.get_value(ids[i]);
    }
    n
}

fn run_computed(registry: &mut Registry, at: usize, dt: u32) {
    let Some((ch, config)) = runnable(registry, at) else {
        return;
    };
    if !ch.kind.is_computed() {
        return;
    }

    match config {
        ChannelConfig::Logic(c) => {
            let mut vals = [0i32; NODE_MAX_INPUTS];
            let n = gather(registry, &c.inputs, c.input_count as usize, &mut vals);
            store(registry, at, logic::evaluate(&c, &vals[..n]));
        }

        ChannelConfig::Math(c) => {
            let mut vals = [0i32; NODE_MAX_INPUTS];
            let n = gather(registry, &c.inputs, c.input_count as usize, &mut vals);
            store(registry, at, math::evaluate(&c, &vals[..n]));
        }

        ChannelConfig::Table2d(c) => {
            let x = registry.get_value(c.input_id);
            store(
                registry,
                at,
                table::lookup_2d(&c.x, &c.y, c.point_count as usize, x),
            );
        }

        ChannelConfig::Table3d(c) => {
            let x = registry.get_value(c.input_x);
            let y = registry.get_value(c.input_y);
            store(
                registry,
                at,
                table::lookup_3d(
                    &c.x,
                    &c.y,
                    &c.z,
                    c.x_size as usize,
                    c.y_size as usize,
                    x,
                    y,
                ),
            );
        }

        ChannelConfig::Timer(c) => {
            let trigger = registry.get_value(c.trigger_id);
            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            if let Workspace::Timer(t) = &mut slot.workspace {
                let v = t.update(&c, trigger, dt);
                slot.channel.set_value(v);
            }
        }

        ChannelConfig::Filter(c) => {
            let input = registry.get_value(c.input_id);
            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            if let Workspace::Filter(f) = &mut slot.workspace {
                let v = f.update(&c, input, dt);
                slot.channel.set_value(v);
            }
        }

        ChannelConfig::Pid(c) => {
            let setpoint = registry.get_value(c.setpoint_id);
            let feedback = registry.get_value(c.feedback_id);
            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            if let Workspace::Pid(p) = &mut slot.workspace {
                let v = p.update(&c, setpoint, feedback, dt);
                slot.channel.set_value(v);
            }
        }

        // numbers hold their value; commands mutate them
        ChannelConfig::Number(_) => {}

        ChannelConfig::Switch(c) => {
            let sel = registry.get_value(c.selector_id);
            let n = (c.case_count as usize).min(SWITCH_MAX_CASES);
            let mut result = c.default;
            match c.mode {
                SwitchMode::ValueMatch => {
                    for case in &c.cases[..n] {
                        if sel == case.match_value {
                            result = case.result;
                            break;
                        }
                    }
                }
                SwitchMode::RangeMatch => {
                    for case in &c.cases[..n] {
                        if sel >= case.match_value && sel <= case.max_value {
                            result = case.result;
                            break;
                        }
                    }
                }
                SwitchMode::Index => {
                    if (0..n as i32).contains(&sel) {
                        result = c.cases[sel as usize].result;
                    }
                }
            }
            store(registry, at, result);
        }

        ChannelConfig::Counter(c) => {
            let inc = registry.get_value(c.increment_id);
            let dec = registry.get_value(c.decrement_id);
            let reset = registry.get_value(c.reset_id);
            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            if let Workspace::Counter(s) = &mut slot.workspace {
                let v = s.update(&c, inc, dec, reset);
                slot.channel.set_value(v);
            }
        }

        ChannelConfig::FlipFlop(c) => {
            let set = registry.get_value(c.set_id);
            let reset = registry.get_value(c.reset_id);
            let clock = registry.get_value(c.clock_id);
            let enable = c.enable_id == CH_REF_NONE || registry.get_value(c.enable_id) != 0;
            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            if let Workspace::FlipFlop(f) = &mut slot.workspace {
                let v = f.update(&c, set, reset, clock, enable);
                slot.channel.set_value(v);
            }
        }

        ChannelConfig::Hysteresis(c) => {
            let input = registry.get_value(c.input_id);
            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            if let Workspace::Hysteresis(h) = &mut slot.workspace {
                let v = h.update(&c, input);
                slot.channel.set_value(v);
            }
        }

        _ => {}
    }
}

fn run_output<H: Hardware>(registry: &mut Registry, hw: &mut H, at: usize, dt: u32) {
    let Some((ch, config)) = runnable(registry, at) else {
        return;
    };
    if !ch.kind.is_output() {
        return;
    }

    // wired outputs follow their source; unwired ones hold the value
    // commands force into them
    let src = if ch.source_id != CH_REF_NONE {
        registry.get_value(ch.source_id)
    } else {
        ch.value
    };
    let inverted = ch.flags.contains(ChannelFlags::INVERTED);

    match config {
        ChannelConfig::PowerOut(_) => {
            let mut on = src != 0;
            if inverted {
                on = !on;
            }
            store(registry, at, on as i32);
            hw.write_output(HwDevice::PowerOut, ch.hw_index, on as i32);
        }

        ChannelConfig::PwmOut(c) => {
            let duty = src.clamp(0, DUTY_FULL_SCALE);
            let duty = duty.clamp(c.duty_min as i32, c.duty_max as i32);
            store(registry, at, duty);
            let wire = if c.invert != 0 {
                DUTY_FULL_SCALE - duty
            } else {
                duty
            };
            hw.write_output(HwDevice::PwmOut, ch.hw_index, wire);
        }

        ChannelConfig::HBridge(c) => {
            let target = src.clamp(-DUTY_FULL_SCALE, DUTY_FULL_SCALE);
            let Some(slot) = registry.slot_at_mut(at) else {
                return;
            };
            let mut v = match &mut slot.workspace {
                Workspace::Filter(FilterState::RateLimit(rl)) => {
                    rl.update(c.accel_rate as u32, c.decel_rate as u32, target, dt)
                }
                _ => target,
            };
            // positive forward, negative reverse, zero coast
            if v.unsigned_abs() < c.deadband as u32 {
                v = 0;
            }
            slot.channel.set_value(v);
            hw.write_output(HwDevice::HBridge, ch.hw_index, v);
        }

        ChannelConfig::CanOut(c) => {
            let v = rational(src as i64, c.scale_num as i64, c.scale_den as i64)
                + c.offset as i64;
            let v = v.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
            store(registry, at, v);
            hw.write_output(HwDevice::CanTx, ch.hw_index, v);
        }

        _ => {}
    }
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use super::*;
    use crate::channel::{Channel, ChannelId, ChannelKind};
    use crate::registry::Registry;

    /// Scriptable hardware stub: fixed input values, recorded writes.
    struct TestHw {
        analog: [i32; 16],
        digital: [i32; 12],
        writes: alloc::vec::Vec<(HwDevice, u8, i32)>,
    }

    impl TestHw {
        fn new() -> Self {
            Self {
                analog: [0; 16],
                digital: [0; 12],
                writes: alloc::vec::Vec::new(),
            }
        }
    }

    impl Hardware for TestHw {
        fn read_input(&mut self, device: HwDevice, index: u8) -> i32 {
            match device {
                HwDevice::AnalogIn => self.analog[index as usize],
                HwDevice::DigitalIn => self.digital[index as usize],
                _ => 0,
            }
        }

        fn write_output(&mut self, device: HwDevice, index: u8, value: i32) {
            self.writes.push((device, index, value));
        }
    }

    fn identity_analog(id: ChannelId, hw_index: u8) -> (Channel, ChannelConfig) {
        let mut ch = Channel::new(id, ChannelKind::AnalogIn);
        ch.hw_index = hw_index;
        (
            ch,
            ChannelConfig::AnalogIn(AnalogInConfig {
                raw_min: 0,
                raw_max: 1000,
                scaled_min: 0,
                scaled_max: 1000,
                filter_ms: 0,
                filter_kind: FilterKind::Sma,
                sample_count: 1,
            }),
        )
    }

    #[test]
    fn hysteresis_fan_scenario() {
        let mut reg = Registry::new();
        let mut hw = TestHw::new();
        let mut exec = Executor::new();

        let (ch, cfg) = identity_analog(10, 0);
        reg.register(ch, cfg).unwrap();
        reg.register(
            Channel::new(300, ChannelKind::Hysteresis),
            ChannelConfig::Hysteresis(HysteresisConfig {
                input_id: 10,
                kind: HysteresisKind::Schmitt,
                invert: 0,
                threshold_high: 85,
                threshold_low: 75,
            }),
        )
        .unwrap();

        let expect = [(70, 0), (80, 0), (86, 1), (80, 1), (74, 0), (76, 0)];
        for (i, (input, output)) in expect.iter().enumerate() {
            hw.analog[0] = *input;
            exec.pass(&mut reg, &mut hw, (i as u32 + 1) * 10);
            assert_eq!(
                reg.get_value(300),
                *output,
                "input {} should give {}",
                input,
                output
            );
        }
    }

    #[test]
    fn logic_and_invert_scenario() {
        let mut reg = Registry::new();
        let mut hw = TestHw::new();
        let mut exec = Executor::new();

        for (id, hw_index) in [(1u16, 0u8), (2, 1), (3, 2)] {
            let mut ch = Channel::new(id, ChannelKind::DigitalIn);
            ch.hw_index = hw_index;
            reg.register(
                ch,
                ChannelConfig::DigitalIn(DigitalInConfig {
                    active_level: 1,
                    use_pullup: 0,
                    debounce_ms: 0,
                }),
            )
            .unwrap();
        }

        let mut inputs = [CH_REF_NONE; NODE_MAX_INPUTS];
        inputs[..3].copy_from_slice(&[1, 2, 3]);
        reg.register(
            Channel::new(202, ChannelKind::Logic),
            ChannelConfig::Logic(LogicConfig {
                op: LogicOp::And,
                input_count: 3,
                inputs,
                compare_value: 0,
                invert_output: 1,
                _pad: Default::default(),
            }),
        )
        .unwrap();

        hw.digital = [1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        exec.pass(&mut reg, &mut hw, 10);
        assert_eq!(reg.get_value(202), 1);

        hw.digital[2] = 1;
        exec.pass(&mut reg, &mut hw, 20);
        assert_eq!(reg.get_value(202), 0);
    }

    #[test]
    fn table_lookup_scenario() {
        let mut reg = Registry::new();
        let mut hw = TestHw::new();
        let mut exec = Executor::new();

        let (ch, cfg) = identity_analog(10, 0);
        reg.register(ch, cfg).unwrap();

        let mut t = Table2dConfig {
            input_id: 10,
            point_count: 5,
            ..Default::default()
        };
        t.x[..5].copy_from_slice(&[70, 80, 90, 100, 110]);
        t.y[..5].copy_from_slice(&[0, 0, 50, 80, 100]);
        reg.register(Channel::new(240, ChannelKind::Table2d), ChannelConfig::Table2d(t))
            .unwrap();

        for (i, (input, output)) in [(85, 25), (60, 0), (120, 100), (95, 65)]
            .iter()
            .enumerate()
        {
            hw.analog[0] = *input;
            exec.pass(&mut reg, &mut hw, (i as u32 + 1) * 10);
            assert_eq!(reg.get_value(240), *output);
        }
    }

    #[test]
    fn pid_clamp_scenario() {
        let mut reg = Registry::new();
        let mut hw = TestHw::new();
        let mut exec = Executor::new();

        let (ch, cfg) = identity_analog(10, 0);
        reg.register(ch, cfg).unwrap();
        let (ch, cfg) = identity_analog(11, 1);
        reg.register(ch, cfg).unwrap();

        reg.register(
            Channel::new(270, ChannelKind::Pid),
            ChannelConfig::Pid(PidConfig {
                setpoint_id: 10,
                feedback_id: 11,
                kp: 1500,
                ki: 200,
                kd: 50,
                output_min: 0,
                output_max: 1000,
                integral_min: -10_000,
                integral_max: 10_000,
                deadband: 0,
                d_on_measurement: 0,
                _pad: Default::default(),
            }),
        )
        .unwrap();

        hw.analog[0] = 850;
        hw.analog[1] = 800;
        for tick in 1..=10u32 {
            exec.pass(&mut reg, &mut hw, tick * 20);
            let out = reg.get_value(270);
            assert!((0..=1000).contains(&out), "tick {}: output {}", tick, out);
        }
    }

    #[test]
    fn output_routing_and_force() {
        let mut reg = Registry::new();
        let mut hw = TestHw::new();
        let mut exec = Executor::new();

        let (ch, cfg) = identity_analog(10, 0);
        reg.register(ch, cfg).unwrap();

        // wired power output follows its source channel
        let mut out = Channel::new(101, ChannelKind::PowerOut);
        out.hw_index = 3;
        out.source_id = 10;
        reg.register(out, ChannelConfig::PowerOut(Default::default()))
            .unwrap();

        hw.analog[0] = 0;
        exec.pass(&mut reg, &mut hw, 10);
        assert_eq!(hw.writes.last(), Some(&(HwDevice::PowerOut, 3, 0)));

        hw.analog[0] = 123;
        exec.pass(&mut reg, &mut hw, 20);
        assert_eq!(hw.writes.last(), Some(&(HwDevice::PowerOut, 3, 1)));
        assert_eq!(reg.get_value(101), 1);
    }

    #[test]
    fn pwm_duty_window() {
        let mut reg = Registry::new();
        let mut hw = TestHw::new();
        let mut exec = Executor::new();

        let (ch, cfg) = identity_analog(10, 0);
        reg.register(ch, cfg).unwrap();

        let mut out = Channel::new(120, ChannelKind::PwmOut);
        out.hw_index = 5;
        out.source_id = 10;
        reg.register(
            out,
            ChannelConfig::PwmOut(PwmOutConfig {
                freq_hz: 1000,
                duty_min: 1000,
                duty_max: 9000,
                duty_default: 0,
                invert: 0,
                _pad: Default::default(),
            }),
        )
        .unwrap();

        // a raw 0..1000 analog only reaches 1000 duty units
        hw.analog[0] = 0;
        exec.pass(&mut reg, &mut hw, 10);
        assert_eq!(reg.get_value(120), 1000); // clamped up to duty_min

        hw.analog[0] = 500;
        exec.pass(&mut reg, &mut hw, 20);
        assert_eq!(reg.get_value(120), 1000);
    }

    #[test]
    fn forward_reference_sees_previous_pass() {
        let mut reg = Registry::new();
        let mut hw = TestHw::new();
        let mut exec = Executor::new();

        // 210 reads 220, but 220 is registered later
        let mut inputs = [CH_REF_NONE; NODE_MAX_INPUTS];
        inputs[0] = 220;
        reg.register(
            Channel::new(210, ChannelKind::Math),
            ChannelConfig::Math(MathConfig {
                op: MathOp::Add,
                input_count: 1,
                inputs,
                ..Default::default()
            }),
        )
        .unwrap();

        let (ch, cfg) = identity_analog(10, 0);
        reg.register(ch, cfg).unwrap();

        let mut inputs = [CH_REF_NONE; NODE_MAX_INPUTS];
        inputs[0] = 10;
        reg.register(
            Channel::new(220, ChannelKind::Math),
            ChannelConfig::Math(MathConfig {
                op: MathOp::Add,
                input_count: 1,
                inputs,
                ..Default::default()
            }),
        )
        .unwrap();

        hw.analog[0] = 42;
        exec.pass(&mut reg, &mut hw, 10);
        // one-pass delay through the forward reference
        assert_eq!(reg.get_value(220), 42);
        assert_eq!(reg.get_value(210), 0);

        exec.pass(&mut reg, &mut hw, 20);
        assert_eq!(reg.get_value(210), 42);
    }

    #[test]
    fn disabled_channels_are_skipped() {
        let mut reg = Registry::new();
        let mut hw = TestHw::new();
        let mut exec = Executor::new();

        let (ch, cfg) = identity_analog(10, 0);
        reg.register(ch, cfg).unwrap();

        hw.analog[0] = 777;
        exec.pass(&mut reg, &mut hw, 10);
        assert_eq!(reg.get_value(10), 777);

        if let Some(slot) = reg.get_mut(10) {
            slot.channel.flags.remove(ChannelFlags::ENABLED);
        }
        hw.analog[0] = 888;
        exec.pass(&mut reg, &mut hw, 20);
        assert_eq!(reg.get_value(10), 0);
    }

    #[test]
    fn determinism_across_runs() {
        fn run() -> alloc::vec::Vec<i32> {
            let mut reg = Registry::new();
            let mut hw = TestHw::new();
            let mut exec = Executor::new();

            let (ch, cfg) = identity_analog(10, 0);
            reg.register(ch, cfg).unwrap();
            reg.register(
                Channel::new(230, ChannelKind::Filter),
                ChannelConfig::Filter(FilterConfig {
                    input_id: 10,
                    kind: FilterKind::Ema,
                    window_size: 0,
                    time_const_ms: 0,
                    alpha: 64,
                    _pad: Default::default(),
                }),
            )
            .unwrap();

            let mut trace = alloc::vec::Vec::new();
            for tick in 1..=50u32 {
                hw.analog[0] = ((tick * 37) % 1000) as i32;
                exec.pass(&mut reg, &mut hw, tick * 10);
                trace.push(reg.get_value(230));
            }
            trace
        }

        assert_eq!(run(), run());
    }
}
