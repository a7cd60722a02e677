//! Integer PID controller with bounded integral.

use crate::config::records::PidConfig;

/// Gains are scaled integers over this divisor: kp = 1500 means 1.5.
pub const PID_GAIN_SCALE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidState {
    /// Integral accumulator in error-milliseconds.
    acc_ms: i64,
    prev_error: i32,
    prev_measurement: i32,
    primed: bool,
}

impl PidState {
    pub fn new() -> Self {
        Self {
            acc_ms: 0,
            prev_error: 0,
            prev_measurement: 0,
            primed: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The bounded integral term, in error units.
    pub fn integral(&self) -> i32 {
        (self.acc_ms / 1000) as i32
    }

    pub fn update(&mut self, config: &PidConfig, setpoint: i32, feedback: i32, dt_ms: u32) -> i32 {
        let mut error = setpoint as i64 - feedback as i64;
        if error.abs() <= config.deadband as i64 {
            error = 0;
        }

        // anti-windup: bound the accumulator itself
        self.acc_ms += error * dt_ms as i64;
        self.acc_ms = self.acc_ms.clamp(
            config.integral_min as i64 * 1000,
            config.integral_max as i64 * 1000,
        );
        let integral = self.acc_ms / 1000;

        // derivative per second, on error or on measurement
        let derivative = if !self.primed || dt_ms == 0 {
            0
        } else if config.d_on_measurement != 0 {
            (feedback as i64 - self.prev_measurement as i64) * 1000 / dt_ms as i64
        } else {
            -(error - self.prev_error as i64) * 1000 / dt_ms as i64
        };

        self.prev_error = error as i32;
        self.prev_measurement = feedback;
        self.primed = true;

        let output = (config.kp as i64 * error + config.ki as i64 * integral
            - config.kd as i64 * derivative)
            / PID_GAIN_SCALE;

        output.clamp(config.output_min as i64, config.output_max as i64) as i32
    }
}

impl Default for PidState {
    fn default() -> Self {
        Self::new()
    }
}
