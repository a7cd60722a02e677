//! Edge/level counter element.

use crate::config::records::{CounterConfig, CounterMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CounterState {
    value: i32,
    prev_inc: bool,
    prev_dec: bool,
    primed: bool,
}

impl CounterState {
    pub fn new(config: &CounterConfig) -> Self {
        Self {
            value: config.initial as i32,
            prev_inc: false,
            prev_dec: false,
            primed: false,
        }
    }

    pub fn reset(&mut self, config: &CounterConfig) {
        *self = Self::new(config);
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    fn apply(&mut self, config: &CounterConfig, delta: i32) {
        let min = config.min as i32;
        let max = config.max as i32;
        let span = (max - min + 1) as i64;

        let next = self.value as i64 + delta as i64;
        self.value = if config.wrap != 0 {
            let mut wrapped = (next - min as i64) % span;
            if wrapped < 0 {
                wrapped += span;
            }
            (min as i64 + wrapped) as i32
        } else {
            next.clamp(min as i64, max as i64) as i32
        };
    }

    /// Advance with the current trigger values.
    pub fn update(&mut self, config: &CounterConfig, inc: i32, dec: i32, reset: i32) -> i32 {
        let inc = inc != 0;
        let dec = dec != 0;
        let reset = reset != 0;

        let (inc_fire, dec_fire) = match config.mode {
            CounterMode::Edge => {
                if self.primed {
                    (inc && !self.prev_inc, dec && !self.prev_dec)
                } else {
                    // the first sample establishes history
                    (false, false)
                }
            }
            CounterMode::Level => (inc, dec),
        };

        self.prev_inc = inc;
        self.prev_dec = dec;
        self.primed = true;

        // reset wins over counting and holds while asserted
        if reset {
            self.value = config.initial as i32;
            return self.value;
        }

        if inc_fire {
            self.apply(config, config.step as i32);
        }
        if dec_fire {
            self.apply(config, -(config.step as i32));
        }

        self.value
    }
}
