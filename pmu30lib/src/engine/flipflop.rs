//! Flip-flop and latch elements.

use crate::config::records::{FlipFlopConfig, FlipFlopKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlipFlopState {
    q: bool,
    prev_clock: bool,
    primed: bool,
}

impl FlipFlopState {
    pub fn new(config: &FlipFlopConfig) -> Self {
        Self {
            q: config.initial_state != 0,
            prev_clock: false,
            primed: false,
        }
    }

    pub fn reset(&mut self, config: &FlipFlopConfig) {
        *self = Self::new(config);
    }

    /// Advance with the current input values.
    ///
    /// `set`/`reset` carry the variant's set/J/data and reset/K
    /// inputs; `enable` gates all updates when the config wires an
    /// enable channel.
    pub fn update(
        &mut self,
        config: &FlipFlopConfig,
        set: i32,
        reset: i32,
        clock: i32,
        enable: bool,
    ) -> i32 {
        let s = set != 0;
        let r = reset != 0;
        let clk = clock != 0;

        let rising = self.primed && clk && !self.prev_clock;
        self.prev_clock = clk;
        self.primed = true;

        if !enable {
            return self.q as i32;
        }

        match config.kind {
            // level sensitive, reset dominant
            FlipFlopKind::Sr | FlipFlopKind::SrLatch => {
                if r {
                    self.q = false;
                } else if s {
                    self.q = true;
                }
            }
            FlipFlopKind::D => {
                if rising {
                    self.q = s;
                }
            }
            FlipFlopKind::T => {
                // toggle input defaults to asserted when unwired
                let t = config.set_id == crate::channel::CH_REF_NONE || s;
                if rising && t {
                    self.q = !self.q;
                }
            }
            FlipFlopKind::Jk => {
                if rising {
                    self.q = match (s, r) {
                        (true, true) => !self.q,
                        (true, false) => true,
                        (false, true) => false,
                        (false, false) => self.q,
                    };
                }
            }
            // transparent while the gate is high
            FlipFlopKind::DLatch => {
                let gate = config.clock_id == crate::channel::CH_REF_NONE || clk;
                if gate {
                    self.q = s;
                }
            }
        }

        self.q as i32
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::CH_REF_NONE;

    fn config(kind: FlipFlopKind, initial: bool) -> FlipFlopConfig {
        FlipFlopConfig {
            kind,
            initial_state: initial as u8,
            set_id: 1,
            reset_id: 2,
            clock_id: 3,
            enable_id: CH_REF_NONE,
            ..Default::default()
        }
    }

    #[test]
    fn sr_reset_dominant() {
        let cfg = config(FlipFlopKind::Sr, false);
        let mut ff = FlipFlopState::new(&cfg);

        assert_eq!(ff.update(&cfg, 0, 0, 0, true), 0);
        assert_eq!(ff.update(&cfg, 1, 0, 0, true), 1);
        assert_eq!(ff.update(&cfg, 0, 0, 0, true), 1); // holds
        assert_eq!(ff.update(&cfg, 0, 1, 0, true), 0);
        assert_eq!(ff.update(&cfg, 1, 1, 0, true), 0); // reset wins
    }

    #[test]
    fn d_captures_on_rising_clock() {
        let cfg = config(FlipFlopKind::D, false);
        let mut ff = FlipFlopState::new(&cfg);

        assert_eq!(ff.update(&cfg, 1, 0, 0, true), 0);
        assert_eq!(ff.update(&cfg, 1, 0, 1, true), 1); // rising edge
        assert_eq!(ff.update(&cfg, 0, 0, 1, true), 1); // level held, no edge
        assert_eq!(ff.update(&cfg, 0, 0, 0, true), 1);
        assert_eq!(ff.update(&cfg, 0, 0, 1, true), 0);
    }

    #[test]
    fn initial_high_clock_is_not_an_edge() {
        let cfg = config(FlipFlopKind::D, false);
        let mut ff = FlipFlopState::new(&cfg);
        assert_eq!(ff.update(&cfg, 1, 0, 1, true), 0);
    }

    #[test]
    fn t_toggles() {
        let mut cfg = config(FlipFlopKind::T, false);
        cfg.set_id = CH_REF_NONE;
        let mut ff = FlipFlopState::new(&cfg);

        ff.update(&cfg, 0, 0, 0, true);
        assert_eq!(ff.update(&cfg, 0, 0, 1, true), 1);
        assert_eq!(ff.update(&cfg, 0, 0, 0, true), 1);
        assert_eq!(ff.update(&cfg, 0, 0, 1, true), 0);
    }

    #[test]
    fn jk_full_truth_table() {
        let cfg = config(FlipFlopKind::Jk, false);
        let mut ff = FlipFlopState::new(&cfg);

        ff.update(&cfg, 0, 0, 0, true);
        assert_eq!(ff.update(&cfg, 1, 0, 1, true), 1); // J: set
        ff.update(&cfg, 0, 0, 0, true);
        assert_eq!(ff.update(&cfg, 0, 0, 1, true), 1); // hold
        ff.update(&cfg, 0, 0, 0, true);
        assert_eq!(ff.update(&cfg, 1, 1, 1, true), 0); // toggle
        ff.update(&cfg, 0, 0, 0, true);
        assert_eq!(ff.update(&cfg, 0, 1, 1, true), 0); // K: reset
    }

    #[test]
    fn d_latch_transparent_while_high() {
        let cfg = config(FlipFlopKind::DLatch, false);
        let mut ff = FlipFlopState::new(&cfg);

        assert_eq!(ff.update(&cfg, 1, 0, 1, true), 1);
        assert_eq!(ff.update(&cfg, 0, 0, 1, true), 0); // follows input
        assert_eq!(ff.update(&cfg, 1, 0, 0, true), 0); // gate closed, holds
    }

    #[test]
    fn initial_state_from_config() {
        let cfg = config(FlipFlopKind::Sr, true);
        let mut ff = FlipFlopState::new(&cfg);
        assert_eq!(ff.update(&cfg, 0, 0, 0, true), 1);
    }

    #[test]
    fn enable_gates_updates() {
        let cfg = config(FlipFlopKind::Sr, false);
        let mut ff = FlipFlopState::new(&cfg);
        assert_eq!(ff.update(&cfg, 1, 0, 0, false), 0);
        assert_eq!(ff.update(&cfg, 1, 0, 0, true), 1);
    }
}
