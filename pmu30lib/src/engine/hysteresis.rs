//! Hysteresis elements: schmitt, window, and multilevel.

use crate::config::records::{HysteresisConfig, HysteresisKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HysteresisState {
    state: bool,
}

impl HysteresisState {
    pub fn new() -> Self {
        Self { state: false }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn update(&mut self, config: &HysteresisConfig, input: i32) -> i32 {
        let out = match config.kind {
            HysteresisKind::Schmitt => {
                if input >= config.threshold_high {
                    self.state = true;
                } else if input <= config.threshold_low {
                    self.state = false;
                }
                self.state as i32
            }
            HysteresisKind::Window => {
                (input >= config.threshold_low && input <= config.threshold_high) as i32
            }
            HysteresisKind::Multilevel => {
                if input >= config.threshold_high {
                    2
                } else if input >= config.threshold_low {
                    1
                } else {
                    0
                }
            }
        };

        if config.invert != 0 {
            match config.kind {
                HysteresisKind::Multilevel => 2 - out,
                _ => 1 - out,
            }
        } else {
            out
        }
    }
}

impl Default for HysteresisState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(kind: HysteresisKind, low: i32, high: i32, invert: bool) -> HysteresisConfig {
        HysteresisConfig {
            input_id: 10,
            kind,
            invert: invert as u8,
            threshold_high: high,
            threshold_low: low,
        }
    }

    #[test]
    fn schmitt_fan_control() {
        let cfg = config(HysteresisKind::Schmitt, 75, 85, false);
        let mut h = HysteresisState::new();

        assert_eq!(h.update(&cfg, 70), 0);
        assert_eq!(h.update(&cfg, 80), 0); // below high, holds
        assert_eq!(h.update(&cfg, 86), 1);
        assert_eq!(h.update(&cfg, 80), 1); // above low, holds
        assert_eq!(h.update(&cfg, 74), 0);
        assert_eq!(h.update(&cfg, 76), 0);
    }

    #[test]
    fn window_band() {
        let cfg = config(HysteresisKind::Window, 10, 20, false);
        let mut h = HysteresisState::new();

        assert_eq!(h.update(&cfg, 9), 0);
        assert_eq!(h.update(&cfg, 10), 1);
        assert_eq!(h.update(&cfg, 20), 1);
        assert_eq!(h.update(&cfg, 21), 0);
    }

    #[test]
    fn multilevel_steps() {
        let cfg = config(HysteresisKind::Multilevel, 100, 200, false);
        let mut h = HysteresisState::new();

        assert_eq!(h.update(&cfg, 50), 0);
        assert_eq!(h.update(&cfg, 150), 1);
        assert_eq!(h.update(&cfg, 250), 2);
    }

    #[test]
    fn invert_flips_polarity() {
        let cfg = config(HysteresisKind::Schmitt, 75, 85, true);
        let mut h = HysteresisState::new();

        assert_eq!(h.update(&cfg, 70), 1);
        assert_eq!(h.update(&cfg, 86), 0);

        let cfg = config(HysteresisKind::Multilevel, 100, 200, true);
        let mut h = HysteresisState::new();
        assert_eq!(h.update(&cfg, 50), 2);
        assert_eq!(h.update(&cfg, 250), 0);
    }
}
