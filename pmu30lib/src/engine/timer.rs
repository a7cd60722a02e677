//! The timer element state machine.

use crate::config::records::{TimerConfig, TimerMode, TriggerMode};

/// Timer phases. IDLE is the initial phase; there is no terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerPhase {
    Idle,
    /// Counting toward a delayed assertion.
    Pending,
    /// Output asserted.
    Active,
    /// Counting toward a delayed de-assertion.
    Cooling,
    BlinkOn,
    BlinkOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerState {
    phase: TimerPhase,
    elapsed_ms: u32,
    last_raw: bool,
    primed: bool,
}

impl TimerState {
    pub fn new() -> Self {
        Self {
            phase: TimerPhase::Idle,
            elapsed_ms: 0,
            last_raw: false,
            primed: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    fn enter(&mut self, phase: TimerPhase) {
        self.phase = phase;
        self.elapsed_ms = 0;
    }

    /// Advance the machine by `dt_ms` with the current trigger value.
    /// Returns the timer output, 0 or 1.
    pub fn update(&mut self, config: &TimerConfig, trigger: i32, dt_ms: u32) -> i32 {
        let raw = trigger != 0;

        // the first sample establishes edge history without an event
        let edge = if self.primed {
            match config.trigger_mode {
                TriggerMode::Level | TriggerMode::Rising => raw && !self.last_raw,
                TriggerMode::Falling => !raw && self.last_raw,
                TriggerMode::Either => raw != self.last_raw,
            }
        } else {
            false
        };
        self.last_raw = raw;
        self.primed = true;

        // the held condition, honoring falling polarity
        let active = match config.trigger_mode {
            TriggerMode::Falling => !raw,
            _ => raw,
        };

        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);

        match config.mode {
            TimerMode::DelayOn => {
                match self.phase {
                    TimerPhase::Idle => {
                        if active {
                            self.enter(TimerPhase::Pending);
                        }
                    }
                    TimerPhase::Pending => {
                        if !active {
                            self.enter(TimerPhase::Idle);
                        } else if self.elapsed_ms >= config.delay_ms {
                            self.enter(TimerPhase::Active);
                        }
                    }
                    TimerPhase::Active => {
                        if !active && config.auto_reset != 0 {
                            self.enter(TimerPhase::Idle);
                        }
                    }
                    _ => self.enter(TimerPhase::Idle),
                }
                (self.phase == TimerPhase::Active) as i32
            }

            TimerMode::DelayOff => {
                match self.phase {
                    TimerPhase::Idle => {
                        if active {
                            self.enter(TimerPhase::Active);
                        }
                    }
                    TimerPhase::Active => {
                        if !active {
                            self.enter(TimerPhase::Cooling);
                        }
                    }
                    TimerPhase::Cooling => {
                        if active {
                            self.enter(TimerPhase::Active);
                        } else if self.elapsed_ms >= config.delay_ms {
                            self.enter(TimerPhase::Idle);
                        }
                    }
                    _ => self.enter(TimerPhase::Idle),
                }
                matches!(self.phase, TimerPhase::Active | TimerPhase::Cooling) as i32
            }

            TimerMode::OneShot => {
                match self.phase {
                    TimerPhase::Idle => {
                        if edge {
                            self.enter(TimerPhase::Active);
                        }
                    }
                    TimerPhase::Active => {
                        if edge && config.auto_reset != 0 {
                            // retrigger extends the pulse
                            self.enter(TimerPhase::Active);
                        } else if self.elapsed_ms >= config.delay_ms {
                            self.enter(TimerPhase::Idle);
                        }
                    }
                    _ => self.enter(TimerPhase::Idle),
                }
                (self.phase == TimerPhase::Active) as i32
            }

            TimerMode::Blink => {
                if !active {
                    self.enter(TimerPhase::Idle);
                    return 0;
                }
                match self.phase {
                    TimerPhase::BlinkOn => {
                        if self.elapsed_ms >= config.on_ms.max(1) as u32 {
                            self.enter(TimerPhase::BlinkOff);
                        }
                    }
                    TimerPhase::BlinkOff => {
                        if self.elapsed_ms >= config.off_ms.max(1) as u32 {
                            self.enter(TimerPhase::BlinkOn);
                        }
                    }
                    _ => self.enter(TimerPhase::BlinkOn),
                }
                (self.phase == TimerPhase::BlinkOn) as i32
            }
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}
