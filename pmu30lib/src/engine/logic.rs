//! Stateless logic operations.

use crate::config::records::{LogicConfig, LogicOp};

fn truthy(v: i32) -> bool {
    v != 0
}

/// Evaluate a logic node against its resolved input values.
///
/// `inputs` holds the first `input_count` resolved values. Compare
/// operations test the first input against `compare_value`; the range
/// operations use the first two inputs as bounds and `compare_value`
/// as the tested value.
pub fn evaluate(config: &LogicConfig, inputs: &[i32]) -> i32 {
    let result = match config.op {
        LogicOp::And => inputs.iter().all(|v| truthy(*v)),
        LogicOp::Or => inputs.iter().any(|v| truthy(*v)),
        LogicOp::Xor => inputs.iter().fold(false, |acc, v| acc ^ truthy(*v)),
        LogicOp::Nand => !inputs.iter().all(|v| truthy(*v)),
        LogicOp::Nor => !inputs.iter().any(|v| truthy(*v)),
        LogicOp::Not => !truthy(inputs.first().copied().unwrap_or(0)),

        LogicOp::Gt => inputs.first().copied().unwrap_or(0) > config.compare_value,
        LogicOp::Ge => inputs.first().copied().unwrap_or(0) >= config.compare_value,
        LogicOp::Lt => inputs.first().copied().unwrap_or(0) < config.compare_value,
        LogicOp::Le => inputs.first().copied().unwrap_or(0) <= config.compare_value,
        LogicOp::Eq => inputs.first().copied().unwrap_or(0) == config.compare_value,
        LogicOp::Ne => inputs.first().copied().unwrap_or(0) != config.compare_value,

        LogicOp::InRange | LogicOp::OutsideRange => {
            let low = inputs.first().copied().unwrap_or(0);
            let high = inputs.get(1).copied().unwrap_or(0);
            let inside = config.compare_value >= low && config.compare_value <= high;
            if config.op == LogicOp::InRange {
                inside
            } else {
                !inside
            }
        }
    };

    let result = if config.invert_output != 0 {
        !result
    } else {
        result
    };
    result as i32
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::records::NODE_MAX_INPUTS;

    fn config(op: LogicOp, compare_value: i32, invert_output: bool) -> LogicConfig {
        LogicConfig {
            op,
            input_count: 0,
            inputs: [crate::channel::CH_REF_NONE; NODE_MAX_INPUTS],
            compare_value,
            invert_output: invert_output as u8,
            _pad: Default::default(),
        }
    }

    #[test]
    fn and_with_invert() {
        let cfg = config(LogicOp::And, 0, true);
        assert_eq!(evaluate(&cfg, &[1, 1, 0]), 1);
        assert_eq!(evaluate(&cfg, &[1, 1, 1]), 0);
    }

    #[test]
    fn gate_family() {
        assert_eq!(evaluate(&config(LogicOp::Or, 0, false), &[0, 0, 5]), 1);
        assert_eq!(evaluate(&config(LogicOp::Xor, 0, false), &[1, 1]), 0);
        assert_eq!(evaluate(&config(LogicOp::Xor, 0, false), &[1, 0, 1, 1]), 1);
        assert_eq!(evaluate(&config(LogicOp::Nand, 0, false), &[1, 1]), 0);
        assert_eq!(evaluate(&config(LogicOp::Nor, 0, false), &[0, 0]), 1);
        assert_eq!(evaluate(&config(LogicOp::Not, 0, false), &[7]), 0);
    }

    #[test]
    fn compares_use_compare_value() {
        assert_eq!(evaluate(&config(LogicOp::Gt, 10, false), &[11]), 1);
        assert_eq!(evaluate(&config(LogicOp::Gt, 10, false), &[10]), 0);
        assert_eq!(evaluate(&config(LogicOp::Ge, 10, false), &[10]), 1);
        assert_eq!(evaluate(&config(LogicOp::Lt, -3, false), &[-4]), 1);
        assert_eq!(evaluate(&config(LogicOp::Le, -3, false), &[-3]), 1);
        assert_eq!(evaluate(&config(LogicOp::Eq, 42, false), &[42]), 1);
        assert_eq!(evaluate(&config(LogicOp::Ne, 42, false), &[41]), 1);
    }

    #[test]
    fn range_bounds_from_inputs() {
        // bounds from inputs, tested value from compare_value
        let cfg = config(LogicOp::InRange, 50, false);
        assert_eq!(evaluate(&cfg, &[0, 100]), 1);
        assert_eq!(evaluate(&cfg, &[60, 100]), 0);

        let cfg = config(LogicOp::OutsideRange, 50, false);
        assert_eq!(evaluate(&cfg, &[60, 100]), 1);
    }
}
