//! Stateless arithmetic operations.
//!
//! All intermediates widen to 64 bits; division by zero yields zero
//! instead of trapping. Results pass through the configured output
//! clamp (when non-degenerate) and then the rational output scale.

use crate::config::records::{MathConfig, MathOp};

fn sat(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn op_result(config: &MathConfig, inputs: &[i32]) -> i64 {
    let first = inputs.first().copied().unwrap_or(0) as i64;
    let rest = inputs.get(1..).unwrap_or(&[]);

    match config.op {
        MathOp::Add => inputs.iter().map(|v| *v as i64).sum(),
        MathOp::Sub => rest.iter().fold(first, |acc, v| acc - *v as i64),
        MathOp::Mul => inputs.iter().fold(1i64, |acc, v| acc.saturating_mul(*v as i64)),
        MathOp::Div => rest
            .iter()
            .try_fold(first, |acc, v| {
                if *v == 0 {
                    None
                } else {
                    Some(acc / *v as i64)
                }
            })
            .unwrap_or(0),
        MathOp::Min => inputs.iter().map(|v| *v as i64).min().unwrap_or(0),
        MathOp::Max => inputs.iter().map(|v| *v as i64).max().unwrap_or(0),
        MathOp::Avg => {
            if inputs.is_empty() {
                0
            } else {
                inputs.iter().map(|v| *v as i64).sum::<i64>() / inputs.len() as i64
            }
        }
        // the output clamp stage does the work
        MathOp::Clamp => first,
        MathOp::Map => {
            let t = first.clamp(0, 1000);
            let in_min = config.clamp_min as i64;
            let in_max = config.clamp_max as i64;
            in_min + (in_max - in_min) * t / 1000
        }
        MathOp::Scale => first.saturating_mul(config.constant as i64),
        MathOp::Lerp => {
            let a = first;
            let b = inputs.get(1).copied().unwrap_or(0) as i64;
            let t = inputs
                .get(2)
                .copied()
                .unwrap_or(config.constant)
                .clamp(0, 1000) as i64;
            a + (b - a) * t / 1000
        }
    }
}

/// Evaluate a math node against its resolved input values.
pub fn evaluate(config: &MathConfig, inputs: &[i32]) -> i32 {
    let mut value = op_result(config, inputs);

    // output clamp, when the bounds are not degenerate
    if config.clamp_min < config.clamp_max && config.op != MathOp::Map {
        value = value.clamp(config.clamp_min as i64, config.clamp_max as i64);
    }

    // rational output scale, zero denominator passes through
    if config.scale_den != 0 {
        value = value.saturating_mul(config.scale_num as i64) / config.scale_den as i64;
    }

    sat(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::records::NODE_MAX_INPUTS;

    fn config(op: MathOp) -> MathConfig {
        MathConfig {
            op,
            input_count: 0,
            inputs: [crate::channel::CH_REF_NONE; NODE_MAX_INPUTS],
            constant: 0,
            clamp_min: 0,
            clamp_max: 0,
            scale_num: 1,
            scale_den: 1,
        }
    }

    #[test]
    fn basic_ops() {
        assert_eq!(evaluate(&config(MathOp::Add), &[1, 2, 3]), 6);
        assert_eq!(evaluate(&config(MathOp::Sub), &[10, 3, 2]), 5);
        assert_eq!(evaluate(&config(MathOp::Mul), &[4, -3]), -12);
        assert_eq!(evaluate(&config(MathOp::Div), &[100, 7]), 14);
        assert_eq!(evaluate(&config(MathOp::Min), &[5, -2, 9]), -2);
        assert_eq!(evaluate(&config(MathOp::Max), &[5, -2, 9]), 9);
        assert_eq!(evaluate(&config(MathOp::Avg), &[1, 2, 4]), 2);
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(evaluate(&config(MathOp::Div), &[100, 0]), 0);
        assert_eq!(evaluate(&config(MathOp::Div), &[100, 5, 0]), 0);
    }

    #[test]
    fn wide_intermediates_do_not_overflow() {
        let cfg = config(MathOp::Mul);
        assert_eq!(evaluate(&cfg, &[1_000_000, 1_000_000]), i32::MAX);

        let mut cfg = config(MathOp::Mul);
        cfg.scale_num = 1;
        cfg.scale_den = 100;
        assert_eq!(evaluate(&cfg, &[100_000, 1_000]), 1_000_000);
    }

    #[test]
    fn output_clamp_and_scale() {
        let mut cfg = config(MathOp::Add);
        cfg.clamp_min = 0;
        cfg.clamp_max = 100;
        assert_eq!(evaluate(&cfg, &[250]), 100);
        assert_eq!(evaluate(&cfg, &[-5]), 0);

        cfg.scale_num = 3;
        cfg.scale_den = 2;
        assert_eq!(evaluate(&cfg, &[50]), 75);
    }

    #[test]
    fn clamp_op_uses_bounds() {
        let mut cfg = config(MathOp::Clamp);
        cfg.clamp_min = -10;
        cfg.clamp_max = 10;
        assert_eq!(evaluate(&cfg, &[99]), 10);
        assert_eq!(evaluate(&cfg, &[-99]), -10);
        assert_eq!(evaluate(&cfg, &[7]), 7);
    }

    #[test]
    fn map_projects_parameter() {
        let mut cfg = config(MathOp::Map);
        cfg.clamp_min = 200;
        cfg.clamp_max = 1200;
        assert_eq!(evaluate(&cfg, &[0]), 200);
        assert_eq!(evaluate(&cfg, &[500]), 700);
        assert_eq!(evaluate(&cfg, &[1000]), 1200);
        // parameter clamps to [0, 1000]
        assert_eq!(evaluate(&cfg, &[1500]), 1200);
    }

    #[test]
    fn scale_and_lerp() {
        let mut cfg = config(MathOp::Scale);
        cfg.constant = -4;
        assert_eq!(evaluate(&cfg, &[25]), -100);

        let mut cfg = config(MathOp::Lerp);
        cfg.constant = 250;
        assert_eq!(evaluate(&cfg, &[0, 1000]), 250);
        assert_eq!(evaluate(&cfg, &[0, 1000, 500]), 500);
    }
}
