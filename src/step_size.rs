//! Harmonising per-node step sizes into one macro step.

/// Tolerance used for all time comparisons, and the smallest macro step size.
pub const TIME_EPSILON: f64 = 1e-9;

/// Greatest common divisor of two step sizes, by repeated Euclidean remainder.
///
/// The remainder is considered zero once it drops below [`TIME_EPSILON`].
pub fn gcd(a: f64, b: f64) -> f64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    loop {
        if a < b {
            std::mem::swap(&mut a, &mut b);
        }
        if b.abs() < TIME_EPSILON {
            return a;
        }
        let r = a - (a / b).floor() * b;
        a = b;
        b = r;
    }
}

/// The macro step size for a set of node step sizes: their GCD, floored at [`TIME_EPSILON`].
///
/// Returns `None` when there are no nodes.
pub fn compute_step_size(step_sizes: &[f64]) -> Option<f64> {
    let (first, rest) = step_sizes.split_first()?;
    let step = rest.iter().fold(*first, |acc, s| gcd(acc, *s));
    Some(step.max(TIME_EPSILON))
}

/// Number of macro ticks between successive publications of a node stepping at `step_size`.
pub fn update_interval(step_size: f64, macro_step: f64) -> u64 {
    ((step_size / macro_step).round() as u64).max(1)
}

pub fn update_intervals(step_sizes: &[f64], macro_step: f64) -> Vec<u64> {
    step_sizes
        .iter()
        .map(|s| update_interval(*s, macro_step))
        .collect()
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[0.01, 0.02, 0.05], 0.01, &[1, 2, 5])]
    #[case(&[0.001], 0.001, &[1])]
    #[case(&[0.004, 0.006], 0.002, &[2, 3])]
    #[case(&[0.1, 0.25], 0.05, &[2, 5])]
    #[case(&[0.003, 0.003, 0.009], 0.003, &[1, 1, 3])]
    fn test_step_size(#[case] steps: &[f64], #[case] expected: f64, #[case] intervals: &[u64]) {
        let m = compute_step_size(steps).unwrap();
        assert_approx_eq!(f64, m, expected, epsilon = 1e-9);
        assert_eq!(update_intervals(steps, m), intervals);

        let min = steps.iter().copied().fold(f64::INFINITY, f64::min);
        assert!(m <= min + TIME_EPSILON);
        assert!(m >= TIME_EPSILON);
        for s in steps {
            let ratio = s / m;
            assert_approx_eq!(f64, ratio, ratio.round(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_no_nodes() {
        assert_eq!(compute_step_size(&[]), None);
    }

    #[test]
    fn test_floor() {
        let m = compute_step_size(&[1e-12]).unwrap();
        assert_eq!(m, TIME_EPSILON);
        assert_eq!(update_interval(1e-12, m), 1);
    }

    #[test]
    fn test_gcd_symmetric() {
        assert_approx_eq!(f64, gcd(0.02, 0.05), gcd(0.05, 0.02), epsilon = 1e-12);
        assert_approx_eq!(f64, gcd(0.5, 0.5), 0.5);
    }
}
