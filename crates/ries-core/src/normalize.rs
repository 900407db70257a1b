//! Integer apportionment weights that sum to exactly 100
//!
//! Naive per-item rounding drifts (three equal thirds round to 99). Instead the
//! scaled weights are accumulated, the running totals are rounded, and the
//! final weights are the successive differences of the rounded totals. The
//! last running total is pinned to 100.

use crate::error::{Result, RiesError};

/// Total every normalized weight set sums to.
pub const WEIGHT_TOTAL: u32 = 100;

/// Scale `weights` to non-negative integers summing to [`WEIGHT_TOTAL`].
///
/// All-zero input is treated as uniform. Empty input yields an empty vector.
/// Negative or non-finite weights are rejected.
pub fn normalize(weights: &[f64]) -> Result<Vec<u32>> {
    if weights.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(RiesError::InvalidInput(format!(
            "apportionment weight must be a non-negative number, got {bad}"
        )));
    }

    let mut sum: f64 = weights.iter().sum();
    let uniform = sum == 0.0;
    if uniform {
        sum = weights.len() as f64;
    }
    let scale = f64::from(WEIGHT_TOTAL) / sum;

    let mut out = Vec::with_capacity(weights.len());
    let mut running = 0.0;
    let mut prev_rounded = 0i64;
    let last = weights.len() - 1;
    for (i, &w) in weights.iter().enumerate() {
        running += if uniform { 1.0 } else { w } * scale;
        // f64::round rounds half away from zero
        let rounded = if i == last {
            i64::from(WEIGHT_TOTAL)
        } else {
            running.round() as i64
        };
        // running totals never decrease, so the difference is non-negative
        out.push((rounded - prev_rounded).max(0) as u32);
        prev_rounded = rounded;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirds() {
        let out = normalize(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(out.iter().sum::<u32>(), 100);
        assert_eq!(out, vec![33, 34, 33]);
    }

    #[test]
    fn scale_invariant() {
        assert_eq!(
            normalize(&[2.0, 2.0, 2.0]).unwrap(),
            normalize(&[1.0, 1.0, 1.0]).unwrap()
        );
        assert_eq!(
            normalize(&[30.0, 70.0]).unwrap(),
            normalize(&[0.3, 0.7]).unwrap()
        );
    }

    #[test]
    fn single_element() {
        assert_eq!(normalize(&[7.5]).unwrap(), vec![100]);
        assert_eq!(normalize(&[0.0]).unwrap(), vec![100]);
    }

    #[test]
    fn empty() {
        assert!(normalize(&[]).unwrap().is_empty());
    }

    #[test]
    fn all_zero_is_uniform() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0, 0.0]).unwrap(), vec![25, 25, 25, 25]);
    }

    #[test]
    fn negative_rejected() {
        assert!(matches!(
            normalize(&[50.0, -1.0]),
            Err(RiesError::InvalidInput(_))
        ));
    }

    #[test]
    fn nan_rejected() {
        assert!(normalize(&[f64::NAN]).is_err());
    }

    #[test]
    fn zero_weight_keeps_slot() {
        let out = normalize(&[0.0, 50.0, 50.0]).unwrap();
        assert_eq!(out, vec![0, 50, 50]);
    }

    #[test]
    fn sum_and_length_hold_for_awkward_inputs() {
        let cases: [&[f64]; 5] = [
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            &[0.001, 1000.0],
            &[33.0, 33.0, 33.0],
            &[1.0; 101],
            &[0.1, 0.2, 0.3],
        ];
        for weights in cases {
            let out = normalize(weights).unwrap();
            assert_eq!(out.len(), weights.len());
            assert_eq!(out.iter().sum::<u32>(), 100, "input {weights:?}");
        }
    }

    #[test]
    fn deviation_from_exact_share_is_below_one() {
        let weights = [3.0, 5.0, 11.0, 13.0];
        let total: f64 = weights.iter().sum();
        let out = normalize(&weights).unwrap();
        for (w, n) in weights.iter().zip(&out) {
            let exact = w / total * 100.0;
            assert!((f64::from(*n) - exact).abs() < 1.0, "{n} vs {exact}");
        }
    }
}
