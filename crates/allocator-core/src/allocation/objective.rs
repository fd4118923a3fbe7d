//! Allocation objective.
//!
//! ```text
//! adjusted_return(w)    = sum(mu_i * w_i) - c * sum(|w_i|)
//! volatility(w)         = sqrt(w' * Sigma * w)
//! dispersion_penalty(w) = sum((w_i - mean(w))^2)
//! objective(w)          = -(rt * adjusted_return(w) - (1 - rt) * volatility(w))
//!                         + dispersion_penalty(w)
//! ```
//!
//! The dispersion penalty is centred on the realised mean of `w`, not on 1/n.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::statistics::ReturnStatistics;
use crate::types::{RiskTolerance, TransactionCost};

/// A differentiable scalar function of the weight vector.
///
/// `None` signals a numerical breakdown (overflow) at `w`.
pub trait SmoothObjective {
    fn value(&self, w: &[Decimal]) -> Option<Decimal>;
    fn gradient(&self, w: &[Decimal]) -> Option<Vec<Decimal>>;
}

/// Return / volatility / dispersion trade-off for one request.
#[derive(Debug, Clone, Copy)]
pub struct AllocationObjective<'a> {
    statistics: &'a ReturnStatistics,
    transaction_cost: Decimal,
    risk_tolerance: Decimal,
}

impl<'a> AllocationObjective<'a> {
    pub fn new(
        statistics: &'a ReturnStatistics,
        transaction_cost: TransactionCost,
        risk_tolerance: RiskTolerance,
    ) -> Self {
        AllocationObjective {
            statistics,
            transaction_cost: transaction_cost.value(),
            risk_tolerance: risk_tolerance.value(),
        }
    }

    pub fn adjusted_return(&self, w: &[Decimal]) -> Option<Decimal> {
        adjusted_return(w, self.statistics.expected_returns(), self.transaction_cost)
    }

    pub fn volatility(&self, w: &[Decimal]) -> Option<Decimal> {
        volatility(w, self.statistics.covariance())
    }
}

impl SmoothObjective for AllocationObjective<'_> {
    fn value(&self, w: &[Decimal]) -> Option<Decimal> {
        let ret = self.adjusted_return(w)?;
        let vol = self.volatility(w)?;
        let rt = self.risk_tolerance;
        let performance = rt
            .checked_mul(ret)?
            .checked_sub((Decimal::ONE - rt).checked_mul(vol)?)?;
        dispersion_penalty(w)?.checked_sub(performance)
    }

    fn gradient(&self, w: &[Decimal]) -> Option<Vec<Decimal>> {
        let mu = self.statistics.expected_returns();
        let sigma_w = mat_vec_multiply(self.statistics.covariance(), w)?;
        let vol = self.volatility(w)?;
        let rt = self.risk_tolerance;
        let mean_w = mean(w)?;

        // d/dw_j sum((w_i - m)^2) = 2 (w_j - m); the mean term cancels.
        (0..w.len())
            .map(|j| {
                let d_ret = mu[j].checked_sub(self.transaction_cost * sign(w[j]))?;
                let d_vol = if vol.is_zero() {
                    Decimal::ZERO
                } else {
                    sigma_w[j].checked_div(vol)?
                };
                let d_perf = rt
                    .checked_mul(d_ret)?
                    .checked_sub((Decimal::ONE - rt).checked_mul(d_vol)?)?;
                let d_penalty = dec!(2).checked_mul(w[j].checked_sub(mean_w)?)?;
                d_penalty.checked_sub(d_perf)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Portfolio measures
// ---------------------------------------------------------------------------
//
// Each measure returns `None` when an intermediate leaves the decimal range.

/// Expected return net of a proportional charge on gross exposure.
pub fn adjusted_return(w: &[Decimal], mu: &[Decimal], transaction_cost: Decimal) -> Option<Decimal> {
    let exposure = checked_sum(w.iter().map(|wi| wi.abs()))?;
    gross_return(w, mu)?.checked_sub(transaction_cost.checked_mul(exposure)?)
}

pub fn gross_return(w: &[Decimal], mu: &[Decimal]) -> Option<Decimal> {
    vec_dot(w, mu)
}

/// Portfolio standard deviation `sqrt(w' * Sigma * w)`.
///
/// Rounding can leave a PSD quadratic form marginally below zero; that is
/// read as zero variance.
pub fn volatility(w: &[Decimal], sigma: &[Vec<Decimal>]) -> Option<Decimal> {
    let variance = vec_dot(w, &mat_vec_multiply(sigma, w)?)?;
    if variance <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }
    variance.sqrt()
}

pub fn dispersion_penalty(w: &[Decimal]) -> Option<Decimal> {
    let m = mean(w)?;
    w.iter().try_fold(Decimal::ZERO, |acc, wi| {
        let d = wi.checked_sub(m)?;
        acc.checked_add(d.checked_mul(d)?)
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn mean(w: &[Decimal]) -> Option<Decimal> {
    if w.is_empty() {
        return Some(Decimal::ZERO);
    }
    checked_sum(w.iter().copied())?.checked_div(Decimal::from(w.len() as i64))
}

/// Right derivative of `|x|`; weights never go below zero.
fn sign(x: Decimal) -> Decimal {
    if x < Decimal::ZERO {
        Decimal::NEGATIVE_ONE
    } else {
        Decimal::ONE
    }
}

fn checked_sum(mut values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    values.try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

fn vec_dot(a: &[Decimal], b: &[Decimal]) -> Option<Decimal> {
    a.iter()
        .zip(b.iter())
        .try_fold(Decimal::ZERO, |acc, (x, y)| acc.checked_add(x.checked_mul(*y)?))
}

fn mat_vec_multiply(mat: &[Vec<Decimal>], v: &[Decimal]) -> Option<Vec<Decimal>> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stats() -> ReturnStatistics {
        ReturnStatistics::new(
            vec!["A".into(), "B".into()],
            vec![dec!(0.10), dec!(0.06)],
            vec![vec![dec!(0.04), dec!(0.006)], vec![dec!(0.006), dec!(0.01)]],
        )
        .unwrap()
    }

    fn objective(stats: &ReturnStatistics, tc: Decimal, rt: Decimal) -> AllocationObjective<'_> {
        AllocationObjective::new(
            stats,
            TransactionCost::new(tc).unwrap(),
            RiskTolerance::new(rt).unwrap(),
        )
    }

    #[test]
    fn test_adjusted_return_deducts_cost() {
        let w = [dec!(0.5), dec!(0.5)];
        let r = adjusted_return(&w, &[dec!(0.10), dec!(0.06)], dec!(0.01));
        assert_eq!(r, Some(dec!(0.07)));
    }

    #[test]
    fn test_volatility() {
        // variance = 0.25*0.04 + 2*0.25*0.006 + 0.25*0.01 = 0.0155
        let s = stats();
        let vol = volatility(&[dec!(0.5), dec!(0.5)], s.covariance()).unwrap();
        assert!((vol * vol - dec!(0.0155)).abs() < dec!(0.0000000001));
    }

    #[test]
    fn test_volatility_zero_covariance() {
        let sigma = vec![vec![Decimal::ZERO; 2]; 2];
        assert_eq!(volatility(&[dec!(0.3), dec!(0.7)], &sigma), Some(Decimal::ZERO));
    }

    #[test]
    fn test_dispersion_penalty_uses_realised_mean() {
        assert_eq!(dispersion_penalty(&[dec!(0.5), dec!(0.5)]), Some(Decimal::ZERO));
        // mean 0.5: (0.5)^2 + (0.5)^2
        assert_eq!(dispersion_penalty(&[dec!(1), dec!(0)]), Some(dec!(0.5)));
        // off-simplex vector: centred on its own mean (2), not on 1/n
        assert_eq!(dispersion_penalty(&[dec!(2), dec!(2)]), Some(Decimal::ZERO));
    }

    #[test]
    fn test_single_weight_has_no_penalty() {
        assert_eq!(dispersion_penalty(&[Decimal::ONE]), Some(Decimal::ZERO));
    }

    #[test]
    fn test_value_composition() {
        let s = stats();
        let f = objective(&s, dec!(0), dec!(1));
        // rt = 1: -(return) + penalty
        let v = f.value(&[dec!(1), dec!(0)]).unwrap();
        assert_eq!(v, dec!(-0.10) + dec!(0.5));
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let s = stats();
        let f = objective(&s, dec!(0.002), dec!(0.4));
        let w = vec![dec!(0.3), dec!(0.7)];
        let g = f.gradient(&w).unwrap();
        let h = dec!(0.000001);
        for j in 0..w.len() {
            let mut up = w.clone();
            let mut down = w.clone();
            up[j] += h;
            down[j] -= h;
            let fd = (f.value(&up).unwrap() - f.value(&down).unwrap()) / (dec!(2) * h);
            assert!(
                (fd - g[j]).abs() < dec!(0.00001),
                "component {}: analytic {} vs numeric {}",
                j,
                g[j],
                fd
            );
        }
    }

    #[test]
    fn test_measures_report_overflow() {
        let huge = [Decimal::MAX, Decimal::MAX];
        assert_eq!(gross_return(&[dec!(1), dec!(1)], &huge), None);
        assert_eq!(adjusted_return(&[dec!(1), dec!(1)], &huge, dec!(0)), None);
        assert_eq!(dispersion_penalty(&[Decimal::MAX, Decimal::MIN]), None);
        let sigma = vec![huge.to_vec(), huge.to_vec()];
        assert_eq!(volatility(&[dec!(1), dec!(1)], &sigma), None);
    }

    #[test]
    fn test_objective_overflow_is_none() {
        let s = ReturnStatistics::new(
            vec!["A".into(), "B".into()],
            vec![Decimal::MAX, Decimal::MAX],
            vec![vec![dec!(0.04), dec!(0)], vec![dec!(0), dec!(0.04)]],
        )
        .unwrap();
        let f = objective(&s, dec!(0), dec!(1));
        assert_eq!(f.value(&[dec!(1), dec!(1)]), None);
    }
}
