use num_traits::{Signed, ToPrimitive};
use rayon::prelude::*;

use crate::decimal::{Arithmetic, Decimal};
use crate::enumerator::Region;
use crate::error::Result;
use crate::polynomial::evaluate;

/// Smallest and largest value any polynomial of a region can take at `x`.
///
/// With `0 < x` and non-negative coefficients the minimum is `x^degree`
/// (leading coefficient 1, everything else 0) and the maximum is
/// `max_coeff · Σ x^i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationBounds {
    pub min_eval: Decimal,
    pub max_eval: Decimal,
}

/// Where a region sits relative to the acceptance window
/// `[target - radius, target + radius]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Reachable,
    /// Even the largest polynomial of the region stays under the window.
    BelowTarget,
    /// Even the smallest polynomial of the region lands above the window.
    AboveTarget,
}

/// Range analysis used to prune regions that cannot contain a match.
///
/// All bounds go through the session [`Arithmetic`] with the same Horner
/// evaluation as the candidates themselves. Rounding is monotone, so a
/// candidate never evaluates outside the computed bounds of its region.
#[derive(Debug, Clone)]
pub struct BoundEstimator {
    arith: Arithmetic,
    x: Decimal,
    lower_edge: Decimal,
    upper_edge: Decimal,
}

impl BoundEstimator {
    pub fn new(arith: Arithmetic, x: Decimal, target: Decimal, radius: Decimal) -> Self {
        let lower_edge = arith.subtract(&target, &radius);
        let upper_edge = arith.add(&target, &radius);
        BoundEstimator {
            arith,
            x,
            lower_edge,
            upper_edge,
        }
    }

    /// Lowest value a match may take, `target - radius`.
    pub fn lower_edge(&self) -> &Decimal {
        &self.lower_edge
    }

    pub fn evaluation_bounds(&self, degree: usize, max_coeff: u64) -> EvaluationBounds {
        EvaluationBounds {
            min_eval: self.min_eval(degree),
            max_eval: self.max_eval(degree, max_coeff),
        }
    }

    fn min_eval(&self, degree: usize) -> Decimal {
        let mut smallest = vec![0; degree + 1];
        smallest[degree] = 1;
        evaluate(&smallest, &self.x, &self.arith)
    }

    fn max_eval(&self, degree: usize, max_coeff: u64) -> Decimal {
        evaluate(&vec![max_coeff; degree + 1], &self.x, &self.arith)
    }

    /// Inclusive at both edges: a bound exactly on the window edge stays
    /// reachable.
    pub fn classify(&self, degree: usize, max_coeff: u64) -> Reachability {
        if self.min_eval(degree) > self.upper_edge {
            Reachability::AboveTarget
        } else if self.max_eval(degree, max_coeff) < self.lower_edge {
            Reachability::BelowTarget
        } else {
            Reachability::Reachable
        }
    }

    pub fn can_reach_target(&self, degree: usize, max_coeff: u64) -> bool {
        self.classify(degree, max_coeff) == Reachability::Reachable
    }

    /// `⌈target / Σ_{i=0..degree} x^i⌉`, at least 1.
    ///
    /// The smallest coefficient bound whose all-equal polynomial reaches
    /// `target` in exact arithmetic. Saturates at `u64::MAX`.
    pub fn estimate_required_max_coeff(&self, degree: usize, target: &Decimal) -> Result<u64> {
        let geometric_sum = self.max_eval(degree, 1);
        let ratio = self.arith.divide(target, &geometric_sum)?;
        let estimate = ratio.ceil()?;
        if !estimate.is_positive() {
            return Ok(1);
        }
        Ok(estimate.to_u64().unwrap_or(u64::MAX))
    }

    /// Smallest `max_coeff` in `[1, ceiling]` for which the region of
    /// `degree` is reachable, if any.
    ///
    /// Reachability only ever switches from below to reachable as
    /// `max_coeff` grows, so the boundary is found by narrowing an interval.
    /// Each round points one point per rayon thread in parallel, and
    /// `should_stop` is polled before every round.
    pub fn smallest_reachable_max_coeff<S>(
        &self,
        degree: usize,
        ceiling: u64,
        should_stop: &mut S,
    ) -> std::result::Result<Option<u64>, Cancelled>
    where
        S: FnMut() -> bool,
    {
        if should_stop() {
            return Err(Cancelled);
        }
        if ceiling == 0 || !self.can_reach_target(degree, ceiling) {
            return Ok(None);
        }

        let fan_out = rayon::current_num_threads().max(1) as u128;
        let (mut low, mut high) = (1u64, ceiling);
        while low < high {
            if should_stop() {
                return Err(Cancelled);
            }
            // points lie in [low, high - 1], increasing
            let span = (high - low) as u128;
            let count = fan_out.min(span);
            let mut points: Vec<u64> = (1..=count)
                .map(|i| low + (span * i / (count + 1)) as u64)
                .collect();
            points.dedup();

            let reachable: Vec<bool> = points
                .par_iter()
                .map(|&max_coeff| self.can_reach_target(degree, max_coeff))
                .collect();

            match reachable.iter().position(|&hit| hit) {
                Some(0) => high = points[0],
                Some(index) => {
                    high = points[index];
                    low = points[index - 1] + 1;
                }
                None => low = points[points.len() - 1] + 1,
            }
        }
        Ok(Some(low))
    }

    /// Number of polynomials a bounded search over `max_degree` and
    /// `ceiling` will evaluate once unreachable regions are pruned.
    pub fn reachable_total<S>(
        &self,
        max_degree: usize,
        ceiling: u64,
        should_stop: &mut S,
    ) -> std::result::Result<u64, Cancelled>
    where
        S: FnMut() -> bool,
    {
        let mut total = 0u64;
        for degree in 0..=max_degree {
            let first = self.smallest_reachable_max_coeff(degree, ceiling, should_stop)?;
            if let Some(first) = first {
                let shells = Region::new(degree, ceiling).shell_size(first - 1);
                total = total.saturating_add(shells);
            }
        }
        Ok(total)
    }
}

/// A bound computation abandoned because a stop was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::CoefficientEnumerator;

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn estimator(target: &str, radius: &str) -> BoundEstimator {
        BoundEstimator::new(
            Arithmetic::new(50).unwrap(),
            dec("0.110001000000000000000001"),
            dec(target),
            dec(radius),
        )
    }

    #[test]
    fn test_bounds_enclose_every_evaluation() {
        let bounds = estimator("1", "1e-40");
        let arith = Arithmetic::new(50).unwrap();
        let x = dec("0.110001000000000000000001");
        for degree in 0..=3 {
            for max_coeff in 1..=4 {
                let EvaluationBounds { min_eval, max_eval } =
                    bounds.evaluation_bounds(degree, max_coeff);
                for coefficients in CoefficientEnumerator::new(degree, max_coeff) {
                    let value = evaluate(&coefficients, &x, &arith);
                    assert!(value >= min_eval && value <= max_eval);
                }
            }
        }
    }

    #[test]
    fn test_pruning_never_hides_a_match() {
        let arith = Arithmetic::new(50).unwrap();
        let x = dec("0.110001000000000000000001");
        // Targets taken from real polynomials so there is always something to find.
        for target_coefficients in [vec![3], vec![1, 2], vec![0, 0, 1], vec![5, 0, 4, 1]] {
            let target = evaluate(&target_coefficients, &x, &arith);
            let bounds = BoundEstimator::new(arith, x.clone(), target.clone(), dec("1e-30"));
            for degree in 0..=4 {
                for max_coeff in 1..=6 {
                    if bounds.can_reach_target(degree, max_coeff) {
                        continue;
                    }
                    for coefficients in CoefficientEnumerator::new(degree, max_coeff) {
                        let value = evaluate(&coefficients, &x, &arith);
                        let difference = arith.abs(&arith.subtract(&value, &target));
                        assert!(difference > dec("1e-30"), "{:?} pruned", coefficients);
                    }
                }
            }
        }
    }

    #[test]
    fn test_reachability_is_inclusive() {
        // x^0 = 1, so the constant region's minimum sits exactly on the upper edge.
        let bounds = estimator("0.5", "0.5");
        assert_eq!(bounds.classify(0, 1), Reachability::Reachable);
        // max for degree 0, max_coeff 2 is 2, exactly on the lower edge.
        let bounds = estimator("2.5", "0.5");
        assert_eq!(bounds.classify(0, 2), Reachability::Reachable);
        assert_eq!(bounds.classify(0, 1), Reachability::BelowTarget);
    }

    #[test]
    fn test_classify_above_target() {
        let bounds = estimator("0.001", "1e-40");
        assert_eq!(bounds.classify(0, 5), Reachability::AboveTarget);
        assert_eq!(bounds.classify(4, 5), Reachability::Reachable);
    }

    #[test]
    fn test_estimate_required_max_coeff() {
        let bounds = estimator("1", "1e-40");
        // 1 + x = 1.110001..., so 100 / (1 + x) = 90.08...
        assert_eq!(bounds.estimate_required_max_coeff(1, &dec("100")).unwrap(), 91);
        assert_eq!(bounds.estimate_required_max_coeff(0, &dec("100")).unwrap(), 100);
        assert_eq!(bounds.estimate_required_max_coeff(3, &dec("0.5")).unwrap(), 1);
        assert_eq!(bounds.estimate_required_max_coeff(2, &dec("-4")).unwrap(), 1);
        assert_eq!(
            bounds.estimate_required_max_coeff(0, &dec("1e30")).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn test_smallest_reachable_matches_linear_scan() {
        let bounds = estimator("37.25", "1e-40");
        for degree in 0..=5 {
            let scanned = (1..=60).find(|&m| bounds.can_reach_target(degree, m));
            assert_eq!(
                bounds.smallest_reachable_max_coeff(degree, 60, &mut || false),
                Ok(scanned)
            );
        }
    }

    #[test]
    fn test_reachable_total_counts_unpruned_polynomials() {
        let bounds = estimator("7.3", "1e-40");
        let (max_degree, ceiling) = (3, 9);
        let mut expected = 0u64;
        for degree in 0..=max_degree {
            for max_coeff in 1..=ceiling {
                if bounds.can_reach_target(degree, max_coeff) {
                    expected += Region::new(degree, max_coeff).shell_size(max_coeff - 1);
                }
            }
        }
        assert_eq!(
            bounds.reachable_total(max_degree, ceiling, &mut || false),
            Ok(expected)
        );
    }

    #[test]
    fn test_smallest_reachable_with_huge_ceiling() {
        let bounds = estimator("1000000000", "1e-40");
        assert_eq!(
            bounds.smallest_reachable_max_coeff(0, 1_000_000_000_000, &mut || false),
            Ok(Some(1_000_000_000))
        );
        assert_eq!(
            bounds.smallest_reachable_max_coeff(0, 999_999_999, &mut || false),
            Ok(None)
        );
    }

    #[test]
    fn test_reachable_total_stops_when_asked() {
        let bounds = estimator("37.25", "1e-40");
        let mut polls = 0;
        let mut stop_on_third_poll = || {
            polls += 1;
            polls >= 3
        };
        assert_eq!(
            bounds.reachable_total(400, 1_000_000_000_000, &mut stop_on_third_poll),
            Err(Cancelled)
        );
        assert_eq!(polls, 3);
    }
}
