use serde::{Deserialize, Serialize};

/// One stratum of the search space: every polynomial of exactly `degree`
/// whose coefficients are all at most `max_coeff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub degree: usize,
    pub max_coeff: u64,
}

fn count_up_to(degree: usize, bound: u64) -> Option<u128> {
    let bound = bound as u128;
    (bound + 1)
        .checked_pow(degree as u32)
        .and_then(|tail| tail.checked_mul(bound))
}

impl Region {
    pub fn new(degree: usize, max_coeff: u64) -> Self {
        Region { degree, max_coeff }
    }

    /// `max_coeff × (max_coeff + 1)^degree`, saturating at `u64::MAX`.
    pub fn combinations(&self) -> u64 {
        self.shell_size(0)
    }

    /// Number of polynomials in the region whose largest coefficient is
    /// above `floor`, saturating at `u64::MAX`.
    pub fn shell_size(&self, floor: u64) -> u64 {
        if floor >= self.max_coeff {
            return 0;
        }
        match (
            count_up_to(self.degree, self.max_coeff),
            count_up_to(self.degree, floor),
        ) {
            (Some(all), Some(covered)) => u64::try_from(all - covered).unwrap_or(u64::MAX),
            _ => u64::MAX,
        }
    }

    pub fn enumerate(&self) -> CoefficientEnumerator {
        CoefficientEnumerator::new(self.degree, self.max_coeff)
    }
}

/// Lazily walks every coefficient sequence of a [`Region`].
///
/// The state is an odometer over coefficient positions: the constant term
/// turns fastest and the leading coefficient slowest, so sequences come out
/// in lexicographic order of `(c_degree, ..., c_0)`. The leading position
/// runs over `[1, max_coeff]`, every other position over `[0, max_coeff]`.
///
/// A shell enumerator keeps the same order but only stops on sequences that
/// contain `max_coeff`: whenever the odometer lands on a prefix without it,
/// the constant term jumps straight to `max_coeff`, the smallest completion
/// that does. Each step therefore costs `O(degree)` however large the
/// coefficients are.
///
/// A fresh enumerator always restarts from the first sequence, and a
/// partially consumed one can be kept and resumed later.
#[derive(Debug, Clone)]
pub struct CoefficientEnumerator {
    region: Region,
    shell_only: bool,
    current: Vec<u64>,
    exhausted: bool,
    position: u64,
}

impl CoefficientEnumerator {
    pub fn new(degree: usize, max_coeff: u64) -> Self {
        Self::start(Region::new(degree, max_coeff), false)
    }

    /// Only the sequences whose largest coefficient is exactly `max_coeff`,
    /// i.e. the part of the region not already covered by `max_coeff - 1`.
    pub fn shell(degree: usize, max_coeff: u64) -> Self {
        Self::start(Region::new(degree, max_coeff), true)
    }

    fn start(region: Region, shell_only: bool) -> Self {
        let mut current = vec![0; region.degree + 1];
        current[region.degree] = 1;

        let mut enumerator = CoefficientEnumerator {
            region,
            shell_only,
            current,
            exhausted: region.max_coeff == 0,
            position: 0,
        };
        enumerator.complete_shell();
        enumerator
    }

    /// Sequences yielded so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn advance(&mut self) {
        let max = self.region.max_coeff;
        let leading = self.region.degree;

        for index in 0..=leading {
            if self.current[index] < max {
                self.current[index] += 1;
                self.complete_shell();
                return;
            }
            if index == leading {
                break;
            }
            self.current[index] = 0;
        }
        self.exhausted = true;
    }

    /// Every position below the one just incremented is zero, or the
    /// constant term itself was incremented, so raising the constant term to
    /// `max_coeff` is the next sequence in order that belongs to the shell.
    fn complete_shell(&mut self) {
        let max = self.region.max_coeff;
        if self.shell_only && !self.exhausted && !self.current.contains(&max) {
            self.current[0] = max;
        }
    }
}

impl Iterator for CoefficientEnumerator {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let candidate = self.current.clone();
        self.advance();
        self.position += 1;
        Some(candidate)
    }
}
