use log::{debug, error, info};
use std::time::Instant;

use crate::bounds::{BoundEstimator, Cancelled, Reachability};
use crate::closeness::ClosenessTest;
use crate::config::{SearchConfig, Strategy};
use crate::decimal::{Arithmetic, Decimal};
use crate::enumerator::CoefficientEnumerator;
use crate::error::Result;
use crate::polynomial::evaluate;
use crate::protocol::{Match, SearchEvent};

/// Unbounded searches report the first pruned region and then every
/// hundredth one.
const SKIP_MESSAGE_INTERVAL: u64 = 100;

/// Mutable bookkeeping of one running session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub running: bool,
    pub tested: u64,
    pub degree: usize,
    pub max_coeff: u64,
    pub skipped_regions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Completed { tested: u64, elapsed_ms: u64 },
    Stopped { tested: u64 },
}

enum Flow {
    Finished,
    Stopped,
}

/// How far the unbounded strategy got within one degree.
///
/// Every polynomial of the degree with all coefficients at most `covered`
/// has been evaluated or proven unreachable; `shell` holds the partially
/// consumed next layer, if any.
#[derive(Debug, Default)]
struct DegreeFrontier {
    covered: u64,
    shell: Option<CoefficientEnumerator>,
}

/// One search, from start to `complete`, `search-stopped` or `error`.
///
/// All arithmetic runs through the session's own [`Arithmetic`], fixed from
/// the configured precision before the evaluation point is generated.
#[derive(Debug)]
pub struct SearchSession {
    config: SearchConfig,
    arith: Arithmetic,
    x: Decimal,
    target: Decimal,
    closeness: Box<dyn ClosenessTest>,
    bounds: BoundEstimator,
    state: SearchState,
    matches: Vec<Match>,
}

impl SearchSession {
    pub fn new(config: SearchConfig) -> Result<Self> {
        config.validate()?;

        let arith = Arithmetic::new(config.precision)?;
        let x = config.evaluation_point.value(&arith)?;
        let target: Decimal = config.target_value.parse()?;
        let closeness = config.closeness.tester(arith)?;
        let bounds = BoundEstimator::new(
            arith,
            x.clone(),
            target.clone(),
            closeness.acceptance_radius(),
        );

        debug!(
            "session ready: x = {} ({}), {}",
            x,
            config.evaluation_point.description(),
            closeness.describe()
        );

        Ok(SearchSession {
            config,
            arith,
            x,
            target,
            closeness,
            bounds,
            state: SearchState::default(),
            matches: Vec::new(),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The evaluation point as generated for this session.
    pub fn evaluation_point(&self) -> &Decimal {
        &self.x
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Run the configured strategy, streaming events to `emit`.
    ///
    /// `should_stop` is polled before every evaluation; once it returns
    /// true the session ends with `search-stopped`. Exactly one terminal
    /// event is emitted, including on error.
    pub fn run<E, S>(&mut self, mut emit: E, mut should_stop: S) -> Result<SearchOutcome>
    where
        E: FnMut(SearchEvent),
        S: FnMut() -> bool,
    {
        self.state = SearchState {
            running: true,
            ..SearchState::default()
        };
        self.matches.clear();
        let start_time = Instant::now();

        info!(
            "Starting {} search for {} at precision {}",
            self.config.strategy, self.config.target_value, self.config.precision
        );

        let flow = match self.config.strategy {
            Strategy::Bounded {
                max_degree,
                max_coeff,
            } => self.run_bounded(max_degree, max_coeff, &mut emit, &mut should_stop),
            Strategy::Unbounded { batch_size } => {
                self.run_unbounded(batch_size, &mut emit, &mut should_stop)
            }
        };
        self.state.running = false;
        let tested = self.state.tested;

        match flow {
            Ok(Flow::Finished) => {
                let elapsed_ms = start_time.elapsed().as_millis() as u64;
                info!(
                    "Search complete: {} polynomials tested, {} matches, {} regions skipped",
                    tested,
                    self.matches.len(),
                    self.state.skipped_regions
                );
                emit(SearchEvent::Complete {
                    tested,
                    time_elapsed_ms: elapsed_ms,
                });
                Ok(SearchOutcome::Completed { tested, elapsed_ms })
            }
            Ok(Flow::Stopped) => {
                info!("Search stopped after {} polynomials", tested);
                emit(SearchEvent::Stopped {
                    tested,
                    skipped_regions: self.state.skipped_regions,
                });
                Ok(SearchOutcome::Stopped { tested })
            }
            Err(e) => {
                error!("Search aborted after {} polynomials: {}", tested, e);
                emit(SearchEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run_bounded<E, S>(
        &mut self,
        max_degree: usize,
        ceiling: u64,
        emit: &mut E,
        should_stop: &mut S,
    ) -> Result<Flow>
    where
        E: FnMut(SearchEvent),
        S: FnMut() -> bool,
    {
        let total = match self.bounds.reachable_total(max_degree, ceiling, should_stop) {
            Ok(total) => total,
            Err(Cancelled) => {
                debug!("stopped while counting reachable polynomials");
                return Ok(Flow::Stopped);
            }
        };
        debug!("bounded search will evaluate {} polynomials", total);

        for degree in 0..=max_degree {
            self.state.degree = degree;
            let mut max_coeff = 1;

            while max_coeff <= ceiling {
                self.state.max_coeff = max_coeff;

                match self.bounds.classify(degree, max_coeff) {
                    Reachability::Reachable => {
                        // lower max_coeff values of this degree already covered the rest
                        for coefficients in CoefficientEnumerator::shell(degree, max_coeff) {
                            if !self.evaluate_candidate(coefficients, Some(total), emit, should_stop)
                            {
                                return Ok(Flow::Stopped);
                            }
                        }
                        max_coeff += 1;
                    }
                    Reachability::AboveTarget => {
                        self.state.skipped_regions += ceiling - max_coeff + 1;
                        debug!("degree {} above target from maxCoeff {}", degree, max_coeff);
                        self.optimization(
                            emit,
                            format!(
                                "Skipped degree {} from maxCoeff {}: x^{} alone exceeds the target",
                                degree, max_coeff, degree
                            ),
                        );
                        break;
                    }
                    Reachability::BelowTarget => {
                        if should_stop() {
                            return Ok(Flow::Stopped);
                        }
                        let next = self.next_bounded_max_coeff(degree, max_coeff, ceiling)?;
                        let skipped = next.map_or(1, |next| next - max_coeff);
                        self.state.skipped_regions += skipped;
                        debug!(
                            "region (degree {}, maxCoeff {}) below target, skipping {}",
                            degree, max_coeff, skipped
                        );

                        match next {
                            Some(next) => {
                                self.optimization(
                                    emit,
                                    format!(
                                        "Skipped region: degree={}, maxCoeff={}. Jumping to maxCoeff={}",
                                        degree, max_coeff, next
                                    ),
                                );
                                max_coeff = next;
                            }
                            None => {
                                self.optimization(
                                    emit,
                                    format!(
                                        "Skipped region: degree={}, maxCoeff={}. Coefficient ceiling reached",
                                        degree, max_coeff
                                    ),
                                );
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.optimization(
            emit,
            format!(
                "Search completed. Skipped {} impossible regions",
                self.state.skipped_regions
            ),
        );
        Ok(Flow::Finished)
    }

    /// Where to continue after `max_coeff` proved too small, or `None` when
    /// the ceiling is already reached.
    ///
    /// Jumps straight to the estimated requirement, but only when the region
    /// just below the jump target is itself proven unreachable.
    fn next_bounded_max_coeff(
        &self,
        degree: usize,
        max_coeff: u64,
        ceiling: u64,
    ) -> Result<Option<u64>> {
        if max_coeff >= ceiling {
            return Ok(None);
        }
        let step = max_coeff + 1;
        let estimate = self
            .bounds
            .estimate_required_max_coeff(degree, self.bounds.lower_edge())?;
        let jump = estimate.clamp(step, ceiling);

        if jump > step && self.bounds.classify(degree, jump - 1) != Reachability::BelowTarget {
            return Ok(Some(step));
        }
        Ok(Some(jump))
    }

    fn run_unbounded<E, S>(
        &mut self,
        batch_size: u64,
        emit: &mut E,
        should_stop: &mut S,
    ) -> Result<Flow>
    where
        E: FnMut(SearchEvent),
        S: FnMut() -> bool,
    {
        let mut frontiers: Vec<DegreeFrontier> = Vec::new();
        let mut cursor_skips = 0u64;
        let (mut degree, mut max_coeff) = (0usize, 1u64);

        loop {
            self.state.degree = degree;
            self.state.max_coeff = max_coeff;
            if frontiers.len() <= degree {
                frontiers.resize_with(degree + 1, DegreeFrontier::default);
            }
            let frontier = &mut frontiers[degree];

            let evaluated = match self.bounds.classify(degree, max_coeff) {
                Reachability::Reachable => {
                    match self.run_batch(frontier, max_coeff, batch_size, emit, should_stop) {
                        Some(evaluated) => evaluated,
                        None => return Ok(Flow::Stopped),
                    }
                }
                reachability => {
                    if reachability == Reachability::BelowTarget && frontier.covered < max_coeff {
                        frontier.covered = max_coeff;
                        frontier.shell = None;
                    }
                    self.state.skipped_regions += 1;
                    cursor_skips += 1;
                    if cursor_skips == 1 || cursor_skips % SKIP_MESSAGE_INTERVAL == 0 {
                        self.optimization(
                            emit,
                            format!("Skipped: degree={}, maxCoeff={}", degree, max_coeff),
                        );
                    }
                    0
                }
            };

            // Visits without evaluations still honour a stop request.
            if evaluated == 0 && should_stop() {
                return Ok(Flow::Stopped);
            }

            degree += 1;
            if degree as u64 > max_coeff {
                degree = 0;
                max_coeff += 1;
            }
        }
    }

    /// Evaluate up to `batch_size` not yet tested polynomials of the
    /// frontier's degree with coefficients at most `max_coeff`.
    ///
    /// Returns how many were evaluated, or `None` when a stop was requested.
    fn run_batch<E, S>(
        &mut self,
        frontier: &mut DegreeFrontier,
        max_coeff: u64,
        batch_size: u64,
        emit: &mut E,
        should_stop: &mut S,
    ) -> Option<u64>
    where
        E: FnMut(SearchEvent),
        S: FnMut() -> bool,
    {
        let degree = self.state.degree;
        let mut evaluated = 0;

        while evaluated < batch_size {
            if frontier.shell.is_none() {
                let layer = frontier.covered + 1;
                if layer > max_coeff {
                    break;
                }
                if self.bounds.classify(degree, layer) == Reachability::BelowTarget {
                    frontier.covered = layer;
                    self.state.skipped_regions += 1;
                    if should_stop() {
                        return None;
                    }
                    continue;
                }
                frontier.shell = Some(CoefficientEnumerator::shell(degree, layer));
            }

            match frontier.shell.as_mut().and_then(Iterator::next) {
                Some(coefficients) => {
                    if !self.evaluate_candidate(coefficients, None, emit, should_stop) {
                        return None;
                    }
                    evaluated += 1;
                }
                None => {
                    frontier.covered += 1;
                    frontier.shell = None;
                }
            }
        }
        Some(evaluated)
    }

    /// Returns false, without evaluating, when a stop was requested.
    fn evaluate_candidate<E, S>(
        &mut self,
        coefficients: Vec<u64>,
        total: Option<u64>,
        emit: &mut E,
        should_stop: &mut S,
    ) -> bool
    where
        E: FnMut(SearchEvent),
        S: FnMut() -> bool,
    {
        if should_stop() {
            return false;
        }

        let value = evaluate(&coefficients, &self.x, &self.arith);
        self.state.tested += 1;

        if self.closeness.matches(&value, &self.target) {
            let found = Match {
                degree: coefficients.len() - 1,
                coefficients,
                evaluation: value.to_string(),
                tested: self.state.tested,
                skipped_regions: self.state.skipped_regions,
            };
            info!("Match: {:?} evaluates to {}", found.coefficients, found.evaluation);
            self.matches.push(found.clone());
            emit(SearchEvent::Match(found));
        }

        if self.state.tested % self.config.progress_interval == 0 {
            emit(self.progress(total));
        }
        true
    }

    fn progress(&self, total: Option<u64>) -> SearchEvent {
        let percentage = total.map(|total| {
            if total == 0 {
                0.0
            } else {
                self.state.tested as f64 / total as f64 * 100.0
            }
        });
        SearchEvent::Progress {
            degree: self.state.degree,
            tested: self.state.tested,
            total,
            percentage,
            current_max_coeff: self.state.max_coeff,
            skipped_regions: self.state.skipped_regions,
        }
    }

    fn optimization<E: FnMut(SearchEvent)>(&self, emit: &mut E, message: String) {
        emit(SearchEvent::Optimization {
            message,
            skipped_regions: self.state.skipped_regions,
        });
    }
}
