pub mod bounds;
pub mod closeness;
pub mod config;
pub mod constants;
pub mod decimal;
pub mod enumerator;
pub mod error;
pub mod io_utils;
pub mod polynomial;
pub mod protocol;
pub mod report;
pub mod search;
pub mod worker;

pub use bounds::{BoundEstimator, Cancelled, EvaluationBounds, Reachability};
pub use closeness::{ClosenessTest, EpsilonCloseness, ExactDigitCloseness};
pub use config::{ClosenessPolicy, SearchConfig, Strategy};
pub use constants::{liouville, Constant, EvaluationPoint};
pub use decimal::{Arithmetic, Decimal};
pub use enumerator::{CoefficientEnumerator, Region};
pub use error::{RecoveryError, Result};
pub use polynomial::{evaluate, parse_coefficients, Polynomial};
pub use protocol::{Command, Match, SearchEvent};
pub use report::{Outcome, SearchReport};
pub use search::{SearchOutcome, SearchSession, SearchState};
pub use worker::{SearchService, SearchWorker};
