use polyrecover::polynomial::evaluate_direct;
use polyrecover::{
    evaluate, liouville, Arithmetic, ClosenessPolicy, CoefficientEnumerator, Decimal,
    EvaluationPoint, SearchConfig, SearchEvent, SearchOutcome, SearchSession, Strategy,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn run(config: SearchConfig) -> (SearchSession, Vec<SearchEvent>, SearchOutcome) {
    let mut session = SearchSession::new(config).unwrap();
    let mut events = Vec::new();
    let outcome = session.run(|event| events.push(event), || false).unwrap();
    (session, events, outcome)
}

#[test]
fn test_horner_matches_direct_summation_for_random_polynomials() {
    let mut rng = StdRng::seed_from_u64(196);
    let arith = Arithmetic::new(80).unwrap();
    let x = liouville(&arith);
    let tolerance = Decimal::power_of_ten(-70);

    for _ in 0..200 {
        let degree = rng.gen_range(0..=8);
        let mut coefficients: Vec<u64> = (0..=degree).map(|_| rng.gen_range(0..=20)).collect();
        coefficients[degree] = rng.gen_range(1..=20);

        let horner = evaluate(&coefficients, &x, &arith);
        let direct = evaluate_direct(&coefficients, &x, &arith).unwrap();
        let difference = arith.abs(&arith.subtract(&horner, &direct));
        assert!(
            difference < tolerance,
            "{:?}: {} vs {}",
            coefficients,
            horner,
            direct
        );
    }
}

#[test]
fn test_horner_matches_direct_summation_at_random_points() {
    let mut rng = StdRng::seed_from_u64(1729);
    let arith = Arithmetic::new(80).unwrap();
    let tolerance = Decimal::power_of_ten(-70);

    for _ in 0..200 {
        // x in (0, 1) with up to 30 random decimals
        let places: String = (0..rng.gen_range(1..=30))
            .map(|_| char::from(rng.gen_range(b'0'..=b'9')))
            .collect();
        let x: Decimal = format!("0.{}{}", rng.gen_range(1..=9), places).parse().unwrap();

        let degree = rng.gen_range(0..=8);
        let mut coefficients: Vec<u64> = (0..=degree).map(|_| rng.gen_range(0..=20)).collect();
        coefficients[degree] = rng.gen_range(1..=20);

        let horner = evaluate(&coefficients, &x, &arith);
        let direct = evaluate_direct(&coefficients, &x, &arith).unwrap();
        let difference = arith.abs(&arith.subtract(&horner, &direct));
        assert!(
            difference < tolerance,
            "{:?} at {}: {} vs {}",
            coefficients,
            x,
            horner,
            direct
        );
    }
}

#[test]
fn test_constant_polynomials_are_exact() {
    let arith = Arithmetic::new(10).unwrap();
    let x = liouville(&arith);
    for c in [1u64, 7, 1_000_000_007, u64::MAX] {
        assert_eq!(evaluate(&[c], &x, &arith), Decimal::from(c));
    }
}

#[test]
fn test_no_linear_polynomial_reaches_target() {
    let config = SearchConfig {
        target_value: "0.75".to_string(),
        strategy: Strategy::Bounded {
            max_degree: 1,
            max_coeff: 5,
        },
        ..SearchConfig::default()
    };
    let (session, events, outcome) = run(config);

    assert!(session.matches().is_empty());
    assert!(matches!(outcome, SearchOutcome::Completed { .. }));
    assert!(!events.iter().any(|event| matches!(event, SearchEvent::Match(_))));

    // confirm by brute force over all 30 candidates of region (1, 5)
    let arith = Arithmetic::new(50).unwrap();
    let x = liouville(&arith);
    let target: Decimal = "0.75".parse().unwrap();
    let epsilon: Decimal = "1e-40".parse().unwrap();
    let candidates: Vec<Vec<u64>> = CoefficientEnumerator::new(1, 5).collect();
    assert_eq!(candidates.len(), 30);
    for coefficients in candidates {
        let value = evaluate(&coefficients, &x, &arith);
        assert!(arith.abs(&arith.subtract(&value, &target)) >= epsilon);
    }
}

#[test]
fn test_liouville_target_is_matched_by_x_alone() {
    let arith = Arithmetic::new(50).unwrap();
    let target = liouville(&arith).to_string();
    assert_eq!(target, "0.110001000000000000000001");

    let config = SearchConfig {
        target_value: target,
        strategy: Strategy::Bounded {
            max_degree: 1,
            max_coeff: 5,
        },
        ..SearchConfig::default()
    };
    let (session, _, outcome) = run(config);

    let found: Vec<Vec<u64>> = session
        .matches()
        .iter()
        .map(|found| found.coefficients.clone())
        .collect();
    assert_eq!(found, vec![vec![0, 1]]);
    assert!(matches!(outcome, SearchOutcome::Completed { tested: 30, .. }));
}

#[test]
fn test_recovers_quadratic_from_its_value() {
    let arith = Arithmetic::new(60).unwrap();
    let x = liouville(&arith);
    let hidden = [2u64, 0, 3];
    let target = evaluate(&hidden, &x, &arith);

    let config = SearchConfig {
        target_value: target.to_string(),
        precision: 60,
        closeness: ClosenessPolicy::Epsilon {
            epsilon: "1e-45".to_string(),
        },
        strategy: Strategy::Bounded {
            max_degree: 3,
            max_coeff: 4,
        },
        ..SearchConfig::default()
    };
    let (session, _, _) = run(config);

    let found: Vec<&Vec<u64>> = session
        .matches()
        .iter()
        .map(|found| &found.coefficients)
        .collect();
    assert_eq!(found, vec![&vec![2, 0, 3]]);
    assert_eq!(
        session.matches()[0].polynomial().unwrap().to_string(),
        "3x^2 + 2"
    );
}

#[test]
fn test_exact_digit_policy_finds_match() {
    // 1 + x to 20 places; the 10^-24 term of x is beyond the compared digits
    let config = SearchConfig {
        target_value: "1.11000100000000000000".to_string(),
        closeness: ClosenessPolicy::ExactDigits { digits: 20 },
        strategy: Strategy::Bounded {
            max_degree: 2,
            max_coeff: 3,
        },
        ..SearchConfig::default()
    };
    let (session, _, _) = run(config);
    assert_eq!(session.matches().len(), 1);
    assert_eq!(session.matches()[0].coefficients, vec![1, 1]);
}

#[test]
fn test_other_evaluation_points() {
    for point in ["e_frac", "pi_frac_plus1", "0.3"] {
        let point: EvaluationPoint = point.parse().unwrap();
        let arith = Arithmetic::new(50).unwrap();
        let x = point.value(&arith).unwrap();
        let target = evaluate(&[4, 1], &x, &arith);

        let config = SearchConfig {
            target_value: target.to_string(),
            evaluation_point: point.clone(),
            strategy: Strategy::Bounded {
                max_degree: 1,
                max_coeff: 5,
            },
            ..SearchConfig::default()
        };
        let (session, _, _) = run(config);
        assert!(
            session.matches().iter().any(|found| found.coefficients == vec![4, 1]),
            "x + 4 not recovered at {}",
            point
        );
    }
}

#[test]
fn test_bounded_tested_equals_reported_total() {
    let config = SearchConfig {
        target_value: "2.345".to_string(),
        progress_interval: 1,
        strategy: Strategy::Bounded {
            max_degree: 4,
            max_coeff: 4,
        },
        ..SearchConfig::default()
    };
    let (_, events, outcome) = run(config);

    let SearchOutcome::Completed { tested, .. } = outcome else {
        panic!("expected completion");
    };
    let last_progress = events
        .iter()
        .rev()
        .find_map(|event| match event {
            SearchEvent::Progress {
                tested,
                total,
                percentage,
                ..
            } => Some((*tested, *total, *percentage)),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_progress.0, tested);
    assert_eq!(last_progress.1, Some(tested));
    assert_eq!(last_progress.2, Some(100.0));
}

#[test]
fn test_terminal_event_is_last_and_unique() {
    let (_, events, _) = run(SearchConfig::default());
    let terminal: Vec<&SearchEvent> = events.iter().filter(|event| event.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert!(events.last().unwrap().is_terminal());
}
