use polyrecover::{
    ClosenessPolicy, Command, SearchConfig, SearchEvent, SearchService, SearchWorker, Strategy,
};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(30);

fn unbounded_config() -> SearchConfig {
    // target far above anything small polynomials reach early on
    SearchConfig {
        target_value: "123456.789".to_string(),
        closeness: ClosenessPolicy::Epsilon {
            epsilon: "1e-30".to_string(),
        },
        strategy: Strategy::Unbounded { batch_size: 100 },
        ..SearchConfig::default()
    }
}

fn drain(service: &mut SearchService) -> Vec<SearchEvent> {
    let mut events = Vec::new();
    while let Some(event) = service.recv_timeout(TIMEOUT).unwrap() {
        events.push(event);
    }
    events
}

#[test]
fn test_service_runs_bounded_search_to_completion() {
    let mut service = SearchService::new();
    service.start(SearchConfig::default()).unwrap();

    let events = drain(&mut service);

    assert!(matches!(events.last(), Some(SearchEvent::Complete { .. })));
    assert_eq!(service.matches().len(), 1);
    assert_eq!(service.matches()[0].coefficients, vec![1, 1]);
    assert!(!service.is_running());
}

#[test]
fn test_stop_ends_with_search_stopped() {
    let mut service = SearchService::new();
    service.start(unbounded_config()).unwrap();
    service.stop().unwrap();

    let events = drain(&mut service);

    assert!(matches!(events.last(), Some(SearchEvent::Stopped { .. })));
    assert!(!events
        .iter()
        .any(|event| matches!(event, SearchEvent::Complete { .. })));
}

#[test]
fn test_stop_interrupts_bounded_precompute() {
    let mut service = SearchService::new();
    let config = SearchConfig {
        target_value: "37.25".to_string(),
        strategy: Strategy::Bounded {
            max_degree: 400,
            max_coeff: 1_000_000_000_000,
        },
        ..SearchConfig::default()
    };
    let started = Instant::now();
    service.start(config).unwrap();
    service.stop().unwrap();

    let events = drain(&mut service);

    assert!(matches!(
        events.last(),
        Some(SearchEvent::Stopped { tested: 0, .. })
    ));
    // counting all 401 degrees up front takes far longer than this
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_restart_discards_previous_search() {
    let mut service = SearchService::new();
    let first = service.start(unbounded_config()).unwrap();
    let second = service.start(SearchConfig::default()).unwrap();
    assert_ne!(first, second);

    let events = drain(&mut service);

    // only the second, bounded search reports back
    let terminal: Vec<&SearchEvent> = events.iter().filter(|event| event.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert!(matches!(terminal[0], SearchEvent::Complete { .. }));
    assert_eq!(service.matches()[0].coefficients, vec![1, 1]);
}

#[test]
fn test_invalid_config_is_rejected_before_start() {
    let mut service = SearchService::new();
    let config = SearchConfig {
        precision: 500,
        ..SearchConfig::default()
    };
    assert!(service.start(config).is_err());
    assert!(!service.is_running());
}

#[test]
fn test_worker_answers_stop_while_idle() {
    let worker = SearchWorker::spawn(7).unwrap();
    worker.send(Command::Stop).unwrap();

    let event = worker.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(
        event,
        SearchEvent::Stopped {
            tested: 0,
            skipped_regions: 0
        }
    );
}

#[test]
fn test_worker_reports_session_errors_as_events() {
    let worker = SearchWorker::spawn(8).unwrap();
    let config = SearchConfig {
        target_value: "not a number".to_string(),
        ..SearchConfig::default()
    };
    worker.send(Command::Start { config }).unwrap();

    let event = worker.recv_timeout(TIMEOUT).unwrap();
    assert!(matches!(event, SearchEvent::Error { .. }));
}
