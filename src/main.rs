use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::*;
use mimalloc::MiMalloc;
use polyrecover::constants::Constant;
use polyrecover::{
    parse_coefficients, Arithmetic, ClosenessPolicy, EvaluationPoint, Outcome, Polynomial,
    SearchConfig, SearchEvent, SearchReport, SearchService, SearchSession, Strategy,
};
use std::path::Path;
use std::time::{Duration, Instant};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// How often the CLI wakes up to check the time limit while waiting for events.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "polyrecover")]
#[command(
    about = "Recover integer polynomials from their value at a transcendental constant",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyKind {
    Bounded,
    Unbounded,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search for polynomials whose value matches a target")]
    Search {
        #[arg(long, help = "Configuration file (JSON) - CLI options override its values")]
        config: Option<String>,

        #[arg(short, long, help = "Target value as a decimal string")]
        target: Option<String>,

        #[arg(short, long, help = "Significant digits of arithmetic (10-200)")]
        precision: Option<u32>,

        #[arg(short, long, conflicts_with = "digits", help = "Match when |P(x) - target| < epsilon")]
        epsilon: Option<String>,

        #[arg(long, help = "Match when the first N decimal places agree")]
        digits: Option<u32>,

        #[arg(short, long, value_enum, help = "Search strategy")]
        strategy: Option<StrategyKind>,

        #[arg(long, help = "Highest degree searched (bounded)")]
        max_degree: Option<usize>,

        #[arg(long, help = "Largest coefficient searched (bounded)")]
        max_coeff: Option<u64>,

        #[arg(long, help = "Candidates per region visit (unbounded)")]
        batch_size: Option<u64>,

        #[arg(long, help = "Evaluation point: liouville, liouville_2, pi_frac, e_frac, gelfond_frac, a _plus1 variant, or a decimal")]
        point: Option<String>,

        #[arg(long, help = "Report progress every N evaluations")]
        progress_interval: Option<u64>,

        #[arg(long, help = "Stop the search after this many seconds")]
        time_limit: Option<u64>,

        #[arg(short, long, help = "Write a JSON report to this file")]
        output: Option<String>,

        #[arg(long, help = "Print every event as one JSON line instead of text")]
        json: bool,
    },

    #[command(about = "Evaluate a polynomial at a constant")]
    Evaluate {
        #[arg(help = "Comma-separated coefficients, constant term first (e.g. \"1,0,3\")")]
        coefficients: String,

        #[arg(long, default_value = "liouville")]
        point: String,

        #[arg(short, long, default_value = "50")]
        precision: u32,
    },

    #[command(about = "Print the decimal expansion of a constant")]
    Constant {
        #[arg(default_value = "liouville")]
        name: String,

        #[arg(short, long, default_value = "50")]
        precision: u32,
    },

    #[command(about = "Generate a default search configuration file")]
    InitConfig {
        #[arg(help = "Output file path (default: search_config.json)")]
        output: Option<String>,
    },

    #[command(about = "Run benchmark tests")]
    Benchmark,
}

/// Command-line values that override the configuration file.
struct SearchOverrides {
    target: Option<String>,
    precision: Option<u32>,
    epsilon: Option<String>,
    digits: Option<u32>,
    strategy: Option<StrategyKind>,
    max_degree: Option<usize>,
    max_coeff: Option<u64>,
    batch_size: Option<u64>,
    point: Option<String>,
    progress_interval: Option<u64>,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Search {
            config,
            target,
            precision,
            epsilon,
            digits,
            strategy,
            max_degree,
            max_coeff,
            batch_size,
            point,
            progress_interval,
            time_limit,
            output,
            json,
        } => {
            let overrides = SearchOverrides {
                target,
                precision,
                epsilon,
                digits,
                strategy,
                max_degree,
                max_coeff,
                batch_size,
                point,
                progress_interval,
            };
            load_search_config(config.as_deref(), overrides)
                .and_then(|config| run_search(config, time_limit, output.as_deref(), json))
        }
        Commands::Evaluate {
            coefficients,
            point,
            precision,
        } => evaluate_polynomial(&coefficients, &point, precision),
        Commands::Constant { name, precision } => print_constant(&name, precision),
        Commands::InitConfig { output } => {
            init_config_file(output.as_deref().unwrap_or("search_config.json"))
        }
        Commands::Benchmark => run_benchmark(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_search_config(
    config_file: Option<&str>,
    overrides: SearchOverrides,
) -> Result<SearchConfig> {
    // Load config from file or use defaults
    let mut config = match config_file {
        Some(path) => {
            let config = SearchConfig::load_from_file(Path::new(path))
                .with_context(|| format!("loading config file '{}'", path))?;
            info!("Loaded configuration from {}", path);
            config
        }
        None => SearchConfig::default(),
    };

    // Apply CLI overrides
    if let Some(v) = overrides.target {
        config.target_value = v;
    }
    if let Some(v) = overrides.precision {
        config.precision = v;
    }
    if let Some(v) = overrides.epsilon {
        config.closeness = ClosenessPolicy::Epsilon { epsilon: v };
    }
    if let Some(v) = overrides.digits {
        config.closeness = ClosenessPolicy::ExactDigits { digits: v };
    }
    if let Some(v) = overrides.point {
        config.evaluation_point = v.parse()?;
    }
    if let Some(v) = overrides.progress_interval {
        config.progress_interval = v;
    }

    let mut strategy = match (overrides.strategy, config.strategy) {
        (Some(StrategyKind::Bounded), Strategy::Unbounded { .. }) => Strategy::Bounded {
            max_degree: 3,
            max_coeff: 10,
        },
        (Some(StrategyKind::Unbounded), Strategy::Bounded { .. }) => {
            Strategy::Unbounded { batch_size: 1000 }
        }
        (_, current) => current,
    };
    match &mut strategy {
        Strategy::Bounded {
            max_degree,
            max_coeff,
        } => {
            if let Some(v) = overrides.max_degree {
                *max_degree = v;
            }
            if let Some(v) = overrides.max_coeff {
                *max_coeff = v;
            }
            if overrides.batch_size.is_some() {
                warn!("--batch-size only applies to unbounded searches, ignored");
            }
        }
        Strategy::Unbounded { batch_size } => {
            if let Some(v) = overrides.batch_size {
                *batch_size = v;
            }
            if overrides.max_degree.is_some() || overrides.max_coeff.is_some() {
                warn!("--max-degree and --max-coeff only apply to bounded searches, ignored");
            }
        }
    }
    config.strategy = strategy;

    config.validate()?;
    Ok(config)
}

fn run_search(
    config: SearchConfig,
    time_limit: Option<u64>,
    output: Option<&str>,
    json: bool,
) -> Result<()> {
    if !json {
        print_search_header(&config);
    }
    if time_limit.is_none() && matches!(config.strategy, Strategy::Unbounded { .. }) {
        warn!("Unbounded search without --time-limit runs until interrupted");
    }

    let start_time = Instant::now();
    let deadline = time_limit.map(Duration::from_secs);
    let mut service = SearchService::new();
    service.start(config.clone())?;

    let mut stop_requested = false;
    let mut outcome = Outcome::Error;
    let mut tested = 0u64;
    let mut skipped_regions = 0u64;
    let mut failure = None;

    while service.is_running() {
        if let Some(limit) = deadline {
            if !stop_requested && start_time.elapsed() >= limit {
                info!("Time limit of {}s reached, stopping", limit.as_secs());
                service.stop()?;
                stop_requested = true;
            }
        }

        let Some(event) = service.recv_timeout(POLL_INTERVAL)? else {
            continue;
        };

        match &event {
            SearchEvent::Progress {
                tested: now,
                skipped_regions: skipped,
                ..
            } => {
                tested = *now;
                skipped_regions = *skipped;
            }
            SearchEvent::Match(found) => {
                tested = found.tested;
                skipped_regions = found.skipped_regions;
            }
            SearchEvent::Optimization {
                message,
                skipped_regions: skipped,
            } => {
                skipped_regions = *skipped;
                debug!("{}", message);
            }
            SearchEvent::Complete { tested: total, .. } => {
                tested = *total;
                outcome = Outcome::Complete;
            }
            SearchEvent::Stopped {
                tested: total,
                skipped_regions: skipped,
            } => {
                tested = *total;
                skipped_regions = *skipped;
                outcome = Outcome::SearchStopped;
            }
            SearchEvent::Error { message } => {
                failure = Some(message.clone());
            }
        }

        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event);
        }
    }

    let elapsed = start_time.elapsed();
    if !json {
        print_search_summary(&service, outcome, tested, skipped_regions, elapsed);
    }

    if let Some(path) = output {
        let report = SearchReport::new(
            config,
            outcome,
            tested,
            skipped_regions,
            service.matches().to_vec(),
            elapsed.as_secs_f64(),
        );
        report
            .save(Path::new(path))
            .with_context(|| format!("writing report to '{}'", path))?;
        if !json {
            println!("\nReport saved to: {}", path);
        }
    }

    if let Some(message) = failure {
        bail!("search failed: {}", message);
    }
    Ok(())
}

fn print_search_header(config: &SearchConfig) {
    println!("========================================");
    println!("  POLYNOMIAL RECOVERY SEARCH");
    println!("========================================");
    println!("Target value:      {}", config.target_value);
    println!(
        "Evaluation point:  {} ({})",
        config.evaluation_point,
        config.evaluation_point.description()
    );
    println!("Precision:         {} digits", config.precision);
    println!("Closeness:         {}", config.closeness);
    if let Some(digits) = config.closeness.compared_digits() {
        println!("                   (~{} decimal places compared)", digits);
    }
    println!("Strategy:          {}", config.strategy);
    println!("========================================\n");
}

fn print_event(event: &SearchEvent) {
    match event {
        SearchEvent::Progress {
            degree,
            tested,
            percentage,
            current_max_coeff,
            ..
        } => match percentage {
            Some(percentage) => println!(
                "Progress: {:.2}% | Tested: {} | Degree: {} | Max coeff: {}",
                percentage, tested, degree, current_max_coeff
            ),
            None => println!(
                "Progress: Tested: {} | Degree: {} | Max coeff: {}",
                tested, degree, current_max_coeff
            ),
        },
        SearchEvent::Match(found) => {
            let rendered = found
                .polynomial()
                .map(|polynomial| polynomial.to_string())
                .unwrap_or_else(|_| format!("{:?}", found.coefficients));
            println!("\n*** MATCH FOUND ***");
            println!("  Polynomial:   {}", rendered);
            println!("  Coefficients: {:?}", found.coefficients);
            println!("  P(x) =        {}", found.evaluation);
            println!("  Found after:  {} evaluations\n", found.tested);
        }
        SearchEvent::Optimization { .. } => {}
        SearchEvent::Complete {
            tested,
            time_elapsed_ms,
        } => {
            println!("\nSearch complete: {} polynomials in {} ms", tested, time_elapsed_ms);
        }
        SearchEvent::Stopped { tested, .. } => {
            println!("\nSearch stopped after {} polynomials", tested);
        }
        SearchEvent::Error { message } => {
            eprintln!("\nSearch error: {}", message);
        }
    }
}

fn print_search_summary(
    service: &SearchService,
    outcome: Outcome,
    tested: u64,
    skipped_regions: u64,
    elapsed: Duration,
) {
    println!("\n========================================");
    println!("Outcome:           {:?}", outcome);
    println!("Total tested:      {}", tested);
    println!("Skipped regions:   {}", skipped_regions);
    println!("Matches found:     {}", service.matches().len());
    println!("Time elapsed:      {:.3}s", elapsed.as_secs_f64());
    println!("========================================");
}

fn evaluate_polynomial(coefficients: &str, point: &str, precision: u32) -> Result<()> {
    let polynomial = Polynomial::new(parse_coefficients(coefficients)?)?;
    let point: EvaluationPoint = point.parse()?;
    let arith = Arithmetic::new(precision)?;
    let x = point.value(&arith)?;

    let start_time = Instant::now();
    let value = polynomial.evaluate(&x, &arith);
    let elapsed = start_time.elapsed();

    println!("Polynomial: {}", polynomial);
    println!(
        "Degree:     {} (coefficients {:?})",
        polynomial.degree(),
        polynomial.coefficients()
    );
    println!("x =         {} ({})", x, point.description());
    println!("P(x) =      {}", value);
    println!("\nTime elapsed: {:.6}s", elapsed.as_secs_f64());
    Ok(())
}

fn print_constant(name: &str, precision: u32) -> Result<()> {
    let point: EvaluationPoint = name.parse()?;
    let arith = Arithmetic::new(precision)?;
    let value = point.value(&arith)?;

    println!("{} ({}) at {} digits:", point, point.description(), precision);
    println!("{}", value);
    Ok(())
}

fn init_config_file(output: &str) -> Result<()> {
    let config = SearchConfig::default();
    config
        .save_to_file(Path::new(output))
        .with_context(|| format!("creating config file '{}'", output))?;

    println!("Default configuration file created: {}", output);
    println!("\nConfiguration:");
    println!("  Target value:      {}", config.target_value);
    println!("  Evaluation point:  {}", config.evaluation_point);
    println!("  Precision:         {}", config.precision);
    println!("  Closeness:         {}", config.closeness);
    println!("  Strategy:          {}", config.strategy);
    println!("  Progress interval: {}", config.progress_interval);
    println!("\nYou can now edit this file and use:");
    println!("  cargo run --release -- search --config {}", output);
    Ok(())
}

fn run_benchmark() -> Result<()> {
    println!("Running benchmarks...\n");

    println!("Constant generation:");
    for constant in Constant::ALL {
        for precision in [50, 200] {
            let arith = Arithmetic::new(precision)?;
            let start_time = Instant::now();
            constant.expand(&arith)?;
            let elapsed = start_time.elapsed();
            println!(
                "  {:<14} {:>3} digits: {:.6}s",
                constant.key(),
                precision,
                elapsed.as_secs_f64()
            );
        }
    }

    println!("\nPolynomial evaluation (10000 evaluations, degree 6):");
    let coefficients = [3, 1, 4, 1, 5, 9, 2];
    for precision in [20, 50, 100, 200] {
        let arith = Arithmetic::new(precision)?;
        let x = polyrecover::liouville(&arith);
        let start_time = Instant::now();
        for _ in 0..10_000 {
            std::hint::black_box(polyrecover::evaluate(&coefficients, &x, &arith));
        }
        let elapsed = start_time.elapsed();
        println!("  precision {:>3}: {:.3}s", precision, elapsed.as_secs_f64());
    }

    println!("\nBounded search (degree <= 4, coefficients <= 6, no match):");
    let config = SearchConfig {
        target_value: "0.5".to_string(),
        strategy: Strategy::Bounded {
            max_degree: 4,
            max_coeff: 6,
        },
        ..SearchConfig::default()
    };
    let mut session = SearchSession::new(config)?;
    let start_time = Instant::now();
    let outcome = session.run(|_| {}, || false)?;
    let elapsed = start_time.elapsed();
    println!("  {:?}", outcome);
    println!("  Skipped regions: {}", session.state().skipped_regions);
    println!("  Time: {:.3}s", elapsed.as_secs_f64());
    Ok(())
}
