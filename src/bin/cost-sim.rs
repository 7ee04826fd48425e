//! Cost enforcement simulator
//!
//! Runs concurrent synthetic queries over in-memory series through the
//! per-query and global budgets, then prints each query's outcome and the
//! resulting metrics.

use clap::{Arg, ArgMatches, Command};
use query_cost::{
    metrics, AccountedSeriesIter, LimitConfig, LimitsConfig, PerQueryEnforcer, SeriesIterator,
    VecSeriesIterator,
};
use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct QueryOutcome {
    query: usize,
    datapoints: usize,
    error: Option<String>,
}

fn main() {
    let matches = create_cli().get_matches();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("query_cost=info,cost_sim=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(&matches) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn create_cli() -> Command {
    Command::new("cost-sim")
        .about("Simulate concurrent queries against per-query and global cost limits")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .help("JSON limits configuration file (overrides the limit flags)")
                .long("config"),
        )
        .arg(
            Arg::new("queries")
                .help("Number of concurrent queries")
                .long("queries")
                .default_value("8"),
        )
        .arg(
            Arg::new("series")
                .help("Series read by each query")
                .long("series")
                .default_value("10"),
        )
        .arg(
            Arg::new("points")
                .help("Datapoints per series")
                .long("points")
                .default_value("100"),
        )
        .arg(
            Arg::new("per-query-limit")
                .help("Per-query datapoint limit (0 disables)")
                .long("per-query-limit")
                .default_value("500"),
        )
        .arg(
            Arg::new("global-limit")
                .help("Global datapoint limit (0 disables)")
                .long("global-limit")
                .default_value("3000"),
        )
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T, String> {
    let raw = matches
        .get_one::<String>(name)
        .ok_or_else(|| format!("missing --{}", name))?;
    raw.parse()
        .map_err(|_| format!("invalid value for --{}: {}", name, raw))
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let queries: usize = parse_arg(matches, "queries")?;
    let series: usize = parse_arg(matches, "series")?;
    let points: usize = parse_arg(matches, "points")?;

    let config = match matches.get_one::<String>("config") {
        Some(path) => LimitsConfig::from_file(path)?,
        None => LimitsConfig {
            per_query: LimitConfig::new(parse_arg(matches, "per-query-limit")?),
            global: LimitConfig::new(parse_arg(matches, "global-limit")?),
            ..Default::default()
        },
    };

    let registry = prometheus::Registry::new();
    let engine = Arc::new(config.build(&registry)?);
    engine.report_limits();

    info!(
        "Running {} queries x {} series x {} points",
        queries, series, points
    );

    let handles: Vec<_> = (0..queries)
        .map(|query| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let enforcer = engine.factory.new_enforcer();
                let outcome = run_query(query, &enforcer, series, points);
                enforcer.report();
                enforcer.release();
                outcome
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(queries);
    for handle in handles {
        outcomes.push(handle.join().map_err(|_| "query thread panicked")?);
    }

    println!("{:<8} {:>12}  result", "query", "datapoints");
    for o in &outcomes {
        println!(
            "{:<8} {:>12}  {}",
            o.query,
            o.datapoints,
            o.error.as_deref().unwrap_or("ok")
        );
    }

    let (global, _) = engine.factory.global_enforcer().state();
    println!("\nglobal cost after all releases: {}", global.cost);
    println!("\n{}", metrics::export(&registry)?);
    Ok(())
}

fn run_query(query: usize, enforcer: &PerQueryEnforcer, series: usize, points: usize) -> QueryOutcome {
    let mut datapoints = 0;
    for s in 0..series {
        let wrapped = VecSeriesIterator::with_sequence(format!("q{}.s{}", query, s), points);
        let mut iter = AccountedSeriesIter::new(wrapped, enforcer);
        while iter.next() {
            datapoints += 1;
        }
        if let Some(err) = iter.err() {
            return QueryOutcome {
                query,
                datapoints,
                error: Some(err.to_string()),
            };
        }
    }
    QueryOutcome {
        query,
        datapoints,
        error: None,
    }
}
