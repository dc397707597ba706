use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ems_experiments::{
    export_records_to_csv, export_results_to_csv, export_to_json, run_replications_with_progress,
    summarize, Scenario, SelectorKind, Settings, SimulationResult,
};

#[derive(Parser)]
#[command(
    name = "ems_sim",
    about = "Simulate ambulance dispatch against historical or synthetic cases",
    long_about = "Loads a settings file, runs one or more replications of the dispatch\n\
                  simulation and writes case records and metrics for later analysis."
)]
struct Cli {
    /// Settings file (JSON)
    settings: Option<PathBuf>,
    /// Number of ambulances
    #[arg(long)]
    ambulances: Option<usize>,
    /// Number of bases
    #[arg(long)]
    bases: Option<usize>,
    /// Number of cases to simulate
    #[arg(long)]
    slices: Option<usize>,
    /// Number of replications
    #[arg(long)]
    replications: Option<usize>,
    /// Base seed; replication i uses seed + i
    #[arg(long, env = "EMS_SIM_SEED")]
    seed: Option<u64>,
    /// Worker threads
    #[arg(long)]
    threads: Option<usize>,
    /// Dispatch policy
    #[arg(long, value_enum)]
    selector: Option<SelectorKind>,
    /// Case records output (CSV)
    #[arg(long)]
    output_file: Option<PathBuf>,
    /// Per-replication metrics output (CSV)
    #[arg(long)]
    results_file: Option<PathBuf>,
    /// Metrics and summary output (JSON)
    #[arg(long)]
    summary_file: Option<PathBuf>,
    /// Log every simulation step
    #[arg(long)]
    debug: bool,
    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn settings(&self) -> Result<Settings, Box<dyn std::error::Error>> {
        let mut settings = match &self.settings {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        if let Some(count) = self.ambulances {
            settings = settings.with_ambulances(count);
        }
        if let Some(count) = self.bases {
            settings = settings.with_bases(count);
        }
        if let Some(count) = self.slices {
            settings = settings.with_cases(count);
        }
        if let Some(count) = self.replications {
            settings = settings.with_replications(count);
        }
        if let Some(seed) = self.seed {
            settings = settings.with_seed(seed);
        }
        if let Some(threads) = self.threads {
            settings.threads = Some(threads);
        }
        if let Some(selector) = self.selector {
            settings.selector = selector;
        }
        Ok(settings)
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::load(cli.settings()?)?;
    let outputs = run_replications_with_progress(&scenario, !cli.no_progress)?;
    let results: Vec<SimulationResult> = outputs.iter().map(|o| o.metrics.clone()).collect();
    let summary = summarize(&results);

    if let Some(path) = &cli.output_file {
        export_records_to_csv(&outputs, path)?;
        info!(path = %path.display(), "case records written");
    }
    if let Some(path) = &cli.results_file {
        export_results_to_csv(&results, path)?;
        info!(path = %path.display(), "metrics written");
    }
    if let Some(path) = &cli.summary_file {
        export_to_json(&results, summary.as_ref(), path)?;
        info!(path = %path.display(), "summary written");
    }

    if let Some(summary) = summary {
        println!("Replications:        {}", summary.replications);
        println!("Cases simulated:     {}", summary.total_cases);
        println!("Avg delay:           {:.1} s", summary.mean_avg_delay_ms / 1000.0);
        println!("P90 delay:           {:.1} s", summary.mean_p90_delay_ms / 1000.0);
        println!("Avg response time:   {:.1} s", summary.mean_avg_response_ms / 1000.0);
        println!("P90 response time:   {:.1} s", summary.mean_p90_response_ms / 1000.0);
        if let Some(coverage) = summary.mean_coverage {
            println!("Avg coverage:        {:.1}%", coverage * 100.0);
        }
        if let Some(coverage) = summary.worst_coverage {
            println!("Worst coverage:      {:.1}%", coverage * 100.0);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
