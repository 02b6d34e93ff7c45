use std::fs::File;
use std::io::Write;

use clap::Parser;
use spacemon::cli::{Cli, Command, RunArgs};
use spacemon::config::Config;
use spacemon::logging;
use spacemon::monitor::{Monitor, RunOptions};
use spacemon::report;
use spacemon::report::tee::Tee;
use spacemon::store::SnapshotStore;
use spacemon::util;

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_history(store: &SnapshotStore) {
    let index = store.index();
    if index.is_empty() {
        println!("No snapshots found. Run 'spacemon' to create one.");
        return;
    }

    println!("{:<22} {:<10} {:<12}", "Generation", "Roots", "Free space");
    println!("{}", "-".repeat(46));

    for generation in index.iter().rev() {
        let roots = generation
            .artifacts
            .iter()
            .filter(|name| name.starts_with("summary-"))
            .count();
        let free = match store.free_space_at(generation.id) {
            Ok(Some(bytes)) => util::format_bytes(bytes),
            Ok(None) => "-".to_string(),
            Err(e) => {
                tracing::warn!("{e}");
                "?".to_string()
            }
        };
        println!("{:<22} {:<10} {:<12}", generation.id, roots, free);
    }
}

fn report_output(config: &Config) -> Tee {
    let mut tee = Tee::new().with_sink("stdout", std::io::stdout());
    if let Some(path) = &config.report_file {
        match File::create(path) {
            Ok(file) => tee.push(path.display().to_string(), file),
            Err(e) => tracing::error!(path = %path.display(), "cannot open report file: {e}"),
        }
    }
    tee
}

fn run_once(config: &Config, store: &mut SnapshotStore, args: &RunArgs, verbose: bool) {
    if config.dirs.is_empty() {
        tracing::warn!("no directories configured, only free space is tracked");
    }

    let options = RunOptions {
        replay: args.replay,
        steps_back: args.steps_back,
        no_save: args.no_save,
    };
    let run_report = Monitor::new(config, store).run(options);

    let mut out = report_output(config);
    if let Err(e) = report::print(&run_report, args.json, verbose, &mut out) {
        tracing::error!("failed to write report: {e}");
    }
    for (sink, e) in out.failures() {
        eprintln!("report output to {sink} failed: {e}");
    }
    let _ = out.flush();
}

fn main() {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| fail(format!("Error loading config: {e}")));

    if let Err(e) = logging::init(&config.log_file, cli.verbose) {
        fail(format!("Error opening log file: {e}"));
    }

    let mut store = SnapshotStore::open(&config.data_dir)
        .unwrap_or_else(|e| fail(format!("Error opening data directory: {e}")));

    match cli.command {
        Some(Command::History) => print_history(&store),
        None => {
            run_once(&config, &mut store, &cli.run, cli.verbose);

            if cli.run.daemon {
                tracing::info!(
                    interval = %humantime::format_duration(config.daemon_interval),
                    "running in daemon mode"
                );
                loop {
                    std::thread::sleep(config.daemon_interval);
                    run_once(&config, &mut store, &cli.run, cli.verbose);
                }
            }
        }
    }
}
