use abort_o_mat::config::Config;
use abort_o_mat::runner::{RunState, Runner};
use abort_o_mat::{config, signal};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "abort-o-mat")]
#[command(about = "Run shell steps under combined timeout, deadline and interrupt signals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a run file
    Validate { file: String },
    /// Execute a run file
    Run {
        file: String,
        /// Overall timeout, e.g. "30s" or "5m"
        #[arg(long)]
        timeout: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file } => validate(&file),
        Commands::Run { file, timeout } => run(&file, timeout.as_deref()).await,
    }
}

fn validate(path: &str) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error in {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    println!("Run file is valid ({} steps)", config.steps.len());
    if let Some(timeout) = config.timeout {
        println!("  timeout: {}", humantime::format_duration(timeout));
    }
    if let Some(deadline) = &config.deadline {
        println!("  deadline: {:?}", deadline);
    }
    for (i, step) in config.steps.iter().enumerate() {
        let timeout = step
            .timeout
            .map(|t| humantime::format_duration(t).to_string())
            .unwrap_or_else(|| "none".to_string());
        let on_fail: &'static str = step.on_fail.into();
        println!(
            "  {}: {} (timeout: {}, on_fail: {})",
            i + 1,
            step.cmd,
            timeout,
            on_fail
        );
    }
    ExitCode::SUCCESS
}

async fn run(path: &str, timeout: Option<&str>) -> ExitCode {
    let mut config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error in {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };
    config.apply_env();

    if let Some(timeout) = timeout {
        match config::parse_duration(timeout) {
            Ok(t) => config.timeout = Some(t),
            Err(e) => {
                eprintln!("Invalid --timeout {:?}: {}", timeout, e);
                return ExitCode::FAILURE;
            }
        }
    }

    let runner = Runner::new(config).with_signal(signal::interrupt());
    match runner.run().await {
        Ok(log) => {
            println!("Run {} {:?}", log.run_id, log.state);
            if let Some(reason) = &log.abort_reason {
                println!("  reason: {}", reason);
            }
            if log.state == RunState::Completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
