mod pipelines;
mod utils;
mod config;
mod cli;

use std::env;
use std::io::Write;
use std::time::Instant;

use anyhow::{Result, anyhow};
use env_logger::Builder;
use log::{LevelFilter, debug, error};

use crate::cli::parse;
use crate::config::defs::RunConfig;
use pipelines::{compare, illumina, long_reads, table};

#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n asmbench\n-------------\n");

    let cwd = env::current_dir()?;
    debug!("The current directory is {:?}", cwd);

    let module = args.module.clone();
    let config = RunConfig { cwd, args };

    if let Err(e) = match module.as_str() {
        "compare" => compare::run(&config).await,
        "comparison_table" => table::run(&config),
        "illumina_reads" => illumina::run(&config).await,
        "long_reads" => long_reads::run(&config).await,
        _ => Err(anyhow!("Invalid module: {}", module)),
    } {
        error!(
            "Pipeline failed: {} at {} milliseconds.",
            e,
            run_start.elapsed().as_millis()
        );
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}
