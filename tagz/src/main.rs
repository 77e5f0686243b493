use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::process::ExitCode;
use std::sync::Arc;
use tagging::Locator;
use tagz::{check_operation, clipboard, logging, parse_repositories};
use tagz::{Args, BatchReport, Driver, DriverConfig, Settings};
use tracing::{info, warn};
use vcs::GitGateway;

/// Exit status after Ctrl-C, as a shell reports SIGINT
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.verbose);

    let settings = Settings::load_or_default(args.config.as_deref())?;
    let settings = args.apply_to(settings)?;
    settings.validate()?;

    let operation = args.operation();
    let repositories = check_operation(&operation)
        .and_then(|()| parse_repositories(&settings.repos, &settings.host))
        .unwrap_or_else(|e| Args::command().error(ErrorKind::ValueValidation, e).exit());

    let gateway = GitGateway::new(settings.gateway_config(args.dry_run, args.verbose));
    gateway.config().validate()?;
    let driver = Driver::new(
        Arc::new(gateway),
        Locator::new(&settings.git_root),
        settings.engine_config(),
        DriverConfig::new()
            .with_requested_convention(args.requested_convention())
            .with_web_base(settings.web_base.clone())
            .with_jobs(settings.jobs)
            .with_failure_policy(args.failure_policy()),
    )?;

    if args.dry_run {
        info!("Dry run: git commands are logged, not executed");
    }

    let report = tokio::select! {
        report = driver.run(&repositories, &operation) => report?,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the run kills any git process still going.
            warn!("Interrupted; repositories in progress may need a look");
            return Ok(ExitCode::from(INTERRUPTED));
        }
    };

    emit(&report, &args, &settings).await?;

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn emit(
    report: &BatchReport,
    args: &Args,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let output = report.output();
    if output.is_empty() {
        return Ok(());
    }
    println!("{}", output);
    if settings.clipboard && clipboard::copy(&output).await {
        info!("Copied to clipboard");
    }
    Ok(())
}
