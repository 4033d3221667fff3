use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use ecr_pruner::ecr::EcrRegistry;
use ecr_pruner::time::current_log_file_name;
use ecr_pruner::{
    in_use_for_run, init_logging, Args, Cleaner, Config, KubectlSource, Registry, RunOptions,
    RunOutcome, TerminalPrompt,
};
use std::process::ExitCode;
use tracing::{debug, info};

fn run() -> Result<()> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    let args = Args::parse();
    let config = Config::from_args(args, &current_log_file_name())?;

    let _log_guard = init_logging(&config.log_sink(), config.debug)?;
    if !dotenv_loaded {
        info!("No .env file found, using system environment variables");
    }
    info!("Starting AWS ECR Cleaner...");
    info!(
        "Environment: {}, region: {}, in-use list: {}",
        config.environment,
        config.aws_region,
        config.image_list_file.display()
    );
    debug!(
        "Target repos: '{}', hold tags: '{}', protect latest: {}",
        config.policy.target_repos.as_str(),
        config.policy.hold_tags.as_str(),
        config.policy.protect_latest
    );

    let registry = EcrRegistry::connect(&config.aws_region)?;
    let registry_host = registry.registry_host()?;
    info!("Target ECR: {}", registry_host);

    let in_use = in_use_for_run(
        &config.image_list_file,
        &KubectlSource::new(),
        config.policy.protect_in_use,
    )?;
    debug!("Loaded in-use images: {:?}", in_use.sorted());

    let options = RunOptions {
        dry_run: config.dry_run,
        list_only: config.list_only,
        auto_confirm: config.auto_confirm,
        interactive: config.interactive_mode,
    };
    let cleaner = Cleaner::new(&registry, &config.policy, &in_use, options);
    let mut prompt = TerminalPrompt::stdin();
    if !config.interactive_mode {
        prompt = prompt.with_report_location(&config.log_file);
    }
    let report = cleaner.run(&registry_host, &mut prompt)?;

    if report.outcome == RunOutcome::Completed && !config.dry_run {
        info!(
            "Deleted {} images ({} failed) and {} repositories",
            report.deleted_images,
            report.failed_images,
            report.deleted_repositories.len()
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
