mod cli;

use digipack::{config, providers::ClientFactory};
use dp_av::ToolRegistry;
use dp_pipeline::{Packager, PackagerOptions, RunOutcome};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "digipack=trace,dp_pipeline=trace,dp_bag=debug,dp_av=debug,dp_core=debug".to_string()
        } else {
            "digipack=info,dp_pipeline=info,dp_bag=info,dp_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_job(&args, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()).map(|()| ExitCode::SUCCESS),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref()).map(|()| ExitCode::SUCCESS)
        }
        Commands::VerifyBag { dir } => verify_bag(&dir),
        Commands::Version => {
            println!("digipack {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_job(args: &RunArgs, config_path: Option<&std::path::Path>) -> Result<ExitCode> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(variant) = args.variant {
        config.variant = variant;
    }

    let job = args.to_job(config.variant)?;
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let factory = Arc::new(ClientFactory::new(&config));

    let mut options = PackagerOptions::new(args.parameter_path());
    options.transfer = config.transfer.clone();
    options.profile_identifier = config.bag.profile_identifier.clone();

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(Packager::new(job, options, tools, factory).run())?;

    match outcome {
        RunOutcome::Succeeded { format } => {
            println!("Packaged {} ({})", args.refid, format);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Failed { state, error, .. } => {
            eprintln!("Packaging {} failed after {}: {}", args.refid, state, error);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Video packages need ffmpeg for poster frames.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Variant: {}", config.variant);
    println!("  Storage root: {}", config.storage.root.display());
    println!("  Parameter root: {}", config.parameters.root.display());
    println!(
        "  Notifications: {}",
        config.notifications.endpoint.as_deref().unwrap_or("log only")
    );
    println!(
        "  Transfer: threshold {} B, chunk {} B, concurrency {}",
        config.transfer.multipart_threshold,
        config.transfer.multipart_chunksize,
        config.transfer.max_concurrency
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    Ok(())
}

fn verify_bag(dir: &std::path::Path) -> Result<ExitCode> {
    match dp_bag::validate_bag(dir) {
        Ok(report) => {
            println!("✓ {} is a valid bag", dir.display());
            println!(
                "  Payload: {} files, {} bytes",
                report.payload_files, report.payload_bytes
            );
            for (key, values) in &report.info {
                for value in values {
                    println!("  {}: {}", key, value);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("✗ {}: {}", dir.display(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}
