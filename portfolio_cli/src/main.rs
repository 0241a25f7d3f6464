//! `portfolio`: builds the CloudFormation template for the portfolio site and
//! deploys it.
//!
//! ## Commands
//!
//! - `synth`: print the template, or write it to `--out`
//! - `check`: synthesize and run the template assertions
//! - `deploy`: check, then create or update the stack and print its outputs
//! - `destroy`: delete the stack

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use aws_cfn_stack::SynthesizedStack;
use aws_route53::HostedZone;
use clap::{Parser, Subcommand};
use portfolio_stack::{check_template, StackConfig, DEFAULT_CONFIG_FILE};
use tracing::{error, info, Level};

mod telemetry;

#[derive(Parser)]
#[command(name = "portfolio")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Static site hosting stack for the portfolio site", long_about = None)]
struct Cli {
    /// Config file. Defaults to ./portfolio.toml, and built-in defaults when that is missing
    #[arg(short, long, global = true, env = "PORTFOLIO_CONFIG")]
    config: Option<PathBuf>,

    /// Use this hosted zone instead of looking it up in Route 53
    #[arg(long, global = true, env = "PORTFOLIO_HOSTED_ZONE_ID")]
    hosted_zone_id: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the template as JSON
    Synth {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Synthesize and verify the template, failing on any violation
    Check,

    /// Create or update the stack and wait for it to finish
    Deploy,

    /// Delete the stack and wait for it to be gone
    Destroy,
}

fn load_config(cli: &Cli) -> Result<StackConfig> {
    let mut config = match &cli.config {
        Some(path) => StackConfig::load(path)?,
        None => StackConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    if let Some(id) = &cli.hosted_zone_id {
        config.hosted_zone_id = Some(id.clone());
    }
    Ok(config)
}

async fn resolve_zone(config: &StackConfig) -> Result<HostedZone> {
    if let Some(id) = &config.hosted_zone_id {
        info!(zone_id = %id, "using configured hosted zone");
        return Ok(HostedZone::new(id, &config.domain));
    }
    let client = aws_route53::lookup::make_client(&config.region).await;
    let zone = aws_route53::lookup_hosted_zone(&client, &config.domain)
        .await
        .with_context(|| format!("Failed to find the hosted zone for {}", config.domain))?;
    Ok(zone)
}

async fn synth(config: &StackConfig) -> Result<SynthesizedStack> {
    let zone = resolve_zone(config).await?;
    let stack = portfolio_stack::synth(config, &zone).context("Failed to synthesize stack")?;
    Ok(stack)
}

fn verify(config: &StackConfig, stack: &SynthesizedStack) -> Result<()> {
    let violations = check_template(&stack.template, &config.domain);
    for violation in violations.iter() {
        error!("{violation}");
    }
    if !violations.is_empty() {
        bail!("{} check(s) failed on stack {}", violations.len(), stack.stack_name);
    }
    info!(stack = %stack.stack_name, "all checks passed");
    Ok(())
}

fn write_template(stack: &SynthesizedStack, out: Option<&Path>) -> Result<()> {
    let body = stack.template_body()?;
    match out {
        Some(path) => {
            std::fs::write(path, body).with_context(|| format!("Failed to write template to {:?}", path))?;
            info!(path = ?path, "wrote template");
        }
        None => println!("{body}"),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Commands::Synth { out } => {
            let stack = synth(&config).await?;
            write_template(&stack, out.as_deref())
        }
        Commands::Check => {
            let stack = synth(&config).await?;
            verify(&config, &stack)
        }
        Commands::Deploy => {
            let stack = synth(&config).await?;
            verify(&config, &stack)?;
            let client = aws_cfn_stack::make_client(&config.region).await;
            let outputs = aws_cfn_stack::deploy(&client, &stack)
                .await
                .with_context(|| format!("Failed to deploy stack {}", stack.stack_name))?;
            let mut outputs: Vec<_> = outputs.into_iter().collect();
            outputs.sort();
            for (key, value) in outputs {
                println!("{key} = {value}");
            }
            Ok(())
        }
        Commands::Destroy => {
            let client = aws_cfn_stack::make_client(&config.region).await;
            aws_cfn_stack::destroy(&client, &config.stack_name)
                .await
                .with_context(|| format!("Failed to delete stack {}", config.stack_name))
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.json, level);

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}
