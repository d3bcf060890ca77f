use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use panel_checker::{
    codec, AppConfig, Checker, PanelRegistry, PanelSession, RateLimiter,
};

/// 配置模板，`template` 子命令输出
const CONFIG_TEMPLATE: &str = r#"# panel-checker configuration

[[panels]]
name = "Panel_A"
url = "http://panel-a.example.com:54321"
username = "admin_a"
password = "password_a"
kind = "Premium"

[[panels]]
name = "Trial_Pnl_1"
url = "http://trial-pnl.example.com:54321"
username = "trial_user"
password = "trial_pass"
kind = "Trial"
"#;

#[derive(Parser)]
#[command(name = "panel-checker", version, about)]
struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up an account across the configured panels
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "panels.toml")]
        config: String,
        /// Connection string, bare UUID or account name
        connection_string: String,
    },
    /// Decode a connection string into its canonical identifier
    Decode {
        /// Connection string to decode
        input: String,
    },
    /// Generate a configuration template
    Template {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let log_level = match cli.verbose {
        0 => "off",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match &cli.command {
        Commands::Check {
            config,
            connection_string,
        } => {
            info!("Loading configuration from: {}", config);
            let config = AppConfig::load(config)?;
            let registry = PanelRegistry::new(config.panels);
            let session = PanelSession::new()?;
            let checker = Checker::new(Arc::new(session), registry, RateLimiter::with_defaults());

            let report = checker.lookup("local", connection_string).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to render report")?
            );
        }
        Commands::Decode { input } => {
            let identifier = codec::decode(input)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&identifier)
                    .context("Failed to render identifier")?
            );
        }
        Commands::Template { output } => {
            if let Some(path) = output {
                std::fs::write(path, CONFIG_TEMPLATE)
                    .with_context(|| format!("Failed to write config template to {path}"))?;
                println!("Generated configuration template: {path}");
            } else {
                println!("{CONFIG_TEMPLATE}");
            }
        }
    }

    Ok(())
}
