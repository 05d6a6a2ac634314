//! MCP Auth Client - command line entry point

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mcp_auth_client::{AuthClientContext, CallContext, ClientConfig};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults to mcp-auth.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain a client_credentials token for the application
    Token {
        /// Print the token value
        #[arg(long)]
        show: bool,
    },

    /// Initialize the MCP session and list the server's tools
    Tools,

    /// Call a tool on the MCP server on behalf of the application
    Call {
        /// Tool name
        tool: String,

        /// Tool arguments as JSON
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Generate example configuration
    Init {
        /// Output path for configuration
        #[arg(short, long, default_value = "mcp-auth.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mcp_auth_client=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Init { output } = &cli.command {
        return generate_config(output).await;
    }

    let config = ClientConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    info!(
        "Loaded {} client registrations for {}",
        config.registrations.len(),
        config.app_name
    );
    let context = AuthClientContext::new(config)?;

    match cli.command {
        Commands::Token { show } => {
            let token = context
                .credential_injector()
                .acquire_machine_token()
                .await
                .context("Token acquisition failed")?;

            println!("token_type: {}", token.token_type);
            match token.expires_at {
                Some(expires_at) => println!("expires_at: {}", expires_at.to_rfc3339()),
                None => println!("expires_at: never"),
            }
            println!("scopes: {}", token.scopes.join(" "));
            if show {
                println!("access_token: {}", token.value());
            }
        }

        Commands::Tools => {
            let client = context.mcp_client();
            let background = CallContext::Background;
            let client_info = serde_json::json!({
                "name": context.config.app_name,
                "version": env!("CARGO_PKG_VERSION")
            });

            let init = client.initialize(&background, client_info).await?;
            info!(
                "Connected to {} {} (protocol {})",
                init.server_info.name, init.server_info.version, init.protocol_version
            );

            let tools = client.list_tools(&background).await?;
            for tool in tools.tools {
                println!(
                    "{}\t{}",
                    tool.name,
                    tool.description.unwrap_or_default()
                );
            }
        }

        Commands::Call { tool, args } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            let client = context.mcp_client();

            let result = client
                .call_tool(&CallContext::Background, &tool, arguments)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Init { .. } => unreachable!("handled before configuration is loaded"),
    }

    Ok(())
}

async fn generate_config(output: &Path) -> anyhow::Result<()> {
    if output.exists() {
        error!("Configuration file already exists: {:?}", output);
        bail!("File already exists: {}", output.display());
    }

    let example_config = include_str!("../mcp-auth.example.toml");
    tokio::fs::write(output, example_config).await?;

    info!("Generated configuration file: {:?}", output);
    info!("Edit the registrations, then run:");
    info!("  mcp-auth-client --config {:?} tools", output);

    Ok(())
}
