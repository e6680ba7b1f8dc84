//! kbchat Web Server
//!
//! Multi-tenant knowledge-base chat over HTTP.

use anyhow::Context;
use clap::Parser;
use kbchat_core::{init_logging, KbChatConfig, LogFormat, LoggingConfig, VectorBackend};
use kbchat_web::server::KbChatServerBuilder;

/// kbchat Web Server - knowledge-base chat for companies and their customers
#[derive(Parser)]
#[command(name = "kbchat-web")]
#[command(about = "HTTP server for multi-tenant knowledge-base chat")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// SQLite URL for users, chat logs and documents
    #[arg(long)]
    database_url: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Vector backend (pinecone, memory)
    #[arg(long)]
    vector_backend: Option<VectorBackend>,

    /// Log level (error, warn, info, debug, trace), overrides `[logging]` in the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (json, pretty, compact)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<String>,
}

/// The config file's `[logging]` section with command-line flags on top
fn logging_config(args: &Args, file: Option<&KbChatConfig>) -> LoggingConfig {
    let mut logging = file.map(|c| c.logging.clone()).unwrap_or_default();
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = args.log_format {
        logging.format = format;
    }
    if let Some(path) = &args.log_file {
        logging.log_to_file = true;
        logging.log_file_path = Some(path.clone());
    }
    logging
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Flags override the environment
    let mut builder = KbChatServerBuilder::new().dev_mode(args.dev);
    if let Some(host) = args.host.clone() {
        builder = builder.host(host);
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(database_url) = args.database_url.clone() {
        builder = builder.database_url(database_url);
    }
    if let Some(config) = args.config.clone() {
        builder = builder.config_path(config);
    }
    if let Some(backend) = args.vector_backend {
        builder = builder.vector_backend(backend);
    }

    let file_config = builder
        .config()
        .config_path
        .as_deref()
        .map(KbChatConfig::from_file)
        .transpose()
        .context("Failed to load configuration file")?;

    init_logging(&logging_config(&args, file_config.as_ref()))
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!(address = %builder.config().address(), "Building server");
    let server = builder.build().await.context("Failed to build server")?;

    server.start().await.context("Server failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["kbchat-web"]);
        assert!(args.host.is_none());
        assert!(args.port.is_none());
        assert!(!args.dev);
        assert!(args.log_level.is_none());
        assert!(args.log_format.is_none());

        let args = Args::parse_from([
            "kbchat-web",
            "--host",
            "0.0.0.0",
            "--port",
            "3000",
            "--dev",
            "--vector-backend",
            "memory",
            "--log-format",
            "json",
        ]);
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(3000));
        assert!(args.dev);
        assert_eq!(args.vector_backend, Some(VectorBackend::Memory));
        assert_eq!(args.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn logging_section_applies_without_flags() {
        let mut file = KbChatConfig::default();
        file.logging.level = "warn".to_string();
        file.logging.format = LogFormat::Json;
        file.logging.log_to_file = true;
        file.logging.log_file_path = Some("/var/log/kbchat.log".to_string());

        let logging = logging_config(&Args::parse_from(["kbchat-web"]), Some(&file));
        assert_eq!(logging.level, "warn");
        assert_eq!(logging.format, LogFormat::Json);
        assert!(logging.log_to_file);
        assert_eq!(logging.log_file_path.as_deref(), Some("/var/log/kbchat.log"));
    }

    #[test]
    fn flags_override_logging_section() {
        let mut file = KbChatConfig::default();
        file.logging.level = "warn".to_string();

        let args = Args::parse_from([
            "kbchat-web",
            "--log-level",
            "debug",
            "--log-format",
            "compact",
            "--log-file",
            "kbchat.log",
        ]);
        let logging = logging_config(&args, Some(&file));
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Compact);
        assert!(logging.log_to_file);
        assert_eq!(logging.log_file_path.as_deref(), Some("kbchat.log"));

        let defaults = logging_config(&Args::parse_from(["kbchat-web"]), None);
        assert_eq!(defaults.level, LoggingConfig::default().level);
    }
}
