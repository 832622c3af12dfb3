//! AS2 command line.
//!
//! # Commands
//!
//! - `serve` - Run the AS2 receiving endpoint
//! - `send` - Send a file to a partner under a P-Mode
//! - `inspect` - Describe a MIME entity or MDN as JSON

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use as2::{
    config::Config,
    message::{generate_message_id, GenericMessageInfo, MdnInfo, UserMessage},
    mime::{multipart, ContentType, MimePart},
    server::{serve, AppState, ServerConfig},
    transport::HttpSender,
    VERSION,
};
use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser)]
#[command(name = "as2")]
#[command(version = VERSION)]
#[command(about = "AS2 (RFC 4130) message exchange", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the AS2 receiving endpoint
    Serve {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen port (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,

        /// Listen host (overrides configuration)
        #[arg(long)]
        host: Option<String>,

        /// Bind to all interfaces
        #[arg(long)]
        bind_all: bool,

        /// Do not push asynchronous MDNs
        #[arg(long)]
        no_async_mdn: bool,
    },

    /// Send a file to a partner
    Send {
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// P-Mode governing the exchange
        #[arg(short = 'm', long)]
        pmode: String,

        /// Payload file (or - for stdin)
        file: String,

        /// Payload content type
        #[arg(short = 't', long, default_value = "application/octet-stream")]
        content_type: String,

        /// Subject header
        #[arg(short, long)]
        subject: Option<String>,
    },

    /// Describe a MIME entity (headers and body) or MDN
    Inspect {
        /// Input file (or - for stdin)
        file: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            bind_all,
            no_async_mdn,
        } => cmd_serve(config, port, host, bind_all, no_async_mdn),

        Commands::Send {
            config,
            pmode,
            file,
            content_type,
            subject,
        } => cmd_send(&config, &pmode, &file, &content_type, subject),

        Commands::Inspect { file } => cmd_inspect(&file),
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let file = match path {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    Ok(file.merge(Config::from_env()))
}

fn cmd_serve(
    config: Option<PathBuf>,
    port: Option<u16>,
    host: Option<String>,
    bind_all: bool,
    no_async_mdn: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(config)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let mut server_config = ServerConfig::from_http(&config.server)?;
    if bind_all {
        server_config = server_config.bind_all();
    }

    let mut state = AppState::new(server_config.clone(), config.pipeline()?);
    if !no_async_mdn {
        state = state.with_sender(HttpSender::from_config(&config.server)?);
    }

    tracing::info!("Starting AS2 endpoint on {}{}", server_config.addr, server_config.path);
    tracing::info!(
        pmodes = config.pmodes.len(),
        certificates = config.certificates.len(),
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(Arc::new(state)))?;
    Ok(())
}

fn cmd_send(
    config_path: &PathBuf,
    pmode: &str,
    file: &str,
    content_type: &str,
    subject: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(Some(config_path.clone()))?;
    let pipeline = config.pipeline()?;
    let sender = HttpSender::from_config(&config.server)?;

    let content_type = ContentType::parse(content_type)?;
    let data = read_input(file)?;

    let mut info = GenericMessageInfo::new(generate_message_id(&config.local.message_id_domain));
    if let Some(subject) = subject {
        info = info.with_subject(subject);
    }
    let message = UserMessage {
        info,
        pmode_id: Some(pmode.to_string()),
        payload: MimePart::binary(&content_type, data),
        mdn_request: None,
    };

    let outbound = pipeline.prepare_send(&message)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(sender.send(&outbound));
    let state = pipeline.complete_send(&outbound.message_id, outcome)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "message_id": outbound.message_id,
            "url": outbound.url,
            "state": state.to_string(),
        }))?
    );
    Ok(())
}

fn cmd_inspect(file: &str) -> anyhow::Result<()> {
    let raw = read_input(file)?;
    let part = MimePart::parse(&raw)?;
    let content_type = part.content_type()?;

    let report = if content_type.is_mdn() {
        let info = GenericMessageInfo::from_headers(part.headers());
        let mdn = MdnInfo::parse(&part, info)?;
        json!({
            "kind": "mdn",
            "message_id": mdn.info.message_id,
            "original_message_id": mdn.info.ref_to_message_id,
            "positive": mdn.is_positive(),
            "metadata": serde_json::to_value(mdn.metadata(None))?,
        })
    } else {
        let parts = if content_type.boundary().is_some() {
            multipart::parse_parts(&part)?
                .iter()
                .map(|p| {
                    json!({
                        "content_type": p.headers().get("Content-Type"),
                        "bytes": p.body().len(),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };
        json!({
            "kind": "entity",
            "content_type": content_type.mime_type(),
            "signed": content_type.is_signed(),
            "encrypted": content_type.is_enveloped(),
            "compressed": content_type.is_compressed(),
            "headers": part.headers().iter().map(|(n, v)| json!([n, v])).collect::<Vec<_>>(),
            "bytes": part.body().len(),
            "parts": parts,
        })
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_input(file: &str) -> anyhow::Result<Vec<u8>> {
    if file == "-" {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read(file).with_context(|| format!("reading {file}"))
    }
}
