use clap::{Parser, Subcommand};
use lib::bus::{LogBus, OutboundSms, TransportMetadata};
use lib::vendor::VendorClient;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "vas2nets-sms")]
#[command(about = "Vas2Nets SMS transport", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the transport: inbound HTTP listener plus outbound worker. Bus
    /// events are logged until a broker client is wired in.
    Run {
        /// Config file path (default: VAS2NETS_CONFIG_PATH or ~/.vas2nets-sms/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Inbound HTTP port (default from config or 15252)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one SMS through the outbound pipeline (operational check).
    Send {
        /// Config file path (default: VAS2NETS_CONFIG_PATH or ~/.vas2nets-sms/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Destination address (receiver)
        #[arg(long)]
        to: String,

        /// Origin address (sender)
        #[arg(long)]
        from: String,

        /// Message body
        #[arg(long)]
        text: String,

        /// Vendor msgid of the MO being answered (claims the free reply)
        #[arg(long, value_name = "ID")]
        msgid: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("vas2nets-sms {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run { config, port }) => {
            if let Err(e) = run_transport(config, port).await {
                log::error!("transport failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send {
            config,
            to,
            from,
            text,
            msgid,
        }) => {
            if let Err(e) = run_send(config, to, from, text, msgid).await {
                log::error!("send failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_transport(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!(
        "starting transport on {}:{}",
        config.server.bind,
        config.server.port
    );
    let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel::<OutboundSms>(64);
    // No broker consumer feeds the outbound side in a standalone run; close
    // the channel so the worker exits once the server drains.
    drop(outbound_tx);
    lib::server::run_transport(config, Arc::new(LogBus), outbound_rx).await
}

async fn run_send(
    config_path: Option<std::path::PathBuf>,
    to: String,
    from: String,
    text: String,
    msgid: Option<String>,
) -> anyhow::Result<()> {
    let config = lib::config::load_config(config_path)?;
    let missing = config.validate();
    if !missing.is_empty() {
        anyhow::bail!("missing required config options: {}", missing.join(", "));
    }
    let creds = config
        .credentials()
        .ok_or_else(|| anyhow::anyhow!("vendor credentials not configured"))?;
    let url = config
        .outbound_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("outboundUrl not configured"))?;
    let client = VendorClient::new(url, config.outbound_request_timeout);
    let message = OutboundSms {
        message_id: uuid::Uuid::new_v4().to_string(),
        from_addr: Some(from),
        to_addr: Some(to),
        content: Some(text),
        transport_metadata: msgid.map(TransportMetadata::with_msgid),
    };
    log::info!("sending message {}", message.message_id);
    lib::outbound::handle_outbound(&message, &creds, &client, &LogBus).await;
    Ok(())
}
