use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use waav_realtime_client::{
    BrokerState, ClientConfig, RealtimeSession, SessionBackends, SessionStatus,
    core::realtime::openai::ClientEvent, routes,
};

/// WaaV Realtime - WebRTC voice sessions and ephemeral credential broker
#[derive(Parser, Debug)]
#[command(name = "waav-realtime")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run (defaults to `broker`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the ephemeral credential endpoint
    Broker,

    /// Open a realtime session and print the live transcript until Ctrl-C
    Connect {
        /// Text message to send once the session is connected
        #[arg(short = 's', long = "say")]
        say: Option<String>,

        /// Start with the microphone muted
        #[arg(long = "muted", default_value_t = false)]
        muted: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        println!("Loading configuration from {}", config_path.display());
        ClientConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ClientConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    match cli.command.unwrap_or(Commands::Broker) {
        Commands::Broker => run_broker(config).await,
        Commands::Connect { say, muted } => run_session(config, say, muted).await,
    }
}

async fn run_broker(config: ClientConfig) -> anyhow::Result<()> {
    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; session requests will fail with 500");
    }

    let address = config.address();
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    let app = routes::create_app(BrokerState::new(config));

    println!("Server listening on http://{}", socket_addr);
    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_session(config: ClientConfig, say: Option<String>, muted: bool) -> anyhow::Result<()> {
    let (backends, _feeder, mut remote_streams) = SessionBackends::webrtc(
        config.credential_broker(),
        config.signaling(),
        config.peer_config(),
    );
    let mut session = RealtimeSession::new(config.session_config(), backends);

    session.on_transcript(Arc::new(|message| {
        Box::pin(async move {
            if message.is_final() {
                println!("[{}] {}", message.role, message.text);
            }
        })
    }));

    // Remote audio is drained; this binary has no output device
    tokio::spawn(async move {
        while let Some(mut stream) = remote_streams.recv().await {
            info!(stream_id = %stream.stream_id, mime_type = %stream.mime_type, "Remote audio stream");
            tokio::spawn(async move { while stream.frames.recv().await.is_some() {} });
        }
    });

    session.connect().await?;
    if muted {
        session.mute();
    }

    if let Some(text) = say {
        session.send(ClientEvent::user_text(text)).await?;
        session.send(ClientEvent::create_response()).await?;
    }

    let mut status = session.subscribe_status();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing session");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() || *status.borrow() == SessionStatus::Error {
                    break;
                }
            }
        }
    }

    let failure = session.last_error();
    session.disconnect().await;

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
