use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatpilot::{
    ChatId, Client, ClientConfig, ClientEvent, ClientId, LocalAuth, SendOptions,
};
use chatpilot_event_bus::recv_matching;

#[derive(Parser)]
#[command(name = "chatpilot", version, about = "Drive a web messaging client from the terminal")]
struct Cli {
    /// URL of the remote messaging web client.
    #[arg(long, env = "CHATPILOT_WEB_URL")]
    web_url: String,

    /// Profile key; lets several accounts coexist side by side.
    #[arg(long)]
    client_id: Option<String>,

    /// Distinct QR tokens to allow before giving up (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    qr_max_retries: u32,

    /// Use phone-pairing login with this number instead of QR capture.
    #[arg(long)]
    pairing_phone: Option<String>,

    /// Run the browser with a visible window.
    #[arg(long)]
    headful: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in interactively and persist the session profile.
    Login,
    /// Stream domain events as JSON lines until interrupted.
    Watch,
    /// Send one message.
    Send {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let client = build_client(&cli)?;

    let result = match &cli.command {
        Command::Login => run_login(&client).await,
        Command::Watch => run_watch(&client).await,
        Command::Send { chat, body } => run_send(&client, chat, body).await,
    };

    client.destroy().await;
    result
}

fn build_client(cli: &Cli) -> Result<Arc<Client>> {
    let mut config = ClientConfig::new(cli.web_url.clone());
    config.qr_max_retries = cli.qr_max_retries;
    config.pairing_phone = cli.pairing_phone.clone();
    if cli.headful {
        config.session.headless = false;
    }

    let client_id = cli.client_id.clone().map(ClientId);
    let auth = LocalAuth::with_defaults(client_id).context("session store setup failed")?;
    Ok(Client::new(config, Arc::new(auth)))
}

/// Print login tokens as they rotate, then report readiness.
async fn run_login(client: &Arc<Client>) -> Result<()> {
    let mut events = client.events();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Qr { token }) => println!("scan qr token: {token}"),
                Ok(ClientEvent::PairingCode { code }) => println!("pairing code: {code}"),
                Ok(ClientEvent::AuthenticationFailure { message }) => {
                    eprintln!("authentication failure: {message}")
                }
                Ok(ClientEvent::Disconnected(reason)) => {
                    eprintln!("disconnected: {reason}");
                    break;
                }
                Ok(ClientEvent::Ready) => {
                    println!("logged in; session profile persisted");
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    client.initialize().await?;
    let _ = printer.await;
    Ok(())
}

/// Initialize and dump every domain event as one JSON line.
async fn run_watch(client: &Arc<Client>) -> Result<()> {
    let mut events = client.events();
    client.initialize().await?;
    info!("watching; press ctrl-c to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    let line = serde_json::to_string(&event)
                        .unwrap_or_else(|_| format!("{{\"kind\":\"{}\"}}", event.kind()));
                    println!("{line}");
                    if matches!(event, ClientEvent::Disconnected(_)) {
                        break;
                    }
                }
                Err(_) => break,
            },
        }
    }
    Ok(())
}

async fn run_send(client: &Arc<Client>, chat: &str, body: &str) -> Result<()> {
    let mut events = client.events();
    client.initialize().await?;

    let ready = recv_matching(&mut events, Duration::from_secs(120), |event| {
        matches!(event, ClientEvent::Ready | ClientEvent::Disconnected(_))
    })
    .await;
    match ready {
        Some(ClientEvent::Ready) => {}
        Some(ClientEvent::Disconnected(reason)) => bail!("disconnected before ready: {reason}"),
        _ => bail!("session did not become ready"),
    }

    let message = client
        .send_message(&ChatId(chat.to_string()), body, &SendOptions::default())
        .await?;
    println!("sent {}", message.id);
    Ok(())
}
