use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use cubesync::{DEFAULT_PORT, ServerConfig, SessionServer, SharedSessionService};

#[derive(Parser)]
#[command(name = "cubesync-server")]
#[command(about = "Cubesync session server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = 256)]
    max_connections: usize,

    #[arg(long, default_value_t = 64, help = "Per-connection event buffer")]
    event_buffer: usize,

    #[arg(long, default_value_t = 30, help = "Seconds between session summaries (0 = off)")]
    status_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let config = ServerConfig {
        max_connections: args.max_connections,
        event_buffer: args.event_buffer,
    };

    let server = SessionServer::bind(bind_addr, config).await?;
    log::info!("Session server listening on {}", server.local_addr()?);

    if args.status_interval > 0 {
        tokio::spawn(log_status(
            server.service(),
            Duration::from_secs(args.status_interval),
        ));
    }

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => log::info!("Server shutting down"),
    }

    Ok(())
}

async fn log_status(service: SharedSessionService, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let sessions = service.lock().await.list();
        if sessions.is_empty() {
            continue;
        }

        log::info!("{} active session(s)", sessions.len());
        for session in sessions {
            log::info!(
                "  [{}] '{}' {}/{} players, owner client {}",
                session.id,
                session.name,
                session.player_count,
                session.max_players,
                session.owner
            );
        }
    }
}
