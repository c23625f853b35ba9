mod app;
mod game;
mod net;
mod tui;

use std::fs::File;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Runtime;

use cubesync::{
    DEFAULT_MAX_PLAYERS, DEFAULT_PORT, LocalBackend, MotionConfig, RemoteBackend, SessionBackend,
    SessionService,
};

use app::App;
use net::{ClientConfig, resolve_server_addr};
use tui::Tui;

const LEAVE_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "Cubesync terminal client")]
struct Args {
    #[arg(short, long, help = "Session server address (host:port)")]
    server: Option<String>,

    #[arg(long, help = "Use an in-process session service instead of a server")]
    offline: bool,

    #[arg(short, long, default_value = "", help = "Prefilled profile name")]
    profile: String,

    #[arg(long, default_value = "", help = "Prefilled session name")]
    session: String,

    #[arg(long, default_value_t = DEFAULT_MAX_PLAYERS)]
    max_players: u32,

    #[arg(long, default_value_t = 10.0, help = "Cube speed in units per second")]
    speed: f32,

    #[arg(long, help = "Drive the Z axis with vertical input instead of Y")]
    vertical_to_z: bool,

    #[arg(long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(long, default_value = "cubesync-client.log")]
    log_file: String,
}

fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();

    // The terminal belongs to the UI, so logs go to a file.
    let log_file = File::create(&args.log_file)
        .with_context(|| format!("failed to create log file '{}'", args.log_file))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let server_addr = if args.offline {
        None
    } else {
        let server = args
            .server
            .take()
            .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_PORT));
        Some(resolve_server_addr(&server)?)
    };

    let config = ClientConfig {
        server_addr,
        max_players: args.max_players,
        tick_rate: args.tick_rate,
        motion: MotionConfig {
            speed: args.speed,
            apply_vertical_to_z_axis: args.vertical_to_z,
        },
        profile: args.profile,
        session: args.session,
    };

    let runtime = Runtime::new()?;

    match config.server_addr {
        Some(addr) => {
            log::info!("Using session server at {}", addr);
            run(&runtime, RemoteBackend::new(addr), &config)
        }
        None => {
            log::info!("Running offline");
            run(&runtime, LocalBackend::new(SessionService::shared()), &config)
        }
    }
}

fn run<B: SessionBackend>(
    runtime: &Runtime,
    backend: B,
    config: &ClientConfig,
) -> anyhow::Result<()> {
    let leave = {
        let _guard = runtime.enter();
        let mut app = App::new(runtime.handle().clone(), backend, config);

        let result = Tui::new().and_then(|mut tui| tui.run(&mut app));
        if let Err(e) = &result {
            log::error!("Terminal error: {}", e);
        }
        let leave = app.shutdown();
        result?;
        leave
    };

    if let Some(leave) = leave {
        let _ = runtime.block_on(tokio::time::timeout(LEAVE_GRACE, leave));
    }

    log::info!("Client exiting");
    Ok(())
}
