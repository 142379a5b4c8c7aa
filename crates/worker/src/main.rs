use anyhow::{Context, Result};
use clap::Parser;
use protocol::WorkerLink;
use scene::SceneMeshes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use worker::{serve, TraceService, REGISTER_PERIOD, REGISTRATION_TIMEOUT};

#[derive(Parser, Debug)]
#[command(name = "worker", about = "Distributed ray-tracing worker")]
struct Args {
    /// Master registration address, `host:port`.
    master_addr: String,

    /// Port to serve work orders on.
    listen_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();

    // Bind, register, serve until idle, repeat. The worker never exits in
    // steady state; only a failure to bind the listen port is fatal. The
    // listener goes up before registration because the master connects
    // back while handling the Register call.
    loop {
        let listener = TcpListener::bind(("0.0.0.0", args.listen_port))
            .await
            .with_context(|| format!("could not bind listen port {}", args.listen_port))?;

        match protocol::register(
            &args.master_addr,
            WorkerLink {
                port: args.listen_port.into(),
            },
            REGISTRATION_TIMEOUT,
        )
        .await
        {
            Ok(master_state) => match SceneMeshes::decode(&master_state.state) {
                Ok(meshes) => {
                    info!(
                        meshes = meshes.mesh_count(),
                        screen_width = master_state.screen_width,
                        screen_height = master_state.screen_height,
                        "registered with master"
                    );

                    let service = Arc::new(TraceService::new(
                        meshes,
                        master_state.screen_width,
                        master_state.screen_height,
                    ));
                    match serve(service, listener).await {
                        Ok(()) => info!("trace server idle, re-registering"),
                        Err(e) => warn!("trace server stopped: {e}"),
                    }
                }
                Err(e) => warn!("could not decode the scene state: {e}"),
            },
            Err(e) => warn!("registration failed: {e}"),
        }

        tokio::time::sleep(REGISTER_PERIOD).await;
    }
}
