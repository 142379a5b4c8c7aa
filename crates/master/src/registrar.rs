use crate::System;
use protocol::{
    read_frame, write_frame, Frame, MasterState, ProtocolError, Request, Response, WorkerLink,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

/// Accepts worker registrations until the listener fails.
pub async fn serve(
    system: Arc<System>,
    listener: TcpListener,
    screen_width: u32,
    screen_height: u32,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let system = Arc::clone(&system);
                tokio::spawn(async move {
                    if let Err(e) =
                        handle(system, stream, peer, screen_width, screen_height).await
                    {
                        warn!(%peer, "registration failed: {e}");
                    }
                });
            }
            Err(e) => {
                error!("registration accept failed: {e}");
                return;
            }
        }
    }
}

async fn handle(
    system: Arc<System>,
    mut stream: TcpStream,
    peer: SocketAddr,
    screen_width: u32,
    screen_height: u32,
) -> Result<(), ProtocolError> {
    let frame: Frame<Request> = read_frame(&mut stream).await?;
    let response = match frame.body {
        Request::Register(link) => {
            register_worker(&system, peer, link, screen_width, screen_height).await
        }
        other => Response::Error(format!("expected a registration request, got {other:?}")),
    };

    write_frame(
        &mut stream,
        &Frame {
            id: frame.id,
            deadline_ms: None,
            body: response,
        },
    )
    .await
}

/// Registers one worker: its reachable address is the connection's peer IP
/// with the advertised listen port, the immutable environment is encoded
/// under the scene read lock, and the pool connects back before the
/// response is sent.
async fn register_worker(
    system: &System,
    peer: SocketAddr,
    link: WorkerLink,
    screen_width: u32,
    screen_height: u32,
) -> Response {
    let address = SocketAddr::new(peer.ip(), link.port as u16).to_string();

    if system.workers.contains(&address) {
        return Response::Error(format!("{address} is already registered"));
    }

    let state = {
        let env = system.scene.read().expect("scene lock poisoned");
        match env.meshes.encode() {
            Ok(state) => state,
            Err(e) => return Response::Error(format!("could not encode the scene: {e}")),
        }
    };

    match system.workers.add(&address).await {
        Ok(()) => {
            info!(worker = %address, "worker registered");
            Response::Registered(MasterState {
                state,
                screen_width,
                screen_height,
            })
        }
        Err(e) => Response::Error(format!("could not connect back to {address}: {e}")),
    }
}
