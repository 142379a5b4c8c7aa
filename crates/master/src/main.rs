use anyhow::{anyhow, Context, Result};
use clap::Parser;
use master::{coordinator, registrar, System};
use screen::{InputReader, Surface, MS_PER_FRAME};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, Level};

/// How far one tick of held movement keys moves the camera.
const MOVE_STEP: f64 = 0.1;

#[derive(Parser, Debug)]
#[command(name = "master", about = "Distributed ray-tracing master")]
struct Args {
    /// JSON scene description.
    scene: PathBuf,

    /// Window width in pixels.
    width: u32,

    /// Window height in pixels.
    height: u32,

    /// Port workers register on.
    registration_port: u16,

    /// Deadline for one BulkTrace call, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    trace_timeout_ms: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();
    let trace_timeout = Duration::from_millis(args.trace_timeout_ms);

    let env = scene::environment_from_file(&args.scene)
        .with_context(|| format!("could not load scene {}", args.scene.display()))?;
    info!(
        meshes = env.meshes.mesh_count(),
        objects = env.state.objs.len(),
        lights = env.state.lights.len(),
        "scene loaded"
    );

    let system = Arc::new(System::new(env));
    let surface = Arc::new(Surface::new(args.width, args.height));

    let runtime = tokio::runtime::Runtime::new().context("could not start the async runtime")?;
    let listener = runtime
        .block_on(TcpListener::bind(("0.0.0.0", args.registration_port)))
        .with_context(|| format!("could not bind registration port {}", args.registration_port))?;
    info!(port = args.registration_port, "listening for worker registrations");
    runtime.spawn(registrar::serve(
        Arc::clone(&system),
        listener,
        args.width,
        args.height,
    ));

    let mut window = screen::open_window(
        "Distributed Ray-Tracer",
        args.width as usize,
        args.height as usize,
    )
    .map_err(|e| anyhow!("could not open the window: {e}"))?;

    // The first coordinator's paint token.
    let (token_tx, first_rx) = oneshot::channel();
    token_tx.send(()).expect("the first token always sends");
    let mut chain = first_rx;

    let mut reader = InputReader::new();
    let mut frame: u64 = 0;

    loop {
        let tick = Instant::now();

        let events = reader.poll(&window);
        if !events.running {
            break;
        }

        if events.moved() {
            let diff = {
                let mut env = system.scene.write().expect("scene lock poisoned");
                let fov = env.state.cam.fov;
                env.state.cam.move_by(MOVE_STEP, events.dirs);
                env.state.cam.yaw(events.yaw * fov / 2.0);
                env.state.cam.pitch(
                    events.pitch * (f64::from(args.height) / f64::from(args.width)) * fov / 2.0,
                );
                env.state.encode()
            };

            match diff {
                Ok(diff) => {
                    let (out_tx, out_rx) = oneshot::channel();
                    runtime.spawn(coordinator::run_frame(
                        system.workers.clone(),
                        Arc::clone(&surface),
                        diff,
                        frame,
                        trace_timeout,
                        std::mem::replace(&mut chain, out_rx),
                        out_tx,
                    ));
                }
                Err(e) => error!(frame, "could not encode the frame diff: {e}"),
            }
            frame += 1;
        }

        surface
            .present(&mut window)
            .map_err(|e| anyhow!("window update failed: {e}"))?;

        let elapsed = tick.elapsed();
        let budget = Duration::from_millis(MS_PER_FRAME);
        if elapsed < budget {
            std::thread::sleep(budget - elapsed);
        }
    }

    // Let the frames already in flight composite before tearing down.
    let _ = runtime.block_on(chain);
    system.workers.destroy();
    Ok(())
}
