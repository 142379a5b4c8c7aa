//! Local preview: traces the scene sequentially into a window, with the
//! same camera controls as the distributed master but no workers.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use protocol::{Colour, TraceResults};
use screen::{InputReader, Surface, Tile, MS_PER_FRAME};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, Level};

const MOVE_STEP: f64 = 0.1;

#[derive(Parser, Debug)]
#[command(name = "preview", about = "Sequential ray-tracing preview")]
struct Args {
    /// JSON scene description.
    scene: PathBuf,

    /// Render width in pixels. Sequential tracing is CPU-bound, so the
    /// defaults stay small.
    #[arg(long, default_value_t = 240)]
    width: u32,

    /// Render height in pixels.
    #[arg(long, default_value_t = 135)]
    height: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut env = scene::environment_from_file(&args.scene)
        .with_context(|| format!("could not load scene {}", args.scene.display()))?;
    info!(objects = env.state.objs.len(), "scene loaded");

    let surface = Surface::new(args.width, args.height);
    let mut window = screen::open_window(
        "Sequential Ray-Tracer",
        args.width as usize,
        args.height as usize,
    )
    .map_err(|e| anyhow!("could not open the window: {e}"))?;

    let mut reader = InputReader::new();
    loop {
        let tick = Instant::now();

        let events = reader.poll(&window);
        if !events.running {
            break;
        }

        if events.moved() {
            let fov = env.state.cam.fov;
            env.state.cam.move_by(MOVE_STEP, events.dirs);
            env.state.cam.yaw(events.yaw * fov / 2.0);
            env.state.cam.pitch(
                events.pitch * (f64::from(args.height) / f64::from(args.width)) * fov / 2.0,
            );
        }

        let mut results = Vec::with_capacity((args.width * args.height) as usize);
        for i in 0..args.width {
            for j in 0..args.height {
                let colour = tracer::trace_pixel(i, j, args.width, args.height, &env.state);
                results.push(match colour {
                    Some(c) => {
                        let (r, g, b) = c.to_u8();
                        Colour {
                            r: r.into(),
                            g: g.into(),
                            b: b.into(),
                        }
                    }
                    None => Colour { r: 0, g: 0, b: 0 },
                });
            }
        }
        surface.paint_frame(&[Tile {
            x: 0,
            y: 0,
            width: args.width,
            height: args.height,
            results: TraceResults { results },
        }]);
        surface
            .present(&mut window)
            .map_err(|e| anyhow!("window update failed: {e}"))?;

        let elapsed = tick.elapsed();
        let budget = Duration::from_millis(MS_PER_FRAME);
        if elapsed < budget {
            std::thread::sleep(budget - elapsed);
        }
    }

    Ok(())
}
