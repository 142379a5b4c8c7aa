use protocol::{Colour, ProtocolError, TraceResults, WorkOrder};
use scene::{SceneMeshes, SceneState};
use std::time::Instant;

/// The worker's tracing state: the immutable scene received at
/// registration plus the screen geometry orders are relative to.
///
/// Never mutated after construction; every call decodes its own mutable
/// state and owns it for the duration of the call.
pub struct TraceService {
    meshes: SceneMeshes,
    screen_width: u32,
    screen_height: u32,
}

impl TraceService {
    pub fn new(meshes: SceneMeshes, screen_width: u32, screen_height: u32) -> Self {
        Self {
            meshes,
            screen_width,
            screen_height,
        }
    }

    /// Traces one work order's window.
    ///
    /// The diff is decoded and relinked to the resident meshes, then every
    /// pixel `(x+i, y+j)` is traced into `results[i * height + j]`. Pixels
    /// that miss serialise as black. The deadline is checked between
    /// pixels; exceeding it abandons the order with
    /// [`ProtocolError::Cancelled`].
    pub fn bulk_trace(
        &self,
        order: &WorkOrder,
        deadline: Option<Instant>,
    ) -> Result<TraceResults, ProtocolError> {
        let state = SceneState::decode(&order.diff)
            .and_then(|detached| detached.link(&self.meshes))
            .map_err(|e| ProtocolError::Decode(e.to_string()))?;

        let mut results = Vec::with_capacity(order.width as usize * order.height as usize);
        for i in 0..order.width {
            for j in 0..order.height {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(ProtocolError::Cancelled);
                }

                let colour = tracer::trace_pixel(
                    order.x + i,
                    order.y + j,
                    self.screen_width,
                    self.screen_height,
                    &state,
                );
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

        Ok(TraceResults { results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::RTree;
    use glam::DVec3;
    use scene::{Camera, Environment, Mesh, Object, ObjectId};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    /// A quad filling the right half of the view at z = 5.
    fn test_environment() -> Environment {
        let mesh = Arc::new(
            Mesh::from_obj_source(
                "v 0 -10 5\nv 10 -10 5\nv 10 10 5\nv 0 10 5\nf 1 2 3 4\n",
                None,
            )
            .unwrap(),
        );
        let path = PathBuf::from("quad.obj");

        let mut meshes = HashMap::new();
        meshes.insert(path.clone(), Arc::clone(&mesh));
        let mut paths = HashMap::new();
        paths.insert(ObjectId(0), path);

        Environment {
            meshes: SceneMeshes::new(meshes, paths),
            state: SceneState {
                objs: RTree::bulk_load(vec![Object::new(ObjectId(0), DVec3::ZERO, mesh)]),
                lights: vec![],
                cam: Camera::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 1.0), 1.0).unwrap(),
            },
        }
    }

    fn service_and_diff() -> (TraceService, Vec<u8>) {
        let env = test_environment();
        let diff = env.state.encode().unwrap();
        (TraceService::new(env.meshes, 64, 64), diff)
    }

    #[test]
    fn window_fills_column_major() {
        let (service, diff) = service_and_diff();
        let order = WorkOrder {
            x: 10,
            y: 20,
            width: 3,
            height: 2,
            diff,
        };
        let results = service.bulk_trace(&order, None).unwrap().results;
        assert_eq!(results.len(), 6);

        // results[i * height + j] must equal the pixel traced at
        // (x + i, y + j).
        let env = test_environment();
        for i in 0..3u32 {
            for j in 0..2u32 {
                let expected = match tracer::trace_pixel(10 + i, 20 + j, 64, 64, &env.state) {
                    Some(c) => {
                        let (r, g, b) = c.to_u8();
                        Colour {
                            r: r.into(),
                            g: g.into(),
                            b: b.into(),
                        }
                    }
                    None => Colour { r: 0, g: 0, b: 0 },
                };
                assert_eq!(results[(i * 2 + j) as usize], expected);
            }
        }
    }

    #[test]
    fn misses_serialise_as_black() {
        let (service, diff) = service_and_diff();
        // The left half of the screen sees empty space.
        let order = WorkOrder {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
            diff,
        };
        let results = service.bulk_trace(&order, None).unwrap().results;
        assert!(results.iter().all(|c| *c == Colour { r: 0, g: 0, b: 0 }));
    }

    #[test]
    fn expired_deadline_cancels() {
        let (service, diff) = service_and_diff();
        let order = WorkOrder {
            x: 0,
            y: 0,
            width: 64,
            height: 64,
            diff,
        };
        let expired = Instant::now() - Duration::from_millis(1);
        assert!(matches!(
            service.bulk_trace(&order, Some(expired)),
            Err(ProtocolError::Cancelled)
        ));
    }

    #[test]
    fn corrupt_diff_is_a_decode_error() {
        let (service, _) = service_and_diff();
        let order = WorkOrder {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            diff: vec![0xDE, 0xAD],
        };
        assert!(matches!(
            service.bulk_trace(&order, None),
            Err(ProtocolError::Decode(_))
        ));
    }
}
