use std::io;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bevy::prelude::*;

use super::GraphIndex;
use crate::navgrid::CellId;

/// Path query for the worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathRequest {
    /// Grid generation the ids belong to.
    pub generation: u64,
    /// First cell.
    pub start: CellId,
    /// Last cell.
    pub target: CellId,
}

/// Worker answer to a [`PathRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathResponse {
    /// Generation of the index the search actually ran on.
    pub generation: u64,
    /// First cell.
    pub start: CellId,
    /// Last cell.
    pub target: CellId,
    /// Cells from start to target, empty when unreachable.
    pub path: Vec<CellId>,
}

enum Command {
    Setup { generation: u64, index: GraphIndex },
    Find(PathRequest),
    Shutdown,
}

/// Path search on a dedicated worker thread.
///
/// The owner hands over a fresh [`GraphIndex`] after every rebuild and sends
/// requests; nothing is shared between the two sides except the channels.
/// Answers carry the generation of the index they were computed on, so the
/// owner can drop answers that belong to a superseded grid.
#[derive(Resource)]
pub struct PathService {
    commands: Sender<Command>,
    responses: Mutex<Receiver<PathResponse>>,
    worker: Option<JoinHandle<()>>,
}

impl PathService {
    /// Starts the worker thread.
    pub fn spawn() -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (resp_tx, resp_rx) = mpsc::channel::<PathResponse>();
        let worker = thread::Builder::new()
            .name("path-service".into())
            .spawn(move || run_worker(cmd_rx, resp_tx))?;
        Ok(Self {
            commands: cmd_tx,
            responses: Mutex::new(resp_rx),
            worker: Some(worker),
        })
    }

    /// Replaces the worker's index.
    pub fn setup(&self, generation: u64, index: GraphIndex) {
        self.send(Command::Setup { generation, index });
    }

    /// Queues a path query.
    pub fn request(&self, request: PathRequest) {
        self.send(Command::Find(request));
    }

    /// All answers that arrived so far.
    pub fn poll(&self) -> Vec<PathResponse> {
        match self.responses.lock() {
            Ok(rx) => rx.try_iter().collect(),
            Err(_) => {
                error!("path service response channel poisoned");
                Vec::new()
            }
        }
    }

    /// Waits up to `timeout` for the next answer.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PathResponse> {
        let rx = self.responses.lock().ok()?;
        match rx.recv_timeout(timeout) {
            Ok(resp) => Some(resp),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("path service worker is gone");
                None
            }
        }
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            warn!("path service worker is gone; command dropped");
        }
    }
}

impl Drop for PathService {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("path service worker panicked");
        }
    }
}

fn run_worker(commands: Receiver<Command>, responses: Sender<PathResponse>) {
    let mut generation = 0;
    let mut index = GraphIndex::default();
    for cmd in commands {
        match cmd {
            Command::Setup {
                generation: g,
                index: i,
            } => {
                debug!("path service: index for generation {g} with {} cells", i.len());
                generation = g;
                index = i;
            }
            Command::Find(req) => {
                let path = if req.generation == generation {
                    index.find(req.start, req.target)
                } else {
                    debug!(
                        "path service: request for generation {} against {generation}",
                        req.generation
                    );
                    Vec::new()
                };
                let resp = PathResponse {
                    generation,
                    start: req.start,
                    target: req.target,
                    path,
                };
                if responses.send(resp).is_err() {
                    break;
                }
            }
            Command::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navgrid::CellGraph;

    const WAIT: Duration = Duration::from_secs(5);

    fn chain(len: u32) -> GraphIndex {
        let mut g = CellGraph::new();
        for n in 0..len {
            let p = Vec3::new(n as f32, 0.0, 0.0);
            g.insert_node(CellId::from_number(n), p, p);
            if n > 0 {
                g.link(CellId::from_number(n - 1), CellId::from_number(n));
            }
        }
        GraphIndex::from_graph(&g)
    }

    #[test]
    fn answers_queries_on_the_current_index() {
        let service = PathService::spawn().unwrap();
        service.setup(1, chain(4));
        let (start, target) = (CellId::from_number(0), CellId::from_number(3));
        service.request(PathRequest {
            generation: 1,
            start,
            target,
        });
        let resp = service.recv_timeout(WAIT).expect("worker answers");
        assert_eq!(resp.generation, 1);
        assert_eq!(resp.path, (0..4).map(CellId::from_number).collect::<Vec<_>>());
    }

    #[test]
    fn stale_requests_get_empty_answers() {
        let service = PathService::spawn().unwrap();
        service.setup(1, chain(3));
        service.setup(2, chain(2));
        service.request(PathRequest {
            generation: 1,
            start: CellId::from_number(0),
            target: CellId::from_number(2),
        });
        let resp = service.recv_timeout(WAIT).expect("worker answers");
        assert_eq!(resp.generation, 2);
        assert!(resp.path.is_empty());
    }

    #[test]
    fn drop_stops_the_worker() {
        let service = PathService::spawn().unwrap();
        service.setup(1, chain(2));
        drop(service);
    }
}
