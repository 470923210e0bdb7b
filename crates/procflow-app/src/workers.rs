//! Replace-on-new-request background workers.
//!
//! A [`WorkerSlot`] owns at most one in-flight request. Dispatching a new
//! request drops the receiving end of the previous one before the new thread
//! starts, so a late result from a superseded request has nowhere to go and
//! can never be observed. The superseded thread runs to completion and exits.

use crate::protocol::{WorkerRequest, WorkerResponse, handle_request};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, bounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub type Handler = Arc<dyn Fn(WorkerRequest) -> WorkerResponse + Send + Sync>;

struct InFlight {
    generation: u64,
    correlation_id: Uuid,
    kind: crate::protocol::RequestKind,
    rx: Receiver<WorkerResponse>,
}

pub struct WorkerSlot {
    name: &'static str,
    handler: Handler,
    generation: u64,
    in_flight: Option<InFlight>,
}

impl WorkerSlot {
    pub fn new(name: &'static str) -> Self {
        Self::with_handler(name, Arc::new(handle_request))
    }

    pub fn with_handler(name: &'static str, handler: Handler) -> Self {
        Self {
            name,
            handler,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Tear down the current request, if any. Its result is discarded.
    pub fn cancel(&mut self) {
        if let Some(old) = self.in_flight.take() {
            tracing::debug!(
                "{} worker: discarding request {} ({})",
                self.name,
                old.generation,
                old.correlation_id
            );
        }
    }

    /// Start `request` on a fresh thread, replacing any in-flight request.
    pub fn dispatch(&mut self, request: WorkerRequest) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let correlation_id = Uuid::new_v4();
        let kind = request.kind();

        let (tx, rx) = bounded(1);
        let fallback = tx.clone();
        let handler = Arc::clone(&self.handler);
        let name = self.name;
        let spawned = std::thread::Builder::new()
            .name(format!("procflow-{name}-{generation}"))
            .spawn(move || {
                let response = run_guarded(&handler, request, name);
                if tx.send(response).is_err() {
                    tracing::debug!(
                        "{} worker: request {} finished after being replaced; result dropped",
                        name,
                        generation
                    );
                }
            });
        if let Err(e) = spawned {
            tracing::error!("{} worker: failed to spawn thread: {}", name, e);
            let _ = fallback.send(WorkerResponse::error(kind, format!("failed to start worker: {e}")));
        }

        tracing::debug!(
            "{} worker: dispatched request {} ({:?}, {})",
            name,
            generation,
            kind,
            correlation_id
        );
        self.in_flight = Some(InFlight {
            generation,
            correlation_id,
            kind,
            rx,
        });
        generation
    }

    /// Non-blocking check for the current request's response.
    pub fn poll(&mut self) -> Option<WorkerResponse> {
        let in_flight = self.in_flight.as_ref()?;
        let response = match in_flight.rx.try_recv() {
            Ok(response) => response,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Self::lost(self.name, in_flight),
        };
        self.in_flight = None;
        Some(response)
    }

    /// Block up to `timeout` for the current request's response.
    pub fn wait(&mut self, timeout: Duration) -> Option<WorkerResponse> {
        let in_flight = self.in_flight.as_ref()?;
        let response = match in_flight.rx.recv_timeout(timeout) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Self::lost(self.name, in_flight),
        };
        self.in_flight = None;
        Some(response)
    }

    fn lost(name: &str, in_flight: &InFlight) -> WorkerResponse {
        tracing::error!(
            "{} worker: request {} ended without a response",
            name,
            in_flight.generation
        );
        WorkerResponse::error(in_flight.kind, "worker ended without a response")
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_guarded(handler: &Handler, request: WorkerRequest, name: &str) -> WorkerResponse {
    let kind = request.kind();
    match catch_unwind(AssertUnwindSafe(|| handler(request))) {
        Ok(response) => response,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("{} worker panicked: {}", name, message);
            WorkerResponse::error(kind, format!("worker panicked: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FindPathsPayload, RequestKind};
    use crossbeam_channel::unbounded;
    use procflow_core::NodeId;
    use procflow_graph::{EdgeRef, PathFinder};

    const WAIT: Duration = Duration::from_secs(5);

    fn find(start: &str, end: &str) -> WorkerRequest {
        WorkerRequest::FindAllPaths(FindPathsPayload {
            all_edges: vec![
                EdgeRef::new("A->B", "A", "B"),
                EdgeRef::new("B->C", "B", "C"),
                EdgeRef::new("A->C", "A", "C"),
            ],
            start_node_id: NodeId::new(start),
            end_node_id: NodeId::new(end),
            limits: PathFinder::default(),
        })
    }

    fn end_of(request: &WorkerRequest) -> String {
        match request {
            WorkerRequest::FindAllPaths(p) => p.end_node_id.0.clone(),
            _ => String::new(),
        }
    }

    #[test]
    fn test_dispatch_and_wait() {
        let mut slot = WorkerSlot::new("paths");
        slot.dispatch(find("A", "C"));
        assert!(slot.is_loading());
        match slot.wait(WAIT) {
            Some(WorkerResponse::PathsFound(paths)) => assert_eq!(paths.len(), 2),
            other => panic!("Expected PathsFound, got {other:?}"),
        }
        assert!(!slot.is_loading());
        assert!(slot.poll().is_none());
    }

    #[test]
    fn test_replaced_request_is_never_observed() {
        let (gate_tx, gate_rx) = unbounded::<()>();
        let (done_tx, done_rx) = unbounded::<String>();
        let handler: Handler = Arc::new(move |request: WorkerRequest| {
            let end = end_of(&request);
            if end == "B" {
                // The first request blocks until the test releases it.
                let _ = gate_rx.recv();
            }
            let response = handle_request(request);
            let _ = done_tx.send(end);
            response
        });
        let mut slot = WorkerSlot::with_handler("paths", handler);

        let first = slot.dispatch(find("A", "B"));
        let second = slot.dispatch(find("A", "C"));
        assert!(second > first);

        match slot.wait(WAIT) {
            Some(WorkerResponse::PathsFound(paths)) => {
                assert_eq!(paths.len(), 2);
                assert!(paths.iter().all(|p| p.nodes.last() == Some(&NodeId::new("C"))));
            }
            other => panic!("Expected the second request's result, got {other:?}"),
        }

        // Let the first request finish; its result must not surface.
        gate_tx.send(()).unwrap();
        let finished: Vec<String> = (0..2).map(|_| done_rx.recv_timeout(WAIT).unwrap()).collect();
        assert!(finished.contains(&"B".to_string()));
        assert!(slot.poll().is_none());
        assert!(slot.wait(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn test_cancel_clears_loading_state() {
        let (gate_tx, gate_rx) = unbounded::<()>();
        let handler: Handler = Arc::new(move |request: WorkerRequest| {
            let _ = gate_rx.recv();
            handle_request(request)
        });
        let mut slot = WorkerSlot::with_handler("paths", handler);
        slot.dispatch(find("A", "C"));
        slot.cancel();
        assert!(!slot.is_loading());
        gate_tx.send(()).unwrap();
        assert!(slot.wait(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn test_panicking_handler_becomes_error_response() {
        let handler: Handler = Arc::new(|_request: WorkerRequest| panic!("solver exploded"));
        let mut slot = WorkerSlot::with_handler("layout", handler);
        slot.dispatch(find("A", "C"));
        match slot.wait(WAIT) {
            Some(WorkerResponse::Error(payload)) => {
                assert_eq!(payload.request, RequestKind::FindAllPaths);
                assert!(payload.message.contains("solver exploded"));
            }
            other => panic!("Expected an error response, got {other:?}"),
        }
        assert!(!slot.is_loading());
    }
}
