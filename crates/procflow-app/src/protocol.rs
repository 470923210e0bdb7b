//! Message types exchanged with background workers.
//!
//! Every request gets exactly one response. Failures inside a handler come
//! back as [`WorkerResponse::Error`] rather than crossing the boundary.

use procflow_core::{EdgeRecord, NodeId};
use procflow_graph::{
    EdgeRef, GraphBuilder, GraphData, GraphEdge, GraphNode, LayeredLayouter, LayoutInput,
    LayoutOptions, Layouter, Palette, Path, PathFinder, StructuralAugmenter,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialDataPayload {
    pub graph_data: Vec<EdgeRecord>,
    #[serde(default)]
    pub start_activities: Vec<String>,
    #[serde(default)]
    pub end_activities: Vec<String>,
    #[serde(default)]
    pub palette: Palette,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPayload {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub options: LayoutOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindPathsPayload {
    pub all_edges: Vec<EdgeRef>,
    pub start_node_id: NodeId,
    pub end_node_id: NodeId,
    #[serde(default)]
    pub limits: PathFinder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialDataProcessedPayload {
    pub all_nodes: Vec<GraphNode>,
    pub all_edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutCalculatedPayload {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    ProcessInitialData,
    CalculateLayout,
    FindAllPaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub request: RequestKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    ProcessInitialData(InitialDataPayload),
    CalculateLayout(LayoutPayload),
    FindAllPaths(FindPathsPayload),
}

impl WorkerRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            WorkerRequest::ProcessInitialData(_) => RequestKind::ProcessInitialData,
            WorkerRequest::CalculateLayout(_) => RequestKind::CalculateLayout,
            WorkerRequest::FindAllPaths(_) => RequestKind::FindAllPaths,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerResponse {
    InitialDataProcessed(InitialDataProcessedPayload),
    LayoutCalculated(LayoutCalculatedPayload),
    PathsFound(Vec<Path>),
    Error(ErrorPayload),
}

impl WorkerResponse {
    pub fn error(request: RequestKind, message: impl Into<String>) -> Self {
        WorkerResponse::Error(ErrorPayload {
            request,
            message: message.into(),
        })
    }
}

/// Runs one request to completion on the calling thread.
pub fn handle_request(request: WorkerRequest) -> WorkerResponse {
    match request {
        WorkerRequest::ProcessInitialData(payload) => {
            let graph = GraphBuilder::new(&payload.palette).build(&payload.graph_data);
            let augmenter =
                StructuralAugmenter::new(&payload.start_activities, &payload.end_activities);
            let (graph, report) = augmenter.augment(&graph);
            tracing::info!(
                "Processed {} edge records into {} nodes and {} edges ({} structural starts, {} structural ends)",
                payload.graph_data.len(),
                graph.nodes.len(),
                graph.edges.len(),
                report.structural_starts.len(),
                report.structural_ends.len()
            );
            WorkerResponse::InitialDataProcessed(InitialDataProcessedPayload {
                all_nodes: graph.nodes,
                all_edges: graph.edges,
            })
        }
        WorkerRequest::CalculateLayout(payload) => {
            let graph = GraphData::new(payload.nodes, payload.edges);
            let layouter = LayeredLayouter::new(payload.options);
            match layouter.execute(&LayoutInput::from_graph(&graph)) {
                Ok(result) => {
                    let placed = result.apply_to(&graph);
                    WorkerResponse::LayoutCalculated(LayoutCalculatedPayload {
                        nodes: placed.nodes,
                        edges: placed.edges,
                    })
                }
                Err(e) => {
                    tracing::error!("Layout failed: {}", e);
                    WorkerResponse::error(RequestKind::CalculateLayout, e.to_string())
                }
            }
        }
        WorkerRequest::FindAllPaths(payload) => {
            let search = payload.limits.find_all_paths(
                &payload.all_edges,
                &payload.start_node_id,
                &payload.end_node_id,
            );
            if search.stats.truncated {
                tracing::info!(
                    "Path search {} -> {} stopped at the {} path limit",
                    payload.start_node_id,
                    payload.end_node_id,
                    payload.limits.max_paths
                );
            }
            WorkerResponse::PathsFound(search.paths)
        }
    }
}
