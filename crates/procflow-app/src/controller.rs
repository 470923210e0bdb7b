use crate::engine::{MiningEngine, ProcessEngine};
use crate::error::AppError;
use crate::interaction::{Effect, Intent, InteractionState};
use crate::protocol::{
    FindPathsPayload, InitialDataPayload, LayoutPayload, RequestKind, WorkerRequest,
    WorkerResponse,
};
use crate::settings::AppSettings;
use crate::workers::WorkerSlot;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use procflow_core::{EdgeId, EngineOutput, FileFormat, FilterConfig, Histogram, NodeId};
use procflow_events::{Event, EventListener};
use procflow_graph::{
    EdgeRef, GraphData, LayoutOptions, Path, PathSearch, StructuralAugmenter, TopologyKey,
    case_trace_to_path, inject_ghosts, restyle_edges, variants_to_paths,
};
use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(2);

struct Dataset {
    source: Option<(PathBuf, FileFormat)>,
    output: EngineOutput,
}

struct SessionState {
    settings: AppSettings,
    dataset: Option<Dataset>,
    /// Builder plus augmenter output for the active filter; never styled by
    /// selection.
    all: GraphData,
    interaction: InteractionState,
    /// Topology and options of the graph currently on screen.
    laid_out: Option<(TopologyKey, LayoutOptions)>,
    pending_layout: Option<(TopologyKey, LayoutOptions)>,
    data_worker: WorkerSlot,
    layout_worker: WorkerSlot,
    paths_worker: WorkerSlot,
}

impl SessionState {
    fn is_busy(&self) -> bool {
        self.data_worker.is_loading() || self.layout_worker.is_loading() || self.paths_worker.is_loading()
    }

    fn augmenter(&self) -> StructuralAugmenter {
        match &self.dataset {
            Some(dataset) => StructuralAugmenter::new(
                &dataset.output.start_activities,
                &dataset.output.end_activities,
            ),
            None => StructuralAugmenter::new(&[], &[]),
        }
    }
}

/// Headless pipeline driver: engine output in, laid-out interactive graph out.
///
/// Shells feed it [`Event`]s and call [`AppController::pump`] from their
/// frame loop; notifications come back on [`AppController::events`].
#[derive(Clone)]
pub struct AppController {
    engine: Arc<dyn MiningEngine>,
    state: Arc<Mutex<SessionState>>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
}

impl AppController {
    pub fn new(settings: AppSettings, engine: Arc<dyn MiningEngine>) -> Self {
        let settings = settings.sanitized();
        let (events_tx, events_rx) = unbounded();
        let interaction = InteractionState::new(settings.page_size, settings.palette);
        Self {
            engine,
            state: Arc::new(Mutex::new(SessionState {
                settings,
                dataset: None,
                all: GraphData::default(),
                interaction,
                laid_out: None,
                pending_layout: None,
                data_worker: WorkerSlot::new("data"),
                layout_worker: WorkerSlot::new("layout"),
                paths_worker: WorkerSlot::new("paths"),
            })),
            events_tx,
            events_rx,
        }
    }

    /// Controller backed by the configured external engine program.
    pub fn with_process_engine(settings: AppSettings) -> Self {
        let engine = Arc::new(ProcessEngine::new(settings.engine.clone()));
        Self::new(settings, engine)
    }

    pub fn events(&self) -> Receiver<Event> {
        self.events_rx.clone()
    }

    pub fn settings(&self) -> AppSettings {
        self.state.lock().settings.clone()
    }

    /// Render graph as currently shown, selection styling included.
    pub fn graph(&self) -> GraphData {
        self.state.lock().interaction.graph()
    }

    /// Unstyled augmented graph for the active filter.
    pub fn base_graph(&self) -> GraphData {
        self.state.lock().all.clone()
    }

    pub fn with_interaction<R>(&self, f: impl FnOnce(&InteractionState) -> R) -> R {
        f(&self.state.lock().interaction)
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().is_busy()
    }

    fn publish(&self, event: Event) {
        if self.events_tx.send(event).is_err() {
            tracing::debug!("Notification dropped: no subscribers");
        }
    }

    /// Mine `input` under `filter` and start the graph pipeline.
    pub fn load(&self, input: &FsPath, filter: &FilterConfig) -> Result<(), AppError> {
        filter.validate()?;
        let format = FileFormat::from_path(input)?;
        if !input.exists() {
            return Err(AppError::MissingFile(input.to_path_buf()));
        }
        let output = self.engine.process(input, format, filter)?;
        self.install(Some((input.to_path_buf(), format)), output);
        Ok(())
    }

    /// Start the graph pipeline from an engine document obtained elsewhere.
    pub fn load_output(&self, output: EngineOutput) {
        self.install(None, output);
    }

    fn install(&self, source: Option<(PathBuf, FileFormat)>, output: EngineOutput) {
        let mut state = self.state.lock();
        let request = WorkerRequest::ProcessInitialData(InitialDataPayload {
            graph_data: output.graph_data.clone(),
            start_activities: output.start_activities.clone(),
            end_activities: output.end_activities.clone(),
            palette: state.settings.palette,
        });
        tracing::info!(
            "Loaded engine output: {} edge records, {} variants, {} outliers",
            output.graph_data.len(),
            output.variants.len(),
            output.outliers.len()
        );
        state.dataset = Some(Dataset { source, output });
        state.paths_worker.cancel();
        state.layout_worker.cancel();
        state.pending_layout = None;
        state.data_worker.dispatch(request);
    }

    /// Apply every worker response that has arrived. Returns how many were handled.
    pub fn pump(&self) -> usize {
        let mut state = self.state.lock();
        let mut handled = 0;
        if let Some(response) = state.data_worker.poll() {
            self.on_response(&mut state, response);
            handled += 1;
        }
        if let Some(response) = state.layout_worker.poll() {
            self.on_response(&mut state, response);
            handled += 1;
        }
        if let Some(response) = state.paths_worker.poll() {
            self.on_response(&mut state, response);
            handled += 1;
        }
        handled
    }

    /// Pump until no worker is busy. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        loop {
            self.pump();
            if !self.is_busy() {
                return true;
            }
            if started.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(IDLE_POLL_INTERVAL);
        }
    }

    fn on_response(&self, state: &mut SessionState, response: WorkerResponse) {
        match response {
            WorkerResponse::InitialDataProcessed(payload) => {
                state.all = GraphData::new(payload.all_nodes, payload.all_edges);
                state.laid_out = None;
                let view = state.all.clone();
                self.publish(Event::ShowInfo {
                    message: format!(
                        "Loaded graph with {} nodes and {} edges",
                        view.nodes.len(),
                        view.edges.len()
                    ),
                });
                state.interaction.reset_graph(view.clone());
                self.request_layout(state, view);
            }
            WorkerResponse::LayoutCalculated(payload) => {
                let mut placed = GraphData::new(payload.nodes, payload.edges);
                placed.edges = restyle_edges(&placed.edges, &state.interaction.palette());
                state.laid_out = state.pending_layout.take();
                let (node_count, edge_count) = (placed.nodes.len(), placed.edges.len());
                state.interaction.replace_graph(placed);
                self.publish(Event::LayoutReady {
                    node_count,
                    edge_count,
                });
            }
            WorkerResponse::PathsFound(paths) => {
                let count = paths.len();
                let truncated = count >= state.settings.pathfinding.max_paths;
                tracing::info!("Path search finished with {} paths", count);
                state.interaction.apply(Intent::PathsArrived(paths));
                self.publish(Event::PathsFound { count, truncated });
            }
            WorkerResponse::Error(payload) => match payload.request {
                RequestKind::ProcessInitialData => {
                    let message = AppError::Worker(payload.message).user_message();
                    self.publish(Event::ShowError { message });
                }
                RequestKind::CalculateLayout => {
                    state.pending_layout = None;
                    let error = AppError::Layout(payload.message).user_message();
                    self.publish(Event::LayoutFailed { error });
                }
                RequestKind::FindAllPaths => {
                    let message = AppError::Worker(payload.message).user_message();
                    state
                        .interaction
                        .apply(Intent::PathSearchFailed(message.clone()));
                    self.publish(Event::PathSearchFailed { error: message });
                }
            },
        }
    }

    fn request_layout(&self, state: &mut SessionState, view: GraphData) {
        let options = state.settings.layout.clone();
        state.pending_layout = Some((view.topology_key(), options.clone()));
        state
            .layout_worker
            .dispatch(WorkerRequest::CalculateLayout(LayoutPayload {
                nodes: view.nodes,
                edges: view.edges,
                options,
            }));
        self.publish(Event::LayoutStarted);
    }

    /// Recompute the displayed graph after the selected path changed.
    ///
    /// Only a topology or option change goes through the solver; otherwise
    /// the current geometry is carried over.
    fn rebuild_view(&self, state: &mut SessionState) {
        if state.data_worker.is_loading() || state.all.is_empty() {
            return;
        }
        let view = match state.interaction.selected_path() {
            Some(path) => state.augmenter().augment(&inject_ghosts(&state.all, path)).0,
            None => state.all.clone(),
        };
        let target = (view.topology_key(), state.settings.layout.clone());
        if state.pending_layout.as_ref() == Some(&target) {
            return;
        }
        if state.laid_out.as_ref() == Some(&target) {
            state.layout_worker.cancel();
            state.pending_layout = None;
            let placed = carry_geometry(view, &state.interaction.graph());
            state.interaction.replace_graph(placed);
        } else {
            self.request_layout(state, view);
        }
    }

    fn dispatch_event(&self, event: &Event) {
        let mut state = self.state.lock();
        let intent = match event {
            Event::NodeClicked { id } => Intent::ClickNode(id.clone()),
            Event::EdgeClicked { id } => Intent::ClickEdge(id.clone()),
            Event::CanvasClicked => Intent::ClickCanvas,
            Event::CloseTooltip => Intent::CloseTooltip,
            Event::TogglePathfinding { enabled } => Intent::SetPathfinding(*enabled),
            Event::SelectPath { index } => Intent::SelectPath(*index),
            Event::SelectVariant { index, window } => {
                let variant = state
                    .dataset
                    .as_ref()
                    .and_then(|d| variants_to_paths(&d.output.variants).into_iter().nth(*index));
                let path = match (variant, window) {
                    (Some(path), Some((start, end))) => path.window(*start, *end),
                    (variant, None) => variant,
                    (None, Some(_)) => None,
                };
                match path {
                    Some(path) => Intent::HighlightPath(path),
                    None => {
                        tracing::debug!("Ignoring selection of variant {} window {:?}", index, window);
                        return;
                    }
                }
            }
            Event::HighlightPath { path } => Intent::HighlightPath(path.clone()),
            Event::ClearPathSelection => Intent::ClearPathSelection,
            Event::SortPaths { key } => Intent::SortPaths(*key),
            Event::ShowPage { page } => Intent::ShowPage(*page),
            Event::SetPalette(palette) => {
                state.settings.palette = *palette;
                state.all.edges = restyle_edges(&state.all.edges, palette);
                Intent::SetPalette(*palette)
            }
            Event::SetLayoutDirection(direction) => {
                state.settings.layout.direction = *direction;
                self.rebuild_view(&mut state);
                return;
            }
            _ => return,
        };

        for effect in state.interaction.apply(intent) {
            match effect {
                Effect::FindPaths { start, end } => {
                    let request = WorkerRequest::FindAllPaths(FindPathsPayload {
                        all_edges: state.all.edges.iter().map(EdgeRef::from).collect(),
                        start_node_id: start.clone(),
                        end_node_id: end.clone(),
                        limits: state.settings.pathfinding,
                    });
                    state.paths_worker.dispatch(request);
                    self.publish(Event::PathSearchStarted { start, end });
                }
                Effect::CancelPathSearch => state.paths_worker.cancel(),
                Effect::SelectionChanged => self.rebuild_view(&mut state),
            }
        }
    }

    /// Blocking path search over the current augmented graph.
    pub fn search(&self, start: &NodeId, end: &NodeId) -> Result<PathSearch, AppError> {
        let (edges, finder) = {
            let state = self.state.lock();
            if state.all.is_empty() {
                return Err(AppError::NoData);
            }
            for id in [start, end] {
                if state.all.node(id).is_none() {
                    return Err(AppError::UnknownNode(id.to_string()));
                }
            }
            let edges: Vec<EdgeRef> = state.all.edges.iter().map(EdgeRef::from).collect();
            (edges, state.settings.pathfinding)
        };
        Ok(finder.find_all_paths(&edges, start, end))
    }

    pub fn variants(&self) -> Vec<Path> {
        let state = self.state.lock();
        state
            .dataset
            .as_ref()
            .map(|d| variants_to_paths(&d.output.variants))
            .unwrap_or_default()
    }

    pub fn outliers(&self) -> Vec<Path> {
        let state = self.state.lock();
        state
            .dataset
            .as_ref()
            .map(|d| variants_to_paths(&d.output.outliers))
            .unwrap_or_default()
    }

    fn source(&self) -> Result<(PathBuf, FileFormat), AppError> {
        self.state
            .lock()
            .dataset
            .as_ref()
            .and_then(|d| d.source.clone())
            .ok_or(AppError::NoData)
    }

    /// Resolve one case of the loaded log to a highlightable path.
    pub fn case_trace(&self, case_id: &str) -> Result<Path, AppError> {
        let (input, format) = self.source()?;
        let trace = self.engine.case_trace(&input, format, case_id)?;
        Ok(case_trace_to_path(&trace))
    }

    /// Duration distribution for `edge`, or for the whole log.
    pub fn histogram(&self, edge: Option<&EdgeId>) -> Result<Histogram, AppError> {
        let (input, format) = self.source()?;
        let endpoints = match edge {
            Some(id) => {
                let state = self.state.lock();
                let edge = state
                    .all
                    .edge(id)
                    .ok_or_else(|| AppError::UnknownNode(id.to_string()))?;
                Some((edge.source.clone(), edge.target.clone()))
            }
            None => None,
        };
        let histogram = self.engine.histogram(
            &input,
            format,
            endpoints.as_ref().map(|(s, t)| (s.as_str(), t.as_str())),
        )?;
        Ok(histogram)
    }
}

impl EventListener for AppController {
    fn handle_event(&mut self, event: &Event) {
        self.dispatch_event(event);
    }
}

/// `view` with positions and routes copied from `current` by id.
fn carry_geometry(mut view: GraphData, current: &GraphData) -> GraphData {
    let positions: HashMap<&NodeId, _> = current.nodes.iter().map(|n| (&n.id, n.position)).collect();
    let routes: HashMap<&EdgeId, _> = current.edges.iter().map(|e| (&e.id, &e.route)).collect();
    for node in &mut view.nodes {
        if let Some(position) = positions.get(&node.id) {
            node.position = *position;
        }
    }
    for edge in &mut view.edges {
        if let Some(route) = routes.get(&edge.id) {
            edge.route = (*route).clone();
        }
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use procflow_core::{CaseTrace, EdgeRecord, LayoutDirection};
    use procflow_graph::Palette;

    struct NoEngine;

    impl MiningEngine for NoEngine {
        fn process(
            &self,
            input: &FsPath,
            _format: FileFormat,
            _filter: &FilterConfig,
        ) -> Result<EngineOutput, EngineError> {
            Err(EngineError::MissingInput(input.to_path_buf()))
        }

        fn case_trace(
            &self,
            input: &FsPath,
            _format: FileFormat,
            _case_id: &str,
        ) -> Result<CaseTrace, EngineError> {
            Err(EngineError::MissingInput(input.to_path_buf()))
        }

        fn histogram(
            &self,
            input: &FsPath,
            _format: FileFormat,
            _edge: Option<(&str, &str)>,
        ) -> Result<Histogram, EngineError> {
            Err(EngineError::MissingInput(input.to_path_buf()))
        }
    }

    const WAIT: Duration = Duration::from_secs(10);

    fn loaded() -> AppController {
        let controller = AppController::new(AppSettings::default(), Arc::new(NoEngine));
        controller.load_output(EngineOutput {
            graph_data: vec![
                EdgeRecord::new("A", "B", 5.0),
                EdgeRecord::new("B", "C", 3.0),
                EdgeRecord::new("A", "C", 1.0),
                EdgeRecord::new("C", "D", 8.0),
            ],
            start_activities: vec!["A".to_string()],
            end_activities: vec!["D".to_string()],
            ..Default::default()
        });
        assert!(controller.wait_idle(WAIT));
        controller
    }

    #[test]
    fn test_load_output_lays_out_augmented_graph() {
        let controller = loaded();
        let graph = controller.graph();
        assert_eq!(graph.nodes.len(), 6);
        let start = graph.node(&NodeId::start()).unwrap();
        let a = graph.node(&NodeId::new("A")).unwrap();
        let end = graph.node(&NodeId::end()).unwrap();
        assert!(start.position.x < a.position.x);
        assert!(a.position.x < end.position.x);

        let events: Vec<Event> = controller.events().try_iter().collect();
        assert!(events.contains(&Event::LayoutStarted));
        assert!(events.iter().any(|e| matches!(e, Event::LayoutReady { node_count: 6, .. })));
    }

    #[test]
    fn test_palette_change_does_not_relayout() {
        let mut controller = loaded();
        let before = controller.graph();
        let events = controller.events();
        while events.try_recv().is_ok() {}

        controller.handle_event(&Event::SetPalette(Palette::Heat));
        assert!(!controller.is_busy());
        assert!(events.try_iter().all(|e| e != Event::LayoutStarted));

        let after = controller.graph();
        assert_eq!(before.topology_key(), after.topology_key());
        let a = NodeId::new("A");
        assert_eq!(before.node(&a).unwrap().position, after.node(&a).unwrap().position);
        assert_eq!(controller.settings().palette, Palette::Heat);
    }

    #[test]
    fn test_direction_change_relayouts() {
        let mut controller = loaded();
        controller.handle_event(&Event::SetLayoutDirection(LayoutDirection::Vertical));
        assert!(controller.wait_idle(WAIT));
        let graph = controller.graph();
        let start = graph.node(&NodeId::start()).unwrap();
        let end = graph.node(&NodeId::end()).unwrap();
        assert!(start.position.y < end.position.y);
    }

    #[test]
    fn test_zero_limits_fall_back_to_defaults() {
        let mut settings = AppSettings::default();
        settings.page_size = 0;
        settings.pathfinding.max_paths = 0;
        let controller = AppController::new(settings, Arc::new(NoEngine));

        let settings = controller.settings();
        assert_eq!(settings.page_size, crate::settings::DEFAULT_PAGE_SIZE);
        assert!(settings.pathfinding.max_paths > 0);
    }

    #[test]
    fn test_layout_failure_reports_layout_unavailable() {
        let mut controller = loaded();
        let events = controller.events();
        while events.try_recv().is_ok() {}
        controller.state.lock().layout_worker = WorkerSlot::with_handler(
            "layout",
            Arc::new(|_| WorkerResponse::error(RequestKind::CalculateLayout, "duplicate node: A")),
        );

        controller.handle_event(&Event::SetLayoutDirection(LayoutDirection::Vertical));
        assert!(controller.wait_idle(WAIT));

        let events: Vec<Event> = events.try_iter().collect();
        assert!(events.contains(&Event::LayoutFailed {
            error: "Layout unavailable.".to_string(),
        }));
        assert!(!events.iter().any(|e| matches!(e, Event::ShowError { .. })));
        assert_eq!(controller.graph().nodes.len(), 6);
    }

    #[test]
    fn test_search_validates_endpoints() {
        let controller = loaded();
        let search = controller.search(&NodeId::new("A"), &NodeId::new("D")).unwrap();
        assert_eq!(search.paths.len(), 2);
        assert!(matches!(
            controller.search(&NodeId::new("A"), &NodeId::new("Nope")),
            Err(AppError::UnknownNode(_))
        ));

        let empty = AppController::new(AppSettings::default(), Arc::new(NoEngine));
        assert!(matches!(
            empty.search(&NodeId::new("A"), &NodeId::new("D")),
            Err(AppError::NoData)
        ));
    }

    #[test]
    fn test_case_trace_needs_a_source_file() {
        let controller = loaded();
        assert!(matches!(controller.case_trace("42"), Err(AppError::NoData)));
    }
}
