use crossbeam_channel::{Receiver, Sender, unbounded};
use procflow_core::{EdgeId, LayoutDirection, NodeId};
use procflow_graph::{Palette, Path, PathSortKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Graph interaction
    NodeClicked {
        id: NodeId,
    },
    /// Toggles the edge highlight; a second click on the same edge clears it.
    EdgeClicked {
        id: EdgeId,
    },
    CanvasClicked,
    CloseTooltip,

    // Pathfinding
    TogglePathfinding {
        enabled: bool,
    },
    /// Highlight a path from the current search results.
    SelectPath {
        index: usize,
    },
    /// Highlight a mined variant by its position in the engine output,
    /// optionally only the node index window `start..=end` of it.
    SelectVariant {
        index: usize,
        #[serde(default)]
        window: Option<(usize, usize)>,
    },
    /// Highlight an externally resolved path, e.g. a case trace.
    HighlightPath {
        path: Path,
    },
    ClearPathSelection,
    SortPaths {
        key: PathSortKey,
    },
    ShowPage {
        page: usize,
    },

    // Styling
    SetPalette(Palette),
    SetLayoutDirection(LayoutDirection),

    // ========================================================================
    // Notifications
    // ========================================================================
    LayoutStarted,
    LayoutReady {
        node_count: usize,
        edge_count: usize,
    },
    LayoutFailed {
        error: String,
    },
    PathSearchStarted {
        start: NodeId,
        end: NodeId,
    },
    PathsFound {
        count: usize,
        truncated: bool,
    },
    PathSearchFailed {
        error: String,
    },
    ShowInfo {
        message: String,
    },
    ShowError {
        message: String,
    },
}

impl Event {
    /// Events produced by the pipeline rather than by user intent.
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            Event::LayoutStarted
                | Event::LayoutReady { .. }
                | Event::LayoutFailed { .. }
                | Event::PathSearchStarted { .. }
                | Event::PathsFound { .. }
                | Event::PathSearchFailed { .. }
                | Event::ShowInfo { .. }
                | Event::ShowError { .. }
        )
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Event dropped: bus has no receivers");
        }
    }

    /// Dispatch all pending events to a listener, in publish order.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) -> usize {
        let mut dispatched = 0;
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
            dispatched += 1;
        }
        dispatched
    }
}

/// Implement this to receive events from the [`EventBus`].
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}
