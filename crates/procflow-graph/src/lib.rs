pub mod augment;
pub mod builder;
pub mod ghost;
pub mod layout;
pub mod model;
pub mod path;
pub mod pathfinding;
pub mod style;
pub mod variants;

pub use augment::{AugmentReport, StructuralAugmenter};
pub use builder::{GraphBuilder, WeightRange, restyle_edges};
pub use ghost::inject_ghosts;
pub use layout::{
    EdgeRouting, LayeredLayouter, LayoutEdge, LayoutError, LayoutInput, LayoutNode, LayoutOptions,
    LayoutResult, Layouter,
};
pub use model::{GraphData, GraphEdge, GraphNode, TopologyKey, Vec2};
pub use path::{Path, PathKind, PathMetrics, PathProvenance, PathSortKey, sort_paths};
pub use pathfinding::{
    EdgeRef, MAX_PATH_LENGTH, MAX_PATHS_TO_FIND, PathFinder, PathSearch, SearchStats,
};
pub use style::{Color, ColorPalette, EdgeStyle, Palette};
pub use variants::{case_trace_to_path, variant_to_path, variants_to_paths};
