//! Service-mesh topology canvas.
//!
//! Renders a [`DisplayGraphModel`](crate::graph::DisplayGraphModel) on an HTML
//! canvas with:
//! - force-directed layout that keeps node positions across refreshes
//! - health-colored nodes and edges, type badges and metric labels
//! - pan, zoom, node dragging and hover highlighting
//!
//! # Example
//!
//! ```ignore
//! use mesh_graph::components::topology::TopologyCanvas;
//!
//! let model = RwSignal::new(DisplayGraphModel::default());
//! view! { <TopologyCanvas model=model fullscreen=true /> }
//! ```

mod component;
mod render;
pub mod scale;
mod state;
pub mod theme;

pub use component::TopologyCanvas;
pub use theme::Theme;
