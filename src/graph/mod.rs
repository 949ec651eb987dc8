//! Topology data: querying, fetching, health and decoration.
//!
//! The pipeline runs in three steps:
//! - [`GraphDataSource`] issues a [`GraphQuery`] against a [`GraphBackend`]
//!   and emits `FetchStart`, then one of `FetchSuccess`, `FetchError` or
//!   `EmptyGraph`.
//! - The success event carries the [`RawGraphPayload`] and a [`HealthMap`].
//! - [`decorate`] turns both into a [`DisplayGraphModel`] for rendering.
//!
//! # Example
//!
//! ```ignore
//! use mesh_graph::graph::*;
//!
//! let source = GraphDataSource::new(HttpBackend::new("/api"));
//! source.on(EventKind::FetchSuccess, |event| {
//!     if let GraphEvent::FetchSuccess(snap) = event {
//!         let model = decorate(&snap.payload, &snap.health, &(&snap.query).into());
//!         // hand `model` to the canvas
//!     }
//! });
//! source.fetch_graph_data(GraphQuery {
//!     namespaces: vec![Namespace::new("bookinfo")],
//!     ..GraphQuery::default()
//! });
//! ```

mod backend;
mod decorate;
mod events;
mod health;
mod payload;
mod query;
mod source;

pub use backend::{AnyBackend, HttpBackend, SnapshotBackend, SnapshotDocument, SnapshotHealth};
pub use decorate::{BadgeKind, DecorateOptions, DisplayEdge, DisplayGraphModel, DisplayNode, decorate};
pub use events::{EventBus, EventKind, GraphEvent, GraphSnapshot, SubscriptionId};
pub use health::{
	EntityHealth, HealthKind, HealthMap, HealthStatus, NamespaceHealth, RateTolerance,
	RequestHealth, WorkloadStatus,
};
pub use payload::{
	BoxKind, EdgeTraffic, Element, Elements, NodeTraffic, NodeType, RawEdge, RawGraphPayload,
	RawNode, ServiceEntryInfo,
};
pub use query::{EdgeLabelMode, GraphQuery, GraphType, Namespace};
pub use source::{FetchTicket, GraphBackend, GraphDataSource};
