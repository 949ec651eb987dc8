//! Request lifecycle for topology fetches.
//!
//! [`GraphDataSource`] turns a [`GraphQuery`] into backend calls and reports
//! the outcome through [`EventBus`] events. Each fetch takes the next sequence
//! number; when its response arrives it is only delivered if no newer fetch
//! started in the meantime, so a slow earlier request can never overwrite a
//! later query's result.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use log::{debug, info, warn};

use super::events::{EventBus, EventKind, GraphEvent, GraphSnapshot, SubscriptionId};
use super::health::{HealthKind, HealthMap, NamespaceHealth};
use super::payload::RawGraphPayload;
use super::query::{GraphQuery, GraphType};
use crate::error::FetchError;

/// Where topology and health data come from.
///
/// Futures are not required to be `Send`; everything runs on the page's
/// single thread.
pub trait GraphBackend {
	/// Fetch the topology for `query`.
	fn fetch_graph(
		&self,
		query: &GraphQuery,
	) -> impl Future<Output = Result<RawGraphPayload, FetchError>>;

	/// Fetch health of every entity of `kind` in `namespace`.
	fn fetch_health(
		&self,
		namespace: &str,
		kind: HealthKind,
		query: &GraphQuery,
	) -> impl Future<Output = Result<NamespaceHealth, FetchError>>;
}

/// Health endpoints worth querying for a graph type.
fn health_kinds(graph_type: GraphType) -> &'static [HealthKind] {
	match graph_type {
		GraphType::App | GraphType::VersionedApp => &[HealthKind::App, HealthKind::Service],
		GraphType::Workload => &[HealthKind::Workload, HealthKind::Service],
		GraphType::Service => &[HealthKind::Service],
	}
}

struct SourceState {
	last_query: Option<GraphQuery>,
}

/// Fetches topology graphs and notifies subscribers of the outcome.
///
/// Cheap to clone; clones share the backend, the subscriber list and the
/// request sequence.
pub struct GraphDataSource<B> {
	backend: Rc<B>,
	events: Rc<EventBus>,
	sequence: Rc<Cell<u64>>,
	in_flight: Rc<Cell<bool>>,
	state: Rc<RefCell<SourceState>>,
	fetch_health: bool,
}

impl<B> Clone for GraphDataSource<B> {
	fn clone(&self) -> Self {
		Self {
			backend: self.backend.clone(),
			events: self.events.clone(),
			sequence: self.sequence.clone(),
			in_flight: self.in_flight.clone(),
			state: self.state.clone(),
			fetch_health: self.fetch_health,
		}
	}
}

/// Proof that a fetch was started; compared against the current sequence on completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket(u64);

impl<B: GraphBackend + 'static> GraphDataSource<B> {
	/// New data source over `backend`, with health lookup enabled.
	pub fn new(backend: B) -> Self {
		Self {
			backend: Rc::new(backend),
			events: Rc::new(EventBus::new()),
			sequence: Rc::new(Cell::new(0)),
			in_flight: Rc::new(Cell::new(false)),
			state: Rc::new(RefCell::new(SourceState { last_query: None })),
			fetch_health: true,
		}
	}

	/// Enable or disable the health lookup that follows a successful graph fetch.
	pub fn with_health(mut self, enabled: bool) -> Self {
		self.fetch_health = enabled;
		self
	}

	/// Subscribe to an event. Handlers run in registration order.
	pub fn on(&self, kind: EventKind, handler: impl Fn(&GraphEvent) + 'static) -> SubscriptionId {
		self.events.on(kind, handler)
	}

	/// Unsubscribe.
	pub fn off(&self, id: SubscriptionId) -> bool {
		self.events.off(id)
	}

	/// The query of the most recent fetch, if any.
	pub fn last_query(&self) -> Option<GraphQuery> {
		self.state.borrow().last_query.clone()
	}

	/// True while the latest fetch has not reached a terminal event.
	pub fn is_loading(&self) -> bool {
		self.in_flight.get()
	}

	/// Start fetching `query` and return immediately.
	///
	/// Completion is observed through events. Any fetch still pending is
	/// superseded: its terminal event will not fire.
	pub fn fetch_graph_data(&self, query: GraphQuery) {
		let this = self.clone();
		leptos::task::spawn_local(async move {
			this.run_fetch(query).await;
		});
	}

	/// Run one fetch to completion on the current task.
	///
	/// Emits `FetchStart` immediately and exactly one terminal event unless a
	/// newer fetch begins before this one resolves.
	pub async fn run_fetch(&self, query: GraphQuery) {
		let ticket = self.begin(&query);
		let result = self.load(&query).await;
		self.complete(ticket, result);
	}

	/// Register a new fetch: bump the sequence, remember the query, emit `FetchStart`.
	pub fn begin(&self, query: &GraphQuery) -> FetchTicket {
		let seq = self.sequence.get() + 1;
		self.sequence.set(seq);
		self.in_flight.set(true);
		self.state.borrow_mut().last_query = Some(query.clone());
		info!(
			"mesh-graph: fetch #{seq} for [{}] ({}, {}s)",
			query.namespace_list(),
			query.graph_type,
			query.duration
		);
		self.events.emit(&GraphEvent::FetchStart);
		FetchTicket(seq)
	}

	/// True when `ticket` belongs to the most recent fetch.
	pub fn is_current(&self, ticket: FetchTicket) -> bool {
		ticket.0 == self.sequence.get()
	}

	/// Deliver the outcome of the fetch identified by `ticket`, unless it was superseded.
	pub fn complete(&self, ticket: FetchTicket, result: Result<GraphSnapshot, FetchError>) {
		if !self.is_current(ticket) {
			debug!(
				"mesh-graph: dropping stale response #{} (current #{})",
				ticket.0,
				self.sequence.get()
			);
			return;
		}
		self.in_flight.set(false);

		let event = match result {
			Ok(snapshot) if snapshot.payload.is_empty() => {
				info!("mesh-graph: fetch #{} returned an empty graph", ticket.0);
				GraphEvent::EmptyGraph
			}
			Ok(snapshot) => {
				info!(
					"mesh-graph: fetch #{} loaded {} nodes, {} edges",
					ticket.0,
					snapshot.payload.elements.nodes.len(),
					snapshot.payload.elements.edges.len()
				);
				GraphEvent::FetchSuccess(Rc::new(snapshot))
			}
			Err(err) => {
				warn!("mesh-graph: fetch #{} failed: {}", ticket.0, err);
				GraphEvent::FetchError(err)
			}
		};
		self.events.emit(&event);
	}

	async fn load(&self, query: &GraphQuery) -> Result<GraphSnapshot, FetchError> {
		let payload = self.backend.fetch_graph(query).await?;
		let mut health = HealthMap::new();

		if self.fetch_health && !payload.is_empty() {
			for ns in &query.namespaces {
				for &kind in health_kinds(query.graph_type) {
					match self.backend.fetch_health(&ns.name, kind, query).await {
						Ok(entities) => health.resolve(&payload, &ns.name, kind, &entities),
						Err(err) => warn!(
							"mesh-graph: {} health for {} unavailable: {}",
							kind.as_str(),
							ns.name,
							err
						),
					}
				}
			}
		}

		Ok(GraphSnapshot {
			query: query.clone(),
			payload,
			health,
		})
	}
}
