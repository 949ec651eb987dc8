//! mesh-graph: service-mesh topology viewer.
//!
//! Fetches topology for a set of namespaces, decorates it with health,
//! labels and badges, and renders it as an interactive force-directed graph.

use std::cell::Cell;
use std::time::Duration;

use leptos::prelude::*;
use leptos_meta::*;
use log::{Level, debug, info, warn};

pub mod components;
pub mod config;
mod dom;
pub mod error;
pub mod graph;

pub use components::topology::{Theme, TopologyCanvas};
use config::{AppConfig, SourceKind, load_app_config};
use error::FetchError;
use graph::{
	AnyBackend, DecorateOptions, DisplayGraphModel, EventKind, GraphDataSource, GraphEvent,
	HttpBackend, SnapshotBackend, decorate,
};

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("mesh-graph: logging initialized");
}

/// What the overlay reports about the latest fetch.
#[derive(Clone, Debug, PartialEq)]
enum LoadStatus {
	Idle,
	Loading,
	Loaded { nodes: usize, edges: usize },
	Empty,
	Failed(String),
}

impl LoadStatus {
	fn describe(&self) -> String {
		match self {
			LoadStatus::Idle => String::new(),
			LoadStatus::Loading => "Loading...".into(),
			LoadStatus::Loaded { nodes, edges } => format!("{nodes} nodes, {edges} edges"),
			LoadStatus::Empty => "No traffic in the selected namespaces".into(),
			LoadStatus::Failed(reason) => format!("Fetch failed: {reason}"),
		}
	}
}

/// Timer ticks a pending fetch may hold off before the next tick supersedes it.
const MAX_SKIPPED_TICKS: u32 = 2;

/// Decides whether a refresh tick starts a fetch.
///
/// Ticks are skipped while a fetch is pending, but only a few in a row, so a
/// request that never settles cannot stall refreshing.
#[derive(Debug, Default)]
struct RefreshGate {
	skipped: Cell<u32>,
}

impl RefreshGate {
	fn admit(&self, loading: bool) -> bool {
		if loading && self.skipped.get() < MAX_SKIPPED_TICKS {
			self.skipped.set(self.skipped.get() + 1);
			return false;
		}
		self.skipped.set(0);
		true
	}
}

/// Backend named by the config. A missing or broken snapshot falls back to HTTP.
fn select_backend(config: &AppConfig) -> AnyBackend {
	let http = || AnyBackend::Http(HttpBackend::new(config.api_base.clone()));
	if config.source == SourceKind::Http {
		return http();
	}

	let snapshot = dom::script_text(&config.snapshot_element)
		.ok_or_else(|| FetchError::Unavailable(format!("no #{} element", config.snapshot_element)))
		.and_then(|json| SnapshotBackend::from_json(&json));
	match snapshot {
		Ok(backend) => {
			info!("mesh-graph: using snapshot from #{}", config.snapshot_element);
			AnyBackend::Snapshot(backend)
		}
		Err(e) => {
			warn!("mesh-graph: snapshot unusable ({}), falling back to {}", e, config.api_base);
			http()
		}
	}
}

/// Subscribe handlers that keep `model` and `status` in step with fetches.
fn bind_signals(
	source: &GraphDataSource<AnyBackend>,
	model: RwSignal<DisplayGraphModel>,
	status: RwSignal<LoadStatus>,
) {
	source.on(EventKind::FetchStart, move |_| status.set(LoadStatus::Loading));

	source.on(EventKind::FetchSuccess, move |event| {
		let GraphEvent::FetchSuccess(snapshot) = event else {
			return;
		};
		let decorated = decorate(
			&snapshot.payload,
			&snapshot.health,
			&DecorateOptions::from(&snapshot.query),
		);
		if decorated.dropped_edges > 0 {
			debug!(
				"mesh-graph: dropped {} edges with unknown endpoints",
				decorated.dropped_edges
			);
		}
		status.set(LoadStatus::Loaded {
			nodes: decorated.nodes.len(),
			edges: decorated.edges.len(),
		});
		model.set(decorated);
	});

	source.on(EventKind::EmptyGraph, move |_| {
		status.set(LoadStatus::Empty);
		model.set(DisplayGraphModel::default());
	});

	// The last good model stays on screen.
	source.on(EventKind::FetchError, move |event| {
		if let GraphEvent::FetchError(e) = event {
			status.set(LoadStatus::Failed(e.to_string()));
		}
	});
}

/// Main application component.
///
/// Reads the config, starts the first fetch and re-issues the last query on
/// the refresh interval.
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();

	let config = load_app_config();
	let theme = Theme::by_name(&config.theme).unwrap_or_else(|| {
		warn!("mesh-graph: unknown theme `{}`, using default", config.theme);
		Theme::default()
	});

	let model = RwSignal::new(DisplayGraphModel::default());
	let status = RwSignal::new(LoadStatus::Idle);
	let source = GraphDataSource::new(select_backend(&config)).with_health(config.fetch_health);
	bind_signals(&source, model, status);

	source.fetch_graph_data(config.query.clone());

	let refetch = {
		let source = source.clone();
		let initial = config.query.clone();
		move || source.fetch_graph_data(source.last_query().unwrap_or_else(|| initial.clone()))
	};

	if config.refresh_interval > 0 {
		let gate = RefreshGate::default();
		let source = source.clone();
		let refetch = refetch.clone();
		let tick = move || {
			if gate.admit(source.is_loading()) {
				refetch();
			} else {
				debug!("mesh-graph: refresh skipped, fetch in flight");
			}
		};
		match set_interval_with_handle(tick, Duration::from_secs(config.refresh_interval)) {
			Ok(handle) => on_cleanup(move || handle.clear()),
			Err(e) => warn!("mesh-graph: cannot schedule refresh: {:?}", e),
		}
	}

	let namespaces = config.query.namespace_list();
	let graph_type = config.query.graph_type;

	view! {
		<Html attr:lang="en" attr:dir="ltr" attr:data-theme="dark" />
		<Title text="Mesh Topology" />
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<div class="fullscreen-graph">
			<TopologyCanvas model=model fullscreen=true theme=theme />
			<div class="graph-overlay">
				<h1>"Mesh Topology"</h1>
				<p class="subtitle">{format!("{namespaces} \u{00b7} {graph_type} graph")}</p>
				<p class="status">{move || status.get().describe()}</p>
				<button class="refresh" on:click=move |_| refetch()>"Refresh"</button>
			</div>
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_lines() {
		assert_eq!(LoadStatus::Idle.describe(), "");
		assert_eq!(LoadStatus::Loaded { nodes: 3, edges: 2 }.describe(), "3 nodes, 2 edges");
		assert_eq!(
			LoadStatus::Failed("backend returned HTTP 503 for /x".into()).describe(),
			"Fetch failed: backend returned HTTP 503 for /x"
		);
	}

	#[test]
	fn refresh_gate_skips_a_bounded_number_of_ticks() {
		let gate = RefreshGate::default();
		assert!(gate.admit(false));
		assert!(!gate.admit(true));
		assert!(!gate.admit(true));
		// a fetch that is still pending now gets superseded
		assert!(gate.admit(true));
		assert!(!gate.admit(true));
		assert!(gate.admit(false));
		assert!(!gate.admit(true));
	}

	#[test]
	fn http_source_needs_no_dom() {
		let backend = select_backend(&AppConfig::default());
		assert!(matches!(backend, AnyBackend::Http(ref b) if b.graph_url(&Default::default()).starts_with("/api/")));
	}
}
