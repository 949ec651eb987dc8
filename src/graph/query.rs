//! Topology query parameters and their backend URL encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the backend groups telemetry into nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphType {
	/// One node per app label.
	App,
	/// One node per service.
	Service,
	/// App nodes split by version label.
	#[default]
	VersionedApp,
	/// One node per workload.
	Workload,
}

impl GraphType {
	/// Wire name used by the graph API.
	pub fn as_str(self) -> &'static str {
		match self {
			GraphType::App => "app",
			GraphType::Service => "service",
			GraphType::VersionedApp => "versionedApp",
			GraphType::Workload => "workload",
		}
	}
}

impl fmt::Display for GraphType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Which metric, if any, labels graph edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeLabelMode {
	/// No edge labels; decoration skips label computation.
	#[serde(rename = "noEdgeLabels")]
	#[default]
	None,
	/// Requests per second (HTTP/gRPC) or bytes per second (TCP).
	TrafficRate,
	/// Share of the source's outbound requests carried by the edge.
	TrafficDistribution,
	/// 95th percentile response time.
	ResponseTime,
	/// Bytes per second of response payload.
	Throughput,
}

impl EdgeLabelMode {
	/// Wire name used by the graph API.
	pub fn as_str(self) -> &'static str {
		match self {
			EdgeLabelMode::None => "noEdgeLabels",
			EdgeLabelMode::TrafficRate => "trafficRate",
			EdgeLabelMode::TrafficDistribution => "trafficDistribution",
			EdgeLabelMode::ResponseTime => "responseTime",
			EdgeLabelMode::Throughput => "throughput",
		}
	}
}

/// A mesh namespace selected for the graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
	/// Namespace name (a DNS-1123 label).
	pub name: String,
}

impl Namespace {
	/// Shorthand constructor.
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}
}

/// Everything needed to ask the backend for one topology snapshot.
///
/// A query is treated as read-only once handed to a fetch; the data source
/// keeps its own copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphQuery {
	/// Namespaces to include. Order is preserved in the request.
	pub namespaces: Vec<Namespace>,
	/// Node grouping.
	pub graph_type: GraphType,
	/// Telemetry window in seconds.
	pub duration: u64,
	/// Point in time (unix seconds) the window ends at; 0 means now.
	pub query_time: u64,
	/// Edge labelling metric.
	pub edge_label_mode: EdgeLabelMode,
	/// Insert service nodes between workloads.
	pub inject_service_nodes: bool,
	/// Request mTLS information for edges.
	pub show_security: bool,
	/// Include nodes that received no traffic in the window.
	pub show_unused_nodes: bool,
}

impl Default for GraphQuery {
	fn default() -> Self {
		Self {
			namespaces: Vec::new(),
			graph_type: GraphType::default(),
			duration: 60,
			query_time: 0,
			edge_label_mode: EdgeLabelMode::default(),
			inject_service_nodes: true,
			show_security: false,
			show_unused_nodes: false,
		}
	}
}

impl GraphQuery {
	/// Comma-joined namespace names, as the backend expects them.
	pub fn namespace_list(&self) -> String {
		self.namespaces
			.iter()
			.map(|ns| ns.name.as_str())
			.collect::<Vec<_>>()
			.join(",")
	}

	/// Backend-side graph appenders needed to honour this query.
	pub fn appenders(&self) -> Vec<&'static str> {
		let mut appenders = vec![
			"deadNode",
			"sidecarsCheck",
			"serviceEntry",
			"istio",
			"health",
		];
		match self.edge_label_mode {
			EdgeLabelMode::ResponseTime => appenders.push("responseTime"),
			EdgeLabelMode::Throughput => appenders.push("throughput"),
			_ => {}
		}
		if self.show_security {
			appenders.push("securityPolicy");
		}
		if self.show_unused_nodes {
			appenders.push("unusedNode");
		}
		appenders
	}

	/// Query string (without leading `?`) for the graph endpoint.
	pub fn to_query_string(&self) -> String {
		let mut params = vec![
			format!("namespaces={}", self.namespace_list()),
			format!("graphType={}", self.graph_type),
			format!("duration={}s", self.duration),
			format!("edges={}", self.edge_label_mode.as_str()),
			format!("injectServiceNodes={}", self.inject_service_nodes),
			format!("appenders={}", self.appenders().join(",")),
		];
		if self.query_time > 0 {
			params.push(format!("queryTime={}", self.query_time));
		}
		params.join("&")
	}
}
