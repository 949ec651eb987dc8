//! Decoration: raw backend graph -> display model.
//!
//! Pure and total: any well-typed payload decorates without panicking. Nodes
//! map 1:1 by id; edges whose endpoints are absent are dropped rather than
//! failing, since partial topology is normal while the mesh churns.

use std::collections::HashSet;

use super::health::{HealthMap, HealthStatus, error_rate_status};
use super::payload::{BoxKind, NodeType, RawEdge, RawGraphPayload, RawNode, parse_metric};
use super::query::{EdgeLabelMode, GraphQuery, GraphType};

/// Display toggles that influence decoration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecorateOptions {
	/// Grouping the payload was requested with (drives label synthesis).
	pub graph_type: GraphType,
	/// Which metric to render on edges.
	pub edge_label_mode: EdgeLabelMode,
	/// Surface mTLS on edges.
	pub show_security: bool,
}

impl From<&GraphQuery> for DecorateOptions {
	fn from(query: &GraphQuery) -> Self {
		Self {
			graph_type: query.graph_type,
			edge_label_mode: query.edge_label_mode,
			show_security: query.show_security,
		}
	}
}

/// Badge drawn on a node, chosen by node type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BadgeKind {
	/// App or app box.
	App,
	/// Service.
	Service,
	/// Service entry (external or mesh-internal host).
	ServiceEntry,
	/// Workload.
	Workload,
	/// Namespace box.
	Namespace,
	/// Cluster box.
	Cluster,
	/// Aggregate node.
	Aggregate,
	/// Unidentified traffic source.
	Unknown,
}

impl BadgeKind {
	/// Short glyph rendered inside the node.
	pub fn glyph(self) -> &'static str {
		match self {
			BadgeKind::App => "A",
			BadgeKind::Service => "S",
			BadgeKind::ServiceEntry => "SE",
			BadgeKind::Workload => "W",
			BadgeKind::Namespace => "NS",
			BadgeKind::Cluster => "C",
			BadgeKind::Aggregate => "AG",
			BadgeKind::Unknown => "?",
		}
	}

	fn for_node(node: &RawNode) -> Self {
		match node.node_type {
			NodeType::App => BadgeKind::App,
			NodeType::Service if node.is_service_entry.is_some() => BadgeKind::ServiceEntry,
			NodeType::Service => BadgeKind::Service,
			NodeType::Workload => BadgeKind::Workload,
			NodeType::Box => match node.is_box {
				Some(BoxKind::Namespace) => BadgeKind::Namespace,
				Some(BoxKind::Cluster) => BadgeKind::Cluster,
				Some(BoxKind::App) | None => BadgeKind::App,
			},
			NodeType::Aggregate => BadgeKind::Aggregate,
			NodeType::Unknown => BadgeKind::Unknown,
		}
	}
}

/// Node ready for rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayNode {
	/// Backend id.
	pub id: String,
	/// Entity kind.
	pub node_type: NodeType,
	/// Namespace name.
	pub namespace: String,
	/// Cluster name, if reported.
	pub cluster: Option<String>,
	/// App label value.
	pub app: Option<String>,
	/// Version label value.
	pub version: Option<String>,
	/// Workload name.
	pub workload: Option<String>,
	/// Service name.
	pub service: Option<String>,
	/// Text shown next to the node. May contain a line break.
	pub label: String,
	/// Badge kind.
	pub badge: BadgeKind,
	/// Health status.
	pub health: HealthStatus,
	/// Id of the grouping box, if any.
	pub parent: Option<String>,
	/// Total inbound rate across protocols.
	pub rate_in: f64,
	/// Only sends traffic.
	pub is_root: bool,
	/// Received no traffic in the window.
	pub is_unused: bool,
	/// Outside the requested namespaces.
	pub is_outside: bool,
	/// Namespace not accessible.
	pub is_inaccessible: bool,
	/// Running without a sidecar.
	pub has_missing_sidecar: bool,
	/// Has a circuit breaker.
	pub has_circuit_breaker: bool,
	/// Routed by a virtual service.
	pub has_virtual_service: bool,
}

/// Edge ready for rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayEdge {
	/// Backend id.
	pub id: String,
	/// Source node id, guaranteed present in the model.
	pub source: String,
	/// Target node id, guaranteed present in the model.
	pub target: String,
	/// `http`, `grpc` or `tcp`, when traffic was seen.
	pub protocol: Option<String>,
	/// Metric label; always `None` when labels are off.
	pub label: Option<String>,
	/// Status derived from the edge's error percentage.
	pub health: HealthStatus,
	/// Traffic is (at least partly) mTLS and security display is on.
	pub is_mtls: bool,
}

/// Decorated graph, replaced wholesale on each refresh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayGraphModel {
	/// Nodes in payload order.
	pub nodes: Vec<DisplayNode>,
	/// Edges in payload order, minus dropped ones.
	pub edges: Vec<DisplayEdge>,
	/// Number of edges dropped for referencing unknown nodes.
	pub dropped_edges: usize,
}

impl DisplayGraphModel {
	/// Look up a node by id.
	pub fn node(&self, id: &str) -> Option<&DisplayNode> {
		self.nodes.iter().find(|n| n.id == id)
	}

	/// True when there is nothing to draw.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

/// Decorate a raw payload for display.
///
/// Health comes from `health` keyed by node id; nodes missing there fall back
/// to the health data the backend embedded in the node, then to `NA`.
pub fn decorate(
	payload: &RawGraphPayload,
	health: &HealthMap,
	options: &DecorateOptions,
) -> DisplayGraphModel {
	let mut model = DisplayGraphModel::default();
	let mut node_ids: HashSet<&str> = HashSet::new();

	for node in payload.nodes() {
		if !node_ids.insert(node.id.as_str()) {
			continue;
		}
		model.nodes.push(decorate_node(node, health, options));
	}

	let mut edge_ids: HashSet<&str> = HashSet::new();
	for edge in payload.edges() {
		if !node_ids.contains(edge.source.as_str()) || !node_ids.contains(edge.target.as_str()) {
			model.dropped_edges += 1;
			continue;
		}
		if !edge_ids.insert(edge.id.as_str()) {
			continue;
		}
		model.edges.push(decorate_edge(edge, options));
	}

	model
}

fn decorate_node(node: &RawNode, health: &HealthMap, options: &DecorateOptions) -> DisplayNode {
	let status = health.get(&node.id).unwrap_or_else(|| {
		node.health_data
			.as_ref()
			.map(|h| h.status(node.has_health_config.as_ref()))
			.unwrap_or_default()
	});

	let rate_in = node
		.traffic
		.iter()
		.flat_map(|t| t.rates.iter())
		.filter(|(key, _)| key.ends_with("In"))
		.filter_map(|(_, v)| v.trim().parse::<f64>().ok())
		.filter(|v| v.is_finite())
		.sum();

	DisplayNode {
		id: node.id.clone(),
		node_type: node.node_type,
		namespace: node.namespace.clone(),
		cluster: node.cluster.clone(),
		app: node.app.clone(),
		version: node.version.clone(),
		workload: node.workload.clone(),
		service: node.service.clone(),
		label: node_label(node, options.graph_type),
		badge: BadgeKind::for_node(node),
		health: status,
		parent: node.parent.clone(),
		rate_in,
		is_root: node.is_root,
		is_unused: node.is_unused,
		is_outside: node.is_outside,
		is_inaccessible: node.is_inaccessible,
		has_missing_sidecar: node.has_missing_sidecar,
		has_circuit_breaker: node.has_circuit_breaker,
		has_virtual_service: node.has_virtual_service,
	}
}

fn non_empty(value: &Option<String>) -> Option<&str> {
	value.as_deref().filter(|v| !v.is_empty())
}

/// Backend label if present, otherwise built from the node's identity fields.
fn node_label(node: &RawNode, graph_type: GraphType) -> String {
	if let Some(label) = non_empty(&node.label) {
		return label.to_string();
	}

	let name = match node.node_type {
		NodeType::App => non_empty(&node.app).map(|app| match non_empty(&node.version) {
			Some(version) if graph_type == GraphType::VersionedApp && version != "unknown" => {
				format!("{app}\n{version}")
			}
			_ => app.to_string(),
		}),
		NodeType::Service => non_empty(&node.service).map(str::to_string),
		NodeType::Workload => non_empty(&node.workload).map(str::to_string),
		NodeType::Box => match node.is_box {
			Some(BoxKind::Namespace) => Some(node.namespace.clone()),
			Some(BoxKind::Cluster) => non_empty(&node.cluster).map(str::to_string),
			Some(BoxKind::App) | None => non_empty(&node.app).map(str::to_string),
		},
		NodeType::Aggregate => non_empty(&node.aggregate_value)
			.or(non_empty(&node.aggregate))
			.map(str::to_string),
		NodeType::Unknown => Some("unknown".to_string()),
	};
	let name = name.unwrap_or_else(|| node.id.clone());

	if node.is_outside && !node.namespace.is_empty() {
		format!("{name}\n({})", node.namespace)
	} else {
		name
	}
}

fn decorate_edge(edge: &RawEdge, options: &DecorateOptions) -> DisplayEdge {
	let protocol = edge
		.traffic
		.as_ref()
		.map(|t| t.protocol.clone())
		.filter(|p| !p.is_empty());

	let percent_err = edge.traffic.as_ref().and_then(|t| match t.protocol.as_str() {
		"http" => t.rate("httpPercentErr").or(t.rate("http").map(|_| 0.0)),
		"grpc" => t.rate("grpcPercentErr").or(t.rate("grpc").map(|_| 0.0)),
		_ => None,
	});

	let is_mtls = options.show_security
		&& parse_metric(edge.is_mtls.as_ref()).is_some_and(|pct| pct > 0.0);

	DisplayEdge {
		id: edge.id.clone(),
		source: edge.source.clone(),
		target: edge.target.clone(),
		protocol,
		label: edge_label(edge, options.edge_label_mode),
		health: error_rate_status(percent_err),
		is_mtls,
	}
}

fn edge_label(edge: &RawEdge, mode: EdgeLabelMode) -> Option<String> {
	match mode {
		EdgeLabelMode::None => None,
		EdgeLabelMode::TrafficRate => {
			let traffic = edge.traffic.as_ref()?;
			match traffic.protocol.as_str() {
				"tcp" => traffic.rate("tcp").map(format_bytes_rate),
				proto @ ("http" | "grpc") => traffic.rate(proto).map(|rps| format!("{rps:.2}rps")),
				_ => None,
			}
		}
		EdgeLabelMode::TrafficDistribution => {
			let traffic = edge.traffic.as_ref()?;
			let key = match traffic.protocol.as_str() {
				"http" => "httpPercentReq",
				"grpc" => "grpcPercentReq",
				_ => return None,
			};
			traffic.rate(key).map(|pct| format!("{pct:.1}%"))
		}
		EdgeLabelMode::ResponseTime => {
			parse_metric(edge.response_time.as_ref()).map(|ms| {
				if ms < 1000.0 {
					format!("{ms:.0}ms")
				} else {
					format!("{:.2}s", ms / 1000.0)
				}
			})
		}
		EdgeLabelMode::Throughput => parse_metric(edge.throughput.as_ref()).map(format_bytes_rate),
	}
}

fn format_bytes_rate(bytes_per_sec: f64) -> String {
	if bytes_per_sec >= 1_000_000.0 {
		format!("{:.2}MB/s", bytes_per_sec / 1_000_000.0)
	} else if bytes_per_sec >= 1000.0 {
		format!("{:.2}kB/s", bytes_per_sec / 1000.0)
	} else {
		format!("{bytes_per_sec:.2}B/s")
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;
	use crate::graph::health::{EntityHealth, RequestHealth};
	use crate::graph::payload::{EdgeTraffic, Element, Elements, ServiceEntryInfo};

	fn app(id: &str, name: &str, version: &str) -> RawNode {
		RawNode {
			id: id.into(),
			node_type: NodeType::App,
			namespace: "bookinfo".into(),
			app: Some(name.into()),
			version: Some(version.into()),
			..RawNode::default()
		}
	}

	fn edge(id: &str, source: &str, target: &str) -> RawEdge {
		RawEdge {
			id: id.into(),
			source: source.into(),
			target: target.into(),
			..RawEdge::default()
		}
	}

	fn http_edge(id: &str, source: &str, target: &str, rates: &[(&str, &str)]) -> RawEdge {
		RawEdge {
			traffic: Some(EdgeTraffic {
				protocol: "http".into(),
				rates: rates
					.iter()
					.map(|(k, v)| (k.to_string(), v.to_string()))
					.collect(),
			}),
			response_time: Some("42.7".into()),
			throughput: Some("2048".into()),
			is_mtls: Some("100".into()),
			..edge(id, source, target)
		}
	}

	fn payload(nodes: Vec<RawNode>, edges: Vec<RawEdge>) -> RawGraphPayload {
		RawGraphPayload {
			elements: Elements {
				nodes: nodes.into_iter().map(|data| Element { data }).collect(),
				edges: edges.into_iter().map(|data| Element { data }).collect(),
			},
			..RawGraphPayload::default()
		}
	}

	fn ids(model: &DisplayGraphModel) -> Vec<&str> {
		model.nodes.iter().map(|n| n.id.as_str()).collect()
	}

	#[test]
	fn attaches_health_per_node_and_keeps_valid_edges() {
		let p = payload(
			vec![app("a", "a", "v1"), app("b", "b", "v1")],
			vec![edge("ab", "a", "b")],
		);
		let health: HealthMap = [("a", HealthStatus::Healthy), ("b", HealthStatus::Failure)]
			.into_iter()
			.collect();

		let model = decorate(&p, &health, &DecorateOptions::default());
		assert_eq!(ids(&model), ["a", "b"]);
		assert_eq!(model.node("a").unwrap().health, HealthStatus::Healthy);
		assert_eq!(model.node("b").unwrap().health, HealthStatus::Failure);
		assert_eq!(model.edges.len(), 1);
		assert_eq!((model.edges[0].source.as_str(), model.edges[0].target.as_str()), ("a", "b"));
	}

	#[test]
	fn drops_edges_to_missing_nodes() {
		let p = payload(
			vec![app("a", "a", "v1"), app("b", "b", "v1")],
			vec![edge("ac", "a", "c"), edge("ca", "c", "a")],
		);
		let model = decorate(&p, &HealthMap::new(), &DecorateOptions::default());
		assert_eq!(model.nodes.len(), 2);
		assert!(model.edges.is_empty());
		assert_eq!(model.dropped_edges, 2);
	}

	#[test]
	fn node_set_matches_input_and_edges_are_closed() {
		let p = payload(
			vec![app("x", "x", "v1"), app("y", "y", "v2"), app("x", "dup", "v9"), app("z", "z", "")],
			vec![
				edge("xy", "x", "y"),
				edge("yz", "y", "z"),
				edge("zq", "z", "q"),
				edge("xy", "x", "y"),
			],
		);
		let model = decorate(&p, &HealthMap::new(), &DecorateOptions::default());

		let input: HashSet<&str> = p.nodes().map(|n| n.id.as_str()).collect();
		let output: HashSet<&str> = ids(&model).into_iter().collect();
		assert_eq!(input, output);
		assert_eq!(model.nodes.len(), output.len());
		// first occurrence wins
		assert_eq!(model.node("x").unwrap().app.as_deref(), Some("x"));

		for e in &model.edges {
			assert!(output.contains(e.source.as_str()));
			assert!(output.contains(e.target.as_str()));
		}
		assert_eq!(model.edges.len(), 2);
	}

	#[test]
	fn decoration_is_deterministic() {
		let p = payload(
			vec![app("a", "a", "v1"), app("b", "b", "v1")],
			vec![http_edge("ab", "a", "b", &[("http", "3.5")])],
		);
		let health: HealthMap = [("a", HealthStatus::Degraded)].into_iter().collect();
		let options = DecorateOptions {
			edge_label_mode: EdgeLabelMode::TrafficRate,
			..DecorateOptions::default()
		};
		assert_eq!(decorate(&p, &health, &options), decorate(&p, &health, &options));
	}

	#[test]
	fn edge_labels_follow_mode() {
		let p = payload(
			vec![app("a", "a", "v1"), app("b", "b", "v1")],
			vec![http_edge(
				"ab",
				"a",
				"b",
				&[("http", "1.934"), ("httpPercentReq", "100.0"), ("httpPercentErr", "12.5")],
			)],
		);
		let label = |mode| {
			let options = DecorateOptions {
				edge_label_mode: mode,
				..DecorateOptions::default()
			};
			decorate(&p, &HealthMap::new(), &options).edges[0].label.clone()
		};

		assert_eq!(label(EdgeLabelMode::None), None);
		assert_eq!(label(EdgeLabelMode::TrafficRate).as_deref(), Some("1.93rps"));
		assert_eq!(label(EdgeLabelMode::TrafficDistribution).as_deref(), Some("100.0%"));
		assert_eq!(label(EdgeLabelMode::ResponseTime).as_deref(), Some("43ms"));
		assert_eq!(label(EdgeLabelMode::Throughput).as_deref(), Some("2.05kB/s"));
	}

	#[test]
	fn missing_metric_yields_no_label() {
		let p = payload(
			vec![app("a", "a", "v1"), app("b", "b", "v1")],
			vec![edge("ab", "a", "b")],
		);
		let options = DecorateOptions {
			edge_label_mode: EdgeLabelMode::ResponseTime,
			..DecorateOptions::default()
		};
		let model = decorate(&p, &HealthMap::new(), &options);
		assert_eq!(model.edges[0].label, None);
		assert_eq!(model.edges[0].health, HealthStatus::NotAvailable);
	}

	#[test]
	fn non_finite_rates_are_ignored() {
		let options = DecorateOptions {
			edge_label_mode: EdgeLabelMode::TrafficRate,
			..DecorateOptions::default()
		};
		let nan = payload(
			vec![app("a", "a", "v1"), app("b", "b", "v1")],
			vec![http_edge("ab", "a", "b", &[("http", "NaN"), ("httpPercentErr", "NaN")])],
		);
		let model = decorate(&nan, &HealthMap::new(), &options);
		assert_eq!(model.edges[0].label, None);
		assert_eq!(model.edges[0].health, HealthStatus::NotAvailable);

		let inf_err = payload(
			vec![app("a", "a", "v1"), app("b", "b", "v1")],
			vec![http_edge("ab", "a", "b", &[("http", "2.0"), ("httpPercentErr", "inf")])],
		);
		let model = decorate(&inf_err, &HealthMap::new(), &options);
		assert_eq!(model.edges[0].label.as_deref(), Some("2.00rps"));
		assert_eq!(model.edges[0].health, HealthStatus::Healthy);
	}

	#[test]
	fn edge_health_and_security() {
		let p = payload(
			vec![app("a", "a", "v1"), app("b", "b", "v1")],
			vec![http_edge("ab", "a", "b", &[("http", "1.0"), ("httpPercentErr", "12.5")])],
		);
		let plain = decorate(&p, &HealthMap::new(), &DecorateOptions::default());
		assert_eq!(plain.edges[0].health, HealthStatus::Failure);
		assert!(!plain.edges[0].is_mtls);

		let secure = decorate(
			&p,
			&HealthMap::new(),
			&DecorateOptions {
				show_security: true,
				..DecorateOptions::default()
			},
		);
		assert!(secure.edges[0].is_mtls);
	}

	#[test]
	fn labels_and_badges_by_node_type() {
		let service_entry = RawNode {
			id: "se".into(),
			node_type: NodeType::Service,
			namespace: "bookinfo".into(),
			service: Some("api.example.com".into()),
			is_service_entry: Some(ServiceEntryInfo::default()),
			..RawNode::default()
		};
		let workload = RawNode {
			id: "w".into(),
			node_type: NodeType::Workload,
			namespace: "other".into(),
			workload: Some("details-v1".into()),
			is_outside: true,
			..RawNode::default()
		};
		let unknown = RawNode {
			id: "u".into(),
			..RawNode::default()
		};
		let labelled = RawNode {
			label: Some("ingress".into()),
			..app("l", "istio-ingressgateway", "")
		};
		let p = payload(
			vec![app("a", "reviews", "v2"), service_entry, workload, unknown, labelled],
			vec![],
		);

		let versioned = decorate(&p, &HealthMap::new(), &DecorateOptions::default());
		let node = |id| versioned.node(id).unwrap();
		assert_eq!(node("a").label, "reviews\nv2");
		assert_eq!(node("a").badge, BadgeKind::App);
		assert_eq!(node("se").badge, BadgeKind::ServiceEntry);
		assert_eq!(node("w").label, "details-v1\n(other)");
		assert_eq!(node("w").badge, BadgeKind::Workload);
		assert_eq!(node("u").label, "unknown");
		assert_eq!(node("u").badge.glyph(), "?");
		assert_eq!(node("l").label, "ingress");

		let unversioned = decorate(
			&p,
			&HealthMap::new(),
			&DecorateOptions {
				graph_type: GraphType::App,
				..DecorateOptions::default()
			},
		);
		assert_eq!(unversioned.node("a").unwrap().label, "reviews");
	}

	#[test]
	fn embedded_health_is_used_when_map_has_no_entry() {
		let mut sick = app("a", "reviews", "v1");
		sick.health_data = Some(EntityHealth {
			requests: RequestHealth {
				inbound: BTreeMap::from([(
					"http".to_string(),
					BTreeMap::from([("200".to_string(), 1.0), ("500".to_string(), 1.0)]),
				)]),
				..RequestHealth::default()
			},
			..EntityHealth::default()
		});
		let p = payload(vec![sick, app("b", "ratings", "v1")], vec![]);

		let model = decorate(&p, &HealthMap::new(), &DecorateOptions::default());
		assert_eq!(model.node("a").unwrap().health, HealthStatus::Failure);
		assert_eq!(model.node("b").unwrap().health, HealthStatus::NotAvailable);

		let overridden: HealthMap = [("a", HealthStatus::Healthy)].into_iter().collect();
		let model = decorate(&p, &overridden, &DecorateOptions::default());
		assert_eq!(model.node("a").unwrap().health, HealthStatus::Healthy);
	}
}
