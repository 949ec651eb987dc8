//! Backend-shaped topology payload, as returned by the graph API.
//!
//! Mirrors the cytoscape element layout the backend emits: nodes and edges
//! wrapped in `{ "data": { ... } }` records, traffic rates encoded as strings.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};

use super::health::EntityHealth;
use super::query::GraphType;

/// Accepts `true`, a non-empty object/array/string, or any other truthy JSON as `true`.
///
/// The backend switched several markers (`hasVS`, `isServiceEntry`) from
/// booleans to objects over time; both mean "present".
fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
	D: Deserializer<'de>,
{
	let value = serde_json::Value::deserialize(deserializer)?;
	Ok(match value {
		serde_json::Value::Null => false,
		serde_json::Value::Bool(b) => b,
		serde_json::Value::String(s) => !s.is_empty() && s != "false",
		serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
		serde_json::Value::Array(a) => !a.is_empty(),
		serde_json::Value::Object(_) => true,
	})
}

/// Kind of entity a node stands for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
	/// App (optionally versioned) node.
	App,
	/// Service node.
	Service,
	/// Workload node.
	Workload,
	/// Grouping box (app, namespace or cluster).
	Box,
	/// Aggregate of requests sharing an attribute value.
	Aggregate,
	/// Traffic source the backend could not identify.
	#[default]
	#[serde(other)]
	Unknown,
}

/// What a box node groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoxKind {
	/// Versions of one app.
	App,
	/// All nodes of a namespace.
	Namespace,
	/// All nodes of a cluster.
	Cluster,
}

/// Where a service entry points.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceEntryInfo {
	/// `MESH_EXTERNAL` or `MESH_INTERNAL`.
	pub location: String,
	/// Hosts declared by the entry.
	pub hosts: Vec<String>,
}

/// Per-protocol traffic totals attached to a node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTraffic {
	/// `http`, `grpc` or `tcp`.
	pub protocol: String,
	/// Rate name to decimal string (e.g. `httpIn` -> `"1.93"`).
	pub rates: BTreeMap<String, String>,
}

/// Node record as sent by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNode {
	/// Backend-assigned identifier, unique within a payload.
	pub id: String,
	/// Id of the box node grouping this node.
	pub parent: Option<String>,
	/// Entity kind.
	pub node_type: NodeType,
	/// Cluster name.
	pub cluster: Option<String>,
	/// Namespace name.
	pub namespace: String,
	/// Workload name, for workload nodes.
	pub workload: Option<String>,
	/// App label value.
	pub app: Option<String>,
	/// Version label value.
	pub version: Option<String>,
	/// Service name, for service nodes.
	pub service: Option<String>,
	/// Aggregate attribute name, for aggregate nodes.
	pub aggregate: Option<String>,
	/// Aggregate attribute value, for aggregate nodes.
	pub aggregate_value: Option<String>,
	/// Preformatted label, if the backend supplied one.
	pub label: Option<String>,
	/// Set on box nodes.
	pub is_box: Option<BoxKind>,
	/// Service entry details, set on service entry nodes.
	pub is_service_entry: Option<ServiceEntryInfo>,
	/// Node received no traffic in the window.
	#[serde(deserialize_with = "de_flag")]
	pub is_unused: bool,
	/// Node only sends traffic.
	#[serde(deserialize_with = "de_flag")]
	pub is_root: bool,
	/// Node lives outside the requested namespaces.
	#[serde(deserialize_with = "de_flag")]
	pub is_outside: bool,
	/// Node's namespace is not accessible to the user.
	#[serde(deserialize_with = "de_flag")]
	pub is_inaccessible: bool,
	/// Workload is running without a sidecar proxy.
	#[serde(rename = "hasMissingSC", deserialize_with = "de_flag")]
	pub has_missing_sidecar: bool,
	/// A circuit breaker applies to the node.
	#[serde(rename = "hasCB", deserialize_with = "de_flag")]
	pub has_circuit_breaker: bool,
	/// A virtual service routes to the node.
	#[serde(rename = "hasVS", deserialize_with = "de_flag")]
	pub has_virtual_service: bool,
	/// Traffic totals per protocol.
	pub traffic: Vec<NodeTraffic>,
	/// Health data embedded by the backend's health appender.
	pub health_data: Option<EntityHealth>,
	/// Health annotations (e.g. `health.kiali.io/rate`) of the entity.
	pub has_health_config: Option<HashMap<String, String>>,
}

/// Edge traffic as sent by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeTraffic {
	/// `http`, `grpc` or `tcp`.
	pub protocol: String,
	/// Rate name to decimal string (`http`, `httpPercentReq`, `httpPercentErr`, `tcp`, ...).
	pub rates: BTreeMap<String, String>,
}

/// Edge record as sent by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEdge {
	/// Backend-assigned identifier.
	pub id: String,
	/// Source node id.
	pub source: String,
	/// Target node id.
	pub target: String,
	/// Traffic observed on the edge.
	pub traffic: Option<EdgeTraffic>,
	/// 95th percentile response time in milliseconds.
	pub response_time: Option<String>,
	/// Response throughput in bytes per second.
	pub throughput: Option<String>,
	/// Percentage of requests using mutual TLS.
	#[serde(rename = "isMTLS")]
	pub is_mtls: Option<String>,
}

/// `{ "data": T }` wrapper used for every element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Element<T> {
	/// The element record.
	pub data: T,
}

/// Node and edge element lists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Elements {
	/// Node records.
	pub nodes: Vec<Element<RawNode>>,
	/// Edge records.
	pub edges: Vec<Element<RawEdge>>,
}

/// Complete graph response for one query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawGraphPayload {
	/// Unix seconds the telemetry window ends at.
	pub timestamp: i64,
	/// Window length in seconds.
	pub duration: u64,
	/// Grouping the backend applied.
	pub graph_type: GraphType,
	/// Nodes and edges.
	pub elements: Elements,
}

impl RawGraphPayload {
	/// Iterate node records.
	pub fn nodes(&self) -> impl Iterator<Item = &RawNode> {
		self.elements.nodes.iter().map(|e| &e.data)
	}

	/// Iterate edge records.
	pub fn edges(&self) -> impl Iterator<Item = &RawEdge> {
		self.elements.edges.iter().map(|e| &e.data)
	}

	/// True when the backend found no nodes for the query.
	pub fn is_empty(&self) -> bool {
		self.elements.nodes.is_empty()
	}

	/// Combine per-namespace payloads into one graph.
	///
	/// Nodes and edges already seen (by id) are skipped, so entities shared
	/// across namespaces (e.g. an `istio-system` ingress) appear once.
	pub fn merge<'a>(parts: impl IntoIterator<Item = &'a RawGraphPayload>) -> RawGraphPayload {
		let mut merged = RawGraphPayload::default();
		let mut node_ids = HashSet::new();
		let mut edge_ids = HashSet::new();

		for part in parts {
			merged.timestamp = merged.timestamp.max(part.timestamp);
			merged.duration = merged.duration.max(part.duration);
			merged.graph_type = part.graph_type;
			for node in &part.elements.nodes {
				if node_ids.insert(node.data.id.clone()) {
					merged.elements.nodes.push(node.clone());
				}
			}
			for edge in &part.elements.edges {
				if edge_ids.insert(edge.data.id.clone()) {
					merged.elements.edges.push(edge.clone());
				}
			}
		}
		merged
	}
}

impl EdgeTraffic {
	/// Parse a rate, ignoring missing, malformed or non-finite values.
	pub fn rate(&self, key: &str) -> Option<f64> {
		parse_metric(self.rates.get(key))
	}
}

/// Parse an optional decimal string field.
pub(crate) fn parse_metric(value: Option<&String>) -> Option<f64> {
	value
		.and_then(|v| v.trim().parse::<f64>().ok())
		.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r#"{
		"timestamp": 1700000000,
		"duration": 60,
		"graphType": "versionedApp",
		"elements": {
			"nodes": [
				{"data": {"id": "n1", "nodeType": "app", "namespace": "bookinfo", "app": "reviews", "version": "v1", "hasVS": {"hostnames": ["reviews"]}, "isRoot": true}},
				{"data": {"id": "n2", "nodeType": "service", "namespace": "bookinfo", "service": "ratings", "isServiceEntry": {"location": "MESH_EXTERNAL", "hosts": ["ratings.example.com"]}}},
				{"data": {"id": "n3", "nodeType": "someFutureKind", "namespace": "bookinfo"}}
			],
			"edges": [
				{"data": {"id": "e1", "source": "n1", "target": "n2", "traffic": {"protocol": "http", "rates": {"http": "1.93", "httpPercentReq": "100.0"}}, "isMTLS": "100"}}
			]
		}
	}"#;

	#[test]
	fn parses_backend_payload() {
		let payload: RawGraphPayload = serde_json::from_str(SAMPLE).unwrap();
		assert_eq!(payload.graph_type, GraphType::VersionedApp);
		assert_eq!(payload.nodes().count(), 3);

		let reviews = payload.nodes().next().unwrap();
		assert!(reviews.has_virtual_service);
		assert!(reviews.is_root);
		assert!(!reviews.is_unused);

		let ratings = payload.nodes().nth(1).unwrap();
		let se = ratings.is_service_entry.as_ref().unwrap();
		assert_eq!(se.location, "MESH_EXTERNAL");

		assert_eq!(payload.nodes().nth(2).unwrap().node_type, NodeType::Unknown);

		let edge = payload.edges().next().unwrap();
		assert_eq!(edge.traffic.as_ref().unwrap().rate("http"), Some(1.93));
		assert_eq!(parse_metric(edge.is_mtls.as_ref()), Some(100.0));
	}

	#[test]
	fn merge_deduplicates_shared_elements() {
		let a: RawGraphPayload = serde_json::from_str(SAMPLE).unwrap();
		let mut b = a.clone();
		b.elements.nodes.push(Element {
			data: RawNode {
				id: "n4".into(),
				..RawNode::default()
			},
		});

		let merged = RawGraphPayload::merge([&a, &b]);
		let ids: Vec<_> = merged.nodes().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, ["n1", "n2", "n3", "n4"]);
		assert_eq!(merged.edges().count(), 1);
	}

	#[test]
	fn empty_object_is_empty_graph() {
		let payload: RawGraphPayload = serde_json::from_str("{}").unwrap();
		assert!(payload.is_empty());
	}
}
