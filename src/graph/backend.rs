//! Concrete [`GraphBackend`]s: the live HTTP API and an embedded snapshot.

use std::collections::HashMap;

use log::{debug, info};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use super::health::{HealthKind, NamespaceHealth};
use super::payload::RawGraphPayload;
use super::query::GraphQuery;
use super::source::GraphBackend;
use crate::error::FetchError;

fn js_error(err: JsValue) -> FetchError {
	FetchError::Network(
		err.as_string()
			.unwrap_or_else(|| format!("{err:?}")),
	)
}

/// GET `url` and decode the JSON body.
async fn get_json<T: DeserializeOwned>(url: &str) -> Result<T, FetchError> {
	let window = web_sys::window().ok_or_else(|| FetchError::Unavailable("no window".into()))?;

	let init = RequestInit::new();
	init.set_method("GET");
	init.set_mode(RequestMode::Cors);
	let request = Request::new_with_str_and_init(url, &init).map_err(js_error)?;
	request
		.headers()
		.set("Accept", "application/json")
		.map_err(js_error)?;

	let response: Response = JsFuture::from(window.fetch_with_request(&request))
		.await
		.map_err(js_error)?
		.dyn_into()
		.map_err(js_error)?;
	if !response.ok() {
		return Err(FetchError::Status {
			status: response.status(),
			url: url.to_string(),
		});
	}

	let body = JsFuture::from(response.text().map_err(js_error)?)
		.await
		.map_err(js_error)?
		.as_string()
		.ok_or_else(|| FetchError::Decode("response body is not text".into()))?;
	Ok(serde_json::from_str(&body)?)
}

/// Talks to the mesh observability API over `fetch`.
#[derive(Clone, Debug)]
pub struct HttpBackend {
	api_base: String,
}

impl HttpBackend {
	/// Backend rooted at `api_base` (e.g. `/api` or `https://mesh.example.com/api`).
	pub fn new(api_base: impl Into<String>) -> Self {
		let api_base = api_base.into().trim_end_matches('/').to_string();
		Self { api_base }
	}

	/// URL of the graph endpoint for `query`.
	pub fn graph_url(&self, query: &GraphQuery) -> String {
		format!("{}/namespaces/graph?{}", self.api_base, query.to_query_string())
	}

	/// URL of the health endpoint for one namespace and entity kind.
	pub fn health_url(&self, namespace: &str, kind: HealthKind, query: &GraphQuery) -> String {
		let mut url = format!(
			"{}/namespaces/{}/health?type={}&rateInterval={}s",
			self.api_base,
			namespace,
			kind.as_str(),
			query.duration
		);
		if query.query_time > 0 {
			url.push_str(&format!("&queryTime={}", query.query_time));
		}
		url
	}
}

impl GraphBackend for HttpBackend {
	async fn fetch_graph(&self, query: &GraphQuery) -> Result<RawGraphPayload, FetchError> {
		let url = self.graph_url(query);
		debug!("mesh-graph: GET {url}");
		get_json(&url).await
	}

	async fn fetch_health(
		&self,
		namespace: &str,
		kind: HealthKind,
		query: &GraphQuery,
	) -> Result<NamespaceHealth, FetchError> {
		let url = self.health_url(namespace, kind, query);
		debug!("mesh-graph: GET {url}");
		get_json(&url).await
	}
}

/// Health captured for one namespace, per entity kind.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotHealth {
	/// App health.
	pub app: NamespaceHealth,
	/// Service health.
	pub service: NamespaceHealth,
	/// Workload health.
	pub workload: NamespaceHealth,
}

/// Offline graph document: per-namespace payloads and health.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotDocument {
	/// Namespace name -> graph payload.
	pub graphs: HashMap<String, RawGraphPayload>,
	/// Namespace name -> health.
	pub health: HashMap<String, SnapshotHealth>,
}

/// Serves graphs from a captured snapshot instead of a live backend.
#[derive(Clone, Debug, Default)]
pub struct SnapshotBackend {
	document: SnapshotDocument,
}

impl SnapshotBackend {
	/// Wrap an already parsed document.
	pub fn new(document: SnapshotDocument) -> Self {
		Self { document }
	}

	/// Parse a snapshot document.
	pub fn from_json(json: &str) -> Result<Self, FetchError> {
		let document: SnapshotDocument = serde_json::from_str(json)?;
		info!(
			"mesh-graph: snapshot with {} namespaces",
			document.graphs.len()
		);
		Ok(Self::new(document))
	}
}

impl GraphBackend for SnapshotBackend {
	async fn fetch_graph(&self, query: &GraphQuery) -> Result<RawGraphPayload, FetchError> {
		let parts: Vec<&RawGraphPayload> = query
			.namespaces
			.iter()
			.filter_map(|ns| self.document.graphs.get(&ns.name))
			.collect();
		if let Some(part) = parts.iter().find(|p| p.graph_type != query.graph_type) {
			debug!(
				"mesh-graph: snapshot captured as {}, queried as {}",
				part.graph_type, query.graph_type
			);
		}
		Ok(RawGraphPayload::merge(parts))
	}

	async fn fetch_health(
		&self,
		namespace: &str,
		kind: HealthKind,
		_query: &GraphQuery,
	) -> Result<NamespaceHealth, FetchError> {
		let health = self
			.document
			.health
			.get(namespace)
			.ok_or_else(|| FetchError::Unavailable(format!("no health for {namespace}")))?;
		Ok(match kind {
			HealthKind::App => health.app.clone(),
			HealthKind::Service => health.service.clone(),
			HealthKind::Workload => health.workload.clone(),
		})
	}
}

/// Backend selected at startup from configuration.
#[derive(Clone, Debug)]
pub enum AnyBackend {
	/// Live API.
	Http(HttpBackend),
	/// Embedded snapshot.
	Snapshot(SnapshotBackend),
}

impl GraphBackend for AnyBackend {
	async fn fetch_graph(&self, query: &GraphQuery) -> Result<RawGraphPayload, FetchError> {
		match self {
			AnyBackend::Http(b) => b.fetch_graph(query).await,
			AnyBackend::Snapshot(b) => b.fetch_graph(query).await,
		}
	}

	async fn fetch_health(
		&self,
		namespace: &str,
		kind: HealthKind,
		query: &GraphQuery,
	) -> Result<NamespaceHealth, FetchError> {
		match self {
			AnyBackend::Http(b) => b.fetch_health(namespace, kind, query).await,
			AnyBackend::Snapshot(b) => b.fetch_health(namespace, kind, query).await,
		}
	}
}

#[cfg(test)]
mod tests {
	use futures::executor::block_on;

	use super::*;
	use crate::graph::query::{EdgeLabelMode, Namespace};

	const SNAPSHOT: &str = r#"{
		"graphs": {
			"ISTIO_SYSTEM": {
				"graphType": "versionedApp",
				"elements": {
					"nodes": [
						{"data": {"id": "ingress", "nodeType": "app", "namespace": "ISTIO_SYSTEM", "app": "istio-ingressgateway", "isRoot": true}},
						{"data": {"id": "productpage", "nodeType": "app", "namespace": "bookinfo", "app": "productpage", "version": "v1"}}
					],
					"edges": [
						{"data": {"id": "e1", "source": "ingress", "target": "productpage"}}
					]
				}
			},
			"bookinfo": {
				"graphType": "versionedApp",
				"elements": {
					"nodes": [
						{"data": {"id": "productpage", "nodeType": "app", "namespace": "bookinfo", "app": "productpage", "version": "v1"}},
						{"data": {"id": "reviews", "nodeType": "app", "namespace": "bookinfo", "app": "reviews", "version": "v2"}}
					],
					"edges": [
						{"data": {"id": "e2", "source": "productpage", "target": "reviews"}}
					]
				}
			}
		},
		"health": {
			"bookinfo": {
				"app": {"reviews": {"workloadStatuses": [{"name": "reviews-v2", "desiredReplicas": 1, "currentReplicas": 1, "availableReplicas": 1, "syncedProxies": 1}]}}
			}
		}
	}"#;

	fn query(namespaces: &[&str]) -> GraphQuery {
		GraphQuery {
			namespaces: namespaces.iter().map(|n| Namespace::new(*n)).collect(),
			..GraphQuery::default()
		}
	}

	#[test]
	fn snapshot_merges_requested_namespaces() {
		let backend = SnapshotBackend::from_json(SNAPSHOT).unwrap();
		let payload = block_on(backend.fetch_graph(&query(&["ISTIO_SYSTEM", "bookinfo"]))).unwrap();

		let ids: Vec<_> = payload.nodes().map(|n| n.id.as_str()).collect();
		assert_eq!(ids, ["ingress", "productpage", "reviews"]);
		assert_eq!(payload.edges().count(), 2);
	}

	#[test]
	fn unknown_namespace_is_an_empty_graph() {
		let backend = SnapshotBackend::from_json(SNAPSHOT).unwrap();
		let payload = block_on(backend.fetch_graph(&query(&["nowhere"]))).unwrap();
		assert!(payload.is_empty());
	}

	#[test]
	fn snapshot_health_by_kind() {
		let backend = SnapshotBackend::from_json(SNAPSHOT).unwrap();
		let q = query(&["bookinfo"]);

		let apps = block_on(backend.fetch_health("bookinfo", HealthKind::App, &q)).unwrap();
		assert!(apps.contains_key("reviews"));
		let services = block_on(backend.fetch_health("bookinfo", HealthKind::Service, &q)).unwrap();
		assert!(services.is_empty());
		assert!(block_on(backend.fetch_health("ISTIO_SYSTEM", HealthKind::App, &q)).is_err());
	}

	#[test]
	fn malformed_snapshot_is_a_decode_error() {
		let err = SnapshotBackend::from_json("{not json").unwrap_err();
		assert!(matches!(err, FetchError::Decode(_)));
	}

	#[test]
	fn http_urls() {
		let backend = HttpBackend::new("https://mesh.example.com/api/");
		let q = GraphQuery {
			edge_label_mode: EdgeLabelMode::TrafficRate,
			query_time: 42,
			..query(&["bookinfo"])
		};
		assert!(
			backend
				.graph_url(&q)
				.starts_with("https://mesh.example.com/api/namespaces/graph?namespaces=bookinfo&")
		);
		assert_eq!(
			backend.health_url("bookinfo", HealthKind::Workload, &q),
			"https://mesh.example.com/api/namespaces/bookinfo/health?type=workload&rateInterval=60s&queryTime=42"
		);
	}
}
