//! Health status of mesh entities and its evaluation from raw health data.
//!
//! The health API reports, per app, service or workload, the request rates
//! broken down by protocol and response code plus replica counts. A status is
//! derived from those by comparing error percentages against rate tolerances
//! and checking that the desired replicas are available and proxied.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::payload::{NodeType, RawGraphPayload, RawNode};

/// Annotation carrying per-entity rate tolerances.
pub const RATE_HEALTH_ANNOTATION: &str = "health.kiali.io/rate";

/// Overall health of an entity, ordered from least to most severe.
#[derive(
	Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum HealthStatus {
	/// No health information.
	#[default]
	#[serde(rename = "NA", alias = "No health information")]
	NotAvailable,
	/// Everything within tolerance.
	Healthy,
	/// Scaled to zero or proxies not yet synced.
	#[serde(rename = "Not Ready")]
	NotReady,
	/// Error rate or replica availability past the degraded threshold.
	Degraded,
	/// Error rate past the failure threshold or nothing available.
	Failure,
}

impl HealthStatus {
	/// Display name, as used by the health API.
	pub fn name(self) -> &'static str {
		match self {
			HealthStatus::NotAvailable => "NA",
			HealthStatus::Healthy => "Healthy",
			HealthStatus::NotReady => "Not Ready",
			HealthStatus::Degraded => "Degraded",
			HealthStatus::Failure => "Failure",
		}
	}
}

impl fmt::Display for HealthStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Which health endpoint to query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HealthKind {
	/// App health (aggregated over the app's workloads).
	App,
	/// Service health (requests only).
	Service,
	/// Workload health.
	Workload,
}

impl HealthKind {
	/// Value of the `type` query parameter.
	pub fn as_str(self) -> &'static str {
		match self {
			HealthKind::App => "app",
			HealthKind::Service => "service",
			HealthKind::Workload => "workload",
		}
	}

	/// The entity name a node carries for this kind, if the node is of this kind.
	fn entity_name(self, node: &RawNode) -> Option<&str> {
		match (self, node.node_type) {
			(HealthKind::App, NodeType::App) => node.app.as_deref(),
			(HealthKind::Service, NodeType::Service) => node.service.as_deref(),
			(HealthKind::Workload, NodeType::Workload) => node.workload.as_deref(),
			_ => None,
		}
	}
}

/// Replica and proxy counts of one workload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkloadStatus {
	/// Workload name.
	pub name: String,
	/// Desired replicas.
	pub desired_replicas: i32,
	/// Replicas that exist.
	pub current_replicas: i32,
	/// Replicas ready to serve.
	pub available_replicas: i32,
	/// Proxies synced with the control plane; negative when unknown.
	pub synced_proxies: i32,
}

impl WorkloadStatus {
	fn status(&self) -> HealthStatus {
		if self.desired_replicas == 0 {
			HealthStatus::NotReady
		} else if self.available_replicas == 0 {
			HealthStatus::Failure
		} else if self.available_replicas < self.desired_replicas
			|| self.current_replicas < self.desired_replicas
		{
			HealthStatus::Degraded
		} else if self.synced_proxies >= 0 && self.synced_proxies < self.available_replicas {
			HealthStatus::Degraded
		} else {
			HealthStatus::Healthy
		}
	}
}

/// Protocol -> response code -> requests per second.
pub type ProtocolRates = BTreeMap<String, BTreeMap<String, f64>>;

/// Request rates seen by an entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestHealth {
	/// Requests received.
	pub inbound: ProtocolRates,
	/// Requests sent.
	pub outbound: ProtocolRates,
	/// Health annotations of the entity.
	pub health_annotations: HashMap<String, String>,
}

/// Health data for one app, service or workload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityHealth {
	/// Set for workload health.
	pub workload_status: Option<WorkloadStatus>,
	/// Set for app health: one entry per workload of the app.
	pub workload_statuses: Vec<WorkloadStatus>,
	/// Request rates.
	pub requests: RequestHealth,
}

/// Health API response: entity name -> health.
pub type NamespaceHealth = HashMap<String, EntityHealth>;

/// Tolerance field in the backend's syntax: a regular expression where `x`/`X`
/// stands for any digit. Matches anywhere in the value unless anchored.
#[derive(Clone, Debug)]
pub struct Pattern(Regex);

impl Pattern {
	/// Compile a tolerance field.
	pub fn new(pattern: &str) -> Result<Self, regex::Error> {
		Regex::new(&pattern.replace(['x', 'X'], "\\d")).map(Self)
	}

	/// True when `value` matches.
	pub fn matches(&self, value: &str) -> bool {
		self.0.is_match(value)
	}

	/// Compiled expression source.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}
}

impl PartialEq for Pattern {
	fn eq(&self, other: &Self) -> bool {
		self.as_str() == other.as_str()
	}
}

static DEFAULT_TOLERANCES: LazyLock<Vec<RateTolerance>> =
	LazyLock::new(RateTolerance::compile_defaults);

/// Error-rate thresholds (percent) for a set of response codes.
#[derive(Clone, Debug, PartialEq)]
pub struct RateTolerance {
	/// Response codes counted as errors.
	pub code: Pattern,
	/// Percentage above which the entity is degraded.
	pub degraded: f64,
	/// Percentage at or above which the entity has failed.
	pub failure: f64,
	/// Protocols the tolerance applies to.
	pub protocol: Pattern,
	/// `inbound`, `outbound` or both.
	pub direction: Pattern,
}

impl RateTolerance {
	fn new(
		code: &str,
		degraded: f64,
		failure: f64,
		protocol: &str,
		direction: &str,
	) -> Result<Self, regex::Error> {
		Ok(Self {
			code: Pattern::new(code)?,
			degraded,
			failure,
			protocol: Pattern::new(protocol)?,
			direction: Pattern::new(direction)?,
		})
	}

	/// Tolerances applied when an entity has no rate annotation.
	pub fn defaults() -> Vec<RateTolerance> {
		DEFAULT_TOLERANCES.clone()
	}

	fn compile_defaults() -> Vec<RateTolerance> {
		[
			("^5XX$", 0.0, 10.0, "http"),
			("^4XX$", 10.0, 20.0, "http"),
			("^[1-9]$|^1[0-6]$", 0.0, 10.0, "grpc"),
			("^-$", 0.0, 10.0, "http|grpc"),
		]
		.into_iter()
		.filter_map(|(code, degraded, failure, protocol)| {
			RateTolerance::new(code, degraded, failure, protocol, ".*").ok()
		})
		.collect()
	}

	/// Parse a rate annotation: `;`-separated `code,degraded,failure,protocol,direction`.
	///
	/// Malformed entries, including invalid expressions, are skipped; `None`
	/// when nothing usable remains.
	pub fn parse_annotation(value: &str) -> Option<Vec<RateTolerance>> {
		let parsed: Vec<_> = value
			.split(';')
			.filter_map(|entry| {
				let fields: Vec<&str> = entry.split(',').map(str::trim).collect();
				let [code, degraded, failure, rest @ ..] = fields.as_slice() else {
					return None;
				};
				if code.is_empty() {
					return None;
				}
				let field = |i: usize| rest.get(i).copied().filter(|f| !f.is_empty()).unwrap_or(".*");
				match RateTolerance::new(
					code,
					degraded.parse().ok()?,
					failure.parse().ok()?,
					field(0),
					field(1),
				) {
					Ok(tolerance) => Some(tolerance),
					Err(e) => {
						debug!("mesh-graph: skipping rate tolerance `{}`: {}", entry, e);
						None
					}
				}
			})
			.collect();
		(!parsed.is_empty()).then_some(parsed)
	}

	fn evaluate(&self, direction: &str, rates: &ProtocolRates) -> HealthStatus {
		if !self.direction.matches(direction) {
			return HealthStatus::NotAvailable;
		}
		let mut worst = HealthStatus::NotAvailable;
		for (protocol, codes) in rates {
			if !self.protocol.matches(protocol) {
				continue;
			}
			let total: f64 = codes.values().sum();
			if total <= 0.0 {
				continue;
			}
			let errors: f64 = codes
				.iter()
				.filter(|(code, _)| self.code.matches(code))
				.map(|(_, rate)| rate)
				.sum();
			let pct = errors / total * 100.0;
			let status = if pct >= self.failure {
				HealthStatus::Failure
			} else if pct > self.degraded {
				HealthStatus::Degraded
			} else {
				HealthStatus::Healthy
			};
			worst = worst.max(status);
		}
		worst
	}
}

/// Status of a bare error percentage against the default HTTP 5xx thresholds.
pub fn error_rate_status(percent_err: Option<f64>) -> HealthStatus {
	match percent_err {
		None => HealthStatus::NotAvailable,
		Some(pct) if pct >= 10.0 => HealthStatus::Failure,
		Some(pct) if pct > 0.0 => HealthStatus::Degraded,
		Some(_) => HealthStatus::Healthy,
	}
}

impl EntityHealth {
	/// Tolerances for this entity: its rate annotation, else `extra` annotations, else defaults.
	fn tolerances(&self, extra: Option<&HashMap<String, String>>) -> Vec<RateTolerance> {
		self.requests
			.health_annotations
			.get(RATE_HEALTH_ANNOTATION)
			.or_else(|| extra.and_then(|a| a.get(RATE_HEALTH_ANNOTATION)))
			.and_then(|v| RateTolerance::parse_annotation(v))
			.unwrap_or_else(RateTolerance::defaults)
	}

	/// Worst status across replica checks and request error rates.
	///
	/// `annotations` supplies rate tolerances when the health payload itself
	/// carries none (the graph attaches them to nodes separately).
	pub fn status(&self, annotations: Option<&HashMap<String, String>>) -> HealthStatus {
		let mut worst = HealthStatus::NotAvailable;

		for ws in self.workload_status.iter().chain(&self.workload_statuses) {
			worst = worst.max(ws.status());
		}

		let mut request_status = HealthStatus::NotAvailable;
		for tol in self.tolerances(annotations) {
			let status = tol
				.evaluate("inbound", &self.requests.inbound)
				.max(tol.evaluate("outbound", &self.requests.outbound));
			request_status = request_status.max(status);
		}
		worst.max(request_status)
	}
}

/// Health status per graph node id.
///
/// Supplied to decoration separately from the graph payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthMap(BTreeMap<String, HealthStatus>);

impl HealthMap {
	/// Empty map: every node resolves to `NA` unless it embeds health data.
	pub fn new() -> Self {
		Self::default()
	}

	/// Status for `node_id`, if known.
	pub fn get(&self, node_id: &str) -> Option<HealthStatus> {
		self.0.get(node_id).copied()
	}

	/// Record a status for a node.
	pub fn insert(&mut self, node_id: impl Into<String>, status: HealthStatus) {
		self.0.insert(node_id.into(), status);
	}

	/// Number of nodes with a status.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// True when no node has a status.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Map entity-keyed health from one namespace onto the payload's node ids.
	///
	/// Nodes of other namespaces or other kinds are left untouched.
	pub fn resolve(
		&mut self,
		payload: &RawGraphPayload,
		namespace: &str,
		kind: HealthKind,
		health: &NamespaceHealth,
	) {
		for node in payload.nodes().filter(|n| n.namespace == namespace) {
			let Some(entity) = kind.entity_name(node).and_then(|name| health.get(name)) else {
				continue;
			};
			self.insert(node.id.clone(), entity.status(node.has_health_config.as_ref()));
		}
	}
}

impl<K: Into<String>> FromIterator<(K, HealthStatus)> for HealthMap {
	fn from_iter<I: IntoIterator<Item = (K, HealthStatus)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
	}
}
