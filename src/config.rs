//! Application configuration, embedded in the host page as JSON.
//!
//! ```html
//! <script id="mesh-graph-config" type="application/json">
//!   { "apiBase": "/api", "query": { "namespaces": [{ "name": "bookinfo" }] } }
//! </script>
//! ```
//!
//! Every field is optional; a missing or malformed element yields defaults.

use log::{info, warn};
use serde::Deserialize;

use crate::dom;
use crate::error::ConfigError;
use crate::graph::{GraphQuery, Namespace};

/// Id of the config script element.
pub const CONFIG_ELEMENT_ID: &str = "mesh-graph-config";

/// Where topology comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
	/// Live API under `api_base`.
	#[default]
	Http,
	/// Snapshot document in the `graph-data` script element.
	Snapshot,
}

/// Runtime settings for the viewer.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
	/// Base URL of the API, without trailing slash.
	pub api_base: String,
	/// Data source selection.
	pub source: SourceKind,
	/// Id of the snapshot script element, for [`SourceKind::Snapshot`].
	pub snapshot_element: String,
	/// Initial query.
	pub query: GraphQuery,
	/// Seconds between automatic refreshes; 0 disables them.
	pub refresh_interval: u64,
	/// Look up namespace health after each graph fetch.
	pub fetch_health: bool,
	/// Theme name (`default`, `midnight`, `minimal`).
	pub theme: String,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			api_base: "/api".into(),
			source: SourceKind::default(),
			snapshot_element: "graph-data".into(),
			query: GraphQuery {
				namespaces: vec![Namespace::new("default")],
				..GraphQuery::default()
			},
			refresh_interval: 15,
			fetch_health: true,
			theme: "default".into(),
		}
	}
}

/// Characters that would corrupt the query string if they appeared in a namespace.
const FORBIDDEN_NAMESPACE_CHARS: &[char] = &['&', ',', '/', '?', '#', '=', '%'];

impl AppConfig {
	/// Parse and validate a config document.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let value: serde_json::Value = serde_json::from_str(json)?;
		if !value.is_object() {
			return Err(ConfigError::Invalid {
				field: "<root>",
				reason: "expected a JSON object".into(),
			});
		}
		let config: AppConfig = serde_json::from_value(value)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.query.namespaces.is_empty() {
			return Err(ConfigError::Invalid {
				field: "query.namespaces",
				reason: "at least one namespace is required".into(),
			});
		}
		if let Some(ns) = self.query.namespaces.iter().find(|ns| {
			ns.name.is_empty()
				|| ns
					.name
					.chars()
					.any(|c| c.is_whitespace() || FORBIDDEN_NAMESPACE_CHARS.contains(&c))
		}) {
			return Err(ConfigError::Invalid {
				field: "query.namespaces",
				reason: format!("`{}` is not a namespace name", ns.name),
			});
		}
		if self.query.duration == 0 {
			return Err(ConfigError::Invalid {
				field: "query.duration",
				reason: "must be positive".into(),
			});
		}
		Ok(())
	}
}

/// Load the config from the page, falling back to defaults.
pub fn load_app_config() -> AppConfig {
	let Some(json) = dom::script_text(CONFIG_ELEMENT_ID) else {
		info!("mesh-graph: no #{CONFIG_ELEMENT_ID} element, using defaults");
		return AppConfig::default();
	};
	match AppConfig::from_json(&json) {
		Ok(config) => {
			info!(
				"mesh-graph: config loaded ({:?} source, namespaces [{}])",
				config.source,
				config.query.namespace_list()
			);
			config
		}
		Err(e) => {
			warn!("mesh-graph: ignoring config: {}", e);
			AppConfig::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::{EdgeLabelMode, GraphType};

	#[test]
	fn empty_document_is_defaults() {
		assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
	}

	#[test]
	fn partial_document_keeps_other_defaults() {
		let config = AppConfig::from_json(
			r#"{
				"source": "snapshot",
				"refreshInterval": 0,
				"query": {
					"namespaces": [{"name": "ISTIO_SYSTEM"}],
					"graphType": "workload",
					"edgeLabelMode": "responseTime",
					"showSecurity": true
				}
			}"#,
		)
		.unwrap();

		assert_eq!(config.source, SourceKind::Snapshot);
		assert_eq!(config.refresh_interval, 0);
		assert_eq!(config.api_base, "/api");
		assert_eq!(config.query.graph_type, GraphType::Workload);
		assert_eq!(config.query.edge_label_mode, EdgeLabelMode::ResponseTime);
		assert!(config.query.show_security);
		assert!(config.query.inject_service_nodes);
		assert_eq!(config.query.duration, 60);
	}

	#[test]
	fn rejects_unusable_values() {
		assert!(matches!(
			AppConfig::from_json(r#"{"query": {"namespaces": []}}"#),
			Err(ConfigError::Invalid { field: "query.namespaces", .. })
		));
		assert!(matches!(
			AppConfig::from_json(r#"{"query": {"namespaces": [{"name": "a&b"}]}}"#),
			Err(ConfigError::Invalid { .. })
		));
		assert!(matches!(
			AppConfig::from_json(r#"{"query": {"namespaces": [{"name": "a"}], "duration": 0}}"#),
			Err(ConfigError::Invalid { field: "query.duration", .. })
		));
		assert!(matches!(AppConfig::from_json("{"), Err(ConfigError::Parse(_))));
	}

	#[test]
	fn root_must_be_an_object() {
		for json in ["[]", r#"["x"]"#, "42", "null"] {
			assert!(
				matches!(AppConfig::from_json(json), Err(ConfigError::Invalid { field: "<root>", .. })),
				"{json}"
			);
		}
	}
}
