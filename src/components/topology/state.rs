//! Simulation state for the topology canvas.
//!
//! Wraps the `force_graph` simulation with per-node display data built from a
//! [`DisplayGraphModel`], the pan/zoom transform, drag/pan tracking and hover
//! highlighting. A new model replaces the simulation wholesale; nodes whose id
//! survives keep their position so refreshes do not reshuffle the layout.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};

use super::scale::{ScaleConfig, ScaledValues};
use super::theme::{Color, Theme};
use crate::graph::{DisplayGraphModel, HealthStatus};

/// Per-node display data carried through the simulation.
#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
	pub id: String,
	pub label: String,
	pub badge: &'static str,
	pub color: Color,
	pub health: HealthStatus,
	/// Draw a warning ring (unused node or missing sidecar).
	pub warn: bool,
	/// Size multiplier from inbound traffic share.
	pub size: f64,
}

/// Edge display data, indexed by simulation node indices.
#[derive(Clone, Debug)]
pub struct EdgeView {
	pub source: DefaultNodeIdx,
	pub target: DefaultNodeIdx,
	pub label: Option<String>,
	pub color: Color,
	/// Solid (mTLS) rather than dashed stroke.
	pub secure: bool,
	/// Animate dashes along the edge.
	pub has_traffic: bool,
}

/// Pan and zoom transform applied to the whole view.
#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	/// Zoom factor, clamped to 0.1..10.0.
	pub k: f64,
}

/// An in-progress node drag.
#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub node_idx: Option<DefaultNodeIdx>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f32,
	pub node_start_y: f32,
}

/// An in-progress canvas pan.
#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// Hovered node plus its neighbours, with an eased intensity for fading.
#[derive(Clone, Debug, Default)]
pub struct Highlight {
	pub hovered: Option<DefaultNodeIdx>,
	members: HashSet<DefaultNodeIdx>,
	/// 0.0 = nothing highlighted, 1.0 = fully highlighted.
	pub intensity: f64,
}

impl Highlight {
	fn set(&mut self, node: Option<DefaultNodeIdx>, edges: &[EdgeView]) {
		if self.hovered == node {
			return;
		}
		self.hovered = node;
		let Some(idx) = node else {
			return;
		};
		self.members.clear();
		self.members.insert(idx);
		for e in edges {
			if e.source == idx {
				self.members.insert(e.target);
			} else if e.target == idx {
				self.members.insert(e.source);
			}
		}
	}

	/// Ease intensity towards 1 while hovering, towards 0 otherwise.
	fn tick(&mut self, dt: f64) {
		const SPEED: f64 = 6.0;
		let target = if self.hovered.is_some() { 1.0 } else { 0.0 };
		self.intensity += (target - self.intensity) * (1.0 - (-SPEED * dt).exp());
		if self.intensity < 0.005 && self.hovered.is_none() {
			self.intensity = 0.0;
			self.members.clear();
		}
	}

	pub fn contains(&self, idx: DefaultNodeIdx) -> bool {
		self.members.contains(&idx)
	}

	pub fn is_active(&self) -> bool {
		self.intensity > 0.01
	}
}

/// Layout and interaction state for one model.
pub struct TopologyState {
	pub graph: ForceGraph<NodeInfo, ()>,
	pub edges: Vec<EdgeView>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub highlight: Highlight,
	pub width: f64,
	pub height: f64,
	pub flow_time: f64,
	index: HashMap<String, DefaultNodeIdx>,
}

fn simulation() -> ForceGraph<NodeInfo, ()> {
	ForceGraph::new(SimulationParameters {
		force_charge: 250.0,
		force_spring: 0.05,
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	})
}

impl TopologyState {
	pub fn new(model: &DisplayGraphModel, width: f64, height: f64, theme: &Theme) -> Self {
		let mut state = Self {
			graph: simulation(),
			edges: Vec::new(),
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			highlight: Highlight::default(),
			width,
			height,
			flow_time: 0.0,
			index: HashMap::new(),
		};
		state.load(model, theme, &HashMap::new());
		state
	}

	/// Swap in a new model, keeping positions of nodes that are still present.
	pub fn replace_model(&mut self, model: &DisplayGraphModel, theme: &Theme) {
		let mut previous = HashMap::new();
		self.graph.visit_nodes(|node| {
			previous.insert(
				node.data.user_data.id.clone(),
				(node.x(), node.y(), node.data.is_anchor),
			);
		});

		self.graph = simulation();
		self.edges.clear();
		self.index.clear();
		self.drag = DragState::default();
		self.highlight = Highlight::default();
		self.load(model, theme, &previous);
	}

	fn load(
		&mut self,
		model: &DisplayGraphModel,
		theme: &Theme,
		previous: &HashMap<String, (f32, f32, bool)>,
	) {
		let max_rate = model
			.nodes
			.iter()
			.map(|n| n.rate_in)
			.fold(0.0_f64, f64::max);

		let count = model.nodes.len().max(1) as f64;
		for (i, node) in model.nodes.iter().enumerate() {
			let (x, y, is_anchor) = previous.get(&node.id).copied().unwrap_or_else(|| {
				// New nodes start on a ring around the origin.
				let angle = (i as f64) * 2.0 * PI / count;
				((100.0 * angle.cos()) as f32, (100.0 * angle.sin()) as f32, false)
			});

			// sqrt for softer scaling: 1.0x (idle) to 1.6x (busiest)
			let share = if max_rate > 0.0 {
				(node.rate_in / max_rate).sqrt()
			} else {
				0.0
			};

			let idx = self.graph.add_node(NodeData {
				x,
				y,
				mass: 10.0,
				is_anchor,
				user_data: NodeInfo {
					id: node.id.clone(),
					label: node.label.clone(),
					badge: node.badge.glyph(),
					color: theme.health.color(node.health),
					health: node.health,
					warn: node.is_unused || node.has_missing_sidecar,
					size: 1.0 + 0.6 * share,
				},
			});
			self.index.insert(node.id.clone(), idx);
		}

		// The model guarantees closed edges, but stay total if handed anything else.
		for edge in &model.edges {
			let (Some(&source), Some(&target)) =
				(self.index.get(&edge.source), self.index.get(&edge.target))
			else {
				continue;
			};
			self.graph.add_edge(source, target, EdgeData::default());
			self.edges.push(EdgeView {
				source,
				target,
				label: edge.label.clone(),
				color: theme.edge_color(edge.health),
				secure: edge.is_mtls,
				has_traffic: edge.protocol.is_some(),
			});
		}
	}

	pub fn node_count(&self) -> usize {
		self.index.len()
	}

	/// Simulation index of the node with backend id `id`.
	pub fn node_index(&self, id: &str) -> Option<DefaultNodeIdx> {
		self.index.get(id).copied()
	}

	/// Current world positions by node index.
	pub fn positions(&self) -> HashMap<DefaultNodeIdx, (f64, f64)> {
		let mut positions = HashMap::with_capacity(self.index.len());
		self.graph.visit_nodes(|node| {
			positions.insert(node.index(), (node.x() as f64, node.y() as f64));
		});
		positions
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn node_at_position(&self, sx: f64, sy: f64, config: &ScaleConfig) -> Option<DefaultNodeIdx> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let scale = ScaledValues::new(config, self.transform.k);
		let mut found = None;
		self.graph.visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			if (dx * dx + dy * dy).sqrt() < scale.hit_radius * node.data.user_data.size {
				found = Some(node.index());
			}
		});
		found
	}

	pub fn set_hover(&mut self, node: Option<DefaultNodeIdx>) {
		self.highlight.set(node, &self.edges);
	}

	/// Zoom by `factor` keeping the screen point (`x`, `y`) fixed.
	pub fn zoom_at(&mut self, x: f64, y: f64, factor: f64) {
		let new_k = (self.transform.k * factor).clamp(0.1, 10.0);
		let ratio = new_k / self.transform.k;
		self.transform.x = x - (x - self.transform.x) * ratio;
		self.transform.y = y - (y - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	pub fn tick(&mut self, dt: f32) {
		self.graph.update(dt);
		self.flow_time += dt as f64;
		self.highlight.tick(dt as f64);
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::{
		DecorateOptions, EdgeLabelMode, EdgeTraffic, Element, Elements, HealthMap, NodeType,
		RawEdge, RawGraphPayload, RawNode, decorate,
	};

	fn model(ids: &[&str], edges: &[(&str, &str)], health: &HealthMap) -> DisplayGraphModel {
		let payload = RawGraphPayload {
			elements: Elements {
				nodes: ids
					.iter()
					.map(|id| Element {
						data: RawNode {
							id: id.to_string(),
							node_type: NodeType::Workload,
							workload: Some(id.to_string()),
							..RawNode::default()
						},
					})
					.collect(),
				edges: edges
					.iter()
					.map(|(s, t)| Element {
						data: RawEdge {
							id: format!("{s}-{t}"),
							source: s.to_string(),
							target: t.to_string(),
							traffic: Some(EdgeTraffic {
								protocol: "http".into(),
								rates: [("http".to_string(), "2.0".to_string())].into(),
							}),
							..RawEdge::default()
						},
					})
					.collect(),
			},
			..RawGraphPayload::default()
		};
		let options = DecorateOptions {
			edge_label_mode: EdgeLabelMode::TrafficRate,
			..DecorateOptions::default()
		};
		decorate(&payload, health, &options)
	}

	#[test]
	fn builds_nodes_and_edges_from_model() {
		let health: HealthMap = [("a", HealthStatus::Failure)].into_iter().collect();
		let theme = Theme::default();
		let state = TopologyState::new(&model(&["a", "b", "c"], &[("a", "b")], &health), 800.0, 600.0, &theme);

		assert_eq!(state.node_count(), 3);
		assert_eq!(state.edges.len(), 1);
		assert_eq!(state.edges[0].label.as_deref(), Some("2.00rps"));
		assert!(state.edges[0].has_traffic);

		let mut colors = HashMap::new();
		state.graph.visit_nodes(|n| {
			colors.insert(n.data.user_data.id.clone(), n.data.user_data.color);
		});
		assert_eq!(colors["a"], theme.health.failure);
		assert_eq!(colors["b"], theme.health.unknown);
	}

	#[test]
	fn replacing_model_keeps_surviving_positions() {
		let theme = Theme::default();
		let mut state = TopologyState::new(&model(&["a", "b"], &[], &HealthMap::new()), 800.0, 600.0, &theme);
		let a = state.node_index("a").unwrap();
		state.graph.visit_nodes_mut(|node| {
			if node.index() == a {
				node.data.x = 321.0;
				node.data.y = -12.0;
			}
		});

		state.replace_model(&model(&["c", "a"], &[("c", "a")], &HealthMap::new()), &theme);

		assert_eq!(state.node_count(), 2);
		assert!(state.node_index("b").is_none());
		let a = state.node_index("a").unwrap();
		assert_eq!(state.positions()[&a], (321.0, -12.0));
		assert_eq!(state.edges.len(), 1);
	}

	#[test]
	fn hit_testing_and_hover_neighbours() {
		let theme = Theme::default();
		let mut state = TopologyState::new(
			&model(&["a", "b", "c"], &[("a", "b")], &HealthMap::new()),
			800.0,
			600.0,
			&theme,
		);
		let config = ScaleConfig::default();
		let a = state.node_index("a").unwrap();
		let (ax, ay) = state.positions()[&a];
		let (sx, sy) = (ax + state.transform.x, ay + state.transform.y);

		assert_eq!(state.node_at_position(sx, sy, &config), Some(a));
		assert_eq!(state.node_at_position(-5000.0, -5000.0, &config), None);

		state.set_hover(Some(a));
		assert!(state.highlight.contains(a));
		assert!(state.highlight.contains(state.node_index("b").unwrap()));
		assert!(!state.highlight.contains(state.node_index("c").unwrap()));
	}

	#[test]
	fn zoom_keeps_anchor_point_fixed() {
		let mut state = TopologyState::new(&DisplayGraphModel::default(), 800.0, 600.0, &Theme::default());
		let before = state.screen_to_graph(100.0, 50.0);
		state.zoom_at(100.0, 50.0, 1.1);
		let after = state.screen_to_graph(100.0, 50.0);
		assert!((before.0 - after.0).abs() < 1e-9);
		assert!((before.1 - after.1).abs() < 1e-9);

		for _ in 0..100 {
			state.zoom_at(0.0, 0.0, 1.1);
		}
		assert_eq!(state.transform.k, 10.0);
	}
}
