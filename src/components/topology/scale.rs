//! Zoom-dependent sizing for canvas elements.
//!
//! Sizes are either world-space (grow with zoom) or screen-space (constant
//! pixels). [`ScaledValues`] resolves every size for the current zoom level
//! `k` once per frame, in world units ready to use after the canvas transform.

/// How a size reacts to zoom.
#[derive(Clone, Debug)]
pub enum ScaleBehavior {
	/// Constant screen size in pixels.
	Screen,
	/// World-space size kept within `[min_screen, max_screen]` pixels.
	Clamped { min_screen: f64, max_screen: f64 },
}

impl ScaleBehavior {
	/// World-space value for `base` at zoom `k`.
	pub fn apply(&self, base: f64, k: f64) -> f64 {
		match self {
			ScaleBehavior::Screen => base / k,
			ScaleBehavior::Clamped {
				min_screen,
				max_screen,
			} => base.clamp(min_screen / k, max_screen / k),
		}
	}
}

/// Linear fade between two zoom levels: 0 at `hidden_k`, 1 at `visible_k`.
#[derive(Clone, Debug)]
pub struct ZoomFade {
	pub hidden_k: f64,
	pub visible_k: f64,
}

impl ZoomFade {
	pub fn apply(&self, k: f64) -> f64 {
		if (self.visible_k - self.hidden_k).abs() < f64::EPSILON {
			return 1.0;
		}
		((k - self.hidden_k) / (self.visible_k - self.hidden_k)).clamp(0.0, 1.0)
	}
}

/// Base sizes and their zoom behavior.
#[derive(Clone, Debug)]
pub struct ScaleConfig {
	pub node_radius: f64,
	pub node_behavior: ScaleBehavior,
	/// Hit radius for hover and drag, in world units.
	pub hit_radius: f64,
	/// Node label size in screen pixels.
	pub label_size: f64,
	/// Below this zoom the label font stops shrinking.
	pub label_min_k: f64,
	/// Edge label size in screen pixels.
	pub edge_label_size: f64,
	pub edge_label_fade: ZoomFade,
	/// Edge stroke width in screen pixels.
	pub edge_width: f64,
	/// Dash pattern (dash, gap) for traffic animation, world units.
	pub dash_pattern: (f64, f64),
	/// Dash flow speed, world units per second.
	pub flow_speed: f64,
	pub arrow_size: f64,
	pub arrow_behavior: ScaleBehavior,
	/// Ring width for hover and warning rings, screen pixels.
	pub ring_width: f64,
}

impl Default for ScaleConfig {
	fn default() -> Self {
		Self {
			node_radius: 9.0,
			node_behavior: ScaleBehavior::Clamped {
				min_screen: 5.0,
				max_screen: f64::INFINITY,
			},
			hit_radius: 12.0,
			label_size: 10.0,
			label_min_k: 0.5,
			edge_label_size: 9.0,
			edge_label_fade: ZoomFade {
				hidden_k: 0.5,
				visible_k: 0.9,
			},
			edge_width: 1.5,
			dash_pattern: (8.0, 4.0),
			flow_speed: 12.0,
			arrow_size: 6.0,
			arrow_behavior: ScaleBehavior::Clamped {
				min_screen: 3.0,
				max_screen: 18.0,
			},
			ring_width: 1.5,
		}
	}
}

/// Sizes resolved for one zoom level, in world units.
#[derive(Clone, Debug)]
pub struct ScaledValues {
	pub k: f64,
	pub node_radius: f64,
	pub hit_radius: f64,
	pub label_font: String,
	pub badge_font: String,
	pub edge_label_font: String,
	/// Edge label opacity multiplier; labels are skipped at 0.
	pub edge_label_alpha: f64,
	pub edge_width: f64,
	pub dash_pattern: (f64, f64),
	pub arrow_size: f64,
	pub ring_width: f64,
}

impl ScaledValues {
	pub fn new(config: &ScaleConfig, k: f64) -> Self {
		let node_radius = config.node_behavior.apply(config.node_radius, k);
		let label_px = config.label_size / k.max(config.label_min_k);
		let edge_label_px = config.edge_label_size / k.max(config.label_min_k);

		Self {
			k,
			node_radius,
			hit_radius: config.hit_radius.max(node_radius),
			label_font: format!("{label_px}px sans-serif"),
			badge_font: format!("bold {}px sans-serif", node_radius * 0.9),
			edge_label_font: format!("{edge_label_px}px sans-serif"),
			edge_label_alpha: config.edge_label_fade.apply(k),
			edge_width: config.edge_width / k,
			dash_pattern: config.dash_pattern,
			arrow_size: config.arrow_behavior.apply(config.arrow_size, k),
			ring_width: config.ring_width / k,
		}
	}

	/// Dash offset for the traffic flow animation at `flow_time` seconds.
	pub fn dash_offset(&self, flow_time: f64, flow_speed: f64) -> f64 {
		-flow_time * flow_speed
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clamped_sizes_respect_screen_bounds() {
		let behavior = ScaleBehavior::Clamped {
			min_screen: 5.0,
			max_screen: 20.0,
		};
		// zoomed far out: 9 world units would be 0.9px, clamp to 5px
		assert!((behavior.apply(9.0, 0.1) - 50.0).abs() < 1e-9);
		// zoomed far in: 9 world units would be 90px, clamp to 20px
		assert!((behavior.apply(9.0, 10.0) - 2.0).abs() < 1e-9);
		assert_eq!(behavior.apply(9.0, 1.0), 9.0);
		assert_eq!(ScaleBehavior::Screen.apply(4.0, 2.0), 2.0);
	}

	#[test]
	fn edge_labels_fade_out_when_zoomed_out() {
		let config = ScaleConfig::default();
		assert_eq!(ScaledValues::new(&config, 0.3).edge_label_alpha, 0.0);
		assert_eq!(ScaledValues::new(&config, 1.0).edge_label_alpha, 1.0);
		let mid = ScaledValues::new(&config, 0.7).edge_label_alpha;
		assert!(mid > 0.0 && mid < 1.0);
	}
}
