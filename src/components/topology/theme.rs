//! Visual theming for the topology canvas.
//!
//! Node fill and edge stroke colors come from health status; the rest of the
//! theme covers background, label and badge styling.

use crate::graph::HealthStatus;

/// RGBA color representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: f64,
}

impl Color {
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b, a: 1.0 }
	}

	pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
		Self { r, g, b, a }
	}

	pub fn with_alpha(self, a: f64) -> Self {
		Self { a, ..self }
	}

	/// Lighten towards white (0.0 = unchanged, 1.0 = white).
	pub fn lighten(self, factor: f64) -> Self {
		let f = factor.clamp(0.0, 1.0);
		let up = |c: u8| (c as f64 + (255.0 - c as f64) * f) as u8;
		Self {
			r: up(self.r),
			g: up(self.g),
			b: up(self.b),
			a: self.a,
		}
	}

	/// Darken towards black (0.0 = unchanged, 1.0 = black).
	pub fn darken(self, factor: f64) -> Self {
		let f = 1.0 - factor.clamp(0.0, 1.0);
		let down = |c: u8| (c as f64 * f) as u8;
		Self {
			r: down(self.r),
			g: down(self.g),
			b: down(self.b),
			a: self.a,
		}
	}

	pub fn to_css(self) -> String {
		if (self.a - 1.0).abs() < 0.001 {
			format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
		} else {
			format!("rgba({}, {}, {}, {:.3})", self.r, self.g, self.b, self.a)
		}
	}
}

impl Default for Color {
	fn default() -> Self {
		Color::rgb(128, 128, 128)
	}
}

/// One color per health status.
#[derive(Clone, Debug, PartialEq)]
pub struct HealthPalette {
	pub healthy: Color,
	pub degraded: Color,
	pub failure: Color,
	pub not_ready: Color,
	pub unknown: Color,
}

impl HealthPalette {
	pub fn color(&self, status: HealthStatus) -> Color {
		match status {
			HealthStatus::Healthy => self.healthy,
			HealthStatus::Degraded => self.degraded,
			HealthStatus::Failure => self.failure,
			HealthStatus::NotReady => self.not_ready,
			HealthStatus::NotAvailable => self.unknown,
		}
	}
}

impl Default for HealthPalette {
	fn default() -> Self {
		Self {
			healthy: Color::rgb(62, 134, 53),
			degraded: Color::rgb(240, 171, 0),
			failure: Color::rgb(201, 25, 11),
			not_ready: Color::rgb(106, 110, 115),
			unknown: Color::rgb(94, 129, 172),
		}
	}
}

/// Complete visual theme.
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
	pub name: &'static str,
	pub background: Color,
	/// Secondary color for the radial background gradient; `None` draws flat.
	pub background_glow: Option<Color>,
	pub health: HealthPalette,
	/// Stroke for edges without traffic information.
	pub edge: Color,
	pub label: Color,
	pub badge: Color,
	/// Ring drawn around unused or sidecar-less nodes.
	pub warning_ring: Color,
	/// Fill nodes with a lighten/darken radial gradient.
	pub node_gradient: bool,
}

impl Theme {
	/// Dark slate theme (default).
	pub fn default_theme() -> Self {
		Self {
			name: "default",
			background: Color::rgb(22, 27, 34),
			background_glow: Some(Color::rgb(30, 35, 42)),
			health: HealthPalette::default(),
			edge: Color::rgba(140, 160, 180, 0.5),
			label: Color::rgba(255, 255, 255, 0.85),
			badge: Color::rgb(255, 255, 255),
			warning_ring: Color::rgb(240, 171, 0),
			node_gradient: true,
		}
	}

	/// Deeper background, softer edges.
	pub fn midnight() -> Self {
		Self {
			name: "midnight",
			background: Color::rgb(18, 20, 28),
			background_glow: Some(Color::rgb(25, 28, 38)),
			edge: Color::rgba(100, 120, 150, 0.45),
			..Self::default_theme()
		}
	}

	/// Flat fills and no gradients.
	pub fn minimal() -> Self {
		Self {
			name: "minimal",
			background: Color::rgb(25, 28, 35),
			background_glow: None,
			edge: Color::rgba(130, 145, 165, 0.4),
			node_gradient: false,
			..Self::default_theme()
		}
	}

	/// Look a theme up by name.
	pub fn by_name(name: &str) -> Option<Self> {
		match name {
			"default" => Some(Self::default_theme()),
			"midnight" => Some(Self::midnight()),
			"minimal" => Some(Self::minimal()),
			_ => None,
		}
	}

	/// Edge stroke: health color when the edge carries error information.
	pub fn edge_color(&self, status: HealthStatus) -> Color {
		match status {
			HealthStatus::NotAvailable => self.edge,
			other => self.health.color(other).with_alpha(self.edge.a.max(0.6)),
		}
	}
}

impl Default for Theme {
	fn default() -> Self {
		Self::default_theme()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn css_output() {
		assert_eq!(Color::rgb(255, 0, 16).to_css(), "#ff0010");
		assert_eq!(Color::rgba(1, 2, 3, 0.5).to_css(), "rgba(1, 2, 3, 0.500)");
		assert_eq!(Color::rgb(100, 100, 100).lighten(1.0), Color::rgb(255, 255, 255));
		assert_eq!(Color::rgb(100, 100, 100).darken(1.0), Color::rgb(0, 0, 0));
	}

	#[test]
	fn themes_by_name() {
		assert_eq!(Theme::by_name("minimal").unwrap().name, "minimal");
		assert!(!Theme::by_name("minimal").unwrap().node_gradient);
		assert!(Theme::by_name("neon").is_none());
	}

	#[test]
	fn edge_color_tracks_health() {
		let theme = Theme::default();
		assert_eq!(theme.edge_color(HealthStatus::NotAvailable), theme.edge);
		assert_eq!(
			theme.edge_color(HealthStatus::Failure).r,
			theme.health.failure.r
		);
	}
}
