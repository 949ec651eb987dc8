//! Canvas rendering for the topology view.
//!
//! Passes, back to front:
//! 1. Background (screen space)
//! 2. Edges with arrows, then edge labels (world space)
//! 3. Dimmed nodes, then highlighted nodes on top

use std::collections::HashMap;
use std::f64::consts::PI;

use force_graph::DefaultNodeIdx;
use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::scale::{ScaleConfig, ScaledValues};
use super::state::{EdgeView, NodeInfo, TopologyState};
use super::theme::{Color, Theme};

fn smooth_step(t: f64) -> f64 {
	t * t * (3.0 - 2.0 * t)
}

/// Draw one frame.
pub fn render(
	state: &TopologyState,
	ctx: &CanvasRenderingContext2d,
	config: &ScaleConfig,
	theme: &Theme,
) {
	let scale = ScaledValues::new(config, state.transform.k);

	draw_background(state, ctx, theme);

	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);

	let positions = state.positions();
	draw_edges(state, ctx, config, &scale, &positions);
	if scale.edge_label_alpha > 0.0 {
		draw_edge_labels(state, ctx, &scale, theme, &positions);
	}
	draw_nodes(state, ctx, &scale, theme);

	ctx.restore();
}

fn draw_background(state: &TopologyState, ctx: &CanvasRenderingContext2d, theme: &Theme) {
	let gradient = theme.background_glow.and_then(|glow| {
		let gradient = ctx
			.create_radial_gradient(
				state.width / 2.0,
				state.height / 2.0,
				0.0,
				state.width / 2.0,
				state.height / 2.0,
				state.width.max(state.height) * 0.8,
			)
			.ok()?;
		gradient.add_color_stop(0.0, &glow.to_css()).ok()?;
		gradient.add_color_stop(1.0, &theme.background.to_css()).ok()?;
		Some(gradient)
	});

	match gradient {
		Some(gradient) => {
			#[allow(deprecated)]
			ctx.set_fill_style(&gradient);
		}
		None => ctx.set_fill_style_str(&theme.background.to_css()),
	}
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
}

/// Opacity multiplier for an edge given the current hover highlight.
fn edge_emphasis(state: &TopologyState, edge: &EdgeView) -> f64 {
	if !state.highlight.is_active() {
		return 1.0;
	}
	let t = smooth_step(state.highlight.intensity);
	let touches_hover = state.highlight.hovered.is_some_and(|h| h == edge.source || h == edge.target);
	if touches_hover { 1.0 } else { 1.0 - 0.75 * t }
}

/// Endpoints trimmed to the node circles, plus the unit direction.
fn edge_segment(
	positions: &HashMap<DefaultNodeIdx, (f64, f64)>,
	edge: &EdgeView,
	radius: f64,
) -> Option<((f64, f64), (f64, f64), (f64, f64))> {
	let &(x1, y1) = positions.get(&edge.source)?;
	let &(x2, y2) = positions.get(&edge.target)?;
	let (dx, dy) = (x2 - x1, y2 - y1);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < radius * 2.0 {
		return None;
	}
	let (ux, uy) = (dx / dist, dy / dist);
	Some((
		(x1 + ux * radius, y1 + uy * radius),
		(x2 - ux * radius, y2 - uy * radius),
		(ux, uy),
	))
}

fn draw_edges(
	state: &TopologyState,
	ctx: &CanvasRenderingContext2d,
	config: &ScaleConfig,
	scale: &ScaledValues,
	positions: &HashMap<DefaultNodeIdx, (f64, f64)>,
) {
	let dash_offset = scale.dash_offset(state.flow_time, config.flow_speed);
	let dash = js_sys::Array::of2(
		&JsValue::from_f64(scale.dash_pattern.0),
		&JsValue::from_f64(scale.dash_pattern.1),
	);
	let solid = js_sys::Array::new();

	for edge in &state.edges {
		let Some(((sx, sy), (tx, ty), (ux, uy))) = edge_segment(positions, edge, scale.node_radius)
		else {
			continue;
		};
		let color = edge.color.with_alpha(edge.color.a * edge_emphasis(state, edge));

		// mTLS edges are solid; plain traffic flows as moving dashes.
		if edge.has_traffic && !edge.secure {
			let _ = ctx.set_line_dash(&dash);
			ctx.set_line_dash_offset(dash_offset);
		} else {
			let _ = ctx.set_line_dash(&solid);
		}
		ctx.set_stroke_style_str(&color.to_css());
		ctx.set_line_width(if edge.secure {
			scale.edge_width * 1.6
		} else {
			scale.edge_width
		});

		let (back_x, back_y) = (tx - ux * scale.arrow_size, ty - uy * scale.arrow_size);
		ctx.begin_path();
		ctx.move_to(sx, sy);
		ctx.line_to(back_x, back_y);
		ctx.stroke();

		let _ = ctx.set_line_dash(&solid);
		let (px, py) = (-uy * scale.arrow_size * 0.5, ux * scale.arrow_size * 0.5);
		ctx.set_fill_style_str(&color.to_css());
		ctx.begin_path();
		ctx.move_to(tx, ty);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();
	}

	let _ = ctx.set_line_dash(&solid);
}

fn draw_edge_labels(
	state: &TopologyState,
	ctx: &CanvasRenderingContext2d,
	scale: &ScaledValues,
	theme: &Theme,
	positions: &HashMap<DefaultNodeIdx, (f64, f64)>,
) {
	ctx.set_font(&scale.edge_label_font);
	ctx.set_text_align("center");
	for edge in &state.edges {
		let Some(label) = &edge.label else {
			continue;
		};
		let (Some(&(x1, y1)), Some(&(x2, y2))) = (positions.get(&edge.source), positions.get(&edge.target))
		else {
			continue;
		};
		let alpha = scale.edge_label_alpha * edge_emphasis(state, edge);
		ctx.set_fill_style_str(&theme.label.with_alpha(theme.label.a * alpha).to_css());
		let _ = ctx.fill_text(label, (x1 + x2) / 2.0, (y1 + y2) / 2.0 - 2.0 / scale.k);
	}
	ctx.set_text_align("start");
}

fn draw_nodes(
	state: &TopologyState,
	ctx: &CanvasRenderingContext2d,
	scale: &ScaledValues,
	theme: &Theme,
) {
	let t = smooth_step(state.highlight.intensity);
	let active = state.highlight.is_active();

	// Pass 1: nodes outside the highlight, dimmed while something is hovered
	state.graph.visit_nodes(|node| {
		if active && state.highlight.contains(node.index()) {
			return;
		}
		let alpha = if active { 1.0 - 0.7 * t } else { 1.0 };
		let (x, y) = (node.x() as f64, node.y() as f64);
		draw_node(ctx, x, y, &node.data.user_data, scale, theme, alpha, 1.0);
	});

	if !active {
		return;
	}

	// Pass 2: hovered node and its neighbours on top
	state.graph.visit_nodes(|node| {
		let idx = node.index();
		if !state.highlight.contains(idx) {
			return;
		}
		let (x, y) = (node.x() as f64, node.y() as f64);
		let info = &node.data.user_data;
		let hovered = state.highlight.hovered == Some(idx);
		let grow = if hovered { 1.0 + 0.3 * t } else { 1.0 + 0.15 * t };
		draw_node(ctx, x, y, info, scale, theme, 1.0, grow);

		if hovered {
			let radius = scale.node_radius * info.size * grow;
			ctx.begin_path();
			let _ = ctx.arc(x, y, radius + scale.ring_width * 3.0, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str(&Color::rgba(255, 255, 255, 0.8 * t).to_css());
			ctx.set_line_width(scale.ring_width);
			ctx.stroke();
		}
	});
}

#[allow(clippy::too_many_arguments)]
fn draw_node(
	ctx: &CanvasRenderingContext2d,
	x: f64,
	y: f64,
	info: &NodeInfo,
	scale: &ScaledValues,
	theme: &Theme,
	alpha: f64,
	grow: f64,
) {
	let radius = scale.node_radius * info.size * grow;
	ctx.set_global_alpha(alpha);

	let gradient = theme
		.node_gradient
		.then(|| {
			let gradient = ctx
				.create_radial_gradient(x - radius * 0.3, y - radius * 0.3, 0.0, x, y, radius)
				.ok()?;
			gradient.add_color_stop(0.0, &info.color.lighten(0.4).to_css()).ok()?;
			gradient.add_color_stop(0.7, &info.color.to_css()).ok()?;
			gradient.add_color_stop(1.0, &info.color.darken(0.2).to_css()).ok()?;
			Some(gradient)
		})
		.flatten();

	ctx.begin_path();
	let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
	match gradient {
		Some(gradient) => {
			#[allow(deprecated)]
			ctx.set_fill_style(&gradient);
		}
		None => ctx.set_fill_style_str(&info.color.to_css()),
	}
	ctx.fill();

	if info.warn {
		ctx.begin_path();
		let _ = ctx.arc(x, y, radius + scale.ring_width, 0.0, 2.0 * PI);
		ctx.set_stroke_style_str(&theme.warning_ring.to_css());
		ctx.set_line_width(scale.ring_width);
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(radius * 0.4),
			&JsValue::from_f64(radius * 0.25),
		));
		ctx.stroke();
		let _ = ctx.set_line_dash(&js_sys::Array::new());
	}

	ctx.set_fill_style_str(&theme.badge.to_css());
	ctx.set_font(&scale.badge_font);
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	let _ = ctx.fill_text(info.badge, x, y);
	ctx.set_text_align("start");
	ctx.set_text_baseline("alphabetic");

	if alpha > 0.5 {
		ctx.set_fill_style_str(&theme.label.to_css());
		ctx.set_font(&scale.label_font);
		let line_height = scale.node_radius * 1.2;
		for (i, line) in info.label.lines().enumerate() {
			let _ = ctx.fill_text(line, x + radius + 4.0 / scale.k, y + 3.0 / scale.k + i as f64 * line_height);
		}
	}

	ctx.set_global_alpha(1.0);
}
