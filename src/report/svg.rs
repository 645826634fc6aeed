//! Inline SVG dependency graphs for the report.
//!
//! Two modes: a compact vertical chain for single-LB batches without
//! shared dependencies, and a multi-column layout with shared/external
//! colour coding for everything else.

use maud::{Markup, PreEscaped};
use std::collections::HashMap;
use std::fmt::Write;

use crate::api::kind::ResourceKind;
use crate::mover::model::{BatchGraphData, DepKey};

const BOX_H: f64 = 36.0;
const LINE_COLOR: &str = "#90a4ae";
const SHARED_LINE_COLOR: &str = "#e67e22";
const LB_FILL: &str = "#0d6efd";
const DEP_FILL: &str = "#e0f2f1";
const DEP_BORDER: &str = "#26a69a";
const LEAF_FILL: &str = "#f5f5f5";
const LEAF_BORDER: &str = "#9e9e9e";
const SHARED_FILL: &str = "#fef3e8";
const SHARED_BORDER: &str = "#e67e22";
const EXT_FILL: &str = "#fdecea";
const EXT_BORDER: &str = "#dc3545";

fn esc(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn type_short(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::OriginPools => "OP",
        ResourceKind::Healthchecks => "HC",
        ResourceKind::Certificates => "Cert",
        ResourceKind::AppFirewalls => "FW",
        ResourceKind::ServicePolicys => "SP",
        ResourceKind::ApiDefinitions => "API",
        ResourceKind::IpPrefixSets => "IP",
        ResourceKind::RateLimiterPolicys => "RL",
        ResourceKind::UserIdentifications => "UID",
    }
}

/// Short display label for a dependency node, truncated to fit the box.
fn dep_label(dep_key: &DepKey) -> String {
    let short = type_short(dep_key.0);
    let label = format!("{short}: {}", dep_key.1);
    const MAX_LEN: usize = 24;
    if label.len() > MAX_LEN {
        let keep = MAX_LEN.saturating_sub(short.len() + 5);
        format!("{short}: {}...", &dep_key.1[..keep.min(dep_key.1.len())])
    } else {
        label
    }
}

fn svg_open(width: f64, height: f64) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
         style=\"font-family: -apple-system, BlinkMacSystemFont, sans-serif; background: #fff; \
         border: 1px solid #dee2e6; border-radius: 6px; margin-bottom: 1rem;\">"
    )
}

fn arrow_defs() -> String {
    format!(
        "<defs>\
         <marker id=\"arr\" markerWidth=\"8\" markerHeight=\"6\" refX=\"8\" refY=\"3\" \
         orient=\"auto\" markerUnits=\"strokeWidth\">\
         <path d=\"M0,0 L8,3 L0,6\" fill=\"{LINE_COLOR}\" /></marker>\
         <marker id=\"arr-shared\" markerWidth=\"8\" markerHeight=\"6\" refX=\"8\" refY=\"3\" \
         orient=\"auto\" markerUnits=\"strokeWidth\">\
         <path d=\"M0,0 L8,3 L0,6\" fill=\"{SHARED_LINE_COLOR}\" /></marker>\
         </defs>"
    )
}

fn legend_entry(y: f64, fill: &str, border: &str, stroke_w: &str, text: &str) -> String {
    format!(
        "<g transform=\"translate(10, {y})\">\
         <rect x=\"0\" y=\"0\" width=\"14\" height=\"14\" rx=\"3\" fill=\"{fill}\" \
         stroke=\"{border}\" stroke-width=\"{stroke_w}\" />\
         <text x=\"20\" y=\"11\" font-size=\"10\" fill=\"#666\">{text}</text></g>"
    )
}

/// Compact vertical chain: LB at the top, direct deps below, sub-deps
/// last, arrows showing dependency direction.
fn render_chain_svg(
    lb_name: &str,
    deps: &[DepKey],
    dep_children: &HashMap<DepKey, Vec<DepKey>>,
    external_deps: &std::collections::HashSet<DepKey>,
) -> String {
    enum NodeType {
        Lb,
        Dep,
        Leaf,
    }
    let mut chain: Vec<(String, NodeType, Option<DepKey>)> =
        vec![(lb_name.to_string(), NodeType::Lb, None)];
    for dep_key in deps {
        chain.push((dep_label(dep_key), NodeType::Dep, Some(dep_key.clone())));
        for child in dep_children.get(dep_key).map(Vec::as_slice).unwrap_or(&[]) {
            chain.push((dep_label(child), NodeType::Leaf, Some(child.clone())));
        }
    }

    let box_w = 200.0;
    let box_h = 34.0;
    let v_gap = 16.0;
    let pad_x = 20.0;
    let pad_y = 16.0;
    let has_ext = chain
        .iter()
        .any(|(_, _, key)| key.as_ref().map(|k| external_deps.contains(k)).unwrap_or(false));
    let legend_h = if has_ext { 24.0 } else { 0.0 };

    let n = chain.len() as f64;
    let svg_w = box_w + 2.0 * pad_x;
    let svg_h = n * box_h + (n - 1.0) * v_gap + 2.0 * pad_y + legend_h;

    let mut out = svg_open(svg_w, svg_h);
    out.push_str(&arrow_defs());

    let mut prev_bottom_y: Option<f64> = None;
    for (i, (label, ntype, dep_key)) in chain.iter().enumerate() {
        let cx = pad_x + box_w / 2.0;
        let y = pad_y + i as f64 * (box_h + v_gap);
        let is_ext = dep_key.as_ref().map(|k| external_deps.contains(k)).unwrap_or(false);

        if let Some(prev_y) = prev_bottom_y {
            let _ = write!(
                out,
                "<line x1=\"{cx}\" y1=\"{prev_y}\" x2=\"{cx}\" y2=\"{y}\" \
                 stroke=\"{LINE_COLOR}\" stroke-width=\"1.5\" marker-end=\"url(#arr)\" />"
            );
        }

        let (fill, border, stroke_w, text_color, font_size, font_weight) = if is_ext {
            (EXT_FILL, EXT_BORDER, "2.5", "#1a1a1a", "11", "")
        } else {
            match ntype {
                NodeType::Lb => (LB_FILL, "", "", "#ffffff", "12", " font-weight=\"600\""),
                NodeType::Dep => (DEP_FILL, DEP_BORDER, "1.5", "#1a1a1a", "11", ""),
                NodeType::Leaf => (LEAF_FILL, LEAF_BORDER, "1.5", "#1a1a1a", "11", ""),
            }
        };
        let border_attr = if border.is_empty() {
            String::new()
        } else {
            format!(" stroke=\"{border}\" stroke-width=\"{stroke_w}\"")
        };
        let _ = write!(
            out,
            "<rect x=\"{pad_x}\" y=\"{y}\" width=\"{box_w}\" height=\"{box_h}\" rx=\"6\" \
             fill=\"{fill}\"{border_attr} />\
             <text x=\"{cx}\" y=\"{ty}\" text-anchor=\"middle\" fill=\"{text_color}\" \
             font-size=\"{font_size}\"{font_weight}>{label}</text>",
            ty = y + box_h / 2.0 + 4.0,
            label = esc(label),
        );
        prev_bottom_y = Some(y + box_h);
    }

    if has_ext {
        let ly = pad_y + n * box_h + (n - 1.0) * v_gap + 8.0;
        out.push_str(&legend_entry(
            ly,
            EXT_FILL,
            EXT_BORDER,
            "2.5",
            "used by external object (not in move list)",
        ));
    }
    out.push_str("</svg>");
    out
}

/// Render a batch dependency graph as an inline SVG.
pub fn render_batch_svg(batch: &BatchGraphData) -> Markup {
    // Unique dep nodes by tier: tier 1 directly referenced by an LB,
    // tier 2 referenced by a tier-1 dep.
    let mut tier1: Vec<DepKey> = Vec::new();
    let mut tier2: Vec<DepKey> = Vec::new();
    let mut seen: std::collections::HashSet<DepKey> = std::collections::HashSet::new();
    for lb_name in &batch.lb_names {
        for dep_key in batch.lb_to_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            if seen.insert(dep_key.clone()) {
                tier1.push(dep_key.clone());
            }
        }
    }
    for parent in &tier1 {
        for child in batch.dep_children.get(parent).map(Vec::as_slice).unwrap_or(&[]) {
            if seen.insert(child.clone()) {
                tier2.push(child.clone());
            }
        }
    }

    if batch.lb_names.len() == 1 && batch.shared_deps.is_empty() {
        let empty = Vec::new();
        let deps = batch.lb_to_deps.get(&batch.lb_names[0]).unwrap_or(&empty);
        return PreEscaped(render_chain_svg(
            &batch.lb_names[0],
            deps,
            &batch.dep_children,
            &batch.external_deps,
        ));
    }

    // Full graph layout.
    let box_w = 180.0;
    let h_gap = 24.0;
    let v_gap = 60.0;
    let pad_x = 20.0;
    let pad_y = 20.0;
    let has_shared = !batch.shared_deps.is_empty();
    let has_ext = !batch.external_deps.is_empty();
    let legend_lines = usize::from(has_shared) + usize::from(has_ext);
    let legend_h = legend_lines as f64 * 20.0 + if legend_lines > 0 { 8.0 } else { 0.0 };

    let mut row_counts = vec![batch.lb_names.len()];
    if !tier1.is_empty() {
        row_counts.push(tier1.len());
    }
    if !tier2.is_empty() {
        row_counts.push(tier2.len());
    }
    let n_rows = row_counts.len() as f64;
    let max_items = *row_counts.iter().max().unwrap_or(&1) as f64;
    let svg_w = (max_items * (box_w + h_gap) - h_gap + 2.0 * pad_x).max(300.0);
    let content_h = n_rows * (BOX_H + v_gap) - v_gap + 2.0 * pad_y;
    let svg_h = content_h + legend_h;

    let row_x_start = |n_items: usize| -> f64 {
        let row_width = n_items as f64 * (box_w + h_gap) - h_gap;
        (svg_w - row_width) / 2.0
    };

    // node id -> (cx, cy)
    let mut positions: HashMap<String, (f64, f64)> = HashMap::new();
    let x0 = row_x_start(batch.lb_names.len());
    for (i, lb_name) in batch.lb_names.iter().enumerate() {
        let cx = x0 + i as f64 * (box_w + h_gap) + box_w / 2.0;
        positions.insert(format!("lb:{lb_name}"), (cx, pad_y + BOX_H / 2.0));
    }
    let dep_id = |key: &DepKey| format!("dep:{}:{}", key.0, key.1);
    if !tier1.is_empty() {
        let x1 = row_x_start(tier1.len());
        for (i, key) in tier1.iter().enumerate() {
            let cx = x1 + i as f64 * (box_w + h_gap) + box_w / 2.0;
            positions.insert(dep_id(key), (cx, pad_y + (BOX_H + v_gap) + BOX_H / 2.0));
        }
    }
    if !tier2.is_empty() {
        let row_idx = if tier1.is_empty() { 1.0 } else { 2.0 };
        let x2 = row_x_start(tier2.len());
        for (i, key) in tier2.iter().enumerate() {
            let cx = x2 + i as f64 * (box_w + h_gap) + box_w / 2.0;
            positions.insert(dep_id(key), (cx, pad_y + row_idx * (BOX_H + v_gap) + BOX_H / 2.0));
        }
    }

    let mut out = svg_open(svg_w, svg_h);
    out.push_str(&arrow_defs());

    // Connecting lines first so boxes draw over them.
    let mut draw_line = |from: &str, to: &str, is_shared: bool, out: &mut String| {
        let (Some(&(x1, y1)), Some(&(x2, y2))) = (positions.get(from), positions.get(to)) else {
            return;
        };
        let (color, width, marker) = if is_shared {
            (SHARED_LINE_COLOR, "2.5", "url(#arr-shared)")
        } else {
            (LINE_COLOR, "1.5", "url(#arr)")
        };
        let _ = write!(
            out,
            "<line x1=\"{x1}\" y1=\"{sy}\" x2=\"{x2}\" y2=\"{ey}\" stroke=\"{color}\" \
             stroke-width=\"{width}\" marker-end=\"{marker}\" />",
            sy = y1 + BOX_H / 2.0,
            ey = y2 - BOX_H / 2.0,
        );
    };
    for lb_name in &batch.lb_names {
        let lb_id = format!("lb:{lb_name}");
        for dep_key in batch.lb_to_deps.get(lb_name).map(Vec::as_slice).unwrap_or(&[]) {
            draw_line(&lb_id, &dep_id(dep_key), batch.shared_deps.contains(dep_key), &mut out);
        }
    }
    for parent in &tier1 {
        for child in batch.dep_children.get(parent).map(Vec::as_slice).unwrap_or(&[]) {
            draw_line(&dep_id(parent), &dep_id(child), batch.shared_deps.contains(child), &mut out);
        }
    }

    for lb_name in &batch.lb_names {
        let Some(&(cx, cy)) = positions.get(&format!("lb:{lb_name}")) else {
            continue;
        };
        let display = if lb_name.len() <= 22 {
            lb_name.clone()
        } else {
            format!("{}...", &lb_name[..20])
        };
        let _ = write!(
            out,
            "<rect x=\"{x}\" y=\"{y}\" width=\"{box_w}\" height=\"{BOX_H}\" rx=\"6\" \
             fill=\"{LB_FILL}\" />\
             <text x=\"{cx}\" y=\"{ty}\" text-anchor=\"middle\" fill=\"#ffffff\" \
             font-size=\"12\" font-weight=\"600\">{label}</text>",
            x = cx - box_w / 2.0,
            y = cy - BOX_H / 2.0,
            ty = cy + 5.0,
            label = esc(&display),
        );
    }

    let mut draw_dep_box = |key: &DepKey, is_leaf: bool, out: &mut String| {
        let Some(&(cx, cy)) = positions.get(&dep_id(key)) else {
            return;
        };
        let is_ext = batch.external_deps.contains(key);
        let is_shared = batch.shared_deps.contains(key);
        let (fill, border) = if is_ext {
            (EXT_FILL, EXT_BORDER)
        } else if is_shared {
            (SHARED_FILL, SHARED_BORDER)
        } else if is_leaf {
            (LEAF_FILL, LEAF_BORDER)
        } else {
            (DEP_FILL, DEP_BORDER)
        };
        let stroke_w = if is_ext || is_shared { "2.5" } else { "1.5" };
        let _ = write!(
            out,
            "<rect x=\"{x}\" y=\"{y}\" width=\"{box_w}\" height=\"{BOX_H}\" rx=\"6\" \
             fill=\"{fill}\" stroke=\"{border}\" stroke-width=\"{stroke_w}\" />\
             <text x=\"{cx}\" y=\"{ty}\" text-anchor=\"middle\" fill=\"#1a1a1a\" \
             font-size=\"11\">{label}</text>",
            x = cx - box_w / 2.0,
            y = cy - BOX_H / 2.0,
            ty = cy + 5.0,
            label = esc(&dep_label(key)),
        );
    };
    for key in &tier1 {
        draw_dep_box(key, false, &mut out);
    }
    for key in &tier2 {
        draw_dep_box(key, true, &mut out);
    }

    let mut legend_y = content_h + 4.0;
    if has_ext {
        out.push_str(&legend_entry(
            legend_y,
            EXT_FILL,
            EXT_BORDER,
            "2.5",
            "used by external object (not in move list)",
        ));
        legend_y += 20.0;
    }
    if has_shared {
        out.push_str(&legend_entry(
            legend_y,
            SHARED_FILL,
            SHARED_BORDER,
            "2",
            "shared dependency (used by multiple LBs in this batch)",
        ));
    }
    out.push_str("</svg>");
    PreEscaped(out)
}
