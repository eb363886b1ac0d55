use crate::collections::CollectionsOverlay;
use crate::config::{RenderConfig, ViewportConfig};
use crate::events::{ClickResolver, DiagramEvent, HitRole, HitTarget, NodeRef};
use crate::ir::NodeKind;
use crate::layout::{Bounds, EdgeKind, EdgeLayout, SatelliteNode, Scene, SceneNode};
use crate::theme::Theme;
use crate::viewport::{Transform, Viewport};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::{Duration, Instant};

pub const UNDEVELOPED_CLASS: &str = "undeveloped";

const STRATEGY_SKEW: f32 = 10.0;
const DIAMOND_SIZE: f32 = 7.0;
const TEXT_WIDTH_FACTOR: f32 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rx: f32,
    },
    Circle {
        cx: f32,
        cy: f32,
        r: f32,
    },
    Ellipse {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
    },
    Polygon {
        points: Vec<(f32, f32)>,
    },
    Path {
        points: Vec<(f32, f32)>,
        marker: Option<EdgeKind>,
        dashed: bool,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        size: f32,
    },
}

impl Shape {
    fn bounds(&self) -> Option<Bounds> {
        match self {
            Shape::Rect {
                x,
                y,
                width,
                height,
                ..
            } => Some(Bounds::new(*x, *y, *width, *height)),
            Shape::Circle { cx, cy, r } => Some(Bounds::new(cx - r, cy - r, r * 2.0, r * 2.0)),
            Shape::Ellipse { cx, cy, rx, ry } => {
                Some(Bounds::new(cx - rx, cy - ry, rx * 2.0, ry * 2.0))
            }
            Shape::Polygon { points } | Shape::Path { points, .. } => points_bounds(points),
            Shape::Text { x, y, text, size } => {
                let width = text.chars().count() as f32 * size * TEXT_WIDTH_FACTOR;
                Some(Bounds::new(x - width / 2.0, y - size / 2.0, width, *size))
            }
        }
    }
}

fn points_bounds(points: &[(f32, f32)]) -> Option<Bounds> {
    let (first, rest) = points.split_first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.0, first.1, first.0, first.1);
    for (x, y) in rest {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }
    Some(Bounds::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Edges(EdgeKind),
    Nodes,
    Satellites,
    Decorations,
    Collections,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub layer: Layer,
    pub node_id: Option<String>,
    pub class: String,
    pub shape: Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Rendered,
    Destroyed,
}

/// Draws a [`Scene`] as vector primitives and owns the view state layered on
/// top of it: highlight classes, decorations, the collections overlay,
/// pointer gestures and the viewport transform.
pub struct Renderer {
    state: RendererState,
    theme: Theme,
    viewport: Viewport,
    clicks: ClickResolver,
    primitives: Vec<Primitive>,
    decorations: Vec<Primitive>,
    collections: Vec<Primitive>,
    highlights: BTreeMap<String, BTreeSet<String>>,
    hits: Vec<(Bounds, HitTarget)>,
}

impl Renderer {
    pub fn new(width: f32, height: f32, theme: Theme, viewport: ViewportConfig) -> Self {
        let window = Duration::from_millis(viewport.double_click_ms);
        Self {
            state: RendererState::Uninitialized,
            theme,
            viewport: Viewport::new(width, height, viewport),
            clicks: ClickResolver::new(window),
            primitives: Vec::new(),
            decorations: Vec::new(),
            collections: Vec::new(),
            highlights: BTreeMap::new(),
            hits: Vec::new(),
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    /// Surface size in pixels.
    pub fn size(&self) -> (f32, f32) {
        (self.viewport.width, self.viewport.height)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == RendererState::Destroyed
    }

    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives
            .iter()
            .chain(self.decorations.iter())
            .chain(self.collections.iter())
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn render(&mut self, scene: &Scene) {
        if self.is_destroyed() {
            tracing::debug!("render on destroyed renderer ignored");
            return;
        }
        self.primitives.clear();
        self.hits.clear();
        self.clicks.cancel();

        let categories = [
            &scene.tree_edges,
            &scene.extra_edges,
            &scene.context_edges,
            &scene.defeater_edges,
        ];
        for edges in categories {
            for edge in edges {
                self.draw_edge(edge);
            }
        }
        for node in &scene.nodes {
            self.draw_node(node);
        }
        for sat in &scene.contexts {
            self.draw_satellite(sat, HitRole::Context);
        }
        for sat in &scene.defeaters {
            self.draw_satellite(sat, HitRole::Defeater);
        }

        self.state = RendererState::Rendered;
        self.refresh_decorations();
    }

    fn draw_edge(&mut self, edge: &EdgeLayout) {
        self.primitives.push(Primitive {
            layer: Layer::Edges(edge.kind),
            node_id: None,
            class: format!("edge {}", edge.kind.as_str()),
            shape: Shape::Path {
                points: edge.points.clone(),
                marker: Some(edge.kind),
                dashed: edge.kind == EdgeKind::Extra,
            },
        });
    }

    fn draw_node(&mut self, node: &SceneNode) {
        let bounds = node.bounds();
        let target = NodeRef {
            id: node.id.clone(),
            label: node.label.clone(),
            kind: node.kind,
            type_iri: node.type_iri.clone(),
        };
        self.draw_shape(Layer::Nodes, &target, bounds);
        self.hits.push((
            bounds,
            HitTarget {
                node: target,
                role: HitRole::Node,
            },
        ));
    }

    fn draw_satellite(&mut self, sat: &SatelliteNode, role: HitRole) {
        let bounds = sat.bounds();
        let target = NodeRef {
            id: sat.id.clone(),
            label: sat.label.clone(),
            kind: sat.kind,
            type_iri: sat.type_iri.clone(),
        };
        self.draw_shape(Layer::Satellites, &target, bounds);
        self.hits.push((bounds, HitTarget { node: target, role }));
    }

    fn draw_shape(&mut self, layer: Layer, node: &NodeRef, b: Bounds) {
        let (cx, cy) = b.center();
        let shape = match node.kind {
            NodeKind::Solution => Shape::Circle {
                cx,
                cy,
                r: (b.height / 2.0).max(b.width.min(b.height * 1.6) / 2.0),
            },
            NodeKind::Strategy => Shape::Polygon {
                points: vec![
                    (b.x + STRATEGY_SKEW, b.y),
                    (b.right(), b.y),
                    (b.right() - STRATEGY_SKEW, b.bottom()),
                    (b.x, b.bottom()),
                ],
            },
            NodeKind::Assumption | NodeKind::Justification => Shape::Ellipse {
                cx,
                cy,
                rx: b.width / 2.0,
                ry: b.height / 2.0,
            },
            NodeKind::Context => Shape::Rect {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
                rx: b.height / 2.0,
            },
            NodeKind::Goal | NodeKind::Defeater => Shape::Rect {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
                rx: 0.0,
            },
        };
        let kind = node.kind.as_str();
        let font_size = self.theme.font_size;
        let mut push = |class: String, shape: Shape| {
            self.primitives.push(Primitive {
                layer,
                node_id: Some(node.id.clone()),
                class,
                shape,
            });
        };
        push(format!("shape {kind}"), shape);
        if let Some(tag) = node.kind.tag() {
            push(
                "tag".to_string(),
                Shape::Text {
                    x: b.right() - 4.0,
                    y: b.y + 4.0,
                    text: tag.to_string(),
                    size: font_size * 0.85,
                },
            );
        }
        push(
            "label".to_string(),
            Shape::Text {
                x: cx,
                y: cy,
                text: node.label.clone(),
                size: font_size,
            },
        );
    }

    /// Replaces the membership of `class`; never accumulates.
    pub fn highlight<I, S>(&mut self, ids: I, class: &str)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.is_destroyed() {
            return;
        }
        let members: BTreeSet<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        if members.is_empty() {
            self.highlights.remove(class);
        } else {
            self.highlights.insert(class.to_string(), members);
        }
        if class == UNDEVELOPED_CLASS {
            self.refresh_decorations();
        }
    }

    pub fn clear_all(&mut self) {
        self.highlights.clear();
        self.decorations.clear();
    }

    pub fn highlighted(&self, class: &str) -> Option<&BTreeSet<String>> {
        self.highlights.get(class)
    }

    pub fn classes_of(&self, id: &str) -> Vec<&str> {
        self.highlights
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(class, _)| class.as_str())
            .collect()
    }

    /// Redraws the undeveloped diamonds from scratch.
    fn refresh_decorations(&mut self) {
        self.decorations.clear();
        let Some(members) = self.highlights.get(UNDEVELOPED_CLASS) else {
            return;
        };
        for (bounds, target) in &self.hits {
            if target.role != HitRole::Node || !members.contains(&target.node.id) {
                continue;
            }
            let (cx, _) = bounds.center();
            let top = bounds.bottom();
            self.decorations.push(Primitive {
                layer: Layer::Decorations,
                node_id: Some(target.node.id.clone()),
                class: "undeveloped-marker".to_string(),
                shape: Shape::Polygon {
                    points: vec![
                        (cx, top),
                        (cx + DIAMOND_SIZE, top + DIAMOND_SIZE),
                        (cx, top + DIAMOND_SIZE * 2.0),
                        (cx - DIAMOND_SIZE, top + DIAMOND_SIZE),
                    ],
                },
            });
        }
    }

    pub fn draw_collections(&mut self, overlay: &CollectionsOverlay) {
        self.clear_collections();
        if self.is_destroyed() {
            return;
        }
        let font_size = self.theme.font_size;
        let line = |from: (f32, f32), to: (f32, f32)| Shape::Path {
            points: vec![from, to],
            marker: None,
            dashed: false,
        };
        for hub in overlay.hubs.iter() {
            let mut push = |node_id: Option<&str>, class: &str, shape: Shape| {
                self.collections.push(Primitive {
                    layer: Layer::Collections,
                    node_id: node_id.map(str::to_string),
                    class: class.to_string(),
                    shape,
                });
            };
            push(None, "collection-link", line(hub.anchor_point, (hub.x, hub.y)));
            for item in &hub.items {
                push(None, "collection-link", line((hub.x, hub.y), (item.x, item.y)));
            }
            push(
                Some(hub.group.as_str()),
                "collection-hub",
                Shape::Circle {
                    cx: hub.x,
                    cy: hub.y,
                    r: hub.hub_radius,
                },
            );
            for item in &hub.items {
                push(
                    Some(item.id.as_str()),
                    "collection-item",
                    Shape::Circle {
                        cx: item.x,
                        cy: item.y,
                        r: hub.item_radius,
                    },
                );
                push(
                    Some(item.id.as_str()),
                    "collection-label",
                    Shape::Text {
                        x: item.x,
                        y: item.y + 12.0,
                        text: item.label.clone(),
                        size: font_size * 0.85,
                    },
                );
            }
        }
    }

    pub fn clear_collections(&mut self) {
        self.collections.clear();
    }

    pub fn collection_primitive_count(&self) -> usize {
        self.collections.len()
    }

    pub fn content_bounds(&self) -> Option<Bounds> {
        self.primitives()
            .filter_map(|p| p.shape.bounds())
            .reduce(|acc, b| acc.union(&b))
    }

    pub fn fit(&mut self, padding: f32) -> Option<Transform> {
        self.fit_at(padding, Instant::now())
    }

    /// Animates toward the transform that centers all drawn content. No-op
    /// when nothing with extent has been drawn.
    pub fn fit_at(&mut self, padding: f32, now: Instant) -> Option<Transform> {
        if self.is_destroyed() {
            return None;
        }
        let bbox = self.content_bounds()?;
        self.viewport.fit_at(&bbox, padding, now)
    }

    pub fn fit_immediately(&mut self, padding: f32) -> Option<Transform> {
        if self.is_destroyed() {
            return None;
        }
        let bbox = self.content_bounds()?;
        self.viewport.fit_immediately(&bbox, padding)
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        if !self.is_destroyed() {
            self.viewport.reset_at(now);
        }
    }

    /// Topmost node or satellite under a screen-space point.
    pub fn hit_test(&self, x: f32, y: f32, now: Instant) -> Option<&HitTarget> {
        let (cx, cy) = self.viewport.transform_at(now).invert((x, y));
        self.hits
            .iter()
            .rev()
            .find(|(bounds, _)| bounds.contains(cx, cy))
            .map(|(_, target)| target)
    }

    fn target_by_id(&self, id: &str) -> Option<HitTarget> {
        self.hits
            .iter()
            .find(|(_, target)| target.node.id == id)
            .map(|(_, target)| target.clone())
    }

    pub fn click(&mut self, id: &str, now: Instant) -> Vec<DiagramEvent> {
        match self.target_by_id(id) {
            Some(target) => self.clicks.click(target, now),
            None => Vec::new(),
        }
    }

    pub fn double_click(&mut self, id: &str, now: Instant) -> Vec<DiagramEvent> {
        match self.target_by_id(id) {
            Some(target) => self.clicks.double_click(target, now),
            None => Vec::new(),
        }
    }

    pub fn click_at(&mut self, x: f32, y: f32, now: Instant) -> Vec<DiagramEvent> {
        match self.hit_test(x, y, now).cloned() {
            Some(target) => self.clicks.click(target, now),
            None => Vec::new(),
        }
    }

    pub fn double_click_at(&mut self, x: f32, y: f32, now: Instant) -> Vec<DiagramEvent> {
        match self.hit_test(x, y, now).cloned() {
            Some(target) => self.clicks.double_click(target, now),
            None => Vec::new(),
        }
    }

    pub fn poll(&mut self, now: Instant) -> Vec<DiagramEvent> {
        if self.is_destroyed() {
            return Vec::new();
        }
        self.clicks.poll(now)
    }

    /// Drops every primitive and all view state. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.primitives.clear();
        self.decorations.clear();
        self.collections.clear();
        self.highlights.clear();
        self.hits.clear();
        self.clicks.cancel();
        self.state = RendererState::Destroyed;
    }

    pub fn to_svg(&self) -> String {
        self.svg_with(self.viewport.current())
    }

    pub fn to_svg_at(&self, now: Instant) -> String {
        self.svg_with(self.viewport.transform_at(now))
    }

    fn svg_with(&self, transform: Transform) -> String {
        let theme = &self.theme;
        let width = self.viewport.width.max(1.0);
        let height = self.viewport.height.max(1.0);
        let mut svg = String::new();

        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
        ));
        svg.push_str(&self.style_block());
        svg.push_str(&format!(
            "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
            theme.background
        ));

        svg.push_str("<defs>");
        for (kind, color, fill) in [
            (EdgeKind::Tree, &theme.line_color, theme.line_color.as_str()),
            (EdgeKind::Extra, &theme.extra_line_color, theme.extra_line_color.as_str()),
            (EdgeKind::Context, &theme.context_line_color, theme.background.as_str()),
            (EdgeKind::Defeater, &theme.defeater_line_color, theme.defeater_line_color.as_str()),
        ] {
            svg.push_str(&format!(
                "<marker id=\"arrow-{}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"7\" markerHeight=\"7\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\" stroke=\"{}\"/></marker>",
                kind.as_str(),
                fill,
                color
            ));
        }
        svg.push_str("</defs>");

        svg.push_str(&format!(
            "<g class=\"viewport\" transform=\"{}\">",
            transform.to_svg_attr()
        ));
        for primitive in self.primitives() {
            svg.push_str(&self.primitive_svg(primitive));
        }
        svg.push_str("</g></svg>");
        svg
    }

    fn style_block(&self) -> String {
        let theme = &self.theme;
        let mut css = String::from("<style>");
        css.push_str(&format!(
            ".edge{{fill:none;stroke-width:1.4}}.edge.tree{{stroke:{}}}.edge.extra{{stroke:{}}}.edge.context{{stroke:{}}}.edge.defeater{{stroke:{}}}",
            theme.line_color, theme.extra_line_color, theme.context_line_color, theme.defeater_line_color
        ));
        css.push_str(&format!(
            ".shape{{stroke:{};stroke-width:1.4}}.undeveloped-marker{{fill:none;stroke:{}}}.collection-link{{stroke:{};fill:none}}.collection-hub,.collection-item{{fill:{}}}",
            theme.border_color, theme.undeveloped_color, theme.collection_color, theme.collection_color
        ));
        for class in self.highlights.keys() {
            if class == UNDEVELOPED_CLASS {
                continue;
            }
            css.push_str(&format!(
                ".shape.{}{{stroke:{};stroke-width:3}}",
                css_class(class),
                theme.highlight_stroke(class)
            ));
        }
        css.push_str("</style>");
        css
    }

    fn primitive_svg(&self, primitive: &Primitive) -> String {
        let theme = &self.theme;
        let mut class = primitive.class.clone();
        if let Some(id) = primitive.node_id.as_deref() {
            for name in self.classes_of(id) {
                class.push(' ');
                class.push_str(&css_class(name));
            }
        }
        let data_id = primitive
            .node_id
            .as_deref()
            .map(|id| format!(" data-id=\"{}\"", escape_xml(id)))
            .unwrap_or_default();
        let fill = primitive_fill(primitive, theme);

        match &primitive.shape {
            Shape::Rect {
                x,
                y,
                width,
                height,
                rx,
            } => format!(
                "<rect class=\"{class}\"{data_id} x=\"{x:.2}\" y=\"{y:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" rx=\"{rx:.2}\" fill=\"{fill}\"/>"
            ),
            Shape::Circle { cx, cy, r } => format!(
                "<circle class=\"{class}\"{data_id} cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{r:.2}\" fill=\"{fill}\"/>"
            ),
            Shape::Ellipse { cx, cy, rx, ry } => format!(
                "<ellipse class=\"{class}\"{data_id} cx=\"{cx:.2}\" cy=\"{cy:.2}\" rx=\"{rx:.2}\" ry=\"{ry:.2}\" fill=\"{fill}\"/>"
            ),
            Shape::Polygon { points } => format!(
                "<polygon class=\"{class}\"{data_id} points=\"{}\" fill=\"{fill}\"/>",
                points
                    .iter()
                    .map(|(x, y)| format!("{x:.2},{y:.2}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            Shape::Path {
                points,
                marker,
                dashed,
            } => {
                let marker = marker
                    .map(|kind| format!(" marker-end=\"url(#arrow-{})\"", kind.as_str()))
                    .unwrap_or_default();
                let dash = if *dashed { " stroke-dasharray=\"6 4\"" } else { "" };
                format!(
                    "<path class=\"{class}\"{data_id} d=\"{}\"{marker}{dash}/>",
                    points_to_path(points)
                )
            }
            Shape::Text { x, y, text, size } => format!(
                "<text class=\"{class}\"{data_id} x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{size:.1}\" fill=\"{}\">{}</text>",
                escape_xml(&theme.font_family),
                theme.text_color,
                escape_xml(text)
            ),
        }
    }
}

fn primitive_fill<'a>(primitive: &Primitive, theme: &'a Theme) -> &'a str {
    let kind = primitive
        .class
        .strip_prefix("shape ")
        .and_then(|name| match name {
            "goal" => Some(NodeKind::Goal),
            "strategy" => Some(NodeKind::Strategy),
            "solution" => Some(NodeKind::Solution),
            "context" => Some(NodeKind::Context),
            "assumption" => Some(NodeKind::Assumption),
            "justification" => Some(NodeKind::Justification),
            "defeater" => Some(NodeKind::Defeater),
            _ => None,
        });
    match kind {
        Some(kind) => theme.fill_for(kind),
        None if primitive.layer == Layer::Decorations => "none",
        None => theme.collection_color.as_str(),
    }
}

/// Highlight class names come from query configuration; keep them valid as
/// CSS identifiers.
fn css_class(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '-' })
        .collect()
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| anyhow::anyhow!("invalid render size {}x{}", render_cfg.width, render_cfg.height))?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
