mod tree;
mod types;

pub use types::*;

use crate::config::{SceneConfig, Vocabulary, alias_matches};
use crate::ir::{NodeKind, RelationRow, local_name};
use std::collections::{BTreeMap, HashMap, HashSet};
use tree::{Extent, tidy_layout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationClass {
    Structural,
    Context,
    Challenge,
    Ignored,
}

impl Vocabulary {
    pub fn classify(&self, predicate: &str) -> RelationClass {
        if alias_matches(&self.supported_by_aliases, predicate) {
            RelationClass::Structural
        } else if alias_matches(&self.context_of_aliases, predicate) {
            RelationClass::Context
        } else if alias_matches(&self.challenges_aliases, predicate) {
            RelationClass::Challenge
        } else {
            RelationClass::Ignored
        }
    }
}

/// Default label: the IRI's local name.
pub fn default_label(id: &str) -> String {
    local_name(id).to_string()
}

/// Interned relation graph, every list in input order.
#[derive(Default)]
struct Adjacency {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    parents: Vec<Vec<usize>>,
    contexts: HashMap<String, Vec<String>>,
    defeaters: HashMap<String, Vec<String>>,
    types: HashMap<String, String>,
    first_structural_subject: Option<String>,
    first_subject: Option<String>,
}

impl Adjacency {
    fn from_rows(rows: &[RelationRow], vocabulary: &Vocabulary) -> Self {
        let mut graph = Adjacency::default();
        for row in rows {
            if !row.is_well_formed() {
                continue;
            }
            let subject = row.subject.trim();
            let object = row.object.trim();
            graph.first_subject.get_or_insert_with(|| subject.to_string());
            record_type(&mut graph.types, subject, row.subject_type.as_deref());
            record_type(&mut graph.types, object, row.object_type.as_deref());

            match vocabulary.classify(&row.predicate) {
                RelationClass::Structural => {
                    graph
                        .first_structural_subject
                        .get_or_insert_with(|| subject.to_string());
                    let parent = graph.intern(subject);
                    let child = graph.intern(object);
                    if !graph.children[parent].contains(&child) {
                        graph.children[parent].push(child);
                        graph.parents[child].push(parent);
                    }
                }
                RelationClass::Context => push_unique(&mut graph.contexts, subject, object),
                RelationClass::Challenge => push_unique(&mut graph.defeaters, object, subject),
                RelationClass::Ignored => {}
            }
        }
        graph
    }

    fn intern(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), idx);
        self.children.push(Vec::new());
        self.parents.push(Vec::new());
        idx
    }

    fn primary_parent(&self, child: usize) -> Option<usize> {
        self.parents[child].first().copied()
    }

    /// Ids never seen as a structural object; the fallback root otherwise.
    fn roots(&mut self) -> Vec<usize> {
        let roots: Vec<usize> = (0..self.ids.len())
            .filter(|&idx| self.parents[idx].is_empty())
            .collect();
        if !roots.is_empty() {
            return roots;
        }
        let fallback = self
            .first_structural_subject
            .clone()
            .or_else(|| self.first_subject.clone());
        match fallback {
            Some(id) => vec![self.intern(&id)],
            None => Vec::new(),
        }
    }
}

fn record_type(types: &mut HashMap<String, String>, id: &str, type_iri: Option<&str>) {
    if let Some(type_iri) = type_iri.map(str::trim).filter(|t| !t.is_empty()) {
        types.entry(id.to_string()).or_insert_with(|| type_iri.to_string());
    }
}

fn push_unique(map: &mut HashMap<String, Vec<String>>, key: &str, value: &str) {
    let list = map.entry(key.to_string()).or_default();
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// Spanning forest over the primary-parent relation.
struct Forest {
    roots: Vec<usize>,
    children: Vec<Vec<usize>>,
    depth: Vec<usize>,
    order: Vec<usize>,
    tree_edges: HashSet<(usize, usize)>,
}

fn span(graph: &mut Adjacency) -> Forest {
    let inferred = graph.roots();
    let count = graph.ids.len();
    let mut forest = Forest {
        roots: Vec::new(),
        children: vec![Vec::new(); count],
        depth: vec![0; count],
        order: Vec::with_capacity(count),
        tree_edges: HashSet::new(),
    };
    let mut visited = vec![false; count];

    for root in inferred {
        if !visited[root] {
            forest.roots.push(root);
            walk(graph, root, &mut visited, &mut forest);
        }
    }
    // Detached cycles have no inferred root; lay them out from their
    // first-seen member.
    for idx in 0..count {
        if !visited[idx] {
            forest.roots.push(idx);
            walk(graph, idx, &mut visited, &mut forest);
        }
    }
    forest
}

/// Pre-order walk with an explicit stack; each frame is a node and the
/// index of its next candidate child.
fn walk(graph: &Adjacency, root: usize, visited: &mut [bool], forest: &mut Forest) {
    visited[root] = true;
    forest.depth[root] = 0;
    forest.order.push(root);
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    while let Some(frame) = stack.last_mut() {
        let (node, next) = *frame;
        let Some(&child) = graph.children[node].get(next) else {
            stack.pop();
            continue;
        };
        frame.1 += 1;
        if visited[child] || graph.primary_parent(child) != Some(node) {
            continue;
        }
        visited[child] = true;
        forest.depth[child] = forest.depth[node] + 1;
        forest.order.push(child);
        forest.children[node].push(child);
        forest.tree_edges.insert((node, child));
        stack.push((child, 0));
    }
}

/// Builds the positioned scene for a set of relation rows. Malformed rows are
/// skipped; this never fails.
pub fn build_scene(
    rows: &[RelationRow],
    label: &dyn Fn(&str) -> String,
    vocabulary: &Vocabulary,
    config: &SceneConfig,
) -> Scene {
    let mut graph = Adjacency::from_rows(rows, vocabulary);
    let forest = span(&mut graph);
    let count = graph.ids.len();
    if count == 0 {
        return Scene::default();
    }

    let labels: Vec<String> = graph.ids.iter().map(|id| label(id)).collect();
    let widths: Vec<f32> = labels.iter().map(|l| config.node_width(l)).collect();
    let satellite_reach = |map: &HashMap<String, Vec<String>>, id: &str| -> f32 {
        map.get(id)
            .and_then(|list| {
                list.iter()
                    .map(|sat| config.node_width(&label(sat)))
                    .reduce(f32::max)
            })
            .map(|width| width + config.satellite_gap)
            .unwrap_or(0.0)
    };
    let extents: Vec<Extent> = (0..count)
        .map(|idx| {
            let id = &graph.ids[idx];
            let half = Extent::symmetric(widths[idx]);
            Extent {
                left: half.left + satellite_reach(&graph.defeaters, id),
                right: half.right + satellite_reach(&graph.contexts, id),
            }
        })
        .collect();

    let centers = tidy_layout(&forest.roots, &forest.children, &extents, config.node_spacing);
    let min_left = forest
        .order
        .iter()
        .map(|&idx| centers[idx] - extents[idx].left)
        .fold(f32::INFINITY, f32::min);
    let shift = if min_left.is_finite() { -min_left } else { 0.0 };
    let rank_y = rank_offsets(&graph, &forest, config);

    let mut scene = Scene::default();
    for &idx in &forest.order {
        let id = graph.ids[idx].clone();
        let type_iri = graph.types.get(&id).cloned();
        let kind = NodeKind::infer(type_iri.as_deref(), &labels[idx], NodeKind::Goal);
        let node = SceneNode {
            context_ids: graph.contexts.get(&id).cloned().unwrap_or_default(),
            label: labels[idx].clone(),
            kind,
            type_iri,
            x: centers[idx] + shift - widths[idx] / 2.0,
            y: rank_y[forest.depth[idx]],
            width: widths[idx],
            height: config.node_height,
            depth: forest.depth[idx],
            id,
        };
        scene.positions.insert(node.id.clone(), node.bounds());
        scene.nodes.push(node);
    }
    scene.roots = forest.roots.iter().map(|&idx| graph.ids[idx].clone()).collect();

    place_satellites(&mut scene, &graph, label, config);
    route_structural_edges(&mut scene, &graph, &forest, config);

    tracing::debug!(
        nodes = scene.nodes.len(),
        contexts = scene.contexts.len(),
        defeaters = scene.defeaters.len(),
        extra_edges = scene.extra_edges.len(),
        roots = scene.roots.len(),
        "built scene"
    );
    scene
}

/// Top y of every rank. A rank grows by the tallest satellite column hosted
/// on it so stacked contexts and defeaters stay above the next rank.
fn rank_offsets(graph: &Adjacency, forest: &Forest, config: &SceneConfig) -> Vec<f32> {
    let ranks = forest.depth.iter().copied().max().map_or(1, |deepest| deepest + 1);
    let mut column = vec![0.0f32; ranks];
    for &idx in &forest.order {
        let id = &graph.ids[idx];
        let stacked = [&graph.contexts, &graph.defeaters]
            .iter()
            .map(|map| map.get(id).map_or(0, Vec::len))
            .max()
            .unwrap_or(0);
        let extra = stacked.saturating_sub(1) as f32 * config.satellite_stride;
        let rank = &mut column[forest.depth[idx]];
        *rank = rank.max(extra);
    }
    let mut offsets = Vec::with_capacity(ranks);
    let mut y = 0.0f32;
    for extra in column {
        offsets.push(y);
        y += config.node_height + extra + config.rank_spacing;
    }
    offsets
}

fn place_satellites(
    scene: &mut Scene,
    graph: &Adjacency,
    label: &dyn Fn(&str) -> String,
    config: &SceneConfig,
) {
    let hosts: Vec<Bounds> = scene.nodes.iter().map(SceneNode::bounds).collect();
    for (node_idx, host) in hosts.iter().enumerate() {
        let host_id = scene.nodes[node_idx].id.clone();

        for (index, ctx) in graph.contexts.get(&host_id).into_iter().flatten().enumerate() {
            let text = label(ctx);
            let type_iri = graph.types.get(ctx).cloned();
            let width = config.node_width(&text);
            let sat = SatelliteNode {
                id: ctx.clone(),
                kind: satellite_kind(type_iri.as_deref(), &text),
                label: text,
                type_iri,
                host: host_id.clone(),
                index,
                x: host.right() + config.satellite_gap,
                y: host.y + index as f32 * config.satellite_stride,
                width,
                height: config.node_height,
            };
            let (host_x, host_y) = (host.right(), host.center().1);
            let (sat_x, sat_y) = (sat.x, sat.y + sat.height / 2.0);
            scene.context_edges.push(EdgeLayout {
                kind: EdgeKind::Context,
                from: host_id.clone(),
                to: sat.id.clone(),
                points: horizontal_link((host_x, host_y), (sat_x, sat_y)),
            });
            scene.positions.entry(sat.id.clone()).or_insert_with(|| sat.bounds());
            scene.contexts.push(sat);
        }

        for (index, defeater) in graph.defeaters.get(&host_id).into_iter().flatten().enumerate() {
            let text = label(defeater);
            let type_iri = graph.types.get(defeater).cloned();
            let width = config.node_width(&text);
            let sat = SatelliteNode {
                id: defeater.clone(),
                kind: NodeKind::infer(type_iri.as_deref(), "", NodeKind::Defeater),
                label: text,
                type_iri,
                host: host_id.clone(),
                index,
                x: host.x - config.satellite_gap - width,
                y: host.y + index as f32 * config.satellite_stride,
                width,
                height: config.node_height,
            };
            let (sat_x, sat_y) = (sat.bounds().right(), sat.y + sat.height / 2.0);
            scene.defeater_edges.push(EdgeLayout {
                kind: EdgeKind::Defeater,
                from: sat.id.clone(),
                to: host_id.clone(),
                points: horizontal_link((sat_x, sat_y), (host.x, host.center().1)),
            });
            scene.positions.entry(sat.id.clone()).or_insert_with(|| sat.bounds());
            scene.defeaters.push(sat);
        }
    }
}

/// Contexts only ever resolve to context, assumption or justification.
fn satellite_kind(type_iri: Option<&str>, label: &str) -> NodeKind {
    if let Some(kind) = type_iri.and_then(NodeKind::from_type_iri) {
        return kind;
    }
    match NodeKind::from_label(label) {
        Some(kind @ (NodeKind::Assumption | NodeKind::Justification | NodeKind::Context)) => kind,
        _ => NodeKind::Context,
    }
}

fn route_structural_edges(scene: &mut Scene, graph: &Adjacency, forest: &Forest, config: &SceneConfig) {
    let bounds: BTreeMap<usize, Bounds> = forest
        .order
        .iter()
        .zip(&scene.nodes)
        .map(|(&idx, node)| (idx, node.bounds()))
        .collect();
    let link = |parent: usize, child: usize, kind: EdgeKind| -> Option<EdgeLayout> {
        let from = bounds.get(&parent)?;
        let to = bounds.get(&child)?;
        Some(EdgeLayout {
            kind,
            from: graph.ids[parent].clone(),
            to: graph.ids[child].clone(),
            points: tree_link(from, to, config.rank_spacing),
        })
    };

    for &parent in &forest.order {
        for &child in &forest.children[parent] {
            scene.tree_edges.extend(link(parent, child, EdgeKind::Tree));
        }
    }
    for &child in &forest.order {
        for &parent in &graph.parents[child] {
            if !forest.tree_edges.contains(&(parent, child)) {
                scene.extra_edges.extend(link(parent, child, EdgeKind::Extra));
            }
        }
    }
}

/// Orthogonal elbow from the parent's bottom center to the child's top
/// center, turning midway through the gap above the child. Children above
/// the parent are entered from below.
fn tree_link(parent: &Bounds, child: &Bounds, rank_spacing: f32) -> Vec<(f32, f32)> {
    let (px, _) = parent.center();
    let (cx, _) = child.center();
    let start_y = parent.bottom();
    let (mid_y, end_y) = if child.y >= start_y {
        ((child.y - rank_spacing / 2.0).max(start_y), child.y)
    } else {
        (start_y + rank_spacing / 2.0, child.bottom())
    };
    vec![(px, start_y), (px, mid_y), (cx, mid_y), (cx, end_y)]
}

fn horizontal_link(from: (f32, f32), to: (f32, f32)) -> Vec<(f32, f32)> {
    if (from.1 - to.1).abs() < f32::EPSILON {
        return vec![from, to];
    }
    let mid_x = (from.0 + to.0) / 2.0;
    vec![from, (mid_x, from.1), (mid_x, to.1), to]
}
