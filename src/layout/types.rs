use std::collections::BTreeMap;

use serde::Serialize;

use crate::ir::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Bounds::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// A node of the layout tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub type_iri: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub depth: usize,
    pub context_ids: Vec<String>,
}

impl SceneNode {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }
}

/// A context or defeater pinned beside its host. Not part of the layout tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub type_iri: Option<String>,
    pub host: String,
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SatelliteNode {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Primary-parent edge; drives the layout.
    Tree,
    /// Any other `supports` edge (secondary parents, cycle back-edges).
    Extra,
    Context,
    Defeater,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Tree => "tree",
            EdgeKind::Extra => "extra",
            EdgeKind::Context => "context",
            EdgeKind::Defeater => "defeater",
        }
    }
}

/// `from`/`to` always name records positioned in the same scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeLayout {
    pub kind: EdgeKind,
    pub from: String,
    pub to: String,
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    pub contexts: Vec<SatelliteNode>,
    pub defeaters: Vec<SatelliteNode>,
    pub tree_edges: Vec<EdgeLayout>,
    pub extra_edges: Vec<EdgeLayout>,
    pub context_edges: Vec<EdgeLayout>,
    pub defeater_edges: Vec<EdgeLayout>,
    pub roots: Vec<String>,
    pub positions: BTreeMap<String, Bounds>,
}

impl Scene {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn satellites(&self) -> impl Iterator<Item = &SatelliteNode> {
        self.contexts.iter().chain(self.defeaters.iter())
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeLayout> {
        self.tree_edges
            .iter()
            .chain(self.extra_edges.iter())
            .chain(self.context_edges.iter())
            .chain(self.defeater_edges.iter())
    }

    pub fn position(&self, id: &str) -> Option<Bounds> {
        self.positions.get(id).copied()
    }

    /// Structural edges (tree and extra) ending at `id`.
    pub fn incoming_structural(&self, id: &str) -> Vec<&EdgeLayout> {
        self.tree_edges
            .iter()
            .chain(self.extra_edges.iter())
            .filter(|edge| edge.to == id)
            .collect()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.positions.values().copied().reduce(|acc, b| acc.union(&b))
    }
}
