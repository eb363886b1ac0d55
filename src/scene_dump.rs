use crate::layout::{EdgeLayout, SatelliteNode, Scene};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDump {
    pub roots: Vec<String>,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub satellites: Vec<SatelliteDump>,
    pub edges: Vec<EdgeDump>,
    pub overlays: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub kind: String,
    pub type_iri: Option<String>,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub context_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteDump {
    pub role: &'static str,
    pub id: String,
    pub label: String,
    pub kind: String,
    pub host: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub kind: String,
    pub from: String,
    pub to: String,
    pub points: Vec<[f32; 2]>,
}

impl SceneDump {
    pub fn from_scene(scene: &Scene, overlays: &BTreeMap<String, BTreeSet<String>>) -> Self {
        let nodes = scene
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                label: node.label.clone(),
                kind: node.kind.as_str().to_string(),
                type_iri: node.type_iri.clone(),
                depth: node.depth,
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
                context_ids: node.context_ids.clone(),
            })
            .collect();

        let satellite = |role: &'static str, sat: &SatelliteNode| SatelliteDump {
            role,
            id: sat.id.clone(),
            label: sat.label.clone(),
            kind: sat.kind.as_str().to_string(),
            host: sat.host.clone(),
            x: sat.x,
            y: sat.y,
            width: sat.width,
            height: sat.height,
        };
        let satellites = scene
            .contexts
            .iter()
            .map(|sat| satellite("context", sat))
            .chain(scene.defeaters.iter().map(|sat| satellite("defeater", sat)))
            .collect();

        let edges = scene.edges().map(EdgeDump::from_edge).collect();
        let (width, height) = scene
            .bounds()
            .map(|b| (b.right(), b.bottom()))
            .unwrap_or((0.0, 0.0));

        SceneDump {
            roots: scene.roots.clone(),
            width,
            height,
            nodes,
            satellites,
            edges,
            overlays: overlays
                .iter()
                .map(|(class, ids)| (class.clone(), ids.iter().cloned().collect()))
                .collect(),
        }
    }
}

impl EdgeDump {
    fn from_edge(edge: &EdgeLayout) -> Self {
        EdgeDump {
            kind: edge.kind.as_str().to_string(),
            from: edge.from.clone(),
            to: edge.to.clone(),
            points: edge.points.iter().map(|(x, y)| [*x, *y]).collect(),
        }
    }
}

pub fn write_scene_dump(
    path: &Path,
    scene: &Scene,
    overlays: &BTreeMap<String, BTreeSet<String>>,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = SceneDump::from_scene(scene, overlays);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
