use std::path::{Path, PathBuf};

use gsn_diagram::config::{SceneConfig, Vocabulary};
use gsn_diagram::controller::UNDEVELOPED_CLASS;
use gsn_diagram::ir::{NodeKind, QueryResult, relation_rows};
use gsn_diagram::layout::{EdgeKind, default_label};
use gsn_diagram::parser::{parse_result, parse_rows};
use gsn_diagram::{DiagramController, MountOptions, QueryRunner, RenderOutcome, Surface, build_scene, render};

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("fixture read failed")
}

fn scene_for(name: &str) -> gsn_diagram::Scene {
    let rows = parse_rows(&read_fixture(name)).expect("parse failed");
    build_scene(
        &relation_rows(&rows),
        &default_label,
        &Vocabulary::default(),
        &SceneConfig::default(),
    )
}

#[test]
fn render_all_fixtures() {
    // Keep this list explicit so new inputs must be added intentionally.
    let candidates = ["basic.json", "ontology.json", "multi_parent.json5", "cycle.ttl"];
    for name in candidates {
        let svg = render(&read_fixture(name)).unwrap_or_else(|err| panic!("{name}: {err}"));
        assert!(svg.contains("<svg"), "{name}: missing <svg tag");
        assert!(svg.contains("</svg>"), "{name}: missing </svg tag");
    }
}

#[test]
fn basic_case_matches_expected_structure() {
    let scene = scene_for("basic.json");
    assert_eq!(scene.roots, vec!["G1"]);
    let kinds: Vec<NodeKind> = ["G1", "S1", "Sn1"]
        .iter()
        .map(|id| scene.node(id).expect("node").kind)
        .collect();
    assert_eq!(kinds, vec![NodeKind::Goal, NodeKind::Strategy, NodeKind::Solution]);
    let tree: Vec<(&str, &str)> = scene
        .tree_edges
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    assert_eq!(tree, vec![("G1", "S1"), ("S1", "Sn1")]);
    assert!(scene.extra_edges.is_empty());
    assert_eq!(scene.contexts.len(), 1);
    assert_eq!(scene.contexts[0].host, "G1");
    assert_eq!(scene.context_edges.len(), 1);
}

#[test]
fn ontology_types_drive_kinds() {
    let scene = scene_for("ontology.json");
    let node = |local: &str| {
        scene
            .nodes
            .iter()
            .find(|n| n.label == local)
            .unwrap_or_else(|| panic!("missing {local}"))
    };
    assert_eq!(node("Str1").kind, NodeKind::Strategy);
    assert_eq!(node("Ev1").kind, NodeKind::Solution);
    assert_eq!(scene.contexts[0].kind, NodeKind::Assumption);
    assert_eq!(scene.defeaters[0].kind, NodeKind::Defeater);
    assert_eq!(scene.defeaters[0].host, "https://example.org/brake#Str1");
}

#[test]
fn shared_child_keeps_every_parent_edge() {
    let scene = scene_for("multi_parent.json5");
    assert_eq!(scene.nodes.len(), 4);
    let incoming = scene.incoming_structural("Sn1");
    assert_eq!(incoming.len(), 2);
    assert_eq!(incoming.iter().filter(|e| e.kind == EdgeKind::Extra).count(), 1);
}

#[test]
fn cycles_are_broken_and_detached_loops_still_placed() {
    let scene = scene_for("cycle.ttl");
    assert_eq!(scene.nodes.len(), 5);
    assert_eq!(scene.roots[0], "G1");
    assert_eq!(scene.roots.len(), 2);
    assert_eq!(scene.extra_edges.len(), 2);
    for node in &scene.nodes {
        assert!(scene.position(&node.id).is_some(), "{} unpositioned", node.id);
    }
}

#[test]
fn scene_building_is_deterministic() {
    for name in ["basic.json", "ontology.json", "multi_parent.json5", "cycle.ttl"] {
        assert_eq!(scene_for(name), scene_for(name), "{name}");
    }
}

struct FixtureRunner;

#[async_trait::async_trait]
impl QueryRunner for FixtureRunner {
    async fn run_query(&self, query: &str) -> anyhow::Result<QueryResult> {
        let content = tokio::fs::read_to_string(fixture_path(query)).await?;
        parse_result(&content)
    }
}

#[tokio::test]
async fn controller_layers_overlays_and_collections() {
    let controller = DiagramController::new(
        FixtureRunner,
        MountOptions::default(),
        Default::default(),
    );
    controller.attach(Surface::new("pane", 900.0, 600.0)).await;

    let rendered = controller.execute("basic.json", None).await.unwrap();
    assert_eq!(rendered, RenderOutcome::Rendered { nodes: 3 });
    let highlighted = controller
        .execute("undeveloped.json", Some(UNDEVELOPED_CLASS))
        .await
        .unwrap();
    assert!(matches!(highlighted, RenderOutcome::Highlighted { count: 1, .. }));
    let collections = controller.execute("collections.json", None).await.unwrap();
    assert_eq!(collections, RenderOutcome::Collections { hubs: 1 });

    let svg = controller.to_svg().await.unwrap();
    assert!(svg.contains("<polygon class=\"undeveloped-marker"));
    assert!(svg.contains("<circle class=\"collection-hub"));
    assert!(svg.contains(">H3</text>"));
    assert!(!svg.contains(">O1</text>"));

    assert!(controller.execute("missing.json", None).await.is_err());
    assert_eq!(controller.scene().await.unwrap().nodes.len(), 3);
}
