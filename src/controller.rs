//! Glue between query execution and the renderer.
//!
//! The controller owns the drawing surface, the current [`DiagramHandle`] and
//! the named overlay sets. Query results are dispatched by their column
//! shape: relation rows rebuild the diagram, `{s}` rows replace an overlay
//! class, and `{ctx, clt, item}` rows draw collections.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::collections::{group_rows, layout_collections};
use crate::config::{CollectionLayout, Config, PropagationQueries, SceneConfig, ViewportConfig, Vocabulary};
use crate::error::{DiagramError, Result};
use crate::events::{DiagramEvent, EventSink};
use crate::ir::{QueryResult, Row, cell, relation_rows};
use crate::layout::{Scene, build_scene, default_label};
use crate::render::Renderer;
use crate::theme::Theme;
use crate::viewport::Transform;

pub use crate::render::UNDEVELOPED_CLASS;

pub const IN_CONTEXT_CLASS: &str = "in-context";
pub const DEFEATER_PROPAGATION_CLASS: &str = "def-prop";
pub const DEFAULT_OVERLAY_CLASS: &str = "highlight";

pub type LabelFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, query: &str) -> anyhow::Result<QueryResult>;
}

#[async_trait]
impl<T: QueryRunner + ?Sized> QueryRunner for Arc<T> {
    async fn run_query(&self, query: &str) -> anyhow::Result<QueryResult> {
        (**self).run_query(query).await
    }
}

/// A drawable region handed over by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub id: String,
    pub width: f32,
    pub height: f32,
}

impl Surface {
    pub fn new(id: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
        }
    }
}

#[derive(Clone)]
pub struct MountOptions {
    pub height: f32,
    pub width: Option<f32>,
    pub label: LabelFn,
    pub vocabulary: Vocabulary,
    pub scene: SceneConfig,
    pub collections: CollectionLayout,
    pub viewport: ViewportConfig,
    pub theme: Theme,
    pub sink: Option<Arc<dyn EventSink>>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl MountOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            height: config.render.height,
            width: None,
            label: Arc::new(default_label),
            vocabulary: config.vocabulary.clone(),
            scene: config.scene.clone(),
            collections: config.collections.clone(),
            viewport: config.viewport.clone(),
            theme: config.theme.clone(),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Pins the renderer width instead of following the surface.
    pub fn with_width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_label(mut self, label: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.label = Arc::new(label);
        self
    }
}

/// Builds and draws a diagram from relation rows onto `container`.
pub fn mount(container: Option<&Surface>, rows: &[Row], options: MountOptions) -> Result<DiagramHandle> {
    let surface = container.ok_or(DiagramError::MissingTarget { target: "container" })?;
    let width = options.width.unwrap_or(surface.width);
    let relations = relation_rows(rows);
    let label = options.label.clone();
    let scene = build_scene(&relations, &*label, &options.vocabulary, &options.scene);

    let mut renderer = Renderer::new(width, options.height, options.theme, options.viewport.clone());
    renderer.render(&scene);
    renderer.fit_immediately(options.viewport.fit_padding);

    Ok(DiagramHandle {
        surface_id: surface.id.clone(),
        scene,
        renderer,
        label,
        collections: options.collections,
        padding: options.viewport.fit_padding,
        sink: options.sink,
    })
}

pub struct DiagramHandle {
    surface_id: String,
    scene: Scene,
    renderer: Renderer,
    label: LabelFn,
    collections: CollectionLayout,
    padding: f32,
    sink: Option<Arc<dyn EventSink>>,
}

impl DiagramHandle {
    pub fn surface_id(&self) -> &str {
        &self.surface_id
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn fit(&mut self) -> Option<Transform> {
        self.renderer.fit(self.padding)
    }

    pub fn reset(&mut self) {
        self.renderer.reset();
    }

    pub fn destroy(&mut self) {
        self.renderer.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.renderer.is_destroyed()
    }

    pub fn highlight_by_ids<I, S>(&mut self, ids: I, class: &str)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.renderer.highlight(ids, class);
    }

    /// Drops every highlight class and the undeveloped decorations. The
    /// collections overlay is left in place; use [`Self::clear_collections`]
    /// for that.
    pub fn clear_all(&mut self) {
        self.renderer.clear_all();
    }

    /// Replaces the collections overlay. Returns the number of hubs drawn.
    pub fn add_collections(&mut self, rows: &[Row]) -> usize {
        self.renderer.clear_collections();
        let groups = group_rows(rows);
        let overlay = layout_collections(&groups, &self.scene.positions, &*self.label, &self.collections);
        self.renderer.draw_collections(&overlay);
        overlay.hubs.len()
    }

    pub fn clear_collections(&mut self) {
        self.renderer.clear_collections();
    }

    pub fn click(&mut self, id: &str, now: Instant) -> Vec<DiagramEvent> {
        let events = self.renderer.click(id, now);
        self.forward(events)
    }

    pub fn double_click(&mut self, id: &str, now: Instant) -> Vec<DiagramEvent> {
        let events = self.renderer.double_click(id, now);
        self.forward(events)
    }

    pub fn click_at(&mut self, x: f32, y: f32, now: Instant) -> Vec<DiagramEvent> {
        let events = self.renderer.click_at(x, y, now);
        self.forward(events)
    }

    pub fn double_click_at(&mut self, x: f32, y: f32, now: Instant) -> Vec<DiagramEvent> {
        let events = self.renderer.double_click_at(x, y, now);
        self.forward(events)
    }

    pub fn poll(&mut self, now: Instant) -> Vec<DiagramEvent> {
        let events = self.renderer.poll(now);
        self.forward(events)
    }

    fn forward(&self, events: Vec<DiagramEvent>) -> Vec<DiagramEvent> {
        if let Some(sink) = &self.sink {
            for event in &events {
                sink.emit(event.clone());
            }
        }
        events
    }

    pub fn to_svg(&self) -> String {
        self.renderer.to_svg()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Relations,
    Collections,
    Highlight,
    Other,
}

impl ResultShape {
    /// Classifies a result by its declared columns together with every
    /// column name present in its rows.
    pub fn classify(result: &QueryResult) -> Self {
        let columns: BTreeSet<&str> = result
            .columns
            .iter()
            .map(String::as_str)
            .chain(result.rows.iter().flat_map(|row| row.keys().map(String::as_str)))
            .collect();
        let has = |name: &str| columns.contains(name);

        if has("s") && has("p") && has("o") {
            let only_relation_columns = columns
                .iter()
                .all(|col| matches!(*col, "s" | "p" | "o" | "typeS" | "typeO"));
            if only_relation_columns {
                return ResultShape::Relations;
            }
        }
        if columns.len() == 3 && has("ctx") && has("clt") && has("item") {
            return ResultShape::Collections;
        }
        if columns.len() == 1 && has("s") {
            return ResultShape::Highlight;
        }
        ResultShape::Other
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered { nodes: usize },
    /// A newer rebuild was requested while this one was in flight; its
    /// result was discarded.
    Superseded,
    Highlighted { class: String, count: usize },
    Collections { hubs: usize },
    Ignored,
}

#[derive(Default)]
struct ControllerState {
    surface: Option<Surface>,
    handle: Option<DiagramHandle>,
    overlays: BTreeMap<String, BTreeSet<String>>,
}

impl ControllerState {
    fn reapply_overlays(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        handle.clear_all();
        for (class, ids) in &self.overlays {
            handle.highlight_by_ids(ids, class);
        }
    }
}

pub struct DiagramController<Q> {
    runner: Q,
    options: MountOptions,
    propagation: PropagationQueries,
    state: Mutex<ControllerState>,
    sequence: AtomicU64,
    latest_rebuild: AtomicU64,
}

impl<Q: QueryRunner> DiagramController<Q> {
    pub fn new(runner: Q, options: MountOptions, propagation: PropagationQueries) -> Self {
        Self {
            runner,
            options,
            propagation,
            state: Mutex::new(ControllerState::default()),
            sequence: AtomicU64::new(0),
            latest_rebuild: AtomicU64::new(0),
        }
    }

    pub fn from_config(runner: Q, config: &Config) -> Self {
        Self::new(runner, MountOptions::from_config(config), config.propagation.clone())
    }

    /// Takes ownership of `surface`. Any diagram on the previous surface is
    /// destroyed first.
    pub async fn attach(&self, surface: Surface) {
        let mut state = self.state.lock().await;
        if let Some(mut handle) = state.handle.take() {
            handle.destroy();
        }
        tracing::debug!(surface = %surface.id, "surface attached");
        state.surface = Some(surface);
    }

    pub async fn detach(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut handle) = state.handle.take() {
            handle.destroy();
        }
        state.surface = None;
    }

    /// Runs `query` and dispatches on the shape of its result. `overlay_class`
    /// names the class replaced by an `{s}` result.
    ///
    /// A call without an overlay class is a rebuild request: it is tagged when
    /// issued, and any older rebuild still in flight is discarded when it
    /// completes. With an overlay class, an empty result clears that class.
    pub async fn execute(&self, query: &str, overlay_class: Option<&str>) -> Result<RenderOutcome> {
        let ticket = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        if overlay_class.is_none() {
            self.latest_rebuild.fetch_max(ticket, Ordering::SeqCst);
        }
        let result = match self.runner.run_query(query).await {
            Ok(result) => result,
            Err(source) => {
                tracing::warn!(error = %source, "query failed; diagram left unchanged");
                return Err(DiagramError::Query {
                    query: query.to_string(),
                    source,
                });
            }
        };

        let shape = match ResultShape::classify(&result) {
            ResultShape::Other if result.rows.is_empty() && overlay_class.is_some() => ResultShape::Highlight,
            shape => shape,
        };
        tracing::debug!(?shape, rows = result.rows.len(), ticket, "dispatching query result");
        match shape {
            ResultShape::Relations => self.rebuild(ticket, &result.rows).await,
            ResultShape::Highlight => {
                let class = overlay_class.unwrap_or(DEFAULT_OVERLAY_CLASS);
                let ids = result.rows.iter().filter_map(|row| cell(row, "s"));
                Ok(self.set_overlay(class, ids).await)
            }
            ResultShape::Collections => {
                let mut state = self.state.lock().await;
                match state.handle.as_mut() {
                    Some(handle) => Ok(RenderOutcome::Collections {
                        hubs: handle.add_collections(&result.rows),
                    }),
                    None => Ok(RenderOutcome::Ignored),
                }
            }
            ResultShape::Other => Ok(RenderOutcome::Ignored),
        }
    }

    async fn rebuild(&self, ticket: u64, rows: &[Row]) -> Result<RenderOutcome> {
        let surface = self.state.lock().await.surface.clone();
        let mut handle = mount(surface.as_ref(), rows, self.options.clone())?;

        let mut state = self.state.lock().await;
        let latest = self.latest_rebuild.load(Ordering::SeqCst);
        if ticket < latest || state.surface.as_ref() != surface.as_ref() {
            tracing::warn!(ticket, latest, "stale render discarded");
            handle.destroy();
            return Ok(RenderOutcome::Superseded);
        }
        if let Some(mut previous) = state.handle.replace(handle) {
            previous.destroy();
        }
        self.latest_rebuild.fetch_max(ticket, Ordering::SeqCst);
        state.reapply_overlays();
        let nodes = state.handle.as_ref().map_or(0, |h| h.scene().nodes.len());
        Ok(RenderOutcome::Rendered { nodes })
    }

    /// Replaces one overlay class and reapplies the union of all classes.
    pub async fn set_overlay<I, S>(&self, class: &str, ids: I) -> RenderOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members: BTreeSet<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        let count = members.len();
        let mut state = self.state.lock().await;
        if members.is_empty() {
            state.overlays.remove(class);
        } else {
            state.overlays.insert(class.to_string(), members);
        }
        state.reapply_overlays();
        RenderOutcome::Highlighted {
            class: class.to_string(),
            count,
        }
    }

    pub async fn clear_overlays(&self) {
        let mut state = self.state.lock().await;
        state.overlays.clear();
        state.reapply_overlays();
    }

    pub async fn overlays(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.state.lock().await.overlays.clone()
    }

    pub async fn context_activated(&self, id: &str) -> Result<RenderOutcome> {
        self.clear_overlays().await;
        let query = self.propagation.context_query(id);
        self.execute(&query, Some(IN_CONTEXT_CLASS)).await
    }

    pub async fn defeater_activated(&self, id: &str) -> Result<RenderOutcome> {
        self.clear_overlays().await;
        let query = self.propagation.defeater_query(id);
        self.execute(&query, Some(DEFEATER_PROPAGATION_CLASS)).await
    }

    /// Routes context and defeater activations into their propagation
    /// queries. Other events need no controller action.
    pub async fn handle_event(&self, event: &DiagramEvent) -> Result<Option<RenderOutcome>> {
        match event {
            DiagramEvent::ContextActivated { id, .. } => self.context_activated(id).await.map(Some),
            DiagramEvent::DefeaterActivated { id, .. } => self.defeater_activated(id).await.map(Some),
            DiagramEvent::NodeActivated(_) | DiagramEvent::NodeOpened(_) => Ok(None),
        }
    }

    pub async fn click(&self, id: &str, now: Instant) -> Result<Vec<DiagramEvent>> {
        let events = self.with_handle(|handle| handle.click(id, now)).await;
        self.route(events).await
    }

    pub async fn double_click(&self, id: &str, now: Instant) -> Result<Vec<DiagramEvent>> {
        let events = self.with_handle(|handle| handle.double_click(id, now)).await;
        self.route(events).await
    }

    /// Releases any held click whose double-click window has passed.
    pub async fn poll(&self, now: Instant) -> Result<Vec<DiagramEvent>> {
        let events = self.with_handle(|handle| handle.poll(now)).await;
        self.route(events).await
    }

    async fn route(&self, events: Vec<DiagramEvent>) -> Result<Vec<DiagramEvent>> {
        for event in &events {
            self.handle_event(event).await?;
        }
        Ok(events)
    }

    async fn with_handle<T: Default>(&self, f: impl FnOnce(&mut DiagramHandle) -> T) -> T {
        let mut state = self.state.lock().await;
        state.handle.as_mut().map(f).unwrap_or_default()
    }

    pub async fn fit(&self) -> Option<Transform> {
        self.with_handle(|handle| handle.fit()).await
    }

    pub async fn reset(&self) {
        self.with_handle(|handle| handle.reset()).await
    }

    pub async fn clear_collections(&self) {
        self.with_handle(|handle| handle.clear_collections()).await
    }

    pub async fn scene(&self) -> Option<Scene> {
        self.state.lock().await.handle.as_ref().map(|h| h.scene().clone())
    }

    pub async fn to_svg(&self) -> Option<String> {
        self.state.lock().await.handle.as_ref().map(DiagramHandle::to_svg)
    }

    pub async fn destroy(&self) {
        if let Some(handle) = self.state.lock().await.handle.as_mut() {
            handle.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::row_from_pairs;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeRunner {
        results: HashMap<String, QueryResult>,
        gates: HashMap<String, Arc<Notify>>,
    }

    impl FakeRunner {
        fn with(mut self, query: &str, rows: Vec<Row>) -> Self {
            self.results.insert(query.to_string(), QueryResult::new(rows));
            self
        }

        fn gated(mut self, query: &str, gate: Arc<Notify>) -> Self {
            self.gates.insert(query.to_string(), gate);
            self
        }
    }

    #[async_trait]
    impl QueryRunner for FakeRunner {
        async fn run_query(&self, query: &str) -> anyhow::Result<QueryResult> {
            if let Some(gate) = self.gates.get(query) {
                gate.notified().await;
            }
            self.results
                .get(query)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such query"))
        }
    }

    fn relations(triples: &[(&str, &str, &str)]) -> Vec<Row> {
        triples
            .iter()
            .map(|&(s, p, o)| row_from_pairs(&[("s", s), ("p", p), ("o", o)]))
            .collect()
    }

    fn ids(values: &[&str]) -> Vec<Row> {
        values.iter().map(|&s| row_from_pairs(&[("s", s)])).collect()
    }

    fn gsn_rows() -> Vec<Row> {
        relations(&[
            ("G1", "supportedBy", "S1"),
            ("S1", "supportedBy", "Sn1"),
            ("G1", "inContextOf", "C1"),
            ("D1", "challenges", "S1"),
        ])
    }

    async fn attached(runner: FakeRunner) -> DiagramController<FakeRunner> {
        let controller = DiagramController::new(runner, MountOptions::default(), PropagationQueries::default());
        controller.attach(Surface::new("pane", 800.0, 600.0)).await;
        controller
    }

    #[test]
    fn result_shapes_are_classified_by_columns() {
        let classify = |rows: Vec<Row>| ResultShape::classify(&QueryResult::new(rows));
        assert_eq!(classify(gsn_rows()), ResultShape::Relations);
        let typed = vec![row_from_pairs(&[("s", "G1"), ("p", "supportedBy"), ("o", "S1"), ("typeS", "gsn:Goal")])];
        assert_eq!(classify(typed), ResultShape::Relations);
        let groups = vec![row_from_pairs(&[("ctx", "C1"), ("clt", "K"), ("item", "i")])];
        assert_eq!(classify(groups), ResultShape::Collections);
        assert_eq!(classify(ids(&["G1"])), ResultShape::Highlight);
        assert_eq!(classify(vec![row_from_pairs(&[("x", "1")])]), ResultShape::Other);
        assert_eq!(classify(Vec::new()), ResultShape::Other);
        let declared = QueryResult::new(Vec::new()).with_columns(["s"]);
        assert_eq!(ResultShape::classify(&declared), ResultShape::Highlight);
    }

    #[test]
    fn mount_follows_surface_width_unless_pinned() {
        let surface = Surface::new("pane", 640.0, 480.0);
        let options = MountOptions::from_config(&Config::default());
        assert_eq!(options.width, None);
        let handle = mount(Some(&surface), &gsn_rows(), options.clone()).unwrap();
        assert_eq!(handle.renderer().size().0, 640.0);
        let pinned = mount(Some(&surface), &gsn_rows(), options.with_width(900.0)).unwrap();
        assert_eq!(pinned.renderer().size().0, 900.0);
    }

    #[test]
    fn handle_clear_all_keeps_collections() {
        let surface = Surface::new("pane", 800.0, 600.0);
        let mut handle = mount(Some(&surface), &gsn_rows(), MountOptions::default()).unwrap();
        handle.add_collections(&[row_from_pairs(&[("ctx", "C1"), ("clt", "K"), ("item", "i1")])]);
        handle.highlight_by_ids(["G1"], "focus");
        let drawn = handle.renderer().collection_primitive_count();
        handle.clear_all();
        assert!(handle.renderer().classes_of("G1").is_empty());
        assert_eq!(handle.renderer().collection_primitive_count(), drawn);
    }

    #[test]
    fn mount_requires_a_container() {
        let err = mount(None, &gsn_rows(), MountOptions::default()).err().unwrap();
        assert!(matches!(err, DiagramError::MissingTarget { .. }));
    }

    #[test]
    fn handle_collections_replace_previous_overlay() {
        let surface = Surface::new("pane", 800.0, 600.0);
        let mut handle = mount(Some(&surface), &gsn_rows(), MountOptions::default()).unwrap();
        let rows = vec![row_from_pairs(&[("ctx", "C1"), ("clt", "K"), ("item", "i1")])];
        assert_eq!(handle.add_collections(&rows), 1);
        let drawn = handle.renderer().collection_primitive_count();
        assert_eq!(handle.add_collections(&rows), 1);
        assert_eq!(handle.renderer().collection_primitive_count(), drawn);
        handle.clear_collections();
        assert_eq!(handle.renderer().collection_primitive_count(), 0);
    }

    #[tokio::test]
    async fn relation_result_rebuilds_the_scene() {
        let controller = attached(FakeRunner::default().with("q", gsn_rows())).await;
        let outcome = controller.execute("q", None).await.unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered { nodes: 3 });
        let scene = controller.scene().await.unwrap();
        assert_eq!(scene.roots, vec!["G1"]);
        assert_eq!(scene.contexts.len(), 1);
        assert_eq!(scene.defeaters.len(), 1);
    }

    #[tokio::test]
    async fn rebuild_without_surface_fails() {
        let controller = DiagramController::new(
            FakeRunner::default().with("q", gsn_rows()),
            MountOptions::default(),
            PropagationQueries::default(),
        );
        let err = controller.execute("q", None).await.unwrap_err();
        assert!(matches!(err, DiagramError::MissingTarget { .. }));
    }

    #[tokio::test]
    async fn failed_query_leaves_scene_untouched() {
        let controller = attached(FakeRunner::default().with("q", gsn_rows())).await;
        controller.execute("q", None).await.unwrap();
        let err = controller.execute("broken", None).await.unwrap_err();
        assert!(matches!(err, DiagramError::Query { ref query, .. } if query == "broken"));
        assert_eq!(controller.scene().await.unwrap().nodes.len(), 3);
    }

    #[tokio::test]
    async fn overlays_replace_per_class_and_survive_rebuilds() {
        let runner = FakeRunner::default()
            .with("q", gsn_rows())
            .with("first", ids(&["G1", "S1"]))
            .with("second", ids(&["Sn1"]))
            .with("undev", ids(&["Sn1"]));
        let controller = attached(runner).await;
        controller.execute("q", None).await.unwrap();
        controller.execute("first", Some("focus")).await.unwrap();
        controller.execute("undev", Some(UNDEVELOPED_CLASS)).await.unwrap();
        let outcome = controller.execute("second", Some("focus")).await.unwrap();
        assert_eq!(
            outcome,
            RenderOutcome::Highlighted {
                class: "focus".to_string(),
                count: 1
            }
        );

        controller.execute("q", None).await.unwrap();
        let state = controller.state.lock().await;
        let renderer = state.handle.as_ref().unwrap().renderer();
        assert!(renderer.classes_of("G1").is_empty());
        assert_eq!(renderer.classes_of("Sn1"), vec!["focus", UNDEVELOPED_CLASS]);
    }

    #[tokio::test]
    async fn collections_need_a_scene() {
        let groups = vec![row_from_pairs(&[("ctx", "C1"), ("clt", "K"), ("item", "i1")])];
        let controller = attached(FakeRunner::default().with("q", gsn_rows()).with("c", groups)).await;
        assert_eq!(controller.execute("c", None).await.unwrap(), RenderOutcome::Ignored);
        controller.execute("q", None).await.unwrap();
        assert_eq!(
            controller.execute("c", None).await.unwrap(),
            RenderOutcome::Collections { hubs: 1 }
        );
    }

    #[tokio::test]
    async fn stale_rebuild_is_discarded() {
        let gate = Arc::new(Notify::new());
        let runner = FakeRunner::default()
            .with("slow", relations(&[("A", "supportedBy", "B")]))
            .with("fast", gsn_rows())
            .gated("slow", gate.clone());
        let controller = attached(runner).await;

        let (slow, fast, _) = tokio::join!(
            controller.execute("slow", None),
            controller.execute("fast", None),
            async { gate.notify_one() }
        );
        assert_eq!(slow.unwrap(), RenderOutcome::Superseded);
        assert_eq!(fast.unwrap(), RenderOutcome::Rendered { nodes: 3 });
        assert!(controller.scene().await.unwrap().node("G1").is_some());
    }

    #[tokio::test]
    async fn older_rebuild_finishing_first_is_never_drawn() {
        let old_gate = Arc::new(Notify::new());
        let new_gate = Arc::new(Notify::new());
        let runner = FakeRunner::default()
            .with("old", relations(&[("OLD", "supportedBy", "X")]))
            .with("new", gsn_rows())
            .gated("old", old_gate.clone())
            .gated("new", new_gate.clone());
        let controller = attached(runner).await;
        let (old_done, old_finished) = tokio::sync::oneshot::channel();

        let old = async {
            let outcome = controller.execute("old", None).await;
            let _ = old_done.send(());
            outcome
        };
        let release = async {
            old_gate.notify_one();
            let _ = old_finished.await;
            let between = controller.scene().await;
            new_gate.notify_one();
            between
        };
        let (old, new, between) = tokio::join!(old, controller.execute("new", None), release);

        assert_eq!(old.unwrap(), RenderOutcome::Superseded);
        assert!(between.is_none());
        assert_eq!(new.unwrap(), RenderOutcome::Rendered { nodes: 3 });
        let scene = controller.scene().await.unwrap();
        assert_eq!(scene.roots, vec!["G1"]);
    }

    #[tokio::test]
    async fn overlay_queries_do_not_supersede_rebuilds() {
        let gate = Arc::new(Notify::new());
        let runner = FakeRunner::default()
            .with("q", gsn_rows())
            .with("focus", ids(&["G1"]))
            .gated("q", gate.clone());
        let controller = attached(runner).await;

        let (rebuilt, highlighted, _) = tokio::join!(
            controller.execute("q", None),
            controller.execute("focus", Some("focus")),
            async { gate.notify_one() }
        );
        assert_eq!(rebuilt.unwrap(), RenderOutcome::Rendered { nodes: 3 });
        assert!(matches!(highlighted.unwrap(), RenderOutcome::Highlighted { count: 1, .. }));
        let state = controller.state.lock().await;
        let renderer = state.handle.as_ref().unwrap().renderer();
        assert_eq!(renderer.classes_of("G1"), vec!["focus"]);
    }

    #[tokio::test]
    async fn empty_rule_result_clears_its_class() {
        let runner = FakeRunner::default()
            .with("q", gsn_rows())
            .with("rule", ids(&["S1"]))
            .with("rule-now", Vec::new());
        let controller = attached(runner).await;
        controller.execute("q", None).await.unwrap();
        controller.execute("rule", Some(UNDEVELOPED_CLASS)).await.unwrap();
        assert!(controller.overlays().await.contains_key(UNDEVELOPED_CLASS));

        let outcome = controller.execute("rule-now", Some(UNDEVELOPED_CLASS)).await.unwrap();
        assert_eq!(
            outcome,
            RenderOutcome::Highlighted {
                class: UNDEVELOPED_CLASS.to_string(),
                count: 0
            }
        );
        assert!(controller.overlays().await.is_empty());
        let state = controller.state.lock().await;
        assert!(state.handle.as_ref().unwrap().renderer().classes_of("S1").is_empty());
    }

    #[tokio::test]
    async fn attaching_a_new_surface_drops_the_diagram() {
        let controller = attached(FakeRunner::default().with("q", gsn_rows())).await;
        controller.execute("q", None).await.unwrap();
        controller.attach(Surface::new("other", 400.0, 300.0)).await;
        assert!(controller.scene().await.is_none());
        controller.execute("q", None).await.unwrap();
        let state = controller.state.lock().await;
        assert_eq!(state.handle.as_ref().unwrap().surface_id(), "other");
    }

    #[tokio::test]
    async fn context_click_runs_propagation_query() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<DiagramEvent>();
        let propagation = PropagationQueries::default();
        let runner = FakeRunner::default()
            .with("q", gsn_rows())
            .with("focus", ids(&["G1"]))
            .with(&propagation.context_query("C1"), ids(&["G1", "S1", "Sn1"]));
        let options = MountOptions::default().with_sink(Arc::new(tx));
        let controller = DiagramController::new(runner, options, propagation);
        controller.attach(Surface::new("pane", 800.0, 600.0)).await;
        controller.execute("q", None).await.unwrap();
        controller.execute("focus", Some("focus")).await.unwrap();

        let now = Instant::now();
        assert!(controller.click("C1", now).await.unwrap().is_empty());
        let events = controller.poll(now + Duration::from_secs(1)).await.unwrap();
        assert_eq!(events.len(), 2);

        assert_eq!(rx.recv().await.unwrap().name(), "node-activated");
        assert_eq!(rx.recv().await.unwrap().name(), "context-activated");
        let overlays = controller.overlays().await;
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[IN_CONTEXT_CLASS].len(), 3);
    }

    #[tokio::test]
    async fn double_click_opens_without_activating() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<DiagramEvent>();
        let options = MountOptions::default().with_sink(Arc::new(tx));
        let controller = DiagramController::new(
            FakeRunner::default().with("q", gsn_rows()),
            options,
            PropagationQueries::default(),
        );
        controller.attach(Surface::new("pane", 800.0, 600.0)).await;
        controller.execute("q", None).await.unwrap();

        let now = Instant::now();
        controller.click("S1", now).await.unwrap();
        controller.double_click("S1", now + Duration::from_millis(50)).await.unwrap();
        assert!(controller.poll(now + Duration::from_secs(1)).await.unwrap().is_empty());
        assert_eq!(rx.recv().await.unwrap().name(), "node-opened");
        assert!(rx.try_recv().is_err());
    }
}
