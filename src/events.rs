use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::ir::NodeKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub type_iri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DiagramEvent {
    NodeActivated(NodeRef),
    NodeOpened(NodeRef),
    ContextActivated { id: String, label: String },
    DefeaterActivated { id: String, label: String },
}

impl DiagramEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DiagramEvent::NodeActivated(_) => "node-activated",
            DiagramEvent::NodeOpened(_) => "node-opened",
            DiagramEvent::ContextActivated { .. } => "context-activated",
            DiagramEvent::DefeaterActivated { .. } => "defeater-activated",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: DiagramEvent);
}

impl EventSink for UnboundedSender<DiagramEvent> {
    fn emit(&self, event: DiagramEvent) {
        // A closed receiver means the host stopped listening.
        let _ = self.send(event);
    }
}

/// Adapts a plain callback into an [`EventSink`].
pub struct CallbackSink<F>(pub F);

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(DiagramEvent) + Send + Sync,
{
    fn emit(&self, event: DiagramEvent) {
        (self.0)(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRole {
    Node,
    Context,
    Defeater,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitTarget {
    pub node: NodeRef,
    pub role: HitRole,
}

impl HitTarget {
    fn activation(&self) -> Vec<DiagramEvent> {
        let mut events = vec![DiagramEvent::NodeActivated(self.node.clone())];
        let (id, label) = (self.node.id.clone(), self.node.label.clone());
        match self.role {
            HitRole::Node => {}
            HitRole::Context => events.push(DiagramEvent::ContextActivated { id, label }),
            HitRole::Defeater => events.push(DiagramEvent::DefeaterActivated { id, label }),
        }
        events
    }
}

/// Holds a single click back for the double-click window so that a
/// double-click never also fires the single-click activation.
#[derive(Debug, Clone)]
pub struct ClickResolver {
    window: Duration,
    pending: Option<(HitTarget, Instant)>,
}

impl ClickResolver {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn click(&mut self, target: HitTarget, now: Instant) -> Vec<DiagramEvent> {
        let mut events = Vec::new();
        if let Some((pending, at)) = self.pending.take() {
            let same_gesture = pending.node.id == target.node.id && now.saturating_duration_since(at) < self.window;
            if same_gesture {
                self.pending = Some((pending, at));
                return events;
            }
            events.extend(pending.activation());
        }
        self.pending = Some((target, now));
        events
    }

    pub fn double_click(&mut self, target: HitTarget, now: Instant) -> Vec<DiagramEvent> {
        let mut events = Vec::new();
        if let Some((pending, at)) = self.pending.take() {
            let same_gesture = pending.node.id == target.node.id && now.saturating_duration_since(at) < self.window;
            if !same_gesture {
                events.extend(pending.activation());
            }
        }
        events.push(DiagramEvent::NodeOpened(target.node));
        events
    }

    /// Releases a held click once its window has passed.
    pub fn poll(&mut self, now: Instant) -> Vec<DiagramEvent> {
        let ready = matches!(
            &self.pending,
            Some((_, at)) if now.saturating_duration_since(*at) >= self.window
        );
        if !ready {
            return Vec::new();
        }
        self.pending
            .take()
            .map(|(target, _)| target.activation())
            .unwrap_or_default()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, role: HitRole) -> HitTarget {
        HitTarget {
            node: NodeRef {
                id: id.to_string(),
                label: id.to_string(),
                kind: NodeKind::Goal,
                type_iri: None,
            },
            role,
        }
    }

    #[test]
    fn single_click_fires_after_window() {
        let mut resolver = ClickResolver::new(Duration::from_millis(250));
        let t0 = Instant::now();
        assert!(resolver.click(target("G1", HitRole::Node), t0).is_empty());
        assert!(resolver.poll(t0 + Duration::from_millis(100)).is_empty());
        let events = resolver.poll(t0 + Duration::from_millis(300));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "node-activated");
        assert!(resolver.poll(t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn double_click_suppresses_single_click() {
        let mut resolver = ClickResolver::new(Duration::from_millis(250));
        let t0 = Instant::now();
        resolver.click(target("G1", HitRole::Node), t0);
        resolver.click(target("G1", HitRole::Node), t0 + Duration::from_millis(80));
        let events = resolver.double_click(target("G1", HitRole::Node), t0 + Duration::from_millis(90));
        assert_eq!(events.iter().map(DiagramEvent::name).collect::<Vec<_>>(), vec!["node-opened"]);
        assert!(resolver.poll(t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn context_click_also_emits_context_activation() {
        let mut resolver = ClickResolver::new(Duration::ZERO);
        let t0 = Instant::now();
        resolver.click(target("C1", HitRole::Context), t0);
        let names: Vec<&str> = resolver.poll(t0).iter().map(DiagramEvent::name).collect();
        assert_eq!(names, vec!["node-activated", "context-activated"]);
    }

    #[test]
    fn click_on_another_node_releases_the_held_click() {
        let mut resolver = ClickResolver::new(Duration::from_millis(250));
        let t0 = Instant::now();
        resolver.click(target("G1", HitRole::Node), t0);
        let events = resolver.click(target("D1", HitRole::Defeater), t0 + Duration::from_millis(10));
        assert_eq!(events, vec![DiagramEvent::NodeActivated(target("G1", HitRole::Node).node)]);
    }

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let event = DiagramEvent::ContextActivated {
            id: "C1".to_string(),
            label: "C1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "context-activated");
        assert_eq!(json["id"], "C1");
    }
}
