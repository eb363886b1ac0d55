//! Radial "hub and spoke" groupings drawn over an existing scene.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use serde::Serialize;

use crate::config::CollectionLayout;
use crate::ir::{Row, cell};
use crate::layout::Bounds;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionGroup {
    pub anchor: String,
    pub group: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedItem {
    pub id: String,
    pub label: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubLayout {
    pub anchor: String,
    pub group: String,
    pub label: String,
    pub anchor_point: (f32, f32),
    pub x: f32,
    pub y: f32,
    pub hub_radius: f32,
    pub item_radius: f32,
    pub items: Vec<PlacedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionsOverlay {
    pub hubs: Vec<HubLayout>,
}

impl CollectionsOverlay {
    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }
}

/// Groups `{ctx, clt, item}` rows by `(anchor, group)` in first-seen order.
/// Rows missing a column are skipped.
pub fn group_rows(rows: &[Row]) -> Vec<CollectionGroup> {
    let mut groups: Vec<CollectionGroup> = Vec::new();
    for row in rows {
        let (Some(anchor), Some(group), Some(item)) =
            (cell(row, "ctx"), cell(row, "clt"), cell(row, "item"))
        else {
            continue;
        };
        let idx = match groups
            .iter()
            .position(|g| g.anchor == anchor && g.group == group)
        {
            Some(idx) => idx,
            None => {
                groups.push(CollectionGroup {
                    anchor: anchor.to_string(),
                    group: group.to_string(),
                    items: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let items = &mut groups[idx].items;
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    groups
}

/// Places hubs and items for every group whose anchor has a known position.
/// Groups with an unknown anchor are dropped.
pub fn layout_collections(
    groups: &[CollectionGroup],
    positions: &BTreeMap<String, Bounds>,
    label: &dyn Fn(&str) -> String,
    layout: &CollectionLayout,
) -> CollectionsOverlay {
    let mut overlay = CollectionsOverlay::default();
    let mut stacked: BTreeMap<&str, usize> = BTreeMap::new();
    let per_ring = layout.max_per_row.max(1);
    let start = layout.start_angle_deg.to_radians();

    for group in groups {
        let Some(anchor) = positions.get(&group.anchor) else {
            tracing::warn!(anchor = %group.anchor, group = %group.group, "collection anchor not in scene; skipping");
            continue;
        };
        let slot = stacked.entry(group.anchor.as_str()).or_insert(0);
        let hub_x = anchor.right() + layout.hub_offset_x;
        let hub_y = anchor.bottom() + layout.hub_offset_y + *slot as f32 * layout.hub_stack_gap;
        *slot += 1;

        let items = group
            .items
            .iter()
            .enumerate()
            .map(|(idx, id)| {
                let ring = idx / per_ring;
                let in_ring = (group.items.len() - ring * per_ring).min(per_ring);
                let step = TAU / in_ring as f32;
                let angle = start + (idx % per_ring) as f32 * step;
                let radius = layout.ring_radius + ring as f32 * layout.ring_gap;
                PlacedItem {
                    id: id.clone(),
                    label: label(id),
                    x: hub_x + radius * angle.cos(),
                    y: hub_y + radius * angle.sin(),
                }
            })
            .collect();

        overlay.hubs.push(HubLayout {
            anchor: group.anchor.clone(),
            group: group.group.clone(),
            label: label(&group.group),
            anchor_point: (anchor.right(), anchor.center().1),
            x: hub_x,
            y: hub_y,
            hub_radius: layout.hub_radius,
            item_radius: layout.item_radius,
            items,
        });
    }
    overlay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::row_from_pairs;
    use crate::layout::default_label;

    fn positions() -> BTreeMap<String, Bounds> {
        let mut map = BTreeMap::new();
        map.insert("C1".to_string(), Bounds::new(100.0, 0.0, 60.0, 36.0));
        map
    }

    fn collection_rows(triples: &[(&str, &str, &str)]) -> Vec<Row> {
        triples
            .iter()
            .map(|&(ctx, clt, item)| row_from_pairs(&[("ctx", ctx), ("clt", clt), ("item", item)]))
            .collect()
    }

    #[test]
    fn rows_group_by_anchor_and_collection() {
        let groups = group_rows(&collection_rows(&[
            ("C1", "K1", "i1"),
            ("C1", "K1", "i2"),
            ("C1", "K2", "i3"),
            ("C1", "K1", "i1"),
        ]));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].items, vec!["i1", "i2"]);
        assert_eq!(groups[1].group, "K2");
    }

    #[test]
    fn unknown_anchor_is_skipped() {
        let groups = group_rows(&collection_rows(&[("missing", "K", "i1"), ("C1", "K", "i2")]));
        let overlay = layout_collections(&groups, &positions(), &default_label, &CollectionLayout::default());
        assert_eq!(overlay.hubs.len(), 1);
        assert_eq!(overlay.hubs[0].anchor, "C1");
    }

    #[test]
    fn hubs_under_one_anchor_stack_vertically() {
        let groups = group_rows(&collection_rows(&[("C1", "K1", "a"), ("C1", "K2", "b")]));
        let layout = CollectionLayout::default();
        let overlay = layout_collections(&groups, &positions(), &default_label, &layout);
        assert_eq!(overlay.hubs[0].x, overlay.hubs[1].x);
        assert!((overlay.hubs[1].y - overlay.hubs[0].y - layout.hub_stack_gap).abs() < 1e-4);
    }

    #[test]
    fn items_fill_concentric_rings() {
        let triples: Vec<(String, String, String)> = (0..5)
            .map(|i| ("C1".to_string(), "K".to_string(), format!("i{i}")))
            .collect();
        let rows: Vec<Row> = triples
            .iter()
            .map(|(a, b, c)| row_from_pairs(&[("ctx", a.as_str()), ("clt", b.as_str()), ("item", c.as_str())]))
            .collect();
        let layout = CollectionLayout {
            max_per_row: 3,
            ..CollectionLayout::default()
        };
        let overlay = layout_collections(&group_rows(&rows), &positions(), &default_label, &layout);
        let hub = &overlay.hubs[0];
        let distance = |item: &PlacedItem| ((item.x - hub.x).powi(2) + (item.y - hub.y).powi(2)).sqrt();
        assert!((distance(&hub.items[0]) - layout.ring_radius).abs() < 1e-3);
        assert!((distance(&hub.items[3]) - (layout.ring_radius + layout.ring_gap)).abs() < 1e-3);
        // First item sits at the start angle (straight up by default).
        assert!((hub.items[0].x - hub.x).abs() < 1e-3);
        assert!(hub.items[0].y < hub.y);
    }
}
