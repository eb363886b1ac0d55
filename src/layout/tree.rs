//! Reingold–Tilford style tidy tree placement over a spanning forest.
//!
//! Each subtree carries a contour: per depth level, the leftmost and
//! rightmost extent relative to the subtree root's center. Siblings are
//! packed left to right as close as their contours allow and the parent is
//! centered over its first and last child. A forest is packed under one
//! synthetic root that is dropped from the output.

/// Horizontal footprint of one node around its center line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Extent {
    pub left: f32,
    pub right: f32,
}

impl Extent {
    pub fn symmetric(width: f32) -> Self {
        Self {
            left: width / 2.0,
            right: width / 2.0,
        }
    }
}

/// (min, max) per depth, relative to the subtree root's center.
type Contour = Vec<(f32, f32)>;

/// Returns the center x of every node in `children` index space. Nodes not
/// reachable from `roots` keep `0.0`.
pub(crate) fn tidy_layout(
    roots: &[usize],
    children: &[Vec<usize>],
    extents: &[Extent],
    spacing: f32,
) -> Vec<f32> {
    let count = children.len();
    let mut relative = vec![0.0f32; count];
    let mut centers = vec![0.0f32; count];
    if roots.is_empty() {
        return centers;
    }

    let mut pending: Vec<Option<Contour>> = vec![None; count];
    let mut contours: Vec<Contour> = Vec::with_capacity(roots.len());
    for &root in roots {
        contours.push(first_walk(root, children, extents, spacing, &mut relative, &mut pending));
    }
    let offsets = pack(&contours, spacing);

    // Roots are the children of the synthetic root, which is never emitted.
    for (&root, offset) in roots.iter().zip(offsets) {
        second_walk(root, offset, children, &relative, &mut centers);
    }
    centers
}

/// Subtree nodes with every parent ahead of its children.
fn preorder(root: usize, children: &[Vec<usize>]) -> Vec<usize> {
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        order.push(node);
        stack.extend(children[node].iter().rev().copied());
    }
    order
}

/// Computes the contour of `root`'s subtree bottom-up, recording every
/// child's offset from its parent in `relative`.
fn first_walk(
    root: usize,
    children: &[Vec<usize>],
    extents: &[Extent],
    spacing: f32,
    relative: &mut [f32],
    pending: &mut [Option<Contour>],
) -> Contour {
    for node in preorder(root, children).into_iter().rev() {
        let own = extents[node];
        let kids = &children[node];
        let mut contour = vec![(-own.left, own.right)];
        if !kids.is_empty() {
            let child_contours: Vec<Contour> = kids
                .iter()
                .map(|&child| pending[child].take().unwrap_or_default())
                .collect();
            let positions = pack(&child_contours, spacing);

            let first = positions.first().copied().unwrap_or(0.0);
            let last = positions.last().copied().unwrap_or(0.0);
            let mid = (first + last) / 2.0;
            for (&child, pos) in kids.iter().zip(&positions) {
                relative[child] = pos - mid;
            }
            for (child_contour, pos) in child_contours.iter().zip(&positions) {
                merge(&mut contour, child_contour, pos - mid, 1);
            }
        }
        pending[node] = Some(contour);
    }
    pending[root].take().unwrap_or_default()
}

/// Places contours side by side; the first sits at 0.
fn pack(contours: &[Contour], spacing: f32) -> Vec<f32> {
    let mut positions = Vec::with_capacity(contours.len());
    let mut acc: Contour = Vec::new();
    for contour in contours {
        let mut shift = positions.last().copied().unwrap_or(0.0f32);
        for (level, &(left, _)) in contour.iter().enumerate() {
            if let Some(&(_, right)) = acc.get(level) {
                shift = shift.max(right + spacing - left);
            }
        }
        merge(&mut acc, contour, shift, 0);
        positions.push(shift);
    }
    positions
}

fn merge(into: &mut Contour, other: &Contour, shift: f32, level_offset: usize) {
    for (level, &(left, right)) in other.iter().enumerate() {
        let target = level + level_offset;
        let shifted = (left + shift, right + shift);
        match into.get_mut(target) {
            Some(slot) => {
                slot.0 = slot.0.min(shifted.0);
                slot.1 = slot.1.max(shifted.1);
            }
            None => into.push(shifted),
        }
    }
}

fn second_walk(
    root: usize,
    x: f32,
    children: &[Vec<usize>],
    relative: &[f32],
    centers: &mut [f32],
) {
    let mut stack = vec![(root, x)];
    while let Some((node, x)) = stack.pop() {
        centers[node] = x;
        stack.extend(children[node].iter().map(|&child| (child, x + relative[child])));
    }
}
