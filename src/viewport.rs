use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ViewportConfig;
use crate::layout::Bounds;

/// Screen = content * k + (x, y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform { x: 0.0, y: 0.0, k: 1.0 };

    pub fn apply(&self, point: (f32, f32)) -> (f32, f32) {
        (point.0 * self.k + self.x, point.1 * self.k + self.y)
    }

    pub fn invert(&self, point: (f32, f32)) -> (f32, f32) {
        ((point.0 - self.x) / self.k, (point.1 - self.y) / self.k)
    }

    fn lerp(&self, to: &Transform, t: f32) -> Transform {
        Transform {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
            k: self.k + (to.k - self.k) * t,
        }
    }

    pub fn to_svg_attr(&self) -> String {
        format!("translate({:.2},{:.2}) scale({:.4})", self.x, self.y, self.k)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: Transform,
    to: Transform,
    started: Instant,
    duration: Duration,
}

impl Transition {
    fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    fn at(&self, now: Instant) -> Transform {
        let t = self.progress(now);
        if t >= 1.0 {
            return self.to;
        }
        self.from.lerp(&self.to, ease_cubic_in_out(t))
    }
}

fn ease_cubic_in_out(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Pan/zoom state of the drawing surface. Transitions can be interrupted at
/// any time; a new one always starts from the currently displayed transform.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    config: ViewportConfig,
    resting: Transform,
    transition: Option<Transition>,
}

impl Viewport {
    pub fn new(width: f32, height: f32, config: ViewportConfig) -> Self {
        Self {
            width,
            height,
            config,
            resting: Transform::IDENTITY,
            transition: None,
        }
    }

    pub fn transform_at(&self, now: Instant) -> Transform {
        match &self.transition {
            Some(transition) => transition.at(now),
            None => self.resting,
        }
    }

    /// Reads the clock only while a transition is running.
    pub fn current(&self) -> Transform {
        match &self.transition {
            Some(transition) => transition.at(Instant::now()),
            None => self.resting,
        }
    }

    /// Where the running transition ends, or the resting transform.
    pub fn target(&self) -> Transform {
        self.transition.map(|t| t.to).unwrap_or(self.resting)
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.transition
            .is_some_and(|transition| transition.progress(now) < 1.0)
    }

    /// Jumps to the end of any running transition.
    pub fn settle(&mut self) {
        if let Some(transition) = self.transition.take() {
            self.resting = transition.to;
        }
    }

    /// Scale and translate that center `bbox` inside the viewport. `None` for
    /// an empty box.
    pub fn fit_transform(&self, bbox: &Bounds, padding: f32) -> Option<Transform> {
        if bbox.is_degenerate() {
            return None;
        }
        let avail_w = self.width - 2.0 * padding;
        let avail_h = self.height - 2.0 * padding;
        let k = 1.0f32
            .min(avail_w / bbox.width)
            .min(avail_h / bbox.height)
            .clamp(self.config.min_scale, self.config.max_scale);
        Some(Transform {
            x: (self.width - bbox.width * k) / 2.0 - bbox.x * k,
            y: (self.height - bbox.height * k) / 2.0 - bbox.y * k,
            k,
        })
    }

    pub fn fit_at(&mut self, bbox: &Bounds, padding: f32, now: Instant) -> Option<Transform> {
        let target = self.fit_transform(bbox, padding)?;
        self.animate_to(target, now);
        Some(target)
    }

    /// Jumps to the fitted transform without animating.
    pub fn fit_immediately(&mut self, bbox: &Bounds, padding: f32) -> Option<Transform> {
        let target = self.fit_transform(bbox, padding)?;
        self.transition = None;
        self.resting = target;
        Some(target)
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.animate_to(Transform::IDENTITY, now);
    }

    fn animate_to(&mut self, target: Transform, now: Instant) {
        let from = self.transform_at(now);
        self.resting = target;
        self.transition = Some(Transition {
            from,
            to: target,
            started: now,
            duration: Duration::from_millis(self.config.transition_ms),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(800.0, 600.0, ViewportConfig::default())
    }

    #[test]
    fn fit_centers_small_content_without_upscaling() {
        let vp = viewport();
        let t = vp.fit_transform(&Bounds::new(0.0, 0.0, 200.0, 100.0), 20.0).unwrap();
        assert_eq!(t.k, 1.0);
        assert_eq!(t.apply((100.0, 50.0)), (400.0, 300.0));
    }

    #[test]
    fn fit_scales_large_content_down_and_clamps() {
        let vp = viewport();
        let t = vp.fit_transform(&Bounds::new(0.0, 0.0, 1440.0, 200.0), 40.0).unwrap();
        assert!((t.k - 0.5).abs() < 1e-4);
        let tiny = vp.fit_transform(&Bounds::new(0.0, 0.0, 100_000.0, 10.0), 0.0).unwrap();
        assert_eq!(tiny.k, 0.25);
    }

    #[test]
    fn fit_is_idempotent() {
        let mut vp = viewport();
        let bbox = Bounds::new(-30.0, 10.0, 900.0, 450.0);
        let start = Instant::now();
        let first = vp.fit_at(&bbox, 24.0, start).unwrap();
        vp.settle();
        let second = vp.fit_at(&bbox, 24.0, start + Duration::from_millis(5)).unwrap();
        vp.settle();
        assert_eq!(first, second);
        assert_eq!(vp.transform_at(start + Duration::from_secs(5)), first);
    }

    #[test]
    fn empty_content_is_a_noop() {
        let mut vp = viewport();
        assert!(vp.fit_at(&Bounds::default(), 24.0, Instant::now()).is_none());
        assert_eq!(vp.target(), Transform::IDENTITY);
    }

    #[test]
    fn interrupted_transition_starts_from_displayed_transform() {
        let mut vp = viewport();
        let start = Instant::now();
        vp.fit_at(&Bounds::new(0.0, 0.0, 4000.0, 4000.0), 0.0, start);
        let midway = start + Duration::from_millis(150);
        let shown = vp.transform_at(midway);
        assert!(shown.k < 1.0 && shown.k > 0.25);
        vp.reset_at(midway);
        assert_eq!(vp.transform_at(midway), shown);
        assert_eq!(vp.transform_at(midway + Duration::from_secs(1)), Transform::IDENTITY);
        assert!(!vp.is_animating(midway + Duration::from_secs(1)));
    }

    #[test]
    fn invert_round_trips_points() {
        let t = Transform { x: 10.0, y: -4.0, k: 0.5 };
        let (x, y) = t.invert(t.apply((30.0, 70.0)));
        assert!((x - 30.0).abs() < 1e-4 && (y - 70.0).abs() < 1e-4);
    }
}
