//! Viewport state: center, zoom and the fly-to animation.
//!
//! Projection is equirectangular (what the canvas draws), scaled so that one
//! zoom level matches the slippy-map convention of 256px tiles. A terminal
//! cell is treated as an 8x16 pixel block.

use std::time::{Duration, Instant};

use crate::models::Coordinate;

pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 19;

const TILE_SIZE: f64 = 256.0;
const CELL_WIDTH_PX: f64 = 8.0;
const CELL_HEIGHT_PX: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct FlyAnimation {
    from: Coordinate,
    to: Coordinate,
    started: Instant,
    duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    center: Coordinate,
    zoom: u8,
    animation: Option<FlyAnimation>,
}

impl Viewport {
    pub fn new(center: Coordinate, zoom: u8) -> Self {
        Self {
            center: clamp_coordinate(center),
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            animation: None,
        }
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Jumps immediately, cancelling any animation.
    pub fn set_view(&mut self, center: Coordinate, zoom: u8) {
        self.animation = None;
        self.center = clamp_coordinate(center);
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Starts an animated move to `target`. The zoom switches immediately; the
    /// center eases toward the target as [`advance`](Self::advance) is called.
    pub fn fly_to(&mut self, target: Coordinate, zoom: u8, duration: Duration, now: Instant) {
        if duration.is_zero() {
            self.set_view(target, zoom);
            return;
        }
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.animation = Some(FlyAnimation {
            from: self.center,
            to: clamp_coordinate(target),
            started: now,
            duration,
        });
    }

    /// Moves the animation forward to `now`. Returns true while still animating.
    pub fn advance(&mut self, now: Instant) -> bool {
        let Some(anim) = self.animation else {
            return false;
        };
        let elapsed = now.saturating_duration_since(anim.started);
        let t = (elapsed.as_secs_f64() / anim.duration.as_secs_f64()).min(1.0);
        if t >= 1.0 {
            self.center = anim.to;
            self.animation = None;
            return false;
        }
        let eased = 1.0 - (1.0 - t).powi(3);
        self.center = Coordinate::new(
            lerp(anim.from.lat, anim.to.lat, eased),
            lerp(anim.from.lng, anim.to.lng, eased),
        );
        true
    }

    /// Pans by whole terminal cells; positive `dx` moves east, positive `dy` south.
    pub fn pan_cells(&mut self, dx: i32, dy: i32) {
        self.animation = None;
        let (lng_step, lat_step) = self.degrees_per_cell();
        self.center = clamp_coordinate(Coordinate::new(
            self.center.lat - f64::from(dy) * lat_step,
            self.center.lng + f64::from(dx) * lng_step,
        ));
    }

    pub fn zoom_by(&mut self, delta: i8) {
        let zoom = i16::from(self.zoom) + i16::from(delta);
        self.zoom = zoom.clamp(i16::from(MIN_ZOOM), i16::from(MAX_ZOOM)) as u8;
    }

    /// Degrees covered by one terminal cell as (longitude, latitude).
    pub fn degrees_per_cell(&self) -> (f64, f64) {
        let per_px = 360.0 / (TILE_SIZE * 2f64.powi(i32::from(self.zoom)));
        (per_px * CELL_WIDTH_PX, per_px * CELL_HEIGHT_PX)
    }

    /// Canvas bounds for an area of `cols` x `rows` cells as (x, y) ranges.
    pub fn bounds(&self, cols: u16, rows: u16) -> ([f64; 2], [f64; 2]) {
        let (lng_step, lat_step) = self.degrees_per_cell();
        let half_w = f64::from(cols) * lng_step / 2.0;
        let half_h = f64::from(rows) * lat_step / 2.0;
        (
            [self.center.lng - half_w, self.center.lng + half_w],
            [self.center.lat - half_h, self.center.lat + half_h],
        )
    }

    /// Geographic coordinate under the cell at (`col`, `row`), relative to the
    /// top-left of a `cols` x `rows` map area.
    pub fn unproject(&self, col: u16, row: u16, cols: u16, rows: u16) -> Coordinate {
        let ([x_min, x_max], [y_min, y_max]) = self.bounds(cols, rows);
        let fx = (f64::from(col) + 0.5) / f64::from(cols.max(1));
        let fy = (f64::from(row) + 0.5) / f64::from(rows.max(1));
        clamp_coordinate(Coordinate::new(
            y_max - fy * (y_max - y_min),
            x_min + fx * (x_max - x_min),
        ))
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn clamp_coordinate(c: Coordinate) -> Coordinate {
    Coordinate::new(c.lat.clamp(-90.0, 90.0), wrap_lng(c.lng))
}

fn wrap_lng(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fly_to_eases_and_lands_on_target() {
        let start = Instant::now();
        let mut vp = Viewport::new(Coordinate::new(0.0, 0.0), 13);
        let target = Coordinate::new(10.0, 20.0);
        vp.fly_to(target, 15, Duration::from_millis(1200), start);

        assert_eq!(vp.zoom(), 15);
        assert!(vp.advance(start + Duration::from_millis(600)));
        let mid = vp.center();
        // Ease-out: past the halfway point at half the duration.
        assert!(mid.lat > 5.0 && mid.lat < 10.0);

        assert!(!vp.advance(start + Duration::from_millis(1200)));
        assert_eq!(vp.center(), target);
        assert!(!vp.is_animating());
    }

    #[test]
    fn zero_duration_jumps() {
        let mut vp = Viewport::new(Coordinate::new(0.0, 0.0), 13);
        vp.fly_to(Coordinate::new(1.0, 2.0), 15, Duration::ZERO, Instant::now());
        assert!(!vp.is_animating());
        assert_eq!(vp.center(), Coordinate::new(1.0, 2.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = Viewport::new(Coordinate::new(0.0, 0.0), 18);
        vp.zoom_by(5);
        assert_eq!(vp.zoom(), MAX_ZOOM);
        vp.zoom_by(-30);
        assert_eq!(vp.zoom(), MIN_ZOOM);
    }

    #[test]
    fn unproject_center_cell_is_near_center() {
        let vp = Viewport::new(Coordinate::new(12.97, 77.59), 13);
        let c = vp.unproject(50, 20, 101, 41);
        assert_relative_eq!(c.lat, 12.97, epsilon = 1e-9);
        assert_relative_eq!(c.lng, 77.59, epsilon = 1e-9);
    }

    #[test]
    fn unproject_top_left_is_north_west() {
        let vp = Viewport::new(Coordinate::new(0.0, 0.0), 4);
        let c = vp.unproject(0, 0, 40, 20);
        assert!(c.lat > 0.0);
        assert!(c.lng < 0.0);
    }

    #[test]
    fn panning_wraps_longitude() {
        let mut vp = Viewport::new(Coordinate::new(0.0, 179.0), 1);
        vp.pan_cells(1, 0);
        assert!(vp.center().lng < 0.0);
        vp.pan_cells(0, -100);
        assert_eq!(vp.center().lat, 90.0);
    }
}
