use serde::{Deserialize, Serialize};

/// Fallback viewport used when the page cannot report its dimensions.
pub const FALLBACK_VIEWPORT: Viewport = Viewport {
    width: 1200.0,
    height: 800.0,
    device_pixel_ratio: 1.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point at `radius` px from `self` in direction `angle_deg`.
    pub fn offset_polar(&self, radius: f64, angle_deg: f64) -> Self {
        let rad = angle_deg.to_radians();
        Self {
            x: self.x + radius * rad.cos(),
            y: self.y + radius * rad.sin(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Point at a horizontal fraction of the box, vertically centered.
    pub fn point_at(&self, x_fraction: f64) -> Point {
        Point::new(self.x + self.width * x_fraction, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// Visible viewport of the page in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// `-margin <= x <= width + margin` and the same for y.
    pub fn contains(&self, point: Point, margin: f64) -> bool {
        point.x >= -margin
            && point.x <= self.width + margin
            && point.y >= -margin
            && point.y <= self.height + margin
    }
}

impl Default for Viewport {
    fn default() -> Self {
        FALLBACK_VIEWPORT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_is_inclusive() {
        let vp = Viewport::new(1000.0, 600.0, 2.0);
        assert!(vp.contains(Point::new(-10.0, 610.0), 10.0));
        assert!(!vp.contains(Point::new(-10.5, 300.0), 10.0));
        assert!(!vp.contains(Point::new(500.0, 611.0), 10.0));
    }

    #[test]
    fn polar_offsets_follow_angle() {
        let p = Point::new(100.0, 100.0).offset_polar(30.0, 0.0);
        assert!((p.x - 130.0).abs() < 1e-9);
        assert!((p.y - 100.0).abs() < 1e-9);
        let q = Point::new(100.0, 100.0).offset_polar(30.0, 90.0);
        assert!((q.x - 100.0).abs() < 1e-9);
        assert!((q.y - 130.0).abs() < 1e-9);
    }

    #[test]
    fn box_center_and_fractions() {
        let b = BoundingBox::new(10.0, 20.0, 100.0, 40.0);
        assert_eq!(b.center(), Point::new(60.0, 40.0));
        assert_eq!(b.point_at(0.3), Point::new(40.0, 40.0));
        assert!(b.contains(Point::new(10.0, 60.0)));
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 5.0).is_empty());
    }
}
