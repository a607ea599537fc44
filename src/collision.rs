//! Axis-aligned rectangle and circle colliders with intersection tests
//!
//! Tiles use [`RectCollider`]; moving entities (enemies, the player, pickups)
//! use [`CircleCollider`]. Both expose the sample-point sets the physics step
//! probes against the tile grid.

use glam::Vec2;

/// Slack applied to rect/rect overlap so exactly-touching edges do not collide
const OVERLAP_EPSILON: f32 = 1e-3;

/// Axis-aligned rectangle collider, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectCollider {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectCollider {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn update_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    pub fn intersects_rect(&self, other: &RectCollider) -> bool {
        let no_overlap = self.x + self.width + OVERLAP_EPSILON <= other.x
            || self.x >= other.x + other.width + OVERLAP_EPSILON
            || self.y + self.height + OVERLAP_EPSILON <= other.y
            || self.y >= other.y + other.height + OVERLAP_EPSILON;
        !no_overlap
    }

    pub fn intersects_circle(&self, circle: &CircleCollider) -> bool {
        let closest_x = circle.x.clamp(self.x, self.x + self.width);
        let closest_y = circle.y.clamp(self.y, self.y + self.height);
        let dx = circle.x - closest_x;
        let dy = circle.y - closest_y;
        dx * dx + dy * dy <= circle.radius * circle.radius
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Sample points the physics step tests against the tile grid: corners,
    /// evenly spaced edge points, a 3x3 interior lattice, and the center.
    pub fn check_points(&self) -> Vec<Vec2> {
        const POINTS_PER_SIDE: usize = 4;
        const POINTS_INSIDE: usize = 3;

        let mut points = Vec::with_capacity(4 + POINTS_PER_SIDE * 4 + POINTS_INSIDE * POINTS_INSIDE + 1);

        points.push(Vec2::new(self.x, self.y));
        points.push(Vec2::new(self.x + self.width, self.y));
        points.push(Vec2::new(self.x, self.y + self.height));
        points.push(Vec2::new(self.x + self.width, self.y + self.height));

        let step_x = self.width / (POINTS_PER_SIDE + 1) as f32;
        let step_y = self.height / (POINTS_PER_SIDE + 1) as f32;

        for i in 1..=POINTS_PER_SIDE {
            points.push(Vec2::new(self.x + step_x * i as f32, self.y));
            points.push(Vec2::new(self.x + self.width, self.y + step_y * i as f32));
            points.push(Vec2::new(self.x + step_x * i as f32, self.y + self.height));
            points.push(Vec2::new(self.x, self.y + step_y * i as f32));
        }

        for i in 1..=POINTS_INSIDE {
            for j in 1..=POINTS_INSIDE {
                points.push(Vec2::new(
                    self.x + self.width * i as f32 / (POINTS_INSIDE + 1) as f32,
                    self.y + self.height * j as f32 / (POINTS_INSIDE + 1) as f32,
                ));
            }
        }

        points.push(self.center());
        points
    }
}

/// Circle collider, origin at the center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCollider {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl CircleCollider {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self { x, y, radius }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn update_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    pub fn intersects_circle(&self, other: &CircleCollider) -> bool {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let distance = (dx * dx + dy * dy).sqrt();
        distance < self.radius + other.radius
    }

    pub fn intersects_rect(&self, rect: &RectCollider) -> bool {
        rect.intersects_circle(self)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy <= self.radius * self.radius
    }

    /// Sample points: center, the four cardinal rim points, and the four
    /// diagonal rim points.
    pub fn check_points(&self) -> Vec<Vec2> {
        let mut points = Vec::with_capacity(9);
        points.push(Vec2::new(self.x, self.y));
        points.push(Vec2::new(self.x + self.radius, self.y));
        points.push(Vec2::new(self.x, self.y + self.radius));
        points.push(Vec2::new(self.x - self.radius, self.y));
        points.push(Vec2::new(self.x, self.y - self.radius));

        // cos(45 deg)
        let diag = self.radius * std::f32::consts::FRAC_1_SQRT_2;
        points.push(Vec2::new(self.x + diag, self.y + diag));
        points.push(Vec2::new(self.x - diag, self.y + diag));
        points.push(Vec2::new(self.x - diag, self.y - diag));
        points.push(Vec2::new(self.x + diag, self.y - diag));
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_rect_overlap() {
        let a = RectCollider::new(0.0, 0.0, 10.0, 10.0);
        let b = RectCollider::new(5.0, 5.0, 10.0, 10.0);
        let c = RectCollider::new(20.0, 20.0, 4.0, 4.0);

        assert!(a.intersects_rect(&b));
        assert!(b.intersects_rect(&a));
        assert!(!a.intersects_rect(&c));
    }

    #[test]
    fn test_rect_rect_touching_edges_do_not_collide() {
        let a = RectCollider::new(0.0, 0.0, 10.0, 10.0);
        let b = RectCollider::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects_rect(&b));
        assert!(!b.intersects_rect(&a));
    }

    #[test]
    fn test_circle_rect_intersection() {
        let rect = RectCollider::new(0.0, 0.0, 10.0, 10.0);
        let inside = CircleCollider::new(5.0, 5.0, 1.0);
        let touching = CircleCollider::new(13.0, 5.0, 3.0);
        let outside = CircleCollider::new(20.0, 20.0, 2.0);

        assert!(rect.intersects_circle(&inside));
        assert!(rect.intersects_circle(&touching));
        assert!(!rect.intersects_circle(&outside));
        assert!(touching.intersects_rect(&rect));
    }

    #[test]
    fn test_circle_circle_intersection() {
        let a = CircleCollider::new(0.0, 0.0, 5.0);
        let b = CircleCollider::new(8.0, 0.0, 4.0);
        let c = CircleCollider::new(20.0, 0.0, 5.0);

        assert!(a.intersects_circle(&b));
        assert!(!a.intersects_circle(&c));
    }

    #[test]
    fn test_contains_point() {
        let rect = RectCollider::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains_point(0.0, 0.0));
        assert!(rect.contains_point(10.0, 10.0));
        assert!(!rect.contains_point(10.1, 5.0));

        let circle = CircleCollider::new(0.0, 0.0, 5.0);
        assert!(circle.contains_point(3.0, 4.0));
        assert!(!circle.contains_point(3.1, 4.1));
    }

    #[test]
    fn test_rect_check_points_lie_inside() {
        let rect = RectCollider::new(10.0, 20.0, 40.0, 30.0);
        let points = rect.check_points();
        assert_eq!(points.len(), 4 + 16 + 9 + 1);
        for p in points {
            assert!(rect.contains_point(p.x, p.y), "point {p:?} outside rect");
        }
    }

    #[test]
    fn test_circle_check_points_lie_inside() {
        let circle = CircleCollider::new(-5.0, 7.0, 3.0);
        let points = circle.check_points();
        assert_eq!(points.len(), 9);
        for p in points {
            // Rim points sit exactly on the radius, allow for rounding.
            let dx = p.x - circle.x;
            let dy = p.y - circle.y;
            assert!(dx * dx + dy * dy <= circle.radius * circle.radius + 1e-4);
        }
    }
}
