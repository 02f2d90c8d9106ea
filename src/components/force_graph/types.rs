use crate::model::NodeId;

/// A point in layout space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
	pub x: f64,
	pub y: f64,
}

impl Point {
	pub fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	pub fn distance(&self, other: &Point) -> f64 {
		((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
	}
}

/// Screen = layout * k + (x, y).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl ViewTransform {
	pub fn lerp(&self, to: &ViewTransform, t: f64) -> Self {
		Self {
			x: self.x + (to.x - self.x) * t,
			y: self.y + (to.y - self.y) * t,
			k: self.k + (to.k - self.k) * t,
		}
	}

	pub fn is_close(&self, other: &ViewTransform) -> bool {
		(self.x - other.x).abs() < 0.5
			&& (self.y - other.y).abs() < 0.5
			&& (self.k - other.k).abs() < 0.001
	}
}

/// What a click on the canvas landed on.
#[derive(Clone, Debug, PartialEq)]
pub enum MapClick {
	Node(NodeId),
	Background,
}
