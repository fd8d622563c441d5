use std::{
	fmt::{Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// `[west, south, east, north]` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
	west: f64,
	south: f64,
	east: f64,
	north: f64,
}
impl BoundingBox {
	pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
		for value in [west, south, east, north] {
			if !value.is_finite() {
				return Err(invalid("coordinates must be finite numbers."));
			}
		}

		if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
			return Err(invalid("longitudes must be within -180 and 180."));
		}
		if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
			return Err(invalid("latitudes must be within -90 and 90."));
		}
		if west >= east {
			return Err(invalid("west must be less than east."));
		}
		if south >= north {
			return Err(invalid("south must be less than north."));
		}

		Ok(Self { west, south, east, north })
	}

	pub fn west(&self) -> f64 {
		self.west
	}

	pub fn south(&self) -> f64 {
		self.south
	}

	pub fn east(&self) -> f64 {
		self.east
	}

	pub fn north(&self) -> f64 {
		self.north
	}

	pub fn width(&self) -> f64 {
		self.east - self.west
	}

	pub fn height(&self) -> f64 {
		self.north - self.south
	}

	/// The larger of the two dimensions.
	pub fn span(&self) -> f64 {
		self.width().max(self.height())
	}

	pub fn center(&self) -> (f64, f64) {
		((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
	}

	pub fn contains(&self, lng: f64, lat: f64) -> bool {
		(self.west..=self.east).contains(&lng) && (self.south..=self.north).contains(&lat)
	}

	/// Shrinks each dimension wider than `max_span` down to `max_span`, keeping the centre.
	pub fn clip_to_span(&self, max_span: f64) -> Self {
		if !max_span.is_finite() || max_span <= 0.0 || self.span() <= max_span {
			return *self;
		}

		let (lng, lat) = self.center();
		let half_width = self.width().min(max_span) / 2.0;
		let half_height = self.height().min(max_span) / 2.0;

		Self {
			west: (lng - half_width).max(-180.0),
			south: (lat - half_height).max(-90.0),
			east: (lng + half_width).min(180.0),
			north: (lat + half_height).min(90.0),
		}
	}

	/// Comma-joined `west,south,east,north`, the form the server expects.
	pub fn to_wire(&self) -> String {
		format!("{},{},{},{}", self.west, self.south, self.east, self.north)
	}
}
impl Display for BoundingBox {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.to_wire())
	}
}
impl FromStr for BoundingBox {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		let parts = raw
			.split(',')
			.map(|part| part.trim().parse::<f64>())
			.collect::<std::result::Result<Vec<_>, _>>()
			.map_err(|_| invalid("expected four comma separated numbers."))?;
		let [west, south, east, north] = parts[..] else {
			return Err(invalid("expected four comma separated numbers."));
		};

		Self::new(west, south, east, north)
	}
}
impl TryFrom<[f64; 4]> for BoundingBox {
	type Error = Error;

	fn try_from([west, south, east, north]: [f64; 4]) -> Result<Self> {
		Self::new(west, south, east, north)
	}
}
impl From<BoundingBox> for [f64; 4] {
	fn from(bbox: BoundingBox) -> Self {
		[bbox.west, bbox.south, bbox.east, bbox.north]
	}
}

/// Size limits applied before a box reaches a collaborator that enumerates individual tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsPolicy {
	pub max_task_span: f64,
}
impl BoundsPolicy {
	pub fn new(max_task_span: f64) -> Self {
		Self { max_task_span }
	}

	pub fn admit_for_tasks(&self, bbox: &BoundingBox) -> Result<BoundingBox> {
		let span = bbox.span();

		if span > self.max_task_span {
			return Err(Error::BoundsTooLarge { span, max: self.max_task_span });
		}

		Ok(*bbox)
	}
}
impl From<&mr_config::Search> for BoundsPolicy {
	fn from(cfg: &mr_config::Search) -> Self {
		Self::new(cfg.max_task_bounds_span)
	}
}

fn invalid(message: &str) -> Error {
	Error::InvalidBounds { message: message.to_string() }
}
