//! Runtime configuration, embedded in the page as JSON with per-field defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Top-level engine configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
	/// Backend base URL, without trailing slash.
	pub api_base_url: String,
	/// User whose graphs and documents are listed.
	pub user_id: String,
	/// Poll cadences.
	pub polling: PollingConfig,
	/// Minimum-interval guards for redundant fetches.
	pub throttle: ThrottleConfig,
	/// Abort the document list request after this many milliseconds.
	pub document_timeout_ms: u32,
	/// Upper bound of links asked from the suggestion endpoint.
	pub suggestion_max_links: u32,
	/// Physics settings.
	pub layout: LayoutConfig,
	/// Painting settings.
	pub render: RenderConfig,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			api_base_url: "/api".to_string(),
			user_id: "default".to_string(),
			polling: PollingConfig::default(),
			throttle: ThrottleConfig::default(),
			document_timeout_ms: 10_000,
			suggestion_max_links: 10,
			layout: LayoutConfig::default(),
			render: RenderConfig::default(),
		}
	}
}

impl EngineConfig {
	/// Parse a JSON config; missing fields take their defaults.
	pub fn from_json(text: &str) -> Result<Self> {
		Ok(serde_json::from_str(text)?)
	}
}

/// Poll cadences in milliseconds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
	/// Build status poll while a build is running.
	pub build_ms: u64,
	/// Build status poll while the build modal is open.
	pub build_modal_ms: u64,
	/// Job cross-check when nothing is building.
	pub job_check_idle_ms: u64,
	/// Job cross-check while any graph is building.
	pub job_check_active_ms: u64,
}

impl Default for PollingConfig {
	fn default() -> Self {
		Self {
			build_ms: 6_000,
			build_modal_ms: 2_000,
			job_check_idle_ms: 15_000,
			job_check_active_ms: 4_000,
		}
	}
}

impl PollingConfig {
	/// Build poll cadence for the current modal state.
	pub fn build_cadence(&self, modal_open: bool) -> Duration {
		Duration::from_millis(if modal_open {
			self.build_modal_ms
		} else {
			self.build_ms
		})
	}

	/// Cross-check cadence for the current activity.
	pub fn job_check_cadence(&self, any_active: bool) -> Duration {
		Duration::from_millis(if any_active {
			self.job_check_active_ms
		} else {
			self.job_check_idle_ms
		})
	}
}

/// Floors used by the last-fetched guards, in milliseconds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThrottleConfig {
	/// Graph data refetch floor.
	pub data_refetch_ms: f64,
	/// Catalog list refresh floor.
	pub catalog_refresh_ms: f64,
}

impl Default for ThrottleConfig {
	fn default() -> Self {
		Self {
			data_refetch_ms: 3_000.0,
			catalog_refresh_ms: 15_000.0,
		}
	}
}

/// Which physics backend drives the map.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutEngineKind {
	/// Charge + link + center forces.
	#[default]
	Force,
	/// Spring model from the `force_graph` crate.
	Spring,
}

/// Force simulation tuning.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
	/// Physics backend.
	pub engine: LayoutEngineKind,
	/// Many-body strength; negative repels.
	pub charge_strength: f64,
	/// Spring rest length.
	pub link_distance: f64,
	/// Pull of the centering force.
	pub center_strength: f64,
	/// Fraction of velocity lost per tick.
	pub velocity_decay: f64,
	/// Simulation stops once alpha falls below this.
	pub alpha_min: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			engine: LayoutEngineKind::Force,
			charge_strength: -15.0,
			link_distance: 25.0,
			center_strength: 0.2,
			velocity_decay: 0.4,
			alpha_min: 0.001,
		}
	}
}

/// Painting and level-of-detail settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
	/// Labels of unimportant nodes appear above this zoom.
	pub label_zoom_threshold: f64,
	/// Opacity of nodes outside the focused neighborhood.
	pub dim_opacity: f64,
	/// Zoom applied when centering on a focused node.
	pub focus_zoom: f64,
	/// Flow particles drawn on each emphasized link.
	pub flow_particles: usize,
}

impl Default for RenderConfig {
	fn default() -> Self {
		Self {
			label_zoom_threshold: 0.6,
			dim_opacity: 0.45,
			focus_zoom: 2.5,
			flow_particles: 3,
		}
	}
}
