//! Side panels around the concept map.

mod build;
mod catalog;
mod details;
mod notice;
mod suggestions;

pub use build::BuildPanel;
pub use catalog::CatalogPanel;
pub use details::{NodeDetailsPanel, SearchBox};
pub use notice::NoticeBanner;
pub use suggestions::SuggestionsPanel;

use crate::error::{GraphError, Result};

/// Parse an optional positive limit typed into a form field.
pub(crate) fn parse_limit(field: &str, raw: &str) -> Result<Option<u32>> {
	let raw = raw.trim();
	if raw.is_empty() {
		return Ok(None);
	}
	match raw.parse::<u32>() {
		Ok(0) | Err(_) => Err(GraphError::validation(format!(
			"{field} must be a positive whole number"
		))),
		Ok(v) => Ok(Some(v)),
	}
}
