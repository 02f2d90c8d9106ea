//! Canonical id normalization.
//!
//! The backend is loose about ids: the same concept can arrive as `"42"`,
//! `42`, `42.0`, a record reference `{"tb": "concept", "id": "42"}`, or (for
//! link endpoints) the whole node object. Every comparison in the crate goes
//! through [`canonical_id`] so all of these collapse to one string form.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Canonical string form of an id-like JSON value.
pub fn canonical_id(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => {
			let s = s.trim();
			(!s.is_empty()).then(|| s.to_string())
		}
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				Some(i.to_string())
			} else if let Some(u) = n.as_u64() {
				Some(u.to_string())
			} else {
				let f = n.as_f64()?;
				if !f.is_finite() {
					None
				} else if f.fract() == 0.0 && f.abs() < 9.0e15 {
					Some(format!("{}", f as i64))
				} else {
					Some(f.to_string())
				}
			}
		}
		Value::Object(map) => {
			let table = map
				.get("tb")
				.or_else(|| map.get("table"))
				.and_then(Value::as_str)
				.map(str::trim)
				.filter(|t| !t.is_empty());
			let id = canonical_id(map.get("id")?)?;
			Some(match table {
				Some(table) => format!("{table}:{id}"),
				None => id,
			})
		}
		Value::Null | Value::Bool(_) | Value::Array(_) => None,
	}
}

/// Serde helper for required id fields.
pub fn deserialize_id<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
	let value = Value::deserialize(de)?;
	canonical_id(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid id: {value}")))
}

/// Serde helper for id lists; unusable entries are skipped.
pub fn deserialize_id_list<'de, D: Deserializer<'de>>(
	de: D,
) -> Result<Vec<DocumentId>, D::Error> {
	let values = Option::<Vec<Value>>::deserialize(de)?.unwrap_or_default();
	Ok(values.into_iter().filter_map(DocumentId::from_value).collect())
}

/// A document id kept in the shape the backend sent it.
///
/// Equality and hashing use the canonical form, so `7` and `"7"` name the
/// same document, while serialization writes the original value back.
#[derive(Clone, Debug)]
pub struct DocumentId {
	raw: Value,
	key: String,
}

impl DocumentId {
	/// `None` when the value is not id-like.
	pub fn from_value(raw: Value) -> Option<Self> {
		let key = canonical_id(&raw)?;
		Some(Self { raw, key })
	}

	/// Canonical form.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// The value as received.
	pub fn raw(&self) -> &Value {
		&self.raw
	}
}

impl From<&str> for DocumentId {
	fn from(id: &str) -> Self {
		Self {
			raw: Value::String(id.to_string()),
			key: id.trim().to_string(),
		}
	}
}

impl PartialEq for DocumentId {
	fn eq(&self, other: &Self) -> bool {
		self.key == other.key
	}
}

impl Eq for DocumentId {}

impl Hash for DocumentId {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key.hash(state);
	}
}

impl Serialize for DocumentId {
	fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
		self.raw.serialize(ser)
	}
}

impl<'de> Deserialize<'de> for DocumentId {
	fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
		let value = Value::deserialize(de)?;
		let display = value.to_string();
		Self::from_value(value)
			.ok_or_else(|| serde::de::Error::custom(format!("invalid id: {display}")))
	}
}
