//! Application configuration documents.
//!
//! A document is TOML with an `application` table holding an ordered
//! `entities` array:
//!
//! ```toml
//! [[application.entities]]
//! name = "LOGGER"
//! config = "filter=info format=compact"
//!
//! [[application.entities]]
//! name = "plugins"
//! loader_ref = "PLUGIN_REPOSITORY"
//! ```
//!
//! Each entity's `config` is an opaque [`Fragment`] handed to its loader
//! untouched.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::entity::EntityId;
use crate::error::{Error, Result};

/// Opaque per-entity configuration subtree.
pub type Fragment = toml::Value;

/// Fragment used when an entity entry has no `config`.
pub fn empty_fragment() -> Fragment {
	Fragment::Table(toml::Table::new())
}

/// Ordered list of entities to construct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApplicationConfig {
	#[serde(default)]
	pub entities: Vec<EntityConfig>,
}

/// One entity entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityConfig {
	pub name: String,
	/// Loader entity id or loader function key; empty selects the default
	/// loader function named after the entity.
	#[serde(default)]
	pub loader_ref: String,
	#[serde(default = "empty_fragment")]
	pub config: Fragment,
}

impl EntityConfig {
	pub fn new(name: impl Into<String>, loader_ref: impl Into<String>, config: Fragment) -> Self {
		Self {
			name: name.into(),
			loader_ref: loader_ref.into(),
			config,
		}
	}
}

#[derive(Deserialize)]
struct Document {
	#[serde(default)]
	application: ApplicationConfig,
}

/// Parses a configuration document.
pub fn parse_document(text: &str) -> Result<ApplicationConfig> {
	let document: Document = toml::from_str(text)?;
	Ok(document.application)
}

/// Reads and parses the configuration document at `path`.
pub fn load_document(path: &Path) -> Result<ApplicationConfig> {
	let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
		path: path.to_path_buf(),
		source,
	})?;
	parse_document(&text)
}

/// Reads the string field `field` of a table fragment.
pub fn required_str<'a>(fragment: &'a Fragment, field: &'static str, entity: &EntityId) -> Result<&'a str> {
	fragment
		.get(field)
		.and_then(Fragment::as_str)
		.ok_or_else(|| Error::MissingField {
			entity: entity.clone(),
			field,
		})
}

/// Deserializes a fragment into a typed configuration.
pub fn typed<T: DeserializeOwned>(fragment: &Fragment, entity: &EntityId) -> Result<T> {
	fragment.clone().try_into().map_err(|source| Error::InvalidFragment {
		entity: entity.clone(),
		source,
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde::Deserialize;

	use super::*;

	const SAMPLE: &str = r#"
[[application.entities]]
name = "LOGGER"
config = "filter=debug"

[[application.entities]]
name = "libc"
loader_ref = "libraries"
config = { filename = "libc.so.6" }

[[application.entities]]
name = "bare"
"#;

	#[test]
	fn parses_entities_in_order_with_defaults() {
		let config = parse_document(SAMPLE).unwrap();
		let names: Vec<_> = config.entities.iter().map(|e| e.name.as_str()).collect();
		assert_eq!(names, ["LOGGER", "libc", "bare"]);

		assert_eq!(config.entities[0].loader_ref, "");
		assert_eq!(config.entities[0].config.as_str(), Some("filter=debug"));
		assert_eq!(config.entities[1].loader_ref, "libraries");
		assert_eq!(config.entities[2].config, empty_fragment());
	}

	#[test]
	fn empty_document_has_no_entities() {
		assert_eq!(parse_document("").unwrap(), ApplicationConfig::default());
	}

	#[test]
	fn missing_name_is_a_parse_error() {
		let err = parse_document("[[application.entities]]\nloader_ref = \"x\"\n").unwrap_err();
		assert!(matches!(err, Error::ConfigParse(_)));
	}

	#[test]
	fn missing_file_is_an_io_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = load_document(&dir.path().join("absent.toml")).unwrap_err();
		assert!(matches!(err, Error::ConfigIo { .. }));
	}

	#[test]
	fn required_str_reports_entity_and_field() {
		let config = parse_document(SAMPLE).unwrap();
		let libc = &config.entities[1];
		let id = EntityId::from(libc.name.as_str());

		assert_eq!(required_str(&libc.config, "filename", &id).unwrap(), "libc.so.6");
		let err = required_str(&libc.config, "constructor", &id).unwrap_err();
		assert_eq!(
			err.to_string(),
			"entity `libc`: missing required configuration field `constructor`"
		);
	}

	#[test]
	fn typed_fragment() {
		#[derive(Debug, Deserialize, PartialEq)]
		struct Library {
			filename: String,
		}

		let config = parse_document(SAMPLE).unwrap();
		let id = EntityId::from("libc");
		let library: Library = typed(&config.entities[1].config, &id).unwrap();
		assert_eq!(library.filename, "libc.so.6");

		let err = typed::<Library>(&config.entities[2].config, &id).unwrap_err();
		assert!(matches!(err, Error::InvalidFragment { .. }));
	}
}
