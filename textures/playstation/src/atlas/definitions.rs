//! JSON view of the atlas entries, keyed by texture file name.
//!
//! The same document, extended with an `entries` object listing texture names
//! per language, drives generation of the per-language entry tables.

use json::JsonValue;

use super::{
	AtlasError,
	record::AtlasEntry
};

/// Builds `{ name: { x, y, palette, width, height, texture_page } }` in file order
pub fn definitions_json(files: &[String], entries: &[AtlasEntry]) -> JsonValue {
	let mut defs = JsonValue::new_object();

	for (name, e) in files.iter().zip(entries.iter()) {
		let mut def = JsonValue::new_object();
		def["x"] = e.x.into();
		def["y"] = e.y.into();
		def["palette"] = e.palette.into();
		def["width"] = e.width.into();
		def["height"] = e.height.into();
		def["texture_page"] = e.texture_page.into();

		defs[name.as_str()] = def;
	}

	defs
}

/// Reads one texture definition, if every field is present and in range
pub fn entry_from_json(def: &JsonValue) -> Option<AtlasEntry> {
	Some(AtlasEntry::new(
		def["x"].as_u8()?,
		def["y"].as_u8()?,
		def["palette"].as_u16()?,
		def["width"].as_u16()?,
		def["height"].as_u16()?,
		def["texture_page"].as_u16()?,
	))
}

/// Projects the `textures` definitions through each language's `entries` list,
/// returning one packed entry table per language in document order.
#[cfg(feature = "export")]
pub fn language_tables(doc: &JsonValue) -> Result<Vec<(String, Vec<u8>)>, AtlasError> {
	let textures = &doc["textures"];
	let languages = &doc["entries"];

	if !textures.is_object() {
		return Err(AtlasError::Definitions("missing \"textures\" object".to_string()));
	}
	if !languages.is_object() {
		return Err(AtlasError::Definitions("missing \"entries\" object".to_string()));
	}

	let mut tables = vec![];
	for (lang, names) in languages.entries() {
		if !names.is_array() {
			return Err(AtlasError::Definitions(format!("entries for {} are not a list", lang)));
		}

		let mut table = vec![];
		for name in names.members() {
			let name = name.as_str()
				.ok_or_else(|| AtlasError::Definitions(format!("non-string entry in {}", lang)))?;
			let entry = entry_from_json(&textures[name])
				.ok_or_else(|| AtlasError::UnknownTexture(name.to_string()))?;

			table.push(entry);
		}

		tables.push((lang.to_string(), AtlasEntry::write_table(&table)));
	}

	Ok(tables)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_definitions_json() {
		let files = vec!["logo.png".to_string()];
		let entries = vec![AtlasEntry::new(4, 8, 0x3FF0, 16, 16, 12)];
		let defs = definitions_json(&files, &entries);

		assert_eq!(defs["logo.png"]["palette"].as_u16(), Some(0x3FF0));
		assert_eq!(defs["logo.png"]["texture_page"].as_u16(), Some(12));
		assert_eq!(entry_from_json(&defs["logo.png"]), Some(entries[0]));
		assert_eq!(entry_from_json(&defs["missing.png"]), None);
	}

	#[cfg(feature = "export")]
	#[test]
	fn test_language_tables() {
		let doc = json::parse(r#"{
			"textures": {
				"a.png": { "x": 1, "y": 2, "palette": 3, "width": 4, "height": 5, "texture_page": 12 },
				"b.png": { "x": 6, "y": 7, "palette": 8, "width": 9, "height": 10, "texture_page": 13 }
			},
			"entries": {
				"en": ["a.png", "b.png"],
				"jp": ["b.png"]
			}
		}"#).unwrap();

		let tables = language_tables(&doc).unwrap();
		assert_eq!(tables.len(), 2);
		assert_eq!(tables[0].0, "en");
		assert_eq!(tables[0].1.len(), 24);
		assert_eq!(tables[1].0, "jp");
		assert_eq!(tables[1].1, vec![6, 7, 8, 0, 9, 0, 10, 0, 13, 0, 0, 0]);
	}

	#[cfg(feature = "export")]
	#[test]
	fn test_unknown_texture() {
		let doc = json::parse(r#"{ "textures": {}, "entries": { "en": ["nope.png"] } }"#).unwrap();
		assert!(matches!(language_tables(&doc), Err(AtlasError::UnknownTexture(_))));
	}
}
