//! The `layout.ini` sidecar describing where an atlas lives in VRAM and which files it holds.

use nom::{
	character::complete::multispace0,
	error::Error as NomError
};

use std::{
	fmt::Write as _,
	fs,
	io,
	path::Path
};

use thiserror::Error;
use tracing::debug;

use gt2_core::nom_ext::{
	ini_comment,
	ini_entry,
	section_header
};

use crate::tim::ImageBlock;

pub const DEFAULT_BASE_PAGE_INDEX: u16 = 12;

/// Texture pages are 256x256 pixels at 4 bits per pixel
pub const PAGE_SIZE: usize = 256;

/// Width of a texture page in 16-bit VRAM units
pub const PAGE_UNITS: u16 = 64;

/// VRAM holds 16 x 2 texture pages
pub const VRAM_PAGE_COLUMNS: u16 = 16;
pub const VRAM_PAGE_ROWS: u16 = 2;

pub const SETTINGS_SECTION: &str = "Settings";
pub const FILES_SECTION: &str = "Files";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Syntax error on line {0}")]
	Syntax(usize),
	#[error("Unknown section [{0}]")]
	Section(String),
	#[error("Unknown setting {0}")]
	Key(String),
	#[error("Invalid value for {key}: {value}")]
	Value {
		key: String,
		value: String,
	},
	#[error("Invalid layout: {0}")]
	Invalid(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Settings {
	pub base_page_index: u16,
	pub page_grid_width: u16,
	pub page_grid_height: u16,
}

impl Default for Settings {
	fn default() -> Settings {
		Settings {
			base_page_index: DEFAULT_BASE_PAGE_INDEX,
			page_grid_width: 1,
			page_grid_height: 1,
		}
	}
}

impl Settings {
	/// Derives settings from where an atlas image was uploaded to VRAM
	pub fn from_image(image: &ImageBlock) -> Settings {
		let width = ((image.width + PAGE_UNITS - 1) / PAGE_UNITS).max(1);
		let height = ((image.height as usize + PAGE_SIZE - 1) / PAGE_SIZE).max(1);

		Settings {
			base_page_index: image.x / PAGE_UNITS + VRAM_PAGE_COLUMNS * (image.y / PAGE_SIZE as u16),
			page_grid_width: width,
			page_grid_height: height as u16,
		}
	}

	/// Checks that the page grid is non-empty and fits in VRAM
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.page_grid_width == 0 || self.page_grid_height == 0 {
			return Err(ConfigError::Invalid("page grid must be at least 1x1".to_string()));
		}

		let column = self.base_page_index % VRAM_PAGE_COLUMNS;
		let row = self.base_page_index / VRAM_PAGE_COLUMNS;
		if column + self.page_grid_width > VRAM_PAGE_COLUMNS || row + self.page_grid_height > VRAM_PAGE_ROWS {
			return Err(ConfigError::Invalid(format!("{}x{} page grid at page {} does not fit in VRAM",
				self.page_grid_width, self.page_grid_height, self.base_page_index)));
		}

		Ok(())
	}

	pub fn bin_count(&self) -> usize {
		self.page_grid_width as usize * self.page_grid_height as usize
	}

	/// Width of the composed atlas in pixels
	pub fn canvas_width(&self) -> usize {
		self.page_grid_width as usize * PAGE_SIZE
	}

	/// VRAM position of the atlas' top left corner, in 16-bit units
	pub fn origin(&self) -> (u16, u16) {
		((self.base_page_index % VRAM_PAGE_COLUMNS) * PAGE_UNITS,
			(self.base_page_index / VRAM_PAGE_COLUMNS) * PAGE_SIZE as u16)
	}

	/// Texture page of the bin at (`column`, `row`) in the grid
	pub fn texture_page(&self, column: u16, row: u16) -> u16 {
		self.base_page_index + column + VRAM_PAGE_COLUMNS * row
	}

	/// Pixel offset of a texture page within the atlas, if the page belongs to it
	pub fn page_offset(&self, texture_page: u16) -> Option<(usize, usize)> {
		let relative = texture_page.checked_sub(self.base_page_index)?;
		let column = relative % VRAM_PAGE_COLUMNS;
		let row = relative / VRAM_PAGE_COLUMNS;

		if column >= self.page_grid_width || row >= self.page_grid_height {
			return None;
		}

		Some((column as usize * PAGE_SIZE, row as usize * PAGE_SIZE))
	}
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LayoutConfig {
	pub settings: Settings,
	pub files: Vec<String>,
}

impl LayoutConfig {
	pub fn new(settings: Settings) -> LayoutConfig {
		LayoutConfig {
			settings: settings,
			files: vec![],
		}
	}

	/// Appends a file unless it is already listed
	pub fn add_file(&mut self, name: &str) {
		if !self.files.iter().any(|f| f == name) {
			self.files.push(name.to_string());
		}
	}

	pub fn parse(text: &str) -> Result<LayoutConfig, ConfigError> {
		let mut config = LayoutConfig::default();
		let mut section: Option<&str> = None;
		let mut input = text;

		loop {
			let (rest, _) = multispace0::<_, NomError<&str>>(input)
				.map_err(|_| ConfigError::Syntax(line_of(text, input)))?;
			if rest.is_empty() {
				break;
			}

			if let Ok((rest, _)) = ini_comment::<NomError<&str>>(rest) {
				input = rest;
				continue;
			}

			if let Ok((rest, name)) = section_header::<NomError<&str>>(rest) {
				if !name.eq_ignore_ascii_case(SETTINGS_SECTION) && !name.eq_ignore_ascii_case(FILES_SECTION) {
					return Err(ConfigError::Section(name.to_string()));
				}

				section = Some(name);
				input = rest;
				continue;
			}

			let (after, (key, value)) = ini_entry::<NomError<&str>>(rest)
				.map_err(|_| ConfigError::Syntax(line_of(text, rest)))?;

			match section {
				Some(s) if s.eq_ignore_ascii_case(SETTINGS_SECTION) => config.set(key, value)?,
				Some(_) => config.add_file(key),
				None => return Err(ConfigError::Syntax(line_of(text, rest))),
			}

			input = after;
		}

		config.settings.validate()?;
		debug!(settings = ?config.settings, files = config.files.len(), "parsed layout config");

		Ok(config)
	}

	fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
		let parsed = value.parse::<u16>().map_err(|_| ConfigError::Value {
			key: key.to_string(),
			value: value.to_string(),
		})?;

		match key.to_ascii_lowercase().as_str() {
			"basepageindex" => self.settings.base_page_index = parsed,
			"pagegridwidth" => self.settings.page_grid_width = parsed,
			"pagegridheight" => self.settings.page_grid_height = parsed,
			_ => return Err(ConfigError::Key(key.to_string())),
		}

		Ok(())
	}

	pub fn read<P>(path: P) -> Result<LayoutConfig, ConfigError>
	where
		P: AsRef<Path>,
	{
		LayoutConfig::parse(&fs::read_to_string(path)?)
	}

	pub fn to_ini_string(&self) -> String {
		let mut out = String::new();

		// writing into a String cannot fail
		let _ = writeln!(out, "[{}]", SETTINGS_SECTION);
		let _ = writeln!(out, "BasePageIndex = {}", self.settings.base_page_index);
		let _ = writeln!(out, "PageGridWidth = {}", self.settings.page_grid_width);
		let _ = writeln!(out, "PageGridHeight = {}", self.settings.page_grid_height);
		let _ = writeln!(out);
		let _ = writeln!(out, "[{}]", FILES_SECTION);

		for f in self.files.iter() {
			let _ = writeln!(out, "{} =", f);
		}

		out
	}

	pub fn write<P>(&self, path: P) -> io::Result<()>
	where
		P: AsRef<Path>,
	{
		fs::write(path, self.to_ini_string())
	}
}

/// 1-based line number of `rest` within `text`
fn line_of(text: &str, rest: &str) -> usize {
	let consumed = text.len() - rest.len();
	text[..consumed].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = "; atlas layout
[Settings]
BasePageIndex = 13
PageGridWidth = 2
PageGridHeight = 1

[Files]
logo.png =
# comment
arrow.png
logo.png =
";

	#[test]
	fn test_parse() {
		let config = LayoutConfig::parse(SAMPLE).unwrap();

		assert_eq!(config.settings, Settings {
			base_page_index: 13,
			page_grid_width: 2,
			page_grid_height: 1,
		});
		assert_eq!(config.files, vec!["logo.png".to_string(), "arrow.png".to_string()]);
	}

	#[test]
	fn test_defaults_and_round_trip() {
		let config = LayoutConfig::parse("[Files]\na.png =\n").unwrap();
		assert_eq!(config.settings, Settings::default());
		assert_eq!(LayoutConfig::parse(&config.to_ini_string()).unwrap(), config);
	}

	#[test]
	fn test_errors() {
		assert!(matches!(LayoutConfig::parse("[Settings]\nFoo = 1\n"), Err(ConfigError::Key(_))));
		assert!(matches!(LayoutConfig::parse("[Settings]\nPageGridWidth = x\n"), Err(ConfigError::Value { .. })));
		assert!(matches!(LayoutConfig::parse("[Other]\n"), Err(ConfigError::Section(_))));
		assert!(matches!(LayoutConfig::parse("\n\na.png =\n"), Err(ConfigError::Syntax(3))));
		assert!(matches!(LayoutConfig::parse("[Settings]\nBasePageIndex = 15\nPageGridWidth = 2\n"),
			Err(ConfigError::Invalid(_))));
	}

	#[test]
	fn test_page_math() {
		let settings = Settings {
			base_page_index: 12,
			page_grid_width: 5,
			page_grid_height: 1,
		};
		assert!(settings.validate().is_err());

		let settings = Settings {
			base_page_index: 12,
			page_grid_width: 4,
			page_grid_height: 1,
		};
		assert_eq!(settings.origin(), (768, 0));
		assert_eq!(settings.texture_page(3, 0), 15);
		assert_eq!(settings.page_offset(14), Some((512, 0)));
		assert_eq!(settings.page_offset(11), None);
		assert_eq!(settings.page_offset(16), None);

		let settings = Settings {
			base_page_index: 6,
			page_grid_width: 2,
			page_grid_height: 2,
		};
		assert_eq!(settings.texture_page(1, 1), 23);
		assert_eq!(settings.page_offset(23), Some((256, 256)));
	}

	#[test]
	fn test_from_image() {
		let image = ImageBlock {
			x: 768,
			y: 0,
			width: 64,
			height: 201,
			data: vec![],
		};

		assert_eq!(Settings::from_image(&image), Settings::default());
	}
}
