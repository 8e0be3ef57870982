//! Texture atlases: many small 4-bit textures packed into shared texture pages.
//!
//! The atlas is a single 4-bit TIM image without a CLUT block. Each texture's
//! 16 color palette is stored as raw 15-bit colors in extra scan-lines under
//! the packed textures, and a `definitions` table of [`AtlasEntry`] records
//! tells the game where each texture and palette lives.

pub mod config;
pub mod definitions;
pub mod layout;
pub mod record;

use json::JsonValue;

use std::{
	collections::HashMap,
	io
};

use thiserror::Error;

use tracing::{
	debug,
	info,
	warn
};

use gt2_core::texture::{
	Bitmap,
	Color,
	MIN_ALPHA_THRESHOLD,
	Texture,
	TextureError
};

use crate::{
	clut::{
		pack_clut_attr,
		unpack_clut_attr
	},
	pixels::{
		pack_4bpp,
		unpack_4bpp
	},
	tim::{
		Depth,
		ImageBlock,
		PSXTexture,
		TIMError
	}
};

use config::{
	ConfigError,
	LayoutConfig,
	Settings
};

use definitions::definitions_json;

use layout::{
	Layout,
	LayoutItem,
	PALETTE_COLORS,
	PALETTE_SIZE
};

pub use record::AtlasEntry;

#[derive(Debug, Error)]
pub enum AtlasError {
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Invalid TIM: {0}")]
	TIM(#[from] TIMError),
	#[error("Invalid layout config: {0}")]
	Config(#[from] ConfigError),
	#[error("{0}")]
	Texture(#[from] TextureError),
	#[error("JSON parsing error")]
	Json(#[from] json::Error),
	#[error("{unplaced} of {total} textures do not fit in the page grid")]
	CapacityExceeded {
		unplaced: usize,
		total: usize,
	},
	#[error("Texture file not found: {0}")]
	MissingFile(String),
	#[error("No textures to pack")]
	Empty,
	#[error("Definitions table is {0} bytes, not a whole number of entries")]
	TableSize(usize),
	#[error("Atlas must be 4 bits per pixel, found {0:?}")]
	Depth(Depth),
	#[error("Texture {index} uses texture page {page}, which is not part of the atlas")]
	TexturePage {
		index: usize,
		page: u16,
	},
	#[error("Texture {index} lies outside the atlas")]
	OutOfBounds {
		index: usize,
	},
	#[error("Palette of texture {index} at ({x}, {y}) lies outside the atlas")]
	PaletteOutOfBounds {
		index: usize,
		x: u16,
		y: u16,
	},
	#[error("Unknown texture {0}")]
	UnknownTexture(String),
	#[error("Malformed definitions: {0}")]
	Definitions(String),
}

/// A texture that had more colors than a palette holds and was quantized
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColorBudgetWarning {
	pub name: String,
	pub colors: usize,
}

#[derive(Clone, Debug)]
pub struct Assembly {
	pub tim: PSXTexture,
	/// One entry per texture, in config file order
	pub entries: Vec<AtlasEntry>,
	pub definitions: JsonValue,
	/// Full color composite of the unquantized sources
	pub preview: Bitmap,
	pub layout: Layout,
	pub warnings: Vec<ColorBudgetWarning>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Disassembly {
	pub textures: Vec<(String, Bitmap)>,
	/// `settings` with the generated texture names filled in
	pub config: LayoutConfig,
}

/// Name given to the `index`th (1-based) texture pulled from an atlas
pub fn texture_name(index: usize) -> String {
	format!("tex_{}.png", index)
}

/// Anything under the minimum alpha is stored as transparent, so fold those
/// pixels together before they take up palette slots.
fn fold_transparent(bitmap: &Bitmap) -> Bitmap {
	let mut out = bitmap.clone();
	for c in out.pixels.iter_mut() {
		if c.alpha < MIN_ALPHA_THRESHOLD {
			*c = Color::TRANSPARENT;
		}
	}

	out
}

/// Builds an atlas from the files listed in `config`, looked up by name in `textures`.
///
/// Textures are quantized to 16 colors, packed, and composited into a 4-bit
/// canvas; palette `i` goes into the `i`th 32 byte slot of the palette lines.
#[cfg(feature = "export")]
pub fn assemble(config: &LayoutConfig, textures: &HashMap<String, Bitmap>) -> Result<Assembly, AtlasError> {
	if config.files.is_empty() {
		return Err(AtlasError::Empty);
	}

	let settings = &config.settings;

	let mut sources = Vec::with_capacity(config.files.len());
	for name in config.files.iter() {
		let bitmap = textures.get(name).ok_or_else(|| AtlasError::MissingFile(name.clone()))?;
		sources.push((name, bitmap));
	}

	let mut warnings = vec![];
	let mut quantized = Vec::with_capacity(sources.len());
	for (name, bitmap) in sources.iter() {
		let folded = fold_transparent(bitmap);
		let colors = folded.color_count();

		if colors > PALETTE_COLORS {
			warn!(name = %name, colors, "texture exceeds {} colors and will be quantized", PALETTE_COLORS);
			warnings.push(ColorBudgetWarning {
				name: name.to_string(),
				colors: colors,
			});
		}

		quantized.push(folded.quantize(PALETTE_COLORS));
	}

	let items: Vec<LayoutItem> = sources.iter()
		.map(|(name, bitmap)| LayoutItem {
			name: name.to_string(),
			width: bitmap.width,
			height: bitmap.height,
		})
		.collect();

	let layout = layout::layout(settings, &items)?;

	let mut canvas = Texture::new(layout.canvas_width, layout.canvas_height);
	let mut preview = Bitmap::new(layout.canvas_width, layout.canvas_height);

	for (i, rect) in layout.rects.iter().enumerate() {
		let (x, y) = rect.canvas_position(settings);
		canvas.paste(&quantized[i], x, y)?;
		preview.paste(sources[i].1, x, y)?;
	}

	let mut data = pack_4bpp(&canvas.indices);
	let stride = layout.canvas_width / 2;
	let (origin_x, origin_y) = settings.origin();

	let mut entries = Vec::with_capacity(layout.rects.len());
	for (i, rect) in layout.rects.iter().enumerate() {
		let slot = i * PALETTE_SIZE;
		let line = layout.used_height + slot / stride;
		let column = slot % stride;
		let start = line * stride + column;

		for (j, chunk) in data[start..(start + PALETTE_SIZE)].chunks_exact_mut(2).enumerate() {
			let color = quantized[i].palette.get(j).map_or(0, |c| c.to_rgba5551());
			chunk.copy_from_slice(&color.to_le_bytes());
		}

		let palette = pack_clut_attr(origin_x + (column / 2) as u16, origin_y + line as u16);
		debug!(name = %rect.source_file, palette = format_args!("{:#06x}", palette), "assigned palette");

		entries.push(AtlasEntry::new(rect.x as u8, rect.y as u8, palette, rect.width, rect.height,
			rect.texture_page(settings)));
	}

	let tim = PSXTexture {
		depth: Depth::BPP4,
		mixed: false,
		palette: None,
		image: ImageBlock {
			x: origin_x,
			y: origin_y,
			width: (layout.canvas_width / 4) as u16,
			height: layout.canvas_height as u16,
			data: data,
		},
	};

	info!(textures = entries.len(), width = layout.canvas_width, height = layout.canvas_height,
		palette_lines = layout.palette_lines, "assembled atlas");

	Ok(Assembly {
		tim: tim,
		definitions: definitions_json(&config.files, &entries),
		entries: entries,
		preview: preview,
		layout: layout,
		warnings: warnings,
	})
}

/// Splits an atlas back into one full color bitmap per entry, in entry order.
#[cfg(feature = "import")]
pub fn disassemble(tim: &PSXTexture, entries: &[AtlasEntry], settings: &Settings) -> Result<Disassembly, AtlasError> {
	if tim.depth != Depth::BPP4 {
		return Err(AtlasError::Depth(tim.depth));
	}

	let image = &tim.image;
	let stride = image.stride();
	let expected = stride * image.height as usize;
	if image.data.len() < expected {
		return Err(TIMError::Truncated {
			declared: expected,
			available: image.data.len(),
		}.into());
	}

	let width = tim.depth.pixel_width(image.width);
	let canvas = Texture::from_indices(width, image.height as usize, unpack_4bpp(&image.data[..expected]))?;
	let (origin_x, origin_y) = settings.origin();

	let mut config = LayoutConfig::new(*settings);
	let mut textures = Vec::with_capacity(entries.len());

	for (i, e) in entries.iter().enumerate() {
		let index = i + 1;

		let (page_x, page_y) = settings.page_offset(e.texture_page).ok_or(AtlasError::TexturePage {
			index: index,
			page: e.texture_page,
		})?;

		let mut texture = canvas.crop(page_x + e.x as usize, page_y + e.y as usize, e.width as usize,
			e.height as usize).map_err(|_| AtlasError::OutOfBounds { index: index })?;

		let (pal_x, pal_y) = unpack_clut_attr(e.palette);
		let clut = pal_x.checked_sub(origin_x)
			.zip(pal_y.checked_sub(origin_y))
			.map(|(x, y)| x as usize * 2 + y as usize * stride)
			.and_then(|offset| image.data.get(offset..(offset + PALETTE_SIZE)))
			.ok_or(AtlasError::PaletteOutOfBounds {
				index: index,
				x: pal_x,
				y: pal_y,
			})?;

		texture.palette = clut.chunks_exact(2)
			.map(|c| Color::from_rgba5551(u16::from_le_bytes([c[0], c[1]])))
			.collect();

		let name = texture_name(index);
		debug!(name = %name, page = e.texture_page, x = e.x, y = e.y, "extracted texture");

		config.add_file(&name);
		textures.push((name, texture.to_bitmap()));
	}

	info!(textures = textures.len(), "disassembled atlas");

	Ok(Disassembly {
		textures: textures,
		config: config,
	})
}

#[cfg(all(test, feature = "import", feature = "export"))]
mod tests {
	use super::*;

	fn bitmap(width: usize, height: usize, colors: &[Color]) -> Bitmap {
		let pixels = (0..(width * height)).map(|i| colors[(i / 3) % colors.len()]).collect();
		Bitmap::from_pixels(width, height, pixels).unwrap()
	}

	fn sources() -> (LayoutConfig, HashMap<String, Bitmap>) {
		let a = bitmap(8, 4, &[
			Color::new(255, 0, 0, 255),
			Color::TRANSPARENT,
			Color::new(0, 0, 255, 128),
		]);
		let b = bitmap(16, 16, &[
			Color::new(0, 0, 0, 255),
			Color::new(40, 200, 120, 255),
			Color::new(255, 255, 255, 255),
			Color::new(10, 10, 10, 0x10),
		]);

		let mut config = LayoutConfig::default();
		config.add_file("a.png");
		config.add_file("b.png");

		let mut textures = HashMap::new();
		textures.insert("a.png".to_string(), a);
		textures.insert("b.png".to_string(), b);

		(config, textures)
	}

	#[test]
	fn test_round_trip() {
		let (config, textures) = sources();
		let assembly = assemble(&config, &textures).unwrap();

		assert!(assembly.warnings.is_empty());
		assert_eq!(assembly.entries.len(), 2);
		assert_eq!(assembly.entries[0].texture_page, 12);
		assert_eq!(assembly.tim.image.x, 768);
		assert_eq!(assembly.tim.image.height as usize, assembly.layout.used_height + 1);

		// through the on-disk formats
		let tim = PSXTexture::read(&assembly.tim.to_bytes()).unwrap();
		let entries = AtlasEntry::read_table(&AtlasEntry::write_table(&assembly.entries)).unwrap();
		let out = disassemble(&tim, &entries, &config.settings).unwrap();

		assert_eq!(out.config.files, vec![texture_name(1), texture_name(2)]);

		for ((_, got), name) in out.textures.iter().zip(config.files.iter()) {
			let src = &textures[name];
			assert_eq!((got.width, got.height), (src.width, src.height));

			for (g, s) in got.pixels.iter().zip(src.pixels.iter()) {
				assert_eq!(*g, Color::from_rgba5551(s.to_rgba5551()));
			}
		}
	}

	#[test]
	fn test_multi_row_round_trip() {
		let settings = Settings {
			base_page_index: 5,
			page_grid_width: 2,
			page_grid_height: 2,
		};
		let mut config = LayoutConfig::new(settings);
		let mut textures = HashMap::new();

		for i in 0..5u8 {
			let name = format!("{}.png", i);
			let size = if i < 4 { 200 } else { 40 };
			let colors = [Color::new(40 * i, 255 - 40 * i, 90, 255), Color::TRANSPARENT, Color::new(255, 255, 255, 128)];

			config.add_file(&name);
			textures.insert(name, bitmap(size, size, &colors));
		}

		let assembly = assemble(&config, &textures).unwrap();
		let pages: Vec<u16> = assembly.entries.iter().map(|e| e.texture_page).collect();
		assert_eq!(pages, vec![5, 6, 21, 22, 5]);
		assert_eq!((assembly.tim.image.x, assembly.tim.image.y), (320, 0));
		assert_eq!(assembly.layout.used_height, 456);

		// palettes sit below the second page row
		for e in assembly.entries.iter() {
			assert_eq!(unpack_clut_attr(e.palette).1, 456);
		}

		let tim = PSXTexture::read(&assembly.tim.to_bytes()).unwrap();
		let out = disassemble(&tim, &assembly.entries, &settings).unwrap();

		for ((_, got), name) in out.textures.iter().zip(config.files.iter()) {
			let src = &textures[name];
			assert_eq!((got.width, got.height), (src.width, src.height));

			for (g, s) in got.pixels.iter().zip(src.pixels.iter()) {
				assert_eq!(*g, Color::from_rgba5551(s.to_rgba5551()));
			}
		}
	}

	#[test]
	fn test_palette_slots() {
		let (config, textures) = sources();
		let assembly = assemble(&config, &textures).unwrap();
		let line = assembly.layout.used_height as u16;

		assert_eq!(unpack_clut_attr(assembly.entries[0].palette), (768, line));
		assert_eq!(unpack_clut_attr(assembly.entries[1].palette), (784, line));
		assert_eq!(assembly.definitions["b.png"]["palette"].as_u16(), Some(assembly.entries[1].palette));
	}

	#[test]
	fn test_color_budget() {
		let colors: Vec<Color> = (0..20).map(|i| Color::new(i * 12, 0, 255 - i * 12, 255)).collect();
		let mut config = LayoutConfig::default();
		config.add_file("many.png");

		let mut textures = HashMap::new();
		textures.insert("many.png".to_string(), bitmap(20, 3, &colors));

		let assembly = assemble(&config, &textures).unwrap();
		assert_eq!(assembly.warnings, vec![ColorBudgetWarning {
			name: "many.png".to_string(),
			colors: 20,
		}]);
		assert_eq!(assembly.preview.crop(0, 0, 20, 3).unwrap(), textures["many.png"]);
	}

	#[test]
	fn test_missing_file() {
		let (mut config, textures) = sources();
		config.add_file("c.png");
		assert!(matches!(assemble(&config, &textures), Err(AtlasError::MissingFile(ref f)) if f == "c.png"));
	}

	#[test]
	fn test_bad_page() {
		let (config, textures) = sources();
		let assembly = assemble(&config, &textures).unwrap();

		let mut entries = assembly.entries.clone();
		entries[1].texture_page = 20;
		assert!(matches!(disassemble(&assembly.tim, &entries, &config.settings),
			Err(AtlasError::TexturePage { index: 2, page: 20 })));
	}
}
