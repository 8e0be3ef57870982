//! Assigns textures to texture pages.
//!
//! Every page in the grid is a skyline bin. Palettes are stored as extra
//! scan-lines under the packed textures, so each bin gives up the same number
//! of lines at the bottom to make room for them.

use rect_packer::{
	Config,
	Packer
};

use tracing::{
	debug,
	trace
};

use super::{
	AtlasError,
	config::{
		PAGE_SIZE,
		Settings
	}
};

/// Colors in one texture's palette
pub const PALETTE_COLORS: usize = 16;

/// Bytes taken by one texture's palette
pub const PALETTE_SIZE: usize = PALETTE_COLORS * 2;

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutItem {
	pub name: String,
	pub width: usize,
	pub height: usize,
}

/// A placed texture. `x` and `y` are relative to its bin.
#[derive(Clone, Debug, PartialEq)]
pub struct PackedRect {
	pub bin_index: u16,
	pub x: u16,
	pub y: u16,
	pub width: u16,
	pub height: u16,
	pub source_file: String,
}

impl PackedRect {
	/// Column and row of the bin within the page grid
	pub fn grid_position(&self, settings: &Settings) -> (u16, u16) {
		(self.bin_index % settings.page_grid_width, self.bin_index / settings.page_grid_width)
	}

	pub fn texture_page(&self, settings: &Settings) -> u16 {
		let (column, row) = self.grid_position(settings);
		settings.texture_page(column, row)
	}

	/// Top left corner within the composed atlas
	pub fn canvas_position(&self, settings: &Settings) -> (usize, usize) {
		let (column, row) = self.grid_position(settings);
		(column as usize * PAGE_SIZE + self.x as usize, row as usize * PAGE_SIZE + self.y as usize)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
	pub rects: Vec<PackedRect>,
	pub canvas_width: usize,
	pub canvas_height: usize,
	/// Lowest line covered by a texture; palettes start here
	pub used_height: usize,
	pub palette_lines: usize,
}

/// Scan-lines needed to hold `count` palettes in a 4-bit canvas `canvas_width` pixels wide
pub fn palette_lines(count: usize, canvas_width: usize) -> usize {
	// two 4-bit pixels per byte
	let pixels = count * PALETTE_SIZE * 2;
	(pixels + canvas_width - 1) / canvas_width
}

/// Packs `items` into the page grid described by `settings`.
///
/// Items are placed in order, each into the first bin with room for it, so
/// the result is deterministic. Rotation is never used.
pub fn layout(settings: &Settings, items: &[LayoutItem]) -> Result<Layout, AtlasError> {
	settings.validate()?;

	let canvas_width = settings.canvas_width();
	let palette_lines = palette_lines(items.len(), canvas_width);
	let bin_height = PAGE_SIZE.saturating_sub(palette_lines);

	debug!(textures = items.len(), bins = settings.bin_count(), bin_height, palette_lines, "packing atlas");

	let mut bins: Vec<Packer> = (0..settings.bin_count())
		.map(|_| Packer::new(Config {
			width: PAGE_SIZE as i32,
			height: bin_height as i32,
			border_padding: 0,
			rectangle_padding: 0,
		}))
		.collect();
	let mut rects = Vec::with_capacity(items.len());
	let mut unplaced = 0;

	for item in items.iter() {
		if item.width == 0 || item.height == 0 || item.width > PAGE_SIZE || item.height > bin_height {
			unplaced += 1;
			continue;
		}

		let placed = bins.iter_mut()
			.enumerate()
			.find_map(|(i, bin)| bin.pack(item.width as i32, item.height as i32, false).map(|r| (i, r)));

		match placed {
			Some((i, r)) => {
				trace!(name = %item.name, bin = i, x = r.x, y = r.y, "placed");
				rects.push(PackedRect {
					bin_index: i as u16,
					x: r.x as u16,
					y: r.y as u16,
					width: r.width as u16,
					height: r.height as u16,
					source_file: item.name.clone(),
				});
			},
			None => unplaced += 1,
		}
	}

	if unplaced > 0 {
		return Err(AtlasError::CapacityExceeded {
			unplaced: unplaced,
			total: items.len(),
		});
	}

	let used_height = rects.iter()
		.map(|r| r.canvas_position(settings).1 + r.height as usize)
		.max()
		.unwrap_or(0);

	Ok(Layout {
		rects: rects,
		canvas_width: canvas_width,
		canvas_height: used_height + palette_lines,
		used_height: used_height,
		palette_lines: palette_lines,
	})
}
