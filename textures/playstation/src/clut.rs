//! CLUT (palette) attribute packing.
//!
//! A CLUT attribute addresses a palette in VRAM: bits 0-5 hold the column in
//! 16 halfword units, bits 6-14 hold the row.

/// Palette columns are addressed in units of this many halfwords
pub const CLUT_COLUMN_UNIT: u16 = 16;

pub const VRAM_WIDTH: u16 = 1024;
pub const VRAM_HEIGHT: u16 = 512;

/// Packs a VRAM palette position into a CLUT attribute.
///
/// Panics if `x` is not a multiple of 16 or the position lies outside VRAM;
/// callers only pass positions computed from a validated layout.
pub fn pack_clut_attr(x: u16, y: u16) -> u16 {
	assert!(x % CLUT_COLUMN_UNIT == 0 && x < VRAM_WIDTH && y < VRAM_HEIGHT,
		"CLUT position ({}, {}) is not addressable", x, y);

	(y & 0x1FF) << 6 | ((x / CLUT_COLUMN_UNIT) & 0x3F)
}

/// Unpacks a CLUT attribute into its VRAM (x, y) position
pub fn unpack_clut_attr(attr: u16) -> (u16, u16) {
	((attr & 0x3F) * CLUT_COLUMN_UNIT, (attr >> 6) & 0x1FF)
}
