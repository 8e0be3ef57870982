use color_quant::NeuQuant;

use std::collections::{
	HashMap,
	HashSet
};

use thiserror::Error;

use crate::{
	scale5to8,
	scale8to5
};

/// Below this alpha a color is stored as the fully transparent entry
pub const MIN_ALPHA_THRESHOLD: u8 = 0x20;

/// Above this alpha a color has its semi-transparency bit cleared
pub const MAX_ALPHA_THRESHOLD: u8 = 0xE0;

/// Semi-transparency (STP) bit of a 15-bit PlayStation color
pub const STP_BIT: u16 = 0x8000;

/// Textures are small, so NeuQuant can afford to learn from every pixel
const NEUQUANT_SAMPLE_FACTOR: i32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum TextureError {
	#[error("{width}x{height} region at ({x}, {y}) is outside a {canvas_width}x{canvas_height} canvas")]
	OutOfBounds {
		x: usize,
		y: usize,
		width: usize,
		height: usize,
		canvas_width: usize,
		canvas_height: usize,
	},
	#[error("Expected {expected} pixels, got {actual}")]
	PixelCount {
		expected: usize,
		actual: usize,
	},
}

fn check_region(x: usize, y: usize, width: usize, height: usize, canvas_width: usize,
	canvas_height: usize) -> Result<(), TextureError>
{
	if x + width > canvas_width || y + height > canvas_height {
		return Err(TextureError::OutOfBounds {
			x: x,
			y: y,
			width: width,
			height: height,
			canvas_width: canvas_width,
			canvas_height: canvas_height,
		});
	}

	Ok(())
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Color {
	pub red: u8,
	pub green: u8,
	pub blue: u8,
	pub alpha: u8,
}

impl Color {
	pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

	pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Color {
		Color {
			red: red,
			green: green,
			blue: blue,
			alpha: alpha,
		}
	}

	/// Decodes a 15-bit color plus STP bit.
	///
	/// The hardware format has no real alpha channel, so alpha is bucketed:
	///
	/// | color     | STP clear | STP set |
	/// |-----------|-----------|---------|
	/// | black     | 0         | 255     |
	/// | non-black | 255       | 128     |
	pub fn from_rgba5551(color: u16) -> Color {
		let red = scale5to8((color & 31) as u8);
		let green = scale5to8(((color >> 5) & 31) as u8);
		let blue = scale5to8(((color >> 10) & 31) as u8);
		let is_black = red == 0 && green == 0 && blue == 0;

		let alpha = match (color & STP_BIT != 0, is_black) {
			(true, true) => 255,
			(true, false) => 128,
			(false, true) => 0,
			(false, false) => 255,
		};

		Color::new(red, green, blue, alpha)
	}

	/// Encodes into a 15-bit color plus STP bit. Never fails; out of range
	/// channels saturate through the 8 to 5 bit scaling.
	///
	/// STP is set when alpha is at most [`MAX_ALPHA_THRESHOLD`], and also for any
	/// visible color that scales down to black. Plain `0x0000` always decodes as
	/// transparent, so opaque black (and near-black such as `(3, 3, 3, 255)`)
	/// becomes `0x8000` and decodes back to opaque black.
	pub fn to_rgba5551(&self) -> u16 {
		if self.alpha < MIN_ALPHA_THRESHOLD {
			return 0;
		}

		let color = scale8to5(self.red) as u16 |
			(scale8to5(self.green) as u16) << 5 |
			(scale8to5(self.blue) as u16) << 10;

		if self.alpha <= MAX_ALPHA_THRESHOLD || color == 0 {
			color | STP_BIT
		} else {
			color
		}
	}

	/// Unpacks a little endian `0xAABBGGRR` word
	pub fn from_rgba8888(color: u32) -> Color {
		let [r, g, b, a] = color.to_le_bytes();
		Color::new(r, g, b, a)
	}

	pub fn to_rgba8888(&self) -> u32 {
		u32::from_le_bytes([self.red, self.green, self.blue, self.alpha])
	}
}

/// Converts a packed 15-bit color into a packed `0xAABBGGRR` word
pub fn rgba5551_to_8888(color: u16) -> u32 {
	Color::from_rgba5551(color).to_rgba8888()
}

/// Converts a packed `0xAABBGGRR` word into a packed 15-bit color
pub fn rgba8888_to_5551(color: u32) -> u16 {
	Color::from_rgba8888(color).to_rgba5551()
}

/// An indexed canvas: one palette index per pixel, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
	pub palette: Vec<Color>,
	pub indices: Vec<u8>,
	pub width: usize,
	pub height: usize,
}

impl Texture {
	pub fn new(width: usize, height: usize) -> Texture {
		Texture {
			palette: vec![],
			indices: vec![0; width * height],
			width: width,
			height: height,
		}
	}

	pub fn from_indices(width: usize, height: usize, indices: Vec<u8>) -> Result<Texture, TextureError> {
		if indices.len() != width * height {
			return Err(TextureError::PixelCount {
				expected: width * height,
				actual: indices.len(),
			});
		}

		Ok(Texture {
			palette: vec![],
			indices: indices,
			width: width,
			height: height,
		})
	}

	/// Copies a rectangular region into a new texture sharing this palette
	pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> Result<Texture, TextureError> {
		check_region(x, y, width, height, self.width, self.height)?;

		let mut indices = Vec::with_capacity(width * height);
		for row in y..(y + height) {
			let start = row * self.width + x;
			indices.extend_from_slice(&self.indices[start..(start + width)]);
		}

		Ok(Texture {
			palette: self.palette.clone(),
			indices: indices,
			width: width,
			height: height,
		})
	}

	/// Copies the indices of `src` into this canvas at (`x`, `y`). The palette is left untouched.
	pub fn paste(&mut self, src: &Texture, x: usize, y: usize) -> Result<(), TextureError> {
		check_region(x, y, src.width, src.height, self.width, self.height)?;

		for row in 0..src.height {
			let dst = (y + row) * self.width + x;
			let s = row * src.width;
			self.indices[dst..(dst + src.width)].copy_from_slice(&src.indices[s..(s + src.width)]);
		}

		Ok(())
	}

	/// Uses the palette and indices to build a pixel array.
	/// Indices past the end of the palette resolve to transparent.
	pub fn pixels(&self) -> Vec<Color> {
		self.indices.iter()
			.map(|i| self.palette.get(*i as usize).copied().unwrap_or(Color::TRANSPARENT))
			.collect()
	}

	pub fn to_bitmap(&self) -> Bitmap {
		Bitmap {
			pixels: self.pixels(),
			width: self.width,
			height: self.height,
		}
	}
}

/// A full color canvas, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
	pub pixels: Vec<Color>,
	pub width: usize,
	pub height: usize,
}

impl Bitmap {
	/// Creates a fully transparent bitmap
	pub fn new(width: usize, height: usize) -> Bitmap {
		Bitmap {
			pixels: vec![Color::TRANSPARENT; width * height],
			width: width,
			height: height,
		}
	}

	pub fn from_pixels(width: usize, height: usize, pixels: Vec<Color>) -> Result<Bitmap, TextureError> {
		if pixels.len() != width * height {
			return Err(TextureError::PixelCount {
				expected: width * height,
				actual: pixels.len(),
			});
		}

		Ok(Bitmap {
			pixels: pixels,
			width: width,
			height: height,
		})
	}

	/// Builds a bitmap from tightly packed RGBA bytes
	pub fn from_rgba_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Bitmap, TextureError> {
		let pixels = bytes.chunks_exact(4)
			.map(|c| Color::new(c[0], c[1], c[2], c[3]))
			.collect();

		Bitmap::from_pixels(width, height, pixels)
	}

	pub fn to_rgba_bytes(&self) -> Vec<u8> {
		self.pixels.iter()
			.flat_map(|c| [c.red, c.green, c.blue, c.alpha])
			.collect()
	}

	pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> Result<Bitmap, TextureError> {
		check_region(x, y, width, height, self.width, self.height)?;

		let mut pixels = Vec::with_capacity(width * height);
		for row in y..(y + height) {
			let start = row * self.width + x;
			pixels.extend_from_slice(&self.pixels[start..(start + width)]);
		}

		Ok(Bitmap {
			pixels: pixels,
			width: width,
			height: height,
		})
	}

	pub fn paste(&mut self, src: &Bitmap, x: usize, y: usize) -> Result<(), TextureError> {
		check_region(x, y, src.width, src.height, self.width, self.height)?;

		for row in 0..src.height {
			let dst = (y + row) * self.width + x;
			let s = row * src.width;
			self.pixels[dst..(dst + src.width)].copy_from_slice(&src.pixels[s..(s + src.width)]);
		}

		Ok(())
	}

	/// Number of distinct colors
	pub fn color_count(&self) -> usize {
		distinct_colors(&self.pixels).len()
	}

	/// Reduces the bitmap to an indexed texture of at most `max_colors` colors.
	///
	/// Bitmaps already within budget keep their exact colors in first-seen order.
	/// Larger ones are quantized with NeuQuant over RGBA. Fully transparent
	/// pixels keep a palette slot of their own at index 0.
	pub fn quantize(&self, max_colors: usize) -> Texture {
		let max_colors = max_colors.clamp(1, 256);
		let colors = distinct_colors(&self.pixels);

		if colors.len() <= max_colors {
			let lookup: HashMap<Color, u8> = colors.iter()
				.enumerate()
				.map(|(i, c)| (*c, i as u8))
				.collect();

			return Texture {
				indices: self.pixels.iter().map(|c| lookup.get(c).copied().unwrap_or(0)).collect(),
				palette: colors,
				width: self.width,
				height: self.height,
			};
		}

		let reserve = max_colors > 1 && colors.iter().any(|c| c.alpha == 0);
		let offset = reserve as usize;

		let visible: Vec<u8> = self.pixels.iter()
			.filter(|c| !reserve || c.alpha != 0)
			.flat_map(|c| [c.red, c.green, c.blue, c.alpha])
			.collect();

		let quant = NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, max_colors - offset, &visible);

		let mut palette = if reserve { vec![Color::TRANSPARENT] } else { vec![] };
		palette.extend(quant.color_map_rgba().chunks_exact(4).map(|c| Color::new(c[0], c[1], c[2], c[3])));

		let indices = self.pixels.iter()
			.map(|c| if reserve && c.alpha == 0 {
				0
			} else {
				(quant.index_of(&[c.red, c.green, c.blue, c.alpha]) + offset) as u8
			})
			.collect();

		Texture {
			indices: indices,
			palette: palette,
			width: self.width,
			height: self.height,
		}
	}
}

/// Distinct colors in first-seen order
fn distinct_colors(pixels: &[Color]) -> Vec<Color> {
	let mut order = vec![];
	let mut seen: HashSet<Color> = HashSet::new();

	for c in pixels.iter() {
		if seen.insert(*c) {
			order.push(*c);
		}
	}

	order
}
