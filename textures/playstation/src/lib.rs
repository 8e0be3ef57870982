pub mod atlas;
pub mod clut;
pub mod pixels;
pub mod tim;

use byteorder::{
	ByteOrder,
	LE
};

use std::fs;

use gt2_core::texture::{
	Bitmap,
	Color,
	Texture
};

use pixels::unpack_4bpp;
use tim::*;

#[cfg(feature = "import")]
pub fn read_tim(filepath: &str) -> Result<Bitmap, TIMError> {
	let input = fs::read(filepath)?;
	let tex = PSXTexture::read(&input)?;

	tim_to_bitmap(&tex)
}

/// Renders a TIM image in full color. Indexed images use the first palette in their CLUT.
pub fn tim_to_bitmap(tex: &PSXTexture) -> Result<Bitmap, TIMError> {
	let width = tex.depth.pixel_width(tex.image.width);
	let height = tex.image.height as usize;
	let data = &tex.image.data;

	match tex.depth {
		Depth::BPP4 | Depth::BPP8 => {
			let palette = tex.palette.as_ref().ok_or(TIMError::MissingPalette)?;

			let indices = if tex.depth == Depth::BPP4 {
				unpack_4bpp(data)
			} else {
				data.clone()
			};

			let mut texture = Texture::from_indices(width, height, indices)?;
			texture.palette = palette.entries.iter().map(|c| Color::from_rgba5551(*c)).collect();

			Ok(texture.to_bitmap())
		},
		Depth::BPP16 => {
			// Since these are direct color values, there is no palette to resolve.
			let pixels = data.chunks_exact(2)
				.map(|c| Color::from_rgba5551(LE::read_u16(c)))
				.collect();

			Ok(Bitmap::from_pixels(width, height, pixels)?)
		},
		Depth::BPP24 => {
			// rows are padded to a whole number of 16-bit units
			let stride = tex.image.stride();
			let mut pixels = Vec::with_capacity(width * height);

			for row in data.chunks(stride).take(height) {
				pixels.extend(row.chunks_exact(3).take(width).map(|c| Color::new(c[0], c[1], c[2], 255)));
			}

			Ok(Bitmap::from_pixels(width, height, pixels)?)
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn image(width: u16, height: u16, data: Vec<u8>) -> ImageBlock {
		ImageBlock {
			x: 0,
			y: 0,
			width: width,
			height: height,
			data: data,
		}
	}

	#[test]
	fn test_indexed() {
		let tex = PSXTexture {
			depth: Depth::BPP4,
			mixed: false,
			palette: Some(PaletteBlock {
				x: 0,
				y: 480,
				width: 16,
				height: 1,
				entries: (0..16).map(|i| if i == 1 { 0x001F } else { 0 }).collect(),
			}),
			image: image(1, 1, vec![0x10, 0x00]),
		};

		let bmp = tim_to_bitmap(&tex).unwrap();
		assert_eq!(bmp.width, 4);
		assert_eq!(bmp.pixels[0], Color::TRANSPARENT);
		assert_eq!(bmp.pixels[1], Color::new(255, 0, 0, 255));

		let no_clut = PSXTexture {
			palette: None,
			..tex
		};
		assert!(matches!(tim_to_bitmap(&no_clut), Err(TIMError::MissingPalette)));
	}

	#[test]
	fn test_direct() {
		let tex = PSXTexture {
			depth: Depth::BPP16,
			mixed: false,
			palette: None,
			image: image(2, 1, vec![0xFF, 0x7F, 0x00, 0x80]),
		};

		let bmp = tim_to_bitmap(&tex).unwrap();
		assert_eq!(bmp.pixels, vec![Color::new(255, 255, 255, 255), Color::new(0, 0, 0, 255)]);

		let tex = PSXTexture {
			depth: Depth::BPP24,
			mixed: false,
			palette: None,
			image: image(3, 1, vec![1, 2, 3, 4, 5, 6]),
		};

		let bmp = tim_to_bitmap(&tex).unwrap();
		assert_eq!(bmp.pixels, vec![Color::new(1, 2, 3, 255), Color::new(4, 5, 6, 255)]);
	}
}
