use bitflags::bitflags;

use byteorder::{
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use std::io;
use thiserror::Error;
use tracing::debug;

use gt2_core::texture::TextureError;

pub const MAGIC: u8 = 0x10;
pub const VERSION: u8 = 0;

/// Size of a block's sub-header, which its `size` field includes
pub const SUB_HEADER_SIZE: u32 = 12;
const HEADER_SIZE: usize = 8;

bitflags! {
	pub struct Flags: u32 {
		const DEPTH = 0b0011;
		const MIXED = 0b0100;
		const CLUT = 0b1000;
	}
}

#[derive(Debug, Error)]
pub enum TIMError {
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Not a PlayStation texture: {0:#04x}")]
	Magic(u8),
	#[error("Unknown TIM file version {0}!")]
	Version(u8),
	#[error("Unsupported TIM flags: {0:#x}")]
	Flags(u32),
	#[error("Invalid block size: {0}")]
	BlockSize(u32),
	#[error("Block declares {declared} bytes but only {available} remain")]
	Truncated {
		declared: usize,
		available: usize,
	},
	#[error("Indexed TIM has no CLUT")]
	MissingPalette,
	#[error("Pixel data does not match the image size")]
	Texture(#[from] TextureError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Depth {
	BPP4 = 0,
	BPP8,
	BPP16,
	BPP24,
}

impl Depth {
	fn from_flags(flags: Flags) -> Depth {
		match (flags & Flags::DEPTH).bits() {
			0 => Depth::BPP4,
			1 => Depth::BPP8,
			2 => Depth::BPP16,
			_ => Depth::BPP24,
		}
	}

	/// Converts a width in 16-bit VRAM units into pixels
	pub fn pixel_width(self, units: u16) -> usize {
		match self {
			Depth::BPP4 => units as usize * 4,
			Depth::BPP8 => units as usize * 2,
			Depth::BPP16 => units as usize,
			Depth::BPP24 => units as usize * 2 / 3,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
	pub magic: u8,
	pub version: u8,
	pub flags: Flags,
}

impl Header {
	#[cfg(feature = "import")]
	fn read(buf: &mut &[u8]) -> Result<Header, TIMError> {
		check_remaining(buf, HEADER_SIZE)?;

		let magic = buf.read_u8()?;
		if magic != MAGIC {
			return Err(TIMError::Magic(magic));
		}

		let version = buf.read_u8()?;
		if version != VERSION {
			return Err(TIMError::Version(version));
		}

		let _reserved = buf.read_u16::<LE>()?;
		let bits = buf.read_u32::<LE>()?;

		Ok(Header {
			magic: magic,
			version: version,
			flags: Flags::from_bits(bits).ok_or(TIMError::Flags(bits))?,
		})
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		buf.write_u8(self.magic)?;
		buf.write_u8(self.version)?;
		buf.write_u16::<LE>(0)?;
		buf.write_u32::<LE>(self.flags.bits())
	}
}

/// Length-prefixed header shared by the CLUT and image blocks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubHeader {
	pub size: u32,
	pub x: u16,
	pub y: u16,
	pub width: u16,
	pub height: u16,
}

impl SubHeader {
	#[cfg(feature = "import")]
	fn read(buf: &mut &[u8]) -> Result<SubHeader, TIMError> {
		check_remaining(buf, SUB_HEADER_SIZE as usize)?;

		Ok(SubHeader {
			size: buf.read_u32::<LE>()?,
			x: buf.read_u16::<LE>()?,
			y: buf.read_u16::<LE>()?,
			width: buf.read_u16::<LE>()?,
			height: buf.read_u16::<LE>()?,
		})
	}

	/// Reads the sub-header and the payload it declares
	#[cfg(feature = "import")]
	fn read_block<'a>(buf: &mut &'a [u8]) -> Result<(SubHeader, &'a [u8]), TIMError> {
		let header = SubHeader::read(buf)?;
		if header.size < SUB_HEADER_SIZE {
			return Err(TIMError::BlockSize(header.size));
		}

		let length = (header.size - SUB_HEADER_SIZE) as usize;
		check_remaining(buf, length)?;

		let remaining: &'a [u8] = *buf;
		let (payload, rest) = remaining.split_at(length);
		*buf = rest;

		Ok((header, payload))
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		buf.write_u32::<LE>(self.size)?;
		buf.write_u16::<LE>(self.x)?;
		buf.write_u16::<LE>(self.y)?;
		buf.write_u16::<LE>(self.width)?;
		buf.write_u16::<LE>(self.height)
	}
}

#[cfg(feature = "import")]
fn check_remaining(buf: &[u8], declared: usize) -> Result<(), TIMError> {
	if declared > buf.len() {
		return Err(TIMError::Truncated {
			declared: declared,
			available: buf.len(),
		});
	}

	Ok(())
}

/// CLUT block: 15-bit colors laid out as a VRAM rectangle
#[derive(Clone, Debug, PartialEq)]
pub struct PaletteBlock {
	pub x: u16,
	pub y: u16,
	pub width: u16,
	pub height: u16,
	pub entries: Vec<u16>,
}

impl PaletteBlock {
	#[cfg(feature = "import")]
	fn read(buf: &mut &[u8]) -> Result<PaletteBlock, TIMError> {
		let (header, mut payload) = SubHeader::read_block(buf)?;
		if payload.len() % 2 != 0 {
			return Err(TIMError::BlockSize(header.size));
		}

		let mut entries = Vec::with_capacity(payload.len() / 2);
		for _ in 0..(payload.len() / 2) {
			entries.push(payload.read_u16::<LE>()?);
		}

		Ok(PaletteBlock {
			x: header.x,
			y: header.y,
			width: header.width,
			height: header.height,
			entries: entries,
		})
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		SubHeader {
			size: SUB_HEADER_SIZE + (self.entries.len() * 2) as u32,
			x: self.x,
			y: self.y,
			width: self.width,
			height: self.height,
		}.write(buf)?;

		for c in self.entries.iter() {
			buf.write_u16::<LE>(*c)?;
		}

		Ok(())
	}
}

/// Image block. `width` is in 16-bit VRAM units, not pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
	pub x: u16,
	pub y: u16,
	pub width: u16,
	pub height: u16,
	pub data: Vec<u8>,
}

impl ImageBlock {
	#[cfg(feature = "import")]
	fn read(buf: &mut &[u8]) -> Result<ImageBlock, TIMError> {
		let (header, payload) = SubHeader::read_block(buf)?;

		Ok(ImageBlock {
			x: header.x,
			y: header.y,
			width: header.width,
			height: header.height,
			data: payload.to_vec(),
		})
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		SubHeader {
			size: SUB_HEADER_SIZE + self.data.len() as u32,
			x: self.x,
			y: self.y,
			width: self.width,
			height: self.height,
		}.write(buf)?;

		buf.write_all(&self.data)
	}

	/// Bytes per row of pixel data
	pub fn stride(&self) -> usize {
		self.width as usize * 2
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct PSXTexture {
	pub depth: Depth,
	pub mixed: bool,
	pub palette: Option<PaletteBlock>,
	pub image: ImageBlock,
}

impl PSXTexture {
	/// Parses a whole TIM container. Trailing bytes after the image block are ignored.
	#[cfg(feature = "import")]
	pub fn read(input: &[u8]) -> Result<PSXTexture, TIMError> {
		let mut buf = input;
		let header = Header::read(&mut buf)?;

		let palette = if header.flags.contains(Flags::CLUT) {
			Some(PaletteBlock::read(&mut buf)?)
		} else {
			None
		};

		let image = ImageBlock::read(&mut buf)?;
		let depth = Depth::from_flags(header.flags);

		debug!(?depth, x = image.x, y = image.y, width = image.width, height = image.height,
			clut = palette.is_some(), "read TIM");

		Ok(PSXTexture {
			depth: depth,
			mixed: header.flags.contains(Flags::MIXED),
			palette: palette,
			image: image,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		self.header().write(buf)?;

		if let Some(ref palette) = self.palette {
			palette.write(buf)?;
		}

		self.image.write(buf)
	}

	#[cfg(feature = "export")]
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = vec![];
		// writes into a Vec cannot fail
		let _ = self.write(&mut out);
		out
	}

	pub fn header(&self) -> Header {
		let mut flags = Flags::from_bits_truncate(self.depth as u32);
		flags.set(Flags::MIXED, self.mixed);
		flags.set(Flags::CLUT, self.palette.is_some());

		Header {
			magic: MAGIC,
			version: VERSION,
			flags: flags,
		}
	}
}
