use byteorder::{
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use std::io;

use super::AtlasError;

/// Size of one on-disk atlas entry
pub const RECORD_SIZE: usize = 12;

/// One texture's placement in the atlas, as read by the game at runtime.
/// `x` and `y` are relative to `texture_page`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AtlasEntry {
	pub x: u8,
	pub y: u8,
	pub palette: u16,
	pub width: u16,
	pub height: u16,
	pub texture_page: u16,
	reserved: u16, // always 0
}

impl AtlasEntry {
	pub fn new(x: u8, y: u8, palette: u16, width: u16, height: u16, texture_page: u16) -> AtlasEntry {
		AtlasEntry {
			x: x,
			y: y,
			palette: palette,
			width: width,
			height: height,
			texture_page: texture_page,
			reserved: 0,
		}
	}

	#[cfg(feature = "import")]
	fn read<R>(buf: &mut R) -> io::Result<AtlasEntry>
	where
		R: ReadBytesExt,
	{
		Ok(AtlasEntry {
			x: buf.read_u8()?,
			y: buf.read_u8()?,
			palette: buf.read_u16::<LE>()?,
			width: buf.read_u16::<LE>()?,
			height: buf.read_u16::<LE>()?,
			texture_page: buf.read_u16::<LE>()?,
			reserved: buf.read_u16::<LE>()?,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		buf.write_u8(self.x)?;
		buf.write_u8(self.y)?;
		buf.write_u16::<LE>(self.palette)?;
		buf.write_u16::<LE>(self.width)?;
		buf.write_u16::<LE>(self.height)?;
		buf.write_u16::<LE>(self.texture_page)?;
		buf.write_u16::<LE>(self.reserved)
	}

	/// Reads a `definitions` table. Its length must be a whole number of entries.
	#[cfg(feature = "import")]
	pub fn read_table(data: &[u8]) -> Result<Vec<AtlasEntry>, AtlasError> {
		if data.len() % RECORD_SIZE != 0 {
			return Err(AtlasError::TableSize(data.len()));
		}

		let mut buf = data;
		let mut entries = Vec::with_capacity(data.len() / RECORD_SIZE);
		while !buf.is_empty() {
			entries.push(AtlasEntry::read(&mut buf)?);
		}

		Ok(entries)
	}

	#[cfg(feature = "export")]
	pub fn write_table(entries: &[AtlasEntry]) -> Vec<u8> {
		let mut out = Vec::with_capacity(entries.len() * RECORD_SIZE);
		for e in entries.iter() {
			// writes into a Vec cannot fail
			let _ = e.write(&mut out);
		}

		out
	}
}
