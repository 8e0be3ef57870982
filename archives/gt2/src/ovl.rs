//! `GT2.OVL`: the swappable code overlays, each gzip compressed, behind a table of
//! (offset, length) pairs. The first offset doubles as the size of the table.

use byteorder::{
	ByteOrder,
	LE,
	ReadBytesExt,
	WriteBytesExt
};

use flate2::{
	Compression,
	read::GzDecoder,
	write::GzEncoder
};

use std::io::{
	self,
	Read,
	Write
};

use thiserror::Error;
use tracing::debug;

/// Size of one (offset, length) table entry
pub const ENTRY_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum OverlayError {
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Invalid overlay table size: {0}")]
	Header(usize),
	#[error("Overlay {index} ({length} bytes at {offset:#x}) lies outside the archive")]
	Entry {
		index: usize,
		offset: u32,
		length: u32,
	},
}

/// File name of the `index`th (0-based) overlay
pub fn overlay_name(index: usize) -> String {
	format!("gt2_{:02}.exe", index + 1)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entry {
	pub offset: u32,
	pub length: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Header {
	pub entries: Vec<Entry>,
}

impl Header {
	#[cfg(feature = "import")]
	fn read(data: &[u8]) -> Result<Header, OverlayError> {
		if data.len() < ENTRY_SIZE {
			return Err(OverlayError::Header(data.len()));
		}

		let size = LE::read_u32(data) as usize;
		if size == 0 || size % ENTRY_SIZE != 0 || size > data.len() {
			return Err(OverlayError::Header(size));
		}

		let mut buf = &data[..size];
		let mut entries = Vec::with_capacity(size / ENTRY_SIZE);
		while !buf.is_empty() {
			entries.push(Entry {
				offset: buf.read_u32::<LE>()?,
				length: buf.read_u32::<LE>()?,
			});
		}

		Ok(Header {
			entries: entries,
		})
	}

	#[cfg(feature = "export")]
	fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		for e in self.entries.iter() {
			buf.write_u32::<LE>(e.offset)?;
			buf.write_u32::<LE>(e.length)?;
		}

		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayArchive {
	pub header: Header,
	/// Compressed overlays, in table order
	pub blobs: Vec<Vec<u8>>,
}

impl OverlayArchive {
	/// Compresses `overlays` and lays them out back to back after the table
	#[cfg(feature = "export")]
	pub fn new(overlays: &[Vec<u8>]) -> io::Result<OverlayArchive> {
		let mut offset = (overlays.len() * ENTRY_SIZE) as u32;
		let mut entries = vec![];
		let mut blobs = vec![];

		for overlay in overlays.iter() {
			let mut encoder = GzEncoder::new(vec![], Compression::best());
			encoder.write_all(overlay)?;
			let blob = encoder.finish()?;

			entries.push(Entry {
				offset: offset,
				length: blob.len() as u32,
			});

			offset += blob.len() as u32;
			blobs.push(blob);
		}

		Ok(OverlayArchive {
			header: Header {
				entries: entries,
			},
			blobs: blobs,
		})
	}

	#[cfg(feature = "export")]
	pub fn write<W>(&self, buf: &mut W) -> io::Result<()>
	where
		W: WriteBytesExt,
	{
		self.header.write(buf)?;

		for blob in self.blobs.iter() {
			buf.write_all(blob)?;
		}

		Ok(())
	}

	#[cfg(feature = "import")]
	pub fn read(data: &[u8]) -> Result<OverlayArchive, OverlayError> {
		let header = Header::read(data)?;
		let mut blobs = Vec::with_capacity(header.entries.len());

		for (i, e) in header.entries.iter().enumerate() {
			let start = e.offset as usize;
			let blob = data.get(start..(start + e.length as usize)).ok_or(OverlayError::Entry {
				index: i,
				offset: e.offset,
				length: e.length,
			})?;

			blobs.push(blob.to_vec());
		}

		debug!(overlays = blobs.len(), "read overlay table");

		Ok(OverlayArchive {
			header: header,
			blobs: blobs,
		})
	}

	/// Decompresses every overlay
	#[cfg(feature = "import")]
	pub fn overlays(&self) -> io::Result<Vec<Vec<u8>>> {
		let mut out = Vec::with_capacity(self.blobs.len());

		for blob in self.blobs.iter() {
			let mut data = vec![];
			GzDecoder::new(blob.as_slice()).read_to_end(&mut data)?;
			out.push(data);
		}

		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(all(feature = "import", feature = "export"))]
	#[test]
	fn test_round_trip() {
		let overlays = vec![b"first overlay".to_vec(), vec![0x42; 4096], vec![]];
		let archive = OverlayArchive::new(&overlays).unwrap();

		let mut data = vec![];
		archive.write(&mut data).unwrap();
		assert_eq!(LE::read_u32(&data), 24);

		let read = OverlayArchive::read(&data).unwrap();
		assert_eq!(read, archive);
		assert_eq!(read.overlays().unwrap(), overlays);
	}

	#[cfg(feature = "import")]
	#[test]
	fn test_bad_table() {
		assert!(matches!(OverlayArchive::read(&[4, 0, 0, 0, 0, 0, 0, 0]), Err(OverlayError::Header(4))));
		assert!(matches!(OverlayArchive::read(&[16, 0, 0, 0, 0, 0, 0, 0]), Err(OverlayError::Header(16))));
		assert!(matches!(OverlayArchive::read(&[8, 0, 0, 0, 4, 0, 0, 0]), Err(OverlayError::Entry { index: 0, .. })));
	}

	#[test]
	fn test_name() {
		assert_eq!(overlay_name(0), "gt2_01.exe");
		assert_eq!(overlay_name(11), "gt2_12.exe");
	}
}
