//! Random access to a PS-X EXE image by virtual address.
//!
//! The image is held in memory; writes land in the buffer and are persisted with [`PSXExecutable::save`].

use byteorder::{
	ByteOrder,
	LE
};

use std::{
	fs,
	io,
	ops::Range,
	path::Path
};

use thiserror::Error;

use gt2_core::io_ext::{
	ReadBinExt,
	WriteBinExt
};

pub const MAGIC: &[u8; 8] = b"PS-X EXE";

/// The header occupies the first 2 KiB and is not loaded into memory
pub const HEADER_SIZE: u32 = 0x800;

const LOAD_ADDRESS_OFFSET: usize = 0x18;
const TEXT_SIZE_OFFSET: usize = 0x1C;

#[derive(Debug, Error)]
pub enum ExecutableError {
	#[error("I/O error")]
	IO {
		#[from]
		source: io::Error,
	},
	#[error("Not a PlayStation executable")]
	Magic,
	#[error("Text section of {text_size} bytes does not fit in a {file_size} byte file")]
	Size {
		text_size: u32,
		file_size: usize,
	},
	#[error("{length} bytes at {vaddr:#010x} are outside the image")]
	OutOfBounds {
		vaddr: u32,
		length: usize,
	},
}

type Result<T> = std::result::Result<T, ExecutableError>;

/// Sign extends the low `bits` bits of `value`
fn sign_extend(value: u32, bits: u32) -> i32 {
	let shift = 32 - bits;
	((value << shift) as i32) >> shift
}

#[derive(Clone, Debug, PartialEq)]
pub struct PSXExecutable {
	data: Vec<u8>,
	/// Virtual address of the first byte of `data`
	pub base_address: u32,
}

impl PSXExecutable {
	/// Validates the header and derives the base address from the load address
	pub fn from_bytes(data: Vec<u8>) -> Result<PSXExecutable> {
		if data.len() < HEADER_SIZE as usize || &data[..MAGIC.len()] != MAGIC {
			return Err(ExecutableError::Magic);
		}

		let text_size = LE::read_u32(&data[TEXT_SIZE_OFFSET..]);
		if text_size as u64 + HEADER_SIZE as u64 > data.len() as u64 {
			return Err(ExecutableError::Size {
				text_size: text_size,
				file_size: data.len(),
			});
		}

		let load_address = LE::read_u32(&data[LOAD_ADDRESS_OFFSET..]);

		Ok(PSXExecutable {
			data: data,
			base_address: load_address.wrapping_sub(HEADER_SIZE),
		})
	}

	/// Wraps a raw memory image (e.g. an overlay) loaded at `base_address`
	pub fn headless(data: Vec<u8>, base_address: u32) -> PSXExecutable {
		PSXExecutable {
			data: data,
			base_address: base_address,
		}
	}

	pub fn open<P>(path: P) -> Result<PSXExecutable>
	where
		P: AsRef<Path>,
	{
		PSXExecutable::from_bytes(fs::read(path)?)
	}

	pub fn open_headless<P>(path: P, base_address: u32) -> Result<PSXExecutable>
	where
		P: AsRef<Path>,
	{
		Ok(PSXExecutable::headless(fs::read(path)?, base_address))
	}

	pub fn save<P>(&self, path: P) -> io::Result<()>
	where
		P: AsRef<Path>,
	{
		fs::write(path, &self.data)
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	/// File offset of a virtual address
	pub fn addr(&self, vaddr: u32) -> Option<usize> {
		vaddr.checked_sub(self.base_address).map(|a| a as usize)
	}

	/// Virtual address of a file offset
	pub fn vaddr(&self, addr: usize) -> u32 {
		self.base_address.wrapping_add(addr as u32)
	}

	fn range(&self, vaddr: u32, length: usize) -> Result<Range<usize>> {
		self.addr(vaddr)
			.filter(|a| a + length <= self.data.len())
			.map(|a| a..(a + length))
			.ok_or(ExecutableError::OutOfBounds {
				vaddr: vaddr,
				length: length,
			})
	}

	pub fn read_i16(&self, vaddr: u32) -> Result<i16> {
		Ok(LE::read_i16(&self.data[self.range(vaddr, 2)?]))
	}

	pub fn read_u16(&self, vaddr: u32) -> Result<u16> {
		Ok(LE::read_u16(&self.data[self.range(vaddr, 2)?]))
	}

	pub fn read_u32(&self, vaddr: u32) -> Result<u32> {
		Ok(LE::read_u32(&self.data[self.range(vaddr, 4)?]))
	}

	pub fn read_address(&self, vaddr: u32) -> Result<u32> {
		self.read_u32(vaddr)
	}

	/// Reads a null-terminated string
	pub fn read_string(&self, vaddr: u32) -> Result<String> {
		let start = self.range(vaddr, 0)?.start;
		Ok((&self.data[start..]).read_cstr()?)
	}

	/// Resolves a pointer split across a `lui` / `addiu` style pair of halfwords
	pub fn read_indirect_ptr(&self, high: u32, low: u32) -> Result<u32> {
		let hi = self.read_u16(high)? as u32;
		let lo = self.read_i16(low)? as i32;
		Ok((hi << 16).wrapping_add(lo as u32))
	}

	pub fn write_i16(&mut self, vaddr: u32, value: i16) -> Result<()> {
		let r = self.range(vaddr, 2)?;
		LE::write_i16(&mut self.data[r], value);
		Ok(())
	}

	pub fn write_u16(&mut self, vaddr: u32, value: u16) -> Result<()> {
		let r = self.range(vaddr, 2)?;
		LE::write_u16(&mut self.data[r], value);
		Ok(())
	}

	pub fn write_u32(&mut self, vaddr: u32, value: u32) -> Result<()> {
		let r = self.range(vaddr, 4)?;
		LE::write_u32(&mut self.data[r], value);
		Ok(())
	}

	pub fn write_address(&mut self, vaddr: u32, value: u32) -> Result<()> {
		self.write_u32(vaddr, value)
	}

	/// Writes a string and its null terminator
	pub fn write_string(&mut self, vaddr: u32, s: &str) -> Result<()> {
		let r = self.range(vaddr, s.len() + 1)?;
		let mut dst = &mut self.data[r];
		dst.write_cstr(s)?;
		Ok(())
	}

	/// Splits `value` across a `lui` / `addiu` style pair, compensating for the sign extended low half
	pub fn write_indirect_ref(&mut self, high: u32, low: u32, value: u32) -> Result<()> {
		let lo = sign_extend(value & 0xFFFF, 16);
		let hi = (value.wrapping_sub(lo as u32) >> 16) as u16;

		self.write_i16(low, lo as i16)?;
		self.write_u16(high, hi)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const LOAD_ADDRESS: u32 = 0x8001_0000;

	fn sample() -> PSXExecutable {
		let mut data = vec![0; HEADER_SIZE as usize + 0x100];
		data[..8].copy_from_slice(MAGIC);
		LE::write_u32(&mut data[LOAD_ADDRESS_OFFSET..], LOAD_ADDRESS);
		LE::write_u32(&mut data[TEXT_SIZE_OFFSET..], 0x100);
		PSXExecutable::from_bytes(data).unwrap()
	}

	#[test]
	fn test_header() {
		let exe = sample();
		assert_eq!(exe.base_address, LOAD_ADDRESS - HEADER_SIZE);
		assert_eq!(exe.addr(LOAD_ADDRESS), Some(0x800));
		assert_eq!(exe.vaddr(0x800), LOAD_ADDRESS);

		let mut data = exe.data().to_vec();
		LE::write_u32(&mut data[TEXT_SIZE_OFFSET..], 0x101);
		assert!(matches!(PSXExecutable::from_bytes(data), Err(ExecutableError::Size { .. })));
		assert!(matches!(PSXExecutable::from_bytes(vec![0; 0x800]), Err(ExecutableError::Magic)));
	}

	#[test]
	fn test_read_write() {
		let mut exe = sample();

		exe.write_u32(LOAD_ADDRESS, 0xDEADBEEF).unwrap();
		exe.write_i16(LOAD_ADDRESS + 4, -2).unwrap();
		exe.write_string(LOAD_ADDRESS + 8, "GT2").unwrap();

		assert_eq!(exe.read_address(LOAD_ADDRESS).unwrap(), 0xDEADBEEF);
		assert_eq!(exe.read_u16(LOAD_ADDRESS + 4).unwrap(), 0xFFFE);
		assert_eq!(exe.read_i16(LOAD_ADDRESS + 4).unwrap(), -2);
		assert_eq!(exe.read_string(LOAD_ADDRESS + 8).unwrap(), "GT2");
	}

	#[test]
	fn test_indirect() {
		let mut exe = sample();

		exe.write_indirect_ref(LOAD_ADDRESS + 0x10, LOAD_ADDRESS + 0x14, 0x8001_8000).unwrap();
		assert_eq!(exe.read_u16(LOAD_ADDRESS + 0x10).unwrap(), 0x8002);
		assert_eq!(exe.read_i16(LOAD_ADDRESS + 0x14).unwrap(), -0x8000);
		assert_eq!(exe.read_indirect_ptr(LOAD_ADDRESS + 0x10, LOAD_ADDRESS + 0x14).unwrap(), 0x8001_8000);
	}

	#[test]
	fn test_bounds() {
		let mut exe = sample();
		let end = exe.vaddr(exe.data().len());

		assert!(matches!(exe.read_u32(end - 2), Err(ExecutableError::OutOfBounds { .. })));
		assert!(exe.read_u16(exe.base_address - 2).is_err());
		assert!(exe.write_string(end - 3, "GT2").is_err());

		let headless = PSXExecutable::headless(vec![1, 0], 0x8008_0000);
		assert_eq!(headless.read_u16(0x8008_0000).unwrap(), 1);
	}
}
