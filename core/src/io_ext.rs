use std::io::{
	Read,
	Result,
	Write
};

pub trait ReadBinExt: Read {
	/// Reads a null-terminated string. Invalid UTF-8 is replaced rather than rejected.
	#[inline]
	fn read_cstr(&mut self) -> Result<String> {
		let mut s = vec![];
		let mut buf = [1; 1];

		while buf[0] != 0 {
			self.read_exact(&mut buf)?;
			if buf[0] != 0 {
				s.push(buf[0]);
			}
		}

		Ok(String::from_utf8_lossy(&s).into_owned())
	}
}

impl<R> ReadBinExt for R
where
	R: Read + ?Sized,
{
}

pub trait WriteBinExt: Write {
	/// Writes a string followed by a null terminator
	#[inline]
	fn write_cstr(&mut self, s: &str) -> Result<()> {
		self.write_all(s.as_bytes())?;
		self.write_all(&[0])
	}
}

impl<W> WriteBinExt for W
where
	W: Write + ?Sized,
{
}
