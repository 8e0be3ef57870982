#[cfg(feature = "io_ext")]
pub mod io_ext;

#[cfg(feature = "nom_ext")]
pub mod nom_ext;

pub mod texture;

/// Scales a 5 bit value to 8 bits
///
/// Uses the same affine widening as the PlayStation GPU, so `31` maps to `255` and `0` to `0`.
pub const fn scale5to8(b: u8) -> u8 {
	(((b as u32 & 31) * 527 + 23) >> 6) as u8
}

/// Scales an 8 bit value to 5 bits
pub const fn scale8to5(b: u8) -> u8 {
	((b as u32 * 249 + 1014) >> 11) as u8
}
