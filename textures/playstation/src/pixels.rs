//! 4-bit pixel plane packing.
//!
//! The PlayStation stores the leftmost of two 4-bit pixels in the low nibble,
//! the reverse of natural reading order.

/// Swaps the high and low nibble of every byte
pub fn swap_nibbles(data: &[u8]) -> Vec<u8> {
	data.iter().map(|b| b << 4 | b >> 4).collect()
}

/// Expands packed 4-bit pixels into one index per byte
pub fn unpack_4bpp(data: &[u8]) -> Vec<u8> {
	swap_nibbles(data).iter()
		.flat_map(|b| [b >> 4, b & 0xF])
		.collect()
}

/// Packs one index per byte into 4-bit pixels. An odd trailing pixel is paired with index 0.
pub fn pack_4bpp(indices: &[u8]) -> Vec<u8> {
	let natural: Vec<u8> = indices.chunks(2)
		.map(|p| (p[0] & 0xF) << 4 | p.get(1).map_or(0, |i| i & 0xF))
		.collect();

	swap_nibbles(&natural)
}
