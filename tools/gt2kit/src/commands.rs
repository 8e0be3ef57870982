use anyhow::Context;

use image::ImageFormat;

use std::{
	collections::HashMap,
	fs,
	io::Cursor,
	path::{
		Path,
		PathBuf
	}
};

use tracing::info;

use gt2_archives_gt2::ovl::{
	OverlayArchive,
	overlay_name
};

use gt2_core::texture::Bitmap;

use gt2_textures_playstation::{
	atlas::{
		self,
		AtlasEntry,
		AtlasError,
		config::{
			LayoutConfig,
			Settings
		},
		definitions::language_tables
	},
	read_tim,
	tim::PSXTexture
};

pub const LAYOUT_FILE: &str = "layout.ini";
pub const DEFINITIONS_FILE: &str = "definitions";
pub const DEFINITIONS_JSON_FILE: &str = "definitions.json";
pub const PREVIEW_FILE: &str = "preview.png";

fn load_png(path: &Path) -> anyhow::Result<Bitmap> {
	let img = image::open(path)
		.with_context(|| format!("failed to open {}", path.display()))?
		.to_rgba8();

	Ok(Bitmap::from_rgba_bytes(img.width() as usize, img.height() as usize, img.as_raw())?)
}

fn encode_png(bitmap: &Bitmap) -> anyhow::Result<Vec<u8>> {
	let img = image::RgbaImage::from_raw(bitmap.width as u32, bitmap.height as u32, bitmap.to_rgba_bytes())
		.context("bitmap does not match its dimensions")?;

	let mut out = Cursor::new(vec![]);
	img.write_to(&mut out, ImageFormat::Png)?;
	Ok(out.into_inner())
}

fn save_png(bitmap: &Bitmap, path: &Path) -> anyhow::Result<()> {
	fs::write(path, encode_png(bitmap)?).with_context(|| format!("failed to write {}", path.display()))
}

/// Packs `<dir>/layout.ini` into `<dir>.tim` plus the definitions and preview inside `dir`.
/// Every output is encoded before anything is written, and the TIM goes last.
pub fn pack_atlas(dir: &Path) -> anyhow::Result<()> {
	let layout_path = dir.join(LAYOUT_FILE);
	let config = LayoutConfig::read(&layout_path)
		.with_context(|| format!("failed to read {}", layout_path.display()))?;

	let mut textures = HashMap::new();
	for name in config.files.iter() {
		let path = dir.join(name);
		if !path.is_file() {
			return Err(AtlasError::MissingFile(path.display().to_string()).into());
		}

		textures.insert(name.clone(), load_png(&path)?);
	}

	let assembly = atlas::assemble(&config, &textures)?;
	let tim_path = dir.with_extension("tim");

	let outputs = [
		(dir.join(DEFINITIONS_FILE), AtlasEntry::write_table(&assembly.entries)),
		(dir.join(DEFINITIONS_JSON_FILE), assembly.definitions.pretty(4).into_bytes()),
		(dir.join(PREVIEW_FILE), encode_png(&assembly.preview)?),
		(tim_path.clone(), assembly.tim.to_bytes()),
	];

	for (path, data) in outputs.iter() {
		fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
	}

	info!(path = %tim_path.display(), textures = assembly.entries.len(), "wrote atlas");
	Ok(())
}

/// Splits `<stem>.tim` into `<stem>/tex_N.png`, reading `<stem>/definitions`.
pub fn unpack_atlas(input: &Path) -> anyhow::Result<()> {
	let data = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
	let tim = PSXTexture::read(&data).with_context(|| format!("{} is not a valid TIM", input.display()))?;

	let dir = input.with_extension("");
	let definitions_path = dir.join(DEFINITIONS_FILE);
	let entries = AtlasEntry::read_table(&fs::read(&definitions_path)
		.with_context(|| format!("failed to read {}", definitions_path.display()))?)?;

	let layout_path = dir.join(LAYOUT_FILE);
	let settings = if layout_path.is_file() {
		LayoutConfig::read(&layout_path)?.settings
	} else {
		Settings::from_image(&tim.image)
	};

	let out = atlas::disassemble(&tim, &entries, &settings)?;

	for (name, bitmap) in out.textures.iter() {
		save_png(bitmap, &dir.join(name))?;
	}
	out.config.write(&layout_path)?;

	info!(path = %dir.display(), textures = out.textures.len(), "unpacked atlas");
	Ok(())
}

pub fn convert_tim(input: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
	let bitmap = read_tim(&input.to_string_lossy())
		.with_context(|| format!("failed to convert {}", input.display()))?;
	let output = output.unwrap_or_else(|| input.with_extension("png"));

	save_png(&bitmap, &output)?;

	info!(path = %output.display(), width = bitmap.width, height = bitmap.height, "wrote image");
	Ok(())
}

/// Writes one `<lang>.bin` entry table per language next to `input`
pub fn write_entries(input: &Path) -> anyhow::Result<()> {
	let text = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
	let doc = json::parse(&text).map_err(AtlasError::from)?;
	let dir = input.parent().unwrap_or(Path::new(""));

	for (lang, table) in language_tables(&doc)? {
		let path = dir.join(format!("{}.bin", lang));
		fs::write(&path, &table).with_context(|| format!("failed to write {}", path.display()))?;

		info!(path = %path.display(), entries = table.len() / atlas::record::RECORD_SIZE, "wrote entry table");
	}

	Ok(())
}

/// Writes each overlay to `output`, decompressed or as the stored gzip stream
pub fn unpack_overlays(input: &Path, output: &Path, decompress: bool) -> anyhow::Result<()> {
	let data = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
	let archive = OverlayArchive::read(&data)?;

	fs::create_dir_all(output)?;

	if decompress {
		for (i, overlay) in archive.overlays()?.iter().enumerate() {
			fs::write(output.join(overlay_name(i)), overlay)?;
		}
	} else {
		for (i, blob) in archive.blobs.iter().enumerate() {
			fs::write(output.join(format!("{}.gz", overlay_name(i))), blob)?;
		}
	}

	info!(overlays = archive.blobs.len(), path = %output.display(), "wrote overlays");
	Ok(())
}

pub fn pack_overlays(inputs: &[PathBuf], output: &Path) -> anyhow::Result<()> {
	let mut overlays = Vec::with_capacity(inputs.len());
	for path in inputs.iter() {
		overlays.push(fs::read(path).with_context(|| format!("failed to read {}", path.display()))?);
	}

	let archive = OverlayArchive::new(&overlays)?;
	let mut out = vec![];
	archive.write(&mut out)?;

	fs::write(output, out).with_context(|| format!("failed to write {}", output.display()))?;

	info!(overlays = inputs.len(), path = %output.display(), "wrote overlay archive");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	use gt2_core::texture::Color;

	fn checker(width: usize, height: usize, a: Color, b: Color) -> Bitmap {
		let pixels = (0..(width * height))
			.map(|i| if (i % width + i / width) % 2 == 0 { a } else { b })
			.collect();
		Bitmap::from_pixels(width, height, pixels).unwrap()
	}

	#[test]
	fn test_atlas_round_trip() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("menu");
		fs::create_dir(&dir).unwrap();

		let first = checker(16, 8, Color::new(255, 0, 0, 255), Color::TRANSPARENT);
		let second = checker(24, 24, Color::new(0, 255, 0, 255), Color::new(255, 255, 255, 255));
		save_png(&first, &dir.join("first.png")).unwrap();
		save_png(&second, &dir.join("second.png")).unwrap();

		let mut config = LayoutConfig::default();
		config.add_file("first.png");
		config.add_file("second.png");
		config.write(dir.join(LAYOUT_FILE)).unwrap();

		pack_atlas(&dir).unwrap();

		assert!(tmp.path().join("menu.tim").is_file());
		assert_eq!(fs::read(dir.join(DEFINITIONS_FILE)).unwrap().len(), 24);
		assert!(dir.join(DEFINITIONS_JSON_FILE).is_file());
		assert!(dir.join(PREVIEW_FILE).is_file());

		unpack_atlas(&tmp.path().join("menu.tim")).unwrap();

		assert_eq!(load_png(&dir.join("tex_1.png")).unwrap(), first);
		assert_eq!(load_png(&dir.join("tex_2.png")).unwrap(), second);

		let config = LayoutConfig::read(dir.join(LAYOUT_FILE)).unwrap();
		assert_eq!(config.files, vec!["tex_1.png".to_string(), "tex_2.png".to_string()]);
	}

	#[test]
	fn test_missing_texture() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("menu");
		fs::create_dir(&dir).unwrap();
		fs::write(dir.join(LAYOUT_FILE), "[Files]\nabsent.png\n").unwrap();

		let err = pack_atlas(&dir).unwrap_err();
		assert!(matches!(err.downcast_ref::<AtlasError>(), Some(AtlasError::MissingFile(_))));
		assert!(!tmp.path().join("menu.tim").exists());
	}

	#[test]
	fn test_no_partial_atlas() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("menu");
		fs::create_dir(&dir).unwrap();

		save_png(&checker(8, 8, Color::new(255, 0, 0, 255), Color::TRANSPARENT), &dir.join("a.png")).unwrap();
		fs::write(dir.join(LAYOUT_FILE), "[Files]\na.png\n").unwrap();
		// a directory where the preview should go makes that write fail
		fs::create_dir(dir.join(PREVIEW_FILE)).unwrap();

		assert!(pack_atlas(&dir).is_err());
		assert!(!tmp.path().join("menu.tim").exists());
	}

	#[test]
	fn test_overlays() {
		let tmp = tempfile::tempdir().unwrap();
		let inputs: Vec<PathBuf> = (0..2).map(|i| tmp.path().join(format!("in_{}.exe", i))).collect();
		fs::write(&inputs[0], b"first").unwrap();
		fs::write(&inputs[1], vec![7; 300]).unwrap();

		let archive = tmp.path().join("GT2.OVL");
		pack_overlays(&inputs, &archive).unwrap();

		let out = tmp.path().join("out");
		unpack_overlays(&archive, &out, true).unwrap();
		assert_eq!(fs::read(out.join("gt2_01.exe")).unwrap(), b"first");
		assert_eq!(fs::read(out.join("gt2_02.exe")).unwrap(), vec![7; 300]);

		unpack_overlays(&archive, &out, false).unwrap();
		assert!(out.join("gt2_02.exe.gz").is_file());
	}

	#[test]
	fn test_entries() {
		let tmp = tempfile::tempdir().unwrap();
		let input = tmp.path().join("entries.json");
		fs::write(&input, r#"{
			"textures": { "a.png": { "x": 1, "y": 2, "palette": 3, "width": 4, "height": 5, "texture_page": 12 } },
			"entries": { "en": ["a.png", "a.png"] }
		}"#).unwrap();

		write_entries(&input).unwrap();
		assert_eq!(fs::read(tmp.path().join("en.bin")).unwrap().len(), 24);
	}
}
