mod commands;

use clap::{
	ArgAction,
	Parser,
	Subcommand,
	error::ErrorKind
};

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
	name = "gt2kit",
	about = "Gran Turismo 2 texture atlas, TIM and overlay tools",
	version
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
	/// Increase verbosity (-v, -vv)
	#[arg(short, long, action = ArgAction::Count, global = true)]
	verbose: u8,
	/// Only report errors (overrides verbose)
	#[arg(short, long, default_value_t = false, global = true)]
	quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Build or split 4-bit texture atlases
	#[command(subcommand)]
	Atlas(AtlasCommand),
	/// Plain TIM images
	#[command(subcommand)]
	Tim(TimCommand),
	/// Generate per-language entry tables from a definitions JSON file
	Entries {
		/// JSON file with "textures" and "entries" objects
		input: PathBuf,
	},
	/// GT2.OVL overlay archives
	#[command(subcommand)]
	Ovl(OvlCommand),
}

#[derive(Subcommand, Debug)]
enum AtlasCommand {
	/// Pack the textures listed in <DIR>/layout.ini into <DIR>.tim
	Pack {
		dir: PathBuf,
	},
	/// Split an atlas into textures using the definitions next to it
	Unpack {
		input: PathBuf,
	},
}

#[derive(Subcommand, Debug)]
enum TimCommand {
	/// Convert a TIM image to PNG
	Convert {
		input: PathBuf,
		/// Defaults to the input path with a .png extension
		#[arg(short, long)]
		output: Option<PathBuf>,
	},
}

#[derive(Subcommand, Debug)]
enum OvlCommand {
	/// Decompress every overlay
	Unpack {
		input: PathBuf,
		#[arg(short, long, default_value = ".")]
		output: PathBuf,
	},
	/// Write every overlay without decompressing it
	Extract {
		input: PathBuf,
		#[arg(short, long, default_value = ".")]
		output: PathBuf,
	},
	/// Compress executables, in the order given, into an overlay archive
	Pack {
		#[arg(required = true)]
		inputs: Vec<PathBuf>,
		#[arg(short, long, default_value = "GT2.OVL")]
		output: PathBuf,
	},
}

/// Running with nothing to do is not an error
fn is_missing_arguments(kind: ErrorKind) -> bool {
	matches!(kind,
		ErrorKind::MissingRequiredArgument |
		ErrorKind::MissingSubcommand |
		ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand)
}

fn main() -> anyhow::Result<()> {
	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(e) if is_missing_arguments(e.kind()) => return Ok(()),
		Err(e) => e.exit(),
	};

	init_tracing_with_level(cli.quiet, cli.verbose);

	match cli.command {
		Commands::Atlas(AtlasCommand::Pack { dir }) => commands::pack_atlas(&dir),
		Commands::Atlas(AtlasCommand::Unpack { input }) => commands::unpack_atlas(&input),
		Commands::Tim(TimCommand::Convert { input, output }) => commands::convert_tim(&input, output),
		Commands::Entries { input } => commands::write_entries(&input),
		Commands::Ovl(OvlCommand::Unpack { input, output }) => commands::unpack_overlays(&input, &output, true),
		Commands::Ovl(OvlCommand::Extract { input, output }) => commands::unpack_overlays(&input, &output, false),
		Commands::Ovl(OvlCommand::Pack { inputs, output }) => commands::pack_overlays(&inputs, &output),
	}
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
	let level = if quiet {
		"error"
	} else {
		match verbose {
			0 => "info",
			1 => "debug",
			_ => "trace",
		}
	};

	let _ = tracing_subscriber::fmt()
		.with_env_filter(level)
		.with_target(false)
		.try_init();
}
