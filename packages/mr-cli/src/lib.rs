use std::path::PathBuf;

use clap::{
	Args,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};

use mr_config::Config;

/// `--version` output: the crate version followed by the git revision and build target.
pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	" (",
	env!("VERGEN_GIT_SHA"),
	" ",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
	")",
);

/// The `-c FILE` flag shared by every binary that reads a client config.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
	/// Client config in TOML.
	#[arg(long = "config", short = 'c', value_name = "FILE")]
	pub path: PathBuf,
}
impl ConfigArgs {
	pub fn load(&self) -> mr_config::Result<Config> {
		mr_config::load(&self.path)
	}
}

/// Help colours. Errors stand out from the rest of the output.
pub fn styles() -> Styles {
	let accent = AnsiColor::Cyan.on_default() | Effects::BOLD;

	Styles::styled()
		.header(accent)
		.usage(accent)
		.literal(AnsiColor::BrightWhite.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default() | Effects::ITALIC)
		.valid(AnsiColor::Green.on_default())
		.invalid(AnsiColor::Magenta.on_default() | Effects::BOLD)
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
}
