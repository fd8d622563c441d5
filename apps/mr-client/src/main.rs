use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = mr_client::Args::parse();

	mr_client::run(args).await
}
