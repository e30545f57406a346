use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = plateful_api::Args::parse();
	plateful_api::run(args).await
}
