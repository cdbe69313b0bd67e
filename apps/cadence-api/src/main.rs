use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = cadence_api::Args::parse();
	cadence_api::run(args).await
}
