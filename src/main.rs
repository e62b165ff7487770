use clap::{Parser, Subcommand};
use image_relay::variants::JobFactory;
use image_relay::{config, output, service};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "image-relay")]
#[command(about = "Queue-driven image variant generation")]
#[command(long_about = "\
Queue-driven image variant generation

Every file under the originals root is expanded into one job per size tier
and output format. Jobs travel through a durable AMQP queue and are turned
into files under the optimized root, mirroring the originals tree:

  originals/                     optimized/
  ├── a.jpg                 →    ├── a.jpg@large.webp
  │                              ├── a.jpg@medium.webp  …
  └── sub/                       └── sub/
      └── b.png             →        └── b.png@large.webp  …

Roles (enable either or both in config.toml):
  publisher  HTTP API: POST /api/optimize/<path>, POST /api/scan
  consumer   takes jobs off the queue, one at a time

Run 'image-relay gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, env = "IMAGE_RELAY_CONFIG", default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the enabled roles until Ctrl-C
    Serve,
    /// Scan the originals root once and publish every missing variant
    Scan,
    /// Show the jobs a scan would produce, without a broker
    Plan {
        /// Only show variants not yet on disk
        #[arg(long)]
        pending: bool,
    },
    /// Validate config.toml and print a summary
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let config = config::load_config(&cli.config)?;
            tracing::info!(
                publisher = config.publisher.enable,
                consumer = config.consumer.enable,
                "starting"
            );
            service::run(config).await?;
        }
        Command::Scan => {
            let config = config::load_config(&cli.config)?;
            let summary = service::scan_once(&config).await?;
            println!("{}", output::format_publish_summary(&summary));
        }
        Command::Plan { pending } => {
            let config = config::load_config(&cli.config)?;
            let factory = JobFactory::from_config(&config);
            let plan = service::plan(&factory)?;
            output::print_plan(&plan, factory.source_root(), factory.output_root(), pending);
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            output::print_config_summary(&config);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
