use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use ecg_lib::generator::{Device, Generator, GeneratorConfig, SyntheticGenerator};
use ecg_session::{FileExporter, Handlers, PlotRenderer, RenderConfig, SessionStore};
use env_logger::Env;
use log::info;
use std::{net::SocketAddr, process, sync::Arc};

mod server;

#[derive(Parser, Debug)]
#[command(
    name = "deepfake-ecg",
    about = "Browser front-end for generating synthetic 8- and 12-lead ECGs"
)]
struct Cli {
    /// Device the generator runs on [default: cuda if available, else cpu]
    #[arg(short, long, value_enum)]
    device: Option<DeviceArg>,
    /// Print version information and exit
    #[arg(short = 'v', long)]
    version: bool,
    /// Address the web server listens on
    #[arg(long, default_value = "127.0.0.1:7860")]
    listen: SocketAddr,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DeviceArg {
    Cpu,
    Cuda,
}

impl From<DeviceArg> for Device {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Cpu => Device::Cpu,
            DeviceArg::Cuda => Device::Cuda,
        }
    }
}

/// Parse the command line. Anything unrecognised prints the usage line and
/// exits with status 1.
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.kind() == ErrorKind::DisplayHelp => err.exit(),
        Err(err) => {
            eprintln!("{err}");
            println!("{}", Cli::command().render_usage());
            process::exit(1);
        }
    }
}

fn version_info(generator: &dyn Generator) -> String {
    format!(
        "deepfake-ecg {}\ngenerator: {}\ncuda available: {}\ndevice: {}",
        env!("CARGO_PKG_VERSION"),
        generator.describe(),
        Device::Cuda.is_available(),
        generator.device()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let device = cli.device.map(Device::from).unwrap_or_else(Device::preferred);
    let generator = Arc::new(SyntheticGenerator::new(&GeneratorConfig {
        device,
        ..GeneratorConfig::default()
    }));
    if cli.version {
        println!("{}", version_info(generator.as_ref()));
        process::exit(1);
    }
    if !device.is_available() {
        log::warn!("device {device} is not available; generation requests will fail");
    }
    info!(
        "Starting deepfake-ecg on {} with {}",
        device,
        generator.describe()
    );

    let store = SessionStore::new(Arc::new(PlotRenderer::new(RenderConfig::default())))
        .context("failed to create scratch root")?;
    let handlers = Handlers::new(Arc::new(store), generator, Arc::new(FileExporter));
    server::serve(cli.listen, server::AppState::new(handlers)).await
}
