use clap::Parser;
use env_logger::Env;

mod activity;
mod batch;
mod engine;
mod gateway;
mod modal;
mod sync;
mod tokens;
mod ui;
mod util;

#[derive(Parser, Debug)]
#[command(
    name = "Alts Dashboard",
    author,
    version,
    about = "Desktop dashboard for managing alt accounts, stock and chat against a local backend"
)]
struct Cli {
    /// Base URL of the backend API.
    #[arg(long, default_value = gateway::DEFAULT_BASE_URL)]
    server: String,

    /// Print version and exit without starting the UI.
    #[arg(long)]
    version_only: bool,
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.version_only {
        println!("Alts Dashboard {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_icon(default_icon())
            .with_inner_size(eframe::egui::vec2(1180.0, 760.0)),
        ..Default::default()
    };
    let server = cli.server;
    eframe::run_native(
        "Alts Dashboard",
        options,
        Box::new(move |cc| Ok(Box::new(ui::DashboardApp::new(cc, server)))),
    )
}

fn default_icon() -> eframe::egui::IconData {
    // Simple 2x2 icon: dark background with a teal accent.
    let rgba: Vec<u8> = vec![
        20, 24, 32, 255, 92, 219, 195, 255, //
        20, 24, 32, 255, 63, 140, 125, 255,
    ];
    eframe::egui::IconData {
        rgba,
        width: 2,
        height: 2,
    }
}
