#![allow(clippy::too_many_arguments)]

mod app;

use app::ColorMagicApp;
use colormagic::assets::AppSettings;
use colormagic::{cli, logger};
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = AppSettings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 960.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("ColorMagic"),
        ..Default::default()
    };

    eframe::run_native(
        "ColorMagic",
        options,
        Box::new(move |cc| Box::new(ColorMagicApp::new(cc, settings))),
    )
}
