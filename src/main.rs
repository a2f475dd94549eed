mod app;
mod core;
mod events;
mod models;
mod ui;
mod utils;

#[cfg(test)]
mod test_support;

use eframe::NativeOptions;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    // Setup file-based logging
    let file_appender = tracing_appender::rolling::never(".", "hrooms.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hrooms=info")),
        )
        .with_writer(non_blocking)
        .init();

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create Tokio runtime: {}", e);
            return Err(eframe::Error::AppCreation(Box::new(e)));
        }
    };
    let _enter = runtime.enter();

    let native_options = NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([960.0, 680.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };
    eframe::run_native(
        "HROOMS",
        native_options,
        Box::new(|cc| Ok(Box::new(ui::app_layout::App::new(cc)))),
    )
}
