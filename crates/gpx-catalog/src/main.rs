// The binary uses the library, not duplicate modules
use gpx_catalog::{GpxCatalogApp, Settings, setup_logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    setup_logging();
    let settings = Settings::from_cli();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!("Failed to start the async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async {
        match GpxCatalogApp::run(settings).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!("{err}");
                ExitCode::FAILURE
            }
        }
    })
}
