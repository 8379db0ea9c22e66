use std::process::ExitCode;

use kindling::{ApplicationBuilder, logging};
use kindling_config::{Config, OrthoConfig};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("kindling: failed to load configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    let logging = match logging::initialise(&config) {
        Ok(handle) => handle,
        Err(error) => {
            eprintln!("kindling: {error}");
            return ExitCode::FAILURE;
        }
    };
    let _host = logging.root_span().enter();

    let mut builder = match ApplicationBuilder::from_config(&config) {
        Ok(builder) => builder,
        Err(error) => {
            tracing::error!(
                target: concat!(env!("CARGO_PKG_NAME"), "::main"),
                event = "settings_failed",
                error = %error,
                "failed to load settings"
            );
            return ExitCode::FAILURE;
        }
    };

    let outcome = builder.build();
    builder.diagnostics().replay();
    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
