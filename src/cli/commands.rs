use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::error::RegistrationError;
use crate::logging::{init_logging_with_config, LogConfig, LogFormat};
use crate::runtime_config::RuntimeConfig;

#[derive(Parser, Debug)]
#[command(name = "minima")]
#[command(about = "Minimal layer-matching HTTP dispatcher", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "MINIMA_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: String,

    /// Base log level (trace, debug, info, warn, error); overrides MINIMA_LOG_LEVEL
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output format (json, pretty); overrides MINIMA_LOG_FORMAT
    #[arg(long)]
    pub log_format: Option<String>,

    /// Print the demo layers and exit
    #[arg(long, default_value_t = false)]
    pub routes: bool,
}

/// Register the demo layers on `app`.
///
/// # Errors
///
/// Propagates pattern compilation failures.
pub fn build_demo_app(app: &mut Dispatcher) -> Result<(), RegistrationError> {
    app.use_fn(|req, res, next| {
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            "Hello from middleware"
        );
        res.set_header("x-powered-by", "minima");
        next.advance();
        Ok(())
    });
    app.get("/hello/:id", |req, res, _next| {
        res.end(format!("Hello {}", req.params.get("id").unwrap_or_default()));
        Ok(())
    })?
    .get("/bye/:id", |req, res, _next| {
        res.end(format!("Bye {}", req.params.get("id").unwrap_or_default()));
        Ok(())
    })?;
    Ok(())
}

/// Run the `minima` binary.
///
/// # Errors
///
/// Returns an error if logging cannot be initialized, the demo app fails to register, or
/// the server cannot bind or exits abnormally.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let mut log_config = LogConfig::from_env();
    if let Some(level) = cli.log_level {
        log_config.log_level = level;
    }
    if let Some(format) = cli.log_format.as_deref() {
        log_config.format = LogFormat::parse(format);
    }
    init_logging_with_config(&log_config)?;

    let runtime = RuntimeConfig::from_env();
    may::config().set_stack_size(runtime.stack_size);

    let mut app = Dispatcher::new();
    build_demo_app(&mut app).context("Failed to register demo layers")?;

    if cli.routes {
        for (index, layer) in app.layers().iter().enumerate() {
            println!("{index:>3}  {layer}");
        }
        return Ok(());
    }

    info!(
        addr = %cli.addr,
        stack_size = runtime.stack_size,
        layers = app.layers().len(),
        "Starting minima"
    );
    let server = app
        .listen(cli.addr.as_str())
        .with_context(|| format!("Failed to start server on {}", cli.addr))?;
    server.wait_ready().context("Server did not become ready")?;
    info!(addr = %server.addr(), "Server ready");
    server
        .join()
        .map_err(|_| anyhow::anyhow!("Server coroutine panicked"))?;
    Ok(())
}
