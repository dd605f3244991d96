use anyhow::{Context, Result};
use tabshell::app::App;
use tabshell::cli;
use tabshell::scenario::Scenario;
use tabshell_config::Config;

fn main() -> Result<()> {
    // Process CLI arguments first (before logging init for cleaner output)
    let options = match cli::process_cli() {
        cli::CliResult::Exit(code) => {
            if code == 0 {
                return Ok(());
            }
            std::process::exit(code);
        }
        cli::CliResult::Continue(options) => options,
    };
    // Route all log::info!() etc. to the debug log file. CLI --log-level
    // takes precedence, then RUST_LOG, then the config file (applied below).
    tabshell::debug::init_log_bridge(options.log_level);

    log::info!("Starting tabshell {}", tabshell::VERSION);

    let config = match &options.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    tabshell::debug::set_log_level(config.log_level.to_level_filter());

    let scenario = Scenario::load(&options.scenario)?;
    let mut app = App::new(config, scenario)?;

    let summary = if options.fast {
        app.run_virtual()
    } else {
        // The lifecycle controller is single-threaded; a current-thread
        // runtime only supplies the timer.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("Failed to create runtime")?;
        runtime.block_on(app.run_realtime())
    };

    log::info!("Scenario finished, terminated={}", summary.terminated);
    println!("{summary}");
    Ok(())
}
