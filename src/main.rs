// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;

use expense_dashboard::auth::{AuthProvider, LocalAuthProvider};
use expense_dashboard::config::{Backend, Config};
use expense_dashboard::dashboard::Dashboard;
use expense_dashboard::export::export_month_to_path;
use expense_dashboard::month::YearMonth;
use expense_dashboard::store::{ChangeFeed, ExpenseBackend, LocalStore, RemoteStore, RemoteTable};
use expense_dashboard::telemetry;

fn main() -> Result<()> {
    let config = Config::from_env().context("reading configuration")?;
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 && args[1] == "export" {
        telemetry::init_stderr();
        run_export(&config, &args[2..])?;
    } else {
        // UI mode (default)
        telemetry::init_file(&config.log_file()).context("opening log file")?;
        run_ui_mode(&config)?;
    }

    Ok(())
}

/// Backend for the configured variant; remote starts with the stored session
fn open_backend(config: &Config) -> Result<Box<dyn ExpenseBackend>> {
    let backend: Box<dyn ExpenseBackend> = match config.backend {
        Backend::Local => Box::new(
            LocalStore::open(&config.local_db())
                .with_context(|| format!("opening {}", config.local_db().display()))?,
        ),
        Backend::Remote => {
            let table = RemoteTable::open(&config.remote_db, ChangeFeed::new())
                .with_context(|| format!("opening {}", config.remote_db.display()))?;
            let session = LocalAuthProvider::open(&config.remote_db)?.current_session()?;
            Box::new(RemoteStore::new(table, session))
        }
    };
    Ok(backend)
}

fn run_export(config: &Config, args: &[String]) -> Result<()> {
    let (month, path) = match args {
        [month, path] => (month, path),
        _ => bail!("usage: expense-dashboard export YYYY-MM <output.csv>"),
    };
    let month: YearMonth = month.parse()?;

    let mut dashboard = Dashboard::new(open_backend(config)?);
    dashboard.load()?;

    let written = export_month_to_path(Path::new(path), dashboard.expenses(), month)?;
    println!("✓ Exported {} expenses for {} to {}", written, month, path);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    use expense_dashboard::auth::AuthGate;

    tracing::info!(backend = %config.backend, data_dir = %config.data_dir.display(), "starting dashboard");

    let dashboard = Dashboard::new(open_backend(config)?);
    let mut app = ui::App::new(dashboard).with_export_dir(config.data_dir.join("exports"));

    if config.backend == Backend::Remote {
        let provider = LocalAuthProvider::open(&config.remote_db)?;
        app = app.with_gate(AuthGate::new(Box::new(provider)));
    }

    app.start();
    ui::run_ui(&mut app)?;

    println!("\n✅ Dashboard closed");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin expense-server --features server");
    std::process::exit(1);
}
