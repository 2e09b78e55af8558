//! Chat relay server

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use chrono::DateTime;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use relay_server::args::{Args, Command};
use relay_server::db::{self, Database};
use relay_server::registry::{ConnectionRegistry, RegistryEvent};
use relay_server::{Server, ServerConfig};

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    let database = setup_db(args.database.clone()).await;

    let outcome = match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(&args, database).await,
        command => run_admin(command, &database).await,
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn serve(args: &Args, database: Database) -> Result<(), String> {
    let config = ServerConfig::try_from(args).map_err(|e| e.to_string())?;
    let server = Server::bind(config, database)
        .await
        .map_err(|e| e.to_string())?;

    match server.local_addr() {
        Ok(addr) => tracing::info!(version = env!("CARGO_PKG_VERSION"), %addr, "listening"),
        Err(e) => tracing::warn!(error = %e, "listening on unknown address"),
    }

    spawn_event_logger(server.registry());

    server
        .run_until(setup_shutdown_signal())
        .await
        .map_err(|e| e.to_string())?;

    tracing::info!("server stopped");
    Ok(())
}

/// Log registry membership changes
fn spawn_event_logger(registry: &ConnectionRegistry) {
    let mut events = registry.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RegistryEvent::Connected { login, address }) => {
                    tracing::debug!(%login, %address, "online");
                }
                Ok(RegistryEvent::Disconnected { login, reason }) => {
                    tracing::debug!(%login, ?reason, "offline");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "registry event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Run a one-shot administrative command
async fn run_admin(command: Command, database: &Database) -> Result<(), String> {
    match command {
        Command::Serve => Ok(()),
        Command::Register {
            login,
            password,
            info,
        } => {
            let record = database
                .clients
                .register(&login, &password, &info)
                .await
                .map_err(|e| e.to_string())?;
            println!("Registered '{}' (id {})", record.login, record.id);
            Ok(())
        }
        Command::Passwd { login, password } => {
            database
                .clients
                .rotate(&login, &password)
                .await
                .map_err(|e| e.to_string())?;
            println!("Password changed for '{}'", login);
            Ok(())
        }
        Command::Logins { login } => {
            let records = database
                .history
                .logins_for(&login)
                .await
                .map_err(|e| e.to_string())?;
            for record in records {
                println!("{}  {}", format_timestamp(record.login_time), record.ip_address);
            }
            Ok(())
        }
        Command::Transcript { a, b } => {
            let records = database
                .messages
                .messages_between(&a, &b)
                .await
                .map_err(|e| e.to_string())?;
            for record in records {
                println!(
                    "[{}] {} -> {}: {}",
                    format_timestamp(record.timestamp),
                    record.sender,
                    record.receiver,
                    record.body
                );
            }
            Ok(())
        }
        Command::Contacts { login } => {
            let contacts = database
                .contacts
                .list_contacts(&login)
                .await
                .map_err(|e| e.to_string())?;
            for contact in contacts {
                println!("{}", contact);
            }
            Ok(())
        }
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Set secure permissions on a file (Unix only)
#[cfg(unix)]
fn set_secure_permissions(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    let metadata =
        fs::metadata(path).map_err(|e| format!("Failed to read file metadata: {}", e))?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(0o600);
    fs::set_permissions(path, permissions)
        .map_err(|e| format!("Failed to set file permissions: {}", e))?;
    Ok(())
}

/// Open the database, creating it and applying migrations if needed
async fn setup_db(database_path: Option<PathBuf>) -> Database {
    let db_path = database_path.unwrap_or_else(|| match db::default_database_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    });

    let pool = match db::init_db(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            process::exit(1);
        }
    };
    tracing::info!(path = %db_path.display(), "database ready");

    #[cfg(unix)]
    if let Err(e) = set_secure_permissions(&db_path) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    Database::new(pool)
}

/// Resolve when the process is asked to stop
async fn setup_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, "failed to install signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
