use clap::Parser;
use sitectl::config::{Command, MigrateAction};
use sitectl::db::MongoStore;
use sitectl::migrate::{MigrationReport, MigrationRunner};
use sitectl::{Config, migrations, telemetry};
use std::process::ExitCode;
use std::sync::Arc;

fn print_report(verb: &str, report: &MigrationReport) {
    if report.actions.is_empty() {
        println!("Nothing to do ({} migration(s) already in the desired state).", report.skipped);
        return;
    }
    for action in &report.actions {
        println!("{verb} {} ({})", action.version, action.name);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI args
    let args = sitectl::config::Args::parse();

    // Load configuration
    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = telemetry::init_telemetry() {
        eprintln!("Failed to initialize telemetry: {e}");
        return ExitCode::FAILURE;
    }

    tracing::debug!("{:?}", args);

    let exposure = config.environment.exposure();

    let Some(Command::Migrate { action }) = args.command else {
        eprintln!("No command given; try `sitectl migrate up`.");
        return ExitCode::FAILURE;
    };

    // `create` is purely local and needs no database connection
    if let MigrateAction::Create { name } = &action {
        return match sitectl::migrate::scaffold::create(&config.migrations_dir, name) {
            Ok(path) => {
                println!("Created {}", path.display());
                println!("Register the new script in src/migrations/mod.rs to include it in the next run.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e.render(exposure));
                ExitCode::FAILURE
            }
        };
    }

    let store = match MongoStore::connect(&config.database).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("{}", e.render(exposure));
            return ExitCode::FAILURE;
        }
    };

    let registry = match migrations::registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{}", e.render(exposure));
            return ExitCode::FAILURE;
        }
    };
    let runner = MigrationRunner::new(registry, store);

    let result = match action {
        MigrateAction::Up => runner.apply().await.map(|report| ("Applied", report)),
        MigrateAction::Down => runner.rollback().await.map(|report| ("Rolled back", report)),
        MigrateAction::Create { .. } => unreachable!("handled above"),
    };

    match result {
        Ok((verb, report)) => {
            print_report(verb, &report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.render(exposure));
            ExitCode::FAILURE
        }
    }
}
