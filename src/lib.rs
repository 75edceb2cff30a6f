pub mod types;
pub mod error;
pub mod config;
pub mod graph;
pub mod generator;
pub mod progression;
pub mod standings;
pub mod rating;
pub mod collaborators;
pub mod repository;
pub mod service;
pub mod server;

pub use error::{Collaborator, EngineError, EngineResult};
pub use generator::{GenerateOptions, Seeding};
pub use progression::{Bracket, ChangeSet, PhaseEvent, Progress};
pub use service::TournamentService;
pub use types::*;

use collaborators::{EloLedger, InMemoryHistory, TracingNotifier};
use config::*;
use repository::{InMemoryRepository, JsonFileRepository, Repository};
use std::{fs, path::PathBuf, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── Wiring ─────────────────────────────────────────────────────────────

/// Builds the service from config: JSON store when a data dir is set,
/// in-memory otherwise.
pub fn build_service(config: &EngineConfig) -> EngineResult<TournamentService> {
    let repo: Arc<dyn Repository> = match config.data_path() {
        Some(dir) => {
            let repo = JsonFileRepository::open(&dir)?;
            info!("tournament store at {}", repo.path().display());
            Arc::new(repo)
        }
        None => Arc::new(InMemoryRepository::new()),
    };
    let service = TournamentService::new(
        repo,
        Arc::new(EloLedger::new(config.k_factor, config.default_rating)),
        Arc::new(InMemoryHistory::new()),
        Arc::new(TracingNotifier),
    )
    .with_seeding(config.seeding());
    Ok(match config.shuffle_seed {
        Some(seed) => service.with_seed(seed),
        None => service,
    })
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() -> Result<(), String> {
    load_env_file();
    let config = load_config()?;

    // Initialize tracing with a daily rolling file
    let logs_dir = PathBuf::from(&config.log_dir);
    fs::create_dir_all(&logs_dir).map_err(|e| format!("create log dir {}: {e}", logs_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "bracket-engine.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("bracket engine starting");
    log_config_warnings(&config);

    let service = build_service(&config).map_err(|e| {
        error!("startup failed: {e}");
        e.to_string()
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("start runtime: {e}"))?;
    runtime.block_on(server::serve(Arc::new(service), &config.bind_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_service_uses_json_store_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            data_dir: dir.path().display().to_string(),
            shuffle_seed: Some(5),
            ..EngineConfig::default()
        };
        let service = build_service(&config).unwrap();
        let created = service
            .create_tournament(CreateTournamentRequest {
                name: "league".to_string(),
                format: Format::RoundRobin,
                participants: vec![1, 2, 3],
            })
            .unwrap();
        service.generate_bracket(created.id).unwrap();
        assert!(dir.path().join(repository::STORE_FILE).is_file());

        let reopened = build_service(&config).unwrap();
        assert_eq!(reopened.tournament(created.id).unwrap().matches.len(), 3);
    }
}
