pub mod types;
pub mod error;
pub mod config;
pub mod participants;
pub mod bracket;
pub mod activity;
pub mod view;
pub mod sync;
pub mod store;
pub mod auth;
pub mod audit;
pub mod remote;
pub mod session;
pub mod server;

use types::*;
use config::*;
use audit::FileAuditSink;
use auth::{SessionMemory, StaticAuthorizer};
use error::TournamentResult;
use remote::{resolve_tournament_id, RestAuditSink, RestAuthorizer, RestClient, RestRemote};
use session::TournamentSession;
use store::LocalStore;

use std::{
    fs,
    sync::{mpsc, Arc, Mutex},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ── Session bootstrap ──────────────────────────────────────────────────

fn connect_remote(config: &AppConfig, local: LocalStore) -> TournamentResult<TournamentSession> {
    let client = RestClient::new(&config.remote_url, &config.remote_key)?;
    let tournament_id = resolve_tournament_id(&client, &config.tournament_name)?;
    info!("using tournament {tournament_id} ({})", config.tournament_name);
    Ok(TournamentSession::new(
        tournament_id,
        local,
        Box::new(RestAuthorizer::new(client.clone())),
        Box::new(RestAuditSink::new(client.clone())),
    )
    .with_remote(Box::new(RestRemote::new(client, config.remote_poll_ms))))
}

/// Remote-backed when configured and reachable, otherwise offline against
/// the local state file and the configured admin codes.
pub fn build_session(config: &AppConfig) -> TournamentSession {
    let local = LocalStore::new(local_state_path(config));
    let memory = SessionMemory::new(session_file_path(), config.session_ttl_hours);

    let session = if config.has_remote() {
        match connect_remote(config, local.clone()) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("remote unavailable: {e}; running offline");
                None
            }
        }
    } else {
        None
    };

    session
        .unwrap_or_else(|| {
            TournamentSession::new(
                LOCAL_TOURNAMENT_ID,
                local,
                Box::new(StaticAuthorizer::new(&config.admin_codes)),
                Box::new(FileAuditSink::new(audit_log_path())),
            )
        })
        .with_memory(memory)
        .with_max_participants(config.max_participants)
}

/// Subscribes the session to remote changes and applies them on a
/// dedicated thread, one at a time, under the session lock.
pub fn spawn_remote_pump(session: SharedSession) {
    let (tx, rx) = mpsc::channel::<RemoteRecord>();
    {
        let mut guard = session.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = guard.subscribe(tx) {
            warn!("remote subscription failed: {e}; live updates disabled");
            return;
        }
    }
    std::thread::spawn(move || {
        for record in rx {
            let mut guard = session.lock().unwrap_or_else(|e| e.into_inner());
            if guard.handle_remote_change(record) == RemoteAction::Reloaded {
                info!("applied remote bracket update");
            }
        }
    });
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();

    // Initialize tracing with daily file output
    let logs_dir = logs_dir();
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Bracket board starting");

    let config = load_config_inner().unwrap_or_else(|e| {
        error!("{e}; falling back to defaults");
        apply_env_defaults(AppConfig::default())
    });
    log_config_warnings(&config);

    let shared: SharedSession = Arc::new(Mutex::new(build_session(&config)));
    {
        let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
        guard.restore_login();
        guard.load();
    }
    spawn_remote_pump(shared.clone());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return;
        }
    };
    runtime.block_on(server::start_server(shared, view_dir(&config), &config.listen_addr));
}
