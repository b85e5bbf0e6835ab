use crate::cli::actions::Action;
use crate::events::{ConsoleSink, EventSink, FileSink};
use crate::http::{self, AppState, OriginPolicy};
use crate::manager::{LoginManager, ManagerConfig};
use crate::store::JsonFileStore;
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        data_dir,
        log_dir,
        allow_origin,
        block_origin,
        token_timeout,
        recycling_span,
    } = action;

    let store: JsonFileStore<Value> = JsonFileStore::with_recycling_span(&data_dir, recycling_span)
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))?;

    let sink: Arc<dyn EventSink> = match log_dir {
        Some(dir) => Arc::new(
            FileSink::new(&dir)
                .with_context(|| format!("failed to open log directory {}", dir.display()))?,
        ),
        None => Arc::new(ConsoleSink),
    };

    let config = ManagerConfig {
        token_timeout,
        ..ManagerConfig::default()
    };

    let manager: Arc<LoginManager<Value>> = Arc::new(
        LoginManager::new(Arc::new(store))
            .with_config(config)
            .with_sink(sink),
    );

    let state =
        AppState::new(manager).with_origins(OriginPolicy::new(allow_origin, block_origin));

    http::serve(port, state).await
}
