//! Serve command - web chat server.

use crate::config::Settings;

/// Run the serve command.
#[cfg(feature = "http-server")]
pub async fn run(bind: Option<String>, config: &Settings) -> anyhow::Result<()> {
    use std::sync::Arc;

    use super::{build_pipeline_async, init_logging};
    use crate::logging::LogFile;
    use crate::web::{AppState, serve};

    init_logging(config, LogFile::Web)?;

    // CLI flag wins over config
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let pipeline = build_pipeline_async(config).await?;
    let state = Arc::new(AppState::new(Arc::new(pipeline)));
    serve(state, &bind).await
}

#[cfg(not(feature = "http-server"))]
pub async fn run(_bind: Option<String>, _config: &Settings) -> anyhow::Result<()> {
    anyhow::bail!("web chat requires the 'http-server' feature; rebuild with --features http-server")
}
