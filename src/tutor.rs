pub mod agent;
pub mod math;
pub mod state;
pub mod tool;
pub mod tools;

use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use sqlx::SqlitePool;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use agent::{AgentDescriptor, AgentManifest};
pub use state::SessionState;

use crate::{
    config::TutorConfig,
    error::{Error, Result},
    progress::summarize_for_student,
};

/// Live tutor conversations keyed by user id.
pub type TutorSessions = Cache<i64, Arc<Mutex<SessionState>>>;

pub fn new_session_cache(config: &TutorConfig) -> TutorSessions {
    Cache::builder()
        .max_capacity(config.session_capacity)
        .time_to_idle(Duration::from_secs(config.session_idle_minutes * 60))
        .build()
}

async fn progress_value(database: &SqlitePool, user_id: i64) -> Result<Value> {
    let report = summarize_for_student(database, user_id).await?;
    serde_json::to_value(report).map_err(|e| Error::Internal(e.into()))
}

/// The caller's conversation state, opened with their quiz history as `progress`.
pub async fn session_for(
    sessions: &TutorSessions,
    database: &SqlitePool,
    user_id: i64,
) -> Result<Arc<Mutex<SessionState>>> {
    let database = database.clone();
    sessions
        .try_get_with(user_id, async move {
            let progress = progress_value(&database, user_id).await?;
            info!("opened tutor session for user {}", user_id);
            Ok::<_, Error>(Arc::new(Mutex::new(SessionState::with_progress(progress))))
        })
        .await
        .map_err(|e| Error::Internal(anyhow::anyhow!("failed to open tutor session: {}", e)))
}

/// Re-read the student's quiz history into an open session's `progress`.
/// Topics and language are kept; students without a session are skipped.
pub async fn refresh_progress(
    sessions: &TutorSessions,
    database: &SqlitePool,
    user_id: i64,
) -> Result<()> {
    let Some(session) = sessions.get(&user_id).await else {
        return Ok(());
    };
    let progress = progress_value(database, user_id).await?;
    session.lock().await.progress = progress;
    debug!("refreshed tutor progress for user {}", user_id);
    Ok(())
}

/// [`refresh_progress`] for every open session.
pub async fn refresh_all_progress(sessions: &TutorSessions, database: &SqlitePool) -> Result<()> {
    let user_ids: Vec<i64> = sessions.iter().map(|(user_id, _)| *user_id).collect();
    for user_id in user_ids {
        refresh_progress(sessions, database, user_id).await?;
    }
    Ok(())
}
