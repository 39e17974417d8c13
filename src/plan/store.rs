use crate::actions::{ActionResult, AutomationPlan};
use crate::browser::session::SessionManager;
use crate::utils::ScreenshotArtifact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Running,
    Completed,
    Failed,
}

/// Pollable view of one background plan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub status: SessionState,
    pub plan: AutomationPlan,
    pub results: Vec<ActionResult>,
    pub screenshots: Vec<ScreenshotArtifact>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// In-memory registry of plan runs started in the background.
///
/// Entries are never evicted.
#[derive(Clone)]
pub struct SessionStore {
    manager: Arc<SessionManager>,
    sessions: Arc<RwLock<HashMap<String, SessionStatus>>>,
}

impl SessionStore {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register the run and start it in the background. Returns the session
    /// id straight away; results show up through `poll` as steps complete.
    pub async fn start(&self, plan: AutomationPlan, headless: bool) -> String {
        let session_id = new_session_id();
        let actions = plan.actions.clone();

        self.sessions.write().await.insert(
            session_id.clone(),
            SessionStatus {
                session_id: session_id.clone(),
                status: SessionState::Running,
                plan,
                results: Vec::new(),
                screenshots: Vec::new(),
                started_at: Utc::now(),
                completed_at: None,
                error: None,
            },
        );
        info!("Started session {} with {} actions", session_id, actions.len());

        let store = self.clone();
        let id = session_id.clone();
        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let manager = Arc::clone(&store.manager);

            let run = async move {
                manager
                    .execute_with_progress(&actions, headless, Some(&tx))
                    .await
            };
            let drain = async {
                while let Some(result) = rx.recv().await {
                    if let Some(session) = store.sessions.write().await.get_mut(&id) {
                        session.results.push(result);
                    }
                }
            };
            let (report, ()) = tokio::join!(run, drain);

            let mut sessions = store.sessions.write().await;
            let Some(session) = sessions.get_mut(&id) else {
                return;
            };
            session.status = if report.success {
                SessionState::Completed
            } else {
                SessionState::Failed
            };
            session.results = report.results;
            session.screenshots = report.screenshots;
            session.error = report.error;
            session.completed_at = Some(Utc::now());

            match &session.error {
                Some(e) => error!("Session {} failed: {}", id, e),
                None => info!("Session {} completed", id),
            }
        });

        session_id
    }

    pub async fn poll(&self, session_id: &str) -> Option<SessionStatus> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

/// `session_<epoch millis>_<9 random lowercase alphanumerics>`
fn new_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}",
        Utc::now().timestamp_millis(),
        &random[..9]
    )
}
