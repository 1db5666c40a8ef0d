use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::services::auth_service::TokenPair;

pub const DEFAULT_SERVER: &str = "http://localhost:3000";
const SESSION_FILE: &str = "session.json";

/// What `forms auth login` leaves behind for later commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub server: String,
    pub email: Option<String>,
    pub tokens: Option<TokenPair>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            email: None,
            tokens: None,
            updated_at: Utc::now(),
        }
    }
}

impl Session {
    /// Client for this session, optionally pointed at another server.
    pub fn client(&self, server: Option<&str>) -> ApiClient {
        ApiClient::new(server.unwrap_or(&self.server)).with_tokens(self.tokens.clone())
    }

    /// Keep whatever pair the client ended with; it may have been rotated.
    pub async fn sync_from(&mut self, client: &ApiClient) -> anyhow::Result<()> {
        let tokens = client.tokens().await;
        if tokens != self.tokens {
            self.tokens = tokens;
            save_session(self)?;
        }
        Ok(())
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("FORMS_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("forms").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_session() -> anyhow::Result<Session> {
    let session_file = get_config_dir()?.join(SESSION_FILE);

    if !session_file.exists() {
        return Ok(Session::default());
    }

    let content = fs::read_to_string(session_file)?;
    let session: Session = serde_json::from_str(&content)?;
    Ok(session)
}

pub fn save_session(session: &Session) -> anyhow::Result<()> {
    let session_file = get_config_dir()?.join(SESSION_FILE);
    let mut session = session.clone();
    session.updated_at = Utc::now();
    let content = serde_json::to_string_pretty(&session)?;
    fs::write(session_file, content)?;
    Ok(())
}
