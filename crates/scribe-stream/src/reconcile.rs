//! Rehydrating engine state when the user switches conversations.

use scribe_types::{Artifact, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::MigrationError;
use crate::migrate::migrate_value;
use crate::share::annotate;

/// What the document-loading collaborator hands over for a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedBundle {
    /// Current or legacy artifact shape; `null` means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Value>,
    /// Raw message records.
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// State to install in place of whatever the session held.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub artifact: Option<Artifact>,
    pub messages: Vec<Message>,
}

/// Turn a persisted bundle into fresh engine state.
///
/// The artifact is migrated to the current shape. Messages that recorded a
/// shared-run URL in their metadata but lost the structured annotation get
/// it back. Records that are not messages are skipped.
pub fn reconcile(bundle: PersistedBundle, config: &EngineConfig) -> Result<Reconciled, MigrationError> {
    let artifact = match bundle.artifact {
        None | Some(Value::Null) => None,
        Some(value) => Some(migrate_value(value)?),
    };

    let mut messages = Vec::with_capacity(bundle.messages.len());
    for (position, record) in bundle.messages.into_iter().enumerate() {
        match serde_json::from_value::<Message>(record) {
            Ok(mut message) => {
                if let Some(url) = message.shared_run_url().map(str::to_string) {
                    if annotate(&mut message, &url, config) {
                        debug!(id = %message.id, "restored shared-run annotation");
                    }
                }
                messages.push(message);
            }
            Err(e) => warn!(position, "skipping unreadable message record: {e}"),
        }
    }

    Ok(Reconciled { artifact, messages })
}
