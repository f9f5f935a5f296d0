//! Development-only diagnostic events.
//!
//! When a store operation is denied, handlers publish a structured event
//! here in addition to the Spanish error on the RPC response. A dev
//! overlay in the client subscribes to these over the same WebSocket.
//! Fire-and-forget: publishing never alters the RPC response, and a
//! full channel just drops the event.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::client::ClientRegistry;

/// Capacity of the in-process diagnostic broadcast channel.
pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// A store/handler operation was denied.
    PermissionDenied {
        /// Resource path, e.g. `sessions/sess_x` or `knowledgeSources`.
        path: String,
        /// Denied operation: get, list, create, update, delete, write.
        operation: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        timestamp: String,
    },
}

impl DiagnosticEvent {
    pub fn permission_denied(
        path: impl Into<String>,
        operation: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        Self::PermissionDenied {
            path: path.into(),
            operation: operation.into(),
            user_id,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Create the diagnostic channel. The sender side lives in the handler
/// state; the bridge consumes the paired receiver.
pub fn channel() -> (broadcast::Sender<DiagnosticEvent>, broadcast::Receiver<DiagnosticEvent>) {
    broadcast::channel(CHANNEL_CAPACITY)
}

/// Forward diagnostic events to every connected WebSocket client.
pub fn create_bridge(
    registry: Arc<ClientRegistry>,
    mut rx: broadcast::Receiver<DiagnosticEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(json) = serde_json::to_string(&event) {
                        registry.broadcast_all(&json);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Diagnostic bridge lagged, dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Diagnostic channel closed");
                    break;
                }
            }
        }
    })
}
