use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ContractFunded,
    ContractCompleted,
    ContractTerminated,
    TransferReceived,
    PayoutProcessed,
}

/// Fire-and-forget notification boundary. Implementations must never fail in
/// a way that could roll back the financial operation that triggered them.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: Uuid, kind: NotificationKind, payload: serde_json::Value);
}

/// Default implementation: emits the request into the log stream, where the
/// delivery pipeline picks it up.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, recipient: Uuid, kind: NotificationKind, payload: serde_json::Value) {
        tracing::info!(%recipient, ?kind, %payload, "notification requested");
    }
}
