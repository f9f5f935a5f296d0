use conecta_core::errors::GatewayError;
use conecta_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Input rejected before any write or model call. Carries the
    /// toast-ready Spanish message.
    #[error("{0}")]
    Rejected(&'static str),

    #[error("session create failed: {0}")]
    SessionCreate(#[source] StoreError),

    #[error("message append failed: {0}")]
    MessageAppend(#[source] StoreError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The model answered, but the payload did not match the expected shape.
    #[error("unusable model output: {0}")]
    BadOutput(String),
}

impl FlowError {
    /// Spanish message shown to the user. The wire code and any
    /// diagnostic detail travel separately.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected(msg) => msg,
            Self::SessionCreate(_) => "No se pudo iniciar una nueva sesión de chat.",
            Self::MessageAppend(_) => "No se pudo guardar el mensaje.",
            Self::Gateway(_) | Self::BadOutput(_) => "No se pudo obtener una respuesta de la IA.",
            Self::Store(StoreError::PermissionDenied { .. }) => {
                "No tienes permisos para realizar esta acción."
            }
            Self::Store(StoreError::NotFound(_)) => "No se encontró el recurso solicitado.",
            Self::Store(_) => "Ocurrió un error inesperado.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_carries_its_own_message() {
        let err = FlowError::Rejected("El mensaje no puede estar vacío.");
        assert_eq!(err.user_message(), "El mensaje no puede estar vacío.");
    }

    #[test]
    fn gateway_failures_share_one_user_message() {
        let timeout = FlowError::Gateway(GatewayError::ProviderOverloaded);
        let garbage = FlowError::BadOutput("not json".into());
        assert_eq!(timeout.user_message(), "No se pudo obtener una respuesta de la IA.");
        assert_eq!(garbage.user_message(), timeout.user_message());
    }

    #[test]
    fn store_errors_map_by_kind() {
        let denied = FlowError::Store(StoreError::PermissionDenied {
            path: "sessions/sess_x".into(),
            operation: "get".into(),
        });
        assert_eq!(denied.user_message(), "No tienes permisos para realizar esta acción.");

        let missing = FlowError::Store(StoreError::NotFound("session sess_x".into()));
        assert_eq!(missing.user_message(), "No se encontró el recurso solicitado.");
    }
}
