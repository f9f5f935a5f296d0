//! RPC method handlers organized by domain.

use std::sync::Arc;

use tokio::sync::broadcast;

use conecta_core::ids::{FiscalId, SessionId, SourceId, UserId};
use conecta_core::provider::TextProvider;
use conecta_core::security::TokenSecret;
use conecta_flows::{knowledge as knowledge_flow, suggestions, ChatFlow, FlowError};
use conecta_store::fiscales::FiscalRepo;
use conecta_store::knowledge::KnowledgeRepo;
use conecta_store::messages::MessageRepo;
use conecta_store::sessions::SessionRepo;
use conecta_store::users::{SignInProvider, UserRepo, UserRow};
use conecta_store::{Database, StoreError};

use crate::auth;
use crate::diagnostics::DiagnosticEvent;
use crate::ingest;
use crate::rpc::{self, RpcResponse};

const MSG_UNAUTHENTICATED: &str = "Debes iniciar sesión para continuar.";
const MSG_BAD_CREDENTIALS: &str = "Correo o contraseña incorrectos.";
const MSG_FORBIDDEN: &str = "No tienes permisos para realizar esta acción.";
const MSG_KNOWLEDGE_ADDED: &str = "Fuente de conocimiento agregada.";

/// Shared state available to all RPC handlers.
pub struct HandlerState {
    pub db: Database,
    pub provider: Arc<dyn TextProvider>,
    pub chat: ChatFlow,
    pub jwt_secret: TokenSecret,
    pub google_client_id: Option<String>,
    pub dev_mode: bool,
    pub diagnostics: broadcast::Sender<DiagnosticEvent>,
    pub http: reqwest::Client,
}

impl HandlerState {
    pub fn new(
        db: Database,
        provider: Arc<dyn TextProvider>,
        jwt_secret: TokenSecret,
        diagnostics: broadcast::Sender<DiagnosticEvent>,
    ) -> Self {
        let chat = ChatFlow::new(Arc::clone(&provider), db.clone());
        Self {
            db,
            provider,
            chat,
            jwt_secret,
            google_client_id: None,
            dev_mode: false,
            diagnostics,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_google(mut self, client_id: impl Into<String>) -> Self {
        self.google_client_id = Some(client_id.into());
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Publish a permission-denied diagnostic. Dev mode only; production
    /// surfaces nothing beyond the Spanish error on the response.
    fn deny(&self, path: &str, operation: &str, user_id: Option<&UserId>) {
        if self.dev_mode {
            let _ = self.diagnostics.send(DiagnosticEvent::permission_denied(
                path,
                operation,
                user_id.map(|u| u.to_string()),
            ));
        }
    }
}

/// Dispatch an RPC method to the appropriate handler.
pub async fn dispatch(
    state: &Arc<HandlerState>,
    method: &str,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    match method {
        // Auth
        "auth.signup" => auth_signup(state, params, id),
        "auth.login" => auth_login(state, params, id),
        "auth.google" => auth_google(state, params, id).await,
        "auth.me" => auth_me(state, params, id),

        // Chat
        "chat.send" => chat_send(state, params, id).await,
        "chat.suggestions" => chat_suggestions(state, params, id).await,

        // Sessions & messages
        "session.list" => session_list(state, params, id),
        "session.get" => session_get(state, params, id),
        "message.list" => message_list(state, params, id),

        // Knowledge base
        "knowledge.add" => knowledge_add(state, params, id),
        "knowledge.add_pdf" => knowledge_add_pdf(state, params, id),
        "knowledge.list" => knowledge_list(state, params, id),
        "knowledge.delete" => knowledge_delete(state, params, id),

        // Fiscales roster
        "fiscal.add" => fiscal_add(state, params, id),
        "fiscal.list" => fiscal_list(state, params, id),
        "fiscal.delete" => fiscal_delete(state, params, id),
        "fiscal.import" => fiscal_import(state, params, id),
        "fiscal.export" => fiscal_export(state, params, id),

        // System
        "system.ping" => RpcResponse::success(id, serde_json::json!({"pong": true})),
        "health" => health(state, id),

        _ => RpcResponse::method_not_found(id, method),
    }
}

// ── Auth helpers ──

/// Resolve the caller from the `token` param. Missing, malformed, and
/// expired tokens all collapse into one UNAUTHENTICATED response.
fn authenticate(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: &Option<serde_json::Value>,
) -> Result<UserRow, RpcResponse> {
    let Some(token) = rpc::optional_str(params, "token") else {
        return Err(RpcResponse::unauthenticated(id.clone(), MSG_UNAUTHENTICATED));
    };

    let claims = auth::verify_token(token, &state.jwt_secret)
        .map_err(|_| RpcResponse::unauthenticated(id.clone(), MSG_UNAUTHENTICATED))?;

    UserRepo::new(state.db.clone())
        .get(&UserId::from_raw(claims.sub))
        .map_err(|_| RpcResponse::unauthenticated(id.clone(), MSG_UNAUTHENTICATED))
}

/// Admin gate for roster and knowledge writes. A denial answers in
/// Spanish and, in dev mode, publishes a diagnostic naming the resource.
fn check_admin(
    state: &Arc<HandlerState>,
    user: &UserRow,
    path: &str,
    operation: &str,
    id: &Option<serde_json::Value>,
) -> Result<(), RpcResponse> {
    match UserRepo::new(state.db.clone()).is_admin(&user.id) {
        Ok(true) => Ok(()),
        Ok(false) => {
            state.deny(path, operation, Some(&user.id));
            Err(RpcResponse::permission_denied(id.clone(), MSG_FORBIDDEN))
        }
        Err(e) => Err(RpcResponse::internal_error(id.clone(), e.to_string())),
    }
}

fn token_for(state: &Arc<HandlerState>, user: &UserRow) -> Result<String, RpcResponse> {
    auth::issue_token(&user.id, &user.email, &state.jwt_secret)
        .map_err(|e| RpcResponse::internal_error(None, e.to_string()))
}

// ── Auth handlers ──

fn auth_signup(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let email = match rpc::require_str(params, "email") {
        Ok(e) => e.trim().to_lowercase(),
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    if email.is_empty() {
        return RpcResponse::invalid_params(id, "El correo es obligatorio.");
    }

    let password = match rpc::require_str(params, "password") {
        Ok(p) => p,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    if password.chars().count() < 8 {
        return RpcResponse::invalid_params(
            id,
            "La contraseña debe tener al menos 8 caracteres.",
        );
    }

    let display_name = rpc::optional_str(params, "display_name");

    let hash = match auth::hash_password(password) {
        Ok(h) => h,
        Err(e) => return RpcResponse::internal_error(id, e.to_string()),
    };

    let repo = UserRepo::new(state.db.clone());
    let user = match repo.create(&email, display_name, Some(&hash), SignInProvider::Password) {
        Ok(u) => u,
        Err(StoreError::Conflict(_)) => {
            return RpcResponse::conflict(id, "Ya existe una cuenta con ese correo.")
        }
        Err(e) => return RpcResponse::internal_error(id, e.to_string()),
    };

    match token_for(state, &user) {
        Ok(token) => RpcResponse::success(id, serde_json::json!({"token": token, "user": user})),
        Err(resp) => resp,
    }
}

fn auth_login(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let email = match rpc::require_str(params, "email") {
        Ok(e) => e.trim().to_lowercase(),
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    let password = match rpc::require_str(params, "password") {
        Ok(p) => p,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };

    // Unknown email, social-only account, and wrong password all answer
    // identically so the endpoint does not leak which emails exist.
    let repo = UserRepo::new(state.db.clone());
    let user = match repo.get_by_email(&email) {
        Ok(u) => u,
        Err(_) => return RpcResponse::unauthenticated(id, MSG_BAD_CREDENTIALS),
    };

    let Some(hash) = user.password_hash.as_deref() else {
        return RpcResponse::unauthenticated(id, MSG_BAD_CREDENTIALS);
    };
    match auth::verify_password(password, hash) {
        Ok(true) => {}
        _ => return RpcResponse::unauthenticated(id, MSG_BAD_CREDENTIALS),
    }

    match token_for(state, &user) {
        Ok(token) => RpcResponse::success(id, serde_json::json!({"token": token, "user": user})),
        Err(resp) => resp,
    }
}

async fn auth_google(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let Some(client_id) = state.google_client_id.as_deref() else {
        return RpcResponse::error(
            id,
            crate::rpc::INVALID_REQUEST,
            "El inicio de sesión con Google no está habilitado.",
        );
    };

    let id_token = match rpc::require_str(params, "id_token") {
        Ok(t) => t,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };

    let profile = match auth::verify_google_id_token(&state.http, id_token, client_id).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "Google token verification failed");
            return RpcResponse::unauthenticated(id, MSG_BAD_CREDENTIALS);
        }
    };

    let email = profile.email.trim().to_lowercase();
    let repo = UserRepo::new(state.db.clone());
    let user = match repo.get_by_email(&email) {
        Ok(u) => u,
        // First Google login provisions the account.
        Err(StoreError::NotFound(_)) => {
            match repo.create(&email, profile.name.as_deref(), None, SignInProvider::Google) {
                Ok(u) => u,
                Err(e) => return RpcResponse::internal_error(id, e.to_string()),
            }
        }
        Err(e) => return RpcResponse::internal_error(id, e.to_string()),
    };

    match token_for(state, &user) {
        Ok(token) => RpcResponse::success(id, serde_json::json!({"token": token, "user": user})),
        Err(resp) => resp,
    }
}

fn auth_me(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let is_admin = UserRepo::new(state.db.clone())
        .is_admin(&user.id)
        .unwrap_or(false);

    RpcResponse::success(id, serde_json::json!({"user": user, "is_admin": is_admin}))
}

// ── Chat handlers ──

async fn chat_send(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let message = match rpc::require_str(params, "message") {
        Ok(m) => m,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    let session_id = rpc::optional_str(params, "session_id").map(SessionId::from_raw);

    match state.chat.send(&user.id, session_id.as_ref(), message).await {
        Ok(turn) => RpcResponse::success(
            id,
            serde_json::json!({
                "session_id": turn.session_id,
                "reply": turn.reply,
                "sentiment": turn.sentiment,
            }),
        ),
        Err(e) => {
            let msg = e.user_message().to_string();
            match &e {
                FlowError::Rejected(_) => RpcResponse::invalid_params(id, msg),
                FlowError::Store(StoreError::PermissionDenied { path, operation }) => {
                    state.deny(path, operation, Some(&user.id));
                    RpcResponse::permission_denied(id, msg)
                }
                FlowError::Store(StoreError::NotFound(_)) => RpcResponse::not_found(id, msg),
                FlowError::Gateway(_) | FlowError::BadOutput(_) => {
                    tracing::warn!(error = %e, "Chat turn failed upstream");
                    RpcResponse::upstream_error(id, msg)
                }
                _ => RpcResponse::internal_error(id, msg),
            }
        }
    }
}

async fn chat_suggestions(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    if let Err(resp) = authenticate(state, params, &id) {
        return resp;
    }

    let sources = match KnowledgeRepo::new(state.db.clone()).list() {
        Ok(s) => s,
        Err(e) => return RpcResponse::internal_error(id, e.to_string()),
    };
    let knowledge = knowledge_flow::aggregate(&sources);

    match suggestions::suggest(state.provider.as_ref(), &knowledge).await {
        Ok(starters) => RpcResponse::success(id, serde_json::json!({"suggestions": starters})),
        Err(e) => {
            tracing::warn!(error = %e, "Suggestions generation failed");
            RpcResponse::upstream_error(id, e.user_message().to_string())
        }
    }
}

// ── Session & message handlers ──

fn session_list(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let limit = rpc::optional_i64(params, "limit").unwrap_or(50) as u32;
    let offset = rpc::optional_i64(params, "offset").unwrap_or(0) as u32;

    match SessionRepo::new(state.db.clone()).list_for_user(&user.id, limit, offset) {
        Ok(sessions) => RpcResponse::success(id, serde_json::json!({"sessions": sessions})),
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

fn session_get(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let session_id = match rpc::require_str(params, "session_id") {
        Ok(s) => SessionId::from_raw(s),
        Err(e) => return RpcResponse::invalid_params(id, e),
    };

    match SessionRepo::new(state.db.clone()).get_owned(&session_id, &user.id) {
        Ok(session) => RpcResponse::success(id, serde_json::json!({"session": session})),
        Err(StoreError::PermissionDenied { path, operation }) => {
            state.deny(&path, &operation, Some(&user.id));
            RpcResponse::permission_denied(id, MSG_FORBIDDEN)
        }
        Err(StoreError::NotFound(_)) => {
            RpcResponse::not_found(id, "No se encontró el recurso solicitado.")
        }
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

fn message_list(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let session_id = match rpc::require_str(params, "session_id") {
        Ok(s) => SessionId::from_raw(s),
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    let limit = rpc::optional_i64(params, "limit").map(|v| v as u32);
    let offset = rpc::optional_i64(params, "offset").map(|v| v as u32);

    // Ownership check before reading the log.
    if let Err(e) = SessionRepo::new(state.db.clone()).get_owned(&session_id, &user.id) {
        return match e {
            StoreError::PermissionDenied { path, operation } => {
                state.deny(&path, &operation, Some(&user.id));
                RpcResponse::permission_denied(id, MSG_FORBIDDEN)
            }
            StoreError::NotFound(_) => {
                RpcResponse::not_found(id, "No se encontró el recurso solicitado.")
            }
            other => RpcResponse::internal_error(id, other.to_string()),
        };
    }

    match MessageRepo::new(state.db.clone()).list(&session_id, limit, offset) {
        Ok(messages) => RpcResponse::success(id, serde_json::json!({"messages": messages})),
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

// ── Knowledge handlers ──

fn knowledge_add(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_admin(state, &user, "knowledgeSources", "create", &id) {
        return resp;
    }

    let name = match rpc::require_str(params, "name") {
        Ok(n) => n.trim(),
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    let content = rpc::optional_str(params, "content");
    let url = rpc::optional_str(params, "url");

    if let Err(e) = knowledge_flow::validate(name, content, url) {
        return RpcResponse::invalid_params(id, e.user_message().to_string());
    }

    match KnowledgeRepo::new(state.db.clone()).create(name, content, url) {
        Ok(source) => RpcResponse::success(
            id,
            serde_json::json!({"source": source, "message": MSG_KNOWLEDGE_ADDED}),
        ),
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

fn knowledge_add_pdf(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_admin(state, &user, "knowledgeSources", "create", &id) {
        return resp;
    }

    let name = match rpc::require_str(params, "name") {
        Ok(n) => n.trim(),
        Err(e) => return RpcResponse::invalid_params(id, e),
    };
    let pdf_base64 = match rpc::require_str(params, "pdf_base64") {
        Ok(p) => p,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };

    let text = match ingest::extract_pdf_text(pdf_base64) {
        Ok(t) => t,
        Err(ingest::IngestError::NoText) => {
            return RpcResponse::invalid_params(id, "El PDF no contiene texto extraíble.")
        }
        Err(e) => {
            tracing::warn!(error = %e, "PDF ingestion failed");
            return RpcResponse::invalid_params(id, "No se pudo extraer texto del PDF.");
        }
    };

    if let Err(e) = knowledge_flow::validate(name, Some(&text), None) {
        return RpcResponse::invalid_params(id, e.user_message().to_string());
    }

    match KnowledgeRepo::new(state.db.clone()).create(name, Some(&text), None) {
        Ok(source) => RpcResponse::success(
            id,
            serde_json::json!({"source": source, "message": MSG_KNOWLEDGE_ADDED}),
        ),
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

fn knowledge_list(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    if let Err(resp) = authenticate(state, params, &id) {
        return resp;
    }

    match KnowledgeRepo::new(state.db.clone()).list() {
        Ok(sources) => RpcResponse::success(id, serde_json::json!({"sources": sources})),
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

fn knowledge_delete(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_admin(state, &user, "knowledgeSources", "delete", &id) {
        return resp;
    }

    let source_id = match rpc::require_str(params, "source_id") {
        Ok(s) => SourceId::from_raw(s),
        Err(e) => return RpcResponse::invalid_params(id, e),
    };

    match KnowledgeRepo::new(state.db.clone()).delete(&source_id) {
        Ok(()) => RpcResponse::success(id, serde_json::json!({})),
        Err(StoreError::NotFound(_)) => {
            RpcResponse::not_found(id, "No se encontró el recurso solicitado.")
        }
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

// ── Fiscales handlers ──

fn fiscal_add(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_admin(state, &user, "fiscales", "create", &id) {
        return resp;
    }

    let mut fields = [""; 6];
    for (i, key) in ["full_name", "dni", "role", "school", "mesa", "phone"]
        .iter()
        .enumerate()
    {
        match rpc::require_str(params, key) {
            Ok(v) => fields[i] = v.trim(),
            Err(e) => return RpcResponse::invalid_params(id, e),
        }
    }
    if fields.iter().any(|f| f.is_empty()) {
        return RpcResponse::invalid_params(id, "Todos los campos son obligatorios.");
    }

    let role = match fields[2].to_lowercase().parse() {
        Ok(r) => r,
        Err(_) => {
            return RpcResponse::invalid_params(id, format!("Rol inválido: {}", fields[2]))
        }
    };

    let repo = FiscalRepo::new(state.db.clone());
    match repo.create(fields[0], fields[1], role, fields[3], fields[4], fields[5]) {
        Ok(fiscal) => RpcResponse::success(id, serde_json::json!({"fiscal": fiscal})),
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

fn fiscal_list(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_admin(state, &user, "fiscales", "list", &id) {
        return resp;
    }

    let query = rpc::optional_str(params, "query");
    match FiscalRepo::new(state.db.clone()).list(query) {
        Ok(fiscales) => RpcResponse::success(id, serde_json::json!({"fiscales": fiscales})),
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

fn fiscal_delete(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_admin(state, &user, "fiscales", "delete", &id) {
        return resp;
    }

    let fiscal_id = match rpc::require_str(params, "fiscal_id") {
        Ok(f) => FiscalId::from_raw(f),
        Err(e) => return RpcResponse::invalid_params(id, e),
    };

    match FiscalRepo::new(state.db.clone()).delete(&fiscal_id) {
        Ok(()) => RpcResponse::success(id, serde_json::json!({})),
        Err(StoreError::NotFound(_)) => {
            RpcResponse::not_found(id, "No se encontró el recurso solicitado.")
        }
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

fn fiscal_import(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_admin(state, &user, "fiscales", "write", &id) {
        return resp;
    }

    let data = match rpc::require_str(params, "data") {
        Ok(d) => d,
        Err(e) => return RpcResponse::invalid_params(id, e),
    };

    let (entries, mut skipped) = ingest::parse_roster(data);
    let repo = FiscalRepo::new(state.db.clone());
    let mut imported = 0usize;
    for entry in entries {
        match repo.create(
            &entry.full_name,
            &entry.dni,
            entry.role,
            &entry.school,
            &entry.mesa,
            &entry.phone,
        ) {
            Ok(_) => imported += 1,
            Err(e) => {
                tracing::warn!(error = %e, dni = %entry.dni, "Roster row insert failed");
                skipped += 1;
            }
        }
    }

    RpcResponse::success(
        id,
        serde_json::json!({"imported": imported, "skipped": skipped}),
    )
}

fn fiscal_export(
    state: &Arc<HandlerState>,
    params: &serde_json::Value,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let user = match authenticate(state, params, &id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if let Err(resp) = check_admin(state, &user, "fiscales", "list", &id) {
        return resp;
    }

    let fiscales = match FiscalRepo::new(state.db.clone()).list(None) {
        Ok(f) => f,
        Err(e) => return RpcResponse::internal_error(id, e.to_string()),
    };

    match ingest::roster_csv(&fiscales) {
        Ok(csv) => RpcResponse::success(id, serde_json::json!({"csv": csv})),
        Err(e) => RpcResponse::internal_error(id, e.to_string()),
    }
}

// ── Health ──

fn health(state: &Arc<HandlerState>, id: Option<serde_json::Value>) -> RpcResponse {
    let db_ok = state
        .db
        .with_conn(|conn| {
            conn.execute_batch("SELECT 1")
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(true)
        })
        .unwrap_or(false);

    RpcResponse::success(
        id,
        serde_json::json!({
            "status": if db_ok { "healthy" } else { "degraded" },
            "components": {
                "database": if db_ok { "ok" } else { "error" },
            },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use conecta_llm::{MockProvider, MockResponse};
    use secrecy::SecretString;

    use crate::diagnostics;

    fn secret() -> TokenSecret {
        TokenSecret(SecretString::from("clave-de-prueba"))
    }

    fn sentiment_ok() -> MockResponse {
        MockResponse::json(serde_json::json!({"sentiment": "positive", "score": 0.9}))
    }

    fn setup(responses: Vec<MockResponse>) -> Arc<HandlerState> {
        let db = Database::in_memory().unwrap();
        let provider = Arc::new(MockProvider::new(responses));
        let (tx, _rx) = diagnostics::channel();
        Arc::new(HandlerState::new(db, provider, secret(), tx))
    }

    fn setup_dev(
        responses: Vec<MockResponse>,
    ) -> (Arc<HandlerState>, broadcast::Receiver<DiagnosticEvent>) {
        let db = Database::in_memory().unwrap();
        let provider = Arc::new(MockProvider::new(responses));
        let (tx, rx) = diagnostics::channel();
        let state = HandlerState::new(db, provider, secret(), tx).with_dev_mode(true);
        (Arc::new(state), rx)
    }

    async fn signup(state: &Arc<HandlerState>, email: &str) -> String {
        let resp = dispatch(
            state,
            "auth.signup",
            &serde_json::json!({"email": email, "password": "contraseña123"}),
            Some(serde_json::json!(1)),
        )
        .await;
        assert!(resp.error.is_none(), "signup failed: {:?}", resp.error);
        resp.result.unwrap()["token"].as_str().unwrap().to_string()
    }

    async fn signup_admin(state: &Arc<HandlerState>, email: &str) -> String {
        let resp = dispatch(
            state,
            "auth.signup",
            &serde_json::json!({"email": email, "password": "contraseña123"}),
            Some(serde_json::json!(1)),
        )
        .await;
        let result = resp.result.unwrap();
        let user_id = UserId::from_raw(result["user"]["id"].as_str().unwrap());
        UserRepo::new(state.db.clone()).set_admin(&user_id, true).unwrap();
        result["token"].as_str().unwrap().to_string()
    }

    // ── Dispatch ──

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let state = setup(vec![]);
        let resp = dispatch(&state, "foo.bar", &serde_json::json!({}), None).await;
        assert_eq!(resp.error.unwrap().code, "METHOD_NOT_FOUND");
    }

    #[tokio::test]
    async fn ping_needs_no_auth() {
        let state = setup(vec![]);
        let resp = dispatch(&state, "system.ping", &serde_json::json!({}), None).await;
        assert_eq!(resp.result.unwrap()["pong"], true);
    }

    #[tokio::test]
    async fn health_reports_database_component() {
        let state = setup(vec![]);
        let resp = dispatch(&state, "health", &serde_json::json!({}), None).await;
        let result = resp.result.unwrap();
        assert_eq!(result["status"], "healthy");
        assert_eq!(result["components"]["database"], "ok");
    }

    // ── Auth ──

    #[tokio::test]
    async fn signup_returns_token_and_user() {
        let state = setup(vec![]);
        let resp = dispatch(
            &state,
            "auth.signup",
            &serde_json::json!({
                "email": "ana@example.com",
                "password": "contraseña123",
                "display_name": "Ana",
            }),
            Some(serde_json::json!(1)),
        )
        .await;
        let result = resp.result.unwrap();
        assert!(result["token"].is_string());
        assert_eq!(result["user"]["email"], "ana@example.com");
        assert_eq!(result["user"]["display_name"], "Ana");
        // The argon2 hash must never appear on the wire.
        assert!(result["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn signup_normalizes_email() {
        let state = setup(vec![]);
        signup(&state, "  ANA@Example.COM  ").await;

        let resp = dispatch(
            &state,
            "auth.login",
            &serde_json::json!({"email": "ana@example.com", "password": "contraseña123"}),
            None,
        )
        .await;
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn signup_rejects_short_password() {
        let state = setup(vec![]);
        let resp = dispatch(
            &state,
            "auth.signup",
            &serde_json::json!({"email": "ana@example.com", "password": "corta"}),
            None,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let state = setup(vec![]);
        signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "auth.signup",
            &serde_json::json!({"email": "ana@example.com", "password": "contraseña123"}),
            None,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "CONFLICT");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = setup(vec![]);
        signup(&state, "ana@example.com").await;

        let wrong_password = dispatch(
            &state,
            "auth.login",
            &serde_json::json!({"email": "ana@example.com", "password": "incorrecta1"}),
            None,
        )
        .await;
        let unknown_email = dispatch(
            &state,
            "auth.login",
            &serde_json::json!({"email": "nadie@example.com", "password": "contraseña123"}),
            None,
        )
        .await;

        let a = wrong_password.error.unwrap();
        let b = unknown_email.error.unwrap();
        assert_eq!(a.code, "UNAUTHENTICATED");
        assert_eq!(a.code, b.code);
        assert_eq!(a.message, b.message);
    }

    #[tokio::test]
    async fn auth_me_round_trip() {
        let state = setup(vec![]);
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(&state, "auth.me", &serde_json::json!({"token": token}), None).await;
        let result = resp.result.unwrap();
        assert_eq!(result["user"]["email"], "ana@example.com");
        assert_eq!(result["is_admin"], false);
    }

    #[tokio::test]
    async fn auth_me_reports_admin() {
        let state = setup(vec![]);
        let token = signup_admin(&state, "admin@example.com").await;

        let resp = dispatch(&state, "auth.me", &serde_json::json!({"token": token}), None).await;
        assert_eq!(resp.result.unwrap()["is_admin"], true);
    }

    #[tokio::test]
    async fn google_login_disabled_without_client_id() {
        let state = setup(vec![]);
        let resp = dispatch(
            &state,
            "auth.google",
            &serde_json::json!({"id_token": "algo"}),
            None,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn authenticated_methods_reject_missing_and_garbage_tokens() {
        let state = setup(vec![]);
        for method in [
            "auth.me",
            "chat.send",
            "chat.suggestions",
            "session.list",
            "session.get",
            "message.list",
            "knowledge.add",
            "knowledge.list",
            "fiscal.list",
            "fiscal.export",
        ] {
            let missing = dispatch(&state, method, &serde_json::json!({}), None).await;
            assert_eq!(
                missing.error.unwrap().code,
                "UNAUTHENTICATED",
                "method {method} without token"
            );

            let garbage = dispatch(
                &state,
                method,
                &serde_json::json!({"token": "no.un.jwt"}),
                None,
            )
            .await;
            assert_eq!(
                garbage.error.unwrap().code,
                "UNAUTHENTICATED",
                "method {method} with garbage token"
            );
        }
    }

    // ── Chat ──

    #[tokio::test]
    async fn chat_send_runs_a_full_turn() {
        let state = setup(vec![sentiment_ok(), MockResponse::reply("¡Hola!")]);
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({"token": token, "message": "Hola"}),
            Some(serde_json::json!(7)),
        )
        .await;
        let result = resp.result.unwrap();
        assert!(result["session_id"].as_str().unwrap().starts_with("sess_"));
        assert_eq!(result["reply"], "¡Hola!");
        assert_eq!(result["sentiment"], "positive (Puntuación: 0.90)");
    }

    #[tokio::test]
    async fn chat_send_rejects_empty_message() {
        let state = setup(vec![]);
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({"token": token, "message": "   "}),
            None,
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, "INVALID_PARAMS");
        assert_eq!(err.message, "El mensaje no puede estar vacío.");
    }

    #[tokio::test]
    async fn chat_send_to_foreign_session_is_denied_and_diagnosed() {
        let (state, mut rx) = setup_dev(vec![sentiment_ok(), MockResponse::reply("ok")]);
        let owner_token = signup(&state, "owner@example.com").await;
        let intruder_token = signup(&state, "intruder@example.com").await;

        let turn = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({"token": owner_token, "message": "hola"}),
            None,
        )
        .await;
        let session_id = turn.result.unwrap()["session_id"].as_str().unwrap().to_string();

        let resp = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({
                "token": intruder_token,
                "session_id": session_id,
                "message": "hola",
            }),
            None,
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, "PERMISSION_DENIED");
        assert_eq!(err.message, MSG_FORBIDDEN);

        let DiagnosticEvent::PermissionDenied { path, operation, .. } = rx.try_recv().unwrap();
        assert_eq!(path, format!("sessions/{session_id}"));
        assert_eq!(operation, "get");
    }

    #[tokio::test]
    async fn chat_send_provider_failure_is_upstream_error() {
        let state = setup(vec![
            sentiment_ok(),
            MockResponse::Error(conecta_core::errors::GatewayError::ProviderOverloaded),
        ]);
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({"token": token, "message": "hola"}),
            None,
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, "UPSTREAM_ERROR");
        assert_eq!(err.message, "No se pudo obtener una respuesta de la IA.");
    }

    #[tokio::test]
    async fn chat_suggestions_caps_at_four() {
        let state = setup(vec![MockResponse::json(serde_json::json!({
            "messages": ["uno", "dos", "tres", "cuatro", "cinco"]
        }))]);
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "chat.suggestions",
            &serde_json::json!({"token": token}),
            None,
        )
        .await;
        let suggestions = resp.result.unwrap()["suggestions"].as_array().unwrap().clone();
        assert_eq!(suggestions.len(), 4);
    }

    #[tokio::test]
    async fn chat_suggestions_failure_is_upstream_error() {
        let state = setup(vec![MockResponse::Error(
            conecta_core::errors::GatewayError::Timeout(std::time::Duration::from_secs(30)),
        )]);
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "chat.suggestions",
            &serde_json::json!({"token": token}),
            None,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "UPSTREAM_ERROR");
    }

    // ── Sessions & messages ──

    #[tokio::test]
    async fn session_list_and_get() {
        let state = setup(vec![sentiment_ok(), MockResponse::reply("ok")]);
        let token = signup(&state, "ana@example.com").await;

        let turn = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({"token": token, "message": "Hola, ¿dónde voto?"}),
            None,
        )
        .await;
        let session_id = turn.result.unwrap()["session_id"].as_str().unwrap().to_string();

        let list = dispatch(&state, "session.list", &serde_json::json!({"token": token}), None).await;
        let sessions = list.result.unwrap()["sessions"].as_array().unwrap().clone();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["id"], session_id.as_str());

        let get = dispatch(
            &state,
            "session.get",
            &serde_json::json!({"token": token, "session_id": session_id}),
            None,
        )
        .await;
        let session = get.result.unwrap()["session"].clone();
        assert_eq!(session["message_count"], 2);
        assert_eq!(session["last_message"], "Hola, ¿dónde voto?");
    }

    #[tokio::test]
    async fn session_get_foreign_is_denied() {
        let state = setup(vec![sentiment_ok(), MockResponse::reply("ok")]);
        let owner = signup(&state, "owner@example.com").await;
        let intruder = signup(&state, "intruder@example.com").await;

        let turn = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({"token": owner, "message": "hola"}),
            None,
        )
        .await;
        let session_id = turn.result.unwrap()["session_id"].as_str().unwrap().to_string();

        let resp = dispatch(
            &state,
            "session.get",
            &serde_json::json!({"token": intruder, "session_id": session_id}),
            None,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn message_list_in_sequence_order() {
        let state = setup(vec![sentiment_ok(), MockResponse::reply("Con tu DNI.")]);
        let token = signup(&state, "ana@example.com").await;

        let turn = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({"token": token, "message": "¿Qué llevo para votar?"}),
            None,
        )
        .await;
        let session_id = turn.result.unwrap()["session_id"].as_str().unwrap().to_string();

        let resp = dispatch(
            &state,
            "message.list",
            &serde_json::json!({"token": token, "session_id": session_id}),
            None,
        )
        .await;
        let messages = resp.result.unwrap()["messages"].as_array().unwrap().clone();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["sequence"], 1);
        assert_eq!(messages[1]["role"], "model");
        assert_eq!(messages[1]["content"], "Con tu DNI.");
    }

    #[tokio::test]
    async fn message_list_foreign_session_is_denied() {
        let state = setup(vec![sentiment_ok(), MockResponse::reply("ok")]);
        let owner = signup(&state, "owner@example.com").await;
        let intruder = signup(&state, "intruder@example.com").await;

        let turn = dispatch(
            &state,
            "chat.send",
            &serde_json::json!({"token": owner, "message": "hola"}),
            None,
        )
        .await;
        let session_id = turn.result.unwrap()["session_id"].as_str().unwrap().to_string();

        let resp = dispatch(
            &state,
            "message.list",
            &serde_json::json!({"token": intruder, "session_id": session_id}),
            None,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "PERMISSION_DENIED");
    }

    // ── Knowledge ──

    #[tokio::test]
    async fn knowledge_add_requires_admin_and_diagnoses() {
        let (state, mut rx) = setup_dev(vec![]);
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "knowledge.add",
            &serde_json::json!({"token": token, "name": "reglas", "content": "texto"}),
            None,
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, "PERMISSION_DENIED");
        assert_eq!(err.message, MSG_FORBIDDEN);

        let DiagnosticEvent::PermissionDenied { path, operation, user_id, .. } =
            rx.try_recv().unwrap();
        assert_eq!(path, "knowledgeSources");
        assert_eq!(operation, "create");
        assert!(user_id.unwrap().starts_with("usr_"));
    }

    #[tokio::test]
    async fn denial_emits_nothing_outside_dev_mode() {
        let db = Database::in_memory().unwrap();
        let provider = Arc::new(MockProvider::new(vec![]));
        let (tx, mut rx) = diagnostics::channel();
        let state = Arc::new(HandlerState::new(db, provider, secret(), tx));
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "knowledge.add",
            &serde_json::json!({"token": token, "name": "reglas", "content": "texto"}),
            None,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "PERMISSION_DENIED");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn knowledge_add_without_content_or_url_is_rejected() {
        let state = setup(vec![]);
        let token = signup_admin(&state, "admin@example.com").await;

        let resp = dispatch(
            &state,
            "knowledge.add",
            &serde_json::json!({"token": token, "name": "reglas"}),
            None,
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, "INVALID_PARAMS");
        assert_eq!(
            err.message,
            "El nombre es obligatorio y debes proporcionar contenido o una URL."
        );

        // Nothing was written.
        let list = dispatch(&state, "knowledge.list", &serde_json::json!({"token": token}), None).await;
        assert!(list.result.unwrap()["sources"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn knowledge_add_and_list() {
        let state = setup(vec![]);
        let admin = signup_admin(&state, "admin@example.com").await;
        let user = signup(&state, "ana@example.com").await;

        let resp = dispatch(
            &state,
            "knowledge.add",
            &serde_json::json!({"token": admin, "name": "reglas", "content": "Se vota con DNI."}),
            None,
        )
        .await;
        let result = resp.result.unwrap();
        assert_eq!(result["message"], MSG_KNOWLEDGE_ADDED);
        assert!(result["source"]["id"].as_str().unwrap().starts_with("ks_"));

        // Any authenticated user can read the list.
        let list = dispatch(&state, "knowledge.list", &serde_json::json!({"token": user}), None).await;
        let sources = list.result.unwrap()["sources"].as_array().unwrap().clone();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["name"], "reglas");
    }

    #[tokio::test]
    async fn knowledge_add_pdf_rejects_garbage() {
        let state = setup(vec![]);
        let token = signup_admin(&state, "admin@example.com").await;

        let encoded = base64::engine::general_purpose::STANDARD.encode(b"no es un pdf");
        let resp = dispatch(
            &state,
            "knowledge.add_pdf",
            &serde_json::json!({"token": token, "name": "folleto", "pdf_base64": encoded}),
            None,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "INVALID_PARAMS");

        let list = dispatch(&state, "knowledge.list", &serde_json::json!({"token": token}), None).await;
        assert!(list.result.unwrap()["sources"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn knowledge_delete_admin_only() {
        let state = setup(vec![]);
        let admin = signup_admin(&state, "admin@example.com").await;
        let user = signup(&state, "ana@example.com").await;

        let added = dispatch(
            &state,
            "knowledge.add",
            &serde_json::json!({"token": admin, "name": "reglas", "content": "texto"}),
            None,
        )
        .await;
        let source_id = added.result.unwrap()["source"]["id"].as_str().unwrap().to_string();

        let denied = dispatch(
            &state,
            "knowledge.delete",
            &serde_json::json!({"token": user, "source_id": source_id}),
            None,
        )
        .await;
        assert_eq!(denied.error.unwrap().code, "PERMISSION_DENIED");

        let resp = dispatch(
            &state,
            "knowledge.delete",
            &serde_json::json!({"token": admin, "source_id": source_id}),
            None,
        )
        .await;
        assert!(resp.error.is_none());

        let again = dispatch(
            &state,
            "knowledge.delete",
            &serde_json::json!({"token": admin, "source_id": source_id}),
            None,
        )
        .await;
        assert_eq!(again.error.unwrap().code, "NOT_FOUND");
    }

    // ── Fiscales ──

    fn fiscal_params(token: &str) -> serde_json::Value {
        serde_json::json!({
            "token": token,
            "full_name": "García, Ana",
            "dni": "30123456",
            "role": "general",
            "school": "Escuela 5",
            "mesa": "0",
            "phone": "1155551234",
        })
    }

    #[tokio::test]
    async fn fiscal_add_and_list() {
        let state = setup(vec![]);
        let token = signup_admin(&state, "admin@example.com").await;

        let resp = dispatch(&state, "fiscal.add", &fiscal_params(&token), None).await;
        let fiscal = resp.result.unwrap()["fiscal"].clone();
        assert!(fiscal["id"].as_str().unwrap().starts_with("fsc_"));
        assert_eq!(fiscal["role"], "general");

        let list = dispatch(&state, "fiscal.list", &serde_json::json!({"token": token}), None).await;
        assert_eq!(list.result.unwrap()["fiscales"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fiscal_add_rejects_blank_fields_and_bad_role() {
        let state = setup(vec![]);
        let token = signup_admin(&state, "admin@example.com").await;

        let mut blank = fiscal_params(&token);
        blank["dni"] = serde_json::json!("   ");
        let resp = dispatch(&state, "fiscal.add", &blank, None).await;
        assert_eq!(resp.error.unwrap().code, "INVALID_PARAMS");

        let mut bad_role = fiscal_params(&token);
        bad_role["role"] = serde_json::json!("presidente");
        let resp = dispatch(&state, "fiscal.add", &bad_role, None).await;
        assert_eq!(resp.error.unwrap().code, "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn fiscal_roster_is_admin_only() {
        let (state, mut rx) = setup_dev(vec![]);
        let token = signup(&state, "ana@example.com").await;

        let resp = dispatch(&state, "fiscal.add", &fiscal_params(&token), None).await;
        assert_eq!(resp.error.unwrap().code, "PERMISSION_DENIED");

        let DiagnosticEvent::PermissionDenied { path, operation, .. } = rx.try_recv().unwrap();
        assert_eq!(path, "fiscales");
        assert_eq!(operation, "create");
    }

    #[tokio::test]
    async fn fiscal_import_counts_imported_and_skipped() {
        let state = setup(vec![]);
        let token = signup_admin(&state, "admin@example.com").await;

        let data = "García Ana,30123456,general,Escuela 5,0,1155551234\n\
                    fila,mala\n\
                    Pérez Juan,27999888,mesa,Escuela 9,12,1155550000\n\
                    Sin Teléfono,28000111,mesa,Escuela 2,4,";
        let resp = dispatch(
            &state,
            "fiscal.import",
            &serde_json::json!({"token": token, "data": data}),
            None,
        )
        .await;
        let result = resp.result.unwrap();
        assert_eq!(result["imported"], 2);
        assert_eq!(result["skipped"], 2);

        // Only well-shaped rows landed in the roster.
        let list = dispatch(&state, "fiscal.list", &serde_json::json!({"token": token}), None).await;
        let fiscales = list.result.unwrap()["fiscales"].as_array().unwrap().clone();
        assert_eq!(fiscales.len(), 2);
    }

    #[tokio::test]
    async fn fiscal_export_round_trip() {
        let state = setup(vec![]);
        let token = signup_admin(&state, "admin@example.com").await;
        dispatch(&state, "fiscal.add", &fiscal_params(&token), None).await;

        let resp = dispatch(&state, "fiscal.export", &serde_json::json!({"token": token}), None).await;
        let csv = resp.result.unwrap()["csv"].as_str().unwrap().to_string();
        assert!(csv.starts_with("Apellido y Nombre,DNI,Rol,Escuela,Mesa,Telefono"));
        assert!(csv.contains("30123456"));
    }

    #[tokio::test]
    async fn fiscal_delete_removes_row() {
        let state = setup(vec![]);
        let token = signup_admin(&state, "admin@example.com").await;

        let added = dispatch(&state, "fiscal.add", &fiscal_params(&token), None).await;
        let fiscal_id = added.result.unwrap()["fiscal"]["id"].as_str().unwrap().to_string();

        let resp = dispatch(
            &state,
            "fiscal.delete",
            &serde_json::json!({"token": token, "fiscal_id": fiscal_id}),
            None,
        )
        .await;
        assert!(resp.error.is_none());

        let list = dispatch(&state, "fiscal.list", &serde_json::json!({"token": token}), None).await;
        assert!(list.result.unwrap()["fiscales"].as_array().unwrap().is_empty());
    }
}
