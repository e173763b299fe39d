//! Session and view-state controller for the personas client.
//!
//! One [`SessionController`] owns the whole application state: whether the
//! user is authenticated, which screen is current, the in-progress form
//! drafts, the last fetched record, the chat transcript and the transient
//! status message. User actions are methods; each one validates first,
//! talks to the [`backend::PersonasGateway`] if validation passes, and
//! applies the outcome to the state.
//!
//! The state lives behind a mutex so overlapping calls are possible and
//! guarded: the `loading` flag rejects duplicate submissions of an
//! in-flight action, and responses arriving after the user navigated away
//! are discarded by comparing a navigation generation counter captured
//! before the request was issued.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Utc;
use shared::domain::{LogEntry, LogFilter, Person, PersonDraft, PersonPatch, PhotoUpload};
use shared::protocol::{LoginRequest, SignupRequest, VerifyEmailRequest};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use validation::{FieldName, ValidationErrorMap, ValidationPolicy};

use crate::backend::PersonasGateway;

pub mod backend;

/// How long a status message stays visible. Replacing the message restarts
/// the window; the expiry is independent of any in-flight request.
pub const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(5);

const CHAT_FAILURE_REPLY: &str = "No fue posible obtener una respuesta. Intente de nuevo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Exito,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
    set_at: Instant,
}

impl StatusMessage {
    fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            text: text.into(),
            kind,
            set_at: Instant::now(),
        }
    }

    pub fn expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.set_at) >= STATUS_MESSAGE_TTL
    }

    pub fn is_expired(&self) -> bool {
        self.expired_at(Instant::now())
    }
}

/// Every screen the client can show, matched exhaustively wherever the
/// current view matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Landing,
    Login,
    Signup,
    AwaitingVerification { email: String },
    Menu,
    Create,
    Query,
    Modify,
    Delete,
    Logs,
    Chat,
}

/// Tiles on the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Crear,
    Consultar,
    Modificar,
    Eliminar,
    Logs,
    Chat,
}

impl MenuAction {
    fn screen(self) -> Screen {
        match self {
            MenuAction::Crear => Screen::Create,
            MenuAction::Consultar => Screen::Query,
            MenuAction::Modificar => Screen::Modify,
            MenuAction::Eliminar => Screen::Delete,
            MenuAction::Logs => Screen::Logs,
            MenuAction::Chat => Screen::Chat,
        }
    }
}

/// One message in the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub text: String,
    pub is_user: bool,
}

impl ChatTurn {
    fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
        }
    }

    fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
        }
    }
}

#[derive(Debug)]
struct AppState {
    auth_token: Option<String>,
    user_email: Option<String>,
    screen: Screen,
    loading: bool,
    /// Bumped on every transition; responses captured under an older value
    /// are dropped instead of applied.
    generation: u64,
    status: Option<StatusMessage>,
    create_draft: PersonDraft,
    create_errors: ValidationErrorMap,
    signup_errors: ValidationErrorMap,
    search_doc: String,
    queried: Option<Person>,
    pending_delete: bool,
    patch: PersonPatch,
    patch_errors: ValidationErrorMap,
    log_filter: LogFilter,
    logs: Vec<LogEntry>,
    transcript: Vec<ChatTurn>,
    pending_questions: VecDeque<String>,
    awaiting_chat_reply: bool,
    /// Bumped only when the conversation is wiped (logout or explicit
    /// clear), so late replies for a dead conversation are dropped while
    /// replies that merely outlived a navigation still land.
    chat_epoch: u64,
}

impl AppState {
    fn new() -> Self {
        Self {
            auth_token: None,
            user_email: None,
            screen: Screen::Landing,
            loading: false,
            generation: 0,
            status: None,
            create_draft: PersonDraft::default(),
            create_errors: ValidationErrorMap::default(),
            signup_errors: ValidationErrorMap::default(),
            search_doc: String::new(),
            queried: None,
            pending_delete: false,
            patch: PersonPatch::default(),
            patch_errors: ValidationErrorMap::default(),
            log_filter: LogFilter::default(),
            logs: Vec::new(),
            transcript: Vec::new(),
            pending_questions: VecDeque::new(),
            awaiting_chat_reply: false,
            chat_epoch: 0,
        }
    }
}

fn set_status(state: &mut AppState, text: impl Into<String>, kind: StatusKind) {
    state.status = Some(StatusMessage::new(text, kind));
}

/// Drop everything scoped to a single screen. Drafts, lookups and log
/// results are mutually exclusive per screen, so they reset together.
fn reset_screen_data(state: &mut AppState) {
    state.create_draft = PersonDraft::default();
    state.create_errors.clear();
    state.signup_errors.clear();
    state.search_doc.clear();
    state.queried = None;
    state.pending_delete = false;
    state.patch = PersonPatch::default();
    state.patch_errors.clear();
    state.log_filter = LogFilter::default();
    state.logs.clear();
}

fn transition(state: &mut AppState, screen: Screen) {
    state.generation = state.generation.wrapping_add(1);
    reset_screen_data(state);
    debug!(from = ?state.screen, to = ?screen, "cambio de pantalla");
    state.screen = screen;
}

/// Aggregate status for a failed form validation: the original UI shows a
/// generic "missing fields" message when something required is absent, and
/// the first concrete reason otherwise.
fn validation_status(errors: &ValidationErrorMap) -> String {
    if errors.contains_requerido() {
        "Complete todos los campos".to_string()
    } else {
        errors
            .first_message()
            .unwrap_or_else(|| "Por favor corrija los errores en el formulario".to_string())
    }
}

pub struct SessionController<G> {
    gateway: G,
    policy: ValidationPolicy,
    state: Mutex<AppState>,
}

impl<G: PersonasGateway> SessionController<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_policy(gateway, ValidationPolicy::latest())
    }

    pub fn with_policy(gateway: G, policy: ValidationPolicy) -> Self {
        Self {
            gateway,
            policy,
            state: Mutex::new(AppState::new()),
        }
    }

    // ----- navigation -------------------------------------------------

    pub async fn go_to_login(&self) {
        let mut state = self.state.lock().await;
        if state.auth_token.is_some() {
            warn!("navegación a login ignorada: ya hay sesión activa");
            return;
        }
        transition(&mut state, Screen::Login);
    }

    pub async fn go_to_signup(&self) {
        let mut state = self.state.lock().await;
        if state.auth_token.is_some() {
            warn!("navegación a registro ignorada: ya hay sesión activa");
            return;
        }
        transition(&mut state, Screen::Signup);
    }

    pub async fn open_screen(&self, action: MenuAction) {
        let mut state = self.state.lock().await;
        if state.auth_token.is_none() {
            warn!(?action, "acción de menú ignorada sin sesión");
            return;
        }
        transition(&mut state, action.screen());
    }

    /// Back control of every authenticated screen: returns to the menu and
    /// clears that screen's draft/lookup state.
    pub async fn back_to_menu(&self) {
        let mut state = self.state.lock().await;
        if state.auth_token.is_none() {
            return;
        }
        transition(&mut state, Screen::Menu);
    }

    /// Clears the session and everything derived from it.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        state.auth_token = None;
        state.user_email = None;
        state.transcript.clear();
        state.pending_questions.clear();
        state.awaiting_chat_reply = false;
        state.chat_epoch = state.chat_epoch.wrapping_add(1);
        transition(&mut state, Screen::Landing);
        info!("sesión cerrada");
    }

    // ----- authentication ---------------------------------------------

    pub async fn submit_login(&self, email: &str, password: &str) {
        let generation = {
            let mut state = self.state.lock().await;
            if state.loading {
                debug!("login ignorado: ya hay una solicitud en curso");
                return;
            }
            let errors = validation::validate_login(email, password);
            if !errors.is_empty() {
                let text = validation_status(&errors);
                set_status(&mut state, text, StatusKind::Error);
                return;
            }
            state.loading = true;
            state.generation
        };

        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let result = self.gateway.login(&request).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        if state.generation != generation {
            debug!("respuesta de login descartada: la vista cambió");
            return;
        }
        match result {
            Ok(response) => {
                state.auth_token = Some(response.access_token);
                state.user_email = Some(request.email.clone());
                transition(&mut state, Screen::Menu);
                set_status(&mut state, "Login exitoso", StatusKind::Exito);
                info!(email = %request.email, "sesión iniciada");
            }
            Err(err) => {
                warn!(error = %err, "login rechazado");
                set_status(
                    &mut state,
                    err.user_message("Credenciales inválidas"),
                    StatusKind::Error,
                );
            }
        }
    }

    pub async fn submit_signup(&self, name: &str, email: &str, password: &str) {
        let generation = {
            let mut state = self.state.lock().await;
            if state.loading {
                debug!("registro ignorado: ya hay una solicitud en curso");
                return;
            }
            let errors = validation::validate_signup(name, email, password, &self.policy);
            if !errors.is_empty() {
                let text = validation_status(&errors);
                state.signup_errors = errors;
                set_status(&mut state, text, StatusKind::Error);
                return;
            }
            state.signup_errors.clear();
            state.loading = true;
            state.generation
        };

        let request = SignupRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            name: name.trim().to_string(),
        };
        let result = self.gateway.signup(&request).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        if state.generation != generation {
            debug!("respuesta de registro descartada: la vista cambió");
            return;
        }
        match result {
            Ok(()) => {
                transition(
                    &mut state,
                    Screen::AwaitingVerification {
                        email: request.email.clone(),
                    },
                );
                set_status(
                    &mut state,
                    "Registro exitoso. Revise su correo para obtener el código",
                    StatusKind::Exito,
                );
                info!(email = %request.email, "registro enviado");
            }
            Err(err) => {
                warn!(error = %err, "registro rechazado");
                set_status(
                    &mut state,
                    err.user_message("Error al registrarse"),
                    StatusKind::Error,
                );
            }
        }
    }

    pub async fn submit_verification_code(&self, code: &str) {
        let (email, generation) = {
            let mut state = self.state.lock().await;
            if state.loading {
                debug!("verificación ignorada: ya hay una solicitud en curso");
                return;
            }
            let Screen::AwaitingVerification { email } = &state.screen else {
                warn!("código de verificación fuera de la pantalla de verificación");
                return;
            };
            let email = email.clone();
            let errors = validation::validate_verification_code(code);
            if !errors.is_empty() {
                let text = validation_status(&errors);
                set_status(&mut state, text, StatusKind::Error);
                return;
            }
            state.loading = true;
            (email, state.generation)
        };

        let request = VerifyEmailRequest {
            email,
            code: code.trim().to_string(),
        };
        let result = self.gateway.verify_email(&request).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        if state.generation != generation {
            debug!("respuesta de verificación descartada: la vista cambió");
            return;
        }
        match result {
            Ok(()) => {
                transition(&mut state, Screen::Login);
                set_status(
                    &mut state,
                    "Correo verificado. Inicie sesión",
                    StatusKind::Exito,
                );
            }
            Err(err) => {
                warn!(error = %err, "verificación rechazada");
                set_status(
                    &mut state,
                    err.user_message("Código inválido"),
                    StatusKind::Error,
                );
            }
        }
    }

    // ----- create -----------------------------------------------------

    pub async fn set_create_field(&self, field: FieldName, value: &str) {
        let mut state = self.state.lock().await;
        let draft = &mut state.create_draft;
        match field {
            FieldName::PrimerNombre => draft.primer_nombre = value.to_string(),
            FieldName::SegundoNombre => draft.segundo_nombre = value.to_string(),
            FieldName::Apellidos => draft.apellidos = value.to_string(),
            FieldName::FechaNacimiento => draft.fecha_nacimiento = value.to_string(),
            FieldName::Genero => draft.genero = value.to_string(),
            FieldName::Correo => draft.correo = value.to_string(),
            FieldName::Celular => draft.celular = value.to_string(),
            FieldName::NroDoc => draft.nro_doc = value.to_string(),
            FieldName::TipoDoc => draft.tipo_doc = value.to_string(),
            other => debug!(field = %other, "campo ignorado en el borrador de creación"),
        }
    }

    pub async fn attach_create_photo(&self, photo: PhotoUpload) {
        let mut state = self.state.lock().await;
        state.create_draft.foto = Some(photo);
    }

    pub async fn clear_create_photo(&self) {
        let mut state = self.state.lock().await;
        state.create_draft.foto = None;
    }

    pub async fn submit_create(&self) {
        let (token, payload, generation) = {
            let mut state = self.state.lock().await;
            if state.loading {
                debug!("creación ignorada: ya hay una solicitud en curso");
                return;
            }
            let Some(token) = state.auth_token.clone() else {
                warn!("creación ignorada sin sesión");
                return;
            };
            let today = Utc::now().date_naive();
            let errors = validation::validate_create_form(&state.create_draft, &self.policy, today);
            if !errors.is_empty() {
                warn!(campos = errors.len(), "creación bloqueada por validación");
                state.create_errors = errors;
                set_status(
                    &mut state,
                    "Por favor corrija los errores en el formulario",
                    StatusKind::Error,
                );
                return;
            }
            state.create_errors.clear();
            state.loading = true;
            (token, state.create_draft.to_record(), state.generation)
        };

        let result = self.gateway.create_person(&token, &payload).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        if state.generation != generation {
            debug!("respuesta de creación descartada: la vista cambió");
            return;
        }
        match result {
            Ok(()) => {
                state.create_draft = PersonDraft::default();
                set_status(&mut state, "Persona creada exitosamente", StatusKind::Exito);
                info!(nro_doc = %payload.nro_doc, "persona creada");
            }
            Err(err) => {
                warn!(error = %err, "creación rechazada");
                set_status(
                    &mut state,
                    err.user_message("Error al crear persona"),
                    StatusKind::Error,
                );
            }
        }
    }

    // ----- lookup sub-flow (query / modify / delete) -------------------

    /// Search phase shared by the query, modify and delete screens. A new
    /// search resets the result phase.
    pub async fn search_person(&self, nro_doc: &str) {
        let (token, doc, generation) = {
            let mut state = self.state.lock().await;
            if state.loading {
                debug!("consulta ignorada: ya hay una solicitud en curso");
                return;
            }
            let Some(token) = state.auth_token.clone() else {
                warn!("consulta ignorada sin sesión");
                return;
            };
            let doc = nro_doc.trim().to_string();
            if doc.is_empty() {
                set_status(
                    &mut state,
                    "Ingrese un número de documento",
                    StatusKind::Error,
                );
                return;
            }
            if let Err(err) = validation::documento(&doc, self.policy.documento) {
                set_status(&mut state, err.to_string(), StatusKind::Error);
                return;
            }
            state.queried = None;
            state.pending_delete = false;
            state.patch = PersonPatch::default();
            state.patch_errors.clear();
            state.search_doc = doc.clone();
            state.loading = true;
            (token, doc, state.generation)
        };

        let result = self.gateway.fetch_person(&token, &doc).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        if state.generation != generation {
            debug!("respuesta de consulta descartada: la vista cambió");
            return;
        }
        match result {
            Ok(Some(person)) => {
                state.queried = Some(person);
                set_status(&mut state, "Persona encontrada", StatusKind::Exito);
            }
            Ok(None) => {
                state.queried = None;
                set_status(&mut state, "Persona no encontrada", StatusKind::Error);
            }
            Err(err) => {
                warn!(error = %err, nro_doc = %doc, "consulta rechazada");
                state.queried = None;
                set_status(
                    &mut state,
                    err.user_message("Persona no encontrada"),
                    StatusKind::Error,
                );
            }
        }
    }

    /// Returns to the search phase without leaving the screen.
    pub async fn reset_search(&self) {
        let mut state = self.state.lock().await;
        state.generation = state.generation.wrapping_add(1);
        state.search_doc.clear();
        state.queried = None;
        state.pending_delete = false;
        state.patch = PersonPatch::default();
        state.patch_errors.clear();
    }

    // ----- modify ------------------------------------------------------

    pub async fn set_patch_field(&self, field: FieldName, value: &str) {
        let mut state = self.state.lock().await;
        let patch = &mut state.patch;
        let value = Some(value.to_string());
        match field {
            FieldName::PrimerNombre => patch.primer_nombre = value,
            FieldName::SegundoNombre => patch.segundo_nombre = value,
            FieldName::Apellidos => patch.apellidos = value,
            FieldName::FechaNacimiento => patch.fecha_nacimiento = value,
            FieldName::Genero => patch.genero = value,
            FieldName::Correo => patch.correo = value,
            FieldName::Celular => patch.celular = value,
            FieldName::TipoDoc => patch.tipo_doc = value,
            other => debug!(field = %other, "campo no modificable ignorado"),
        }
    }

    /// Reverts a field to untouched, so it is neither validated nor sent.
    pub async fn clear_patch_field(&self, field: FieldName) {
        let mut state = self.state.lock().await;
        let patch = &mut state.patch;
        match field {
            FieldName::PrimerNombre => patch.primer_nombre = None,
            FieldName::SegundoNombre => patch.segundo_nombre = None,
            FieldName::Apellidos => patch.apellidos = None,
            FieldName::FechaNacimiento => patch.fecha_nacimiento = None,
            FieldName::Genero => patch.genero = None,
            FieldName::Correo => patch.correo = None,
            FieldName::Celular => patch.celular = None,
            FieldName::TipoDoc => patch.tipo_doc = None,
            FieldName::Foto => patch.foto = None,
            other => debug!(field = %other, "campo no modificable ignorado"),
        }
    }

    pub async fn attach_patch_photo(&self, photo: PhotoUpload) {
        let mut state = self.state.lock().await;
        state.patch.foto = Some(photo);
    }

    pub async fn submit_modify(&self) {
        let (token, doc, update, generation) = {
            let mut state = self.state.lock().await;
            if state.loading {
                debug!("modificación ignorada: ya hay una solicitud en curso");
                return;
            }
            let Some(token) = state.auth_token.clone() else {
                warn!("modificación ignorada sin sesión");
                return;
            };
            if state.queried.is_none() {
                warn!("modificación ignorada: no hay persona consultada");
                return;
            }
            if state.patch.is_empty() {
                set_status(&mut state, "No hay cambios para guardar", StatusKind::Error);
                return;
            }
            let today = Utc::now().date_naive();
            let errors = validation::validate_patch(&state.patch, &self.policy, today);
            if !errors.is_empty() {
                warn!(campos = errors.len(), "modificación bloqueada por validación");
                state.patch_errors = errors;
                set_status(
                    &mut state,
                    "Por favor corrija los errores en el formulario",
                    StatusKind::Error,
                );
                return;
            }
            state.patch_errors.clear();
            state.loading = true;
            (
                token,
                state.search_doc.clone(),
                state.patch.to_update(),
                state.generation,
            )
        };

        let result = self.gateway.update_person(&token, &doc, &update).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        if state.generation != generation {
            debug!("respuesta de modificación descartada: la vista cambió");
            return;
        }
        match result {
            Ok(()) => {
                state.patch = PersonPatch::default();
                state.queried = None;
                state.search_doc.clear();
                set_status(
                    &mut state,
                    "Persona modificada exitosamente",
                    StatusKind::Exito,
                );
                info!(nro_doc = %doc, "persona modificada");
            }
            Err(err) => {
                warn!(error = %err, nro_doc = %doc, "modificación rechazada");
                set_status(
                    &mut state,
                    err.user_message("Error al modificar"),
                    StatusKind::Error,
                );
            }
        }
    }

    // ----- delete ------------------------------------------------------

    /// First step of the delete flow: asks for confirmation. Nothing is
    /// sent until [`Self::confirm_delete`] runs.
    pub async fn request_delete(&self) {
        let mut state = self.state.lock().await;
        if state.queried.is_none() {
            warn!("eliminación ignorada: no hay persona consultada");
            return;
        }
        state.pending_delete = true;
    }

    /// Declining the confirmation leaves every other piece of state as-is.
    pub async fn decline_delete(&self) {
        let mut state = self.state.lock().await;
        state.pending_delete = false;
    }

    pub async fn confirm_delete(&self) {
        let (token, doc, generation) = {
            let mut state = self.state.lock().await;
            if state.loading {
                debug!("eliminación ignorada: ya hay una solicitud en curso");
                return;
            }
            let Some(token) = state.auth_token.clone() else {
                warn!("eliminación ignorada sin sesión");
                return;
            };
            if !state.pending_delete || state.queried.is_none() {
                warn!("eliminación ignorada: falta la confirmación");
                return;
            }
            state.loading = true;
            (token, state.search_doc.clone(), state.generation)
        };

        let result = self.gateway.delete_person(&token, &doc).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        if state.generation != generation {
            debug!("respuesta de eliminación descartada: la vista cambió");
            return;
        }
        match result {
            Ok(()) => {
                state.queried = None;
                state.search_doc.clear();
                state.pending_delete = false;
                set_status(
                    &mut state,
                    "Persona eliminada exitosamente",
                    StatusKind::Exito,
                );
                info!(nro_doc = %doc, "persona eliminada");
            }
            Err(err) => {
                warn!(error = %err, nro_doc = %doc, "eliminación rechazada");
                state.pending_delete = false;
                set_status(
                    &mut state,
                    err.user_message("Error al eliminar"),
                    StatusKind::Error,
                );
            }
        }
    }

    // ----- logs --------------------------------------------------------

    pub async fn fetch_logs(&self, filter: LogFilter) {
        let (token, generation) = {
            let mut state = self.state.lock().await;
            if state.loading {
                debug!("consulta de logs ignorada: ya hay una solicitud en curso");
                return;
            }
            let Some(token) = state.auth_token.clone() else {
                warn!("consulta de logs ignorada sin sesión");
                return;
            };
            state.log_filter = filter.clone();
            state.loading = true;
            (token, state.generation)
        };

        let result = self.gateway.fetch_logs(&token, &filter).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        if state.generation != generation {
            debug!("respuesta de logs descartada: la vista cambió");
            return;
        }
        match result {
            Ok(entries) => {
                let encontrados = entries.len();
                state.logs = entries;
                set_status(
                    &mut state,
                    format!("Se encontraron {encontrados} registros"),
                    StatusKind::Exito,
                );
            }
            Err(err) => {
                warn!(error = %err, "consulta de logs rechazada");
                state.logs.clear();
                set_status(
                    &mut state,
                    err.user_message("Error al consultar logs"),
                    StatusKind::Error,
                );
            }
        }
    }

    // ----- chat ---------------------------------------------------------

    /// Sends a natural-language question. The user turn is appended
    /// immediately; exactly one assistant turn follows per question, a
    /// canned failure line when the backend errors. Questions submitted
    /// while a reply is pending are queued and drained in order, so the
    /// transcript always alternates.
    pub async fn submit_chat_question(&self, question: &str) {
        let question = question.trim().to_string();
        if question.is_empty() {
            return;
        }
        let (token, epoch) = {
            let mut state = self.state.lock().await;
            let Some(token) = state.auth_token.clone() else {
                warn!("pregunta de chat ignorada sin sesión");
                return;
            };
            if state.awaiting_chat_reply {
                debug!("pregunta encolada: hay una respuesta pendiente");
                state.pending_questions.push_back(question);
                return;
            }
            state.awaiting_chat_reply = true;
            state.transcript.push(ChatTurn::user(&question));
            (token, state.chat_epoch)
        };

        let mut current = question;
        loop {
            let result = self.gateway.natural_query(&token, &current).await;

            let mut state = self.state.lock().await;
            if state.chat_epoch != epoch {
                debug!("respuesta de chat descartada: la conversación fue reiniciada");
                return;
            }
            let reply = match result {
                Ok(respuesta) => respuesta,
                Err(err) => {
                    warn!(error = %err, "consulta natural fallida");
                    CHAT_FAILURE_REPLY.to_string()
                }
            };
            state.transcript.push(ChatTurn::assistant(reply));
            match state.pending_questions.pop_front() {
                Some(next) => {
                    state.transcript.push(ChatTurn::user(&next));
                    current = next;
                }
                None => {
                    state.awaiting_chat_reply = false;
                    return;
                }
            }
        }
    }

    pub async fn clear_chat(&self) {
        let mut state = self.state.lock().await;
        state.transcript.clear();
        state.pending_questions.clear();
        state.awaiting_chat_reply = false;
        state.chat_epoch = state.chat_epoch.wrapping_add(1);
    }

    // ----- view accessors ----------------------------------------------

    pub async fn screen(&self) -> Screen {
        self.state.lock().await.screen.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.auth_token.is_some()
    }

    pub async fn auth_token(&self) -> Option<String> {
        self.state.lock().await.auth_token.clone()
    }

    pub async fn user_email(&self) -> Option<String> {
        self.state.lock().await.user_email.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    /// Current status message, if one is set and still within its
    /// five-second display window.
    pub async fn status(&self) -> Option<StatusMessage> {
        let mut state = self.state.lock().await;
        if state
            .status
            .as_ref()
            .is_some_and(StatusMessage::is_expired)
        {
            state.status = None;
        }
        state.status.clone()
    }

    pub async fn create_draft(&self) -> PersonDraft {
        self.state.lock().await.create_draft.clone()
    }

    pub async fn create_errors(&self) -> ValidationErrorMap {
        self.state.lock().await.create_errors.clone()
    }

    pub async fn signup_errors(&self) -> ValidationErrorMap {
        self.state.lock().await.signup_errors.clone()
    }

    pub async fn queried_person(&self) -> Option<Person> {
        self.state.lock().await.queried.clone()
    }

    pub async fn pending_delete(&self) -> bool {
        self.state.lock().await.pending_delete
    }

    pub async fn patch(&self) -> PersonPatch {
        self.state.lock().await.patch.clone()
    }

    pub async fn patch_errors(&self) -> ValidationErrorMap {
        self.state.lock().await.patch_errors.clone()
    }

    pub async fn log_filter(&self) -> LogFilter {
        self.state.lock().await.log_filter.clone()
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        self.state.lock().await.logs.clone()
    }

    pub async fn transcript(&self) -> Vec<ChatTurn> {
        self.state.lock().await.transcript.clone()
    }
}

#[path = "tests/lib_tests.rs"]
#[cfg(test)]
mod tests;

#[path = "tests/backend_tests.rs"]
#[cfg(test)]
mod backend_tests;
