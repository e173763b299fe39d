use super::*;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use shared::domain::{NewPerson, PersonUpdate};
use shared::protocol::LoginResponse;
use tokio::sync::Semaphore;

use crate::backend::{BackendError, BackendResult};

struct FakeGateway {
    fail_with: Option<BackendError>,
    person: Option<Person>,
    logs: Vec<LogEntry>,
    calls: Arc<StdMutex<Vec<String>>>,
    created: Arc<StdMutex<Vec<NewPerson>>>,
    updates: Arc<StdMutex<Vec<(String, PersonUpdate)>>>,
    chat_replies: StdMutex<VecDeque<BackendResult<String>>>,
    /// When set, every gateway call consumes one permit before answering,
    /// so tests control exactly when a response lands.
    gate: Option<Arc<Semaphore>>,
}

impl FakeGateway {
    fn new() -> Self {
        Self {
            fail_with: None,
            person: None,
            logs: Vec::new(),
            calls: Arc::new(StdMutex::new(Vec::new())),
            created: Arc::new(StdMutex::new(Vec::new())),
            updates: Arc::new(StdMutex::new(Vec::new())),
            chat_replies: StdMutex::new(VecDeque::new()),
            gate: None,
        }
    }

    fn failing(err: BackendError) -> Self {
        let mut fake = Self::new();
        fake.fail_with = Some(err);
        fake
    }

    fn with_person(person: Person) -> Self {
        let mut fake = Self::new();
        fake.person = Some(person);
        fake
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls").push(call.into());
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate").forget();
        }
    }

    fn outcome(&self) -> BackendResult<()> {
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PersonasGateway for FakeGateway {
    async fn login(&self, request: &shared::protocol::LoginRequest) -> BackendResult<LoginResponse> {
        self.record(format!("login:{}", request.email));
        self.wait_gate().await;
        self.outcome()?;
        Ok(LoginResponse {
            access_token: "t1".to_string(),
        })
    }

    async fn signup(&self, request: &shared::protocol::SignupRequest) -> BackendResult<()> {
        self.record(format!("signup:{}", request.email));
        self.wait_gate().await;
        self.outcome()
    }

    async fn verify_email(&self, request: &shared::protocol::VerifyEmailRequest) -> BackendResult<()> {
        self.record(format!("verify:{}:{}", request.email, request.code));
        self.wait_gate().await;
        self.outcome()
    }

    async fn create_person(&self, _token: &str, person: &NewPerson) -> BackendResult<()> {
        self.record("create");
        self.wait_gate().await;
        self.outcome()?;
        self.created.lock().expect("created").push(person.clone());
        Ok(())
    }

    async fn fetch_person(&self, _token: &str, nro_doc: &str) -> BackendResult<Option<Person>> {
        self.record(format!("fetch:{nro_doc}"));
        self.wait_gate().await;
        self.outcome()?;
        Ok(self.person.clone())
    }

    async fn update_person(
        &self,
        _token: &str,
        nro_doc: &str,
        update: &PersonUpdate,
    ) -> BackendResult<()> {
        self.record(format!("update:{nro_doc}"));
        self.wait_gate().await;
        self.outcome()?;
        self.updates
            .lock()
            .expect("updates")
            .push((nro_doc.to_string(), update.clone()));
        Ok(())
    }

    async fn delete_person(&self, _token: &str, nro_doc: &str) -> BackendResult<()> {
        self.record(format!("delete:{nro_doc}"));
        self.wait_gate().await;
        self.outcome()
    }

    async fn fetch_logs(&self, _token: &str, _filter: &LogFilter) -> BackendResult<Vec<LogEntry>> {
        self.record("logs");
        self.wait_gate().await;
        self.outcome()?;
        Ok(self.logs.clone())
    }

    async fn natural_query(&self, _token: &str, pregunta: &str) -> BackendResult<String> {
        self.record(format!("chat:{pregunta}"));
        self.wait_gate().await;
        let scripted = self.chat_replies.lock().expect("chat").pop_front();
        match scripted {
            Some(reply) => reply,
            None => {
                self.outcome()?;
                Ok(format!("R:{pregunta}"))
            }
        }
    }
}

fn persona() -> Person {
    Person {
        primer_nombre: "María".to_string(),
        segundo_nombre: None,
        apellidos: "García".to_string(),
        fecha_nacimiento: "1990-05-20".to_string(),
        genero: "Femenino".to_string(),
        correo: "maria@ejemplo.com".to_string(),
        celular: "3001234567".to_string(),
        nro_doc: "123456".to_string(),
        tipo_doc: "CC".to_string(),
        foto: None,
    }
}

fn foto_png(len: usize) -> PhotoUpload {
    PhotoUpload {
        filename: "foto.png".to_string(),
        mime_type: "image/png".to_string(),
        bytes: vec![0u8; len],
    }
}

async fn fill_valid_draft(controller: &SessionController<FakeGateway>) {
    for (field, value) in [
        (FieldName::PrimerNombre, "María"),
        (FieldName::Apellidos, "García López"),
        (FieldName::FechaNacimiento, "1990-05-20"),
        (FieldName::Genero, "Femenino"),
        (FieldName::Correo, "maria@ejemplo.com"),
        (FieldName::Celular, "3001234567"),
        (FieldName::NroDoc, "1234567890"),
        (FieldName::TipoDoc, "CC"),
    ] {
        controller.set_create_field(field, value).await;
    }
    controller.attach_create_photo(foto_png(1024 * 1024)).await;
}

async fn logged_in(fake: FakeGateway) -> SessionController<FakeGateway> {
    let controller = SessionController::new(fake);
    controller.go_to_login().await;
    controller.submit_login("a@b.com", "x").await;
    assert_eq!(controller.screen().await, Screen::Menu);
    controller
}

#[tokio::test]
async fn login_exitoso_pasa_al_menu_y_logout_limpia_todo() {
    let fake = FakeGateway::new();
    let calls = fake.calls.clone();
    let controller = SessionController::new(fake);

    controller.go_to_login().await;
    controller.submit_login("a@b.com", "x").await;

    assert_eq!(controller.screen().await, Screen::Menu);
    assert_eq!(controller.auth_token().await.as_deref(), Some("t1"));
    assert_eq!(controller.user_email().await.as_deref(), Some("a@b.com"));
    assert!(!controller.is_loading().await);
    let status = controller.status().await.expect("mensaje de login");
    assert_eq!(status.kind, StatusKind::Exito);
    assert_eq!(status.text, "Login exitoso");

    controller.logout().await;
    assert_eq!(controller.screen().await, Screen::Landing);
    assert_eq!(controller.auth_token().await, None);
    assert_eq!(controller.user_email().await, None);
    assert!(controller.transcript().await.is_empty());
    assert_eq!(calls.lock().expect("calls").as_slice(), ["login:a@b.com"]);
}

#[tokio::test]
async fn login_invalido_no_llega_a_la_red() {
    let fake = FakeGateway::new();
    let calls = fake.calls.clone();
    let controller = SessionController::new(fake);
    controller.go_to_login().await;

    controller.submit_login("", "").await;
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "Complete todos los campos");
    assert_eq!(status.kind, StatusKind::Error);

    controller.submit_login("no-es-email", "secreta").await;
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "Email inválido");

    assert!(calls.lock().expect("calls").is_empty());
}

#[tokio::test]
async fn el_detalle_del_backend_se_muestra_literal() {
    let controller = SessionController::new(FakeGateway::failing(BackendError::Rejected {
        status: 401,
        detail: Some("Credenciales inválidas".to_string()),
    }));
    controller.go_to_login().await;
    controller.submit_login("a@b.com", "x").await;

    assert_eq!(controller.screen().await, Screen::Login);
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "Credenciales inválidas");
    assert!(!controller.is_loading().await);
}

#[tokio::test]
async fn fallo_de_transporte_da_mensaje_generico() {
    let controller = SessionController::new(FakeGateway::failing(BackendError::Transport(
        "connection refused".to_string(),
    )));
    controller.go_to_login().await;
    controller.submit_login("a@b.com", "x").await;

    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "Error de conexión");
    assert_eq!(status.kind, StatusKind::Error);
}

#[tokio::test]
async fn registro_pasa_a_verificacion_y_luego_a_login() {
    let fake = FakeGateway::new();
    let calls = fake.calls.clone();
    let controller = SessionController::new(fake);

    controller.go_to_signup().await;
    controller
        .submit_signup("Ana Rojas", "ana@b.com", "Clave_99")
        .await;
    assert_eq!(
        controller.screen().await,
        Screen::AwaitingVerification {
            email: "ana@b.com".to_string()
        }
    );

    // Un código mal formado se rechaza sin tocar la red.
    controller.submit_verification_code("12ab").await;
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "El código debe tener 6 dígitos");
    assert!(matches!(
        controller.screen().await,
        Screen::AwaitingVerification { .. }
    ));

    controller.submit_verification_code("123456").await;
    assert_eq!(controller.screen().await, Screen::Login);
    assert_eq!(
        calls.lock().expect("calls").as_slice(),
        ["signup:ana@b.com", "verify:ana@b.com:123456"]
    );
}

#[tokio::test]
async fn password_debil_bloquea_el_registro() {
    let fake = FakeGateway::new();
    let calls = fake.calls.clone();
    let controller = SessionController::new(fake);
    controller.go_to_signup().await;
    controller
        .submit_signup("Ana Rojas", "ana@b.com", "abcdefg1")
        .await;

    assert_eq!(controller.screen().await, Screen::Signup);
    assert!(controller
        .signup_errors()
        .await
        .get(FieldName::Password)
        .is_some());
    assert!(calls.lock().expect("calls").is_empty());
}

#[tokio::test]
async fn crear_persona_valida_envia_una_vez_y_limpia_el_borrador() {
    let fake = FakeGateway::new();
    let calls = fake.calls.clone();
    let created = fake.created.clone();
    let controller = logged_in(fake).await;

    controller.open_screen(MenuAction::Crear).await;
    fill_valid_draft(&controller).await;
    controller.submit_create().await;

    let creates = calls
        .lock()
        .expect("calls")
        .iter()
        .filter(|call| call.as_str() == "create")
        .count();
    assert_eq!(creates, 1);
    assert_eq!(controller.create_draft().await, PersonDraft::default());
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "Persona creada exitosamente");

    let payload = created.lock().expect("created")[0].clone();
    let foto = payload.foto.expect("foto en el payload");
    assert!(foto.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn crear_sin_foto_se_bloquea_en_el_cliente() {
    let fake = FakeGateway::new();
    let calls = fake.calls.clone();
    let controller = logged_in(fake).await;

    controller.open_screen(MenuAction::Crear).await;
    fill_valid_draft(&controller).await;
    controller.clear_create_photo().await;
    controller.submit_create().await;

    let errors = controller.create_errors().await;
    assert_eq!(
        errors.message(FieldName::Foto).as_deref(),
        Some("Foto requerida")
    );
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "Por favor corrija los errores en el formulario");
    assert!(!calls.lock().expect("calls").iter().any(|c| c == "create"));
}

#[tokio::test]
async fn modificar_con_parche_vacio_no_emite_solicitud() {
    let fake = FakeGateway::with_person(persona());
    let calls = fake.calls.clone();
    let controller = logged_in(fake).await;

    controller.open_screen(MenuAction::Modificar).await;
    controller.search_person("123456").await;
    assert!(controller.queried_person().await.is_some());

    controller.submit_modify().await;
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "No hay cambios para guardar");
    assert!(!calls
        .lock()
        .expect("calls")
        .iter()
        .any(|c| c.starts_with("update:")));
}

#[tokio::test]
async fn modificar_envia_solo_los_campos_tocados() {
    let fake = FakeGateway::with_person(persona());
    let updates = fake.updates.clone();
    let controller = logged_in(fake).await;

    controller.open_screen(MenuAction::Modificar).await;
    controller.search_person("123456").await;
    controller
        .set_patch_field(FieldName::Correo, "nuevo@correo.com")
        .await;
    controller.submit_modify().await;

    let recorded = updates.lock().expect("updates").clone();
    assert_eq!(recorded.len(), 1);
    let (doc, update) = &recorded[0];
    assert_eq!(doc, "123456");
    let body = serde_json::to_value(update).expect("serializar");
    let object = body.as_object().expect("objeto");
    assert_eq!(object.len(), 1);
    assert_eq!(object["correo"], "nuevo@correo.com");

    // Tras el éxito vuelve a la fase de búsqueda.
    assert!(controller.queried_person().await.is_none());
    assert!(controller.patch().await.is_empty());
}

#[tokio::test]
async fn validacion_del_parche_solo_toca_campos_presentes() {
    let fake = FakeGateway::with_person(persona());
    let calls = fake.calls.clone();
    let controller = logged_in(fake).await;

    controller.open_screen(MenuAction::Modificar).await;
    controller.search_person("123456").await;
    controller.set_patch_field(FieldName::Correo, "malo").await;
    controller.submit_modify().await;

    let errors = controller.patch_errors().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.message(FieldName::Correo).as_deref(),
        Some("Email inválido")
    );
    assert!(errors.get(FieldName::Apellidos).is_none());
    assert!(!calls
        .lock()
        .expect("calls")
        .iter()
        .any(|c| c.starts_with("update:")));
}

#[tokio::test]
async fn eliminar_requiere_confirmacion_explicita() {
    let fake = FakeGateway::with_person(persona());
    let calls = fake.calls.clone();
    let controller = logged_in(fake).await;

    controller.open_screen(MenuAction::Eliminar).await;
    controller.search_person("123456").await;

    // Sin pedir confirmación no pasa nada.
    controller.confirm_delete().await;
    assert!(!calls
        .lock()
        .expect("calls")
        .iter()
        .any(|c| c.starts_with("delete:")));

    // Declinar deja todo como estaba.
    controller.request_delete().await;
    assert!(controller.pending_delete().await);
    controller.decline_delete().await;
    assert!(!controller.pending_delete().await);
    assert!(controller.queried_person().await.is_some());
    assert!(!calls
        .lock()
        .expect("calls")
        .iter()
        .any(|c| c.starts_with("delete:")));

    controller.request_delete().await;
    controller.confirm_delete().await;
    assert!(calls
        .lock()
        .expect("calls")
        .iter()
        .any(|c| c == "delete:123456"));
    assert!(controller.queried_person().await.is_none());
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "Persona eliminada exitosamente");
}

#[tokio::test]
async fn logs_reportan_cuantos_registros_llegaron() {
    let mut fake = FakeGateway::new();
    fake.logs = vec![
        LogEntry {
            tipo_operacion: "CREAR".to_string(),
            usuario_email: "a@b.com".to_string(),
            documento_afectado: "123456".to_string(),
            fecha_transaccion: "2026-01-01T00:00:00Z".parse().expect("fecha"),
        },
        LogEntry {
            tipo_operacion: "ELIMINAR".to_string(),
            usuario_email: "a@b.com".to_string(),
            documento_afectado: "123456".to_string(),
            fecha_transaccion: "2026-01-02T00:00:00Z".parse().expect("fecha"),
        },
    ];
    let controller = logged_in(fake).await;

    controller.open_screen(MenuAction::Logs).await;
    controller
        .fetch_logs(LogFilter {
            tipo_operacion: None,
            documento: None,
        })
        .await;

    assert_eq!(controller.logs().await.len(), 2);
    let status = controller.status().await.expect("mensaje");
    assert_eq!(status.text, "Se encontraron 2 registros");
}

#[tokio::test]
async fn chat_encola_preguntas_y_mantiene_la_alternancia() {
    let gate = Arc::new(Semaphore::new(0));
    let fake = FakeGateway::new().gated(gate.clone());
    let calls = fake.calls.clone();
    let controller = Arc::new(logged_in_gated(fake, &gate).await);

    controller.open_screen(MenuAction::Chat).await;

    let background = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.submit_chat_question("P1").await })
    };

    // El turno del usuario aparece de inmediato, antes de la respuesta.
    {
        let controller = Arc::clone(&controller);
        wait_until_async(move || {
            let controller = Arc::clone(&controller);
            async move { controller.transcript().await.len() == 1 }
        })
        .await;
    }

    // Una segunda pregunta mientras hay respuesta pendiente se encola.
    controller.submit_chat_question("P2").await;
    assert_eq!(controller.transcript().await.len(), 1);

    gate.add_permits(1);
    {
        let controller = Arc::clone(&controller);
        wait_until_async(move || {
            let controller = Arc::clone(&controller);
            async move { controller.transcript().await.len() == 3 }
        })
        .await;
    }
    gate.add_permits(1);
    background.await.expect("tarea de chat");

    let transcript = controller.transcript().await;
    let resumen: Vec<(bool, &str)> = transcript
        .iter()
        .map(|turn| (turn.is_user, turn.text.as_str()))
        .collect();
    assert_eq!(
        resumen,
        vec![
            (true, "P1"),
            (false, "R:P1"),
            (true, "P2"),
            (false, "R:P2"),
        ]
    );
    assert_eq!(
        calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|c| c.starts_with("chat:"))
            .count(),
        2
    );
}

#[tokio::test]
async fn chat_fallido_inserta_turno_de_disculpa() {
    let fake = FakeGateway::new();
    fake.chat_replies
        .lock()
        .expect("chat")
        .push_back(Err(BackendError::Transport("sin red".to_string())));
    let controller = logged_in(fake).await;

    controller.open_screen(MenuAction::Chat).await;
    controller.submit_chat_question("¿Cuántas personas hay?").await;

    let transcript = controller.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert!(transcript[0].is_user);
    assert!(!transcript[1].is_user);
    assert_eq!(
        transcript[1].text,
        "No fue posible obtener una respuesta. Intente de nuevo."
    );
}

#[tokio::test]
async fn respuesta_tardia_se_descarta_tras_navegar() {
    let gate = Arc::new(Semaphore::new(0));
    let fake = FakeGateway::with_person(persona()).gated(gate.clone());
    let controller = Arc::new(logged_in_gated(fake, &gate).await);

    controller.open_screen(MenuAction::Consultar).await;
    let background = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.search_person("123456").await })
    };
    {
        let controller = Arc::clone(&controller);
        wait_until_async(move || {
            let controller = Arc::clone(&controller);
            async move { controller.is_loading().await }
        })
        .await;
    }

    // Navegar no está bloqueado por una consulta en vuelo.
    controller.back_to_menu().await;
    gate.add_permits(1);
    background.await.expect("tarea de consulta");

    assert_eq!(controller.screen().await, Screen::Menu);
    assert!(controller.queried_person().await.is_none());
    // El mensaje vigente sigue siendo el del login: la respuesta tardía no
    // llegó a publicar "Persona encontrada".
    let status = controller.status().await;
    assert!(status.map_or(true, |s| s.text != "Persona encontrada"));
    assert!(!controller.is_loading().await);
}

#[tokio::test]
async fn no_se_puede_enviar_dos_veces_mientras_carga() {
    let gate = Arc::new(Semaphore::new(0));
    let fake = FakeGateway::new().gated(gate.clone());
    let calls = fake.calls.clone();
    let controller = Arc::new(logged_in_gated(fake, &gate).await);

    controller.open_screen(MenuAction::Crear).await;
    fill_valid_draft(&controller).await;

    let background = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.submit_create().await })
    };
    {
        let controller = Arc::clone(&controller);
        wait_until_async(move || {
            let controller = Arc::clone(&controller);
            async move { controller.is_loading().await }
        })
        .await;
    }

    // Segundo envío con la carga activa: se ignora.
    controller.submit_create().await;

    gate.add_permits(1);
    background.await.expect("tarea de creación");

    let creates = calls
        .lock()
        .expect("calls")
        .iter()
        .filter(|c| c.as_str() == "create")
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test]
async fn el_mensaje_de_estado_expira_a_los_cinco_segundos() {
    let controller = SessionController::new(FakeGateway::new());
    controller.go_to_login().await;
    controller.submit_login("", "").await;

    let status = controller.status().await.expect("mensaje");
    let ahora = Instant::now();
    assert!(!status.expired_at(ahora));
    assert!(!status.expired_at(ahora + Duration::from_secs(4)));
    assert!(status.expired_at(ahora + Duration::from_secs(6)));
}

/// Variant of [`logged_in`] for gated fakes: the login call itself consumes
/// one permit.
async fn logged_in_gated(fake: FakeGateway, gate: &Arc<Semaphore>) -> SessionController<FakeGateway> {
    gate.add_permits(1);
    let controller = SessionController::new(fake);
    controller.go_to_login().await;
    controller.submit_login("a@b.com", "x").await;
    assert_eq!(controller.screen().await, Screen::Menu);
    controller
}

async fn wait_until_async<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condición nunca se cumplió");
}
