//! HTTP boundary with the personas backend.
//!
//! The session controller only sees the [`PersonasGateway`] trait; the
//! reqwest implementation lives here and tests substitute scripted fakes or
//! an in-process mock server.

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{LogEntry, LogFilter, NewPerson, Person, PersonUpdate},
    error::ErrorBody,
    protocol::{
        DataEnvelope, LoginRequest, LoginResponse, NaturalQueryRequest, NaturalQueryResponse,
        SignupRequest, VerifyEmailRequest,
    },
};
use thiserror::Error;
use url::Url;

/// What can go wrong talking to the backend. `Transport` is the request
/// never completing; `Rejected` is the server answering non-2xx with an
/// optional `detail`; `InvalidResponse` is a 2xx body the client cannot
/// decode.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("error de conexión: {0}")]
    Transport(String),
    #[error("solicitud rechazada por el servidor (HTTP {status})")]
    Rejected { status: u16, detail: Option<String> },
    #[error("respuesta del servidor inválida: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Message to surface to the user: backend `detail` verbatim when the
    /// server reported one, a generic connection message for transport
    /// failures, the caller's fallback otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            BackendError::Transport(_) => "Error de conexión".to_string(),
            BackendError::Rejected { detail, .. } => detail
                .as_deref()
                .filter(|detail| !detail.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
            BackendError::InvalidResponse(_) => fallback.to_string(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// One method per backend operation. Authenticated calls take the bearer
/// token explicitly; the gateway holds no session state of its own.
#[async_trait]
pub trait PersonasGateway: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> BackendResult<LoginResponse>;
    async fn signup(&self, request: &SignupRequest) -> BackendResult<()>;
    async fn verify_email(&self, request: &VerifyEmailRequest) -> BackendResult<()>;
    async fn create_person(&self, token: &str, person: &NewPerson) -> BackendResult<()>;
    /// `Ok(None)` means the backend answered 2xx without a record.
    async fn fetch_person(&self, token: &str, nro_doc: &str) -> BackendResult<Option<Person>>;
    async fn update_person(
        &self,
        token: &str,
        nro_doc: &str,
        update: &PersonUpdate,
    ) -> BackendResult<()>;
    async fn delete_person(&self, token: &str, nro_doc: &str) -> BackendResult<()>;
    async fn fetch_logs(&self, token: &str, filter: &LogFilter) -> BackendResult<Vec<LogEntry>>;
    async fn natural_query(&self, token: &str, pregunta: &str) -> BackendResult<String>;
}

/// reqwest implementation of the JSON/HTTP contract.
pub struct HttpPersonasGateway {
    http: Client,
    base_url: String,
}

impl HttpPersonasGateway {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(base_url)?;
        Ok(Self {
            http: Client::new(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn expect_success(response: reqwest::Response) -> BackendResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail);
        Err(BackendError::Rejected { status, detail })
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

#[async_trait]
impl PersonasGateway for HttpPersonasGateway {
    async fn login(&self, request: &LoginRequest) -> BackendResult<LoginResponse> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(Self::expect_success(response).await?).await
    }

    async fn signup(&self, request: &SignupRequest) -> BackendResult<()> {
        let response = self
            .http
            .post(self.url("/auth/signup"))
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn verify_email(&self, request: &VerifyEmailRequest) -> BackendResult<()> {
        let response = self
            .http
            .post(self.url("/auth/verify-email"))
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn create_person(&self, token: &str, person: &NewPerson) -> BackendResult<()> {
        let response = self
            .http
            .post(self.url("/personas/crear"))
            .bearer_auth(token)
            .json(person)
            .send()
            .await
            .map_err(transport)?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn fetch_person(&self, token: &str, nro_doc: &str) -> BackendResult<Option<Person>> {
        let response = self
            .http
            .get(self.url(&format!("/personas/consultar/{nro_doc}")))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        let envelope: DataEnvelope<Person> =
            Self::decode(Self::expect_success(response).await?).await?;
        Ok(envelope.into_first())
    }

    async fn update_person(
        &self,
        token: &str,
        nro_doc: &str,
        update: &PersonUpdate,
    ) -> BackendResult<()> {
        let response = self
            .http
            .put(self.url(&format!("/personas/modificar/{nro_doc}")))
            .bearer_auth(token)
            .json(update)
            .send()
            .await
            .map_err(transport)?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn delete_person(&self, token: &str, nro_doc: &str) -> BackendResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("/personas/eliminar/{nro_doc}")))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn fetch_logs(&self, token: &str, filter: &LogFilter) -> BackendResult<Vec<LogEntry>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(operacion) = filter.tipo_operacion {
            params.push(("tipo_operacion", operacion.as_str().to_string()));
        }
        if let Some(documento) = &filter.documento {
            params.push(("documento", documento.clone()));
        }
        let response = self
            .http
            .get(self.url("/logs"))
            .query(&params)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        let envelope: DataEnvelope<LogEntry> =
            Self::decode(Self::expect_success(response).await?).await?;
        Ok(envelope.into_vec())
    }

    async fn natural_query(&self, token: &str, pregunta: &str) -> BackendResult<String> {
        let response = self
            .http
            .post(self.url("/consulta-natural"))
            .bearer_auth(token)
            .json(&NaturalQueryRequest {
                pregunta: pregunta.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;
        let body: NaturalQueryResponse =
            Self::decode(Self::expect_success(response).await?).await?;
        Ok(body.respuesta)
    }
}
