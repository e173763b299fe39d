use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaturalQueryRequest {
    pub pregunta: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaturalQueryResponse {
    pub respuesta: String,
}

/// The `data` field on GET responses may hold a single record or an array
/// with the record in first position, depending on the backend revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// Envelope for GET responses: `{"data": ...}` where `data` may be absent,
/// a single object, or an array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct DataEnvelope<T> {
    #[serde(default)]
    pub data: Option<OneOrMany<T>>,
}

impl<T> DataEnvelope<T> {
    pub fn into_first(self) -> Option<T> {
        match self.data {
            Some(OneOrMany::One(value)) => Some(value),
            Some(OneOrMany::Many(values)) => values.into_iter().next(),
            None => None,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self.data {
            Some(OneOrMany::One(value)) => vec![value],
            Some(OneOrMany::Many(values)) => values,
            None => Vec::new(),
        }
    }
}
