use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full person record as returned by the backend. Read-only display data:
/// the client never edits one of these in place, it builds drafts and
/// patches instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub primer_nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segundo_nombre: Option<String>,
    pub apellidos: String,
    pub fecha_nacimiento: String,
    pub genero: String,
    pub correo: String,
    pub celular: String,
    pub nro_doc: String,
    pub tipo_doc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foto: Option<String>,
}

/// Locally-read image attached to a draft or patch. Produced by a file-read
/// step outside the validation engine; travels inside the JSON body as a
/// base64 data URI, never as multipart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

/// In-progress form state for the create screen. All fields hold raw user
/// input; validation happens wholesale when the form is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDraft {
    pub primer_nombre: String,
    pub segundo_nombre: String,
    pub apellidos: String,
    pub fecha_nacimiento: String,
    pub genero: String,
    pub correo: String,
    pub celular: String,
    pub nro_doc: String,
    pub tipo_doc: String,
    pub foto: Option<PhotoUpload>,
}

impl PersonDraft {
    /// Wire payload for POST /personas/crear.
    pub fn to_record(&self) -> NewPerson {
        let segundo_nombre = self.segundo_nombre.trim();
        NewPerson {
            primer_nombre: self.primer_nombre.trim().to_string(),
            segundo_nombre: if segundo_nombre.is_empty() {
                None
            } else {
                Some(segundo_nombre.to_string())
            },
            apellidos: self.apellidos.trim().to_string(),
            fecha_nacimiento: self.fecha_nacimiento.clone(),
            genero: self.genero.clone(),
            correo: self.correo.trim().to_string(),
            celular: self.celular.trim().to_string(),
            nro_doc: self.nro_doc.trim().to_string(),
            tipo_doc: self.tipo_doc.clone(),
            foto: self.foto.as_ref().map(PhotoUpload::to_data_uri),
        }
    }
}

/// Body of POST /personas/crear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    pub primer_nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segundo_nombre: Option<String>,
    pub apellidos: String,
    pub fecha_nacimiento: String,
    pub genero: String,
    pub correo: String,
    pub celular: String,
    pub nro_doc: String,
    pub tipo_doc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foto: Option<String>,
}

/// Sparse set of edits for the modify screen. A `None` field was never
/// touched by the user: it is not validated and must not reach the wire.
/// The document number is the lookup key and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonPatch {
    pub primer_nombre: Option<String>,
    pub segundo_nombre: Option<String>,
    pub apellidos: Option<String>,
    pub fecha_nacimiento: Option<String>,
    pub genero: Option<String>,
    pub correo: Option<String>,
    pub celular: Option<String>,
    pub tipo_doc: Option<String>,
    pub foto: Option<PhotoUpload>,
}

impl PersonPatch {
    pub fn is_empty(&self) -> bool {
        self.primer_nombre.is_none()
            && self.segundo_nombre.is_none()
            && self.apellidos.is_none()
            && self.fecha_nacimiento.is_none()
            && self.genero.is_none()
            && self.correo.is_none()
            && self.celular.is_none()
            && self.tipo_doc.is_none()
            && self.foto.is_none()
    }

    /// Wire payload for PUT /personas/modificar/{doc}. Untouched fields are
    /// skipped entirely rather than serialized as null.
    pub fn to_update(&self) -> PersonUpdate {
        PersonUpdate {
            primer_nombre: self.primer_nombre.clone(),
            segundo_nombre: self.segundo_nombre.clone(),
            apellidos: self.apellidos.clone(),
            fecha_nacimiento: self.fecha_nacimiento.clone(),
            genero: self.genero.clone(),
            correo: self.correo.clone(),
            celular: self.celular.clone(),
            tipo_doc: self.tipo_doc.clone(),
            foto: self.foto.as_ref().map(PhotoUpload::to_data_uri),
        }
    }
}

/// Body of PUT /personas/modificar/{doc}.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primer_nombre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segundo_nombre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apellidos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_nacimiento: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genero: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub celular: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foto: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Crear,
    Consultar,
    Modificar,
    Eliminar,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Crear => "CREAR",
            OperationKind::Consultar => "CONSULTAR",
            OperationKind::Modificar => "MODIFICAR",
            OperationKind::Eliminar => "ELIMINAR",
        }
    }
}

/// Server-supplied audit trail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub tipo_operacion: String,
    pub usuario_email: String,
    pub documento_afectado: String,
    pub fecha_transaccion: DateTime<Utc>,
}

/// Filters for GET /logs; absent entries are not sent as query params.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub tipo_operacion: Option<OperationKind>,
    pub documento: Option<String>,
}
