//! Field validation for the personas forms.
//!
//! Every rule is a pure, synchronous function from a raw field value to
//! either `Ok(())` or one descriptive reason. Rules that changed across
//! backend revisions take an explicit policy so the call site picks the
//! generation it needs; `ValidationPolicy::latest()` is what the session
//! controller uses.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use shared::domain::{PersonDraft, PersonPatch, PhotoUpload};
use thiserror::Error;

pub const FOTO_MAX_BYTES: usize = 2 * 1024 * 1024;
const PASSWORD_SIMBOLOS: &str = "!@#$_.-";
const FOTO_FORMATOS: [&str; 4] = ["jpeg", "jpg", "png", "gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    PrimerNombre,
    SegundoNombre,
    Apellidos,
    FechaNacimiento,
    Genero,
    Correo,
    Celular,
    NroDoc,
    TipoDoc,
    Foto,
    Email,
    Password,
    NombreCompleto,
    Codigo,
}

impl FieldName {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::PrimerNombre => "primer_nombre",
            FieldName::SegundoNombre => "segundo_nombre",
            FieldName::Apellidos => "apellidos",
            FieldName::FechaNacimiento => "fecha_nacimiento",
            FieldName::Genero => "genero",
            FieldName::Correo => "correo",
            FieldName::Celular => "celular",
            FieldName::NroDoc => "nro_doc",
            FieldName::TipoDoc => "tipo_doc",
            FieldName::Foto => "foto",
            FieldName::Email => "email",
            FieldName::Password => "password",
            FieldName::NombreCompleto => "nombre_completo",
            FieldName::Codigo => "codigo",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One human-readable rejection reason. Display output is the user-facing
/// message, in the UI language of the original system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Este campo es requerido")]
    Requerido,
    #[error("No puede estar vacío")]
    Vacio,
    #[error("Email inválido")]
    EmailInvalido,
    #[error("Teléfono debe tener 10 dígitos")]
    TelefonoInvalido,
    #[error("Documento debe tener entre {min} y {max} dígitos")]
    DocumentoFueraDeRango { min: usize, max: usize },
    #[error("No puede contener números")]
    ContieneDigitos,
    #[error("Máximo {0} caracteres")]
    DemasiadoLargo(usize),
    #[error("Fecha requerida")]
    FechaRequerida,
    #[error("Formato de fecha inválido")]
    FechaFormato,
    #[error("La fecha no puede ser futura")]
    FechaFutura,
    #[error("Fecha inválida")]
    FechaInvalida,
    #[error("Debe ser uno de: {0}")]
    OpcionInvalida(String),
    #[error("Foto requerida")]
    FotoRequerida,
    #[error("La foto no puede superar 2 MB")]
    FotoDemasiadoGrande,
    #[error("Formato de foto no soportado")]
    FotoFormato,
    #[error("La contraseña debe tener al menos {0} caracteres")]
    PasswordCorta(usize),
    #[error("La contraseña debe incluir mayúscula, minúscula, número y símbolo (!@#$_.-)")]
    PasswordDebil,
    #[error("El código debe tener 6 dígitos")]
    CodigoInvalido,
}

pub type FieldResult = Result<(), FieldError>;

/// Document-number length bound, which tightened across revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentoPolicy {
    /// 5 to 15 digits.
    Amplio,
    /// 1 to 10 digits.
    Compacto,
}

impl DocumentoPolicy {
    fn bounds(self) -> (usize, usize) {
        match self {
            DocumentoPolicy::Amplio => (5, 15),
            DocumentoPolicy::Compacto => (1, 10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicy {
    /// Length at least 6.
    Basica,
    /// Length at least 8 plus one uppercase, lowercase, digit and symbol
    /// from `!@#$_.-`.
    Estricta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneroPolicy {
    /// Single-letter codes.
    Codificado,
    /// Spelled-out values.
    Descriptivo,
}

impl GeneroPolicy {
    pub fn permitidos(self) -> &'static [&'static str] {
        match self {
            GeneroPolicy::Codificado => &["M", "F", "O"],
            GeneroPolicy::Descriptivo => &[
                "Masculino",
                "Femenino",
                "No binario",
                "Prefiero no reportar",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoDocPolicy {
    Codificado,
    Descriptivo,
}

impl TipoDocPolicy {
    pub fn permitidos(self) -> &'static [&'static str] {
        match self {
            TipoDocPolicy::Codificado => &["CC", "TI", "CE", "PA"],
            TipoDocPolicy::Descriptivo => &["Tarjeta de identidad", "Cédula"],
        }
    }
}

/// One policy choice per revision-sensitive field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub documento: DocumentoPolicy,
    pub password: PasswordPolicy,
    pub genero: GeneroPolicy,
    pub tipo_doc: TipoDocPolicy,
}

impl ValidationPolicy {
    /// The newest generation observed for each field.
    pub fn latest() -> Self {
        Self {
            documento: DocumentoPolicy::Compacto,
            password: PasswordPolicy::Estricta,
            genero: GeneroPolicy::Descriptivo,
            tipo_doc: TipoDocPolicy::Codificado,
        }
    }

    pub fn primera_revision() -> Self {
        Self {
            documento: DocumentoPolicy::Amplio,
            password: PasswordPolicy::Basica,
            genero: GeneroPolicy::Codificado,
            tipo_doc: TipoDocPolicy::Codificado,
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::latest()
    }
}

/// Wholesale result of one validation pass: field name to reason. A field
/// absent from the map is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrorMap {
    errors: BTreeMap<FieldName, FieldError>,
}

impl ValidationErrorMap {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: FieldName) -> Option<&FieldError> {
        self.errors.get(&field)
    }

    pub fn message(&self, field: FieldName) -> Option<String> {
        self.errors.get(&field).map(|error| error.to_string())
    }

    pub fn first_message(&self) -> Option<String> {
        self.errors.values().next().map(|error| error.to_string())
    }

    pub fn contains_requerido(&self) -> bool {
        self.errors
            .values()
            .any(|error| matches!(error, FieldError::Requerido | FieldError::FechaRequerida))
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &FieldError)> {
        self.errors.iter().map(|(field, error)| (*field, error))
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    fn check(&mut self, field: FieldName, result: FieldResult) {
        if let Err(error) = result {
            self.errors.insert(field, error);
        }
    }
}

/// `local@domain.tld` shape: no whitespace, exactly one `@`, and a dot in
/// the domain with at least one character on each side.
pub fn email(value: &str) -> FieldResult {
    if value.chars().any(char::is_whitespace) {
        return Err(FieldError::EmailInvalido);
    }
    let Some((local, dominio)) = value.split_once('@') else {
        return Err(FieldError::EmailInvalido);
    };
    if local.is_empty() || dominio.contains('@') {
        return Err(FieldError::EmailInvalido);
    }
    let total = dominio.chars().count();
    let interior_dot = dominio
        .chars()
        .enumerate()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < total);
    if !interior_dot {
        return Err(FieldError::EmailInvalido);
    }
    Ok(())
}

/// Exactly 10 ASCII digits.
pub fn celular(value: &str) -> FieldResult {
    if value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(FieldError::TelefonoInvalido)
    }
}

/// Digits only, length within the active policy's bound.
pub fn documento(value: &str, policy: DocumentoPolicy) -> FieldResult {
    let (min, max) = policy.bounds();
    if value.len() >= min
        && value.len() <= max
        && value.bytes().all(|b| b.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(FieldError::DocumentoFueraDeRango { min, max })
    }
}

/// Shared rule for name-like fields: no digit characters, bounded length.
/// Required-ness is decided by the form validator, not here.
pub fn nombre(value: &str, max_chars: usize) -> FieldResult {
    if value.chars().any(|c| c.is_ascii_digit()) {
        return Err(FieldError::ContieneDigitos);
    }
    if value.trim().chars().count() > max_chars {
        return Err(FieldError::DemasiadoLargo(max_chars));
    }
    Ok(())
}

/// Birth date in `yyyy-mm-dd`: never in the future, computed age (calendar
/// years) between 0 and 120. Today's date is passed in so the rule stays
/// pure.
pub fn fecha_nacimiento(value: &str, hoy: NaiveDate) -> FieldResult {
    if value.trim().is_empty() {
        return Err(FieldError::FechaRequerida);
    }
    let fecha = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| FieldError::FechaFormato)?;
    if fecha > hoy {
        return Err(FieldError::FechaFutura);
    }
    let edad = hoy.year() - fecha.year();
    if edad > 120 {
        return Err(FieldError::FechaInvalida);
    }
    Ok(())
}

pub fn genero(value: &str, policy: GeneroPolicy) -> FieldResult {
    if value.trim().is_empty() {
        return Err(FieldError::Requerido);
    }
    if policy.permitidos().contains(&value) {
        Ok(())
    } else {
        Err(FieldError::OpcionInvalida(policy.permitidos().join(", ")))
    }
}

pub fn tipo_documento(value: &str, policy: TipoDocPolicy) -> FieldResult {
    if value.trim().is_empty() {
        return Err(FieldError::Requerido);
    }
    if policy.permitidos().contains(&value) {
        Ok(())
    } else {
        Err(FieldError::OpcionInvalida(policy.permitidos().join(", ")))
    }
}

/// Size and format check for an already-attached photo.
pub fn foto(photo: &PhotoUpload) -> FieldResult {
    if photo.bytes.len() > FOTO_MAX_BYTES {
        return Err(FieldError::FotoDemasiadoGrande);
    }
    let formato = photo
        .mime_type
        .strip_prefix("image/")
        .unwrap_or(&photo.mime_type)
        .to_ascii_lowercase();
    if FOTO_FORMATOS.contains(&formato.as_str()) {
        Ok(())
    } else {
        Err(FieldError::FotoFormato)
    }
}

pub fn password(value: &str, policy: PasswordPolicy) -> FieldResult {
    match policy {
        PasswordPolicy::Basica => {
            if value.chars().count() >= 6 {
                Ok(())
            } else {
                Err(FieldError::PasswordCorta(6))
            }
        }
        PasswordPolicy::Estricta => {
            if value.chars().count() < 8 {
                return Err(FieldError::PasswordCorta(8));
            }
            let mayuscula = value.chars().any(|c| c.is_ascii_uppercase());
            let minuscula = value.chars().any(|c| c.is_ascii_lowercase());
            let digito = value.chars().any(|c| c.is_ascii_digit());
            let simbolo = value.chars().any(|c| PASSWORD_SIMBOLOS.contains(c));
            if mayuscula && minuscula && digito && simbolo {
                Ok(())
            } else {
                Err(FieldError::PasswordDebil)
            }
        }
    }
}

/// Full name on the signup form.
pub fn nombre_completo(value: &str) -> FieldResult {
    if value.trim().is_empty() {
        return Err(FieldError::Requerido);
    }
    if value.trim().chars().count() > 100 {
        return Err(FieldError::DemasiadoLargo(100));
    }
    Ok(())
}

/// Email verification code: exactly 6 digits.
pub fn codigo_verificacion(value: &str) -> FieldResult {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::Requerido);
    }
    if value.len() == 6 && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(FieldError::CodigoInvalido)
    }
}

pub fn validate_login(email_value: &str, password_value: &str) -> ValidationErrorMap {
    let mut errores = ValidationErrorMap::default();
    if email_value.trim().is_empty() {
        errores.check(FieldName::Email, Err(FieldError::Requerido));
    } else {
        errores.check(FieldName::Email, email(email_value));
    }
    if password_value.is_empty() {
        errores.check(FieldName::Password, Err(FieldError::Requerido));
    }
    errores
}

pub fn validate_signup(
    name_value: &str,
    email_value: &str,
    password_value: &str,
    policy: &ValidationPolicy,
) -> ValidationErrorMap {
    let mut errores = ValidationErrorMap::default();
    errores.check(FieldName::NombreCompleto, nombre_completo(name_value));
    if email_value.trim().is_empty() {
        errores.check(FieldName::Email, Err(FieldError::Requerido));
    } else {
        errores.check(FieldName::Email, email(email_value));
    }
    if password_value.is_empty() {
        errores.check(FieldName::Password, Err(FieldError::Requerido));
    } else {
        errores.check(FieldName::Password, password(password_value, policy.password));
    }
    errores
}

pub fn validate_verification_code(code: &str) -> ValidationErrorMap {
    let mut errores = ValidationErrorMap::default();
    errores.check(FieldName::Codigo, codigo_verificacion(code));
    errores
}

/// Create is validated wholesale: every required field's rule runs and the
/// map is rebuilt from scratch.
pub fn validate_create_form(
    draft: &PersonDraft,
    policy: &ValidationPolicy,
    hoy: NaiveDate,
) -> ValidationErrorMap {
    let mut errores = ValidationErrorMap::default();

    if draft.primer_nombre.trim().is_empty() {
        errores.check(FieldName::PrimerNombre, Err(FieldError::Requerido));
    } else {
        errores.check(FieldName::PrimerNombre, nombre(&draft.primer_nombre, 30));
    }

    if !draft.segundo_nombre.trim().is_empty() {
        errores.check(FieldName::SegundoNombre, nombre(&draft.segundo_nombre, 30));
    }

    if draft.apellidos.trim().is_empty() {
        errores.check(FieldName::Apellidos, Err(FieldError::Requerido));
    } else {
        errores.check(FieldName::Apellidos, nombre(&draft.apellidos, 60));
    }

    errores.check(
        FieldName::FechaNacimiento,
        fecha_nacimiento(&draft.fecha_nacimiento, hoy),
    );
    errores.check(FieldName::Genero, genero(&draft.genero, policy.genero));

    if draft.correo.trim().is_empty() {
        errores.check(FieldName::Correo, Err(FieldError::Requerido));
    } else {
        errores.check(FieldName::Correo, email(&draft.correo));
    }

    if draft.celular.trim().is_empty() {
        errores.check(FieldName::Celular, Err(FieldError::Requerido));
    } else {
        errores.check(FieldName::Celular, celular(&draft.celular));
    }

    if draft.nro_doc.trim().is_empty() {
        errores.check(FieldName::NroDoc, Err(FieldError::Requerido));
    } else {
        errores.check(FieldName::NroDoc, documento(&draft.nro_doc, policy.documento));
    }

    errores.check(
        FieldName::TipoDoc,
        tipo_documento(&draft.tipo_doc, policy.tipo_doc),
    );

    match &draft.foto {
        Some(photo) => errores.check(FieldName::Foto, foto(photo)),
        None => errores.check(FieldName::Foto, Err(FieldError::FotoRequerida)),
    }

    errores
}

/// Modify is validated sparsely: a rule runs only for fields present in the
/// patch. Untouched fields never appear in the map. A touched-but-blank
/// value on a field that cannot be blank is rejected; the optional second
/// name may be blanked out.
pub fn validate_patch(
    patch: &PersonPatch,
    policy: &ValidationPolicy,
    hoy: NaiveDate,
) -> ValidationErrorMap {
    let mut errores = ValidationErrorMap::default();

    if let Some(valor) = &patch.primer_nombre {
        if valor.trim().is_empty() {
            errores.check(FieldName::PrimerNombre, Err(FieldError::Vacio));
        } else {
            errores.check(FieldName::PrimerNombre, nombre(valor, 30));
        }
    }
    if let Some(valor) = &patch.segundo_nombre {
        if !valor.trim().is_empty() {
            errores.check(FieldName::SegundoNombre, nombre(valor, 30));
        }
    }
    if let Some(valor) = &patch.apellidos {
        if valor.trim().is_empty() {
            errores.check(FieldName::Apellidos, Err(FieldError::Vacio));
        } else {
            errores.check(FieldName::Apellidos, nombre(valor, 60));
        }
    }
    if let Some(valor) = &patch.fecha_nacimiento {
        errores.check(FieldName::FechaNacimiento, fecha_nacimiento(valor, hoy));
    }
    if let Some(valor) = &patch.genero {
        errores.check(FieldName::Genero, genero(valor, policy.genero));
    }
    if let Some(valor) = &patch.correo {
        if valor.trim().is_empty() {
            errores.check(FieldName::Correo, Err(FieldError::Vacio));
        } else {
            errores.check(FieldName::Correo, email(valor));
        }
    }
    if let Some(valor) = &patch.celular {
        if valor.trim().is_empty() {
            errores.check(FieldName::Celular, Err(FieldError::Vacio));
        } else {
            errores.check(FieldName::Celular, celular(valor));
        }
    }
    if let Some(valor) = &patch.tipo_doc {
        errores.check(FieldName::TipoDoc, tipo_documento(valor, policy.tipo_doc));
    }
    if let Some(photo) = &patch.foto {
        errores.check(FieldName::Foto, foto(photo));
    }

    errores
}

#[path = "tests/lib_tests.rs"]
#[cfg(test)]
mod tests;
