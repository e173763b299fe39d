//! Interactive terminal driver for the personas client. Presentation is
//! intentionally minimal; every decision lives in `client_core`.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    backend::HttpPersonasGateway, MenuAction, Screen, SessionController, StatusKind,
};
use shared::domain::{LogFilter, OperationKind, PhotoUpload};
use validation::FieldName;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the personas backend; overrides client.toml and
    /// PERSONAS_API_URL.
    #[arg(long)]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }

    let gateway = HttpPersonasGateway::new(&settings.api_url)
        .with_context(|| format!("URL de API inválida: {}", settings.api_url))?;
    let controller = SessionController::new(gateway);

    println!("Gestión de Personas — API en {}", settings.api_url);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_prompt(&controller).await;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();
        if input.eq_ignore_ascii_case("salir") {
            if controller.is_authenticated().await {
                controller.logout().await;
                print_status(&controller).await;
                continue;
            }
            break;
        }
        dispatch(&controller, input, &mut lines).await?;
        print_status(&controller).await;
    }

    Ok(())
}

async fn print_prompt(controller: &SessionController<HttpPersonasGateway>) {
    match controller.screen().await {
        Screen::Landing => println!("\n[inicio] comandos: login, registro, salir"),
        Screen::Login => println!("\n[login] comandos: entrar, salir"),
        Screen::Signup => println!("\n[registro] comandos: registrar, salir"),
        Screen::AwaitingVerification { email } => {
            println!("\n[verificación de {email}] comandos: codigo, salir")
        }
        Screen::Menu => println!(
            "\n[menú] comandos: crear, consultar, modificar, eliminar, logs, chat, salir"
        ),
        Screen::Create => println!("\n[crear] comandos: campos, foto, enviar, volver"),
        Screen::Query => println!("\n[consultar] comandos: buscar, volver"),
        Screen::Modify => println!("\n[modificar] comandos: buscar, campo, enviar, volver"),
        Screen::Delete => println!("\n[eliminar] comandos: buscar, eliminar, volver"),
        Screen::Logs => println!("\n[logs] comandos: buscar, todos, volver"),
        Screen::Chat => println!("\n[chat] comandos: preguntar, limpiar, volver"),
    }
}

async fn dispatch(
    controller: &SessionController<HttpPersonasGateway>,
    input: &str,
    lines: &mut dyn Iterator<Item = io::Result<String>>,
) -> Result<()> {
    match (controller.screen().await, input) {
        (Screen::Landing, "login") => controller.go_to_login().await,
        (Screen::Landing, "registro") => controller.go_to_signup().await,
        (Screen::Login, "entrar") => {
            let email = ask(lines, "Email")?;
            let password = ask(lines, "Contraseña")?;
            controller.submit_login(&email, &password).await;
        }
        (Screen::Signup, "registrar") => {
            let name = ask(lines, "Nombre completo")?;
            let email = ask(lines, "Email")?;
            let password = ask(lines, "Contraseña")?;
            controller.submit_signup(&name, &email, &password).await;
        }
        (Screen::AwaitingVerification { .. }, "codigo") => {
            let code = ask(lines, "Código de verificación")?;
            controller.submit_verification_code(&code).await;
        }
        (Screen::Menu, "crear") => controller.open_screen(MenuAction::Crear).await,
        (Screen::Menu, "consultar") => controller.open_screen(MenuAction::Consultar).await,
        (Screen::Menu, "modificar") => controller.open_screen(MenuAction::Modificar).await,
        (Screen::Menu, "eliminar") => controller.open_screen(MenuAction::Eliminar).await,
        (Screen::Menu, "logs") => controller.open_screen(MenuAction::Logs).await,
        (Screen::Menu, "chat") => controller.open_screen(MenuAction::Chat).await,
        (Screen::Create, "campos") => {
            for (field, label) in CREATE_FIELDS {
                let value = ask(lines, label)?;
                controller.set_create_field(*field, &value).await;
            }
        }
        (Screen::Create, "foto") => {
            let path = ask(lines, "Ruta de la foto")?;
            match read_photo(Path::new(&path)) {
                Ok(photo) => controller.attach_create_photo(photo).await,
                Err(err) => println!("No se pudo leer la foto: {err}"),
            }
        }
        (Screen::Create, "enviar") => controller.submit_create().await,
        (Screen::Query | Screen::Modify | Screen::Delete, "buscar") => {
            let doc = ask(lines, "Número de documento")?;
            controller.search_person(&doc).await;
            if let Some(person) = controller.queried_person().await {
                println!(
                    "{} {} — {} {} — {}",
                    person.primer_nombre,
                    person.apellidos,
                    person.tipo_doc,
                    person.nro_doc,
                    person.correo
                );
            }
        }
        (Screen::Modify, "campo") => {
            let name = ask(lines, "Campo (primer_nombre, apellidos, correo, celular, ...)")?;
            let Some(field) = patch_field(&name) else {
                println!("Campo desconocido: {name}");
                return Ok(());
            };
            let value = ask(lines, "Nuevo valor")?;
            controller.set_patch_field(field, &value).await;
        }
        (Screen::Modify, "enviar") => controller.submit_modify().await,
        (Screen::Delete, "eliminar") => {
            let Some(person) = controller.queried_person().await else {
                println!("Busque primero la persona a eliminar");
                return Ok(());
            };
            controller.request_delete().await;
            let answer = ask(
                lines,
                &format!(
                    "¿Está seguro de eliminar a {} {}? (si/no)",
                    person.primer_nombre, person.apellidos
                ),
            )?;
            if answer.trim().eq_ignore_ascii_case("si") {
                controller.confirm_delete().await;
            } else {
                controller.decline_delete().await;
            }
        }
        (Screen::Logs, "buscar") => {
            let operacion = ask(lines, "Tipo de operación (CREAR/CONSULTAR/MODIFICAR/ELIMINAR, vacío = todas)")?;
            let documento = ask(lines, "Documento (vacío = todos)")?;
            let filter = LogFilter {
                tipo_operacion: parse_operacion(&operacion),
                documento: if documento.trim().is_empty() {
                    None
                } else {
                    Some(documento.trim().to_string())
                },
            };
            controller.fetch_logs(filter).await;
            print_logs(controller).await;
        }
        (Screen::Logs, "todos") => {
            controller.fetch_logs(LogFilter::default()).await;
            print_logs(controller).await;
        }
        (Screen::Chat, "preguntar") => {
            let pregunta = ask(lines, "Pregunta")?;
            controller.submit_chat_question(&pregunta).await;
            for turn in controller.transcript().await {
                let who = if turn.is_user { "usted" } else { "asistente" };
                println!("[{who}] {}", turn.text);
            }
        }
        (Screen::Chat, "limpiar") => controller.clear_chat().await,
        (
            Screen::Create
            | Screen::Query
            | Screen::Modify
            | Screen::Delete
            | Screen::Logs
            | Screen::Chat,
            "volver",
        ) => controller.back_to_menu().await,
        (_, "") => {}
        (_, other) => println!("Comando desconocido: {other}"),
    }
    Ok(())
}

const CREATE_FIELDS: &[(FieldName, &str)] = &[
    (FieldName::PrimerNombre, "Primer nombre"),
    (FieldName::SegundoNombre, "Segundo nombre (opcional)"),
    (FieldName::Apellidos, "Apellidos"),
    (FieldName::FechaNacimiento, "Fecha de nacimiento (aaaa-mm-dd)"),
    (FieldName::Genero, "Género"),
    (FieldName::Correo, "Correo"),
    (FieldName::Celular, "Celular"),
    (FieldName::NroDoc, "Número de documento"),
    (FieldName::TipoDoc, "Tipo de documento"),
];

fn patch_field(name: &str) -> Option<FieldName> {
    match name.trim() {
        "primer_nombre" => Some(FieldName::PrimerNombre),
        "segundo_nombre" => Some(FieldName::SegundoNombre),
        "apellidos" => Some(FieldName::Apellidos),
        "fecha_nacimiento" => Some(FieldName::FechaNacimiento),
        "genero" => Some(FieldName::Genero),
        "correo" => Some(FieldName::Correo),
        "celular" => Some(FieldName::Celular),
        "tipo_doc" => Some(FieldName::TipoDoc),
        _ => None,
    }
}

fn parse_operacion(value: &str) -> Option<OperationKind> {
    match value.trim().to_ascii_uppercase().as_str() {
        "CREAR" => Some(OperationKind::Crear),
        "CONSULTAR" => Some(OperationKind::Consultar),
        "MODIFICAR" => Some(OperationKind::Modificar),
        "ELIMINAR" => Some(OperationKind::Eliminar),
        _ => None,
    }
}

fn read_photo(path: &Path) -> Result<PhotoUpload> {
    let bytes = fs::read(path).with_context(|| format!("no se pudo leer {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mime_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        other => return Err(anyhow::anyhow!("extensión no soportada: {other}")),
    };
    Ok(PhotoUpload {
        filename: path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("foto")
            .to_string(),
        mime_type: mime_type.to_string(),
        bytes,
    })
}

async fn print_logs(controller: &SessionController<HttpPersonasGateway>) {
    for entry in controller.logs().await {
        println!(
            "{} | {} | {} | {}",
            entry.tipo_operacion,
            entry.usuario_email,
            entry.documento_afectado,
            entry.fecha_transaccion
        );
    }
}

async fn print_status(controller: &SessionController<HttpPersonasGateway>) {
    if let Some(status) = controller.status().await {
        match status.kind {
            StatusKind::Exito => println!("✔ {}", status.text),
            StatusKind::Error => println!("✖ {}", status.text),
        }
    }
}

fn ask(lines: &mut dyn Iterator<Item = io::Result<String>>, label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(line?.trim().to_string()),
        None => Err(anyhow::anyhow!("entrada terminada")),
    }
}
