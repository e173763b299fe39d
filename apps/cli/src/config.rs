use std::{collections::HashMap, fs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8880".into(),
        }
    }
}

/// Precedence: defaults, then `client.toml`, then environment. The
/// `--api-url` flag is applied by the caller on top of this.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        apply_file(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("PERSONAS_API_URL") {
        settings.api_url = v;
    }

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("api_url") {
            settings.api_url = v.clone();
        }
    }
}
