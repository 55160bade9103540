use std::path::Path;

use super::types::AppConfig;

/// Load `config.toml` from the working directory, falling back to defaults,
/// then apply `SANDGATE_*` environment overrides.
pub fn load_default() -> anyhow::Result<AppConfig> {
    load_from(Path::new("config.toml"))
}

pub fn load_from(path: &Path) -> anyhow::Result<AppConfig> {
    let mut cfg: AppConfig = if path.exists() {
        let s = std::fs::read_to_string(path)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    if let Ok(v) = std::env::var("SANDGATE_BASE_URL") {
        if !v.trim().is_empty() {
            cfg.gateway.base_url = v;
        }
    }
    if let Ok(v) = std::env::var("SANDGATE_API_TOKEN") {
        if !v.trim().is_empty() {
            cfg.gateway.api_token = v;
        }
    }
    if let Ok(v) = std::env::var("SANDGATE_VERIFY_TLS") {
        match v.trim() {
            "0" | "false" => cfg.gateway.verify_tls = false,
            "1" | "true" => cfg.gateway.verify_tls = true,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("SANDGATE_DB_PATH") {
        if !v.trim().is_empty() {
            cfg.store.path = v;
        }
    }

    Ok(cfg)
}
