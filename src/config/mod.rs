use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_API_URL: &str = "http://localhost:54321";
pub(crate) const DEFAULT_AUTOSAVE_MS: u32 = 2000;
pub(crate) const DEFAULT_LOG_LEVEL: &str = "info";

/// Runtime settings injected by the hosting page as `window.ENV`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct EnvConfig {
    pub api_url: String,
    pub api_key: String,
    /// Debounce window for autosave.
    pub autosave_ms: u32,
    /// `EnvFilter` directive for the console logger.
    pub log_level: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            autosave_ms: DEFAULT_AUTOSAVE_MS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl EnvConfig {
    pub fn load() -> Self {
        let env = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object())
            .and_then(|env| serde_json::from_str::<serde_json::Value>(&js_stringify(&env)?).ok());

        match env {
            Some(value) => Self::from_value(&value),
            None => Self::default(),
        }
    }

    /// Read settings from a JSON object.
    ///
    /// Both `API_URL` (upper-case) and `api_url` spellings are accepted for every key;
    /// missing or mistyped keys keep their defaults.
    pub fn from_value(env: &serde_json::Value) -> Self {
        let get = |key: &str| env.get(key.to_ascii_uppercase()).or_else(|| env.get(key));
        let get_s = |key: &str| get(key).and_then(|v| v.as_str()).map(|s| s.to_string());

        let defaults = Self::default();
        let autosave_ms = get("autosave_ms")
            .and_then(|v| {
                v.as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            })
            .and_then(|ms| u32::try_from(ms).ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(defaults.autosave_ms);

        Self {
            api_url: get_s("api_url")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.api_url),
            api_key: get_s("api_key").unwrap_or(defaults.api_key),
            autosave_ms,
            log_level: get_s("log_level")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.log_level),
        }
    }
}

fn js_stringify(value: &wasm_bindgen::JsValue) -> Option<String> {
    js_sys::JSON::stringify(value).ok()?.as_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let cfg = EnvConfig::from_value(&serde_json::json!({}));
        assert_eq!(cfg, EnvConfig::default());
        assert_eq!(cfg.autosave_ms, 2000);
    }

    #[test]
    fn test_upper_case_keys_win() {
        let cfg = EnvConfig::from_value(&serde_json::json!({
            "API_URL": "https://db.example.com",
            "api_url": "http://ignored",
            "API_KEY": "anon",
            "LOG_LEVEL": "debug"
        }));
        assert_eq!(cfg.api_url, "https://db.example.com");
        assert_eq!(cfg.api_key, "anon");
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn test_autosave_ms_accepts_number_or_string() {
        let cfg = EnvConfig::from_value(&serde_json::json!({"autosave_ms": 500}));
        assert_eq!(cfg.autosave_ms, 500);
        let cfg = EnvConfig::from_value(&serde_json::json!({"AUTOSAVE_MS": " 750 "}));
        assert_eq!(cfg.autosave_ms, 750);
    }

    #[test]
    fn test_bad_autosave_ms_falls_back() {
        for bad in [serde_json::json!(0), serde_json::json!("soon"), serde_json::json!(-5)] {
            let cfg = EnvConfig::from_value(&serde_json::json!({ "autosave_ms": bad }));
            assert_eq!(cfg.autosave_ms, DEFAULT_AUTOSAVE_MS);
        }
    }
}
