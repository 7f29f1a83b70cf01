use std::env;
use std::path::PathBuf;

/// Runtime tunables, loaded once at startup from the environment (with a
/// `.env` overlay via `dotenv`, matching the bundled config manager this
/// crate's ancestor used for its own settings file).
#[derive(Debug, Clone)]
pub struct Config {
    pub queue_capacity: usize,
    pub command_timeout_ms: u64,
    pub cache_max_size: usize,
    pub cache_ttl_secs: u64,
    pub enable_search_fallback: bool,
    pub enable_homepage_fallback: bool,
    pub enable_web_fill_form: bool,
    pub search_engine_url_template: String,
    pub llm_endpoint: String,
    pub llm_timeout_ms: u64,
    pub browser_headless: bool,
    pub user_data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            command_timeout_ms: 15_000,
            cache_max_size: 200,
            cache_ttl_secs: 3_600,
            enable_search_fallback: true,
            enable_homepage_fallback: true,
            enable_web_fill_form: false,
            search_engine_url_template: "https://duckduckgo.com/?q={query}".to_string(),
            llm_endpoint: "http://127.0.0.1:11434/api/generate".to_string(),
            llm_timeout_ms: 8_000,
            browser_headless: true,
            user_data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("local_command_dispatch"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut cfg = Config::default();

        if let Some(v) = env_usize("QUEUE_CAPACITY") {
            cfg.queue_capacity = v;
        }
        if let Some(v) = env_u64("COMMAND_TIMEOUT_MS") {
            cfg.command_timeout_ms = v;
        }
        if let Some(v) = env_usize("CACHE_MAX_SIZE") {
            cfg.cache_max_size = v;
        }
        if let Some(v) = env_u64("CACHE_TTL_SECS") {
            cfg.cache_ttl_secs = v;
        }
        if let Some(v) = env_bool("ENABLE_SEARCH_FALLBACK") {
            cfg.enable_search_fallback = v;
        }
        if let Some(v) = env_bool("ENABLE_HOMEPAGE_FALLBACK") {
            cfg.enable_homepage_fallback = v;
        }
        if let Some(v) = env_bool("ENABLE_WEB_FILL_FORM") {
            cfg.enable_web_fill_form = v;
        }
        if let Ok(v) = env::var("SEARCH_ENGINE_URL_TEMPLATE") {
            cfg.search_engine_url_template = v;
        }
        if let Ok(v) = env::var("LLM_ENDPOINT") {
            cfg.llm_endpoint = v;
        }
        if let Some(v) = env_u64("LLM_TIMEOUT_MS") {
            cfg.llm_timeout_ms = v;
        }
        if let Some(v) = env_bool("BROWSER_HEADLESS") {
            cfg.browser_headless = v;
        }
        if let Ok(v) = env::var("USER_DATA_DIR") {
            cfg.user_data_dir = PathBuf::from(v);
        }

        cfg
    }

    /// `command_timeout_ms <= 0` disables the per-command deadline.
    pub fn command_timeout(&self) -> Option<std::time::Duration> {
        if self.command_timeout_ms == 0 {
            None
        } else {
            Some(std::time::Duration::from_millis(self.command_timeout_ms))
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|v| match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}
