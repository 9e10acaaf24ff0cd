// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory containing pre-built frontend files to serve.
    /// When set, the backend serves static files from this path.
    pub static_dir: Option<PathBuf>,
    /// Path to the curated fallback seed pool JSON file.
    pub seeds_path: PathBuf,
    /// API key for the completion backend. Absent means seed generation
    /// skips the model and draws from the fallback pool.
    pub openai_api_key: Option<String>,
    /// Model name for the completion backend.
    pub openai_model: String,
    /// Base URL of the completion API (overridable for tests).
    pub openai_base_url: String,
    /// FRED API keys, rotated round-robin across requests.
    pub fred_api_keys: Vec<String>,
    /// Base URL of the FRED API (overridable for tests).
    pub fred_base_url: String,
    /// Base URL of the search-interest API (overridable for tests).
    pub trends_base_url: String,
    /// Base URL of the NBER macrohistory archive (overridable for tests).
    pub nber_base_url: String,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `STATIC_DIR` - Path to frontend dist directory for static file serving
    /// - `PUZZLE_SEEDS_PATH` - Path to the fallback seed pool (default: `data/puzzle_seeds.json`)
    /// - `OPENAI_API_KEY` - Completion backend key (optional)
    /// - `OPENAI_MODEL` - Completion model (default: `gpt-4o-mini`)
    /// - `OPENAI_BASE_URL` - Completion API base URL
    /// - `FRED_API_KEYS` - Comma-separated FRED keys (or single `FRED_API_KEY`)
    /// - `FRED_BASE_URL`, `TRENDS_BASE_URL`, `NBER_BASE_URL` - Upstream base URLs
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--static-dir <DIR>` - Override the static directory
    /// - `--seeds-path <FILE>` - Override the seed pool path
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(&args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let static_dir = Self::parse_cli_value(&args, "--static-dir")
            .or_else(|| std::env::var("STATIC_DIR").ok())
            .map(PathBuf::from);

        let seeds_path = Self::parse_cli_value(&args, "--seeds-path")
            .or_else(|| std::env::var("PUZZLE_SEEDS_PATH").ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/puzzle_seeds.json"));

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());

        // FRED_API_KEYS holds a comma-separated pool; FRED_API_KEY a single key.
        let fred_api_keys = std::env::var("FRED_API_KEYS")
            .ok()
            .map(|v| Self::parse_key_list(&v))
            .filter(|keys| !keys.is_empty())
            .or_else(|| {
                std::env::var("FRED_API_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| vec![k.trim().to_string()])
            })
            .unwrap_or_default();

        let fred_base_url = std::env::var("FRED_BASE_URL")
            .unwrap_or_else(|_| "https://api.stlouisfed.org".to_string());

        let trends_base_url = std::env::var("TRENDS_BASE_URL")
            .unwrap_or_else(|_| "https://trends.google.com".to_string());

        let nber_base_url = std::env::var("NBER_BASE_URL")
            .unwrap_or_else(|_| "https://data.nber.org".to_string());

        Config {
            port,
            static_dir,
            seeds_path,
            openai_api_key,
            openai_model,
            openai_base_url,
            fred_api_keys,
            fred_base_url,
            trends_base_url,
            nber_base_url,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }

    /// Split a comma-separated key list, dropping empty entries.
    pub(crate) fn parse_key_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}
