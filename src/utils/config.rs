use std::env;

const PRODUCTION_BACKEND_URL: &str = "https://boganto.com";
const DEVELOPMENT_BACKEND_URL: &str = "http://localhost:8000";

/// Which half of the upload pipeline this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    /// Browser-facing proxy routes.
    Relay,
    /// The storage endpoint the relay forwards images to.
    Storage,
}

impl ServiceRole {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relay" | "proxy" => Some(Self::Relay),
            "storage" | "backend" => Some(Self::Storage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub temp_dir: String,
    pub cors_origins: Vec<String>,
    pub request_timeout_seconds: u64,
    pub backend_url: String,
    pub backend_timeout_seconds: u64,
    pub role: ServiceRole,
    pub uploads_dir: String,
    pub admin_session_cookie: String,
    pub admin_session_tokens: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_file_size: 5 * 1024 * 1024, // 5MB
            temp_dir: "/tmp/blog-cms-gateway".to_string(),
            cors_origins: vec!["*".to_string()],
            request_timeout_seconds: 30,
            backend_url: DEVELOPMENT_BACKEND_URL.to_string(),
            backend_timeout_seconds: 10,
            role: ServiceRole::Relay,
            uploads_dir: "uploads".to_string(),
            admin_session_cookie: "admin_session".to_string(),
            admin_session_tokens: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }

        if let Ok(port) = env::var("PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                config.port = port_num;
            }
        }

        if let Ok(max_size) = env::var("MAX_FILE_SIZE") {
            if let Ok(size) = max_size.parse::<usize>() {
                config.max_file_size = size;
            }
        }

        if let Ok(temp_dir) = env::var("TEMP_DIR") {
            config.temp_dir = temp_dir;
        }

        if let Ok(origins) = env::var("CORS_ORIGINS") {
            config.cors_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECONDS") {
            if let Ok(timeout_num) = timeout.parse::<u64>() {
                config.request_timeout_seconds = timeout_num;
            }
        }

        let production = env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        config.backend_url = resolve_backend_url(
            env::var("BACKEND_URL").ok(),
            env::var("NEXT_PUBLIC_API_BASE_URL").ok(),
            production,
        );

        if let Ok(timeout) = env::var("BACKEND_TIMEOUT_SECONDS") {
            if let Ok(timeout_num) = timeout.parse::<u64>() {
                config.backend_timeout_seconds = timeout_num;
            }
        }

        if let Some(role) = env::var("SERVICE_ROLE").ok().as_deref().and_then(ServiceRole::parse) {
            config.role = role;
        }

        if let Ok(uploads_dir) = env::var("UPLOADS_DIR") {
            config.uploads_dir = uploads_dir;
        }

        if let Ok(cookie) = env::var("ADMIN_SESSION_COOKIE") {
            if !cookie.trim().is_empty() {
                config.admin_session_cookie = cookie.trim().to_string();
            }
        }

        if let Ok(tokens) = env::var("ADMIN_SESSION_TOKENS") {
            config.admin_session_tokens = tokens
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Joins a backend path such as `/api/auth/login` onto the configured origin.
    pub fn backend_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.backend_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// `BACKEND_URL` wins over `NEXT_PUBLIC_API_BASE_URL`; blank values count as unset.
fn resolve_backend_url(
    backend_url: Option<String>,
    public_base_url: Option<String>,
    production: bool,
) -> String {
    backend_url
        .into_iter()
        .chain(public_base_url)
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .find(|url| !url.is_empty())
        .unwrap_or_else(|| {
            if production {
                PRODUCTION_BACKEND_URL.to_string()
            } else {
                DEVELOPMENT_BACKEND_URL.to_string()
            }
        })
}
