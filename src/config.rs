use std::env;

/// Everything read from the environment, resolved once at startup.  Handlers
/// and clients take values from here instead of touching `env` at call time.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub bland_api_url: String,
    pub bland_api_key: String,
    pub smtp_host: String,
    pub email_user: String,
    pub email_pass: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL not set!"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET not set!"),
            bland_api_url: env::var("BLAND_API_URL")
                .unwrap_or_else(|_| "https://api.bland.ai".to_string()),
            bland_api_key: env::var("BLAND_API_KEY").expect("BLAND_API_KEY not set!"),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            email_user: env::var("EMAIL_USER").expect("EMAIL_USER not set!"),
            email_pass: env::var("EMAIL_PASS").expect("EMAIL_PASS not set!"),
        }
    }
}
