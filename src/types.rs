use sqlx::{Pool, Postgres};

use crate::bland::BlandClient;
use crate::config::Config;
use crate::ratelimit::RateLimiter;
use crate::tasks::Mailer;

pub struct AppState {
    pub config: Config,
    pub bland: BlandClient,
    pub mailer: Mailer,
    pub db_pool: Pool<Postgres>,
    pub rate_limiter: RateLimiter,
}
