//! Postgres backend. Runtime-checked queries only, so the crate builds
//! without a live database.

mod announcements;
mod attendance;
mod audit;
mod billing;
mod forms;
mod grades;
mod messages;
mod progression;
mod students;
mod tenants;
mod users;

use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
