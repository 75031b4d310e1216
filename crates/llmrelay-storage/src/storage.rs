use sea_orm::{ActiveValue, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use time::OffsetDateTime;

use crate::entities;

/// One completed Forwarder attempt, ready to be persisted.
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub platform: String,
    pub model: Option<String>,
    pub provider: String,
    pub http_code: i32,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_create_tokens: i64,
    pub cache_read_tokens: i64,
    pub reasoning_tokens: i64,
    pub is_stream: bool,
    pub duration_sec: f64,
}

#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
}

impl SeaOrmStorage {
    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        let db = Database::connect(database_url).await?;
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn sync(&self) -> Result<(), DbErr> {
        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::RequestLog)
            .sync(&self.db)
            .await
    }

    pub async fn insert_request_log(&self, entry: RequestLogEntry) -> Result<(), DbErr> {
        self.insert_request_log_batch(vec![entry]).await
    }

    pub async fn insert_request_log_batch(&self, entries: Vec<RequestLogEntry>) -> Result<(), DbErr> {
        if entries.is_empty() {
            return Ok(());
        }
        let now = OffsetDateTime::now_utc();
        let models = entries.into_iter().map(|entry| entities::request_log::ActiveModel {
            id: ActiveValue::NotSet,
            created_at: ActiveValue::Set(now),
            platform: ActiveValue::Set(entry.platform),
            model: ActiveValue::Set(entry.model),
            provider: ActiveValue::Set(entry.provider),
            http_code: ActiveValue::Set(entry.http_code),
            input_tokens: ActiveValue::Set(entry.input_tokens),
            output_tokens: ActiveValue::Set(entry.output_tokens),
            cache_create_tokens: ActiveValue::Set(entry.cache_create_tokens),
            cache_read_tokens: ActiveValue::Set(entry.cache_read_tokens),
            reasoning_tokens: ActiveValue::Set(entry.reasoning_tokens),
            is_stream: ActiveValue::Set(entry.is_stream),
            duration_sec: ActiveValue::Set(entry.duration_sec),
        });
        entities::RequestLog::insert_many(models).exec(&self.db).await?;
        Ok(())
    }
}
