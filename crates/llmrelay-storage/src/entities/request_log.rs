use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// One row per completed Forwarder attempt, success or failure.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "request_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub created_at: OffsetDateTime,
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

impl ActiveModelBehavior for ActiveModel {}
