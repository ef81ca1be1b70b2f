/// Row of the `dispatches` table (migrations/0001_dispatches.sql).
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct DispatchRow {
    pub id: i64,
    pub kind: String,
    pub game_id: Option<i64>,
    pub body: String,
    pub success: bool,
    pub error: Option<String>,
    pub created_at: String,
}
