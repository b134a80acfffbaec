use anyhow::Result;
use lancedb::table::Table;
use std::sync::Arc;

pub const MEMORIES_TABLE: &str = "memories";
pub const TURNS_TABLE: &str = "turns";

pub struct TableOperations;

impl TableOperations {
    /// 向量记忆表：id / user_id / content / vector / t
    pub async fn create_memories_table(
        conn: &lancedb::connection::Connection,
        vector_dim: usize,
    ) -> Result<Table> {
        use arrow_schema::{DataType, Field, Schema};

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new(
                "t",
                DataType::Timestamp(arrow_schema::TimeUnit::Millisecond, None),
                false,
            ),
        ]));

        let table = conn
            .create_empty_table(MEMORIES_TABLE, schema)
            .execute()
            .await?;

        Ok(table)
    }

    /// 对话日志表：id / model / user_id / user_input / response / t
    pub async fn create_turns_table(conn: &lancedb::connection::Connection) -> Result<Table> {
        use arrow_schema::{DataType, Field, Schema};

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("model", DataType::Utf8, false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("user_input", DataType::Utf8, false),
            Field::new("response", DataType::Utf8, false),
            Field::new(
                "t",
                DataType::Timestamp(arrow_schema::TimeUnit::Millisecond, None),
                false,
            ),
        ]));

        let table = conn
            .create_empty_table(TURNS_TABLE, schema)
            .execute()
            .await?;

        Ok(table)
    }

    pub async fn open_table(
        conn: &lancedb::connection::Connection,
        table_name: &str,
    ) -> Result<Table> {
        let table = conn.open_table(table_name).execute().await?;

        Ok(table)
    }

    pub async fn table_exists(conn: &lancedb::connection::Connection, table_name: &str) -> bool {
        conn.table_names()
            .execute()
            .await
            .map(|names| names.contains(&table_name.to_string()))
            .unwrap_or(false)
    }
}
