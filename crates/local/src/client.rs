use anyhow::{Context, Result};
use arrow_array::{
    Array, ArrayRef, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use std::path::Path;
use std::sync::Arc;

use bot_types::{ChatTurn, MemoryDocument, MemoryHit, MemoryStore, TurnStore};

use crate::db::table::{MEMORIES_TABLE, TURNS_TABLE};
use crate::db::{Connection, DatabaseMetadata, TableOperations};

/// LanceDB 本地存储客户端，同时实现记忆库与对话日志两个接口
pub struct LocalStore {
    conn: Connection,
    dimension: usize,
}

impl LocalStore {
    /// 打开（或创建）一个人格的数据目录
    pub async fn connect(path: &Path, embed_model: &str, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;

        let conn = Connection::connect(path).await?;

        // 维度由首次写入时的 embedding 模型固定，换模型必须重建
        let metadata = DatabaseMetadata::load_or_create(path, embed_model, dimension)?;
        metadata.validate_dimension(dimension)?;

        Ok(Self { conn, dimension })
    }

    async fn memories_table_exists(&self) -> bool {
        TableOperations::table_exists(self.conn.inner(), MEMORIES_TABLE).await
    }

    async fn turns_table_exists(&self) -> bool {
        TableOperations::table_exists(self.conn.inner(), TURNS_TABLE).await
    }

    async fn init_memories_table(&self) -> Result<()> {
        if !self.memories_table_exists().await {
            TableOperations::create_memories_table(self.conn.inner(), self.dimension).await?;
        }
        Ok(())
    }

    async fn init_turns_table(&self) -> Result<()> {
        if !self.turns_table_exists().await {
            TableOperations::create_turns_table(self.conn.inner()).await?;
        }
        Ok(())
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len != self.dimension {
            anyhow::bail!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                len
            );
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for LocalStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn count(&self) -> Result<usize> {
        if !self.memories_table_exists().await {
            return Ok(0);
        }
        let table = TableOperations::open_table(self.conn.inner(), MEMORIES_TABLE).await?;
        Ok(table.count_rows(None).await.unwrap_or(0))
    }

    async fn insert(&self, doc: MemoryDocument) -> Result<()> {
        self.check_dimension(doc.vector.len())?;

        self.init_memories_table().await?;
        let table = TableOperations::open_table(self.conn.inner(), MEMORIES_TABLE).await?;

        let batch = document_to_record_batch(&doc)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table.add(Box::new(batches)).execute().await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryHit>> {
        self.check_dimension(vector.len())?;

        if !self.memories_table_exists().await {
            return Ok(vec![]);
        }

        let table = TableOperations::open_table(self.conn.inner(), MEMORIES_TABLE).await?;

        // 记忆分区隔离：检索永远限定在单个 user_id 内
        let query = table
            .vector_search(vector)?
            .select(Select::columns(&["id", "content", "t", "_distance"]))
            .only_if(format!("user_id = '{}'", escape_literal(user_id)))
            .limit(limit);

        let mut stream = query.execute().await?;
        let mut batches = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            batches.push(batch);
        }

        parse_memory_hits(batches)
    }
}

#[async_trait]
impl TurnStore for LocalStore {
    async fn count(&self, user_id: &str) -> Result<usize> {
        if !self.turns_table_exists().await {
            return Ok(0);
        }
        let table = TableOperations::open_table(self.conn.inner(), TURNS_TABLE).await?;
        let filter = format!("user_id = '{}'", escape_literal(user_id));
        Ok(table.count_rows(Some(filter)).await.unwrap_or(0))
    }

    async fn insert(&self, turn: ChatTurn) -> Result<()> {
        self.init_turns_table().await?;
        let table = TableOperations::open_table(self.conn.inner(), TURNS_TABLE).await?;

        let batch = turn_to_record_batch(&turn)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table.add(Box::new(batches)).execute().await?;
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        if !self.turns_table_exists().await {
            return Ok(vec![]);
        }

        let table = TableOperations::open_table(self.conn.inner(), TURNS_TABLE).await?;

        let query = table
            .query()
            .select(Select::columns(&[
                "id",
                "model",
                "user_id",
                "user_input",
                "response",
                "t",
            ]))
            .only_if(format!("user_id = '{}'", escape_literal(user_id)));

        let mut stream = query.execute().await?;
        let mut batches = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            batches.push(batch);
        }

        // LanceDB 查询没有 order-by 下推，扫描后在客户端排序
        let mut turns = parse_turns(batches)?;
        turns.sort_by(|a, b| b.t.cmp(&a.t));
        turns.truncate(limit);
        Ok(turns)
    }
}

/// 过滤表达式里的字符串字面量转义
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// 将 MemoryDocument 转换为 RecordBatch
fn document_to_record_batch(doc: &MemoryDocument) -> Result<RecordBatch> {
    use arrow_array::{FixedSizeListArray, Float32Array};

    let schema = memories_schema(doc.vector.len());

    let id_array = StringArray::from(vec![doc.id.as_str()]);
    let user_id_array = StringArray::from(vec![doc.user_id.as_str()]);
    let content_array = StringArray::from(vec![doc.content.as_str()]);

    let vector_values = Float32Array::from(doc.vector.clone());
    let vector_array = FixedSizeListArray::new(
        Arc::new(arrow_schema::Field::new(
            "item",
            arrow_schema::DataType::Float32,
            true,
        )),
        doc.vector.len() as i32,
        Arc::new(vector_values),
        None,
    );

    let t_array = TimestampMillisecondArray::from(vec![doc.t.timestamp_millis()]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(id_array),
        Arc::new(user_id_array),
        Arc::new(content_array),
        Arc::new(vector_array),
        Arc::new(t_array),
    ];

    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// 将 ChatTurn 转换为 RecordBatch
fn turn_to_record_batch(turn: &ChatTurn) -> Result<RecordBatch> {
    let schema = turns_schema();

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![turn.id.as_str()])),
        Arc::new(StringArray::from(vec![turn.model.as_str()])),
        Arc::new(StringArray::from(vec![turn.user_id.as_str()])),
        Arc::new(StringArray::from(vec![turn.user_input.as_str()])),
        Arc::new(StringArray::from(vec![turn.response.as_str()])),
        Arc::new(TimestampMillisecondArray::from(vec![
            turn.t.timestamp_millis(),
        ])),
    ];

    Ok(RecordBatch::try_new(schema, arrays)?)
}

fn memories_schema(vector_dim: usize) -> Arc<arrow_schema::Schema> {
    use arrow_schema::{DataType, Field, Schema};

    Arc::new(Schema::new(vec![
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
    ]))
}

fn turns_schema() -> Arc<arrow_schema::Schema> {
    use arrow_schema::{DataType, Field, Schema};

    Arc::new(Schema::new(vec![
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
    ]))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing '{}' column", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("Invalid '{}' column type", name))
}

fn timestamp_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a TimestampMillisecondArray> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing '{}' column", name))?
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .with_context(|| format!("Invalid '{}' column type", name))
}

/// 解析向量检索结果
fn parse_memory_hits(batches: Vec<RecordBatch>) -> Result<Vec<MemoryHit>> {
    let mut hits = Vec::new();

    for batch in batches {
        let num_rows = batch.num_rows();
        if num_rows == 0 {
            continue;
        }

        let id_array = string_column(&batch, "id")?;
        let content_array = string_column(&batch, "content")?;
        let t_array = timestamp_column(&batch, "t")?;

        let distance_array = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<arrow_array::Float32Array>());

        for i in 0..num_rows {
            let score = distance_array
                .filter(|arr| arr.is_valid(i))
                .map(|arr| 1.0 - arr.value(i));

            let t = chrono::DateTime::from_timestamp_millis(t_array.value(i))
                .context("Invalid 't' timestamp")?;

            hits.push(MemoryHit {
                id: id_array.value(i).to_string(),
                content: content_array.value(i).to_string(),
                t,
                score,
            });
        }
    }

    Ok(hits)
}

/// 解析对话日志查询结果
fn parse_turns(batches: Vec<RecordBatch>) -> Result<Vec<ChatTurn>> {
    let mut turns = Vec::new();

    for batch in batches {
        let num_rows = batch.num_rows();
        if num_rows == 0 {
            continue;
        }

        let id_array = string_column(&batch, "id")?;
        let model_array = string_column(&batch, "model")?;
        let user_id_array = string_column(&batch, "user_id")?;
        let user_input_array = string_column(&batch, "user_input")?;
        let response_array = string_column(&batch, "response")?;
        let t_array = timestamp_column(&batch, "t")?;

        for i in 0..num_rows {
            let t = chrono::DateTime::from_timestamp_millis(t_array.value(i))
                .context("Invalid 't' timestamp")?;

            turns.push(ChatTurn {
                id: id_array.value(i).to_string(),
                model: model_array.value(i).to_string(),
                user_id: user_id_array.value(i).to_string(),
                user_input: user_input_array.value(i).to_string(),
                response: response_array.value(i).to_string(),
                t,
            });
        }
    }

    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const DIM: usize = 4;

    async fn store(dir: &tempfile::TempDir) -> LocalStore {
        LocalStore::connect(dir.path(), "test-embed", DIM)
            .await
            .unwrap()
    }

    fn doc(user_id: &str, content: &str, vector: Vec<f32>) -> MemoryDocument {
        MemoryDocument::new(user_id, content.to_string(), vector)
    }

    fn turn_at(user_id: &str, input: &str, response: &str, age_secs: i64) -> ChatTurn {
        let mut turn = ChatTurn::new("test-model", user_id, input, response);
        turn.t = Utc::now() - Duration::seconds(age_secs);
        turn
    }

    #[tokio::test]
    async fn test_search_is_partitioned_by_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        MemoryStore::insert(&store, doc("u1", "alice memory", vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        MemoryStore::insert(&store, doc("u2", "bob memory", vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();

        let hits = store
            .search(vec![1.0, 0.0, 0.0, 0.0], "u1", 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "alice memory");
    }

    #[tokio::test]
    async fn test_search_empty_store_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let hits = store
            .search(vec![0.0, 1.0, 0.0, 0.0], "nobody", 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(MemoryStore::count(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_rejects_wrong_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let result = MemoryStore::insert(&store, doc("u1", "bad", vec![1.0, 2.0])).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recent_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        TurnStore::insert(&store, turn_at("u1", "first", "r1", 30))
            .await
            .unwrap();
        TurnStore::insert(&store, turn_at("u1", "second", "r2", 20))
            .await
            .unwrap();
        TurnStore::insert(&store, turn_at("u1", "third", "r3", 10))
            .await
            .unwrap();
        TurnStore::insert(&store, turn_at("u2", "other", "r4", 0))
            .await
            .unwrap();

        let turns = store.recent("u1", 2).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user_input, "third");
        assert_eq!(turns[1].user_input, "second");

        assert_eq!(TurnStore::count(&store, "u1").await.unwrap(), 3);
        assert_eq!(TurnStore::count(&store, "u2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_validates_dimension() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _ = store(&dir).await;
        }
        let result = LocalStore::connect(dir.path(), "other-embed", DIM + 1).await;
        assert!(result.is_err());
    }
}
