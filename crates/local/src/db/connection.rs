use anyhow::{Context, Result};
use lancedb::connection::Connection as LanceConnection;
use std::path::Path;

pub struct Connection {
    pub conn: LanceConnection,
}

impl Connection {
    pub async fn connect(path: &Path) -> Result<Self> {
        let conn = lancedb::connect(&path.to_string_lossy())
            .execute()
            .await
            .with_context(|| format!("Failed to connect to database: {}", path.display()))?;

        Ok(Self { conn })
    }

    pub fn inner(&self) -> &LanceConnection {
        &self.conn
    }
}
