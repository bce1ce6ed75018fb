//! JSON-lines durable tier
//!
//! Each `put` appends the full record as one line. On read the file is folded
//! by id, later lines replacing earlier ones, so updates never rewrite the file.

use super::{DurableBackend, Result, TradeRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct JsonlBackend {
    path: PathBuf,
    /// Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl JsonlBackend {
    /// Open the file at `path`, creating parent directories as needed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        info!("Trade store file: {:?}", path);

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<TradeRecord>> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut order = Vec::new();
        let mut latest: HashMap<Uuid, TradeRecord> = HashMap::new();
        for (line_no, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TradeRecord>(line) {
                Ok(record) => {
                    if !latest.contains_key(&record.id) {
                        order.push(record.id);
                    }
                    latest.insert(record.id, record);
                }
                // A torn final line from a crash mid-append
                Err(e) => warn!("Skipping malformed trade line {}: {}", line_no + 1, e),
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| latest.remove(&id))
            .collect())
    }
}

#[async_trait]
impl DurableBackend for JsonlBackend {
    async fn put(&self, record: &TradeRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(trade = %record.id, "Persisted trade");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TradeRecord>> {
        Ok(self.load().await?.into_iter().find(|record| record.id == id))
    }

    async fn all(&self) -> Result<Vec<TradeRecord>> {
        self.load().await
    }
}
