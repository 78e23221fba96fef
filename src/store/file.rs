use super::{Filter, Query, RecordStore, Row, Table};
use crate::errors::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct TableData {
    next_id: i64,
    rows: Vec<Row>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StoreData {
    #[serde(default)]
    students: TableData,
    #[serde(default)]
    attendances: TableData,
}

impl StoreData {
    fn table(&self, table: Table) -> &TableData {
        match table {
            Table::Students => &self.students,
            Table::Attendances => &self.attendances,
        }
    }

    fn table_mut(&mut self, table: Table) -> &mut TableData {
        match table {
            Table::Students => &mut self.students,
            Table::Attendances => &mut self.attendances,
        }
    }
}

/// Both tables in one JSON file, rewritten after every mutation.
pub struct FileStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file starts empty; an
    /// unreadable one is logged and also starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let data = load_data(&path).await;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn load_data(path: &Path) -> StoreData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file {}: {err}", path.display());
                StoreData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
        Err(err) => {
            error!("failed to read data file {}: {err}", path.display());
            StoreData::default()
        }
    }
}

async fn persist_data(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(data)?;
    fs::write(path, payload).await?;
    Ok(())
}

fn matches_all(filters: &[Filter], row: &Row) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

#[async_trait]
impl RecordStore for FileStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn query(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        let data = self.data.lock().await;
        let rows = data
            .table(table)
            .rows
            .iter()
            .filter(|row| matches_all(&query.filters, row))
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row, StoreError> {
        let mut data = self.data.lock().await;
        let stored = {
            let entry = data.table_mut(table);
            entry.next_id = entry.next_id.saturating_add(1);
            row.insert("id".to_string(), Value::from(entry.next_id));
            entry.rows.push(row.clone());
            row
        };

        persist_data(&self.path, &data).await?;
        Ok(stored)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<usize, StoreError> {
        let mut data = self.data.lock().await;
        let mut changed = 0;
        for row in data.table_mut(table).rows.iter_mut() {
            if matches_all(filters, row) {
                for (column, value) in &patch {
                    if column != "id" {
                        row.insert(column.clone(), value.clone());
                    }
                }
                changed += 1;
            }
        }

        if changed > 0 {
            persist_data(&self.path, &data).await?;
        }
        Ok(changed)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError> {
        let mut data = self.data.lock().await;
        let rows = &mut data.table_mut(table).rows;
        let before = rows.len();
        rows.retain(|row| !matches_all(filters, row));
        let removed = before - rows.len();

        if removed > 0 {
            persist_data(&self.path, &data).await?;
        }
        Ok(removed)
    }
}
