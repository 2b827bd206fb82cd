use std::collections::{HashMap, HashSet};
use std::result::Result as DefaultResult;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use ecommerce_common::config::AppInMemoryDbCfg;
use ecommerce_common::error::AppErrorCode;

use crate::error::AppError;

// simple implementation of in-memory data storage

// application callers are responsible to maintain the structure
// of each row in each table. Each element of a row is stringified
// regardless of its original types (integer, decimal, timestamp)
type InnerRow = Vec<String>;
type InnerTable = HashMap<String, InnerRow>;
type AllTable = HashMap<String, InnerTable>;
pub type AppInMemUpdateData = AllTable;
pub type AppInMemDeleteInfo = HashMap<String, Vec<String>>; // list of IDs per table
pub type AppInMemFetchKeys = HashMap<String, Vec<String>>; // list of IDs per table
pub type AppInMemFetchedData = AllTable;
pub type AppInMemFetchedSingleTable = InnerTable;
pub type AppInMemFetchedSingleRow = InnerRow;

const LOCK_ACQUIRE_TIMEOUT_SECS: u64 = 5;

pub trait AbsDStoreFilterKeyOp: Send + Sync {
    fn filter(&self, k: &String, v: &Vec<String>) -> bool;
}

/// Exclusive access to every table of the datastore.
///
/// Rows read through the lock reflect all committed transactions. Changes
/// are applied only by [`AbstInMemoryDStore::save_release`] or
/// [`AbstInMemoryDStore::commit_release`], dropping the lock without
/// calling either of them discards the whole transaction.
pub struct AppInMemDstoreLock {
    guard: OwnedMutexGuard<AllTable>,
}

impl AppInMemDstoreLock {
    pub fn fetch(&self, info: AppInMemFetchKeys) -> DefaultResult<AppInMemFetchedData, AppError> {
        _fetch(&self.guard, info)
    }

    pub fn filter_keys(
        &self,
        label: &str,
        op: &dyn AbsDStoreFilterKeyOp,
    ) -> DefaultResult<Vec<String>, AppError> {
        _filter_keys(&self.guard, label, op)
    }
}

#[async_trait]
pub trait AbstInMemoryDStore: Send + Sync {
    async fn create_table(&self, label: &str) -> DefaultResult<(), AppError>;
    async fn save(&self, data: AppInMemUpdateData) -> DefaultResult<usize, AppError>;
    async fn delete(&self, info: AppInMemDeleteInfo) -> DefaultResult<usize, AppError>;
    async fn fetch(&self, info: AppInMemFetchKeys) -> DefaultResult<AppInMemFetchedData, AppError>;
    async fn filter_keys(
        &self,
        label: String,
        op: &dyn AbsDStoreFilterKeyOp,
    ) -> DefaultResult<Vec<String>, AppError>;
    async fn fetch_acquire(
        &self,
        info: AppInMemFetchKeys,
    ) -> DefaultResult<(AppInMemFetchedData, AppInMemDstoreLock), AppError>;
    fn save_release(
        &self,
        data: AppInMemUpdateData,
        lock: AppInMemDstoreLock,
    ) -> DefaultResult<usize, AppError>;
    fn commit_release(
        &self,
        data: AppInMemUpdateData,
        deleting: AppInMemDeleteInfo,
        lock: AppInMemDstoreLock,
    ) -> DefaultResult<usize, AppError>;
}

pub struct AppInMemoryDStore {
    max_items_per_table: u32,
    table_map: Arc<Mutex<AllTable>>,
}

fn _check_table_existence<'a, I>(map: &AllTable, labels: I) -> DefaultResult<(), AppError>
where
    I: Iterator<Item = &'a String>,
{
    let mut labels = labels;
    if let Some(d) = labels.find(|label| !map.contains_key(label.as_str())) {
        Err(AppError {
            detail: Some(d.to_string()),
            code: AppErrorCode::DataTableNotExist,
        })
    } else {
        Ok(())
    }
}

fn _fetch(map: &AllTable, info: AppInMemFetchKeys) -> DefaultResult<AppInMemFetchedData, AppError> {
    _check_table_existence(map, info.keys())?;
    let out = info
        .into_iter()
        .map(|(label, ids)| {
            let rs_t = match map.get(label.as_str()) {
                Some(table) => ids
                    .into_iter()
                    .filter_map(|id| table.get(id.as_str()).map(|row| (id, row.clone())))
                    .collect::<InnerTable>(),
                None => InnerTable::new(),
            };
            (label, rs_t)
        })
        .collect::<AllTable>();
    Ok(out)
}

fn _filter_keys(
    map: &AllTable,
    label: &str,
    op: &dyn AbsDStoreFilterKeyOp,
) -> DefaultResult<Vec<String>, AppError> {
    let table = map.get(label).ok_or(AppError {
        detail: Some(label.to_string()),
        code: AppErrorCode::DataTableNotExist,
    })?;
    let out = table
        .iter()
        .filter(|(k, v)| op.filter(k, v))
        .map(|(k, _v)| k.clone())
        .collect();
    Ok(out)
}

impl AppInMemoryDStore {
    pub fn new(cfg: &AppInMemoryDbCfg) -> Self {
        Self {
            table_map: Arc::new(Mutex::new(HashMap::new())),
            max_items_per_table: cfg.max_items,
        }
    }

    async fn try_acquire(&self) -> DefaultResult<OwnedMutexGuard<AllTable>, AppError> {
        let fut = self.table_map.clone().lock_owned();
        tokio::time::timeout(Duration::from_secs(LOCK_ACQUIRE_TIMEOUT_SECS), fut)
            .await
            .map_err(|e| AppError {
                detail: Some(e.to_string() + ", source: AppInMemoryDStore"),
                code: AppErrorCode::AcquireLockFailure,
            })
    }

    // all checks run before any table is modified, so a rejected batch
    // leaves every table untouched
    fn _apply(
        &self,
        map: &mut AllTable,
        data: AppInMemUpdateData,
        deleting: AppInMemDeleteInfo,
    ) -> DefaultResult<usize, AppError> {
        _check_table_existence(map, data.keys().chain(deleting.keys()))?;
        for (label, table) in map.iter() {
            let removed = deleting
                .get(label)
                .map(|ids| {
                    ids.iter()
                        .filter(|id| table.contains_key(id.as_str()))
                        .collect::<HashSet<_>>()
                })
                .unwrap_or_default();
            let num_added = data
                .get(label)
                .map(|rows| {
                    rows.keys()
                        .filter(|id| !table.contains_key(id.as_str()) || removed.contains(id))
                        .count()
                })
                .unwrap_or(0);
            let projected = table.len() - removed.len() + num_added;
            if projected > self.max_items_per_table as usize {
                let msg = format!(
                    "table:{}, projected:{}, limit:{}",
                    label, projected, self.max_items_per_table
                );
                return Err(AppError {
                    detail: Some(msg),
                    code: AppErrorCode::ExceedingMaxLimit,
                });
            }
        }
        let num_deleted: usize = deleting
            .into_iter()
            .map(|(label, ids)| match map.get_mut(label.as_str()) {
                Some(table) => ids.iter().filter_map(|id| table.remove(id)).count(),
                None => 0,
            })
            .sum();
        let num_saved: usize = data
            .into_iter()
            .map(|(label, rows)| match map.get_mut(label.as_str()) {
                Some(table) => {
                    let n = rows.len();
                    table.extend(rows);
                    n
                }
                None => 0,
            })
            .sum();
        Ok(num_saved + num_deleted)
    } // end of fn _apply
} // end of impl AppInMemoryDStore

#[async_trait]
impl AbstInMemoryDStore for AppInMemoryDStore {
    async fn create_table(&self, label: &str) -> DefaultResult<(), AppError> {
        let mut guard = self.try_acquire().await?;
        if !guard.contains_key(label) {
            guard.insert(label.to_string(), HashMap::new());
        }
        Ok(())
    }

    async fn save(&self, data: AppInMemUpdateData) -> DefaultResult<usize, AppError> {
        let mut guard = self.try_acquire().await?;
        self._apply(&mut guard, data, HashMap::new())
    }

    async fn delete(&self, info: AppInMemDeleteInfo) -> DefaultResult<usize, AppError> {
        let mut guard = self.try_acquire().await?;
        self._apply(&mut guard, HashMap::new(), info)
    }

    async fn fetch(&self, info: AppInMemFetchKeys) -> DefaultResult<AppInMemFetchedData, AppError> {
        let guard = self.try_acquire().await?;
        _fetch(&guard, info)
    }

    async fn filter_keys(
        &self,
        label: String,
        op: &dyn AbsDStoreFilterKeyOp,
    ) -> DefaultResult<Vec<String>, AppError> {
        let guard = self.try_acquire().await?;
        _filter_keys(&guard, label.as_str(), op)
    }

    async fn fetch_acquire(
        &self,
        info: AppInMemFetchKeys,
    ) -> DefaultResult<(AppInMemFetchedData, AppInMemDstoreLock), AppError> {
        let guard = self.try_acquire().await?;
        let fetched = _fetch(&guard, info)?;
        Ok((fetched, AppInMemDstoreLock { guard }))
    }

    fn save_release(
        &self,
        data: AppInMemUpdateData,
        lock: AppInMemDstoreLock,
    ) -> DefaultResult<usize, AppError> {
        self.commit_release(data, HashMap::new(), lock)
    }

    fn commit_release(
        &self,
        data: AppInMemUpdateData,
        deleting: AppInMemDeleteInfo,
        lock: AppInMemDstoreLock,
    ) -> DefaultResult<usize, AppError> {
        let mut guard = lock.guard;
        self._apply(&mut guard, data, deleting)
    } // lock released at the end of this scope
} // end of impl AppInMemoryDStore
