//! インメモリのブックマークストア
//!
//! `BookmarkRepository` の契約をそのまま満たす非永続実装。
//! テストダブルとして使うほか、`--storage memory` で起動時にも選択できる。
//! 状態はインスタンスが保持し、モジュールレベルのグローバルは持たない。

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{Bookmark, BookmarkId, BookmarkPatch, NewBookmark};
use crate::store::{BookmarkRepository, StoreError};

#[derive(Debug, Default)]
struct Table {
    /// ID昇順で保持する
    rows: Vec<Bookmark>,
    /// 最後に採番したID
    last_id: BookmarkId,
}

/// インメモリブックマークストア
#[derive(Debug, Default)]
pub struct InMemoryBookmarkStore {
    table: RwLock<Table>,
    /// 次の操作で返すエラー（エラーパスのテスト用）
    next_error: Mutex<Option<StoreError>>,
}

impl InMemoryBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次の1回の操作を失敗させる
    #[allow(dead_code)]
    pub fn set_next_error(&self, error: StoreError) {
        if let Ok(mut next) = self.next_error.lock() {
            *next = Some(error);
        }
    }

    /// 現在の件数
    #[allow(dead_code)]
    pub async fn count(&self) -> usize {
        self.table.read().await.rows.len()
    }

    fn take_error(&self) -> Result<(), StoreError> {
        match self.next_error.lock().ok().and_then(|mut next| next.take()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryBookmarkStore {
    async fn list(&self) -> Result<Vec<Bookmark>, StoreError> {
        self.take_error()?;
        Ok(self.table.read().await.rows.clone())
    }

    async fn get(&self, id: BookmarkId) -> Result<Option<Bookmark>, StoreError> {
        self.take_error()?;
        let table = self.table.read().await;
        Ok(table.rows.iter().find(|b| b.id == id).cloned())
    }

    async fn insert(&self, bookmark: NewBookmark) -> Result<Bookmark, StoreError> {
        self.take_error()?;
        let mut table = self.table.write().await;
        table.last_id += 1;
        let created = bookmark.with_id(table.last_id);
        table.rows.push(created.clone());
        Ok(created)
    }

    async fn delete(&self, id: BookmarkId) -> Result<u64, StoreError> {
        self.take_error()?;
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|b| b.id != id);
        Ok((before - table.rows.len()) as u64)
    }

    async fn update(&self, id: BookmarkId, patch: BookmarkPatch) -> Result<u64, StoreError> {
        self.take_error()?;
        if patch.is_empty() {
            return Ok(0);
        }

        let mut table = self.table.write().await;
        match table.rows.iter_mut().find(|b| b.id == id) {
            Some(bookmark) => {
                patch.apply_to(bookmark);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
