//! SQLiteブックマークストア
//!
//! `bookmark_table` に対する一覧・取得・作成・削除・部分更新を提供する。
//! - 書き込み: 専用の単一接続（Arc<Mutex<Connection>>）
//! - 読み取り: deadpool-sqliteによるasync接続プール
//!
//! ストアは入力の検証を行わない。呼び出し側で検証済みの値のみを渡すこと。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::{Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::model::{Bookmark, BookmarkId, BookmarkPatch, NewBookmark};

/// ストアエラー
#[derive(Debug, Error)]
pub enum StoreError {
    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(String),

    /// プール取得エラー
    #[error("プールエラー: {0}")]
    Pool(String),

    /// 接続構築エラー
    #[error("接続構築エラー: {0}")]
    Build(String),

    /// ブロッキングタスクの実行エラー
    #[error("タスク実行エラー: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<deadpool_sqlite::BuildError> for StoreError {
    fn from(err: deadpool_sqlite::BuildError) -> Self {
        StoreError::Build(err.to_string())
    }
}

impl From<deadpool_sqlite::PoolError> for StoreError {
    fn from(err: deadpool_sqlite::PoolError) -> Self {
        StoreError::Pool(err.to_string())
    }
}

impl From<deadpool_sqlite::InteractError> for StoreError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

/// ブックマーク永続化用トレイト
///
/// SQLite実装とインメモリ実装（テスト用）を差し替え可能にする。
/// 再試行は行わず、失敗はそのまま呼び出し側に返す。
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// 全件をID昇順で取得（空なら空のVec）
    async fn list(&self) -> Result<Vec<Bookmark>, StoreError>;

    /// IDで取得
    ///
    /// # Returns
    /// * `Ok(Some(Bookmark))` - 見つかった
    /// * `Ok(None)` - 存在しない
    async fn get(&self, id: BookmarkId) -> Result<Option<Bookmark>, StoreError>;

    /// 新規作成し、採番されたIDを含むレコードを返す
    async fn insert(&self, bookmark: NewBookmark) -> Result<Bookmark, StoreError>;

    /// IDで削除し、削除件数（0または1）を返す
    async fn delete(&self, id: BookmarkId) -> Result<u64, StoreError>;

    /// IDで部分更新し、更新件数（0または1）を返す
    ///
    /// 更新後のレコードは返さない。必要なら `get` で再取得すること。
    async fn update(&self, id: BookmarkId, patch: BookmarkPatch) -> Result<u64, StoreError>;
}

/// SQLiteデータベースのスキーマを定義するSQL
const SCHEMA_SQL: &str = r#"
-- WALモード設定
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;

-- ブックマークテーブル（AUTOINCREMENTでIDを再利用しない）
CREATE TABLE IF NOT EXISTS bookmark_table (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    rating INTEGER NOT NULL,
    description TEXT NOT NULL
);
"#;

const SELECT_COLUMNS: &str = "id, title, url, rating, description";

/// SQLiteブックマークストア
pub struct SqliteBookmarkStore {
    /// 書き込み専用接続（低頻度のため単一接続で十分）
    write_conn: Arc<Mutex<Connection>>,
    /// 読み取り用async接続プール
    read_pool: Pool,
}

impl SqliteBookmarkStore {
    /// 新しいSqliteBookmarkStoreを作成
    ///
    /// データベースファイルを開き、スキーマを初期化する。
    ///
    /// # Arguments
    /// * `db_path` - データベースファイルのパス
    pub async fn new(db_path: &str) -> Result<Self, StoreError> {
        let write_conn = Connection::open(db_path)?;
        write_conn.execute_batch(SCHEMA_SQL)?;

        // 読み取り用プール（最大4接続）
        let read_pool = Config::new(db_path)
            .builder(Runtime::Tokio1)
            .map_err(|e| StoreError::Build(e.to_string()))?
            .max_size(4)
            .build()?;

        Ok(Self {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
        })
    }

    /// 書き込み用接続でクロージャをブロッキングスレッド上で実行する
    async fn with_write_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.write_conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Database("書き込み接続のロックが破損しています".to_string()))?;
            f(&conn)
        })
        .await?
    }

    /// 行をBookmarkに変換
    fn map_row(row: &Row<'_>) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            rating: row.get(3)?,
            description: row.get(4)?,
        })
    }

    /// UPDATE文のSET句とパラメータを構築（内部用）
    ///
    /// パッチで指定されたフィールドのみを対象にする。
    fn build_set_clause(patch: &BookmarkPatch) -> (String, Vec<rusqlite::types::Value>) {
        use rusqlite::types::Value;

        let mut assignments: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        let mut push = |column: &str, value: Value| {
            params.push(value);
            assignments.push(format!("{} = ?{}", column, params.len()));
        };

        if let Some(title) = &patch.title {
            push("title", Value::Text(title.clone()));
        }
        if let Some(url) = &patch.url {
            push("url", Value::Text(url.clone()));
        }
        if let Some(rating) = patch.rating {
            push("rating", Value::Integer(rating));
        }
        if let Some(description) = &patch.description {
            push("description", Value::Text(description.clone()));
        }

        (assignments.join(", "), params)
    }
}

#[async_trait]
impl BookmarkRepository for SqliteBookmarkStore {
    async fn list(&self) -> Result<Vec<Bookmark>, StoreError> {
        let conn = self.read_pool.get().await?;

        conn.interact(|conn| -> Result<Vec<Bookmark>, StoreError> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM bookmark_table ORDER BY id ASC",
                SELECT_COLUMNS
            ))?;
            let bookmarks = stmt
                .query_map([], Self::map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(bookmarks)
        })
        .await?
    }

    async fn get(&self, id: BookmarkId) -> Result<Option<Bookmark>, StoreError> {
        let conn = self.read_pool.get().await?;

        conn.interact(move |conn| -> Result<Option<Bookmark>, StoreError> {
            let bookmark = conn
                .query_row(
                    &format!("SELECT {} FROM bookmark_table WHERE id = ?1", SELECT_COLUMNS),
                    [id],
                    Self::map_row,
                )
                .optional()?;
            Ok(bookmark)
        })
        .await?
    }

    async fn insert(&self, bookmark: NewBookmark) -> Result<Bookmark, StoreError> {
        self.with_write_conn(move |conn| {
            let inserted = conn.query_row(
                &format!(
                    "INSERT INTO bookmark_table (title, url, rating, description) VALUES (?1, ?2, ?3, ?4) RETURNING {}",
                    SELECT_COLUMNS
                ),
                rusqlite::params![
                    &bookmark.title,
                    &bookmark.url,
                    bookmark.rating,
                    &bookmark.description,
                ],
                Self::map_row,
            )?;
            Ok(inserted)
        })
        .await
    }

    async fn delete(&self, id: BookmarkId) -> Result<u64, StoreError> {
        self.with_write_conn(move |conn| {
            let rows_affected = conn.execute("DELETE FROM bookmark_table WHERE id = ?1", [id])?;
            Ok(rows_affected as u64)
        })
        .await
    }

    async fn update(&self, id: BookmarkId, patch: BookmarkPatch) -> Result<u64, StoreError> {
        if patch.is_empty() {
            return Ok(0);
        }

        self.with_write_conn(move |conn| {
            let (set_clause, mut params) = Self::build_set_clause(&patch);
            params.push(rusqlite::types::Value::Integer(id));
            let sql = format!(
                "UPDATE bookmark_table SET {} WHERE id = ?{}",
                set_clause,
                params.len()
            );

            let rows_affected = conn.execute(&sql, rusqlite::params_from_iter(params))?;
            Ok(rows_affected as u64)
        })
        .await
    }
}
