//! サーバー設定
//!
//! 環境変数から読み込み、コマンドライン引数で上書きする。
//!
//! # 環境変数
//! - `API_TOKEN`: APIトークン（必須）
//! - `DB_PATH`: データベースファイルのパス（デフォルト: bookmarks.db）
//! - `BIND_ADDR`: リッスンアドレス（デフォルト: 127.0.0.1:8000）
//! - `ROUTE_PREFIX`: ルートのマウント先（デフォルト: なし。例: /api）
//! - `STORAGE_BACKEND`: `sqlite` または `memory`（デフォルト: sqlite）

use std::net::SocketAddr;
use std::str::FromStr;

use clap::Parser;
use thiserror::Error;

pub const API_TOKEN_ENV: &str = "API_TOKEN";
pub const DB_PATH_ENV: &str = "DB_PATH";
pub const BIND_ADDR_ENV: &str = "BIND_ADDR";
pub const ROUTE_PREFIX_ENV: &str = "ROUTE_PREFIX";
pub const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

const DEFAULT_DB_PATH: &str = "bookmarks.db";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// 設定エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 必須の設定値がない
    #[error("必須の環境変数が設定されていません: {0}")]
    MissingEnvVar(String),

    /// 値の形式が不正
    #[error("{name} の値が不正です: {value}")]
    InvalidValue { name: String, value: String },
}

/// コマンドライン引数
///
/// 指定されたものは対応する環境変数より優先される。
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "bookmarks-api")]
#[command(about = "ブックマーク管理用HTTP APIサーバー")]
pub struct CliArgs {
    /// APIトークン（API_TOKEN）
    #[arg(long)]
    pub api_token: Option<String>,

    /// SQLiteデータベースファイルのパス（DB_PATH）
    #[arg(long)]
    pub db_path: Option<String>,

    /// リッスンアドレス（BIND_ADDR）
    #[arg(long)]
    pub bind: Option<String>,

    /// ルートのマウント先（ROUTE_PREFIX）。例: /api
    #[arg(long)]
    pub route_prefix: Option<String>,

    /// ストレージ: sqlite または memory（STORAGE_BACKEND）
    #[arg(long)]
    pub storage: Option<String>,
}

/// ストレージの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// 非永続（プロセス終了で消える）
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::InvalidValue {
                name: STORAGE_BACKEND_ENV.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// サーバー設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    api_token: String,
    db_path: String,
    bind_addr: SocketAddr,
    route_prefix: String,
    storage: StorageBackend,
}

impl ServerConfig {
    /// 環境変数とコマンドライン引数から設定を読み込む
    pub fn load(cli: CliArgs) -> Result<Self, ConfigError> {
        Self::from_sources(cli, |name| std::env::var(name).ok())
    }

    /// 任意の参照関数から設定を構築する
    ///
    /// `lookup` は環境変数名を受け取り値を返す。
    pub fn from_sources<F>(cli: CliArgs, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = cli
            .api_token
            .or_else(|| lookup(API_TOKEN_ENV))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(API_TOKEN_ENV.to_string()))?;

        let db_path = cli
            .db_path
            .or_else(|| lookup(DB_PATH_ENV))
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let bind = cli
            .bind
            .or_else(|| lookup(BIND_ADDR_ENV))
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind.parse().map_err(|_| ConfigError::InvalidValue {
            name: BIND_ADDR_ENV.to_string(),
            value: bind.clone(),
        })?;

        let route_prefix = normalize_prefix(
            &cli.route_prefix
                .or_else(|| lookup(ROUTE_PREFIX_ENV))
                .unwrap_or_default(),
        );

        let storage = match cli.storage.or_else(|| lookup(STORAGE_BACKEND_ENV)) {
            Some(value) => value.parse()?,
            None => StorageBackend::default(),
        };

        Ok(Self {
            api_token,
            db_path,
            bind_addr,
            route_prefix,
            storage,
        })
    }

    /// APIトークンを取得
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// データベースパスを取得
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// リッスンアドレスを取得
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// 正規化済みのルートプレフィックスを取得（ルート直下なら空文字列）
    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    /// ストレージ種別を取得
    pub fn storage(&self) -> StorageBackend {
        self.storage
    }
}

/// プレフィックスを `/xxx` 形式に正規化する。空または `/` は空文字列
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
