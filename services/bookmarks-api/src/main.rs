//! ブックマーク管理用HTTP APIサーバー
//!
//! 本バイナリは以下の機能を提供する:
//! - ブックマークの一覧・取得 (GET /bookmarks, GET /bookmarks/{id})
//! - ブックマークの作成 (POST /bookmarks)
//! - ブックマークの部分更新 (PATCH /bookmarks/{id})
//! - ブックマークの削除 (DELETE /bookmarks/{id})
//! - ヘルスチェック (GET /health)
//!
//! ブックマークのエンドポイントは設定されたルートプレフィックス（例: /api）配下にマウントされる。

mod auth;
mod bookmarks;
mod config;
mod error;
mod logging;
mod memory_store;
mod model;
mod sanitize;
mod store;
mod validation;

pub use auth::{AuthConfig, auth_middleware};
pub use store::{BookmarkRepository, SqliteBookmarkStore, StoreError};

use axum::{Router, middleware, routing::get};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::{CliArgs, ServerConfig, StorageBackend, normalize_prefix};
use crate::error::not_found_fallback;
use crate::memory_store::InMemoryBookmarkStore;

/// アプリケーション状態
///
/// ルーター全体で共有される状態を保持する。
#[derive(Clone)]
pub struct AppState {
    /// 認証設定
    pub auth_config: AuthConfig,
    /// ブックマークストア（SQLiteまたはインメモリ）
    pub store: Arc<dyn BookmarkRepository>,
    /// 正規化済みのルートプレフィックス（Locationヘッダーの生成に使用）
    pub route_prefix: String,
}

/// ヘルスチェックエンドポイント
///
/// サーバーの死活確認用。認証不要。プレフィックスに関わらずルート直下に置く。
async fn health() -> &'static str {
    "OK"
}

/// ルーターを構築する
///
/// 全エンドポイントのルーティングを定義し、認証ミドルウェアを適用する。
/// /healthエンドポイントは認証をバイパスする（auth_middleware内で処理）。
/// TraceLayerによりリクエスト/レスポンスの構造化ログを自動記録する。
///
/// # Arguments
/// * `auth_config` - 認証設定
/// * `store` - ブックマークストア
/// * `route_prefix` - ブックマークのエンドポイントのマウント先（空ならルート直下）
pub fn create_router(
    auth_config: AuthConfig,
    store: Arc<dyn BookmarkRepository>,
    route_prefix: &str,
) -> Router {
    let route_prefix = normalize_prefix(route_prefix);
    let state = AppState {
        auth_config: auth_config.clone(),
        store,
        route_prefix: route_prefix.clone(),
    };

    // axum 0.8では空パスへのnestはできないため、プレフィックスなしはmergeする
    let resources = if route_prefix.is_empty() {
        bookmarks::routes()
    } else {
        Router::new().nest(&route_prefix, bookmarks::routes())
    };

    Router::new()
        .route("/health", get(health))
        .merge(resources)
        .fallback(not_found_fallback)
        .layer(middleware::from_fn_with_state(
            auth_config,
            auth_middleware,
        ))
        // リクエストトレーシングレイヤー（method, path, status, latencyを自動記録）
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 設定に応じてストアを構築する
async fn build_store(config: &ServerConfig) -> Result<Arc<dyn BookmarkRepository>, StoreError> {
    match config.storage() {
        StorageBackend::Sqlite => {
            tracing::info!(db_path = %config.db_path(), "SQLiteストアを初期化します");
            Ok(Arc::new(SqliteBookmarkStore::new(config.db_path()).await?))
        }
        StorageBackend::Memory => {
            tracing::warn!("インメモリストアで起動します。データは永続化されません");
            Ok(Arc::new(InMemoryBookmarkStore::new()))
        }
    }
}

/// シャットダウンシグナルを待機する
///
/// SIGTERMまたはCtrl+C (SIGINT) を待機し、いずれかを受信したらリターンする。
/// axum::serve の with_graceful_shutdown() と組み合わせて使用することで、
/// 新規リクエストの受付停止と処理中リクエストの完了待機を実現する。
///
/// # Panics
/// シグナルハンドラーの登録に失敗した場合はパニックする。
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Ctrl+C シグナルハンドラーの登録に失敗しました");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM シグナルハンドラーの登録に失敗しました")
            .recv()
            .await;
    };

    // Windows等の非Unix環境ではSIGTERMは利用不可
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C (SIGINT) を受信しました。graceful shutdownを開始します");
        }
        _ = terminate => {
            tracing::info!("SIGTERM を受信しました。graceful shutdownを開始します");
        }
    }
}

/// メイン関数
///
/// 設定を読み込み、ストアを初期化してHTTPサーバーを起動する。
/// 設定やストアの初期化に失敗した場合はログを出力して終了コード1で終了する。
/// SIGTERMまたはCtrl+Cを受信するとgraceful shutdownを実行する。
///
/// 設定項目は `config` モジュールを参照。ログレベルは `RUST_LOG` で制御する（デフォルト: info）。
#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    logging::init_logging();
    tracing::info!("ブックマークAPIサーバーを起動します");

    let config = match ServerConfig::load(cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "設定の読み込みに失敗しました");
            std::process::exit(1);
        }
    };

    let store = match build_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "ストアの初期化に失敗しました");
            std::process::exit(1);
        }
    };

    let auth_config = AuthConfig::new(config.api_token());
    let app = create_router(auth_config, store, config.route_prefix());

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "アドレスのバインドに失敗しました");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, route_prefix = %config.route_prefix(), "リッスン開始");

    // shutdown_signal()がシグナルを受信すると新規接続の受付を止め、処理中のリクエストの完了を待つ。
    // サーバー終了後にストア（SQLite接続）がドロップされる。
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "サーバーが異常終了しました");
        std::process::exit(1);
    }

    tracing::info!("サーバーが正常に停止しました");
}
