//! 認証ミドルウェア
//!
//! `Authorization: Bearer <token>` ヘッダーを設定済みのAPIトークンと照合する。
//! - /healthエンドポイントは認証をバイパス
//! - 認証失敗時はエンドポイントの存在を隠すため404（JSON形式）を返却

use crate::error::ApiError;
use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

/// 認証失敗時のメッセージ
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized request";

/// 認証をバイパスするパス
pub const HEALTH_PATH: &str = "/health";

/// 認証設定
///
/// axumのStateとして共有される。
#[derive(Clone)]
pub struct AuthConfig {
    /// APIトークン
    pub api_token: String,
}

impl AuthConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
        }
    }

    /// トークンが一致するか（定数時間比較）
    fn matches(&self, token: &str) -> bool {
        self.api_token.as_bytes().ct_eq(token.as_bytes()).into()
    }
}

/// Authorizationヘッダーの値からBearerトークンを取り出す
///
/// スキームは `Bearer` のみ（大文字小文字を区別）。トークン前後の空白は無視する。
fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// 認証ミドルウェア
///
/// # Returns
/// - 認証成功時: 次のハンドラーにリクエストを渡す
/// - 認証失敗時: 404 Not Found（`{"error":{"message":"Unauthorized request"}}`）
pub async fn auth_middleware(
    State(config): State<AuthConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token);

    match token {
        Some(token) if config.matches(token) => next.run(request).await,
        _ => {
            tracing::error!(
                path = %request.uri().path(),
                method = %request.method(),
                "Unauthorized request"
            );
            ApiError::not_found(UNAUTHORIZED_MESSAGE).into_response()
        }
    }
}
