//! APIエラーハンドリング
//!
//! 統一されたエラーレスポンス形式を提供する。
//! すべてのエラーは `{"error": {"message": "..."}}` 形式のJSONで返却される。

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::validation::ValidationError;

/// 500系レスポンスでクライアントに返す固定メッセージ
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// どのルートにも一致しない場合のメッセージ
pub const ROUTE_NOT_FOUND_MESSAGE: &str = "Not found";

/// ルートは存在するがメソッドが未対応の場合のメッセージ
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";

/// エラー詳細
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorDetail {
    /// 詳細なエラーメッセージ
    pub message: String,
}

/// APIエラーレスポンスのボディ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

/// APIエラー
///
/// ステータスコードとJSON形式のエラーボディを含む。
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

impl ApiError {
    /// 新しいApiErrorを作成
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error: ApiErrorDetail {
                    message: message.into(),
                },
            },
        }
    }

    /// 400 Bad Requestエラーを作成
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404 Not Foundエラーを作成
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 500 Internal Server Errorを作成
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// エラーメッセージを取得
    #[allow(dead_code)]
    pub fn message(&self) -> &str {
        &self.body.error.message
    }

    /// ステータスコードを取得
    #[allow(dead_code)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

/// ストアエラーは詳細をログに残し、クライアントには固定メッセージのみ返す
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "ストア操作エラー");
        ApiError::internal_error(INTERNAL_ERROR_MESSAGE)
    }
}

/// JSONボディの抽出失敗（構文エラー、型不一致、Content-Type不正）はすべて400
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::error!(error = %rejection.body_text(), "リクエストボディの解析に失敗");
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// どのルートにも一致しないリクエスト用のフォールバック（404）
pub async fn not_found_fallback(method: Method, uri: Uri) -> ApiError {
    tracing::error!(%method, path = %uri.path(), "ルートが見つからない");
    ApiError::not_found(ROUTE_NOT_FOUND_MESSAGE)
}

/// 未対応メソッド用のフォールバック（405）
pub async fn method_not_allowed_fallback(method: Method, uri: Uri) -> ApiError {
    tracing::error!(%method, path = %uri.path(), "未対応のメソッド");
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    async fn read_error_body(response: Response) -> ApiErrorBody {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_api_error_creation() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "テストメッセージ");
        assert_eq!(error.message(), "テストメッセージ");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_constructors_set_status() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::internal_error("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    /// ボディが `{"error":{"message":...}}` 形式でシリアライズされることを確認
    #[test]
    fn test_api_error_body_serializes_nested_message() {
        let body = ApiError::not_found("Bookmark not found").body;
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json,
            serde_json::json!({ "error": { "message": "Bookmark not found" } })
        );
    }

    #[test]
    fn test_validation_error_maps_to_bad_request() {
        let error: ApiError = ValidationError::MissingTitle.into();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.message(), "Title is required");
    }

    /// ストアエラーの詳細はクライアントに漏れないことを確認
    #[test]
    fn test_store_error_maps_to_opaque_internal_error() {
        let error: ApiError = StoreError::Database("disk I/O error".to_string()).into();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message(), INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_not_found_returns_json_404() {
        async fn error_handler() -> ApiError {
            ApiError::not_found("Bookmark not found")
        }

        let app = Router::new().route("/error", get(error_handler));
        let request = Request::builder()
            .uri("/error")
            .method("GET")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error_body = read_error_body(response).await;
        assert_eq!(error_body.error.message, "Bookmark not found");
    }

    #[tokio::test]
    async fn test_internal_error_returns_json_500() {
        async fn error_handler() -> ApiError {
            ApiError::internal_error(INTERNAL_ERROR_MESSAGE)
        }

        let app = Router::new().route("/error", get(error_handler));
        let request = Request::builder()
            .uri("/error")
            .method("GET")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error_body = read_error_body(response).await;
        assert_eq!(error_body.error.message, INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_fallbacks_return_json_errors() {
        let app = Router::new()
            .route("/only-get", get(|| async { "ok" }))
            .method_not_allowed_fallback(method_not_allowed_fallback)
            .fallback(not_found_fallback);

        let request = Request::builder()
            .uri("/only-get")
            .method("PUT")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let error_body = read_error_body(response).await;
        assert_eq!(error_body.error.message, METHOD_NOT_ALLOWED_MESSAGE);

        let request = Request::builder()
            .uri("/missing")
            .method("GET")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error_body = read_error_body(response).await;
        assert_eq!(error_body.error.message, ROUTE_NOT_FOUND_MESSAGE);
    }
}
