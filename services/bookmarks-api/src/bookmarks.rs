//! ブックマークリソースのエンドポイント
//!
//! - 一覧取得 (GET /bookmarks)
//! - 作成 (POST /bookmarks)
//! - 取得 (GET /bookmarks/{id})
//! - 削除 (DELETE /bookmarks/{id})
//! - 部分更新 (PATCH /bookmarks/{id})
//!
//! 返却するブックマークはすべてサニタイズ済み。保存時の値は変更しない。

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::de::DeserializeOwned;

use crate::AppState;
use crate::error::{ApiError, method_not_allowed_fallback};
use crate::model::{Bookmark, BookmarkId, CreateBookmarkRequest, PatchBookmarkRequest};
use crate::sanitize::sanitize_bookmark;
use crate::validation::BookmarkValidator;

/// ブックマークが存在しない場合のメッセージ
pub const NOT_FOUND_MESSAGE: &str = "Bookmark not found";

/// 空でないボディにJSONのContent-Typeがない場合のメッセージ
const MISSING_JSON_CONTENT_TYPE_MESSAGE: &str =
    "Invalid request body: Expected request with `Content-Type: application/json`";

/// ブックマークリソースのルーターを構築する
///
/// ルートプレフィックスへのマウントは呼び出し側で行う。
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookmarks", get(list_bookmarks).post(create_bookmark))
        .route(
            "/bookmarks/{id}",
            get(get_bookmark)
                .delete(delete_bookmark)
                .patch(update_bookmark),
        )
        // 未対応メソッド（PUT等）もJSON形式のエラーで返す
        .method_not_allowed_fallback(method_not_allowed_fallback)
}

/// パスパラメータをIDとして解釈する
///
/// `Location` と同じ正規形（先頭0や符号のない10進数字列）のみ受け付ける。
/// それ以外は存在しないIDと同じ扱い（404）。
fn parse_id(raw: &str) -> Result<BookmarkId, ApiError> {
    let canonical = !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && !(raw.len() > 1 && raw.starts_with('0'));
    if !canonical {
        return Err(not_found(raw));
    }
    raw.parse::<BookmarkId>().map_err(|_| not_found(raw))
}

/// リクエストボディをJSONとして解釈する
///
/// 空（空白のみを含む）のボディは全フィールド未指定の `{}` として扱い、検証に回す。
/// 空でないボディにはJSONのContent-Typeを要求する。
fn parse_payload<T>(headers: &HeaderMap, body: &Bytes) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    if !has_json_content_type(headers) {
        tracing::error!("リクエストボディのContent-TypeがJSONではない");
        return Err(ApiError::bad_request(MISSING_JSON_CONTENT_TYPE_MESSAGE));
    }

    let Json(request) = Json::<T>::from_bytes(body)?;
    Ok(request)
}

/// `application/json` または `application/*+json` か
fn has_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn not_found(id: &str) -> ApiError {
    tracing::error!(bookmark_id = %id, "ブックマークが見つからない");
    ApiError::not_found(NOT_FOUND_MESSAGE)
}

fn sanitized(bookmark: Bookmark) -> Json<Bookmark> {
    Json(sanitize_bookmark(bookmark))
}

/// ブックマーク一覧エンドポイント (GET /bookmarks)
///
/// # Returns
/// - 200 OK: サニタイズ済みブックマークのJSON配列（0件なら `[]`）
/// - 500 Internal Server Error: ストアエラー
async fn list_bookmarks(State(state): State<AppState>) -> Result<Response, ApiError> {
    let bookmarks = state.store.list().await?;
    tracing::debug!(count = bookmarks.len(), "ブックマーク一覧を返却");

    let body: Vec<Bookmark> = bookmarks.into_iter().map(sanitize_bookmark).collect();
    Ok(Json(body).into_response())
}

/// ブックマーク作成エンドポイント (POST /bookmarks)
///
/// # Returns
/// - 201 Created: `Location` ヘッダーとサニタイズ済みのブックマーク
/// - 400 Bad Request: 必須項目の欠落、URLまたは評価値が不正、JSONが不正
/// - 500 Internal Server Error: ストアエラー
async fn create_bookmark(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: CreateBookmarkRequest = parse_payload(&headers, &body)?;

    let new_bookmark = BookmarkValidator::validate_create(request).map_err(|e| {
        tracing::error!(error = %e, "ブックマーク作成リクエストの検証に失敗");
        ApiError::from(e)
    })?;

    let created = state.store.insert(new_bookmark).await?;
    tracing::info!(bookmark_id = created.id, "ブックマークを作成");

    let location = format!("{}/bookmarks/{}", state.route_prefix, created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        sanitized(created),
    )
        .into_response())
}

/// ブックマーク取得エンドポイント (GET /bookmarks/{id})
///
/// # Returns
/// - 200 OK: サニタイズ済みのブックマーク
/// - 404 Not Found: 存在しない
/// - 500 Internal Server Error: ストアエラー
async fn get_bookmark(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&raw_id)?;

    match state.store.get(id).await? {
        Some(bookmark) => Ok(sanitized(bookmark).into_response()),
        None => Err(not_found(&raw_id)),
    }
}

/// ブックマーク削除エンドポイント (DELETE /bookmarks/{id})
///
/// # Returns
/// - 204 No Content: 削除した
/// - 404 Not Found: 存在しない
/// - 500 Internal Server Error: ストアエラー
async fn delete_bookmark(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&raw_id)?;

    if state.store.delete(id).await? == 0 {
        return Err(not_found(&raw_id));
    }

    tracing::info!(bookmark_id = id, "ブックマークを削除");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// ブックマーク部分更新エンドポイント (PATCH /bookmarks/{id})
///
/// 指定されたフィールドのみ更新する。空文字列やnullのフィールドは無視する。
///
/// # Returns
/// - 204 No Content: 更新した
/// - 400 Bad Request: 更新対象のフィールドがない、URLまたは評価値が不正
/// - 404 Not Found: 存在しない
/// - 500 Internal Server Error: ストアエラー
async fn update_bookmark(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = parse_id(&raw_id)?;
    let request: PatchBookmarkRequest = parse_payload(&headers, &body)?;

    let patch = BookmarkValidator::validate_patch(request).map_err(|e| {
        tracing::error!(bookmark_id = id, error = %e, "ブックマーク更新リクエストの検証に失敗");
        ApiError::from(e)
    })?;

    if state.store.update(id, patch).await? == 0 {
        return Err(not_found(&raw_id));
    }

    tracing::info!(bookmark_id = id, "ブックマークを更新");
    Ok(StatusCode::NO_CONTENT.into_response())
}
