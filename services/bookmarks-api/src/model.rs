//! ブックマークのデータモデル
//!
//! - `Bookmark`: 永続化済みのレコード（レスポンスにも使用）
//! - `NewBookmark` / `BookmarkPatch`: 検証済みの値オブジェクト（ストアへの入力）
//! - `CreateBookmarkRequest` / `PatchBookmarkRequest`: クライアントから受け取る未検証のペイロード

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ブックマークID（ストアが採番するサロゲートキー）
pub type BookmarkId = i64;

/// 永続化済みのブックマーク
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub title: String,
    pub url: String,
    pub rating: i64,
    pub description: String,
}

/// 作成用の検証済みブックマーク（IDなし）
///
/// `validation::validate_create` を通過した値のみが構築される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub rating: i64,
    pub description: String,
}

impl NewBookmark {
    /// 採番されたIDを付与してBookmarkにする
    pub fn with_id(self, id: BookmarkId) -> Bookmark {
        Bookmark {
            id,
            title: self.title,
            url: self.url,
            rating: self.rating,
            description: self.description,
        }
    }
}

/// 部分更新用の検証済みパッチ
///
/// `None` のフィールドは更新しない。少なくとも1フィールドが `Some`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkPatch {
    pub title: Option<String>,
    pub url: Option<String>,
    pub rating: Option<i64>,
    pub description: Option<String>,
}

impl BookmarkPatch {
    /// 更新対象のフィールドが1つもないか
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.url.is_none()
            && self.rating.is_none()
            && self.description.is_none()
    }

    /// 既存のブックマークにパッチを適用する
    pub fn apply_to(&self, bookmark: &mut Bookmark) {
        if let Some(title) = &self.title {
            bookmark.title = title.clone();
        }
        if let Some(url) = &self.url {
            bookmark.url = url.clone();
        }
        if let Some(rating) = self.rating {
            bookmark.rating = rating;
        }
        if let Some(description) = &self.description {
            bookmark.description = description.clone();
        }
    }
}

/// POST /bookmarks のリクエストボディ
///
/// 必須チェックは検証層で行うため、ここではすべて任意フィールドとして受け取る。
/// `rating` は数値・文字列どちらでも受け付けるため `Value` のまま保持する。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateBookmarkRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

/// PATCH /bookmarks/{id} のリクエストボディ
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatchBookmarkRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}
