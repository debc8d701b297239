//! ブックマークの入力バリデーション
//!
//! 作成時は4フィールドすべてが必須で、title → url → rating → description の順に
//! 存在チェックを行い、最初に失敗したフィールドのエラーのみを返す。
//! 存在チェック通過後にURL形式、rating範囲の順で意味検証を行う。
//!
//! 部分更新時は少なくとも1フィールドが必要。指定されたurl/ratingは作成時と同じ規則で検証する。

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::model::{BookmarkPatch, CreateBookmarkRequest, NewBookmark, PatchBookmarkRequest};

/// ratingの下限
pub const MIN_RATING: i64 = 1;
/// ratingの上限
pub const MAX_RATING: i64 = 5;

/// バリデーションエラー
///
/// `Display` の文字列がそのままクライアントへのエラーメッセージになる。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title is required")]
    MissingTitle,
    #[error("URL is required")]
    MissingUrl,
    #[error("Rating is required")]
    MissingRating,
    #[error("Description is required")]
    MissingDescription,
    /// http/httpsの絶対URLでない
    #[error("Not a valid URL.")]
    InvalidUrl,
    /// 1〜5の整数でない（非数値、小数、範囲外をまとめて扱う）
    #[error("Rating must be a whole number between 1-5.")]
    InvalidRating,
    /// PATCHボディに更新対象フィールドが1つもない
    #[error("Request body must contain title, url, rating, or description")]
    EmptyPatch,
}

/// ブックマークのバリデータ
pub struct BookmarkValidator;

impl BookmarkValidator {
    /// 作成リクエストを検証し、ストアに渡せる値オブジェクトを返す
    pub fn validate_create(request: CreateBookmarkRequest) -> Result<NewBookmark, ValidationError> {
        let CreateBookmarkRequest {
            title,
            url,
            rating,
            description,
        } = request;

        // 存在チェック（順序固定）
        let title = non_empty(title).ok_or(ValidationError::MissingTitle)?;
        let url = non_empty(url).ok_or(ValidationError::MissingUrl)?;
        let rating = present_rating(rating).ok_or(ValidationError::MissingRating)?;
        let description = non_empty(description).ok_or(ValidationError::MissingDescription)?;

        // 意味検証
        Self::validate_url(&url)?;
        let rating = Self::coerce_rating(&rating)?;

        Ok(NewBookmark {
            title,
            url,
            rating,
            description,
        })
    }

    /// 部分更新リクエストを検証する
    ///
    /// 空文字列・nullのフィールドは未指定として扱い、既存値を上書きしない。
    pub fn validate_patch(request: PatchBookmarkRequest) -> Result<BookmarkPatch, ValidationError> {
        let title = non_empty(request.title);
        let url = non_empty(request.url);
        let rating = present_rating(request.rating);
        let description = non_empty(request.description);

        if title.is_none() && url.is_none() && rating.is_none() && description.is_none() {
            return Err(ValidationError::EmptyPatch);
        }

        if let Some(url) = &url {
            Self::validate_url(url)?;
        }
        let rating = rating.as_ref().map(Self::coerce_rating).transpose()?;

        Ok(BookmarkPatch {
            title,
            url,
            rating,
            description,
        })
    }

    /// http/httpsスキームとホストを持つ絶対URLか検証する
    pub fn validate_url(url: &str) -> Result<(), ValidationError> {
        // Url::parseは前後の空白を黙って取り除くため、ここで弾く
        if url.trim() != url || url.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidUrl);
        }

        let parsed = Url::parse(url).map_err(|_| ValidationError::InvalidUrl)?;
        let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());

        match parsed.scheme() {
            "http" | "https" if has_host => Ok(()),
            _ => Err(ValidationError::InvalidUrl),
        }
    }

    /// ratingを整数に変換し、1〜5の範囲を検証する
    ///
    /// - JSON整数: そのまま
    /// - JSON小数: 小数部が0の場合のみ整数として扱う（`3.0`）
    /// - 文字列: 前後の空白を除いて整数としてパースできる場合のみ（`"3"`）
    ///
    /// 0は「未指定」ではなく範囲外として扱う。
    pub fn coerce_rating(value: &Value) -> Result<i64, ValidationError> {
        let rating = match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => i,
                None => n
                    .as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                    .map(|f| f as i64)
                    .ok_or(ValidationError::InvalidRating)?,
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ValidationError::InvalidRating)?,
            _ => return Err(ValidationError::InvalidRating),
        };

        if (MIN_RATING..=MAX_RATING).contains(&rating) {
            Ok(rating)
        } else {
            Err(ValidationError::InvalidRating)
        }
    }
}

/// 空文字列をNoneに畳み込む
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// ratingが指定されているか（null、空文字列は未指定）
fn present_rating(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !matches!(v, Value::Null) && v.as_str() != Some(""))
}
