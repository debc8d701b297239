//! レスポンス出力前のサニタイズ
//!
//! - `title`: `<` と `>` をエンティティに変換し、マークアップを無効化する
//! - `description`: 許可リストにあるインラインタグは残し、script/styleはコンテンツごと除去、
//!   それ以外のタグはエスケープする。属性は許可リストのもののみ残し、
//!   `on*` イベントハンドラや `javascript:` URLは除去する
//! - `url`, `rating`: 変換しない
//!
//! いずれの変換も冪等（2回適用しても1回と同じ結果）。

use crate::model::Bookmark;

/// そのまま残すタグ
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "cite", "code", "del", "em", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "i", "img", "ins", "li", "mark", "ol", "p", "pre", "q", "s", "small", "span",
    "strong", "sub", "sup", "u", "ul",
];

/// 中身ごと除去するタグ
const STRIPPED_TAGS: &[&str] = &["script", "style"];

/// 許可タグ上で残す属性
const ALLOWED_ATTRIBUTES: &[&str] = &[
    "alt", "cite", "class", "height", "href", "src", "title", "width",
];

/// URLを値に取る属性
const URL_ATTRIBUTES: &[&str] = &["cite", "href", "src"];

/// URL属性で許可するスキーム（スキームなしの相対URLも許可）
const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// ストアから読み出したブックマークをレスポンス用にサニタイズする
pub fn sanitize_bookmark(bookmark: Bookmark) -> Bookmark {
    Bookmark {
        title: escape_html(&bookmark.title),
        description: sanitize_html(&bookmark.description),
        ..bookmark
    }
}

/// `<` と `>` をエスケープする
///
/// `&` は変換しないため、既にエスケープ済みの文字列に再適用しても変化しない。
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(ch),
        }
    }
    result
}

/// 能動的なコンテンツを取り除き、無害なインラインマークアップは残す
pub fn sanitize_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(pos) = rest.find(['<', '>']) {
        result.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix('>') {
            result.push_str("&gt;");
            rest = after;
            continue;
        }

        // コメントは除去
        if let Some(after) = tail.strip_prefix("<!--") {
            rest = match after.find("-->") {
                Some(end) => &after[end + 3..],
                None => "",
            };
            continue;
        }

        let Some(tag) = Tag::parse(tail) else {
            result.push_str("&lt;");
            rest = &tail[1..];
            continue;
        };
        let after_tag = &tail[tag.len..];

        if STRIPPED_TAGS.contains(&tag.name.as_str()) {
            rest = if tag.closing {
                after_tag
            } else {
                skip_past_closing_tag(after_tag, &tag.name)
            };
            continue;
        }

        if ALLOWED_TAGS.contains(&tag.name.as_str()) {
            result.push_str(&tag.render());
        } else {
            result.push_str(&escape_html(&tail[..tag.len]));
        }
        rest = after_tag;
    }

    result.push_str(rest);
    result
}

/// `</name ...>` の直後までを読み飛ばす。閉じタグがなければ末尾まで
fn skip_past_closing_tag<'a>(html: &'a str, name: &str) -> &'a str {
    let needle = format!("</{}", name);
    // ASCII小文字化はバイト長を変えないので、インデックスをそのまま使える
    let lower = html.to_ascii_lowercase();
    let Some(start) = lower.find(&needle) else {
        return "";
    };
    match html[start..].find('>') {
        Some(end) => &html[start + end + 1..],
        None => "",
    }
}

/// 解析済みのタグ
#[derive(Debug, PartialEq, Eq)]
struct Tag {
    /// 小文字化したタグ名
    name: String,
    closing: bool,
    self_closing: bool,
    /// (小文字化した属性名, 値)。値なし属性はNone
    attributes: Vec<(String, Option<String>)>,
    /// 元文字列中でタグが占めるバイト数
    len: usize,
}

impl Tag {
    /// 先頭が `<` の文字列からタグを1つ解析する
    ///
    /// タグ名が英字で始まらない場合や `>` で閉じていない場合はNone。
    fn parse(input: &str) -> Option<Self> {
        let bytes = input.as_bytes();
        let mut i = 1;

        let closing = bytes.get(i) == Some(&b'/');
        if closing {
            i += 1;
        }

        let name_start = i;
        if !bytes.get(i)?.is_ascii_alphabetic() {
            return None;
        }
        while bytes.get(i).is_some_and(|b| b.is_ascii_alphanumeric()) {
            i += 1;
        }
        let name = input[name_start..i].to_ascii_lowercase();

        let mut attributes = Vec::new();
        loop {
            while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
                i += 1;
            }

            match *bytes.get(i)? {
                b'>' => {
                    return Some(Self {
                        name,
                        closing,
                        self_closing: false,
                        attributes,
                        len: i + 1,
                    });
                }
                b'/' if bytes.get(i + 1) == Some(&b'>') => {
                    return Some(Self {
                        name,
                        closing,
                        self_closing: true,
                        attributes,
                        len: i + 2,
                    });
                }
                b'<' => return None,
                b'/' | b'"' | b'\'' | b'=' => {
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let attr_start = i;
            while bytes
                .get(i)
                .is_some_and(|b| !b.is_ascii_whitespace() && !b"=>/<\"'".contains(b))
            {
                i += 1;
            }
            let attr_name = input[attr_start..i].to_ascii_lowercase();

            while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
                i += 1;
            }

            if bytes.get(i) != Some(&b'=') {
                attributes.push((attr_name, None));
                continue;
            }
            i += 1;
            while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
                i += 1;
            }

            let value = match *bytes.get(i)? {
                quote @ (b'"' | b'\'') => {
                    let value_start = i + 1;
                    let value_len = input[value_start..].find(quote as char)?;
                    i = value_start + value_len + 1;
                    &input[value_start..value_start + value_len]
                }
                _ => {
                    let value_start = i;
                    while bytes
                        .get(i)
                        .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>')
                    {
                        i += 1;
                    }
                    &input[value_start..i]
                }
            };
            attributes.push((attr_name, Some(value.to_string())));
        }
    }

    /// 許可された属性のみでタグを再構成する
    fn render(&self) -> String {
        if self.closing {
            return format!("</{}>", self.name);
        }

        let mut rendered = format!("<{}", self.name);
        for (name, value) in &self.attributes {
            if !is_allowed_attribute(name, value.as_deref()) {
                continue;
            }
            match value {
                Some(value) => {
                    rendered.push_str(&format!(" {}=\"{}\"", name, escape_attribute(value)));
                }
                None => rendered.push_str(&format!(" {}", name)),
            }
        }
        if self.self_closing {
            rendered.push_str(" /");
        }
        rendered.push('>');
        rendered
    }
}

fn is_allowed_attribute(name: &str, value: Option<&str>) -> bool {
    if !ALLOWED_ATTRIBUTES.contains(&name) {
        return false;
    }
    if URL_ATTRIBUTES.contains(&name) {
        return value.is_none_or(is_safe_url);
    }
    true
}

/// スキームなし、または許可スキームのURLか
fn is_safe_url(value: &str) -> bool {
    // ブラウザは空白・制御文字を無視してスキームを解釈するため、除去してから判定する
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if normalized.starts_with(['/', '?', '#', '.']) {
        return true;
    }
    let Some(colon) = normalized.find(':') else {
        return true;
    };

    let scheme = &normalized[..colon];
    // 文字参照でスキームを隠している可能性がある（`java&#09;script:`）
    if scheme.contains('&') {
        return false;
    }
    if scheme.contains(['/', '?', '#']) {
        return true;
    }
    ALLOWED_URL_SCHEMES.contains(&scheme)
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
