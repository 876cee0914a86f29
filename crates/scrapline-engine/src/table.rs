//! HTML table extraction.
//!
//! Works on the markup a locator returns for a `<table>` (or any fragment
//! holding `<tr>` rows). Cell text has tags stripped, common entities decoded
//! and whitespace collapsed.
//!
//! Closing `</tr>`, `</td>` and `</th>` tags are optional: an unclosed row or
//! cell ends where the next one starts. Tables nested inside cells are
//! dropped, rows and text included, so they never leak into the outer table.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Match, Regex};
use serde_json::{Map, Value};

static ROW_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<tr\b[^>]*>").unwrap());
static ROW_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</tr\s*>").unwrap());
static CELL_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<t[hd]\b[^>]*>").unwrap());
static CELL_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</t[hd]\s*>").unwrap());
static TABLE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)table\b[^>]*>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// One table row as parsed from markup.
#[derive(Debug, Clone, PartialEq)]
struct Row {
    header: bool,
    cells: Vec<String>,
}

/// Parse table markup into row objects.
///
/// - A first row made of `<th>` cells is the header; later rows map header
///   text to cell text by column position, extra cells are dropped.
/// - A headerless table whose rows all have exactly two cells is a key/value
///   listing: each row becomes `{first: second}`.
/// - Any other headerless table uses its first row as the header.
pub fn parse_table(html: &str) -> Vec<Map<String, Value>> {
    let html = outer_table(html);
    let rows: Vec<Row> = segments(&html, &ROW_OPEN_RE, &ROW_CLOSE_RE)
        .into_iter()
        .map(|(_, inner)| {
            let mut header = false;
            let cells = segments(inner, &CELL_OPEN_RE, &CELL_CLOSE_RE)
                .into_iter()
                .map(|(open, body)| {
                    if open.as_str()[1..3].eq_ignore_ascii_case("th") {
                        header = true;
                    }
                    cell_text(body)
                })
                .collect();
            Row { header, cells }
        })
        .filter(|r: &Row| !r.cells.is_empty())
        .collect();

    let Some(first) = rows.first() else {
        return Vec::new();
    };

    if !first.header && rows.iter().all(|r| r.cells.len() == 2) {
        return rows
            .iter()
            .map(|r| {
                let mut obj = Map::new();
                obj.insert(r.cells[0].clone(), Value::String(r.cells[1].clone()));
                obj
            })
            .collect();
    }

    let headers = &first.cells;
    rows[1..]
        .iter()
        .map(|r| {
            headers
                .iter()
                .zip(&r.cells)
                .map(|(h, c)| (h.clone(), Value::String(c.clone())))
                .collect()
        })
        .collect()
}

/// Split `html` at every `open` tag. A segment runs to its `close` tag, or
/// to the next `open` tag when it is left unclosed.
fn segments<'h>(html: &'h str, open: &Regex, close: &Regex) -> Vec<(Match<'h>, &'h str)> {
    let opens: Vec<Match<'h>> = open.find_iter(html).collect();
    opens
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = opens.get(i + 1).map_or(html.len(), |next| next.start());
            let body = &html[m.end()..end];
            let body = close.find(body).map_or(body, |c| &body[..c.start()]);
            (*m, body)
        })
        .collect()
}

/// Strip tables nested below the one being parsed.
///
/// When the fragment wraps its rows in a `<table>`, that table is the outer
/// one; otherwise the fragment itself is the table body.
fn outer_table(html: &str) -> Cow<'_, str> {
    let Some(first_table) = TABLE_TAG_RE.find(html) else {
        return Cow::Borrowed(html);
    };
    let wrapped = ROW_OPEN_RE
        .find(html)
        .map_or(true, |row| first_table.start() < row.start());
    let base = i32::from(wrapped);

    let mut out = String::with_capacity(html.len());
    let mut depth = 0i32;
    let mut last = 0;
    for tag in TABLE_TAG_RE.captures_iter(html) {
        let (Some(m), Some(slash)) = (tag.get(0), tag.get(1)) else {
            continue;
        };
        if depth <= base {
            out.push_str(&html[last..m.start()]);
        }
        depth += if slash.as_str().is_empty() { 1 } else { -1 };
        last = m.end();
    }
    if depth <= base {
        out.push_str(&html[last..]);
    }
    Cow::Owned(out)
}

/// Merge every row into a single object; later rows win on key clashes.
pub fn flatten(rows: Vec<Map<String, Value>>) -> Map<String, Value> {
    rows.into_iter().fold(Map::new(), |mut acc, row| {
        acc.extend(row);
        acc
    })
}

fn cell_text(inner: &str) -> String {
    let text = TAG_RE.replace_all(inner, "");
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    WS_RE.replace_all(&text, " ").trim().to_string()
}
