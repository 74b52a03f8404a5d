//! Incoming article parsing and normalization
//!
//! Turns the raw byte block a client sends after `POST`/`IHAVE` into a
//! structured [`Article`]. The parser is pure: the caller supplies the
//! current time, so normalization is reproducible in tests.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::validation;

use super::types::{Article, HeaderMap};

/// Why an article was refused
///
/// Rendered into the text of `441`/`437` replies; the session stays open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A required header (From, Newsgroups, Subject) is absent
    MissingHeader(&'static str),
    /// A header line does not match `key: value` syntax or fails validation
    MalformedHeader(String),
    /// The article body is empty
    EmptyBody,
}

impl Rejection {
    /// Short reason phrase for the failure reply
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Rejection::MissingHeader(name) => format!("missing required header {name}"),
            Rejection::MalformedHeader(detail) => format!("malformed header: {detail}"),
            Rejection::EmptyBody => "empty body not permitted".to_string(),
        }
    }
}

/// One logical header: unfolded value plus the raw lines it came from
struct LogicalHeader {
    name: String,
    value: String,
    raw_lines: Vec<String>,
}

/// Parse and normalize a raw article
///
/// `raw` is the un-stuffed data block: header lines, a blank line, then the
/// body. Normalization:
/// - `Message-ID` is kept when it satisfies the RFC 5536 grammar, otherwise
///   a fresh `<hex32@path_host>` id is substituted
/// - `Date` defaults to `now` when absent or unparseable
/// - `Path` gets `path_host` prepended (or `path_host!not-for-mail` when absent)
/// - all other header lines are preserved byte-for-byte, folding included
///
/// # Errors
///
/// Returns a [`Rejection`] carrying the reason to report to the client.
pub fn parse_article(
    raw: &[u8],
    path_host: &str,
    now: DateTime<Utc>,
) -> Result<Article, Rejection> {
    let (head_bytes, body) = split_head_body(raw);
    if body.is_empty() {
        return Err(Rejection::EmptyBody);
    }

    let head_text = String::from_utf8_lossy(head_bytes);
    let logical = parse_header_lines(&head_text)?;
    if logical.is_empty() {
        return Err(Rejection::MissingHeader("From"));
    }

    let mut headers = HeaderMap::new();
    for header in &logical {
        headers.push(header.name.clone(), header.value.clone());
    }

    let from = headers
        .get("From")
        .ok_or(Rejection::MissingHeader("From"))?
        .to_string();
    if !validation::validate_from(&from) {
        return Err(Rejection::MalformedHeader(format!(
            "From does not parse as a mailbox: {from}"
        )));
    }

    let newsgroups_value = headers
        .get("Newsgroups")
        .ok_or(Rejection::MissingHeader("Newsgroups"))?;
    let newsgroups: Vec<String> = newsgroups_value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if newsgroups.is_empty() {
        return Err(Rejection::MalformedHeader(
            "Newsgroups names no groups".to_string(),
        ));
    }

    let subject = headers
        .get("Subject")
        .ok_or(Rejection::MissingHeader("Subject"))?
        .to_string();

    let message_id = match headers.get("Message-ID") {
        Some(supplied) if validation::validate_message_id(supplied) => supplied.to_string(),
        _ => format!("<{}@{}>", Uuid::new_v4().simple(), path_host),
    };

    let date = headers
        .get("Date")
        .and_then(validation::parse_date)
        .unwrap_or(now);

    let path = match headers.get("Path") {
        Some(existing) => format!("{path_host}!{existing}"),
        None => format!("{path_host}!not-for-mail"),
    };

    let date_text = date.to_rfc2822();
    headers.set("Message-ID", message_id.clone());
    headers.set("Date", date_text.clone());
    headers.set("Path", path.clone());

    let header_block = rebuild_header_block(&logical, &message_id, &date_text, &path);

    Ok(Article {
        message_id,
        date,
        from,
        subject,
        newsgroups,
        path,
        headers,
        header_block,
        body: body.to_vec(),
    })
}

/// Split at the first blank line; the body keeps no trailing CRLF
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let (head, body) = if let Some(pos) = find_subsequence(raw, b"\r\n\r\n") {
        (&raw[..pos], &raw[pos + 4..])
    } else if let Some(pos) = find_subsequence(raw, b"\n\n") {
        (&raw[..pos], &raw[pos + 2..])
    } else {
        (raw, &raw[raw.len()..])
    };

    let body = body
        .strip_suffix(b"\r\n")
        .or_else(|| body.strip_suffix(b"\n"))
        .unwrap_or(body);
    (head, body)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_header_lines(head_text: &str) -> Result<Vec<LogicalHeader>, Rejection> {
    let mut logical: Vec<LogicalHeader> = Vec::new();

    for line in head_text.lines() {
        if line.is_empty() {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous header
            let Some(current) = logical.last_mut() else {
                return Err(Rejection::MalformedHeader(
                    "continuation line before any header".to_string(),
                ));
            };
            current.value.push(' ');
            current.value.push_str(line.trim_start());
            current.raw_lines.push(line.to_string());
            continue;
        }

        let Some(colon) = line.find(':') else {
            return Err(Rejection::MalformedHeader(format!("no colon in: {line}")));
        };
        let name = &line[..colon];
        if name.is_empty() || !name.chars().all(|ch| ('!'..='~').contains(&ch) && ch != ':') {
            return Err(Rejection::MalformedHeader(format!(
                "invalid header name: {name}"
            )));
        }

        logical.push(LogicalHeader {
            name: name.to_string(),
            value: line[colon + 1..].trim_start().to_string(),
            raw_lines: vec![line.to_string()],
        });
    }

    Ok(logical)
}

/// Re-emit the header block with Message-ID, Date and Path normalized and
/// every other header byte-preserved in its original position
fn rebuild_header_block(
    logical: &[LogicalHeader],
    message_id: &str,
    date_text: &str,
    path: &str,
) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(logical.len() + 3);
    let (mut saw_mid, mut saw_date, mut saw_path) = (false, false, false);

    for header in logical {
        if header.name.eq_ignore_ascii_case("Message-ID") {
            saw_mid = true;
            lines.push(format!("Message-ID: {message_id}"));
        } else if header.name.eq_ignore_ascii_case("Date") {
            saw_date = true;
            lines.push(format!("Date: {date_text}"));
        } else if header.name.eq_ignore_ascii_case("Path") {
            saw_path = true;
            lines.push(format!("Path: {path}"));
        } else {
            lines.extend(header.raw_lines.iter().cloned());
        }
    }

    if !saw_mid {
        lines.push(format!("Message-ID: {message_id}"));
    }
    if !saw_date {
        lines.push(format!("Date: {date_text}"));
    }
    if !saw_path {
        lines.push(format!("Path: {path}"));
    }

    lines.join("\r\n")
}
