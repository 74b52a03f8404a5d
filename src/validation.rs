//! RFC 5536 header validation
//!
//! Validation helpers for Message-IDs, newsgroup names, mailbox addresses
//! and the date formats NNTP commands carry.

use chrono::{DateTime, TimeZone, Utc};

/// Validates a Message-ID against the RFC 5536 Section 3.1.3 grammar
///
/// The accepted form is `<dot-atom-text "@" (dot-atom-text | no-fold-literal)>`:
/// - the local part is one or more atext runs separated by single dots
/// - the domain is either dot-atom-text or a `[...]` literal
///
/// # Examples
///
/// ```
/// use nntpd_rs::validation::validate_message_id;
///
/// assert!(validate_message_id("<abc123@example.com>"));
/// assert!(validate_message_id("<a.b.c@[127.0.0.1]>"));
/// assert!(!validate_message_id("abc123@example.com")); // missing brackets
/// assert!(!validate_message_id("<abc123>"));           // missing @
/// assert!(!validate_message_id("<a..b@example.com>")); // empty dot-atom run
/// ```
#[must_use]
pub fn validate_message_id(message_id: &str) -> bool {
    // Minimum is <a@b>
    if message_id.len() < 5 {
        return false;
    }
    let Some(content) = message_id
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
    else {
        return false;
    };

    let Some((local, domain)) = content.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }

    if !is_dot_atom_text(local) {
        return false;
    }

    is_dot_atom_text(domain) || is_no_fold_literal(domain)
}

/// RFC 5322 atext: printable ASCII minus specials
fn is_atext(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '/'
                | '='
                | '?'
                | '^'
                | '_'
                | '`'
                | '{'
                | '|'
                | '}'
                | '~'
        )
}

fn is_dot_atom_text(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(|run| !run.is_empty() && run.chars().all(is_atext))
}

/// `[` *dtext `]` where dtext is printable ASCII minus `[`, `]` and `\`
fn is_no_fold_literal(s: &str) -> bool {
    let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
        return false;
    };
    inner
        .chars()
        .all(|ch| matches!(ch, '\x21'..='\x5a' | '\x5e'..='\x7e'))
}

/// Validates a newsgroup name (RFC 5536 Section 3.1.4)
///
/// Dot-separated non-empty components of lowercase letters, digits and
/// `+`, `-`, `_`.
#[must_use]
pub fn validate_newsgroup_name(newsgroup: &str) -> bool {
    !newsgroup.is_empty()
        && newsgroup.split('.').all(|component| {
            !component.is_empty()
                && component.chars().all(|ch| {
                    ch.is_ascii_lowercase()
                        || ch.is_ascii_digit()
                        || ch == '+'
                        || ch == '-'
                        || ch == '_'
                })
        })
}

/// Validates a From header against a simplified RFC 5322 address-list grammar
///
/// Accepts comma-separated mailboxes of the forms `local@domain`,
/// `Display Name <local@domain>` and `local@domain (Comment)`. Commas
/// inside quoted strings or angle brackets do not split.
#[must_use]
pub fn validate_from(value: &str) -> bool {
    let parts = split_address_list(value);
    !parts.is_empty() && parts.iter().all(|part| validate_mailbox(part.trim()))
}

fn split_address_list(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;
    for (i, ch) in value.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn validate_mailbox(mailbox: &str) -> bool {
    if mailbox.is_empty() {
        return false;
    }

    // Display Name <addr-spec>
    if let Some(lt) = mailbox.find('<') {
        let Some(rest) = mailbox[lt + 1..].strip_suffix('>') else {
            return false;
        };
        return validate_addr_spec(rest);
    }

    // addr-spec (Comment)
    let addr = match mailbox.find('(') {
        Some(paren) if mailbox.ends_with(')') => mailbox[..paren].trim(),
        _ => mailbox,
    };
    validate_addr_spec(addr)
}

fn validate_addr_spec(addr: &str) -> bool {
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    addr.chars().all(|ch| !ch.is_whitespace() && !ch.is_control())
}

/// Parses an RFC 5322 date-time string into a `DateTime<Utc>`
///
/// Also accepts the common `GMT` zone spelling some agents emit.
#[must_use]
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt.with_timezone(&Utc));
    }
    if date_str.contains("GMT") {
        let normalized = date_str.replace("GMT", "+0000");
        if let Ok(dt) = DateTime::parse_from_rfc2822(&normalized) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    None
}

/// Parses the `[yy]yymmdd hhmmss` timestamp NEWGROUPS and NEWNEWS carry
///
/// Six-digit dates follow the RFC 3977 century rule: years 00-69 map to
/// 2000-2069, years 70-99 to 1970-1999. The timestamp is interpreted as UTC
/// (the optional GMT argument is the only supported zone).
#[must_use]
pub fn parse_nntp_datetime(date: &str, time: &str) -> Option<DateTime<Utc>> {
    if !date.chars().all(|c| c.is_ascii_digit()) || !time.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let year: i32 = match date.len() {
        8 => date[..4].parse().ok()?,
        6 => {
            let yy: i32 = date[..2].parse().ok()?;
            if yy <= 69 { 2000 + yy } else { 1900 + yy }
        }
        _ => return None,
    };
    let month: u32 = date[date.len() - 4..date.len() - 2].parse().ok()?;
    let day: u32 = date[date.len() - 2..].parse().ok()?;

    if time.len() != 6 {
        return None;
    }
    let hour: u32 = time[..2].parse().ok()?;
    let minute: u32 = time[2..4].parse().ok()?;
    let second: u32 = time[4..].parse().ok()?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}
