//! HDR / XHDR header field retrieval (RFC 3977 Section 8.5, RFC 2980 Section 2.6)

use crate::article::Article;
use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};

use super::{Range, parse_range, require_reader};

/// HDR header [range|message-id]
///
/// Besides real header names the metadata items `:bytes` and `:lines` are
/// supported. Articles lacking the header get an empty value.
pub(crate) async fn hdr(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }

    let (field, argument) = match args.split_once(char::is_whitespace) {
        Some((field, argument)) => (field, argument.trim()),
        None => (args, ""),
    };
    if field.is_empty() {
        return session
            .reply(codes::COMMAND_SYNTAX_ERROR, "HDR header [range|message-id]")
            .await;
    }

    let store = session.shared.store.clone();

    let path_host = session.shared.config.path_host.clone();

    if argument.starts_with('<') {
        let Some(located) = store.get_message_by_id(session.identity.as_ref(), argument)? else {
            return session
                .reply(codes::NO_SUCH_ARTICLE_ID, "no such article")
                .await;
        };
        let xref = format!("{path_host} {}:{}", located.group, located.placement.number);
        let line = format!(
            "0 {}",
            field_value(field, &located.placement.article, &xref)
        );
        session
            .framer
            .send_multiline(codes::HEADERS_FOLLOW, "header information follows", [line])
            .await?;
        return Ok(Outcome::Continue);
    }

    let Some(cursor) = &session.group else {
        return session
            .reply(codes::NO_GROUP_SELECTED, "no newsgroup selected")
            .await;
    };
    let name = cursor.name.clone();

    let range = if argument.is_empty() {
        let Some(current) = cursor.current else {
            return session
                .reply(codes::NO_CURRENT_ARTICLE, "no current article")
                .await;
        };
        Range {
            from: current,
            to: Some(current),
        }
    } else {
        match parse_range(argument) {
            Some(range) => range,
            None => {
                return session
                    .reply(codes::COMMAND_SYNTAX_ERROR, "HDR header [range|message-id]")
                    .await;
            }
        }
    };

    let placements = store.get_messages(session.identity.as_ref(), &name, range.from, range.to)?;
    if placements.is_empty() {
        return session
            .reply(codes::NO_SUCH_ARTICLE_NUMBER, "no articles in that range")
            .await;
    }

    let lines: Vec<String> = placements
        .iter()
        .map(|placement| {
            let xref = format!("{path_host} {name}:{}", placement.number);
            format!(
                "{} {}",
                placement.number,
                field_value(field, &placement.article, &xref)
            )
        })
        .collect();
    session
        .framer
        .send_multiline(codes::HEADERS_FOLLOW, "header information follows", lines)
        .await?;
    Ok(Outcome::Continue)
}

fn field_value(field: &str, article: &Article, xref: &str) -> String {
    if field.eq_ignore_ascii_case(":bytes") {
        return article.byte_size().to_string();
    }
    if field.eq_ignore_ascii_case(":lines") {
        return article.line_count().to_string();
    }
    // Xref is generated per placement, never stored on the article
    if field.eq_ignore_ascii_case("Xref") {
        return xref.to_string();
    }
    article
        .headers
        .get(field)
        .map(|value| value.replace(['\r', '\n', '\t'], " "))
        .unwrap_or_default()
}
