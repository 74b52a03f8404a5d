//! OVER / XOVER overview lines (RFC 3977 Section 8.3, RFC 2980 Section 2.8)

use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};
use crate::store::Placement;

use super::{Range, parse_range, require_reader};

/// OVER [range|message-id]
///
/// Emits one tab-separated line per article: number, Subject, From, Date,
/// Message-ID, References, byte count, line count, then the full Xref
/// metadata field.
pub(crate) async fn over(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }

    let store = session.shared.store.clone();

    if args.starts_with('<') {
        let Some(located) = store.get_message_by_id(session.identity.as_ref(), args)? else {
            return session
                .reply(codes::NO_SUCH_ARTICLE_ID, "no such article")
                .await;
        };
        let line = overview_line(
            &session.shared.config.path_host,
            &located.group,
            0,
            &located.placement,
        );
        session
            .framer
            .send_multiline(codes::OVERVIEW_INFO_FOLLOWS, "overview information follows", [line])
            .await?;
        return Ok(Outcome::Continue);
    }

    let Some(cursor) = &session.group else {
        return session
            .reply(codes::NO_GROUP_SELECTED, "no newsgroup selected")
            .await;
    };
    let name = cursor.name.clone();

    let range = if args.is_empty() {
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
        match parse_range(args) {
            Some(range) => range,
            None => {
                return session
                    .reply(codes::COMMAND_SYNTAX_ERROR, "OVER [range|message-id]")
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

    let path_host = session.shared.config.path_host.clone();
    let lines: Vec<String> = placements
        .iter()
        .map(|placement| overview_line(&path_host, &name, placement.number, placement))
        .collect();
    session
        .framer
        .send_multiline(codes::OVERVIEW_INFO_FOLLOWS, "overview information follows", lines)
        .await?;
    Ok(Outcome::Continue)
}

fn overview_line(path_host: &str, group: &str, number: u64, placement: &Placement) -> String {
    let article = &placement.article;
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\tXref: {} {}:{}",
        number,
        sanitize(&article.subject),
        sanitize(&article.from),
        article.date.to_rfc2822(),
        article.message_id,
        sanitize(article.references().unwrap_or("")),
        article.byte_size(),
        article.line_count(),
        path_host,
        group,
        placement.number,
    )
}

/// Overview fields are tab-separated; embedded tabs would shift columns
fn sanitize(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}
