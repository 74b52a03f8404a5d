//! Group selection and discovery: GROUP, LISTGROUP, NEWGROUPS, NEWNEWS

use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};
use crate::validation;
use crate::wildmat::Wildmat;

use super::{Range, list::status_letter, parse_range, require_reader};

/// GROUP (RFC 3977 Section 6.1.1)
pub(crate) async fn group(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }
    if args.is_empty() || args.contains(char::is_whitespace) {
        return session
            .reply(codes::COMMAND_SYNTAX_ERROR, "GROUP newsgroup")
            .await;
    }

    let store = session.shared.store.clone();
    let Some(catalog) = store.get_catalog(session.identity.as_ref(), args)? else {
        return session.reply(codes::NO_SUCH_GROUP, "no such newsgroup").await;
    };

    session.select_group(&catalog);
    let text = format!(
        "{} {} {} {}",
        catalog.count, catalog.low, catalog.high, catalog.name
    );
    session.reply(codes::GROUP_SELECTED, &text).await
}

/// LISTGROUP (RFC 3977 Section 6.1.2)
pub(crate) async fn listgroup(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }

    let mut parts = args.split_whitespace();
    let name = parts.next();
    let range = match parts.next() {
        None => None,
        Some(arg) => match parse_range(arg) {
            Some(range) => Some(range),
            None => {
                return session
                    .reply(codes::COMMAND_SYNTAX_ERROR, "LISTGROUP [newsgroup [range]]")
                    .await;
            }
        },
    };

    let store = session.shared.store.clone();
    let catalog = match name {
        Some(name) => match store.get_catalog(session.identity.as_ref(), name)? {
            Some(catalog) => catalog,
            None => {
                return session.reply(codes::NO_SUCH_GROUP, "no such newsgroup").await;
            }
        },
        None => {
            let Some(cursor) = &session.group else {
                return session
                    .reply(codes::NO_GROUP_SELECTED, "no newsgroup selected")
                    .await;
            };
            match store.get_catalog(session.identity.as_ref(), &cursor.name)? {
                Some(catalog) => catalog,
                None => {
                    return session.reply(codes::NO_SUCH_GROUP, "no such newsgroup").await;
                }
            }
        }
    };

    session.select_group(&catalog);

    let Range { from, to } = range.unwrap_or(Range {
        from: catalog.low,
        to: Some(catalog.high),
    });
    let numbers: Vec<String> = if catalog.count == 0 {
        Vec::new()
    } else {
        store
            .get_messages(session.identity.as_ref(), &catalog.name, from, to)?
            .iter()
            .map(|placement| placement.number.to_string())
            .collect()
    };

    let text = format!(
        "{} {} {} {} list follows",
        catalog.count, catalog.low, catalog.high, catalog.name
    );
    session
        .framer
        .send_multiline(codes::GROUP_SELECTED, &text, numbers)
        .await?;
    Ok(Outcome::Continue)
}

/// NEWGROUPS date time [GMT] (RFC 3977 Section 7.3)
pub(crate) async fn newgroups(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }

    let parts: Vec<&str> = args.split_whitespace().collect();
    let Some(since) = parse_datetime_parts(&parts) else {
        return session
            .reply(codes::COMMAND_SYNTAX_ERROR, "NEWGROUPS [yy]yymmdd hhmmss [GMT]")
            .await;
    };

    let store = session.shared.store.clone();
    let lines: Vec<String> = store
        .catalogs_created_since(since)?
        .iter()
        .map(|catalog| {
            format!(
                "{} {} {} {}",
                catalog.name,
                catalog.high,
                catalog.low,
                status_letter(catalog)
            )
        })
        .collect();

    session
        .framer
        .send_multiline(codes::NEW_NEWSGROUPS_FOLLOW, "list of new newsgroups follows", lines)
        .await?;
    Ok(Outcome::Continue)
}

/// NEWNEWS wildmat date time [GMT] (RFC 3977 Section 7.4)
pub(crate) async fn newnews(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }

    let parts: Vec<&str> = args.split_whitespace().collect();
    let (pattern, datetime) = match parts.as_slice() {
        [pattern, rest @ ..] if !rest.is_empty() => {
            (*pattern, parse_datetime_parts(rest))
        }
        _ => ("", None),
    };
    let (Ok(pattern), Some(since)) = (Wildmat::parse(pattern), datetime) else {
        return session
            .reply(
                codes::COMMAND_SYNTAX_ERROR,
                "NEWNEWS wildmat [yy]yymmdd hhmmss [GMT]",
            )
            .await;
    };

    let store = session.shared.store.clone();
    let ids = store.message_ids_since(&pattern, since)?;
    session
        .framer
        .send_multiline(
            codes::NEW_ARTICLE_LIST_FOLLOWS,
            "list of new articles follows",
            ids,
        )
        .await?;
    Ok(Outcome::Continue)
}

/// Parse the `date time [GMT]` tail of NEWGROUPS and NEWNEWS
fn parse_datetime_parts(parts: &[&str]) -> Option<chrono::DateTime<chrono::Utc>> {
    match parts {
        [date, time] => validation::parse_nntp_datetime(date, time),
        [date, time, zone] if zone.eq_ignore_ascii_case("GMT") => {
            validation::parse_nntp_datetime(date, time)
        }
        _ => None,
    }
}
