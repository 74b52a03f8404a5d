//! LIST and its keywords (RFC 3977 Section 7.6, RFC 6048)

use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};
use crate::store::Catalog;
use crate::wildmat::Wildmat;

use super::require_reader;

/// Status letter for LIST ACTIVE style output: `m` moderated, `n` posting
/// refused, `y` otherwise
pub(crate) fn status_letter(catalog: &Catalog) -> char {
    if catalog.moderated {
        'm'
    } else if catalog.deny_local_posting {
        'n'
    } else {
        'y'
    }
}

/// The overview field order OVER emits, advertised by LIST OVERVIEW.FMT
const OVERVIEW_FMT: [&str; 8] = [
    "Subject:",
    "From:",
    "Date:",
    "Message-ID:",
    "References:",
    ":bytes",
    ":lines",
    "Xref:full",
];

/// LIST [keyword [wildmat]]
pub(crate) async fn list(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }

    let (keyword, argument) = match args.split_once(char::is_whitespace) {
        Some((keyword, argument)) => (keyword, argument.trim()),
        None => (args, ""),
    };
    let keyword = if keyword.is_empty() {
        "ACTIVE".to_string()
    } else {
        keyword.to_ascii_uppercase()
    };

    match keyword.as_str() {
        "ACTIVE" => active(session, argument).await,
        "NEWSGROUPS" => newsgroups(session, argument).await,
        "ACTIVE.TIMES" => active_times(session, argument).await,
        "OVERVIEW.FMT" => overview_fmt(session).await,
        "HEADERS" => headers(session).await,
        "SUBSCRIPTIONS" => subscriptions(session).await,
        _ => {
            session
                .reply(codes::COMMAND_SYNTAX_ERROR, "unknown LIST keyword")
                .await
        }
    }
}

/// Collect the catalogs LIST operates on: the whole active file, with the
/// authenticated identity's personal catalogs folded in
fn visible_catalogs(session: &Session) -> Result<Vec<Catalog>> {
    Ok(session
        .shared
        .store
        .all_catalogs(session.identity.as_ref())?)
}

async fn matching_catalogs(
    session: &mut Session,
    wildmat_arg: &str,
) -> Result<std::result::Result<Vec<Catalog>, ()>> {
    let pattern = match Wildmat::parse(wildmat_arg) {
        Ok(pattern) => pattern,
        Err(_) => {
            session
                .framer
                .send_line(codes::COMMAND_SYNTAX_ERROR, "bad wildmat")
                .await?;
            return Ok(Err(()));
        }
    };
    let catalogs = visible_catalogs(session)?
        .into_iter()
        .filter(|catalog| pattern.matches(&catalog.name))
        .collect();
    Ok(Ok(catalogs))
}

/// LIST ACTIVE [wildmat]: `name high low status`
async fn active(session: &mut Session, wildmat_arg: &str) -> Result<Outcome> {
    let catalogs = match matching_catalogs(session, wildmat_arg).await? {
        Ok(catalogs) => catalogs,
        Err(()) => return Ok(Outcome::Continue),
    };
    let lines: Vec<String> = catalogs
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
        .send_multiline(codes::LIST_INFORMATION_FOLLOWS, "list of newsgroups follows", lines)
        .await?;
    Ok(Outcome::Continue)
}

/// LIST NEWSGROUPS [wildmat]: `name TAB description`
async fn newsgroups(session: &mut Session, wildmat_arg: &str) -> Result<Outcome> {
    let catalogs = match matching_catalogs(session, wildmat_arg).await? {
        Ok(catalogs) => catalogs,
        Err(()) => return Ok(Outcome::Continue),
    };
    let lines: Vec<String> = catalogs
        .iter()
        .map(|catalog| format!("{}\t{}", catalog.name, catalog.description))
        .collect();
    session
        .framer
        .send_multiline(
            codes::LIST_INFORMATION_FOLLOWS,
            "list of newsgroups follows",
            lines,
        )
        .await?;
    Ok(Outcome::Continue)
}

/// LIST ACTIVE.TIMES [wildmat]: `name created-epoch creator` (RFC 6048 Section 2.1)
async fn active_times(session: &mut Session, wildmat_arg: &str) -> Result<Outcome> {
    let catalogs = match matching_catalogs(session, wildmat_arg).await? {
        Ok(catalogs) => catalogs,
        Err(()) => return Ok(Outcome::Continue),
    };
    let lines: Vec<String> = catalogs
        .iter()
        .map(|catalog| {
            format!(
                "{} {} {}",
                catalog.name,
                catalog.created_at.timestamp(),
                catalog.creator
            )
        })
        .collect();
    session
        .framer
        .send_multiline(codes::LIST_INFORMATION_FOLLOWS, "group creation times follow", lines)
        .await?;
    Ok(Outcome::Continue)
}

/// LIST OVERVIEW.FMT (RFC 3977 Section 8.4)
async fn overview_fmt(session: &mut Session) -> Result<Outcome> {
    session
        .framer
        .send_multiline(
            codes::LIST_INFORMATION_FOLLOWS,
            "overview format follows",
            OVERVIEW_FMT,
        )
        .await?;
    Ok(Outcome::Continue)
}

/// LIST HEADERS (RFC 3977 Section 8.6): `:` means any header works with HDR
async fn headers(session: &mut Session) -> Result<Outcome> {
    session
        .framer
        .send_multiline(
            codes::LIST_INFORMATION_FOLLOWS,
            "supported header fields follow",
            [":", ":bytes", ":lines"],
        )
        .await?;
    Ok(Outcome::Continue)
}

/// LIST SUBSCRIPTIONS (RFC 6048 Section 2.4)
async fn subscriptions(session: &mut Session) -> Result<Outcome> {
    let names = match &session.identity {
        Some(identity) => session.shared.store.get_subscriptions(identity)?,
        None => Vec::new(),
    };
    session
        .framer
        .send_multiline(codes::LIST_INFORMATION_FOLLOWS, "subscriptions follow", names)
        .await?;
    Ok(Outcome::Continue)
}
