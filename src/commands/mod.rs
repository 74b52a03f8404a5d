//! NNTP command parsing and dispatch
//!
//! The dispatcher splits the verb off a command line, enforces the per-verb
//! preconditions (session state, authentication, argument shape) and routes
//! to one handler per verb. Handlers write their own replies through the
//! session framer and report whether the session continues.

mod article;
mod auth;
mod group;
mod hdr;
mod list;
mod misc;
mod over;
mod post;

use tracing::trace;

use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};

/// Dispatch one command line
pub(crate) async fn dispatch(session: &mut Session, line: &str) -> Result<Outcome> {
    let line = line.trim();
    let (verb, args) = match line.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (line, ""),
    };

    if verb.is_empty() {
        return session.reply(codes::COMMAND_NOT_RECOGNIZED, "empty command").await;
    }
    trace!(verb, "dispatch");

    match verb.to_ascii_uppercase().as_str() {
        "CAPABILITIES" => misc::capabilities(session).await,
        "MODE" => misc::mode(session, args).await,
        "QUIT" => {
            session
                .framer
                .send_line(codes::CLOSING_CONNECTION, "closing connection")
                .await?;
            Ok(Outcome::Quit)
        }
        "DATE" => misc::date(session).await,
        "HELP" => misc::help(session).await,
        "STARTTLS" => misc::starttls(session).await,
        "COMPRESS" => misc::compress(session, args).await,
        "AUTHINFO" => auth::authinfo(session, args).await,
        "LIST" => list::list(session, args).await,
        "GROUP" => group::group(session, args).await,
        "LISTGROUP" => group::listgroup(session, args).await,
        "NEWGROUPS" => group::newgroups(session, args).await,
        "NEWNEWS" => group::newnews(session, args).await,
        "NEXT" => article::next(session).await,
        "LAST" => article::last(session).await,
        "ARTICLE" => article::retrieve(session, args, article::Part::Full).await,
        "HEAD" => article::retrieve(session, args, article::Part::Head).await,
        "BODY" => article::retrieve(session, args, article::Part::Body).await,
        "STAT" => article::retrieve(session, args, article::Part::Stat).await,
        // XOVER and XHDR are the RFC 2980 spellings of OVER and HDR
        "OVER" | "XOVER" => over::over(session, args).await,
        "HDR" | "XHDR" => hdr::hdr(session, args).await,
        "POST" => post::post(session).await,
        "IHAVE" => post::ihave(session, args).await,
        "CHECK" => post::check(session, args).await,
        "TAKETHIS" => post::takethis(session, args).await,
        _ => session.reply(codes::COMMAND_NOT_RECOGNIZED, "unknown command").await,
    }
}

/// An article-number range argument: `n`, `n-` or `n-m`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Range {
    pub from: u64,
    pub to: Option<u64>,
}

/// Parse a range argument per RFC 3977 Section 6
pub(crate) fn parse_range(arg: &str) -> Option<Range> {
    match arg.split_once('-') {
        None => {
            let n = arg.parse().ok()?;
            Some(Range {
                from: n,
                to: Some(n),
            })
        }
        Some((from, "")) => Some(Range {
            from: from.parse().ok()?,
            to: None,
        }),
        Some((from, to)) => Some(Range {
            from: from.parse().ok()?,
            to: Some(to.parse().ok()?),
        }),
    }
}

/// Gate a reader command: send `480` and return false when the server
/// requires authentication and the session has none
pub(crate) async fn require_reader(session: &mut Session) -> Result<bool> {
    if session.reader_allowed() {
        return Ok(true);
    }
    session
        .framer
        .send_line(codes::AUTH_REQUIRED, "authentication required")
        .await?;
    Ok(false)
}

/// Gate a peer-transfer command (IHAVE, CHECK, TAKETHIS): the session must
/// be authenticated as an identity holding the inject capability
pub(crate) async fn require_inject(session: &mut Session) -> Result<bool> {
    match &session.identity {
        None => {
            session
                .framer
                .send_line(codes::AUTH_REQUIRED, "authentication required")
                .await?;
            Ok(false)
        }
        Some(identity) if !identity.capabilities.inject => {
            session
                .framer
                .send_line(codes::ACCESS_DENIED, "transfer permission denied")
                .await?;
            Ok(false)
        }
        Some(_) => Ok(true),
    }
}
