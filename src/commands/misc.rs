//! Session-level commands: CAPABILITIES, MODE, DATE, HELP, STARTTLS, COMPRESS

use chrono::Utc;

use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};

/// CAPABILITIES (RFC 3977 Section 5.2)
///
/// The list is state-dependent: STARTTLS disappears once TLS is active or
/// after authentication, AUTHINFO disappears once authenticated, COMPRESS
/// disappears once active.
pub(crate) async fn capabilities(session: &mut Session) -> Result<Outcome> {
    let mut lines: Vec<String> = vec![
        "VERSION 2".to_string(),
        "READER".to_string(),
        "IHAVE".to_string(),
        "STREAMING".to_string(),
        "NEWNEWS".to_string(),
        "HDR".to_string(),
        "OVER MSGID".to_string(),
        "LIST ACTIVE NEWSGROUPS ACTIVE.TIMES OVERVIEW.FMT HEADERS SUBSCRIPTIONS".to_string(),
    ];
    if session.shared.config.allow_posting {
        lines.push("POST".to_string());
    }
    if session.identity.is_none() {
        lines.push("AUTHINFO USER".to_string());
    }
    if session.starttls_available() && session.identity.is_none() {
        lines.push("STARTTLS".to_string());
    }
    if !session.framer.compression_active() {
        lines.push("COMPRESS DEFLATE".to_string());
    }

    session
        .framer
        .send_multiline(codes::CAPABILITY_LIST, "Capability list:", lines)
        .await?;
    Ok(Outcome::Continue)
}

/// MODE READER / MODE STREAM (RFC 3977 Section 5.3, RFC 4644 Section 2.3)
pub(crate) async fn mode(session: &mut Session, args: &str) -> Result<Outcome> {
    match args.to_ascii_uppercase().as_str() {
        "READER" => {
            if session.shared.config.allow_posting {
                session
                    .reply(codes::READY_POSTING_ALLOWED, "posting allowed")
                    .await
            } else {
                session.reply(codes::READY_NO_POSTING, "no posting").await
            }
        }
        "STREAM" => session.reply(codes::STREAMING_OK, "streaming permitted").await,
        _ => {
            session
                .reply(codes::COMMAND_SYNTAX_ERROR, "MODE READER or MODE STREAM")
                .await
        }
    }
}

/// DATE (RFC 3977 Section 7.1)
pub(crate) async fn date(session: &mut Session) -> Result<Outcome> {
    let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
    session.reply(codes::SERVER_DATE, &stamp).await
}

/// HELP (RFC 3977 Section 7.2)
pub(crate) async fn help(session: &mut Session) -> Result<Outcome> {
    let lines = [
        "ARTICLE [message-id|number]",
        "AUTHINFO USER name | AUTHINFO PASS password",
        "BODY [message-id|number]",
        "CAPABILITIES",
        "CHECK message-id",
        "COMPRESS DEFLATE [TERMINATOR]",
        "DATE",
        "GROUP newsgroup",
        "HDR header [range|message-id]",
        "HEAD [message-id|number]",
        "HELP",
        "IHAVE message-id",
        "LAST",
        "LIST [ACTIVE|NEWSGROUPS|ACTIVE.TIMES|OVERVIEW.FMT|HEADERS|SUBSCRIPTIONS] [wildmat]",
        "LISTGROUP [newsgroup [range]]",
        "MODE READER | MODE STREAM",
        "NEWGROUPS date time [GMT]",
        "NEWNEWS wildmat date time [GMT]",
        "NEXT",
        "OVER [range|message-id]",
        "POST",
        "QUIT",
        "STARTTLS",
        "STAT [message-id|number]",
        "TAKETHIS message-id",
    ];
    session
        .framer
        .send_multiline(codes::HELP_TEXT_FOLLOWS, "Legal commands", lines)
        .await?;
    Ok(Outcome::Continue)
}

/// STARTTLS (RFC 4642)
///
/// The `382` reply is the last cleartext line; the handshake runs in the
/// session loop, which then discards authentication and group state.
pub(crate) async fn starttls(session: &mut Session) -> Result<Outcome> {
    if session.framer.is_tls() {
        return session
            .reply(codes::ACCESS_DENIED, "TLS already active")
            .await;
    }
    if session.framer.compression_active() {
        return session
            .reply(codes::ACCESS_DENIED, "STARTTLS not permitted after COMPRESS")
            .await;
    }
    if !session.starttls_available() {
        return session
            .reply(codes::TLS_NOT_AVAILABLE, "can not initiate TLS negotiation")
            .await;
    }
    if session.framer.has_buffered_input() {
        // Commands pipelined behind STARTTLS would straddle the handshake
        return session
            .reply(codes::TLS_NOT_AVAILABLE, "pipelining across STARTTLS not permitted")
            .await;
    }

    session
        .framer
        .send_line(codes::CONTINUE_TLS, "continue with TLS negotiation")
        .await?;
    Ok(Outcome::StartTls)
}

/// COMPRESS DEFLATE [TERMINATOR] (RFC 4644 extension framing)
pub(crate) async fn compress(session: &mut Session, args: &str) -> Result<Outcome> {
    if session.framer.compression_active() {
        return session
            .reply(codes::ACCESS_DENIED, "compression already active")
            .await;
    }

    let mut parts = args.split_whitespace();
    let algorithm = parts.next().unwrap_or("");
    if !algorithm.eq_ignore_ascii_case("DEFLATE") {
        return session
            .reply(codes::COMMAND_SYNTAX_ERROR, "COMPRESS DEFLATE [TERMINATOR]")
            .await;
    }
    let compress_terminator = match parts.next() {
        None => false,
        Some(option) if option.eq_ignore_ascii_case("TERMINATOR") => true,
        Some(_) => {
            return session
                .reply(codes::COMMAND_SYNTAX_ERROR, "COMPRESS DEFLATE [TERMINATOR]")
                .await;
        }
    };

    // The activating reply itself is uncompressed; everything after it is
    // part of the deflate stream
    session
        .framer
        .send_line(codes::COMPRESSION_ACTIVE, "compression active")
        .await?;
    session.framer.enable_deflate(compress_terminator);
    Ok(Outcome::Continue)
}
