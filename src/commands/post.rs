//! Article intake: POST (RFC 3977 Section 6.3.1), IHAVE (Section 6.3.2),
//! CHECK and TAKETHIS (RFC 4644 streaming)

use chrono::Utc;
use tracing::{debug, info};

use crate::article::parse_article;
use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};
use crate::store::{PostOutcome, PostSource};
use crate::validation;

use super::{require_inject, require_reader};

/// POST: `340` continuation, read the article, parse, store
pub(crate) async fn post(session: &mut Session) -> Result<Outcome> {
    if !session.shared.config.allow_posting {
        return session
            .reply(codes::POSTING_NOT_PERMITTED, "posting not permitted")
            .await;
    }
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }

    session
        .framer
        .send_line(codes::SEND_ARTICLE, "send article to be posted")
        .await?;
    let raw = session
        .framer
        .read_data_block(session.shared.config.max_article_bytes)
        .await?;

    let article = match parse_article(&raw, &session.shared.config.path_host, Utc::now()) {
        Ok(article) => article,
        Err(rejection) => {
            debug!(reason = %rejection.reason(), "post rejected at parse");
            return session
                .reply(codes::POSTING_FAILED, &rejection.reason())
                .await;
        }
    };

    let store = session.shared.store.clone();
    match store.post(session.identity.as_ref(), article, PostSource::Local)? {
        PostOutcome::Stored(receipt) => {
            info!(message_id = %receipt.message_id, held = receipt.held, "article posted");
            let text = format!("article received {}", receipt.message_id);
            session.reply(codes::ARTICLE_POSTED, &text).await
        }
        PostOutcome::Rejected(rejection) => {
            debug!(reason = %rejection.reason(), "post rejected by store");
            session
                .reply(codes::POSTING_FAILED, &rejection.reason())
                .await
        }
    }
}

/// IHAVE message-id: offer/transfer a peer article with duplicate refusal
pub(crate) async fn ihave(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_inject(session).await? {
        return Ok(Outcome::Continue);
    }
    if !validation::validate_message_id(args) {
        return session
            .reply(codes::COMMAND_SYNTAX_ERROR, "IHAVE message-id")
            .await;
    }

    let store = session.shared.store.clone();
    if store.contains_message(args)? {
        return session
            .reply(codes::ARTICLE_NOT_WANTED, "article not wanted")
            .await;
    }

    session
        .framer
        .send_line(codes::SEND_ARTICLE_TRANSFER, "send article to be transferred")
        .await?;
    let raw = session
        .framer
        .read_data_block(session.shared.config.max_article_bytes)
        .await?;

    let article = match parse_article(&raw, &session.shared.config.path_host, Utc::now()) {
        Ok(article) => article,
        Err(rejection) => {
            return session
                .reply(codes::TRANSFER_REJECTED, &rejection.reason())
                .await;
        }
    };

    match store.post(session.identity.as_ref(), article, PostSource::Peer)? {
        PostOutcome::Stored(receipt) => {
            info!(message_id = %receipt.message_id, "article transferred");
            session
                .reply(codes::ARTICLE_TRANSFERRED, "article transferred ok")
                .await
        }
        PostOutcome::Rejected(rejection) => {
            session
                .reply(codes::TRANSFER_REJECTED, &rejection.reason())
                .await
        }
    }
}

/// CHECK message-id: streaming-mode duplicate probe
pub(crate) async fn check(session: &mut Session, args: &str) -> Result<Outcome> {
    if !require_inject(session).await? {
        return Ok(Outcome::Continue);
    }
    if !validation::validate_message_id(args) {
        return session
            .reply(codes::COMMAND_SYNTAX_ERROR, "CHECK message-id")
            .await;
    }

    let store = session.shared.store.clone();
    if store.contains_message(args)? {
        session
            .reply(codes::CHECK_NOT_WANTED, &format!("{args} article not wanted"))
            .await
    } else {
        session
            .reply(codes::CHECK_SEND, &format!("{args} send article"))
            .await
    }
}

/// TAKETHIS message-id: the article follows unconditionally, so the data
/// block is always consumed before any verdict is sent
pub(crate) async fn takethis(session: &mut Session, args: &str) -> Result<Outcome> {
    let authorized = match &session.identity {
        Some(identity) => identity.capabilities.inject,
        None => false,
    };
    let valid_id = validation::validate_message_id(args);

    let raw = session
        .framer
        .read_data_block(session.shared.config.max_article_bytes)
        .await?;

    if !authorized {
        return session
            .reply(
                codes::TAKETHIS_REJECTED,
                &format!("{args} transfer permission denied"),
            )
            .await;
    }
    if !valid_id {
        return session
            .reply(codes::TAKETHIS_REJECTED, &format!("{args} bad message-id"))
            .await;
    }

    let article = match parse_article(&raw, &session.shared.config.path_host, Utc::now()) {
        Ok(article) => article,
        Err(rejection) => {
            return session
                .reply(
                    codes::TAKETHIS_REJECTED,
                    &format!("{args} {}", rejection.reason()),
                )
                .await;
        }
    };

    let store = session.shared.store.clone();
    match store.post(session.identity.as_ref(), article, PostSource::Peer)? {
        PostOutcome::Stored(receipt) => {
            info!(message_id = %receipt.message_id, "article taken");
            session
                .reply(codes::TAKETHIS_RECEIVED, &format!("{args} article received"))
                .await
        }
        PostOutcome::Rejected(rejection) => {
            session
                .reply(
                    codes::TAKETHIS_REJECTED,
                    &format!("{args} {}", rejection.reason()),
                )
                .await
        }
    }
}
