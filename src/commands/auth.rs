//! AUTHINFO USER/PASS (RFC 4643)

use tracing::{debug, info};

use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};

/// AUTHINFO dispatcher: `USER name` then `PASS password`
pub(crate) async fn authinfo(session: &mut Session, args: &str) -> Result<Outcome> {
    let (subcommand, value) = match args.split_once(char::is_whitespace) {
        Some((sub, value)) => (sub, value.trim()),
        None => (args, ""),
    };

    match subcommand.to_ascii_uppercase().as_str() {
        "USER" => user(session, value).await,
        "PASS" => pass(session, value).await,
        _ => {
            session
                .reply(codes::COMMAND_SYNTAX_ERROR, "AUTHINFO USER or AUTHINFO PASS")
                .await
        }
    }
}

async fn user(session: &mut Session, username: &str) -> Result<Outcome> {
    if session.identity.is_some() {
        return session
            .reply(codes::ACCESS_DENIED, "already authenticated")
            .await;
    }
    if username.is_empty() {
        return session
            .reply(codes::COMMAND_SYNTAX_ERROR, "username required")
            .await;
    }

    session.pending_user = Some(username.to_string());
    session.reply(codes::AUTH_CONTINUE, "password required").await
}

async fn pass(session: &mut Session, password: &str) -> Result<Outcome> {
    if session.identity.is_some() {
        return session
            .reply(codes::ACCESS_DENIED, "already authenticated")
            .await;
    }
    let Some(username) = session.pending_user.take() else {
        return session
            .reply(codes::AUTH_OUT_OF_SEQUENCE, "AUTHINFO USER first")
            .await;
    };

    let store = session.shared.store.clone();
    match store.authenticate_password(&username, password)? {
        Some(identity) => {
            if identity.local_authentication_only
                && !session.framer.is_tls()
                && !session.peer_is_local()
            {
                debug!(user = %username, "refusing cleartext remote authentication");
                return session
                    .reply(codes::ENCRYPTION_REQUIRED, "TLS required for this user")
                    .await;
            }

            store.ensure(&identity)?;
            info!(user = %identity.username, peer = %session.peer, "authenticated");
            session.identity = Some(identity);
            session.reply(codes::AUTH_ACCEPTED, "authenticated").await
        }
        None => {
            debug!(user = %username, "authentication failed");
            session
                .reply(codes::AUTH_REJECTED, "authentication failed")
                .await
        }
    }
}
