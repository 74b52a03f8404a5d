//! Article retrieval: ARTICLE, HEAD, BODY, STAT, NEXT, LAST

use crate::error::Result;
use crate::response::codes;
use crate::session::{Outcome, Session};
use crate::store::Placement;

use super::require_reader;

/// Which part of the article a retrieval command returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Part {
    /// ARTICLE: headers, blank line, body
    Full,
    /// HEAD: headers only
    Head,
    /// BODY: body only
    Body,
    /// STAT: status line only
    Stat,
}

impl Part {
    fn success_code(self) -> u16 {
        match self {
            Part::Full => codes::ARTICLE_FOLLOWS,
            Part::Head => codes::HEAD_FOLLOWS,
            Part::Body => codes::BODY_FOLLOWS,
            Part::Stat => codes::ARTICLE_STAT,
        }
    }
}

/// ARTICLE / HEAD / BODY / STAT (RFC 3977 Section 6.2)
///
/// Three addressing forms: no argument (the cursor), an article number
/// (also repositions the cursor) and a message-id (cursor untouched).
pub(crate) async fn retrieve(session: &mut Session, args: &str, part: Part) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }

    if args.starts_with('<') {
        return by_message_id(session, args, part).await;
    }

    if args.is_empty() {
        let Some(cursor) = &session.group else {
            return session
                .reply(codes::NO_GROUP_SELECTED, "no newsgroup selected")
                .await;
        };
        let name = cursor.name.clone();
        let Some(current) = cursor.current else {
            return session
                .reply(codes::NO_CURRENT_ARTICLE, "no current article")
                .await;
        };
        return by_number(session, name, current, part, codes::NO_CURRENT_ARTICLE).await;
    }

    match args.parse::<u64>() {
        Ok(number) => {
            let Some(cursor) = &session.group else {
                return session
                    .reply(codes::NO_GROUP_SELECTED, "no newsgroup selected")
                    .await;
            };
            let name = cursor.name.clone();
            by_number(session, name, number, part, codes::NO_SUCH_ARTICLE_NUMBER).await
        }
        Err(_) => {
            session
                .reply(codes::COMMAND_SYNTAX_ERROR, "article number or message-id")
                .await
        }
    }
}

async fn by_message_id(session: &mut Session, message_id: &str, part: Part) -> Result<Outcome> {
    let store = session.shared.store.clone();
    let Some(located) = store.get_message_by_id(session.identity.as_ref(), message_id)? else {
        return session
            .reply(codes::NO_SUCH_ARTICLE_ID, "no such article")
            .await;
    };
    // Addressed by message-id the article number reads 0 and the cursor
    // stays where it was
    send_article(session, 0, &located.placement, part).await
}

async fn by_number(
    session: &mut Session,
    name: String,
    number: u64,
    part: Part,
    missing_code: u16,
) -> Result<Outcome> {
    let store = session.shared.store.clone();
    let placements = store.get_messages(session.identity.as_ref(), &name, number, Some(number))?;
    let Some(placement) = placements.first() else {
        return session.reply(missing_code, "no such article").await;
    };

    if let Some(cursor) = &mut session.group {
        cursor.current = Some(number);
    }
    send_article(session, number, placement, part).await
}

async fn send_article(
    session: &mut Session,
    number: u64,
    placement: &Placement,
    part: Part,
) -> Result<Outcome> {
    let article = &placement.article;
    let status = format!("{} {}", number, article.message_id);

    if part == Part::Stat {
        return session.reply(part.success_code(), &status).await;
    }

    let mut lines: Vec<Vec<u8>> = Vec::new();
    match part {
        Part::Full => {
            lines.extend(article.head_lines().map(<[u8]>::to_vec));
            lines.push(Vec::new());
            lines.extend(article.body_lines().map(<[u8]>::to_vec));
        }
        Part::Head => lines.extend(article.head_lines().map(<[u8]>::to_vec)),
        Part::Body => lines.extend(article.body_lines().map(<[u8]>::to_vec)),
        Part::Stat => unreachable!(),
    }

    session
        .framer
        .send_multiline(part.success_code(), &status, lines)
        .await?;
    Ok(Outcome::Continue)
}

/// NEXT (RFC 3977 Section 6.1.4): advance the cursor over holes to the next
/// present article
pub(crate) async fn next(session: &mut Session) -> Result<Outcome> {
    step(session, Direction::Forward).await
}

/// LAST (RFC 3977 Section 6.1.3): retreat the cursor to the previous
/// present article
pub(crate) async fn last(session: &mut Session) -> Result<Outcome> {
    step(session, Direction::Backward).await
}

enum Direction {
    Forward,
    Backward,
}

async fn step(session: &mut Session, direction: Direction) -> Result<Outcome> {
    if !require_reader(session).await? {
        return Ok(Outcome::Continue);
    }
    let Some(cursor) = &session.group else {
        return session
            .reply(codes::NO_GROUP_SELECTED, "no newsgroup selected")
            .await;
    };
    let Some(current) = cursor.current else {
        return session
            .reply(codes::NO_CURRENT_ARTICLE, "no current article")
            .await;
    };
    let (name, low, high) = (cursor.name.clone(), cursor.low, cursor.high);

    // The cursor moves within the watermark window captured at selection
    let store = session.shared.store.clone();
    let target = match direction {
        Direction::Forward => {
            if current >= high {
                None
            } else {
                store
                    .get_messages(session.identity.as_ref(), &name, current + 1, Some(high))?
                    .into_iter()
                    .next()
            }
        }
        Direction::Backward => {
            if current <= low {
                None
            } else {
                store
                    .get_messages(session.identity.as_ref(), &name, low, Some(current - 1))?
                    .into_iter()
                    .next_back()
            }
        }
    };

    let Some(placement) = target else {
        return match direction {
            Direction::Forward => {
                session
                    .reply(codes::NO_NEXT_ARTICLE, "no next article in this group")
                    .await
            }
            Direction::Backward => {
                session
                    .reply(codes::NO_PREV_ARTICLE, "no previous article in this group")
                    .await
            }
        };
    };

    if let Some(cursor) = &mut session.group {
        cursor.current = Some(placement.number);
    }
    let text = format!(
        "{} {} article retrieved",
        placement.number, placement.article.message_id
    );
    session.reply(codes::ARTICLE_STAT, &text).await
}
