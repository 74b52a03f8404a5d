//! Storage contract: identities, catalogs, messages and subscriptions
//!
//! The protocol engine talks to articles and newsgroups only through the
//! [`Store`] trait. Backends must be safe for concurrent calls from many
//! sessions and must serialize every mutation that affects per-group
//! numbering and watermarks. The in-memory backend in [`memory`] is the
//! reference implementation and the test substrate.

mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::article::Article;
use crate::wildmat::Wildmat;

pub use memory::MemoryStore;

/// Backing store failure
///
/// Store failures are session-fatal: the engine answers `403` best-effort
/// and closes the connection.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend cannot be reached or is in a failed state
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The named catalog does not exist
    #[error("No such catalog: {0}")]
    NoSuchCatalog(String),

    /// The identity is unknown to the store
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Per-identity permission flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    /// May carry an Approved header into moderated groups
    pub approve_any: bool,
    /// May cancel articles
    pub cancel: bool,
    /// May create global catalogs
    pub create_catalog: bool,
    /// May delete global catalogs
    pub delete_catalog: bool,
    /// May inspect catalog internals
    pub check_catalog: bool,
    /// May inject peer traffic (IHAVE, CHECK, TAKETHIS)
    pub inject: bool,
}

/// An authenticated principal
#[derive(Debug, Clone)]
pub struct Identity {
    /// Store-assigned id
    pub id: u64,
    /// Unique username, matched case-insensitively
    pub username: String,
    /// `base64(SHA-512(salt || password))`
    pub password_hash: String,
    /// Base64 salt, regenerated on every password change
    pub salt: String,
    /// Refuse authentication over cleartext from non-local peers
    pub local_authentication_only: bool,
    /// Permission flags
    pub capabilities: CapabilitySet,
    /// Most recent successful authentication
    pub last_login: Option<DateTime<Utc>>,
}

/// Which placements a catalog view exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArticleFilter {
    /// Not cancelled, not pending (the plain group)
    #[default]
    Visible,
    /// Cancelled placements (the `.deleted` meta-catalog)
    Cancelled,
    /// Pending placements (the `.pending` meta-catalog)
    Pending,
}

/// A newsgroup, or a meta-view of one, with watermarks at query time
///
/// Meta-catalogs (`name.deleted`, `name.pending`) are materialized per query
/// from the underlying group; they are never persisted.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// The name this catalog was addressed by, meta suffix included
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Posts are held for moderation
    pub moderated: bool,
    /// Refuse locally posted articles
    pub deny_local_posting: bool,
    /// Refuse peer-transferred articles
    pub deny_peer_posting: bool,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Username of the creator
    pub creator: String,
    /// Owner username for personal catalogs, `None` for global ones
    pub owner: Option<String>,
    /// Which placements this view exposes
    pub filter: ArticleFilter,
    /// Smallest visible article number (next number when empty)
    pub low: u64,
    /// Largest visible article number (`low - 1` when empty)
    pub high: u64,
    /// Number of visible articles
    pub count: u64,
}

/// A message placed in one newsgroup
#[derive(Debug, Clone)]
pub struct Placement {
    /// Article number within the group; unique, monotonically assigned
    pub number: u64,
    /// Withdrawn by cancel
    pub cancelled: bool,
    /// Held for moderation
    pub pending: bool,
    /// The article content
    pub article: Arc<Article>,
}

/// A placement found by message-id, with the group it lives in
#[derive(Debug, Clone)]
pub struct Located {
    /// Group name the placement belongs to
    pub group: String,
    /// The placement itself
    pub placement: Placement,
}

/// A remote peer record
///
/// The engine stores these; the outbound feeder that consumes them runs
/// outside the protocol core.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Peer hostname
    pub hostname: String,
    /// Peer NNTP port
    pub port: u16,
    /// Wildmat of groups accepted from this peer when it connects to us
    pub active_receive: Option<String>,
    /// Wildmat of groups pulled from this peer
    pub passive_receive: Option<String>,
    /// Wildmat of groups offered to this peer
    pub send: Option<String>,
}

/// Where a new article comes from; posting policy differs per source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSource {
    /// A reader session issued POST
    Local,
    /// A peer session issued IHAVE or TAKETHIS
    Peer,
}

/// Result of a successful `post`
#[derive(Debug, Clone)]
pub struct PostReceipt {
    /// Final message-id of the stored article
    pub message_id: String,
    /// `(group, number)` pairs assigned, in Newsgroups order
    pub placements: Vec<(String, u64)>,
    /// At least one placement was held for moderation
    pub held: bool,
}

/// Why a post was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostRejection {
    /// The message-id already exists in the store
    Duplicate(String),
    /// A named group does not exist
    NoSuchGroup(String),
    /// The group refuses articles from this source
    PostingDenied(String),
    /// An Approved header was supplied without approval rights
    ModerationRequired,
}

impl PostRejection {
    /// Short reason phrase for the failure reply
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            PostRejection::Duplicate(mid) => format!("duplicate message-id {mid}"),
            PostRejection::NoSuchGroup(name) => format!("no such newsgroup {name}"),
            PostRejection::PostingDenied(name) => format!("posting to {name} not permitted"),
            PostRejection::ModerationRequired => "moderation required".to_string(),
        }
    }
}

/// Outcome of a `post` call: stored, or refused with a reportable reason
#[derive(Debug, Clone)]
pub enum PostOutcome {
    /// The article was stored
    Stored(PostReceipt),
    /// The article was refused; the session stays open
    Rejected(PostRejection),
}

/// The storage contract the protocol engine depends on
///
/// Implementations must serialize mutations that affect `(group, number)`
/// assignment and watermarks; readers observe a consistent snapshot per
/// call, with no cross-call consistency required.
pub trait Store: Send + Sync {
    /// Idempotent per-identity initialization (personal INBOX and the like)
    fn ensure(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Resolve a catalog by name, meta-catalog suffixes included
    ///
    /// Personal catalogs resolve only for their owner.
    fn get_catalog(
        &self,
        identity: Option<&Identity>,
        name: &str,
    ) -> Result<Option<Catalog>, StoreError>;

    /// The active file: every global catalog ordered by name, plus the
    /// personal catalogs of `identity` when one is given
    fn all_catalogs(&self, identity: Option<&Identity>) -> Result<Vec<Catalog>, StoreError>;

    /// Global catalogs ordered by name, filtered by hierarchy level
    ///
    /// With `parent = None`, root catalogs (no delimiter in the name); with
    /// `parent = Some(x)`, catalogs whose name starts `x` + delimiter.
    fn list_global_catalogs(
        &self,
        identity: Option<&Identity>,
        parent: Option<&str>,
    ) -> Result<Vec<Catalog>, StoreError>;

    /// Personal catalogs of this identity, same hierarchy filtering
    fn list_personal_catalogs(
        &self,
        identity: &Identity,
        parent: Option<&str>,
    ) -> Result<Vec<Catalog>, StoreError>;

    /// Create a personal catalog; refuses "INBOX" and name collisions
    fn create_personal_catalog(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<bool, StoreError>;

    /// Verify a password in constant time; updates `last_login` on success
    fn authenticate_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Identity>, StoreError>;

    /// Placements of a catalog in `[from, to]` (unbounded above when `to`
    /// is `None`), ordered by number, filtered per the catalog's view
    fn get_messages(
        &self,
        identity: Option<&Identity>,
        catalog: &str,
        from: u64,
        to: Option<u64>,
    ) -> Result<Vec<Placement>, StoreError>;

    /// Find an article by message-id
    fn get_message_by_id(
        &self,
        identity: Option<&Identity>,
        message_id: &str,
    ) -> Result<Option<Located>, StoreError>;

    /// Whether a message-id exists anywhere in the store
    fn contains_message(&self, message_id: &str) -> Result<bool, StoreError>;

    /// Store an article, allocating a fresh number per target group
    ///
    /// Numbers are at least the group's high watermark plus one, and the
    /// allocation plus watermark update is atomic per group.
    fn post(
        &self,
        identity: Option<&Identity>,
        article: Article,
        source: PostSource,
    ) -> Result<PostOutcome, StoreError>;

    /// Add a subscription for this identity
    fn subscribe(&self, identity: &Identity, name: &str) -> Result<(), StoreError>;

    /// Remove a subscription for this identity
    fn unsubscribe(&self, identity: &Identity, name: &str) -> Result<(), StoreError>;

    /// Subscription names of this identity, ordered
    fn get_subscriptions(&self, identity: &Identity) -> Result<Vec<String>, StoreError>;

    /// Global catalogs created strictly after `since`, ordered by name
    fn catalogs_created_since(&self, since: DateTime<Utc>) -> Result<Vec<Catalog>, StoreError>;

    /// Message-ids of visible articles dated after `since` in groups
    /// matching the wildmat
    fn message_ids_since(
        &self,
        pattern: &Wildmat,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError>;
}
