//! In-memory store backend
//!
//! Reference implementation of the [`Store`] contract. One mutex guards the
//! whole state, which trivially satisfies the serialization requirement for
//! number allocation and watermark updates. Used by the test suites and as
//! the seed backend for single-process deployments.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::article::Article;
use crate::auth;
use crate::validation;
use crate::wildmat::Wildmat;

use super::{
    ArticleFilter, Catalog, CapabilitySet, Identity, Located, Peer, Placement, PostOutcome,
    PostReceipt, PostRejection, PostSource, Store, StoreError,
};

/// Reserved name of the auto-created personal catalog
const INBOX: &str = "INBOX";

struct PlacementRecord {
    message_id: String,
    cancelled: bool,
    pending: bool,
}

impl PlacementRecord {
    fn matches(&self, filter: ArticleFilter) -> bool {
        match filter {
            ArticleFilter::Visible => !self.cancelled && !self.pending,
            ArticleFilter::Cancelled => self.cancelled,
            ArticleFilter::Pending => self.pending && !self.cancelled,
        }
    }
}

struct GroupRecord {
    description: String,
    moderated: bool,
    deny_local_posting: bool,
    deny_peer_posting: bool,
    created_at: DateTime<Utc>,
    creator: String,
    owner: Option<String>,
    next_number: u64,
    placements: BTreeMap<u64, PlacementRecord>,
}

impl GroupRecord {
    fn new(description: String, creator: String, owner: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            description,
            moderated: false,
            deny_local_posting: false,
            deny_peer_posting: false,
            created_at,
            creator,
            owner,
            next_number: 1,
            placements: BTreeMap::new(),
        }
    }

    fn catalog(&self, addressed_name: &str, filter: ArticleFilter) -> Catalog {
        let mut low = 0u64;
        let mut high = 0u64;
        let mut count = 0u64;
        for (&number, placement) in &self.placements {
            if placement.matches(filter) {
                if count == 0 {
                    low = number;
                }
                high = number;
                count += 1;
            }
        }
        if count == 0 {
            low = self.next_number;
            high = self.next_number - 1;
        }

        Catalog {
            name: addressed_name.to_string(),
            description: self.description.clone(),
            moderated: self.moderated,
            deny_local_posting: self.deny_local_posting,
            deny_peer_posting: self.deny_peer_posting,
            created_at: self.created_at,
            creator: self.creator.clone(),
            owner: self.owner.clone(),
            filter,
            low,
            high,
            count,
        }
    }
}

#[derive(Default)]
struct Inner {
    groups: BTreeMap<String, GroupRecord>,
    personal: BTreeMap<(String, String), GroupRecord>,
    articles: HashMap<String, Arc<Article>>,
    identities: HashMap<String, Identity>,
    subscriptions: HashMap<String, BTreeSet<String>>,
    peers: Vec<Peer>,
    next_identity_id: u64,
}

/// Thread-safe in-memory article and identity store
pub struct MemoryStore {
    inner: Mutex<Inner>,
    delimiter: char,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default `.` hierarchy delimiter
    pub fn new() -> Self {
        Self::with_delimiter('.')
    }

    /// Create an empty store with a custom hierarchy delimiter
    pub fn with_delimiter(delimiter: char) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_identity_id: 1,
                ..Inner::default()
            }),
            delimiter,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a panic while holding it; the data is
        // still structurally sound for a news spool, so keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a global newsgroup; returns false if the name is taken or invalid
    pub fn create_catalog(&self, name: &str, description: &str, creator: &str) -> bool {
        self.create_catalog_at(name, description, creator, Utc::now())
    }

    /// Create a global newsgroup with an explicit creation instant
    pub fn create_catalog_at(
        &self,
        name: &str,
        description: &str,
        creator: &str,
        created_at: DateTime<Utc>,
    ) -> bool {
        if !validation::validate_newsgroup_name(name) {
            return false;
        }
        let mut inner = self.lock();
        if inner.groups.contains_key(name) {
            return false;
        }
        debug!(group = name, "creating newsgroup");
        inner.groups.insert(
            name.to_string(),
            GroupRecord::new(description.to_string(), creator.to_string(), None, created_at),
        );
        true
    }

    /// Toggle moderation on a group
    pub fn set_moderated(&self, name: &str, moderated: bool) -> Result<(), StoreError> {
        self.update_group(name, |group| group.moderated = moderated)
    }

    /// Toggle refusal of locally posted articles
    pub fn set_deny_local_posting(&self, name: &str, deny: bool) -> Result<(), StoreError> {
        self.update_group(name, |group| group.deny_local_posting = deny)
    }

    /// Toggle refusal of peer-transferred articles
    pub fn set_deny_peer_posting(&self, name: &str, deny: bool) -> Result<(), StoreError> {
        self.update_group(name, |group| group.deny_peer_posting = deny)
    }

    fn update_group(
        &self,
        name: &str,
        apply: impl FnOnce(&mut GroupRecord),
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let group = inner
            .groups
            .get_mut(name)
            .ok_or_else(|| StoreError::NoSuchCatalog(name.to_string()))?;
        apply(group);
        Ok(())
    }

    /// Create an identity with default capabilities
    ///
    /// Returns `None` if the username is already taken.
    pub fn create_identity(&self, username: &str, password: &str) -> Option<Identity> {
        self.create_identity_with(username, password, CapabilitySet::default(), false)
    }

    /// Create an identity with explicit capabilities and locality policy
    pub fn create_identity_with(
        &self,
        username: &str,
        password: &str,
        capabilities: CapabilitySet,
        local_authentication_only: bool,
    ) -> Option<Identity> {
        let key = username.to_lowercase();
        let mut inner = self.lock();
        if inner.identities.contains_key(&key) {
            return None;
        }

        let salt = auth::generate_salt();
        let identity = Identity {
            id: inner.next_identity_id,
            username: username.to_string(),
            password_hash: auth::hash_password(&salt, password),
            salt,
            local_authentication_only,
            capabilities,
            last_login: None,
        };
        inner.next_identity_id += 1;
        inner.identities.insert(key, identity.clone());
        Some(identity)
    }

    /// Mark every placement of a message-id as cancelled
    pub fn cancel_message(&self, message_id: &str) -> bool {
        let mut inner = self.lock();
        let mut found = false;
        for group in inner.groups.values_mut() {
            for placement in group.placements.values_mut() {
                if placement.message_id == message_id {
                    placement.cancelled = true;
                    found = true;
                }
            }
        }
        found
    }

    /// Release a pending message into visibility (moderator approval)
    pub fn approve_message(&self, message_id: &str) -> bool {
        let mut inner = self.lock();
        let mut found = false;
        for group in inner.groups.values_mut() {
            for placement in group.placements.values_mut() {
                if placement.message_id == message_id && placement.pending {
                    placement.pending = false;
                    found = true;
                }
            }
        }
        found
    }

    /// Record a peer for the outbound feeder
    pub fn add_peer(&self, peer: Peer) {
        self.lock().peers.push(peer);
    }

    /// Snapshot of the recorded peers
    pub fn peers(&self) -> Vec<Peer> {
        self.lock().peers.clone()
    }

    /// Resolve an addressed name into `(base, filter)`, honoring literal
    /// group names before meta suffixes
    fn resolve<'a>(inner: &Inner, name: &'a str) -> (&'a str, ArticleFilter) {
        if inner.groups.contains_key(name) {
            return (name, ArticleFilter::Visible);
        }
        if let Some(base) = name.strip_suffix(".deleted") {
            return (base, ArticleFilter::Cancelled);
        }
        if let Some(base) = name.strip_suffix(".pending") {
            return (base, ArticleFilter::Pending);
        }
        (name, ArticleFilter::Visible)
    }

    fn find_group<'a>(
        inner: &'a Inner,
        identity: Option<&Identity>,
        name: &str,
    ) -> Option<(&'a GroupRecord, String, ArticleFilter)> {
        let (base, filter) = Self::resolve(inner, name);

        if let Some(identity) = identity {
            let key = (identity.username.to_lowercase(), base.to_string());
            if let Some(record) = inner.personal.get(&key) {
                return Some((record, name.to_string(), filter));
            }
        }

        inner
            .groups
            .get(base)
            .map(|record| (record, name.to_string(), filter))
    }

    fn hierarchy_matches(&self, name: &str, parent: Option<&str>) -> bool {
        match parent {
            None => !name.contains(self.delimiter),
            Some(parent) => {
                name.len() > parent.len() + 1
                    && name.starts_with(parent)
                    && name[parent.len()..].starts_with(self.delimiter)
            }
        }
    }
}

impl Store for MemoryStore {
    fn ensure(&self, identity: &Identity) -> Result<(), StoreError> {
        let key = (identity.username.to_lowercase(), INBOX.to_string());
        let mut inner = self.lock();
        if !inner.identities.contains_key(&key.0) {
            return Err(StoreError::InvalidIdentity(identity.username.clone()));
        }
        if !inner.personal.contains_key(&key) {
            inner.personal.insert(
                key,
                GroupRecord::new(
                    "Personal inbox".to_string(),
                    identity.username.clone(),
                    Some(identity.username.clone()),
                    Utc::now(),
                ),
            );
        }
        Ok(())
    }

    fn get_catalog(
        &self,
        identity: Option<&Identity>,
        name: &str,
    ) -> Result<Option<Catalog>, StoreError> {
        let inner = self.lock();
        Ok(Self::find_group(&inner, identity, name)
            .map(|(record, addressed, filter)| record.catalog(&addressed, filter)))
    }

    fn all_catalogs(&self, identity: Option<&Identity>) -> Result<Vec<Catalog>, StoreError> {
        let inner = self.lock();
        let mut catalogs: Vec<Catalog> = inner
            .groups
            .iter()
            .map(|(name, record)| record.catalog(name, ArticleFilter::Visible))
            .collect();

        if let Some(identity) = identity {
            let owner = identity.username.to_lowercase();
            catalogs.extend(
                inner
                    .personal
                    .iter()
                    .filter(|((key, _), _)| *key == owner)
                    .map(|((_, name), record)| record.catalog(name, ArticleFilter::Visible)),
            );
        }

        catalogs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(catalogs)
    }

    fn list_global_catalogs(
        &self,
        _identity: Option<&Identity>,
        parent: Option<&str>,
    ) -> Result<Vec<Catalog>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .groups
            .iter()
            .filter(|(name, _)| self.hierarchy_matches(name, parent))
            .map(|(name, record)| record.catalog(name, ArticleFilter::Visible))
            .collect())
    }

    fn list_personal_catalogs(
        &self,
        identity: &Identity,
        parent: Option<&str>,
    ) -> Result<Vec<Catalog>, StoreError> {
        let key = identity.username.to_lowercase();
        let inner = self.lock();
        if !inner.identities.contains_key(&key) {
            return Err(StoreError::InvalidIdentity(identity.username.clone()));
        }
        Ok(inner
            .personal
            .iter()
            .filter(|((owner, name), _)| {
                *owner == key && self.hierarchy_matches(name, parent)
            })
            .map(|((_, name), record)| record.catalog(name, ArticleFilter::Visible))
            .collect())
    }

    fn create_personal_catalog(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<bool, StoreError> {
        if name.is_empty() || name.eq_ignore_ascii_case(INBOX) {
            return Ok(false);
        }
        let key = (identity.username.to_lowercase(), name.to_string());
        let mut inner = self.lock();
        if inner.personal.contains_key(&key) || inner.groups.contains_key(name) {
            return Ok(false);
        }
        inner.personal.insert(
            key,
            GroupRecord::new(
                String::new(),
                identity.username.clone(),
                Some(identity.username.clone()),
                Utc::now(),
            ),
        );
        Ok(true)
    }

    fn authenticate_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let key = username.to_lowercase();
        let mut inner = self.lock();
        let Some(identity) = inner.identities.get_mut(&key) else {
            // Hash anyway so a missing user costs the same as a wrong password
            let _ = auth::hash_password("", password);
            return Ok(None);
        };

        if auth::verify_password(&identity.password_hash, &identity.salt, password) {
            identity.last_login = Some(Utc::now());
            Ok(Some(identity.clone()))
        } else {
            Ok(None)
        }
    }

    fn get_messages(
        &self,
        identity: Option<&Identity>,
        catalog: &str,
        from: u64,
        to: Option<u64>,
    ) -> Result<Vec<Placement>, StoreError> {
        let inner = self.lock();
        let Some((record, _, filter)) = Self::find_group(&inner, identity, catalog) else {
            return Err(StoreError::NoSuchCatalog(catalog.to_string()));
        };

        let to = to.unwrap_or(u64::MAX);
        if to < from {
            return Ok(Vec::new());
        }
        Ok(record
            .placements
            .range(from..=to)
            .filter(|(_, p)| p.matches(filter))
            .filter_map(|(&number, p)| {
                inner.articles.get(&p.message_id).map(|article| Placement {
                    number,
                    cancelled: p.cancelled,
                    pending: p.pending,
                    article: Arc::clone(article),
                })
            })
            .collect())
    }

    fn get_message_by_id(
        &self,
        _identity: Option<&Identity>,
        message_id: &str,
    ) -> Result<Option<Located>, StoreError> {
        let inner = self.lock();
        let Some(article) = inner.articles.get(message_id) else {
            return Ok(None);
        };

        for (name, group) in &inner.groups {
            for (&number, placement) in &group.placements {
                if placement.message_id == message_id {
                    return Ok(Some(Located {
                        group: name.clone(),
                        placement: Placement {
                            number,
                            cancelled: placement.cancelled,
                            pending: placement.pending,
                            article: Arc::clone(article),
                        },
                    }));
                }
            }
        }
        Ok(None)
    }

    fn contains_message(&self, message_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock().articles.contains_key(message_id))
    }

    fn post(
        &self,
        identity: Option<&Identity>,
        article: Article,
        source: PostSource,
    ) -> Result<PostOutcome, StoreError> {
        let mut inner = self.lock();

        if inner.articles.contains_key(&article.message_id) {
            return Ok(PostOutcome::Rejected(PostRejection::Duplicate(
                article.message_id.clone(),
            )));
        }

        let approved = article.headers.contains("Approved");
        let may_approve = source == PostSource::Peer
            || identity.is_some_and(|i| i.capabilities.approve_any);

        // Validate every target group before touching any of them
        let mut held = false;
        for name in &article.newsgroups {
            let Some(group) = inner.groups.get(name.as_str()) else {
                return Ok(PostOutcome::Rejected(PostRejection::NoSuchGroup(
                    name.clone(),
                )));
            };
            match source {
                PostSource::Local if group.deny_local_posting => {
                    return Ok(PostOutcome::Rejected(PostRejection::PostingDenied(
                        name.clone(),
                    )));
                }
                PostSource::Peer if group.deny_peer_posting => {
                    return Ok(PostOutcome::Rejected(PostRejection::PostingDenied(
                        name.clone(),
                    )));
                }
                _ => {}
            }
            if group.moderated {
                if approved && !may_approve {
                    return Ok(PostOutcome::Rejected(PostRejection::ModerationRequired));
                }
                if !approved {
                    held = true;
                }
            }
        }

        let message_id = article.message_id.clone();
        let newsgroups = article.newsgroups.clone();
        inner
            .articles
            .insert(message_id.clone(), Arc::new(article));

        let mut placements = Vec::with_capacity(newsgroups.len());
        for name in &newsgroups {
            let group = inner
                .groups
                .get_mut(name.as_str())
                .expect("validated above under the same lock");
            let number = group.next_number;
            group.next_number += 1;
            group.placements.insert(
                number,
                PlacementRecord {
                    message_id: message_id.clone(),
                    cancelled: false,
                    pending: group.moderated && !approved,
                },
            );
            placements.push((name.clone(), number));
        }

        debug!(message_id = %message_id, groups = placements.len(), held, "stored article");
        Ok(PostOutcome::Stored(PostReceipt {
            message_id,
            placements,
            held,
        }))
    }

    fn subscribe(&self, identity: &Identity, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.groups.contains_key(name) {
            return Err(StoreError::NoSuchCatalog(name.to_string()));
        }
        inner
            .subscriptions
            .entry(identity.username.to_lowercase())
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    fn unsubscribe(&self, identity: &Identity, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(set) = inner.subscriptions.get_mut(&identity.username.to_lowercase()) {
            set.remove(name);
        }
        Ok(())
    }

    fn get_subscriptions(&self, identity: &Identity) -> Result<Vec<String>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .subscriptions
            .get(&identity.username.to_lowercase())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn catalogs_created_since(&self, since: DateTime<Utc>) -> Result<Vec<Catalog>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .groups
            .iter()
            .filter(|(_, record)| record.created_at > since)
            .map(|(name, record)| record.catalog(name, ArticleFilter::Visible))
            .collect())
    }

    fn message_ids_since(
        &self,
        pattern: &Wildmat,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.lock();
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for (name, group) in &inner.groups {
            if !pattern.matches(name) {
                continue;
            }
            for placement in group.placements.values() {
                if !placement.matches(ArticleFilter::Visible) {
                    continue;
                }
                let Some(article) = inner.articles.get(&placement.message_id) else {
                    continue;
                };
                if article.date > since && seen.insert(placement.message_id.clone()) {
                    ids.push(placement.message_id.clone());
                }
            }
        }
        Ok(ids)
    }
}
