//! Ban/mute/hide moderation state with optional expiry.
//!
//! Expiry entries are cleared by the periodic sweep; a just-expired entry
//! may stay enforced for up to one sweep interval. That staleness bound is
//! accepted behavior, not a bug.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::ChannelError;

/// Names removed by one expiry sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub unbanned: Vec<String>,
    pub unmuted: Vec<String>,
}

impl SweepOutcome {
    pub fn is_empty(&self) -> bool {
        self.unbanned.is_empty() && self.unmuted.is_empty()
    }
}

/// Per-channel moderation sets. Member names are stored lowercased;
/// presence in an expiry map implies presence in the matching set.
#[derive(Debug, Default, Clone)]
pub struct Moderation {
    banned: HashSet<String>,
    muted: HashSet<String>,
    hided: HashSet<String>,
    ban_expires: HashMap<String, DateTime<Utc>>,
    mute_expires: HashMap<String, DateTime<Utc>>,
}

impl Moderation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_banned(&self, member: &str) -> bool {
        self.banned.contains(&member.to_lowercase())
    }

    pub fn is_muted(&self, member: &str) -> bool {
        self.muted.contains(&member.to_lowercase())
    }

    pub fn is_hided(&self, member: &str) -> bool {
        self.hided.contains(&member.to_lowercase())
    }

    pub fn banned(&self) -> impl Iterator<Item = &str> {
        self.banned.iter().map(String::as_str)
    }

    pub fn muted(&self) -> impl Iterator<Item = &str> {
        self.muted.iter().map(String::as_str)
    }

    pub fn hided(&self) -> impl Iterator<Item = &str> {
        self.hided.iter().map(String::as_str)
    }

    pub fn ban(
        &mut self,
        member: &str,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), ChannelError> {
        let key = member.to_lowercase();
        if !self.banned.insert(key.clone()) {
            return Err(ChannelError::AlreadyBanned(member.to_string()));
        }
        if let Some(at) = expiry {
            self.ban_expires.insert(key, at);
        }
        Ok(())
    }

    pub fn pardon(&mut self, member: &str) -> Result<(), ChannelError> {
        let key = member.to_lowercase();
        if !self.banned.remove(&key) {
            return Err(ChannelError::NotBanned(member.to_string()));
        }
        self.ban_expires.remove(&key);
        Ok(())
    }

    pub fn mute(
        &mut self,
        member: &str,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), ChannelError> {
        let key = member.to_lowercase();
        if !self.muted.insert(key.clone()) {
            return Err(ChannelError::AlreadyMuted(member.to_string()));
        }
        if let Some(at) = expiry {
            self.mute_expires.insert(key, at);
        }
        Ok(())
    }

    pub fn unmute(&mut self, member: &str) -> Result<(), ChannelError> {
        let key = member.to_lowercase();
        if !self.muted.remove(&key) {
            return Err(ChannelError::NotMuted(member.to_string()));
        }
        self.mute_expires.remove(&key);
        Ok(())
    }

    /// Returns true if the member was newly hidden.
    pub fn hide(&mut self, member: &str) -> bool {
        self.hided.insert(member.to_lowercase())
    }

    pub fn unhide(&mut self, member: &str) -> bool {
        self.hided.remove(&member.to_lowercase())
    }

    /// Remove every expiry entry with expiry at or before `now`, together
    /// with its moderation-set entry.
    pub fn check_expires(&mut self, now: DateTime<Utc>) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        let expired_bans: Vec<String> = self
            .ban_expires
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(name, _)| name.clone())
            .collect();
        for name in expired_bans {
            self.ban_expires.remove(&name);
            self.banned.remove(&name);
            outcome.unbanned.push(name);
        }

        let expired_mutes: Vec<String> = self
            .mute_expires
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(name, _)| name.clone())
            .collect();
        for name in expired_mutes {
            self.mute_expires.remove(&name);
            self.muted.remove(&name);
            outcome.unmuted.push(name);
        }

        outcome
    }

    pub(crate) fn snapshot_parts(
        &self,
    ) -> (
        Vec<String>,
        Vec<String>,
        Vec<String>,
        Vec<(String, i64)>,
        Vec<(String, i64)>,
    ) {
        let mut banned: Vec<String> = self.banned.iter().cloned().collect();
        banned.sort();
        let mut muted: Vec<String> = self.muted.iter().cloned().collect();
        muted.sort();
        let mut hided: Vec<String> = self.hided.iter().cloned().collect();
        hided.sort();
        let mut ban_expires: Vec<(String, i64)> = self
            .ban_expires
            .iter()
            .map(|(name, at)| (name.clone(), at.timestamp()))
            .collect();
        ban_expires.sort();
        let mut mute_expires: Vec<(String, i64)> = self
            .mute_expires
            .iter()
            .map(|(name, at)| (name.clone(), at.timestamp()))
            .collect();
        mute_expires.sort();
        (banned, muted, hided, ban_expires, mute_expires)
    }

    pub(crate) fn from_snapshot_parts(
        banned: Vec<String>,
        muted: Vec<String>,
        hided: Vec<String>,
        ban_expires: Vec<(String, i64)>,
        mute_expires: Vec<(String, i64)>,
    ) -> Self {
        let banned: HashSet<String> = banned.into_iter().map(|n| n.to_lowercase()).collect();
        let muted: HashSet<String> = muted.into_iter().map(|n| n.to_lowercase()).collect();
        let hided = hided.into_iter().map(|n| n.to_lowercase()).collect();

        // Expiry entries without a matching set entry are dropped to keep
        // the subset invariant.
        let ban_expires = ban_expires
            .into_iter()
            .map(|(n, ts)| (n.to_lowercase(), ts))
            .filter(|(n, _)| banned.contains(n))
            .filter_map(|(n, ts)| DateTime::from_timestamp(ts, 0).map(|at| (n, at)))
            .collect();
        let mute_expires = mute_expires
            .into_iter()
            .map(|(n, ts)| (n.to_lowercase(), ts))
            .filter(|(n, _)| muted.contains(n))
            .filter_map(|(n, ts)| DateTime::from_timestamp(ts, 0).map(|at| (n, at)))
            .collect();

        Self {
            banned,
            muted,
            hided,
            ban_expires,
            mute_expires,
        }
    }
}
