//! Actions waiting for retrieval, grouped by content hash.
//!
//! Two pairs of counters are kept. The *actual* counters count each distinct
//! hash once; that is what goes over the wire and decides when the batch is
//! full. The *effective* counters count every queued action, duplicates
//! included, and drive progress reporting. Both shrink as groups are
//! satisfied.

use std::collections::BTreeMap;

use crate::action::Action;
use crate::checksum::ContentHash;
use crate::error::FetchError;

/// Non-empty list of actions sharing one content hash.
#[derive(Debug)]
pub struct ActionGroup {
    first: Action,
    rest: Vec<Action>,
}

impl ActionGroup {
    fn new(first: Action) -> Self {
        Self {
            first,
            rest: Vec::new(),
        }
    }

    fn push(&mut self, action: Action) {
        self.rest.push(action);
    }

    /// The action whose metadata drives verification and sizing.
    pub fn first(&self) -> &Action {
        &self.first
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn into_actions(self) -> Vec<Action> {
        let mut all = Vec::with_capacity(self.len());
        all.push(self.first);
        all.extend(self.rest);
        all
    }
}

#[derive(Debug)]
pub struct PendingBatch {
    groups: BTreeMap<ContentHash, ActionGroup>,
    capacity_bytes: u64,
    actual_bytes: u64,
    actual_files: u64,
    effective_bytes: u64,
    effective_files: u64,
}

impl PendingBatch {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            groups: BTreeMap::new(),
            capacity_bytes,
            actual_bytes: 0,
            actual_files: 0,
            effective_bytes: 0,
            effective_files: 0,
        }
    }

    /// Full once the distinct transfer size reaches capacity. A capacity of
    /// zero never fills.
    pub fn is_full(&self) -> bool {
        self.capacity_bytes > 0 && self.actual_bytes >= self.capacity_bytes
    }

    /// Queue `action` under its content hash.
    pub fn enqueue(&mut self, action: Action) -> Result<(), FetchError> {
        let Some(hash) = action.payload_hash() else {
            return Err(FetchError::InvalidActionKind { kind: action.kind });
        };
        if self.is_full() {
            return Err(FetchError::BatchFull {
                queued_bytes: self.actual_bytes,
                capacity_bytes: self.capacity_bytes,
            });
        }
        let unit = action.transfer_size();
        self.effective_bytes = self.effective_bytes.saturating_add(unit);
        self.effective_files += 1;
        match self.groups.get_mut(&hash) {
            Some(group) => group.push(action),
            None => {
                self.actual_bytes = self.actual_bytes.saturating_add(unit);
                self.actual_files += 1;
                self.groups.insert(hash, ActionGroup::new(action));
            }
        }
        Ok(())
    }

    pub fn get(&self, hash: &ContentHash) -> Option<&ActionGroup> {
        self.groups.get(hash)
    }

    /// Take the whole group for `hash`. The first action's size is the unit
    /// for both counter pairs.
    pub fn remove(&mut self, hash: &ContentHash) -> Option<ActionGroup> {
        let group = self.groups.remove(hash)?;
        let count = group.len() as u64;
        let unit = group.first().transfer_size();
        self.actual_files = self.actual_files.saturating_sub(1);
        self.actual_bytes = self.actual_bytes.saturating_sub(unit);
        self.effective_files = self.effective_files.saturating_sub(count);
        self.effective_bytes = self
            .effective_bytes
            .saturating_sub(unit.saturating_mul(count));
        Some(group)
    }

    /// Distinct hashes still outstanding.
    pub fn hashes(&self) -> impl Iterator<Item = ContentHash> + '_ {
        self.groups.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn actual_bytes(&self) -> u64 {
        self.actual_bytes
    }

    pub fn actual_files(&self) -> u64 {
        self.actual_files
    }

    pub fn effective_bytes(&self) -> u64 {
        self.effective_bytes
    }

    pub fn effective_files(&self) -> u64 {
        self.effective_files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::checksum::HashAlgorithm;

    fn sized(data: &[u8], size: u64) -> Action {
        Action::file(HashAlgorithm::Sha1.digest(data)).with_sizes(size * 3, Some(size))
    }

    #[test]
    fn duplicates_share_a_group_and_count_once_on_the_wire() {
        let mut p = PendingBatch::new(1024);
        p.enqueue(sized(b"x", 100)).unwrap();
        p.enqueue(sized(b"x", 100)).unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.actual_files(), 1);
        assert_eq!(p.actual_bytes(), 100);
        assert_eq!(p.effective_files(), 2);
        assert_eq!(p.effective_bytes(), 200);

        let h = HashAlgorithm::Sha1.digest(b"x");
        let group = p.remove(&h).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(p.actual_files(), 0);
        assert_eq!(p.actual_bytes(), 0);
        assert_eq!(p.effective_files(), 0);
        assert_eq!(p.effective_bytes(), 0);
        assert!(p.is_empty());
    }

    #[test]
    fn zero_capacity_is_unbounded() {
        let mut p = PendingBatch::new(0);
        for data in [b"a", b"b", b"c"] {
            p.enqueue(sized(data, 1 << 30)).unwrap();
        }
        assert!(!p.is_full());
        assert_eq!(p.actual_files(), 3);
    }

    #[test]
    fn removal_frees_capacity() {
        let mut p = PendingBatch::new(1024);
        p.enqueue(sized(b"a", 600)).unwrap();
        p.enqueue(sized(b"b", 600)).unwrap();
        assert!(p.is_full());
        p.remove(&HashAlgorithm::Sha1.digest(b"a")).unwrap();
        assert!(!p.is_full());
        assert_eq!(p.actual_bytes(), 600);
    }

    #[test]
    fn full_at_capacity_and_rejects_more() {
        let mut p = PendingBatch::new(1024);
        p.enqueue(sized(b"a", 600)).unwrap();
        assert!(!p.is_full());
        p.enqueue(sized(b"b", 600)).unwrap();
        assert!(p.is_full());
        match p.enqueue(sized(b"c", 1)) {
            Err(FetchError::BatchFull {
                queued_bytes,
                capacity_bytes,
            }) => {
                assert_eq!(queued_bytes, 1200);
                assert_eq!(capacity_bytes, 1024);
            }
            other => panic!("expected BatchFull, got {other:?}"),
        }
    }

    #[test]
    fn non_payload_actions_are_rejected() {
        let mut p = PendingBatch::new(1024);
        let mut a = sized(b"a", 1);
        a.kind = ActionKind::Link;
        assert!(matches!(
            p.enqueue(a),
            Err(FetchError::InvalidActionKind {
                kind: ActionKind::Link
            })
        ));
        let mut no_hash = sized(b"a", 1);
        no_hash.hash = None;
        assert!(p.enqueue(no_hash).is_err());
        assert!(p.is_empty());
    }

    #[test]
    fn size_falls_back_to_uncompressed_then_zero() {
        let mut p = PendingBatch::new(1024);
        p.enqueue(Action::file(HashAlgorithm::Sha1.digest(b"u")).with_sizes(50, None))
            .unwrap();
        p.enqueue(Action::file(HashAlgorithm::Sha1.digest(b"z"))).unwrap();
        assert_eq!(p.actual_bytes(), 50);
        assert_eq!(p.actual_files(), 2);
    }
}
