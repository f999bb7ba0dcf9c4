/*
 * Created on Thu Feb 15 2024
 *
 * This file is a part of Skytrie
 * Skytrie is a free and open-source concurrent radix trie library written by
 * Sayan Nandan ("the Author") with the vision to provide fast shared prefix
 * indexing without compromising on correctness or memory efficiency.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

/*
    per-node lock protocol
    ---
    Every tree node carries a [`NodeLock`]. Traversals enter a node in one of
    three modes:
    - shared: plain readers (find, iterator resume, serializer walk)
    - upgradable: writers descending; presented to callers as a read hold that
      can later be promoted to exclusive on the one node they must mutate
    - exclusive: the mutation window

    Promotion is a two-step protocol: `try_upgrade` is the fast path and may
    report a lost race ([`UpgradeOutcome::Lost`]) while shared readers are
    still draining through the node. The caller must then re-run its dispatch
    for the current node before falling back to the blocking `upgrade`. With
    the intent-shared realization below the upgradable hold itself keeps every
    other writer out, so the re-evaluated decision is stable and the blocking
    fallback cannot observe a mutated node. With the degraded realization
    (`exclusive-upgradable` build) the upgradable mode is an exclusive lock
    from the start and the fast path never loses.

    The raw (guardless) API is deliberate: descent couples locks hand-over-hand
    across loop iterations and across parent/child node records, which is a
    lifetime pattern that lock guards cannot express.
*/

#[cfg(not(feature = "exclusive-upgradable"))]
use parking_lot::lock_api::RawRwLockUpgrade as _;
use parking_lot::{lock_api::RawRwLock as _, RawRwLock};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// Result of a fast-path lock promotion
pub enum UpgradeOutcome {
    /// the hold is now exclusive
    Upgraded,
    /// the race was lost; the caller still holds a shared view of the node and
    /// must re-evaluate whatever decision led it to promote
    Lost,
}

impl UpgradeOutcome {
    #[inline(always)]
    pub const fn lost(self) -> bool {
        matches!(self, Self::Lost)
    }
}

/// An upgradeable reader-writer lock, one per tree node
pub struct NodeLock {
    raw: RawRwLock,
}

impl NodeLock {
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            raw: <RawRwLock as parking_lot::lock_api::RawRwLock>::INIT,
        }
    }
    #[inline(always)]
    /// Acquire a shared hold (blocking)
    pub fn read(&self) {
        self.raw.lock_shared()
    }
    #[inline(always)]
    /// Acquire an exclusive hold (blocking)
    pub fn write(&self) {
        self.raw.lock_exclusive()
    }
    /// Release a hold acquired with [`Self::read`]
    ///
    /// ## Safety
    /// The caller must hold a shared lock
    #[inline(always)]
    pub unsafe fn unlock_read(&self) {
        self.raw.unlock_shared()
    }
    /// Release a hold acquired with [`Self::write`] (or promoted into one)
    ///
    /// ## Safety
    /// The caller must hold the exclusive lock
    #[inline(always)]
    pub unsafe fn unlock_write(&self) {
        self.raw.unlock_exclusive()
    }
}

#[cfg(not(feature = "exclusive-upgradable"))]
impl NodeLock {
    #[inline(always)]
    /// Acquire an upgradable read hold (blocking). Coexists with shared
    /// readers; mutually exclusive with other upgradable and exclusive holds
    pub fn read_upgradable(&self) {
        self.raw.lock_upgradable()
    }
    /// Release a hold acquired with [`Self::read_upgradable`]
    ///
    /// ## Safety
    /// The caller must hold the upgradable lock (and must not have promoted it)
    #[inline(always)]
    pub unsafe fn unlock_upgradable(&self) {
        self.raw.unlock_upgradable()
    }
    /// Attempt to promote an upgradable hold to exclusive without blocking
    ///
    /// ## Safety
    /// The caller must hold the upgradable lock
    #[inline(always)]
    pub unsafe fn try_upgrade(&self) -> UpgradeOutcome {
        if self.raw.try_upgrade() {
            UpgradeOutcome::Upgraded
        } else {
            UpgradeOutcome::Lost
        }
    }
    /// Promote an upgradable hold to exclusive, waiting for shared readers to
    /// drain
    ///
    /// ## Safety
    /// The caller must hold the upgradable lock
    #[inline(always)]
    pub unsafe fn upgrade(&self) {
        self.raw.upgrade()
    }
}

#[cfg(feature = "exclusive-upgradable")]
impl NodeLock {
    #[inline(always)]
    /// Degraded realization: the upgradable mode is an exclusive lock from the
    /// start
    pub fn read_upgradable(&self) {
        self.raw.lock_exclusive()
    }
    /// ## Safety
    /// The caller must hold the (exclusive) upgradable lock
    #[inline(always)]
    pub unsafe fn unlock_upgradable(&self) {
        self.raw.unlock_exclusive()
    }
    /// Degraded realization: the hold is already exclusive, so promotion
    /// always succeeds
    ///
    /// ## Safety
    /// The caller must hold the (exclusive) upgradable lock
    #[inline(always)]
    pub unsafe fn try_upgrade(&self) -> UpgradeOutcome {
        UpgradeOutcome::Upgraded
    }
    /// ## Safety
    /// The caller must hold the (exclusive) upgradable lock
    #[inline(always)]
    pub unsafe fn upgrade(&self) {}
}

impl NodeLock {
    /// Promote an upgradable hold to exclusive. A lost fast path means shared
    /// readers are still draining through this node; the upgradable hold kept
    /// every other writer out, so the caller's dispatch stands and waiting the
    /// stragglers out is correct
    ///
    /// ## Safety
    /// The caller must hold the upgradable lock
    #[inline(always)]
    pub unsafe fn promote(&self) {
        if self.try_upgrade().lost() {
            self.upgrade()
        }
    }
}

impl Default for NodeLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{NodeLock, UpgradeOutcome},
        std::{
            sync::{
                atomic::{AtomicBool, Ordering},
                Arc,
            },
            thread,
        },
    };

    #[test]
    fn read_read() {
        let lck = NodeLock::new();
        lck.read();
        lck.read();
        unsafe {
            // UNSAFE(@ohsayan): both holds acquired above
            lck.unlock_read();
            lck.unlock_read();
        }
    }

    #[test]
    fn upgradable_allows_readers() {
        let lck = NodeLock::new();
        lck.read_upgradable();
        #[cfg(not(feature = "exclusive-upgradable"))]
        {
            lck.read();
            unsafe {
                // UNSAFE(@ohsayan): shared hold acquired above
                lck.unlock_read();
            }
        }
        unsafe {
            // UNSAFE(@ohsayan): upgradable hold acquired above
            lck.unlock_upgradable();
        }
    }

    #[cfg(not(feature = "exclusive-upgradable"))]
    #[test]
    fn upgrade_loses_to_draining_reader() {
        let lck = NodeLock::new();
        lck.read();
        lck.read_upgradable();
        unsafe {
            // UNSAFE(@ohsayan): upgradable hold acquired above
            assert_eq!(lck.try_upgrade(), UpgradeOutcome::Lost);
            // still upgradable; the reader leaves and the promotion goes through
            lck.unlock_read();
            assert_eq!(lck.try_upgrade(), UpgradeOutcome::Upgraded);
            lck.unlock_write();
        }
    }

    #[cfg(feature = "exclusive-upgradable")]
    #[test]
    fn degraded_upgrade_always_wins() {
        let lck = NodeLock::new();
        lck.read_upgradable();
        unsafe {
            // UNSAFE(@ohsayan): upgradable hold acquired above
            assert_eq!(lck.try_upgrade(), UpgradeOutcome::Upgraded);
            lck.unlock_write();
        }
    }

    #[test]
    fn promote_waits_out_readers() {
        let lck = Arc::new(NodeLock::new());
        let promoted = Arc::new(AtomicBool::new(false));
        lck.read();
        let t = {
            let (lck, promoted) = (lck.clone(), promoted.clone());
            thread::spawn(move || {
                lck.read_upgradable();
                unsafe {
                    // UNSAFE(@ohsayan): upgradable hold acquired above
                    lck.promote();
                    promoted.store(true, Ordering::Release);
                    lck.unlock_write();
                }
            })
        };
        #[cfg(not(feature = "exclusive-upgradable"))]
        {
            thread::sleep(std::time::Duration::from_millis(50));
            assert!(!promoted.load(Ordering::Acquire));
        }
        unsafe {
            // UNSAFE(@ohsayan): shared hold acquired above
            lck.unlock_read();
        }
        t.join().unwrap();
        assert!(promoted.load(Ordering::Acquire));
    }
}
