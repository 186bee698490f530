//! Shared security primitives
//!
//! The execution lock, the pause flag, and the access gate the coordinator
//! consults before any administrative mutation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;
use types::ids::HolderId;

use crate::errors::LedgerError;

/// Execution lock held for the lifetime of one transfer-class operation.
///
/// Taken when the operation enters `Validating` and released once it reaches
/// `Done` or `Rejected`, after any external transfer has returned. While held,
/// nested deposits and withdrawals fail with `ReentrantCall` whoever the
/// caller is, and the lock stays with the operation that took it.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLock {
    held_by: Option<&'static str>,
}

impl ExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `operation`.
    pub fn acquire(&mut self, operation: &'static str) -> Result<(), LedgerError> {
        if let Some(held_by) = self.held_by {
            warn!(operation, held_by, "Reentrant call rejected");
            return Err(LedgerError::ReentrantCall);
        }
        self.held_by = Some(operation);
        Ok(())
    }

    pub fn release(&mut self) {
        self.held_by = None;
    }

    pub fn is_locked(&self) -> bool {
        self.held_by.is_some()
    }

    /// Operation in flight, if any.
    pub fn held_by(&self) -> Option<&'static str> {
        self.held_by
    }
}

/// Pause flag gating every deposit and withdrawal entry point.
#[derive(Debug, Clone, Default)]
pub struct PauseGuard {
    paused: bool,
}

impl PauseGuard {
    pub fn new() -> Self {
        Self { paused: false }
    }

    /// Restore a persisted flag.
    pub fn with_state(paused: bool) -> Self {
        Self { paused }
    }

    /// Pause operations. Returns `false` if already paused.
    pub fn pause(&mut self) -> bool {
        !std::mem::replace(&mut self.paused, true)
    }

    /// Unpause operations. Returns `false` if not paused.
    pub fn unpause(&mut self) -> bool {
        std::mem::replace(&mut self.paused, false)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Administrative roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// May grant and revoke roles
    Admin,
    /// May pause and unpause the ledger
    Pauser,
    /// May replace the price source while paused
    OracleManager,
}

/// Capability-check interface consumed by the coordinator.
///
/// The ledger never inspects how roles are stored; it only asks these
/// questions and issues these mutations after its own checks pass.
pub trait AccessGate: fmt::Debug + Send {
    /// Current owner.
    fn owner(&self) -> HolderId;

    /// Whether `account` holds `role`.
    fn has_role(&self, account: &HolderId, role: Role) -> bool;

    /// Whether `account` is the owner.
    fn is_owner(&self, account: &HolderId) -> bool {
        self.owner() == *account
    }

    /// Owner or role member.
    fn is_authorized(&self, account: &HolderId, role: Role) -> bool {
        self.is_owner(account) || self.has_role(account, role)
    }

    /// Assign a role. Returns `false` if it was already held.
    fn grant(&mut self, account: HolderId, role: Role) -> bool;

    /// Remove a role. Returns `false` if it was not held.
    fn revoke(&mut self, account: &HolderId, role: Role) -> bool;

    /// Replace the owner.
    fn set_owner(&mut self, new_owner: HolderId);

    /// Every (account, role) pair, for persistence.
    fn assignments(&self) -> Vec<(HolderId, Role)>;
}

/// In-memory role table, the default `AccessGate`.
#[derive(Debug, Clone)]
pub struct AccessControl {
    owner: HolderId,
    roles: BTreeMap<HolderId, BTreeSet<Role>>,
}

impl AccessControl {
    /// Create access control with an initial owner holding every role.
    pub fn new(owner: HolderId) -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(
            owner,
            BTreeSet::from([Role::Admin, Role::Pauser, Role::OracleManager]),
        );
        Self { owner, roles }
    }

    /// Rebuild from persisted assignments.
    pub fn from_assignments(owner: HolderId, assignments: &[(HolderId, Role)]) -> Self {
        let mut roles: BTreeMap<HolderId, BTreeSet<Role>> = BTreeMap::new();
        for (account, role) in assignments {
            roles.entry(*account).or_default().insert(*role);
        }
        Self { owner, roles }
    }
}

impl AccessGate for AccessControl {
    fn owner(&self) -> HolderId {
        self.owner
    }

    fn has_role(&self, account: &HolderId, role: Role) -> bool {
        self.roles
            .get(account)
            .map_or(false, |held| held.contains(&role))
    }

    fn grant(&mut self, account: HolderId, role: Role) -> bool {
        self.roles.entry(account).or_default().insert(role)
    }

    fn revoke(&mut self, account: &HolderId, role: Role) -> bool {
        let Some(held) = self.roles.get_mut(account) else {
            return false;
        };
        let removed = held.remove(&role);
        if held.is_empty() {
            self.roles.remove(account);
        }
        removed
    }

    fn set_owner(&mut self, new_owner: HolderId) {
        self.owner = new_owner;
    }

    fn assignments(&self) -> Vec<(HolderId, Role)> {
        self.roles
            .iter()
            .flat_map(|(account, held)| held.iter().map(move |role| (*account, *role)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- ExecutionLock tests ---

    #[test]
    fn test_lock_acquire_release() {
        let mut lock = ExecutionLock::new();
        assert!(!lock.is_locked());
        lock.acquire("withdraw_native").unwrap();
        assert!(lock.is_locked());
        assert_eq!(lock.held_by(), Some("withdraw_native"));
        lock.release();
        assert!(!lock.is_locked());
        assert_eq!(lock.held_by(), None);
    }

    #[test]
    fn test_nested_acquire_refused_and_lock_kept() {
        let mut lock = ExecutionLock::new();
        lock.acquire("withdraw_native").unwrap();
        assert_eq!(lock.acquire("withdraw_stable"), Err(LedgerError::ReentrantCall));
        assert_eq!(lock.held_by(), Some("withdraw_native"));
    }

    // --- PauseGuard tests ---

    #[test]
    fn test_pause_guard_transitions() {
        let mut pg = PauseGuard::new();
        assert!(!pg.is_paused());
        assert!(pg.pause());
        assert!(!pg.pause(), "Pausing twice is not a transition");
        assert!(pg.is_paused());
        assert!(pg.unpause());
        assert!(!pg.unpause());
    }

    // --- AccessControl tests ---

    #[test]
    fn test_owner_holds_every_role() {
        let owner = HolderId::new();
        let ac = AccessControl::new(owner);
        assert!(ac.is_owner(&owner));
        assert!(ac.has_role(&owner, Role::Admin));
        assert!(ac.has_role(&owner, Role::Pauser));
        assert!(ac.has_role(&owner, Role::OracleManager));
    }

    #[test]
    fn test_grant_and_revoke() {
        let owner = HolderId::new();
        let bob = HolderId::new();
        let mut ac = AccessControl::new(owner);

        assert!(ac.grant(bob, Role::Pauser));
        assert!(!ac.grant(bob, Role::Pauser));
        assert!(ac.is_authorized(&bob, Role::Pauser));
        assert!(!ac.is_authorized(&bob, Role::OracleManager));

        assert!(ac.revoke(&bob, Role::Pauser));
        assert!(!ac.revoke(&bob, Role::Pauser));
        assert!(!ac.has_role(&bob, Role::Pauser));
    }

    #[test]
    fn test_owner_is_authorized_without_roles() {
        let owner = HolderId::new();
        let mut ac = AccessControl::new(owner);
        ac.revoke(&owner, Role::Pauser);
        assert!(ac.is_authorized(&owner, Role::Pauser));
    }

    #[test]
    fn test_assignments_rebuild() {
        let owner = HolderId::new();
        let carol = HolderId::new();
        let mut ac = AccessControl::new(owner);
        ac.grant(carol, Role::OracleManager);

        let rebuilt = AccessControl::from_assignments(owner, &ac.assignments());
        assert!(rebuilt.has_role(&carol, Role::OracleManager));
        assert!(rebuilt.has_role(&owner, Role::Admin));
        assert_eq!(rebuilt.assignments().len(), 4);
    }
}
