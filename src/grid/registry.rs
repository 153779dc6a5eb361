//! Provider and consumer sets with per-role reentrancy guards.
//!
//! While a pass over a role is running its live set is frozen: `add` and
//! `remove` for that role are buffered and applied when the next pass for the
//! role starts. Direct live mutation during a pass is a contract violation.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::error::{GridError, Result};

use super::storage::StorageHandle;
use super::types::{NodeId, Role};

/// A storage registered under one role.
#[derive(Clone)]
pub struct Participant {
    node: NodeId,
    storage: StorageHandle,
}

impl Participant {
    pub fn new(node: NodeId, storage: StorageHandle) -> Self {
        Self { node, storage }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Participant").field(&self.node).finish()
    }
}

/// What a pass visitor wants done with the participant it just saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    /// Drop the participant from the live set and continue.
    Remove,
    /// End the pass.
    Stop,
}

/// Outcome of an `add` or `remove` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The live set changed.
    Applied,
    /// The live set already matched the request.
    Unchanged,
    /// A pass is active; the request waits for the next pass.
    Deferred,
}

#[derive(Debug, Default)]
struct RoleSet {
    live: Vec<Participant>,
    members: HashSet<NodeId>,
    pending_add: Vec<Participant>,
    pending_remove: Vec<NodeId>,
    pass_active: bool,
}

impl RoleSet {
    /// Returns `false` if the node was live with this very storage already.
    ///
    /// A live entry with another storage handle is replaced in place: the node
    /// left and came back before its pending removal was flushed.
    fn insert(&mut self, participant: Participant) -> bool {
        if self.members.insert(participant.node) {
            self.live.push(participant);
            return true;
        }
        match self.live.iter_mut().find(|p| p.node == participant.node) {
            Some(entry) if !Rc::ptr_eq(&entry.storage, &participant.storage) => {
                *entry = participant;
                true
            }
            _ => false,
        }
    }

    fn remove(&mut self, node: NodeId) -> bool {
        if self.members.remove(&node) {
            self.live.retain(|p| p.node != node);
            true
        } else {
            false
        }
    }

    fn defer_add(&mut self, participant: Participant) {
        self.pending_remove.retain(|n| *n != participant.node);
        if !self.pending_add.iter().any(|p| p.node == participant.node) {
            self.pending_add.push(participant);
        }
    }

    fn defer_remove(&mut self, node: NodeId) {
        self.pending_add.retain(|p| p.node != node);
        if !self.pending_remove.contains(&node) {
            self.pending_remove.push(node);
        }
    }

    fn flush(&mut self) {
        for participant in std::mem::take(&mut self.pending_add) {
            self.insert(participant);
        }
        for node in std::mem::take(&mut self.pending_remove) {
            self.remove(node);
        }
    }
}

/// The two participant sets of a grid.
#[derive(Debug, Default)]
pub struct Registry {
    providers: RoleSet,
    consumers: RoleSet,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, role: Role) -> &RoleSet {
        match role {
            Role::Provider => &self.providers,
            Role::Consumer => &self.consumers,
        }
    }

    fn set_mut(&mut self, role: Role) -> &mut RoleSet {
        match role {
            Role::Provider => &mut self.providers,
            Role::Consumer => &mut self.consumers,
        }
    }

    /// Adds `participant` under `role`, or buffers the request during a pass.
    pub fn add(&mut self, role: Role, participant: Participant) -> Membership {
        let set = self.set_mut(role);
        if set.pass_active {
            set.defer_add(participant);
            return Membership::Deferred;
        }
        // a request deferred during an earlier pass must not undo this one
        set.pending_remove.retain(|n| *n != participant.node);
        if set.insert(participant) {
            Membership::Applied
        } else {
            Membership::Unchanged
        }
    }

    /// Removes `node` from `role`, or buffers the request during a pass.
    pub fn remove(&mut self, role: Role, node: NodeId) -> Membership {
        let set = self.set_mut(role);
        if set.pass_active {
            set.defer_remove(node);
            return Membership::Deferred;
        }
        set.pending_add.retain(|p| p.node != node);
        if set.remove(node) {
            Membership::Applied
        } else {
            Membership::Unchanged
        }
    }

    /// Inserts straight into the live set.
    ///
    /// # Errors
    ///
    /// Returns `GridError::PassActive` while a pass over `role` is running.
    pub fn insert_live(&mut self, role: Role, participant: Participant) -> Result<bool> {
        let set = self.set_mut(role);
        if set.pass_active {
            return Err(GridError::PassActive { role });
        }
        Ok(set.insert(participant))
    }

    /// Removes straight from the live set.
    ///
    /// # Errors
    ///
    /// Returns `GridError::PassActive` while a pass over `role` is running.
    pub fn remove_live(&mut self, role: Role, node: NodeId) -> Result<bool> {
        let set = self.set_mut(role);
        if set.pass_active {
            return Err(GridError::PassActive { role });
        }
        Ok(set.remove(node))
    }

    /// Runs one pass over the live set of `role` in insertion order.
    ///
    /// Pending requests from earlier passes are flushed first. The visitor
    /// gets the registry back so it can issue `add`/`remove` calls, which are
    /// deferred for `role`. Returns the number of participants visited.
    ///
    /// # Errors
    ///
    /// Returns `GridError::PassActive` if a pass over `role` is already running.
    pub fn for_each_active<F>(&mut self, role: Role, mut visitor: F) -> Result<usize>
    where
        F: FnMut(&Participant, &mut Registry) -> Visit,
    {
        let set = self.set_mut(role);
        if set.pass_active {
            return Err(GridError::PassActive { role });
        }
        set.flush();
        set.pass_active = true;
        tracing::trace!(%role, live = set.live.len(), "pass started");

        let mut index = 0;
        let mut visited = 0;
        while let Some(participant) = self.set(role).live.get(index).cloned() {
            visited += 1;
            match visitor(&participant, self) {
                Visit::Keep => index += 1,
                Visit::Remove => {
                    let set = self.set_mut(role);
                    set.live.remove(index);
                    set.members.remove(&participant.node);
                }
                Visit::Stop => break,
            }
        }

        self.set_mut(role).pass_active = false;
        Ok(visited)
    }

    pub fn contains(&self, role: Role, node: NodeId) -> bool {
        self.set(role).members.contains(&node)
    }

    pub fn len(&self, role: Role) -> usize {
        self.set(role).live.len()
    }

    pub fn is_empty(&self, role: Role) -> bool {
        self.set(role).live.is_empty()
    }

    /// Live participants of `role` in insertion order.
    pub fn participants(&self, role: Role) -> impl Iterator<Item = &Participant> + '_ {
        self.set(role).live.iter()
    }

    pub fn pending_adds(&self, role: Role) -> usize {
        self.set(role).pending_add.len()
    }

    pub fn pending_removes(&self, role: Role) -> usize {
        self.set(role).pending_remove.len()
    }

    pub fn is_pass_active(&self, role: Role) -> bool {
        self.set(role).pass_active
    }
}
