//! Injected persistence capability.
//!
//! The containers never talk to a database; an embedding transaction layer
//! attaches a [`PersistenceHook`] per node and learns about reads and writes
//! through it. Without a hook every call here is a no-op, so the containers
//! work unchanged as plain in-memory structures.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identity assigned to a node by the persistence layer at first commit.
///
/// Appears in exported state as the successor/firstbucket token; the
/// containers treat it as opaque.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Oid(pub u64);

/// Capability the embedding transaction layer hands to a node.
pub trait PersistenceHook {
    /// The node's persisted identity, once it has one.
    fn oid(&self) -> Option<Oid>;

    /// Register a read dependency on the node's current revision. Called
    /// before structural mutations; an error here aborts the mutation with
    /// the node untouched.
    fn read_current(&self) -> Result<()>;

    /// Record the node as modified in the current transaction.
    fn mark_changed(&self);
}

/// Shared hook handle as stored on nodes.
pub type HookRef = Option<Rc<dyn PersistenceHook>>;

pub(crate) fn mark_changed(hook: &HookRef) {
    if let Some(hook) = hook {
        hook.mark_changed();
    }
}

pub(crate) fn oid_of(hook: &HookRef) -> Option<Oid> {
    hook.as_ref().and_then(|hook| hook.oid())
}

/// Register a read dependency when the node is actually persisted. Nodes
/// without an oid have no committed revision to depend on.
pub(crate) fn read_current(hook: &HookRef) -> Result<()> {
    if let Some(hook) = hook {
        if hook.oid().is_some() {
            hook.read_current()?;
        }
    }
    Ok(())
}
