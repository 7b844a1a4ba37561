//! Connection handles, checkout tickets and leases.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::driver::Connection;
use crate::registry::Registry;

/// Opaque reference to one live connection.
///
/// Cloning is cheap. Equality and hashing are by identity: two handles are
/// equal only if they wrap the very same connection. A handle knows nothing
/// about the pool it came from; the `Ticket` returned next to it does.
pub struct ConnectionHandle<C> {
    inner: Arc<HandleInner<C>>,
}

struct HandleInner<C> {
    id: u64,
    connection: C,
}

impl<C> ConnectionHandle<C> {
    pub(crate) fn new(id: u64, connection: C) -> Self {
        Self {
            inner: Arc::new(HandleInner { id, connection }),
        }
    }

    /// Registry-unique connection id, assigned when the connection was opened.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn connection(&self) -> &C {
        &self.inner.connection
    }
}

impl<C: Connection> ConnectionHandle<C> {
    pub fn ping(&self) -> Result<(), crate::error::DriverError> {
        self.inner.connection.ping()
    }
}

impl<C> Deref for ConnectionHandle<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner.connection
    }
}

impl<C> Clone for ConnectionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> PartialEq for ConnectionHandle<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C> Eq for ConnectionHandle<C> {}

impl<C> Hash for ConnectionHandle<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.inner), state);
    }
}

impl<C> fmt::Debug for ConnectionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

/// Address of one checkout: pool name, slot index and checkout generation.
///
/// Generations are drawn from a process-wide counter, so a ticket matches
/// exactly one checkout. Releasing with a ticket from an earlier checkout of
/// the same slot is refused.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pool: String,
    slot: usize,
    generation: u64,
}

impl Ticket {
    pub fn new(pool: &str, slot: usize, generation: u64) -> Self {
        Self {
            pool: pool.to_string(),
            slot,
            generation,
        }
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.pool, self.slot, self.generation)
    }
}

/// What `acquire` hands out: the connection handle plus its release ticket.
///
/// Dropping a lease does **not** return the slot; call `release_into` or
/// `Registry::release` with the ticket.
#[derive(Debug)]
pub struct Lease<C> {
    handle: ConnectionHandle<C>,
    ticket: Ticket,
}

impl<C: Connection> Lease<C> {
    pub(crate) fn new(handle: ConnectionHandle<C>, ticket: Ticket) -> Self {
        Self { handle, ticket }
    }

    pub fn handle(&self) -> &ConnectionHandle<C> {
        &self.handle
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Name of the pool this lease was taken from.
    pub fn pool(&self) -> &str {
        self.ticket.pool()
    }

    /// Split the lease. The handle stays usable after release, but the
    /// connection belongs to the pool again and may be handed out or pinged.
    pub fn into_parts(self) -> (ConnectionHandle<C>, Ticket) {
        (self.handle, self.ticket)
    }

    /// Return the slot to the registry it came from.
    pub async fn release_into(self, registry: &Registry<C>) -> bool {
        registry.release(&self.ticket).await
    }
}

impl<C> Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.handle.connection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, PartialEq)]
    struct Conn(u32);

    #[test]
    fn handle_equality_is_identity() {
        let a = ConnectionHandle::new(1, Conn(7));
        let b = ConnectionHandle::new(1, Conn(7));
        assert_eq!(a, a.clone());
        // Same id and same contents, but a different connection.
        assert_ne!(a, b);
    }

    #[test]
    fn handle_hashes_by_identity() {
        let a = ConnectionHandle::new(1, Conn(1));
        let b = ConnectionHandle::new(2, Conn(2));
        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(b);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn handle_derefs_to_connection() {
        let h = ConnectionHandle::new(9, Conn(42));
        assert_eq!(h.0, 42);
        assert_eq!(h.connection(), &Conn(42));
        assert_eq!(h.id(), 9);
        assert_eq!(format!("{h:?}"), "ConnectionHandle { id: 9, .. }");
    }

    #[test]
    fn ticket_accessors_and_display() {
        let t = Ticket::new("main", 3, 17);
        assert_eq!(t.pool(), "main");
        assert_eq!(t.slot(), 3);
        assert_eq!(t.generation(), 17);
        assert_eq!(t.to_string(), "main#3@17");
    }
}
