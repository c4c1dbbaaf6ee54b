//! Addresses and the updates computed between two observations of a service.

use std::collections::HashSet;

/// A `host:port` string, directly usable to open a connection.
pub type Address = String;

/// The membership of a service as reported by the discovery daemon.
pub type AddressSet = HashSet<Address>;

/// Opaque version token returned by the daemon alongside an [`AddressSet`].
pub type WatchIndex = u64;

/// Kind of change carried by an [`Update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    /// The address joined the service.
    Add,
    /// The address left the service.
    Delete,
}

/// One unit of change between two observations of an [`AddressSet`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Update {
    /// Whether the address was added or deleted.
    pub op: Op,
    /// The address concerned.
    pub address: Address,
}

impl Update {
    /// Creates an update adding `address`.
    pub fn add(address: impl Into<Address>) -> Self {
        Self {
            op: Op::Add,
            address: address.into(),
        }
    }

    /// Creates an update deleting `address`.
    pub fn delete(address: impl Into<Address>) -> Self {
        Self {
            op: Op::Delete,
            address: address.into(),
        }
    }
}

/// Computes the updates turning `old` into `new`: one [`Op::Delete`] for each
/// address only in `old` and one [`Op::Add`] for each address only in `new`.
///
/// Addresses present in both sets produce nothing. Deletes come before adds,
/// but callers should not rely on any order.
///
/// ```
/// use meta_resolver::{diff, AddressSet, Update};
/// let old: AddressSet = ["10.0.0.1:80".to_string()].into_iter().collect();
/// let new: AddressSet = ["10.0.0.2:80".to_string()].into_iter().collect();
/// assert_eq!(
///     diff(&old, &new),
///     vec![Update::delete("10.0.0.1:80"), Update::add("10.0.0.2:80")]
/// );
/// ```
pub fn diff(old: &AddressSet, new: &AddressSet) -> Vec<Update> {
    let deleted = old.difference(new).cloned().map(Update::delete);
    let added = new.difference(old).cloned().map(Update::add);
    deleted.chain(added).collect()
}
