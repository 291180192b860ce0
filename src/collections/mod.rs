//! Data structures backing the throttle ledger.

mod linked_list;

pub use linked_list::{IntoIter, Iter, LinkedList, NodeRef};
