//! Contract between user types and their transactional state
//!
//! A user type becomes transactional by naming the plain state that
//! represents it inside a tranlocal. Fields referring to other
//! transactional objects are stored as [`Handle`](crate::Handle)s:
//!
//! ```
//! use mvstm_concurrency::{Handle, TransactionalObject};
//!
//! #[derive(Clone, PartialEq)]
//! struct NodeState {
//!     value: i64,
//!     next: Option<Handle<NodeState>>,
//! }
//!
//! struct Node {
//!     value: i64,
//!     next: Option<Handle<NodeState>>,
//! }
//!
//! impl TransactionalObject for Node {
//!     type State = NodeState;
//!
//!     fn into_state(self) -> NodeState {
//!         NodeState { value: self.value, next: self.next }
//!     }
//!
//!     fn from_state(state: NodeState) -> Self {
//!         Node { value: state.value, next: state.next }
//!     }
//! }
//! ```

use crate::tranlocal::TranlocalState;

/// A user type with a transactional representation
pub trait TransactionalObject: Sized {
    /// Field data held by each version of the object
    type State: TranlocalState;

    /// Convert to tranlocal state
    fn into_state(self) -> Self::State;

    /// Rebuild from tranlocal state
    fn from_state(state: Self::State) -> Self;
}
