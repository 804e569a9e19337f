pub mod capability;
pub mod observer;
pub mod session;
pub mod snapshot;
pub mod text;

mod dom_patch;
mod error;
mod tree;
mod types;

pub use crate::capability::{ElementMatcher, Fragment, SelectorError, TreeCapability, TreeMutation};
pub use crate::dom_patch::{DomPatch, PatchKey};
pub use crate::error::{DomError, DomPatchError};
pub use crate::observer::MutationRecord;
pub use crate::session::{FlushStats, Session, Subscription};
pub use crate::tree::DomTree;
pub use crate::types::{Id, Node, NodeId, NodeType};
