//! Object registry
//!
//! Process-wide identity for reference-counted objects. Every live object
//! carries a unique positive [`Uid`] and is reachable through the
//! [`ObjectDb`] it was registered in.
//!
//! # Architecture
//!
//! ```text
//! ObjectDb (uid -> weak entry)
//!   ├─→ 1 → Weak ──→ ObjCell { uid: 1, body: Trial }
//!   ├─→ 2 → Weak ──→ ObjCell { uid: 2, body: Stimulus }
//!   └─→ 3 → Weak ──→ (dead, pruned lazily)
//!
//! ObjHandle  — strong, owning; last drop destroys the object
//! SoftHandle — stores a bare uid; re-resolves through the ObjectDb
//! TypeFactory — "Stimulus" -> fn() -> Box<dyn Persistable>
//! ```
//!
//! The registry holds weak entries only: object lifetime is governed
//! entirely by strong handles, and a dead entry is pruned the next time
//! it is seen. Uids are allocated monotonically and never reused, so a
//! soft handle whose target has died always reports absence, never a
//! different object.

pub mod database;
pub mod factory;
pub mod handle;
pub mod object;
pub mod uid;

pub use database::ObjectDb;
pub use factory::TypeFactory;
pub use handle::SoftHandle;
pub use object::{ObjHandle, Persistable};
pub use uid::Uid;
