//! Authorization engine.
//!
//! - `catalog`: every permission, global role and project role, and the two role tables
//! - `resolver`: role assignment rows -> [`ResolvedPermissionSnapshot`]
//! - `service`: yes/no questions and `require_*` checks over a snapshot
//! - `guard`: axum middleware wrapping handlers in check-then-call
//!
//! Global and project grants combine by union. A project role can add
//! permissions on its project but never take a global one away.

pub mod catalog;
pub mod guard;
pub mod resolver;
pub mod service;
pub mod snapshot;
pub mod store;

pub use catalog::{Permission, PermissionCategory, ProjectRole, Role, UnknownName};
pub use guard::{enforce, Decision, Guard, GuardContext, MatchMode, ResolvedAccess};
pub use resolver::PermissionResolver;
pub use service::PermissionService;
pub use snapshot::{PermissionsResponse, ResolvedPermissionSnapshot};
pub use store::{InMemoryRoleStore, MembershipRecord, RoleAssignmentStore, SqliteRoleStore, UserRoleRecord};
