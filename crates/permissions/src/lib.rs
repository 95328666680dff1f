//! Permission gate for bot commands.
//!
//! Every command declares a [`MinimumPermission`] and belongs to a module.
//! [`resolve`](resolve::resolve) decides, from a loaded permission document
//! and an explicit [`PermissionContext`], whether the invocation may run.
//! [`PermissionsService`] wraps that with the persistent store, the admin
//! operations that change it, help listings, and topology bookkeeping.

pub mod catalog;
pub mod error;
pub mod help;
pub mod level;
pub mod resolve;
pub mod service;

pub use {
    catalog::{CommandInfo, ModuleCatalog, ModuleInfo, PERMISSIONS_MODULE},
    error::{Error, Result},
    help::{HelpPagination, PagePhase},
    level::MinimumPermission,
    resolve::{Decision, PermissionContext, effective_level, module_enabled},
    service::{ChannelAccess, HelpReply, ModuleScope, PermissionsService},
};
