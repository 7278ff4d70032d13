//! `usermgmt-core` — identifiers, errors and paging shared by every layer.
//!
//! This crate contains **pure** building blocks (no IO, no vendor concerns).

pub mod error;
pub mod id;
pub mod page;
pub mod sorting;

pub use error::DomainError;
pub use id::{RoleId, UserId};
pub use page::{Page, PageRequest};
pub use sorting::cmp_nulls_first_ci;
