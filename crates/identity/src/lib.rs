//! `usermgmt-identity` — everything that talks to the identity platform.
//!
//! - `api`: the narrow capability trait services depend on
//! - `client`: Auth0 Management API implementation (HTTP)
//! - `in_memory`: in-process platform for dev/tests
//! - `credentials` / `token`: the shared, periodically refreshed access token
//! - `config`: environment-driven settings

pub mod api;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod in_memory;
pub mod model;
pub mod secret;
pub mod token;

pub use api::ManagementApi;
pub use client::{http_client, Auth0ManagementClient};
pub use config::{ConfigError, ManagementConfig};
pub use credentials::{
    AccessToken, CredentialProvider, RefreshHandle, RefreshingCredential, StaticCredential,
    TokenFetcher,
};
pub use error::{CredentialError, ManagementError, ManagementResult};
pub use in_memory::{Call, InMemoryManagementApi, Operation};
pub use model::{
    NewRole, NewUser, PageQuery, PasswordChangeTicketRequest, Permission, ResourceServer, Role,
    RoleUpdate, RolesPage, Scope, User, UsersPage,
};
pub use secret::SecretString;
pub use token::ClientCredentialsFetcher;
