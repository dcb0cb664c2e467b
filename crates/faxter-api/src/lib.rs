//! Faxter API provider
//!
//! Implements [`CloudProvider`](faxter_cloud::CloudProvider) against the
//! Faxter REST API: projects, SSH keys, security groups, networks, routers,
//! volumes, servers and load balancers.
//!
//! Server creation blocks until the server is online, fails, or the poll
//! deadline passes; see [`faxter_cloud::Reconciler`].
//!
//! # Example
//!
//! ```ignore
//! use faxter_api::FaxterProvider;
//! use faxter_cloud::CloudProvider;
//!
//! let config = faxter_config::load()?;
//! let provider = FaxterProvider::from_config(&config)?;
//!
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     anyhow::bail!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod client;
pub mod error;
pub mod provider;
pub mod resources;

pub use client::FaxterClient;
pub use error::{ApiError, Result};
pub use provider::FaxterProvider;
pub use resources::{ResourceHandler, ResourceResponse, ServerStatusFetch, handler_for};
