//! oidc-signin: client-side OAuth2 / OpenID Connect sign-in.
//!
//! A [`SignInCoordinator`](auth::SignInCoordinator) turns a sign-in request
//! into exactly one outcome: a [`TokenSet`](auth::TokenSet) or a
//! [`SignInError`](error::SignInError). The consent surface is supplied by the
//! host through [`ExternalAuthPresenter`](auth::ExternalAuthPresenter); codes
//! are redeemed through [`TokenExchange`](auth::TokenExchange).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use oidc_signin::prelude::*;
//!
//! # async fn example() -> oidc_signin::error::Result<()> {
//! let (presenter, _commands) = ChannelPresenter::new();
//! let coordinator = SignInCoordinator::builder(Arc::new(presenter))
//!     .with_token_exchange(Arc::new(HttpTokenExchange::new(
//!         "https://oauth2.example.com/token",
//!     )))
//!     .build();
//! let config = SignInConfiguration::new("client-id", "com.example.app:/oauth2redirect");
//! let tokens = coordinator.sign_in(config).await?;
//! println!("signed in at {}", tokens.obtained_at());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod util;

pub use auth::sign_in;
