//! runbot-github: GitHub REST client for runbot
//!
//! Provides [`GithubClient`], the production implementation of
//! `runbot_core::CodeHost`.

pub mod client;
pub mod error;

pub use client::{GithubClient, GithubConfig, DEFAULT_API_URL};
pub use error::{GithubError, Result};
