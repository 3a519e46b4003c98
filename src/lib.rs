//! Nightly batch pipeline that language-detects, translates, and embeds
//! traveler tips, then clusters them per location into a small set of
//! promoted consensus tips.
//!
//! This crate is the coordinator side: the Persistence Gateway, the Wake
//! Protocol, the Coordinator's drain/fanout/retry loop, and the
//! Promotion Engine. The Processing Worker itself ships as the sibling
//! `tripwhisper-worker` binary crate, which depends on this crate only
//! for the shared wire schemas in [`wire`].

pub mod config;
pub mod coordinator;
pub mod domain;
pub mod gateway;
pub mod promotion;
pub mod wake;
pub mod wire;
pub mod worker_client;
