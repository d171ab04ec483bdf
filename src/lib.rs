//! Pressroom: the adaptive read cache that sits between a content site's
//! rendering layer and its quota-metered document store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
