#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

//! # sxgd
//!
//! Signed-exchange packaging gateway. Fetches AMP documents from an
//! upstream origin and serves them back as signed exchanges a downstream
//! cache may present under the origin's identity, falling through to a
//! verbatim proxy whenever a response is not eligible for signing.

pub mod amp;
pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod headers;
pub mod rtv;
pub mod sign;
pub mod state;
pub mod transformer;
pub mod urlset;
