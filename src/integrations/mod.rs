//! Web framework integrations.
//!
//! The service core in [`service`](crate::service) is framework-agnostic;
//! this module maps it onto HTTP.
//!
//! | Framework | Module |
//! |-----------|--------|
//! | Axum | [`axum`] |

pub mod axum;
