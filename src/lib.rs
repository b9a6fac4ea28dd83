//! Chronica: a small community blogging service.
//!
//! Users publish posts under categories and locations, other users
//! comment, and profiles list an author's posts. Publication visibility
//! (published flag, published category, passed publication date) and
//! author-only mutations are the heart of the system.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
