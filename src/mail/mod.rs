//! Mail module.

pub mod client;

pub use client::{MailClient, MAIL_SEND};
