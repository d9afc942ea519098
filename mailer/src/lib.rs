//! Reminder e-mail rendering and delivery through a transactional e-mail HTTP API.

pub mod client;
pub mod templates;

pub use client::MailClient;
pub use templates::{RenderedEmail, TemplateData};
