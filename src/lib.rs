//! cms-forms - Backend for the CMS contact editor and the newsletter subscription pages.
//!
//! This crate provides:
//! - Contact list management with a single default recipient
//! - Mailing-list subscribe/unsubscribe requests confirmed through mailed tokens
//! - Form validation, captcha challenges and a request router for the UI layer

pub mod captcha;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod form;
pub mod logging;
pub mod mail;
pub mod model;
pub mod repository;
pub mod router;
pub mod service;
