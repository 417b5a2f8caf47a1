//! # UI Module
//!
//! Screens and widgets of the hearing screening application.

pub mod audiogram;
pub mod screens;
