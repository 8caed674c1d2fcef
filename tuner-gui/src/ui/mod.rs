//! # UI Module
//!
//! This module contains all UI components for the guitar tuner.

pub mod main_display;
