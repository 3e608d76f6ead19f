//! Business services registered at bootstrap.
//!
//! Service modules own policy and credential handling so the dispatch and
//! remote layers can stay focused on routing and protocol translation.

pub mod login;
