//! Core library for creating batches of linked Jira issues from a YAML description.

pub mod auth;
pub mod config;
pub mod plan;
pub mod rest;
pub mod services;
pub mod spec;
