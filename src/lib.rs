//! cidata-tool library
//!
//! Prepares cloud-init artifacts for the NoCloud datasource:
//! - Edits user-data (password hash, SSH keys) with the `#cloud-config` header
//! - Packages user-data, meta-data and network-config as a `cidata` ISO-9660 image
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Single pass**: every command reads its inputs, transforms in memory and
//!   writes its output once; any error aborts the invocation

pub mod cli;
pub mod commands;
pub mod config;
pub mod iso;
pub mod password;
pub mod userdata;

mod error;

pub use error::CidataError;
