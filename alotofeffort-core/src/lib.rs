#![doc = "alotofeffort-core: core logic library for alotofeffort."]

//! This crate contains the storage-agnostic logic for deploying a static site:
//! walking the site tree, detecting changed files and orchestrating the upload.
//! Concrete storage clients (S3) live in the `alotofeffort` crate.
//!
//! # Usage
//! Implement [`contract::ObjectStore`] for a backend, then call [`deploy::deploy`]
//! with a [`walk::SiteTree`].

pub mod change;
pub mod contract;
pub mod deploy;
pub mod walk;
