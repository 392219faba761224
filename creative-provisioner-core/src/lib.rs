#![doc = "creative-provisioner-core: core logic library for creative-provisioner."]

//! This crate contains the provisioning workflow and everything it needs that
//! does not depend on a concrete HTTP transport: the catalog contract, folder
//! resolution, sequence allocation, URL decoration, archive handling and the
//! sequential batch driver.
//!
//! # Usage
//! Implement [`contract::CatalogClient`] and [`contract::ArchiveFetcher`] (or use
//! the mocks exported under the default `test-export-mocks` feature), build a
//! [`provision::Provisioner`] and feed it requests.

pub mod archive;
pub mod batch;
pub mod contract;
pub mod decorate;
pub mod provision;
pub mod resolve;
pub mod sequence;
