//! Provisioning and schema reconciliation for Solr-backed table indexes.
//!
//! Every table of a host data source is backed by one Solr collection and a
//! config-set of its own. This crate creates and deletes those, and keeps the
//! collection's field schema in line with the schema the table declares.
//!
//! # Core Types
//!
//! - [`IndexerService`] - The handle embedders hold: owns the client, the schema cache and the naming policy
//! - [`CollectionProvisioner`] - Creates and deletes the collection and config-set behind a table
//! - [`SchemaReconciler`] and [`plan_schema_update`] - Diffs a desired schema against the deployed one
//! - [`client::SolrAdmin`] - The remote operations everything goes through, with an HTTP and an in-memory implementation
//!
//! # Quick Start
//!
//! ```
//! use recordindex::{IndexerConfig, IndexerService};
//! use recordindex_types::{CollectionConfig, Schema};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = IndexerService::new(IndexerConfig::new("http://localhost:8983/solr"))?;
//!
//! let config = CollectionConfig::builder()
//!     .collection_name("orders")
//!     .shards(2)
//!     .schema(Schema::parse(None, "name:total type:double indexed:true stored:true")?)
//!     .build()?;
//! service.ensure_table_index(&config).await?;
//!
//! let schema = service.get_schema("orders").await?;
//! println!("orders is keyed by {}", schema.unique_key());
//!
//! service.destroy().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Naming
//!
//! Collections, config-sets and cache entries use the name qualified by the
//! tenant domain, `{DOMAIN}_{table}`. Schema introspection, schema updates and
//! documents address the collection by its table name and leave the tenant
//! resolution to the cluster.
//!
//! # Partial failures
//!
//! Provisioning, deletion and document writes take several remote calls and
//! nothing is rolled back. Their errors have a `remote_effect()` telling
//! whether the cluster was changed before the failure; repeating the same
//! call completes the operation.

pub mod client;
pub mod config;
pub mod documents;
mod provisioner;
mod reconciler;
mod schema_cache;
mod service;

pub use config::IndexerConfig;
pub use documents::DocumentError;
pub use provisioner::*;
pub use reconciler::*;
pub use schema_cache::SchemaCache;
pub use service::*;
