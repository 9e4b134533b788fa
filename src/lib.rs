//! Contract clustering – find a contract by its signer's identity, see every
//! contract that shares an identity value with it, and journal edits without
//! ever touching the source spreadsheet.
//!
//! The crate is built around a dataset that is loaded once and never changed:
//! * A [`dataset::Dataset`] is the delimited source file loaded into ordered,
//!   immutable [`dataset::Record`]s, each with a dense [`dataset::RowId`].
//! * A [`registry::FieldRegistry`] maps every column to a form-safe identifier
//!   and back again.
//! * An [`index::IdentityIndex`] keeps, for each identity attribute (by default
//!   `cpf_assinante`, `nome_assinante` and `cnpj_assinante`), the rows holding
//!   each value as a roaring bitmap.
//!
//! On top of these sit the query engines and the only mutable piece:
//! * [`resolver::IdentityResolver`] – exact match on the full identity tuple
//!   and a capped partial match on any single value.
//! * [`cluster::ClusterEngine`] – the one-hop cluster of a seed record: every
//!   record sharing at least one non-empty identity value with it.
//! * [`journal::EditJournal`] – an append-only file of complete row
//!   projections, one per committed edit.
//! * [`view`] – the current value of a row, derived by replaying the journal.
//!
//! ## Clusters are one hop
//! If A and B share a CPF and B and C share a name, then C is in the cluster of
//! B but not in the cluster of A. Clusters are neighbourhoods of a seed and not
//! connected components of the shared-key graph.
//!
//! ## Edits
//! The dataset exposes no update operation. An edit is appended to the journal
//! with a value for every column (posted values where present, original values
//! otherwise), the row index and a UTC timestamp. The journal is never
//! rewritten, and the "current" row is always recomputed from it.
//!
//! ## Quick Start
//! ```
//! use contract_cluster::dataset::Dataset;
//! use contract_cluster::settings::Settings;
//! use contract_cluster::interface::ContractInterface;
//! let dir = tempfile::tempdir().unwrap();
//! let csv = "id_contrato,cpf_assinante,nome_assinante,cnpj_assinante\n1,123,Ana,\n2,123,Bia,\n";
//! let dataset = Dataset::from_reader(csv.as_bytes(), b',').unwrap();
//! let settings = Settings::with_paths("unused.csv", dir.path().join("edits.csv"), dir.path()).unwrap();
//! let iface = ContractInterface::with_dataset(settings, dataset).unwrap();
//! let (_seed, members) = iface.cluster_of(0).unwrap();
//! assert_eq!(members.len(), 2);
//! ```

pub mod attachment;
pub mod cluster;
pub mod dataset;
pub mod error;
pub mod index;
pub mod interface;
pub mod journal;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod settings;
pub mod view;

pub use error::{ContractError, Result};
