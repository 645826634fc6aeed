//! # xc-ns-mover library
//!
//! Transactional relocation of HTTP load balancers (and their transitive
//! dependencies) between namespaces on a live F5 Distributed Cloud tenant,
//! plus the companion scanner that inventories the tenant's load balancers
//! into the mover's input format. The two binaries in this crate consume
//! the library end to end; the modules are usable piecemeal for tooling
//! built on the same API.

pub mod api;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod http;
pub mod logging;
pub mod mover;
pub mod report;
pub mod scanner;
pub mod spec;
