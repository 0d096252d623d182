//! MDMTSP to ATSP converter library
//!
//! Turns a multi-depot multiple traveling salesman instance into a single
//! asymmetric TSP instance (TSPLIB explicit `FULL_MATRIX`). Each depot is
//! duplicated, and zero-cost and forbidden edges are added so that one
//! Hamiltonian cycle over the extended index space encodes one route per
//! depot. Any ATSP solver can then be used on the result.
//!
//! # Features
//!
//! - `.dat` instance loading with line-aware error reporting
//! - Ceil or round scaling of Euclidean distances, configurable sentinel cost
//! - Streaming matrix output, optionally formatted in parallel
//! - Decoding of solver tours back into vehicle routes
//! - Batch conversion of whole instance categories
//!
//! # Example
//!
//! ```no_run
//! use mdmtsp_atsp::instance::MdmtspInstance;
//! use mdmtsp_atsp::transform::{AtspTransformer, TransformConfig};
//! use mdmtsp_atsp::tsplib::write_atsp;
//!
//! let instance = MdmtspInstance::from_file("DAT/small/p01.dat").unwrap();
//! let transformer = AtspTransformer::new(&instance, TransformConfig::default());
//!
//! let mut out = std::io::stdout();
//! write_atsp(&instance.name, &transformer, &mut out).unwrap();
//! ```

pub mod error;
pub mod instance;
pub mod transform;
pub mod tsplib;
pub mod tour;
pub mod convert;
pub mod batch;

pub use error::{ConvertError, Result};
pub use instance::MdmtspInstance;
pub use transform::{AtspTransformer, Rounding, Sentinel, TransformConfig};
