//! Umbrella crate that re-exports the `cer-*` building blocks.
//!
//! This crate is intended as a convenient entrypoint: the relational data
//! model and distributions (`core`), agent observations (`observe`), rule
//! induction (`induct`), slots and the policy generator (`policy`), and
//! the optimization loop with persistence (`opt`).

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "core")]
#[cfg_attr(docsrs, doc(cfg(feature = "core")))]
pub use cer_core as core;

#[cfg(feature = "observe")]
#[cfg_attr(docsrs, doc(cfg(feature = "observe")))]
pub use cer_observe as observe;

#[cfg(feature = "induct")]
#[cfg_attr(docsrs, doc(cfg(feature = "induct")))]
pub use cer_induct as induct;

#[cfg(feature = "policy")]
#[cfg_attr(docsrs, doc(cfg(feature = "policy")))]
pub use cer_policy as policy;

#[cfg(feature = "opt")]
#[cfg_attr(docsrs, doc(cfg(feature = "opt")))]
pub use cer_opt as opt;
