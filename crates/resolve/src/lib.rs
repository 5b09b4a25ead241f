//! Code-based resolution: turns extracted entities into typed edge
//! records for the graph load.
//!
//! Every linker is a priority cascade over curated tables. String
//! heuristics run last and are always flagged in the record they
//! produce, so downstream consumers can tell authoritative links from
//! guessed ones.

pub mod cancer_match;
pub mod crosslaw;
pub mod disease_match;
pub mod drug_match;
pub mod hierarchy;
pub mod test_match;

pub use cancer_match::{CancerHasBiomarker, CancerType, NameMatch};
pub use crosslaw::{ArticleIndex, ReferenceResolution, ResolvedReference, UnresolvedReference};
pub use disease_match::{HasBiomarker, OFFICIAL_KCD_MAPPING};
pub use drug_match::{IndicatedFor, Targets};
pub use hierarchy::IsA;
pub use test_match::{MatchType, TestedBy};
