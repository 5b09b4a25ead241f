//! Disease IS_A hierarchy derived from KCD code structure.
//!
//! KCD codes nest lexically: `C50.11` sits under `C50.1`, which sits
//! under the three-character category `C50`. Each disease links to the
//! longest strictly-shorter code present in the load, so the result is
//! a forest rooted at the category codes.

use std::collections::HashSet;

use extract::schema::Disease;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Disease → Disease edge record (child to parent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsA {
    pub child_kcd_code: String,
    pub parent_kcd_code: String,
}

pub fn link_disease_hierarchy(diseases: &[Disease]) -> Vec<IsA> {
    let known: HashSet<&str> = diseases.iter().map(|d| d.kcd_code.as_str()).collect();
    let mut edges = Vec::new();

    for disease in diseases {
        if let Some(parent) = parent_code(&disease.kcd_code, &known) {
            edges.push(IsA {
                child_kcd_code: disease.kcd_code.clone(),
                parent_kcd_code: parent.to_string(),
            });
        }
    }

    debug!(edges = edges.len(), "derived disease hierarchy");
    edges
}

/// Longest proper prefix of `code` that is itself a loaded code.
/// Categories are three characters; nothing shorter is a candidate.
fn parent_code<'a>(code: &str, known: &HashSet<&'a str>) -> Option<&'a str> {
    let mut candidate = code;
    while candidate.len() >= 4 {
        candidate = candidate[..candidate.len() - 1].trim_end_matches('.');
        if candidate.len() < 3 {
            break;
        }
        if let Some(found) = known.get(candidate).copied() {
            return Some(found);
        }
    }
    None
}
