use regex::Regex;
use sha2::{Digest, Sha256};

/// Greek letters show up in ingredient names (α-tocopherol); folding them
/// to ASCII keeps derived ids stable across source spellings.
const GREEK_ASCII: &[(char, &str)] = &[
    ('α', "alpha"),
    ('β', "beta"),
    ('γ', "gamma"),
    ('δ', "delta"),
    ('ε', "epsilon"),
    ('κ', "kappa"),
    ('λ', "lambda"),
    ('μ', "mu"),
    ('ω', "omega"),
];

/// Normalize an entity name: lowercase, Greek-to-ASCII, punctuation
/// trimmed, whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.to_lowercase();
    for (letter, ascii) in GREEK_ASCII {
        if normalized.contains(*letter) {
            normalized = normalized.replace(*letter, ascii);
        }
    }
    let re = Regex::new(r"[.,!?;:']").unwrap();
    normalized = re.replace_all(&normalized, "").to_string();
    let re = Regex::new(r"\s+").unwrap();
    re.replace_all(normalized.trim(), " ").to_string()
}

/// Normalize a clinical or legal code: strip all whitespace, uppercase.
pub fn normalize_code(code: &str) -> String {
    code.split_whitespace()
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Stable 32-hex-char id for entities whose source supplies none. Parts
/// are NUL-separated so `["ab","c"]` and `["a","bc"]` differ.
pub fn stable_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
