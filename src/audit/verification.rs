//! Vote mark verification codes
//!
//! Format: `V` + uppercase base-36 unix millis + 4 uppercase base-36 random
//! characters, stored undashed. Dashes are a display concern only.

use crate::ids::{random_base36, to_base36};

pub fn generate_verification_code(millis: i64) -> String {
    format!(
        "V{}{}",
        to_base36(millis.max(0) as u64).to_uppercase(),
        random_base36(4).to_uppercase()
    )
}

/// Insert a dash every 4 characters: `VLOYW3V28AB12` -> `VLOY-W3V2-8AB1-2`
pub fn format_verification_code(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    chars
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

/// Undo display formatting: drop dashes and whitespace, uppercase
pub fn normalize_verification_code(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}
