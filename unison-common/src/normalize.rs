//! Lookup-key normalization for song and artist names
//!
//! Case and whitespace only. Transliteration, featured-artist stripping and
//! similar rewriting are not attempted.

/// Normalize a song or artist name into its lookup key
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
