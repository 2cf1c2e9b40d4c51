//! URL slugs for posts.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Longest title-derived part of a slug, before the uniqueness suffix.
const MAX_BASE_LEN: usize = 80;

/// Lowercases and hyphenates a title. May return an empty string.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let hyphenated = NON_ALNUM.replace_all(&lowered, "-");
    let trimmed = hyphenated.trim_matches('-');

    let mut base: String = trimmed.chars().take(MAX_BASE_LEN).collect();
    while base.ends_with('-') {
        base.pop();
    }
    base
}

/// Slug with a random suffix so two posts with the same title never collide.
pub fn unique_slug(title: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];

    match slugify(title) {
        base if base.is_empty() => format!("post-{}", suffix),
        base => format!("{}-{}", base, suffix),
    }
}
