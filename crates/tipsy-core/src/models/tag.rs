//! Tag vocabulary

/// Built-in flavour tags offered by the editor.
pub const PRESET_TAGS: [&str; 10] = [
    "Smoky", "Caramel", "Sweet", "Nutty", "Fruity", "Bitter", "Spicy", "Floral", "Sour", "Herbal",
];

/// Whether `tag` is one of the built-in flavour tags.
pub fn is_preset_tag(tag: &str) -> bool {
    PRESET_TAGS.contains(&tag)
}

/// Trim a tag, returning `None` when nothing is left.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_string())
    }
}

/// Trim, drop empties and dedupe, keeping first-seen order.
pub fn dedupe_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if let Some(tag) = normalize_tag(&tag) {
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
    }
    out
}
