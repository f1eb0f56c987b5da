/// Specialization categories and the interest keywords that hint at them.
///
/// A counsellor whose specialization is exactly one of these category names
/// (case-insensitive) earns one point for every interest containing one of the
/// category's keywords.
pub const SPECIALIZATION_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Technology",
        &["technology", "computer", "it", "software", "programming", "tech"],
    ),
    (
        "Healthcare",
        &["healthcare", "medical", "medicine", "health", "nursing"],
    ),
    (
        "Business",
        &["business", "finance", "management", "entrepreneurship", "marketing"],
    ),
    (
        "Engineering",
        &["engineering", "mechanical", "civil", "electrical", "electronics"],
    ),
    (
        "Arts",
        &["arts", "creative", "design", "music", "fine arts", "media"],
    ),
    (
        "Science",
        &["science", "physics", "chemistry", "biology", "research"],
    ),
    (
        "Education",
        &["education", "teaching", "training", "academic"],
    ),
    ("Law", &["law", "legal", "justice", "advocacy"]),
];

/// Keywords for a category name, if `specialization` names one.
pub fn keywords_for(specialization: &str) -> Option<&'static [&'static str]> {
    SPECIALIZATION_KEYWORDS
        .iter()
        .find(|(category, _)| category.eq_ignore_ascii_case(specialization))
        .map(|(_, keywords)| *keywords)
}
