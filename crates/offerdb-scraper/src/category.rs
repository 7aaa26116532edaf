use offerdb_core::{Category, CategoryKeywords};

/// Infers a category from free text by keyword membership, checking the
/// keyword sets in priority order. Unmatched text is [`Category::Other`].
#[must_use]
pub fn infer_category(text: &str, keywords: &CategoryKeywords) -> Category {
    let lowered = text.to_lowercase();
    keywords
        .in_priority_order()
        .into_iter()
        .find(|(_, words)| {
            words
                .iter()
                .any(|w| !w.is_empty() && lowered.contains(w.to_lowercase().as_str()))
        })
        .map_or(Category::Other, |(category, _)| category)
}

/// Maps a page's section label ("Dining & Groceries", "Travel") onto a
/// category. Returns `None` for text that isn't a known label.
#[must_use]
pub fn category_from_label(label: &str) -> Option<Category> {
    let normalized = label
        .trim()
        .trim_end_matches(':')
        .to_lowercase()
        .replace(" and ", " & ");
    let category = match normalized.as_str() {
        "dining" | "dining & groceries" | "food & dining" | "restaurants" | "restaurants & cafes"
        | "groceries" => Category::Dining,
        "shopping" | "retail" | "fashion" => Category::Shopping,
        "travel" | "travel & hotels" | "hotels" => Category::Travel,
        "lifestyle" | "lifestyle & wellness" => Category::Lifestyle,
        "entertainment" | "leisure & entertainment" => Category::Entertainment,
        "health" | "health & wellness" | "health & beauty" | "medical" => Category::Health,
        "automotive" | "cars" => Category::Automotive,
        "education" => Category::Education,
        _ => return None,
    };
    Some(category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restaurant_text_is_dining() {
        let keywords = CategoryKeywords::default();
        assert_eq!(
            infer_category("Nova Restaurant - 15% off the bill", &keywords),
            Category::Dining
        );
    }

    #[test]
    fn priority_order_resolves_overlaps() {
        let keywords = CategoryKeywords::default();
        // "hotel" (travel) and "spa" (lifestyle): lifestyle is checked first.
        assert_eq!(
            infer_category("Hotel spa weekend", &keywords),
            Category::Lifestyle
        );
        // "cafe" (dining) beats "mall" (shopping).
        assert_eq!(
            infer_category("Mall cafe voucher", &keywords),
            Category::Dining
        );
    }

    #[test]
    fn unmatched_text_is_other() {
        let keywords = CategoryKeywords::default();
        assert_eq!(infer_category("Cashback on fuel", &keywords), Category::Other);
        assert_eq!(infer_category("", &keywords), Category::Other);
    }

    #[test]
    fn custom_keywords_are_used() {
        let keywords = CategoryKeywords {
            travel: vec!["airport".to_string()],
            ..CategoryKeywords::default()
        };
        assert_eq!(
            infer_category("Airport lounge access", &keywords),
            Category::Travel
        );
    }

    #[test]
    fn section_labels_map_directly() {
        assert_eq!(
            category_from_label("Dining & Groceries"),
            Some(Category::Dining)
        );
        assert_eq!(category_from_label(" Travel "), Some(Category::Travel));
        assert_eq!(
            category_from_label("Health and Wellness"),
            Some(Category::Health)
        );
        assert_eq!(
            category_from_label("Entertainment"),
            Some(Category::Entertainment)
        );
        assert_eq!(category_from_label("Automotive"), Some(Category::Automotive));
    }

    #[test]
    fn non_labels_are_none() {
        assert_eq!(category_from_label("All"), None);
        assert_eq!(category_from_label("20% off at Starbucks"), None);
    }
}
