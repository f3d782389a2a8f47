use super::items::ItemTag;

/// Content type from the filing's form type.
pub fn content_type(form_type: &str) -> &'static str {
    match form_type.trim().to_uppercase().as_str() {
        "10-K" | "20-F" => "annual_report",
        "10-Q" => "quarterly_report",
        "8-K" | "6-K" => "current_report",
        "DEF 14A" => "proxy_statement",
        "S-1" => "registration_statement",
        _ => "other",
    }
}

/// Coarse industry sector from a SIC code, per the SEC division ranges.
pub fn sector(sic_code: &str) -> Option<&'static str> {
    let code: u32 = sic_code.trim().parse().ok()?;
    let sector = match code {
        7370..=7379 => "technology",
        100..=999 => "agriculture",
        1000..=1499 => "mining",
        1500..=1799 => "construction",
        2000..=3999 => "manufacturing",
        4000..=4999 => "transportation",
        5000..=5199 => "wholesale-trade",
        5200..=5999 => "retail-trade",
        6000..=6799 => "finance",
        7000..=7999 => "services",
        8000..=8999 => "healthcare",
        9000..=9999 => "public-administration",
        _ => return None,
    };
    Some(sector)
}

/// Tag set in a stable order: content type, form, sector, items, themes.
pub fn build(
    content_type: &str,
    form_type: &str,
    sic_code: Option<&str>,
    items: &[ItemTag],
) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut push = |tag: String| {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    };

    if content_type != "other" {
        push(content_type.replace('_', "-"));
    }
    push(form_type.trim().to_lowercase().replace(' ', "-"));
    if let Some(sector) = sic_code.and_then(sector) {
        push(sector.to_string());
    }
    for item in items {
        push(item.as_str().replace('_', "-"));
    }

    let has = |wanted: &[ItemTag]| items.iter().any(|i| wanted.contains(i));
    if has(&[ItemTag::Item1a]) {
        push("risk-factors".to_string());
    }
    if has(&[ItemTag::Item7, ItemTag::Item2_10q]) {
        push("mda".to_string());
    }
    if has(&[ItemTag::Item8, ItemTag::Item1_10q]) {
        push("financial-statements".to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(content_type("10-K"), "annual_report");
        assert_eq!(content_type("20-F"), "annual_report");
        assert_eq!(content_type("10-q"), "quarterly_report");
        assert_eq!(content_type("6-K"), "current_report");
        assert_eq!(content_type("DEF 14A"), "proxy_statement");
        assert_eq!(content_type("S-1"), "registration_statement");
        assert_eq!(content_type("SC 13G"), "other");
    }

    #[test]
    fn sectors() {
        assert_eq!(sector("3571"), Some("manufacturing"));
        assert_eq!(sector("7372"), Some("technology"));
        assert_eq!(sector("7011"), Some("services"));
        assert_eq!(sector("6022"), Some("finance"));
        assert_eq!(sector("0100"), Some("agriculture"));
        assert_eq!(sector("50"), None);
        assert_eq!(sector(""), None);
    }

    #[test]
    fn tag_order_and_themes() {
        let tags = build(
            "annual_report",
            "10-K",
            Some("7372"),
            &[ItemTag::Item1, ItemTag::Item1a, ItemTag::Item7, ItemTag::Item8],
        );
        assert_eq!(
            tags,
            vec![
                "annual-report", "10-k", "technology", "item-1", "item-1a", "item-7", "item-8",
                "risk-factors", "mda", "financial-statements",
            ]
        );
    }

    #[test]
    fn ten_q_themes_and_dedup() {
        let tags = build(
            "quarterly_report",
            "10-Q",
            None,
            &[ItemTag::Item1_10q, ItemTag::Item2_10q, ItemTag::Item2_10q],
        );
        assert_eq!(
            tags,
            vec!["quarterly-report", "10-q", "item-1-10q", "item-2-10q", "mda", "financial-statements"]
        );
    }

    #[test]
    fn proxy_form_tag_uses_dashes() {
        let tags = build("proxy_statement", "DEF 14A", Some("9999"), &[]);
        assert_eq!(tags, vec!["proxy-statement", "def-14a", "public-administration"]);
    }

    #[test]
    fn unmapped_form_gets_no_content_type_tag() {
        let form = "SC 13G";
        let tags = build(content_type(form), form, Some("3571"), &[]);
        assert_eq!(tags, vec!["sc-13g", "manufacturing"]);
    }
}
