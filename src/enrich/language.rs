/// Detection looks at the head of the body only.
const SAMPLE_CHARS: usize = 5_000;
pub const UNDETERMINED: &str = "und";

/// ISO 639-3 code of the dominant language and the detector's confidence.
pub fn detect(body: &str) -> (String, f64) {
    let sample = match body.char_indices().nth(SAMPLE_CHARS) {
        Some((cut, _)) => &body[..cut],
        None => body,
    };
    match whatlang::detect(sample) {
        Some(info) => (info.lang().code().to_string(), info.confidence()),
        None => (UNDETERMINED.to_string(), 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_filing_prose() {
        let (lang, confidence) = detect(
            "The Company designs, manufactures and markets smartphones, personal computers, \
             tablets, wearables and accessories, and sells a variety of related services. \
             The following discussion should be read in conjunction with the consolidated \
             financial statements and accompanying notes included in this annual report.",
        );
        assert_eq!(lang, "eng");
        assert!(confidence > 0.5 && confidence <= 1.0);
    }

    #[test]
    fn nothing_to_detect() {
        assert_eq!(detect(""), (UNDETERMINED.to_string(), 0.0));
        assert_eq!(detect("12345 67 890"), (UNDETERMINED.to_string(), 0.0));
    }

    #[test]
    fn long_multibyte_body_is_sampled_safely() {
        let body = "Résumé des opérations financières. ".repeat(400);
        let (lang, _) = detect(&body);
        assert_eq!(lang, "fra");
    }
}
