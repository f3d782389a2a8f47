use crate::config::EnrichConfig;
use crate::model::QualityScore;

/// Inputs for the composite score; every component lands in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct QualityInputs {
    pub word_count: usize,
    pub lang_confidence: f64,
    pub body_chars: usize,
    pub raw_chars: usize,
    pub section_count: usize,
}

pub fn score(inputs: &QualityInputs, cfg: &EnrichConfig) -> QualityScore {
    let length = ratio(inputs.word_count, cfg.full_length_words);
    let lang_confidence = inputs.lang_confidence.clamp(0.0, 1.0);
    let density = ratio(inputs.body_chars, inputs.raw_chars);
    let structure = ratio(inputs.section_count, cfg.full_structure_sections);

    let weighted = length * cfg.weight_length
        + lang_confidence * cfg.weight_language
        + density * cfg.weight_density
        + structure * cfg.weight_structure;

    QualityScore {
        length,
        lang_confidence,
        density,
        structure,
        score: weighted.clamp(0.0, 1.0),
    }
}

fn ratio(n: usize, full: usize) -> f64 {
    if full == 0 {
        return 0.0;
    }
    (n as f64 / full as f64).min(1.0)
}
