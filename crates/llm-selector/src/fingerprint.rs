//! Query fingerprinting: complexity classification and per-axis topical
//! weights derived from the prompt. Not persisted; recomputed per
//! request.

use llm_backend::Weights;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Code,
    Creative,
    Factual,
    Reasoning,
    Computational,
}

#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub complexity: Complexity,
    pub weights: Weights,
}

/// One ordered pattern table per intent/complexity class, in the same
/// shape as the distilled system's own keyword tables: each entry is a
/// case-insensitive regex; the first table whose patterns match wins.
/// These are English-language defaults; callers targeting another
/// language should build their own `Fingerprinter`.
struct PatternTable {
    high: Vec<Regex>,
    medium: Vec<Regex>,
    low: Vec<Regex>,
}

fn compiled(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
        .collect()
}

fn complexity_table() -> &'static PatternTable {
    static TABLE: OnceLock<PatternTable> = OnceLock::new();
    TABLE.get_or_init(|| PatternTable {
        high: compiled(&[
            r"\bprove\b", r"\bdesign (a|an)\b", r"\barchitecture\b", r"\bcompare and contrast\b",
            r"\bstep[- ]by[- ]step\b", r"\banalyz(e|ing)\b.*\band\b",
        ]),
        medium: compiled(&[
            r"\bexplain\b", r"\bsummarize\b", r"\bwhy\b", r"\bhow does\b", r"\bdifference between\b",
        ]),
        low: compiled(&[r"\bwhat is\b", r"\bdefine\b", r"\blist\b"]),
    })
}

fn intent_keywords(intent: Intent) -> &'static [Regex] {
    static CODE: OnceLock<Vec<Regex>> = OnceLock::new();
    static CREATIVE: OnceLock<Vec<Regex>> = OnceLock::new();
    static FACTUAL: OnceLock<Vec<Regex>> = OnceLock::new();
    static REASONING: OnceLock<Vec<Regex>> = OnceLock::new();
    static COMPUTATIONAL: OnceLock<Vec<Regex>> = OnceLock::new();

    match intent {
        Intent::Code => CODE.get_or_init(|| {
            compiled(&[
                r"\bcode\b", r"\bfunction\b", r"\bbug\b", r"\bcompile\b", r"\brefactor\b",
                r"\bpython\b", r"\brust\b", r"\bjavascript\b", r"```",
            ])
        }),
        Intent::Creative => CREATIVE.get_or_init(|| {
            compiled(&[r"\bstory\b", r"\bpoem\b", r"\bwrite a\b", r"\bimagine\b", r"\bcreative\b"])
        }),
        Intent::Factual => FACTUAL.get_or_init(|| {
            compiled(&[r"\bwhat is\b", r"\bwhen did\b", r"\bwho (is|was)\b", r"\bfact\b", r"\bdate\b"])
        }),
        Intent::Reasoning => REASONING.get_or_init(|| {
            compiled(&[r"\bwhy\b", r"\bexplain\b", r"\breason\b", r"\blogic\b", r"\bprove\b"])
        }),
        Intent::Computational => COMPUTATIONAL.get_or_init(|| {
            compiled(&[
                r"\bcalculate\b", r"\bcompute\b", r"\bsum\b", r"\bequation\b", r"\d+\s*[\+\-\*/]\s*\d+",
            ])
        }),
    }
}

/// Token count as a whitespace split, the simplest faithful stand-in for
/// the "token count" the complexity rule references.
fn token_count(prompt: &str) -> usize {
    prompt.split_whitespace().count()
}

pub fn classify_complexity(prompt: &str) -> Complexity {
    let tokens = token_count(prompt);
    if tokens > 100 {
        return Complexity::High;
    }
    if tokens <= 4 {
        return Complexity::Low;
    }

    let table = complexity_table();
    if table.high.iter().any(|r| r.is_match(prompt)) {
        Complexity::High
    } else if table.medium.iter().any(|r| r.is_match(prompt)) {
        Complexity::Medium
    } else if table.low.iter().any(|r| r.is_match(prompt)) {
        Complexity::Low
    } else {
        Complexity::Low
    }
}

pub fn detect_intents(prompt: &str) -> Vec<Intent> {
    [
        Intent::Code,
        Intent::Creative,
        Intent::Factual,
        Intent::Reasoning,
        Intent::Computational,
    ]
    .into_iter()
    .filter(|intent| intent_keywords(*intent).iter().any(|r| r.is_match(prompt)))
    .collect()
}

fn apply_boost(weights: &mut Weights, intent: Intent) {
    match intent {
        Intent::Code => {
            weights.code_quality *= 2.5;
            weights.reasoning *= 1.5;
            weights.factual_accuracy *= 1.5;
            weights.creativity *= 0.5;
        }
        Intent::Creative => {
            weights.creativity *= 2.5;
            weights.language_quality *= 1.5;
            weights.factual_accuracy *= 0.5;
        }
        Intent::Factual => {
            weights.factual_accuracy *= 2.5;
            weights.reasoning *= 1.5;
            weights.creativity *= 0.5;
        }
        Intent::Reasoning => {
            weights.reasoning *= 2.5;
            weights.factual_accuracy *= 1.5;
            weights.computation *= 1.2;
        }
        Intent::Computational => {
            weights.computation *= 2.5;
            weights.reasoning *= 1.5;
            weights.factual_accuracy *= 1.2;
        }
    }
}

fn clamp_axes(weights: &mut Weights) {
    macro_rules! clamp {
        ($field:ident) => {
            weights.$field = weights.$field.clamp(0.5, 2.5);
        };
    }
    clamp!(creativity);
    clamp!(factual_accuracy);
    clamp!(code_quality);
    clamp!(reasoning);
    clamp!(computation);
    clamp!(conciseness);
    clamp!(language_quality);
    clamp!(cost_efficiency);
    clamp!(speed);
    clamp!(context_length);
}

/// Builds the (complexity, weights) fingerprint for a generate request.
pub fn fingerprint(prompt: &str) -> Fingerprint {
    let complexity = classify_complexity(prompt);
    let mut weights = Weights::neutral();

    for intent in detect_intents(prompt) {
        apply_boost(&mut weights, intent);
    }

    match complexity {
        Complexity::High => {
            weights.context_length = weights.context_length.max(2.0);
            weights.reasoning = weights.reasoning.max(1.5);
        }
        Complexity::Low => {
            weights.speed = weights.speed.max(1.5);
            weights.cost_efficiency = weights.cost_efficiency.max(1.5);
        }
        Complexity::Medium => {}
    }

    clamp_axes(&mut weights);
    Fingerprint { complexity, weights }
}
