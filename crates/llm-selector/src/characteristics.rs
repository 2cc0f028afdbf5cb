//! Static per-kind characteristic seeds. Constructed at startup, read-only
//! during operation; intended to eventually be refreshed from observed
//! metrics, but that feedback loop is out of scope here per the data
//! model ("currently static").

use llm_backend::{BackendKind, Characteristics};

/// Seeds a characteristics vector from the backend's kind tag. Remote
/// chat-style providers are assumed the strongest all-rounders; the
/// local-file adapter (a canned-response stand-in, not a real model) is
/// seeded low everywhere except speed and cost, since it never leaves
/// the process.
pub fn seed_for_kind(kind: BackendKind) -> Characteristics {
    match kind {
        BackendKind::RemoteHttpChat => Characteristics {
            creativity: 8.0,
            factual_accuracy: 7.5,
            code_quality: 8.0,
            reasoning: 8.0,
            computation: 7.0,
            conciseness: 6.5,
            language_quality: 8.5,
            cost_efficiency: 5.0,
            speed: 6.0,
            context_length: 8.0,
        },
        BackendKind::RemoteHttpCompletion => Characteristics {
            creativity: 7.0,
            factual_accuracy: 6.5,
            code_quality: 6.0,
            reasoning: 6.0,
            computation: 5.5,
            conciseness: 6.0,
            language_quality: 7.0,
            cost_efficiency: 6.0,
            speed: 6.5,
            context_length: 5.0,
        },
        BackendKind::RemoteHttpProxy => Characteristics {
            creativity: 7.0,
            factual_accuracy: 7.0,
            code_quality: 7.0,
            reasoning: 7.0,
            computation: 6.5,
            conciseness: 6.0,
            language_quality: 7.0,
            cost_efficiency: 6.0,
            speed: 6.0,
            context_length: 7.0,
        },
        BackendKind::LocalFile => Characteristics {
            creativity: 2.0,
            factual_accuracy: 3.0,
            code_quality: 2.0,
            reasoning: 2.0,
            computation: 2.0,
            conciseness: 5.0,
            language_quality: 3.0,
            cost_efficiency: 10.0,
            speed: 10.0,
            context_length: 2.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_file_is_seeded_cheap_and_fast() {
        let c = seed_for_kind(BackendKind::LocalFile);
        assert_eq!(c.cost_efficiency, 10.0);
        assert_eq!(c.speed, 10.0);
    }
}
