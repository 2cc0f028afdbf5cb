//! Cache keys: operation plus a hash of normalized parameters
//! (generation) or of the input text (embedding). Deliberately excludes
//! the backend id, so a cache hit short-circuits selection entirely
//! regardless of which backend would otherwise have been chosen.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub fn generate_key(prompt: &str, max_tokens: u32, temperature: f32) -> String {
    let mut hasher = DefaultHasher::new();
    prompt.hash(&mut hasher);
    max_tokens.hash(&mut hasher);
    temperature.to_bits().hash(&mut hasher);
    format!("llm:generate:{:x}", hasher.finish())
}

pub fn embed_key(texts: &[String]) -> String {
    let mut hasher = DefaultHasher::new();
    for text in texts {
        text.hash(&mut hasher);
    }
    format!("llm:embed:{:x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_params_yield_the_same_key() {
        let a = generate_key("what is 2+2", 16, 0.0);
        let b = generate_key("what is 2+2", 16, 0.0);
        assert_eq!(a, b);
    }

    #[test]
    fn different_prompts_yield_different_keys() {
        let a = generate_key("what is 2+2", 16, 0.0);
        let b = generate_key("what is 4+4", 16, 0.0);
        assert_ne!(a, b);
    }

    #[test]
    fn embed_key_is_order_sensitive() {
        let a = embed_key(&["one".to_string(), "two".to_string()]);
        let b = embed_key(&["two".to_string(), "one".to_string()]);
        assert_ne!(a, b);
    }
}
