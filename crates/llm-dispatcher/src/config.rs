//! Dispatcher-wide tunables: rate-limit caps/windows and cache TTLs per
//! operation. Builder-pattern, matching the other components' own
//! `*ConfigBuilder` shape, with the documented defaults from §6.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub(crate) generate_rate_limit: u64,
    pub(crate) generate_rate_window: Duration,
    pub(crate) embed_rate_limit: u64,
    pub(crate) embed_rate_window: Duration,
    pub(crate) generate_cache_ttl: Duration,
    pub(crate) embed_cache_ttl: Duration,
    pub(crate) max_fallback_attempts: usize,
    pub(crate) default_stream_timeout: Duration,
}

pub struct DispatcherConfigBuilder {
    generate_rate_limit: u64,
    generate_rate_window: Duration,
    embed_rate_limit: u64,
    embed_rate_window: Duration,
    generate_cache_ttl: Duration,
    embed_cache_ttl: Duration,
    max_fallback_attempts: usize,
    default_stream_timeout: Duration,
}

impl Default for DispatcherConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherConfigBuilder {
    /// Defaults: 60 generate/min, 120 embed/min, 1h generate cache,
    /// 24h embed cache, up to 3 total attempts (1 initial + 2 fallbacks)
    /// across backends before a non-streaming call gives up, and a 500s
    /// stream-establishment deadline matching the queue's own
    /// `default_exec_timeout` for callers who don't set one.
    pub fn new() -> Self {
        Self {
            generate_rate_limit: 60,
            generate_rate_window: Duration::from_secs(60),
            embed_rate_limit: 120,
            embed_rate_window: Duration::from_secs(60),
            generate_cache_ttl: Duration::from_secs(3600),
            embed_cache_ttl: Duration::from_secs(86_400),
            max_fallback_attempts: 3,
            default_stream_timeout: Duration::from_secs(500),
        }
    }

    pub fn generate_rate_limit(mut self, limit: u64, window: Duration) -> Self {
        self.generate_rate_limit = limit;
        self.generate_rate_window = window;
        self
    }

    pub fn embed_rate_limit(mut self, limit: u64, window: Duration) -> Self {
        self.embed_rate_limit = limit;
        self.embed_rate_window = window;
        self
    }

    pub fn generate_cache_ttl(mut self, ttl: Duration) -> Self {
        self.generate_cache_ttl = ttl;
        self
    }

    pub fn embed_cache_ttl(mut self, ttl: Duration) -> Self {
        self.embed_cache_ttl = ttl;
        self
    }

    pub fn max_fallback_attempts(mut self, n: usize) -> Self {
        self.max_fallback_attempts = n.max(1);
        self
    }

    pub fn default_stream_timeout(mut self, d: Duration) -> Self {
        self.default_stream_timeout = d;
        self
    }

    pub fn build(self) -> DispatcherConfig {
        DispatcherConfig {
            generate_rate_limit: self.generate_rate_limit,
            generate_rate_window: self.generate_rate_window,
            embed_rate_limit: self.embed_rate_limit,
            embed_rate_window: self.embed_rate_window,
            generate_cache_ttl: self.generate_cache_ttl,
            embed_cache_ttl: self.embed_cache_ttl,
            max_fallback_attempts: self.max_fallback_attempts,
            default_stream_timeout: self.default_stream_timeout,
        }
    }
}

impl DispatcherConfig {
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::new()
    }

    /// Reads overrides from the environment, falling back to the
    /// documented defaults for anything unset or unparsable. Used only
    /// at the `llm-server` binary boundary; library callers should
    /// build one explicitly via [`DispatcherConfig::builder`].
    pub fn from_env() -> Self {
        let mut builder = DispatcherConfigBuilder::new();

        if let Some(limit) = env_u64("LLM_GENERATE_RATE_LIMIT") {
            builder.generate_rate_limit = limit;
        }
        if let Some(secs) = env_u64("LLM_GENERATE_RATE_WINDOW_SECS") {
            builder.generate_rate_window = Duration::from_secs(secs);
        }
        if let Some(limit) = env_u64("LLM_EMBED_RATE_LIMIT") {
            builder.embed_rate_limit = limit;
        }
        if let Some(secs) = env_u64("LLM_EMBED_RATE_WINDOW_SECS") {
            builder.embed_rate_window = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("LLM_GENERATE_CACHE_TTL_SECS") {
            builder.generate_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("LLM_EMBED_CACHE_TTL_SECS") {
            builder.embed_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("LLM_MAX_FALLBACK_ATTEMPTS") {
            builder.max_fallback_attempts = (n as usize).max(1);
        }
        if let Some(secs) = env_u64("LLM_DEFAULT_STREAM_TIMEOUT_SECS") {
            builder.default_stream_timeout = Duration::from_secs(secs);
        }

        builder.build()
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_limits() {
        let config = DispatcherConfig::builder().build();
        assert_eq!(config.generate_rate_limit, 60);
        assert_eq!(config.embed_rate_limit, 120);
        assert_eq!(config.generate_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.embed_cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.default_stream_timeout, Duration::from_secs(500));
    }

    #[test]
    fn builder_overrides_take_effect() {
        let config = DispatcherConfig::builder()
            .generate_rate_limit(10, Duration::from_secs(30))
            .max_fallback_attempts(1)
            .build();
        assert_eq!(config.generate_rate_limit, 10);
        assert_eq!(config.generate_rate_window, Duration::from_secs(30));
        assert_eq!(config.max_fallback_attempts, 1);
    }
}
