//! robots.txt politeness gate.
//!
//! Fetches and caches robots.txt rules per origin with a 24-hour staleness
//! bound. Compliance is best-effort and fail-open: a refresh that errors in
//! any way (network, non-200, unparsable body) records "no rules" and is not
//! surfaced to the caller, but the attempt is timestamped so the guard does
//! not re-fetch on every call.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Staleness bound for cached rules, matching what major crawlers use.
const RULES_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The robots fetch uses its own short timeout and fixed identifying header,
/// independent of the main client's rate limiter and retry policy.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);
const REFRESH_USER_AGENT: &str = "titlescout-bot/0.1 (+metadata fetcher)";

/// Parsed robots.txt directives relevant to us.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RobotsRules {
    /// Ordered disallowed path prefixes.
    pub disallow: Vec<String>,
    /// Crawl-delay hint in seconds, if the site stated one.
    pub crawl_delay: Option<u64>,
}

/// Cached per-origin state. `rules == None` means allow-all.
#[derive(Debug)]
struct CachedRules {
    rules: Option<RobotsRules>,
    checked_at: Instant,
}

impl CachedRules {
    fn is_stale(&self) -> bool {
        self.checked_at.elapsed() >= RULES_TTL
    }

    fn allows_path(&self, path: &str) -> bool {
        let Some(rules) = &self.rules else { return true };
        let path = if path.is_empty() { "/" } else { path };
        !rules.disallow.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Gate on outbound paths backed by cached robots.txt rules.
///
/// Lock-to-field mapping: the RwLock guards only the per-origin rules map.
/// Refresh is double-checked: a read-locked staleness probe first, then a
/// write-locked re-check before the network call, so concurrent callers
/// never fetch the same robots.txt twice.
pub struct PolitenessGuard {
    state: RwLock<HashMap<String, CachedRules>>,
    http: reqwest::Client,
}

impl PolitenessGuard {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
            http: reqwest::Client::builder()
                .timeout(REFRESH_TIMEOUT)
                .user_agent(REFRESH_USER_AGENT)
                .use_rustls_tls()
                .build()
                // Builder only fails on TLS backend misconfiguration, which
                // is unrecoverable at startup anyway.
                .expect("failed to build robots.txt HTTP client"),
        }
    }

    /// Whether `url`'s path may be fetched.
    ///
    /// Refreshes the origin's rules when unset or older than 24 hours.
    /// Unparsable rules and refresh failures allow; absent host allows.
    pub async fn allows(&self, url: &Url) -> bool {
        let Some(origin) = origin_of(url) else { return true };

        {
            let state = self.state.read().await;
            if let Some(cached) = state.get(&origin)
                && !cached.is_stale()
            {
                return cached.allows_path(url.path());
            }
        }

        let mut state = self.state.write().await;
        let needs_refresh = state.get(&origin).is_none_or(|c| c.is_stale());
        if needs_refresh {
            let rules = self.fetch_rules(&origin).await;
            state.insert(origin.clone(), CachedRules { rules, checked_at: Instant::now() });
        }

        state.get(&origin).map(|c| c.allows_path(url.path())).unwrap_or(true)
    }

    /// Crawl-delay hint for `url`'s origin, if one is cached.
    pub async fn crawl_delay_hint(&self, url: &Url) -> Option<Duration> {
        let origin = origin_of(url)?;
        let state = self.state.read().await;
        state
            .get(&origin)
            .and_then(|c| c.rules.as_ref())
            .and_then(|r| r.crawl_delay)
            .map(Duration::from_secs)
    }

    async fn fetch_rules(&self, origin: &str) -> Option<RobotsRules> {
        let robots_url = format!("{origin}/robots.txt");
        let response = match self.http.get(&robots_url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "robots.txt fetch failed, allowing all");
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!(url = %robots_url, status = %response.status(), "no robots.txt, allowing all");
            return None;
        }

        match response.text().await {
            Ok(body) => {
                let rules = parse_rules(&body);
                tracing::debug!(
                    url = %robots_url,
                    disallow = rules.disallow.len(),
                    "cached robots.txt rules"
                );
                Some(rules)
            }
            Err(e) => {
                tracing::debug!(url = %robots_url, error = %e, "robots.txt body unreadable, allowing all");
                None
            }
        }
    }
}

impl Default for PolitenessGuard {
    fn default() -> Self {
        Self::new()
    }
}

fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{}://{}:{}", url.scheme(), host, port)),
        None => Some(format!("{}://{}", url.scheme(), host)),
    }
}

/// Whether a `User-agent:` token addresses a generic crawler like us.
fn agent_applies(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    token == "*" || token.contains("bot") || token.contains("crawler")
}

/// Line-oriented robots.txt parsing.
///
/// A `User-agent:` line opens a section (stacked agent lines form one
/// group); within an applicable section `Disallow:` accumulates prefixes and
/// `Crawl-delay:` sets the hint. Keys are case-insensitive; comments and
/// unrecognized lines are ignored.
fn parse_rules(body: &str) -> RobotsRules {
    let mut rules = RobotsRules::default();
    let mut section_applies = false;
    let mut last_was_agent = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if last_was_agent {
                    // Stacked agent lines: the group applies if any does.
                    section_applies = section_applies || agent_applies(value);
                } else {
                    section_applies = agent_applies(value);
                }
                last_was_agent = true;
            }
            "disallow" => {
                last_was_agent = false;
                if section_applies && !value.is_empty() {
                    rules.disallow.push(value.to_string());
                }
            }
            "crawl-delay" => {
                last_was_agent = false;
                if section_applies && let Ok(secs) = value.parse::<u64>() {
                    rules.crawl_delay = Some(secs);
                }
            }
            _ => {
                last_was_agent = false;
            }
        }
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(rules: Option<RobotsRules>) -> CachedRules {
        CachedRules { rules, checked_at: Instant::now() }
    }

    #[test]
    fn test_parse_wildcard_section() {
        let rules = parse_rules("User-agent: *\nDisallow: /subject\nDisallow: /celebrity\nCrawl-delay: 5\n");
        assert_eq!(rules.disallow, vec!["/subject", "/celebrity"]);
        assert_eq!(rules.crawl_delay, Some(5));
    }

    #[test]
    fn test_parse_skips_inapplicable_sections() {
        let body = "User-agent: Googlebot-Image\nDisallow: /images\n\nUser-agent: *\nDisallow: /private\n";
        // "Googlebot-Image" contains "bot", so both sections apply here.
        let rules = parse_rules(body);
        assert_eq!(rules.disallow, vec!["/images", "/private"]);

        let body = "User-agent: something-else\nDisallow: /images\n\nUser-agent: *\nDisallow: /private\n";
        let rules = parse_rules(body);
        assert_eq!(rules.disallow, vec!["/private"]);
    }

    #[test]
    fn test_parse_bot_and_crawler_tokens() {
        assert!(agent_applies("*"));
        assert!(agent_applies("MyBot"));
        assert!(agent_applies("some-CRAWLER/2.0"));
        assert!(!agent_applies("Mozilla"));
    }

    #[test]
    fn test_parse_stacked_agent_lines() {
        let body = "User-agent: mozilla\nUser-agent: *\nDisallow: /x\n";
        let rules = parse_rules(body);
        assert_eq!(rules.disallow, vec!["/x"]);
    }

    #[test]
    fn test_parse_ignores_comments_and_junk() {
        let body = "# full line comment\nUser-agent: * # trailing comment\nDisallow: /a # comment\nSitemap: https://x/sitemap.xml\nnot a directive\nDisallow:\n";
        let rules = parse_rules(body);
        assert_eq!(rules.disallow, vec!["/a"]);
    }

    #[test]
    fn test_parse_case_insensitive_keys() {
        let rules = parse_rules("USER-AGENT: *\nDISALLOW: /y\nCRAWL-DELAY: 2\n");
        assert_eq!(rules.disallow, vec!["/y"]);
        assert_eq!(rules.crawl_delay, Some(2));
    }

    #[test]
    fn test_path_prefix_match_denies() {
        let c = cached(Some(RobotsRules { disallow: vec!["/subject".into()], crawl_delay: None }));
        assert!(!c.allows_path("/subject/123"));
        assert!(!c.allows_path("/subject"));
        assert!(c.allows_path("/search"));
    }

    #[test]
    fn test_empty_path_defaults_to_root() {
        let c = cached(Some(RobotsRules { disallow: vec!["/".into()], crawl_delay: None }));
        assert!(!c.allows_path(""));

        let open = cached(Some(RobotsRules { disallow: vec!["/admin".into()], crawl_delay: None }));
        assert!(open.allows_path(""));
    }

    #[test]
    fn test_nil_rules_allow_everything() {
        let c = cached(None);
        assert!(c.allows_path("/anything"));
        assert!(c.allows_path(""));
    }

    #[test]
    fn test_staleness_boundary() {
        let mut c = cached(None);
        assert!(!c.is_stale());
        // checked_sub: the monotonic clock's origin may be < 24h ago.
        if let Some(past) = Instant::now().checked_sub(RULES_TTL + Duration::from_secs(1)) {
            c.checked_at = past;
            assert!(c.is_stale());
        }
    }

    #[test]
    fn test_origin_of() {
        let url = Url::parse("https://movie.douban.com/subject/1291546/").unwrap();
        assert_eq!(origin_of(&url).unwrap(), "https://movie.douban.com");

        let url = Url::parse("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(origin_of(&url).unwrap(), "http://127.0.0.1:8080");
    }
}
