//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; Crawl-delay,
//! which that crate ignores, is parsed here.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,
    rule: Blanket,
}

/// A verdict that applies to every path regardless of content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Blanket {
    None,
    AllowAll,
    DenyAll,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            rule: Blanket::None,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when the site answers robots.txt with 404/410, i.e. publishes no policy.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            rule: Blanket::AllowAll,
        }
    }

    /// Creates a ParsedRobots that denies everything
    ///
    /// Used when robots.txt could not be retrieved at all.
    pub fn deny_all() -> Self {
        Self {
            content: String::new(),
            rule: Blanket::DenyAll,
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL or path is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path (e.g., "/survey?page=2")
    /// * `user_agent` - The robots.txt product token of the crawler
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.rule {
            Blanket::AllowAll => return true,
            Blanket::DenyAll => return false,
            Blanket::None => {}
        }

        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent, in seconds
    ///
    /// A group naming the agent takes precedence over the `*` group. A group is
    /// one or more consecutive User-agent lines followed by its rules; the next
    /// User-agent line after a rule starts a new group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.rule != Blanket::None || self.content.is_empty() {
            return None;
        }

        let normalized_agent = user_agent.to_lowercase();
        let mut group_agents: Vec<String> = Vec::new();
        let mut group_has_rules = false;
        let mut delay_for_agent: Option<f64> = None;
        let mut delay_for_wildcard: Option<f64> = None;

        for line in self.content.lines() {
            // Drop trailing comments
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if group_has_rules {
                        group_agents.clear();
                        group_has_rules = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_has_rules = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }

                    let names_agent = group_agents
                        .iter()
                        .any(|ua| ua != "*" && !ua.is_empty() && normalized_agent.contains(ua));
                    if names_agent {
                        delay_for_agent.get_or_insert(delay);
                    } else if group_agents.iter().any(|ua| ua == "*") {
                        delay_for_wildcard.get_or_insert(delay);
                    }
                }
                _ => group_has_rules = true,
            }
        }

        delay_for_agent.or(delay_for_wildcard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT: &str = "AdmitHarvest";

    #[test]
    fn test_blanket_verdicts_ignore_content() {
        let open = ParsedRobots::allow_all();
        assert!(open.is_allowed("/survey?page=40", AGENT));
        assert_eq!(open.crawl_delay(AGENT), None);

        let closed = ParsedRobots::deny_all();
        assert!(!closed.is_allowed("/", AGENT));
        assert!(!closed.is_allowed("/survey", AGENT));
        assert_eq!(closed.crawl_delay(AGENT), None);
    }

    #[test]
    fn test_listing_path_disallowed() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /survey\n");
        assert!(!robots.is_allowed("/survey", AGENT));
        assert!(!robots.is_allowed("/survey?page=3", AGENT));
        assert!(robots.is_allowed("/about", AGENT));
    }

    #[test]
    fn test_longest_match_wins() {
        let content = "User-agent: *\nDisallow: /survey\nAllow: /survey/index.php\n";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/survey", AGENT));
        assert!(robots.is_allowed("/survey/index.php?page=2", AGENT));
    }

    #[test]
    fn test_named_group_overrides_wildcard() {
        let content = "User-agent: AdmitHarvest\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("/survey", AGENT));
        assert!(robots.is_allowed("/survey", "SomeoneElse"));
    }

    #[test]
    fn test_blank_content_allows_everything() {
        let robots = ParsedRobots::from_content("   \n");
        assert!(robots.is_allowed("/survey", AGENT));
        assert_eq!(robots.crawl_delay(AGENT), None);
    }

    #[test]
    fn test_crawl_delay_named_group_preferred() {
        let content = "User-agent: *\nCrawl-delay: 10\n\nUser-agent: AdmitHarvest\nCrawl-delay: 4";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay(AGENT), Some(4.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_agent_match_ignores_case() {
        let robots = ParsedRobots::from_content("User-agent: admitharvest\nCrawl-delay: 7");
        assert_eq!(robots.crawl_delay("ADMITHARVEST"), Some(7.0));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let content = "User-agent: BotA\nUser-agent: AdmitHarvest\nCrawl-delay: 1.5\n\nUser-agent: BotC\nDisallow: /";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay(AGENT), Some(1.5));
        assert_eq!(robots.crawl_delay("BotA"), Some(1.5));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_crawl_delay_rejects_garbage() {
        for value in ["soon", "-3", "NaN", "inf"] {
            let robots =
                ParsedRobots::from_content(&format!("User-agent: *\nCrawl-delay: {value}"));
            assert_eq!(robots.crawl_delay(AGENT), None, "value {value:?}");
        }
    }

    #[test]
    fn test_crawl_delay_after_comment() {
        let robots = ParsedRobots::from_content("# politeness\nUser-agent: * # everyone\nCrawl-delay: 3 # seconds");
        assert_eq!(robots.crawl_delay(AGENT), Some(3.0));
    }

    #[test]
    fn test_new_group_starts_after_rules() {
        let content = "User-agent: AdmitHarvest\nDisallow: /private\nUser-agent: *\nCrawl-delay: 9";
        let robots = ParsedRobots::from_content(content);
        // The delay belongs to the `*` group only, reached through the fallback
        assert_eq!(robots.crawl_delay(AGENT), Some(9.0));
        assert_eq!(robots.content(), content);
    }
}
