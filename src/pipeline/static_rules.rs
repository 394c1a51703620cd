use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::StaticRulesConfig;
use crate::snapshot::RequestSnapshot;

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Union-based injection
        Regex::new(r"(?i)\bunion\b.*\bselect\b").unwrap(),
        // Classic boolean injection
        Regex::new(r"(?i)\b(or|and)\b\s+\d+\s*=\s*\d+").unwrap(),
        Regex::new(r#"(?i)'\s*(or|and)\s*'"#).unwrap(),
        // Comment terminators
        Regex::new(r"--\s").unwrap(),
        Regex::new(r"'--").unwrap(),
        // Statement termination into data manipulation
        Regex::new(r"(?i);\s*\bdrop\s+table\b").unwrap(),
        Regex::new(r"(?i)\bdrop\b\s+(table|database)\b").unwrap(),
        // SQL execution
        Regex::new(r"(?i)\b(exec|execute)\s*\(").unwrap(),
        // Time-based blind injection
        Regex::new(r"(?i)\b(benchmark|sleep|waitfor\s+delay)\s*\(").unwrap(),
    ]
});

static MARKUP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Script tags and protocols
        Regex::new(r"(?i)<script\b").unwrap(),
        Regex::new(r"(?i)javascript:").unwrap(),
        // Inline event handlers (onerror=, onload=, ...)
        Regex::new(r"(?i)\bon\w+\s*=").unwrap(),
        // Tags commonly abused as script carriers
        Regex::new(r"(?i)<svg\b").unwrap(),
        Regex::new(r"(?i)<img\b").unwrap(),
        Regex::new(r"(?i)<iframe\b").unwrap(),
        // Data URLs with markup
        Regex::new(r"(?i)data:text/html").unwrap(),
    ]
});

static TRAVERSAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Literal traversal
        Regex::new(r"\.\./").unwrap(),
        Regex::new(r"\.\.\\").unwrap(),
        // Percent-encoded variants (survive a single decode when doubly encoded)
        Regex::new(r"(?i)%2e%2e%2f").unwrap(),
        Regex::new(r"(?i)%2e%2e%5c").unwrap(),
        Regex::new(r"(?i)%252e%252e%252f").unwrap(),
        // Null byte injection
        Regex::new(r"%00").unwrap(),
    ]
});

static SHELL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Command chaining operators
        Regex::new(r";\s*\w").unwrap(),
        Regex::new(r"\|\|\s*\w").unwrap(),
        Regex::new(r"&&\s*\w").unwrap(),
        // Command substitution
        Regex::new(r"\$\([^)]*\)").unwrap(),
        Regex::new(r"\$\{\s*\w").unwrap(),
        Regex::new(r"`[^`]+`").unwrap(),
    ]
});

/// Attack-tool User-Agent substrings, matched case-insensitively.
static SCANNER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "sqlmap",
        "nikto",
        "nmap",
        "masscan",
        "dirbuster",
        "gobuster",
        "wpscan",
        "fuzzer",
        "curl",
        "wget",
    ]
});

/// Headers whose values are browser boilerplate, not attacker-controlled
/// payload carriers. Scanning them drowns the batteries in false positives
/// (every browser User-Agent contains shell metacharacters).
static SAFE_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set = HashSet::new();
    set.insert("accept");
    set.insert("accept-encoding");
    set.insert("accept-language");
    set.insert("cache-control");
    set.insert("connection");
    set.insert("content-type");
    set.insert("cookie");
    set.insert("host");
    set.insert("origin");
    set.insert("referer");
    set.insert("sec-ch-ua");
    set.insert("sec-ch-ua-mobile");
    set.insert("sec-ch-ua-platform");
    set.insert("sec-fetch-dest");
    set.insert("sec-fetch-mode");
    set.insert("sec-fetch-site");
    set.insert("upgrade-insecure-requests");
    set.insert("user-agent");
    set
});

/// Which rule family produced a static verdict. Used to label metrics and
/// audit events; the decision itself is the same unconditional block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticRuleKind {
    OversizedBody,
    SqlInjection,
    MarkupInjection,
    PathTraversal,
    ShellInjection,
    ScannerUserAgent,
    ContentTypeMismatch,
}

impl StaticRuleKind {
    pub fn label(self) -> &'static str {
        match self {
            StaticRuleKind::OversizedBody => "oversized_body",
            StaticRuleKind::SqlInjection => "sql_injection",
            StaticRuleKind::MarkupInjection => "markup_injection",
            StaticRuleKind::PathTraversal => "path_traversal",
            StaticRuleKind::ShellInjection => "shell_injection",
            StaticRuleKind::ScannerUserAgent => "scanner_user_agent",
            StaticRuleKind::ContentTypeMismatch => "content_type_mismatch",
        }
    }
}

/// Deterministic known-attack detection, evaluated before anything else in
/// the pipeline. Pure and total: no I/O, and malformed input is simply "no
/// evidence" for the sub-check that could not read it.
pub struct StaticRuleEngine {
    config: StaticRulesConfig,
}

impl StaticRuleEngine {
    pub fn new(config: StaticRulesConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, snapshot: &RequestSnapshot) -> bool {
        self.first_match(snapshot).is_some()
    }

    /// Run the battery in order and report the first family that matches.
    pub fn first_match(&self, snapshot: &RequestSnapshot) -> Option<StaticRuleKind> {
        if !self.config.enabled {
            return None;
        }

        if snapshot.body.len() > self.config.max_body_bytes {
            return Some(StaticRuleKind::OversizedBody);
        }

        let content = self.scan_content(snapshot);

        if SQL_PATTERNS.iter().any(|p| p.is_match(&content)) {
            return Some(StaticRuleKind::SqlInjection);
        }
        if MARKUP_PATTERNS.iter().any(|p| p.is_match(&content)) {
            return Some(StaticRuleKind::MarkupInjection);
        }
        if TRAVERSAL_PATTERNS.iter().any(|p| p.is_match(&content)) {
            return Some(StaticRuleKind::PathTraversal);
        }
        if SHELL_PATTERNS.iter().any(|p| p.is_match(&content)) {
            return Some(StaticRuleKind::ShellInjection);
        }

        if let Some(agent) = snapshot.user_agent() {
            let agent = agent.to_lowercase();
            if SCANNER_AGENTS.iter().any(|s| agent.contains(s)) {
                return Some(StaticRuleKind::ScannerUserAgent);
            }
        }

        let content_type = snapshot.content_type().unwrap_or("").to_lowercase();
        if content_type.contains("application/json")
            && snapshot.method.eq_ignore_ascii_case("POST")
            && snapshot.body.is_empty()
        {
            return Some(StaticRuleKind::ContentTypeMismatch);
        }

        None
    }

    /// Body, query, and non-safe header values as one string, size-capped,
    /// then best-effort percent-decoded so encoded payloads are not missed.
    fn scan_content(&self, snapshot: &RequestSnapshot) -> String {
        let mut combined = String::new();
        combined.push_str(&snapshot.body_text());
        combined.push(' ');
        combined.push_str(&snapshot.query_text());
        for (name, value) in snapshot.headers() {
            if SAFE_HEADERS.contains(name.as_str()) {
                continue;
            }
            combined.push(' ');
            combined.push_str(value);
        }

        if combined.len() > self.config.scan_limit {
            let mut cap = self.config.scan_limit;
            while !combined.is_char_boundary(cap) {
                cap -= 1;
            }
            combined.truncate(cap);
        }

        match urlencoding::decode(&combined) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => combined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StaticRuleEngine {
        StaticRuleEngine::new(StaticRulesConfig::default())
    }

    #[test]
    fn test_boolean_sql_injection_in_body() {
        let snapshot = RequestSnapshot::new("POST", "/search").with_body(&br#"{"q":"1 OR 1=1"}"#[..]);
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::SqlInjection));
    }

    #[test]
    fn test_union_select_in_query() {
        let snapshot =
            RequestSnapshot::new("GET", "/items").with_query("id", "1 UNION SELECT password FROM users");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::SqlInjection));
    }

    #[test]
    fn test_comment_terminator() {
        let snapshot = RequestSnapshot::new("GET", "/items").with_query("id", "admin'-- ");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::SqlInjection));
    }

    #[test]
    fn test_drop_table() {
        let snapshot = RequestSnapshot::new("POST", "/save").with_body(&b"name=x; DROP TABLE users"[..]);
        // SQL battery runs before the shell battery, so the drop wins.
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::SqlInjection));
    }

    #[test]
    fn test_script_tag_in_body() {
        let snapshot =
            RequestSnapshot::new("POST", "/comment").with_body(&b"<script>alert(1)</script>"[..]);
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::MarkupInjection));
    }

    #[test]
    fn test_percent_encoded_script_tag() {
        let snapshot =
            RequestSnapshot::new("GET", "/search").with_query("q", "%3Cscript%3Ealert(1)%3C%2Fscript%3E");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::MarkupInjection));
    }

    #[test]
    fn test_inline_event_handler() {
        let snapshot = RequestSnapshot::new("GET", "/search").with_query("q", "<img src=x onerror=alert(1)>");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::MarkupInjection));
    }

    #[test]
    fn test_javascript_url() {
        let snapshot = RequestSnapshot::new("GET", "/go").with_query("to", "javascript:alert(1)");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::MarkupInjection));
    }

    #[test]
    fn test_path_traversal_in_query() {
        let snapshot = RequestSnapshot::new("GET", "/file").with_query("path", "../../etc/passwd");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::PathTraversal));
    }

    #[test]
    fn test_encoded_path_traversal() {
        let snapshot = RequestSnapshot::new("GET", "/file").with_query("path", "%252e%252e%252fetc");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::PathTraversal));
    }

    #[test]
    fn test_command_substitution() {
        let snapshot = RequestSnapshot::new("GET", "/run").with_query("cmd", "$(whoami)");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::ShellInjection));
    }

    #[test]
    fn test_backtick_substitution() {
        let snapshot = RequestSnapshot::new("GET", "/run").with_query("cmd", "`id`");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::ShellInjection));
    }

    #[test]
    fn test_chained_command() {
        let snapshot = RequestSnapshot::new("POST", "/submit").with_body(&b"file=a.txt && rm -rf /"[..]);
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::ShellInjection));
    }

    #[test]
    fn test_scanner_user_agent() {
        let snapshot = RequestSnapshot::new("GET", "/").with_header("User-Agent", "sqlmap/1.4.7#stable");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::ScannerUserAgent));
    }

    #[test]
    fn test_curl_user_agent() {
        let snapshot = RequestSnapshot::new("GET", "/").with_header("User-Agent", "curl/7.68.0");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::ScannerUserAgent));
    }

    #[test]
    fn test_browser_user_agent_is_not_shell_injection() {
        // Browser UAs are full of semicolons; they must not trip the shell battery.
        let snapshot = RequestSnapshot::new("GET", "/")
            .with_header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36");
        assert_eq!(engine().first_match(&snapshot), None);
    }

    #[test]
    fn test_custom_header_is_scanned() {
        let snapshot = RequestSnapshot::new("GET", "/").with_header("X-Debug", "$(cat /etc/passwd)");
        assert_eq!(engine().first_match(&snapshot), Some(StaticRuleKind::ShellInjection));
    }

    #[test]
    fn test_oversized_body() {
        let mut config = StaticRulesConfig::default();
        config.max_body_bytes = 8;
        let snapshot = RequestSnapshot::new("POST", "/upload").with_body(&b"123456789"[..]);
        assert_eq!(
            StaticRuleEngine::new(config).first_match(&snapshot),
            Some(StaticRuleKind::OversizedBody)
        );
    }

    #[test]
    fn test_json_content_type_with_empty_post_body() {
        let snapshot =
            RequestSnapshot::new("POST", "/api").with_header("Content-Type", "application/json");
        assert_eq!(
            engine().first_match(&snapshot),
            Some(StaticRuleKind::ContentTypeMismatch)
        );
    }

    #[test]
    fn test_json_content_type_with_body_is_fine() {
        let snapshot = RequestSnapshot::new("POST", "/api")
            .with_header("Content-Type", "application/json")
            .with_body(&br#"{"name":"alice"}"#[..]);
        assert_eq!(engine().first_match(&snapshot), None);
    }

    #[test]
    fn test_clean_request_passes() {
        let snapshot = RequestSnapshot::new("POST", "/login")
            .with_header("Content-Type", "application/json")
            .with_query("next", "home")
            .with_body(&br#"{"name":"alice"}"#[..]);
        assert!(!engine().detect(&snapshot));
    }

    #[test]
    fn test_disabled_engine_matches_nothing() {
        let mut config = StaticRulesConfig::default();
        config.enabled = false;
        let snapshot = RequestSnapshot::new("GET", "/").with_query("q", "<script>alert(1)</script>");
        assert!(!StaticRuleEngine::new(config).detect(&snapshot));
    }

    #[test]
    fn test_scan_cap_bounds_pathological_input() {
        let mut config = StaticRulesConfig::default();
        config.scan_limit = 64;
        let mut body = "x".repeat(200);
        body.push_str("<script>");
        let snapshot = RequestSnapshot::new("POST", "/").with_body(body.into_bytes());
        assert!(!StaticRuleEngine::new(config).detect(&snapshot));
    }
}
