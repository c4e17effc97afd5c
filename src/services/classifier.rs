//! Domain classification of exam codes.
//!
//! Exact patterns are tried first (high confidence), then broad patterns
//! (medium confidence); anything else falls back to a default domain with
//! low confidence. The front-end applies the same table, so edits here must
//! be mirrored there.

use regex::{Regex, RegexBuilder};

use crate::error::Result;
use crate::models::Confidence;

/// One `(domain, pattern)` row of a classification table.
#[derive(Debug, Clone, Copy)]
pub struct DomainRule {
    pub domain: &'static str,
    pub pattern: &'static str,
}

const fn rule(domain: &'static str, pattern: &'static str) -> DomainRule {
    DomainRule { domain, pattern }
}

/// Known exam codes, matched exactly.
pub const EXACT_RULES: &[DomainRule] = &[
    rule("ITSM", r"^CIS-ITSM$"),
    rule("ITSM", r"^CIS-EM$"),
    rule("ITSM", r"^CIS-Discovery$"),
    rule("ITSM", r"^CIS-SM$"),
    rule("Security", r"^CIS-SIR$"),
    rule("Security", r"^CIS-VR$"),
    rule("Security", r"^CIS-VRM$"),
    rule("Security", r"^CIS-RC$"),
    rule("HR", r"^CIS-HR$"),
    rule("Asset Management", r"^CIS-HAM$"),
    rule("Asset Management", r"^CIS-SAM$"),
    rule("Service Management", r"^CIS-CSM$"),
    rule("Service Management", r"^CIS-FSM$"),
    rule("Portfolio Management", r"^CIS-PPM$"),
    rule("Portfolio Management", r"^CIS-SPM$"),
    rule("Portfolio Management", r"^CIS-APM$"),
    rule("Development", r"^CAD$"),
    rule("Development", r"^CAS-PA$"),
    rule("Infrastructure", r"^CSA$"),
    rule("Infrastructure", r"^CIS-CPG$"),
];

/// Patterns for codes not in [`EXACT_RULES`] yet.
pub const BROAD_RULES: &[DomainRule] = &[
    rule("ITSM", r"^CIS-.*ITSM.*$"),
    rule("Security", r"^CIS-.*(SIR|SEC|VR|VRM|RC).*$"),
    rule("HR", r"^CIS-.*HR.*$"),
    rule("Asset Management", r"^CIS-.*(HAM|SAM|ASSET).*$"),
    rule("Service Management", r"^CIS-.*(CSM|FSM|SERVICE).*$"),
    rule("Portfolio Management", r"^CIS-.*(PPM|SPM|APM|PORTFOLIO).*$"),
    rule("Development", r"^(CAD|CAS|DEV).*$"),
    rule("Infrastructure", r"^(CSA|INFRA|SYS).*$"),
];

/// Domain of codes no pattern matches.
pub const FALLBACK_DOMAIN: &str = "Infrastructure";

/// Outcome of classifying one exam code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub domain: String,
    pub confidence: Confidence,
}

/// Compiled classification table. Stateless once built.
#[derive(Debug, Clone)]
pub struct DomainTable {
    exact: Vec<(String, Regex)>,
    broad: Vec<(String, Regex)>,
    fallback: String,
}

impl DomainTable {
    /// Compile a table; patterns match case-insensitively.
    pub fn new(exact: &[DomainRule], broad: &[DomainRule], fallback: &str) -> Result<Self> {
        Ok(Self {
            exact: compile(exact)?,
            broad: compile(broad)?,
            fallback: fallback.to_string(),
        })
    }

    /// The table shared with the front-end.
    pub fn builtin() -> Result<Self> {
        Self::new(EXACT_RULES, BROAD_RULES, FALLBACK_DOMAIN)
    }

    /// Classify an exam code. Total: every input yields one detection.
    pub fn classify(&self, code: &str) -> Detection {
        let tiers = [
            (&self.exact, Confidence::High),
            (&self.broad, Confidence::Medium),
        ];

        for (rules, confidence) in tiers {
            if let Some((domain, _)) = rules.iter().find(|(_, re)| re.is_match(code)) {
                return Detection {
                    domain: domain.clone(),
                    confidence,
                };
            }
        }

        Detection {
            domain: self.fallback.clone(),
            confidence: Confidence::Low,
        }
    }
}

fn compile(rules: &[DomainRule]) -> Result<Vec<(String, Regex)>> {
    rules
        .iter()
        .map(|r| {
            let re = RegexBuilder::new(r.pattern).case_insensitive(true).build()?;
            Ok((r.domain.to_string(), re))
        })
        .collect()
}

/// Reference cases the table must satisfy: `(code, domain, confidence)`.
pub const REFERENCE_CASES: &[(&str, &str, Confidence)] = &[
    ("CIS-ITSM", "ITSM", Confidence::High),
    ("CIS-SIR", "Security", Confidence::High),
    ("CIS-HR", "HR", Confidence::High),
    ("CIS-HAM", "Asset Management", Confidence::High),
    ("CIS-CSM", "Service Management", Confidence::High),
    ("CIS-PPM", "Portfolio Management", Confidence::High),
    ("CAD", "Development", Confidence::High),
    ("CSA", "Infrastructure", Confidence::High),
    ("UNKNOWN-EXAM", "Infrastructure", Confidence::Low),
    ("CIS-NEW-SECURITY", "Security", Confidence::Medium),
    ("TOTALLY-UNKNOWN", "Infrastructure", Confidence::Low),
];
