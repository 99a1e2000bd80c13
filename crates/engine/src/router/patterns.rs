use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use neo_common::types::{Intent, SourceId};

use crate::semantic::escape_like;

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid router pattern")
}

// ---------------------------------------------------------------------------
// Keyword source detection
// ---------------------------------------------------------------------------

const SOURCE_KEYWORDS: &[(SourceId, &[&str])] = &[
    (
        SourceId::Researchers,
        &[
            "researcher",
            "scientist",
            "h-index",
            "h index",
            "talent",
            "professor",
            "rising star",
            "hidden gem",
            "academic",
        ],
    ),
    (
        SourceId::Patents,
        &["patent", "inventor", "assignee", "cpc", "intellectual property"],
    ),
    (
        SourceId::Grants,
        &["grant", "funding", "nih", "sbir", "sttr", "principal investigator", "r01"],
    ),
    (
        SourceId::SecSentinel,
        &[
            "sec ", "filing", "10-k", "10-q", "8-k", "s-3", "form 4", "insider", "runway",
            "ticker",
        ],
    ),
    (
        SourceId::MarketData,
        &["clinical trial", "trial", "fda", "phase", "nct", "sponsor", "enrollment"],
    ),
    (
        SourceId::Portfolio,
        &["portfolio", "modality", "our companies"],
    ),
    (
        SourceId::Policies,
        &["bill", "policy", "policies", "legislation", "regulatory", "congress"],
    ),
];

/// Substring keyword scan over the lowercased question.
pub fn detect_sources(question: &str) -> Vec<SourceId> {
    let lowered = question.to_lowercase();
    SOURCE_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(source, _)| *source)
        .collect()
}

// ---------------------------------------------------------------------------
// Intent detection
// ---------------------------------------------------------------------------

static INTENT_PATTERNS: Lazy<Vec<(Intent, Regex)>> = Lazy::new(|| {
    vec![
        (Intent::Count, regex(r"\bhow many\b|\bcount\b|\bnumber of\b")),
        (Intent::TopN, regex(r"\btop\s+\d+\b|\btop\b|\bbest\b|\bleading\b")),
        (Intent::List, regex(r"\blist\b|\bshow me\b|\bwhat are\b")),
        (
            Intent::Compare,
            regex(r"\bcompare\b|\bversus\b|\bvs\.?\b|\bdifference between\b"),
        ),
        (
            Intent::Lookup,
            regex(r"\bwho is\b|\bwhat is\b|\btell me about\b|\bprofile\b|\binfo on\b"),
        ),
        (
            Intent::Aggregate,
            regex(r"\bby (status|phase|sponsor|institute|category|mechanism)\b|\bbreakdown\b|\btotal\b|\bsum\b|\baverage\b"),
        ),
        (
            Intent::Filter,
            regex(r"\bat least\b|\bmore than\b|\bless than\b|\bover \d+\b|\bunder \d+\b|\bsince\b"),
        ),
        (
            Intent::CrossDb,
            regex(r"\bacross\b|\ball (databases|sources)\b|\band also\b"),
        ),
    ]
});

/// Regex bucket scan over the lowercased question.
pub fn detect_intents(question: &str) -> Vec<Intent> {
    let lowered = question.to_lowercase();
    INTENT_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&lowered))
        .map(|(intent, _)| *intent)
        .collect()
}

// ---------------------------------------------------------------------------
// Tier 1 — direct lookups
// ---------------------------------------------------------------------------

pub struct Tier1Pattern {
    pub regex: Regex,
    pub source: SourceId,
    /// None means "list the source's tables" instead of running SQL.
    pub sql: Option<&'static str>,
}

pub static TIER1_PATTERNS: Lazy<Vec<Tier1Pattern>> = Lazy::new(|| {
    vec![
        Tier1Pattern {
            regex: regex(r"how many hidden gems?"),
            source: SourceId::Researchers,
            sql: Some(
                "SELECT COUNT(*) as count FROM researchers WHERE slope > 3 AND h_index BETWEEN 20 AND 60",
            ),
        },
        Tier1Pattern {
            regex: regex(r"how many (researchers?|scientists?)"),
            source: SourceId::Researchers,
            sql: Some("SELECT COUNT(*) as count FROM researchers"),
        },
        Tier1Pattern {
            regex: regex(r"how many patents?"),
            source: SourceId::Patents,
            sql: Some("SELECT COUNT(*) as count FROM patents"),
        },
        Tier1Pattern {
            regex: regex(r"how many grants?"),
            source: SourceId::Grants,
            sql: Some("SELECT COUNT(*) as count FROM grants"),
        },
        Tier1Pattern {
            regex: regex(r"how many (companies|portfolio)"),
            source: SourceId::Portfolio,
            sql: Some("SELECT COUNT(*) as count FROM companies"),
        },
        Tier1Pattern {
            regex: regex(r"how many (bills?|policies)"),
            source: SourceId::Policies,
            sql: Some("SELECT COUNT(*) as count FROM bills"),
        },
        Tier1Pattern {
            regex: regex(r"how many (clinical )?trials?"),
            source: SourceId::MarketData,
            sql: Some("SELECT COUNT(*) as count FROM clinical_trials"),
        },
        Tier1Pattern {
            regex: regex(r"total (grant )?funding"),
            source: SourceId::Grants,
            sql: Some(
                "SELECT SUM(total_cost) as total_funding FROM grants WHERE total_cost > 0",
            ),
        },
        Tier1Pattern {
            regex: regex(r"what tables.*(researchers?|talent)"),
            source: SourceId::Researchers,
            sql: None,
        },
        Tier1Pattern {
            regex: regex(r"what tables.*patents?"),
            source: SourceId::Patents,
            sql: None,
        },
        Tier1Pattern {
            regex: regex(r"what tables.*grants?"),
            source: SourceId::Grants,
            sql: None,
        },
        Tier1Pattern {
            regex: regex(r"what tables.*portfolio"),
            source: SourceId::Portfolio,
            sql: None,
        },
        Tier1Pattern {
            regex: regex(r"what tables.*(policies|bills?)"),
            source: SourceId::Policies,
            sql: None,
        },
        Tier1Pattern {
            regex: regex(r"what tables.*(market|trials?)"),
            source: SourceId::MarketData,
            sql: None,
        },
    ]
});

// ---------------------------------------------------------------------------
// Tier 2 — parameterized templates
// ---------------------------------------------------------------------------

pub struct Tier2Pattern {
    pub regex: Regex,
    pub source: SourceId,
    /// Template instantiation. Every template selects `id` so that entity
    /// links can be built from the result rows.
    pub build: fn(&Captures) -> String,
}

fn rising_stars_sql(caps: &Captures) -> String {
    let field = escape_like(caps.name("field").map_or("", |m| m.as_str()));
    format!(
        "SELECT id, name, h_index, slope, primary_category, affiliations \
         FROM researchers \
         WHERE slope > 3 AND h_index BETWEEN 20 AND 60 \
         AND (topics LIKE '%{field}%' OR primary_category LIKE '%{field}%') \
         ORDER BY slope DESC LIMIT 10"
    )
}

fn top_researchers_sql(caps: &Captures) -> String {
    let field = escape_like(caps.name("field").map_or("", |m| m.as_str()));
    let n: usize = caps
        .name("n")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(10);
    format!(
        "SELECT id, name, h_index, slope, primary_category, affiliations \
         FROM researchers \
         WHERE topics LIKE '%{field}%' OR primary_category LIKE '%{field}%' \
         ORDER BY h_index DESC LIMIT {}",
        n.min(50)
    )
}

fn trials_for_condition_sql(caps: &Captures) -> String {
    let condition = escape_like(caps.name("condition").map_or("", |m| m.as_str()).trim());
    format!(
        "SELECT id, nct_id, brief_title, status, phase, sponsor \
         FROM clinical_trials \
         WHERE conditions LIKE '%{condition}%' OR brief_title LIKE '%{condition}%' \
         ORDER BY start_date DESC LIMIT 10"
    )
}

fn trials_by_sponsor_sql(caps: &Captures) -> String {
    let sponsor = escape_like(caps.name("sponsor").map_or("", |m| m.as_str()));
    format!(
        "SELECT id, nct_id, brief_title, status, phase, sponsor \
         FROM clinical_trials \
         WHERE sponsor LIKE '%{sponsor}%' \
         ORDER BY start_date DESC LIMIT 10"
    )
}

fn patents_for_company_sql(caps: &Captures) -> String {
    let company = escape_like(caps.name("company").map_or("", |m| m.as_str()));
    format!(
        "SELECT id, title, patent_number, filing_date, primary_assignee \
         FROM patents \
         WHERE primary_assignee LIKE '%{company}%' OR title LIKE '%{company}%' \
         ORDER BY filing_date DESC LIMIT 10"
    )
}

fn grants_for_field_sql(caps: &Captures) -> String {
    let field = escape_like(caps.name("field").map_or("", |m| m.as_str()));
    format!(
        "SELECT id, title, total_cost, institute, fiscal_year \
         FROM grants \
         WHERE title LIKE '%{field}%' OR abstract LIKE '%{field}%' \
         ORDER BY total_cost DESC LIMIT 10"
    )
}

fn portfolio_company_sql(caps: &Captures) -> String {
    let company = escape_like(caps.name("company").map_or("", |m| m.as_str()));
    format!(
        "SELECT id, name, modality, competitive_advantage, indications \
         FROM companies \
         WHERE name LIKE '%{company}%' \
         LIMIT 1"
    )
}

pub static TIER2_PATTERNS: Lazy<Vec<Tier2Pattern>> = Lazy::new(|| {
    vec![
        Tier2Pattern {
            regex: regex(
                r"(rising stars?|hidden gems?|fast[- ]?growing).*(?:in|for|about) (?P<field>[a-zA-Z]+)",
            ),
            source: SourceId::Researchers,
            build: rising_stars_sql,
        },
        Tier2Pattern {
            regex: regex(r"top (?P<n>\d+)? ?researchers?.*(?:in|for|about) (?P<field>[a-zA-Z]+)"),
            source: SourceId::Researchers,
            build: top_researchers_sql,
        },
        Tier2Pattern {
            regex: regex(r"trials?\s+(?:by|from|sponsored by)\s+(?P<sponsor>\w+)"),
            source: SourceId::MarketData,
            build: trials_by_sponsor_sql,
        },
        Tier2Pattern {
            regex: regex(
                r"(?:clinical )?trials?.*(?:for|about|on) (?P<condition>[a-zA-Z][a-zA-Z' -]+)",
            ),
            source: SourceId::MarketData,
            build: trials_for_condition_sql,
        },
        Tier2Pattern {
            regex: regex(r"patents?.*(?:for|from|by) (?P<company>\w+)"),
            source: SourceId::Patents,
            build: patents_for_company_sql,
        },
        Tier2Pattern {
            regex: regex(r"grants?.*(?:in|for|about) (?P<field>\w+)"),
            source: SourceId::Grants,
            build: grants_for_field_sql,
        },
        Tier2Pattern {
            regex: regex(r"(?:what is|tell me about|info on) (?P<company>\w+)"),
            source: SourceId::Portfolio,
            build: portfolio_company_sql,
        },
    ]
});

// ---------------------------------------------------------------------------
// Cross-database hints
// ---------------------------------------------------------------------------

pub struct CrossDbPattern {
    pub regex: Regex,
    pub suggested_queries: &'static [&'static str],
}

pub static CROSS_DB_PATTERNS: Lazy<Vec<CrossDbPattern>> = Lazy::new(|| {
    vec![
        CrossDbPattern {
            regex: regex(r"researchers? with patents?"),
            suggested_queries: &[
                "search_entity on the researcher name to see patent coverage",
                "query_patents joining inventors by researcher name",
            ],
        },
        CrossDbPattern {
            regex: regex(r"patents? and grants?|grants? and patents?"),
            suggested_queries: &[
                "get_company_profile for the organization",
                "get_patent_portfolio plus get_funding_summary",
            ],
        },
        CrossDbPattern {
            regex: regex(r"trials? (?:by|from|for) (?:the )?portfolio"),
            suggested_queries: &[
                "query_portfolio for company names, then query_market_data on sponsor",
            ],
        },
        CrossDbPattern {
            regex: regex(r"compare .*(?:across|between)"),
            suggested_queries: &["run the same semantic function per entity and compare"],
        },
        CrossDbPattern {
            regex: regex(r"across all (?:databases|sources)"),
            suggested_queries: &["search_entity fans out across every database"],
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_detection_finds_sources() {
        let detected = detect_sources("Which researchers hold patents in gene therapy?");
        assert!(detected.contains(&SourceId::Researchers));
        assert!(detected.contains(&SourceId::Patents));
        assert!(!detected.contains(&SourceId::Policies));
    }

    #[test]
    fn intent_detection_buckets() {
        let intents = detect_intents("How many trials are recruiting?");
        assert!(intents.contains(&Intent::Count));

        let intents = detect_intents("Top 5 researchers in immunology");
        assert!(intents.contains(&Intent::TopN));

        let intents = detect_intents("grants by institute");
        assert!(intents.contains(&Intent::Aggregate));
    }

    #[test]
    fn tier1_count_patterns_match() {
        let q = "how many patents?";
        let hit = TIER1_PATTERNS.iter().find(|p| p.regex.is_match(q)).unwrap();
        assert_eq!(hit.source, SourceId::Patents);
        assert_eq!(hit.sql, Some("SELECT COUNT(*) as count FROM patents"));
    }

    #[test]
    fn tier1_hidden_gems_wins_over_generic_count() {
        let q = "how many hidden gems do we track?";
        let hit = TIER1_PATTERNS.iter().find(|p| p.regex.is_match(q)).unwrap();
        assert!(hit.sql.unwrap().contains("slope > 3"));
    }

    #[test]
    fn tier1_table_listing_has_no_sql() {
        let q = "what tables are in the patents database?";
        let hit = TIER1_PATTERNS.iter().find(|p| p.regex.is_match(q)).unwrap();
        assert_eq!(hit.source, SourceId::Patents);
        assert!(hit.sql.is_none());
    }

    #[test]
    fn rising_stars_template_includes_id_and_filters() {
        let q = "rising stars in immunology";
        let pattern = TIER2_PATTERNS
            .iter()
            .find(|p| p.regex.is_match(q))
            .unwrap();
        let caps = pattern.regex.captures(q).unwrap();
        let sql = (pattern.build)(&caps);
        assert!(sql.starts_with("SELECT id,"));
        assert!(sql.contains("slope > 3 AND h_index BETWEEN 20 AND 60"));
        assert!(sql.contains("topics LIKE '%immunology%' OR primary_category LIKE '%immunology%'"));
        assert!(sql.contains("ORDER BY slope DESC LIMIT 10"));
    }

    #[test]
    fn top_n_template_respects_requested_count() {
        let q = "top 5 researchers in neuroscience";
        let pattern = TIER2_PATTERNS
            .iter()
            .find(|p| p.regex.is_match(q))
            .unwrap();
        let caps = pattern.regex.captures(q).unwrap();
        let sql = (pattern.build)(&caps);
        assert!(sql.contains("ORDER BY h_index DESC LIMIT 5"));
    }

    #[test]
    fn like_values_are_quote_escaped() {
        let q = "grants for parkinson's";
        let pattern = TIER2_PATTERNS
            .iter()
            .find(|p| p.regex.is_match(q) && p.source == SourceId::Grants)
            .unwrap();
        let caps = pattern.regex.captures(q).unwrap();
        let sql = (pattern.build)(&caps);
        // \w+ stops at the apostrophe, so the bound value stays clean.
        assert!(sql.contains("'%parkinson%'"));
        assert!(!sql.contains("''"));
    }

    #[test]
    fn cross_db_patterns_carry_suggestions() {
        let q = "which researchers with patents also have nih grants";
        let hit = CROSS_DB_PATTERNS.iter().find(|p| p.regex.is_match(q)).unwrap();
        assert!(!hit.suggested_queries.is_empty());
    }

    #[test]
    fn classification_order_prefers_tier1() {
        // A question matching both a tier-1 count and a tier-2 template must
        // resolve through tier 1 (the router checks tier 1 first).
        let q = "how many patents for moderna";
        assert!(TIER1_PATTERNS.iter().any(|p| p.regex.is_match(q)));
        assert!(TIER2_PATTERNS.iter().any(|p| p.regex.is_match(q)));
    }
}
