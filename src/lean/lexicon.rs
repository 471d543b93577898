//! Curated phrase, entity and negation term lists for the heuristic
//! scorer. All entries are lowercase; multi-word phrases match token
//! sequences, not substrings.

/// Phrases whose unnegated presence nudges the score right.
pub const RIGHT_KEYWORDS: &[&str] = &[
    "border security",
    "illegal immigration",
    "second amendment",
    "gun rights",
    "tax cuts",
    "school choice",
    "law and order",
    "small government",
    "religious freedom",
    "parental rights",
    "america first",
    "energy independence",
];

/// Phrases whose unnegated presence nudges the score left.
pub const LEFT_KEYWORDS: &[&str] = &[
    "climate crisis",
    "gun control",
    "reproductive rights",
    "medicare for all",
    "social justice",
    "income inequality",
    "living wage",
    "voting rights",
    "universal healthcare",
    "green new deal",
    "systemic racism",
    "wealth tax",
];

/// Figures and organizations counted as right-pole mentions.
pub const RIGHT_ENTITIES: &[&str] = &[
    "trump",
    "desantis",
    "ted cruz",
    "mitch mcconnell",
    "heritage foundation",
    "freedom caucus",
    "maga",
];

/// Figures and organizations counted as left-pole mentions.
pub const LEFT_ENTITIES: &[&str] = &[
    "biden",
    "bernie sanders",
    "elizabeth warren",
    "ocasio cortez",
    "progressive caucus",
    "planned parenthood",
    "aclu",
];

/// Negation/contrast terms checked in the window preceding a keyword.
/// Mentions of entities are deliberately not negation-checked.
pub fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "oppose"
            | "opposes"
            | "opposed"
            | "opposing"
            | "against"
            | "criticize"
            | "criticizes"
            | "criticized"
            | "reject"
            | "rejects"
            | "rejected"
            | "condemn"
            | "condemns"
            | "condemned"
            | "deny"
            | "denies"
            | "denied"
            | "anti"
    )
}
