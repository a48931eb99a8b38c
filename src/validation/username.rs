//! Username validation, enforced identically on the client and the server.
//!
//! Beyond shape rules (length, charset, leading letter) usernames are screened
//! against a blocklist of profanity, slurs, harassment and impersonation terms,
//! with leet-speak normalization so `4dm1n` is caught like `admin`.

/// Profanity and obscenities.
const PROFANITY: &[&str] = &[
    "damn", "hell", "crap", "shit", "fuck", "bitch", "ass", "bastard",
    "piss", "dick", "cock", "pussy", "whore", "slut", "fag", "retard",
];

/// Hate speech and slurs.
const HATE_SLURS: &[&str] = &[
    "nigger", "nigga", "chink", "spic", "wetback", "kike", "beaner",
    "gook", "towelhead", "raghead", "cracker", "honkey", "whitey",
    "jap", "paki", "muzzie", "terrorist", "nazi", "hitler",
];

/// Bullying and harassment terms.
const BULLYING: &[&str] = &[
    "loser", "stupid", "idiot", "moron", "dumb", "ugly",
    "kill", "die", "suicide", "rape", "molest", "pedo", "pedophile",
];

/// Sexually explicit terms.
const SEXUAL: &[&str] = &[
    "porn", "sex", "nude", "naked", "boobs", "tits", "penis", "vagina",
    "anal", "masturbate", "orgasm", "horny", "fetish",
];

/// Impersonation risks: official titles and brands.
const IMPERSONATION: &[&str] = &[
    "admin", "moderator", "staff", "official", "support", "system",
    "president", "senator", "congress", "fbi", "cia", "police",
    "google", "facebook", "twitter", "microsoft", "apple",
];

/// Culturally insensitive terms.
const INSENSITIVE: &[&str] = &[
    "jihad", "isis", "taliban", "plantation",
    "genocide", "holocaust", "apartheid", "segregation",
];

const CATEGORIES: &[&[&str]] = &[
    PROFANITY,
    HATE_SLURS,
    BULLYING,
    SEXUAL,
    IMPERSONATION,
    INSENSITIVE,
];

/// Maps common leet substitutions back to letters before blocklist matching.
fn unleet(c: char) -> char {
    match c {
        '0' => 'o',
        '1' => 'i',
        '3' => 'e',
        '4' => 'a',
        '5' => 's',
        '7' => 't',
        '8' => 'b',
        '@' => 'a',
        '$' => 's',
        '!' => 'i',
        other => other.to_ascii_lowercase(),
    }
}

/// Lowercased, leet-normalized form plus a letters-only form for partial matching.
fn normalize(username: &str) -> (String, String) {
    let normalized: String = username.chars().map(unleet).collect();
    let stripped: String = normalized
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect();
    (normalized, stripped)
}

fn contains_blocked_term(username: &str) -> bool {
    let (normalized, stripped) = normalize(username);
    CATEGORIES.iter().any(|category| {
        category
            .iter()
            .any(|term| normalized.contains(term) || stripped.contains(term))
    })
}

/// Run of five or more identical characters (aaaaa, 11111).
fn has_excessive_repetition(username: &str) -> bool {
    let mut run = 0;
    let mut prev = None;
    for c in username.chars() {
        if Some(c) == prev {
            run += 1;
            if run >= 5 {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }
    false
}

/// Test accounts: "test" followed only by digits (test, test1, test123).
fn is_test_account(lower: &str) -> bool {
    lower
        .strip_prefix("test")
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

fn matches_blocked_pattern(username: &str) -> bool {
    let lower = username.to_ascii_lowercase();

    has_excessive_repetition(&lower)
        || lower.chars().all(|c| c.is_ascii_digit())
        || is_test_account(&lower)
        || lower.contains("admin")
        || lower.contains("mod")
        || lower.starts_with("xxx")
        || lower.starts_with("sex")
        || lower.starts_with("porn")
}

/// Validates a username and returns its trimmed form.
///
/// Checks, in order: presence, length (3-50), charset (letters, digits,
/// underscore, hyphen), leading letter, blocklist and pattern screening.
pub fn validate_username(username: &str) -> Result<String, String> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err("Username is required".to_string());
    }

    if trimmed.len() < 3 {
        return Err("Username must be at least 3 characters".to_string());
    }

    if trimmed.len() > 50 {
        return Err("Username must be 50 characters or less".to_string());
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(
            "Username can only contain letters, numbers, underscores, and hyphens".to_string(),
        );
    }

    if !trimmed.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err("Username must start with a letter".to_string());
    }

    if contains_blocked_term(trimmed) {
        return Err("Username contains inappropriate language".to_string());
    }

    if matches_blocked_pattern(trimmed) {
        return Err("Username format is not allowed".to_string());
    }

    Ok(trimmed.to_string())
}
