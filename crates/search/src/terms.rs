//! Request terms matched against candidate paths.

const MIN_TERM_LEN: usize = 3;
const MAX_TERMS: usize = 16;

const STOPWORDS: &[&str] = &[
    // English.
    "and", "are", "can", "does", "for", "from", "how", "into", "not", "please", "should", "that",
    "the", "this", "what", "when", "where", "which", "why", "with", "you", "your",
    // Request noise.
    "add", "change", "code", "file", "files", "fix", "function", "help", "make", "method",
    "update", "use", "write",
    // Path noise.
    "crates", "docs", "lib", "src", "test", "tests",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.iter().any(|w| *w == token)
}

/// Lower-cased identifier-ish tokens of `request`, first occurrence order.
pub fn query_terms(request: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in request.split(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '-')) {
        let token = token.trim_matches('-').to_lowercase();
        if token.chars().count() < MIN_TERM_LEN || is_stopword(&token) {
            continue;
        }
        if token.chars().all(|ch| ch.is_ascii_digit()) {
            continue;
        }
        if !terms.contains(&token) {
            terms.push(token);
        }
        if terms.len() == MAX_TERMS {
            break;
        }
    }
    terms
}

/// How many of `terms` occur in `path`, case-insensitively.
pub fn matching_terms(path: &str, terms: &[String]) -> usize {
    if terms.is_empty() {
        return 0;
    }
    let lowered = path.to_lowercase();
    terms
        .iter()
        .filter(|term| lowered.contains(term.as_str()))
        .count()
}
