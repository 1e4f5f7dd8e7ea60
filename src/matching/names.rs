//! Team-name normalization and similarity.

use std::collections::BTreeSet;

/// Lowercase alphanumerics only ("L.A. Lakers" -> "lalakers")
pub fn compact(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lowercase alphanumeric tokens ("Los Angeles Lakers" -> {angeles, lakers, los})
pub fn tokens(name: &str) -> BTreeSet<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// One compact name is contained in the other ("lakers" / "losangeleslakers").
/// Empty names are never equivalent to anything.
pub fn substring_equivalent(a: &str, b: &str) -> bool {
    let (a, b) = (compact(a), compact(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Tokens at least this long may match on spelling rather than equality
const FUZZY_TOKEN_MIN_LEN: usize = 5;
const FUZZY_TOKEN_MIN_SCORE: f64 = 0.95;

/// Jaccard where near-identical long tokens ("timberwolves" / "timberwoves")
/// count as a partial intersection weighted by their Jaro-Winkler score.
/// Each token is matched at most once, best pairs first.
pub fn soft_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let mut candidates: Vec<(f64, &str, &str)> = Vec::new();
    for ta in a {
        for tb in b {
            if ta == tb {
                candidates.push((1.0, ta, tb));
                continue;
            }
            if ta.chars().count() < FUZZY_TOKEN_MIN_LEN || tb.chars().count() < FUZZY_TOKEN_MIN_LEN {
                continue;
            }
            let score = strsim::jaro_winkler(ta, tb);
            if score > FUZZY_TOKEN_MIN_SCORE {
                candidates.push((score, ta, tb));
            }
        }
    }
    candidates.sort_by(|x, y| {
        y.0.total_cmp(&x.0)
            .then_with(|| x.1.cmp(y.1))
            .then_with(|| x.2.cmp(y.2))
    });

    let mut used_a = BTreeSet::new();
    let mut used_b = BTreeSet::new();
    let mut weight = 0.0;
    for (score, ta, tb) in candidates {
        if used_a.contains(ta) || used_b.contains(tb) {
            continue;
        }
        used_a.insert(ta);
        used_b.insert(tb);
        weight += score;
    }

    let union = a.len() + b.len() - used_a.len();
    if union == 0 {
        return 0.0;
    }
    weight / union as f64
}

/// Similarity in [0, 1].
///
/// 1.0 for identical compact forms. When one compact form contains the other
/// ("lakers" in "losangeleslakers") the score is at least
/// `0.5 + 0.5 * shorter / longer`, so a nickname clears the default threshold.
/// Otherwise it is the fuzzy token Jaccard.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let (ca, cb) = (compact(a), compact(b));
    if ca.is_empty() || cb.is_empty() {
        return 0.0;
    }
    if ca == cb {
        return 1.0;
    }
    let tokens_score = soft_jaccard(&tokens(a), &tokens(b));

    let (short, long) = if ca.len() <= cb.len() { (&ca, &cb) } else { (&cb, &ca) };
    let short_len = short.chars().count();
    if short_len >= 3 && long.contains(short.as_str()) {
        let containment = 0.5 + 0.5 * short_len as f64 / long.chars().count() as f64;
        return tokens_score.max(containment);
    }
    tokens_score
}
