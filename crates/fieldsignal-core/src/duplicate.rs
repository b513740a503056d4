use std::collections::HashSet;

const JACCARD_THRESHOLD: f64 = 0.9;
const NGRAM_SIZE: usize = 5;

/// Two evidence strings are duplicates when their normalised 5-gram Jaccard
/// similarity is `>= 0.9`, or when the URLs are an exact match.
pub fn is_duplicate(new_text: &str, new_url: Option<&str>, previous: &[(String, Option<String>)]) -> bool {
    if let Some(url) = new_url {
        if previous.iter().any(|(_, prev_url)| prev_url.as_deref() == Some(url)) {
            return true;
        }
    }
    previous
        .iter()
        .any(|(prev_text, _)| jaccard_5gram(new_text, prev_text) >= JACCARD_THRESHOLD)
}

fn normalise(text: &str) -> Vec<String> {
    let lowered = text.trim().to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

fn ngrams(words: &[String], n: usize) -> HashSet<String> {
    if words.len() < n {
        return HashSet::from([words.join(" ")]);
    }
    words.windows(n).map(|w| w.join(" ")).collect()
}

fn jaccard_5gram(a: &str, b: &str) -> f64 {
    let grams_a = ngrams(&normalise(a), NGRAM_SIZE);
    let grams_b = ngrams(&normalise(b), NGRAM_SIZE);
    if grams_a.is_empty() && grams_b.is_empty() {
        return 1.0;
    }
    let intersection = grams_a.intersection(&grams_b).count();
    let union = grams_a.union(&grams_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}
