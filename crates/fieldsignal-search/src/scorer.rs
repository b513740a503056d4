use fieldsignal_common::HopType;
use url::Url;

const FORBIDDEN_PATH_FRAGMENTS: &[&str] = &["/about", "/contact"];
const FORBIDDEN_HOST_FRAGMENTS: &[&str] = &[
    "apps.apple.com",
    "play.google.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "tiktok.com",
];

const MAJOR_GTLDS: &[&str] = &["com", "org", "net", "io", "co"];

/// `score(url, hop_type, entity_name, title, snippet) -> [0,1]`.
/// Rule-based, additive, capped at 1.0; forbidden channels are
/// clamped to at most 0.1 regardless of any other feature.
pub fn score_url(url: &str, hop_type: HopType, entity_name: &str, title: &str, snippet: &str) -> f64 {
    if is_forbidden_channel(url) {
        return 0.1;
    }

    let mut score = 0.0;
    let haystack = format!("{url} {title} {snippet}").to_lowercase();

    if hop_type.keywords().iter().any(|kw| haystack.contains(kw)) {
        score += 0.5;
    }

    if matches_entity(url, title, entity_name) {
        score += 0.2;
    }

    if has_valid_tld(url) && url.len() > 10 {
        score += 0.1;
    }

    score.min(1.0)
}

fn is_forbidden_channel(url: &str) -> bool {
    let lowered = url.to_lowercase();
    if FORBIDDEN_HOST_FRAGMENTS.iter().any(|h| lowered.contains(h)) {
        return true;
    }
    FORBIDDEN_PATH_FRAGMENTS.iter().any(|p| lowered.contains(p))
}

fn matches_entity(url: &str, title: &str, entity_name: &str) -> bool {
    if entity_name.is_empty() {
        return false;
    }
    let slug = fieldsignal_common::slugify(entity_name);
    let lowered_url = url.to_lowercase();
    let lowered_title = title.to_lowercase();
    let lowered_name = entity_name.to_lowercase();
    lowered_url.contains(&slug) || lowered_url.contains(&lowered_name) || lowered_title.contains(&lowered_name)
}

fn has_valid_tld(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let Some(tld) = host.rsplit('.').next() else {
        return false;
    };
    let tld = tld.to_lowercase();
    tld.len() == 2 || MAJOR_GTLDS.contains(&tld.as_str())
}

/// Picks the argmax; on ties prefers the earlier-ranked result.
pub fn pick_best<'a>(
    results: &'a [fieldsignal_common::SearchResult],
    hop_type: HopType,
    entity_name: &str,
) -> Option<&'a fieldsignal_common::SearchResult> {
    results
        .iter()
        .map(|r| (r, score_url(&r.url, hop_type, entity_name, &r.title, &r.snippet)))
        .fold(None, |best: Option<(&fieldsignal_common::SearchResult, f64)>, (r, s)| match best {
            None => Some((r, s)),
            Some((br, bs)) => {
                if s > bs || (s == bs && r.rank < br.rank) {
                    Some((r, s))
                } else {
                    Some((br, bs))
                }
            }
        })
        .map(|(r, _)| r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_channel_is_capped_at_point_one() {
        let s = score_url(
            "https://www.facebook.com/arsenal/about",
            HopType::RfpPage,
            "Arsenal FC",
            "Arsenal FC tender procurement rfp",
            "tender procurement",
        );
        assert!(s <= 0.1);
    }

    #[test]
    fn rfp_keyword_and_entity_and_tld_stack() {
        let s = score_url(
            "https://www.arsenal.com/procurement/tender",
            HopType::RfpPage,
            "Arsenal FC",
            "Arsenal FC Procurement Tender",
            "open tender for kit supplier",
        );
        assert!((s - 0.8).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn tie_prefers_earlier_rank() {
        let results = vec![
            fieldsignal_common::SearchResult {
                url: "https://example.com/x".to_string(),
                title: "x".to_string(),
                snippet: "".to_string(),
                rank: 2,
            },
            fieldsignal_common::SearchResult {
                url: "https://example.org/y".to_string(),
                title: "y".to_string(),
                snippet: "".to_string(),
                rank: 1,
            },
        ];
        let best = pick_best(&results, HopType::RfpPage, "Acme").unwrap();
        assert_eq!(best.rank, 1);
    }
}
