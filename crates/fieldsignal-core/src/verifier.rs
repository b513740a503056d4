use chrono::Utc;
use fieldsignal_common::Evidence;
use reqwest::Client;
use tracing::warn;
use uuid::Uuid;

const OFFICIAL_TLDS: &[&str] = &["org", "gov"];
const MAJOR_PRESS_HOSTS: &[&str] = &["reuters.com", "espn.com", "bbc.com", "apnews.com", "sportingnews.com"];
const AGGREGATOR_HOSTS: &[&str] = &["blogspot.com", "medium.com", "wordpress.com"];
const SOCIAL_HOSTS: &[&str] = &["facebook.com", "twitter.com", "x.com", "instagram.com", "tiktok.com"];

/// For each evidence item: checks URL reachability and scores source
/// credibility. Best-effort — a failed check downgrades
/// credibility, it never aborts the run.
pub struct EvidenceVerifier {
    http: Client,
}

impl Default for EvidenceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceVerifier {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
        }
    }

    /// Builds a verified `Evidence` record from a raw quote/URL pair.
    pub async fn verify(&self, signal_id: Uuid, source: &str, source_url: &str, extracted_text: &str) -> Evidence {
        let accessible = self.check_accessible(source_url).await;
        let credibility_score = credibility_score(source_url, accessible);
        let verified = accessible && credibility_score >= 0.4;

        Evidence {
            id: Uuid::new_v4(),
            signal_id,
            source: source.to_string(),
            source_url: source_url.to_string(),
            date: Utc::now(),
            extracted_text: extracted_text.to_string(),
            credibility_score,
            verified,
            accessible,
        }
    }

    async fn check_accessible(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(response) => {
                let status_ok = response.status().is_success() || response.status().is_redirection();
                let content_type_ok = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|ct| ct.starts_with("text/") || ct.contains("json") || ct.contains("xml"))
                    .unwrap_or(true);
                status_ok && content_type_ok
            }
            Err(e) => {
                warn!(url, error = %e, "evidence reachability check failed");
                false
            }
        }
    }
}

/// Source whitelist + TLD heuristic: official sites > major press >
/// aggregators > social. Placeholder or unreachable URLs get `<= 0.2`.
fn credibility_score(url: &str, accessible: bool) -> f64 {
    if !accessible {
        return 0.1;
    }
    let Ok(parsed) = url::Url::parse(url) else {
        return 0.1;
    };
    let Some(host) = parsed.host_str() else {
        return 0.1;
    };
    let host = host.to_lowercase();

    if SOCIAL_HOSTS.iter().any(|h| host.ends_with(h)) {
        return 0.2;
    }
    if AGGREGATOR_HOSTS.iter().any(|h| host.ends_with(h)) {
        return 0.45;
    }
    if MAJOR_PRESS_HOSTS.iter().any(|h| host.ends_with(h)) {
        return 0.75;
    }
    let tld = host.rsplit('.').next().unwrap_or("");
    if OFFICIAL_TLDS.contains(&tld) {
        return 0.9;
    }
    0.6
}
