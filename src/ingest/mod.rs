// src/ingest/mod.rs
pub mod cache;
pub mod fetcher;
pub mod providers;
pub mod scheduler;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use sha2::{Digest, Sha256};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_requests_total", "Outbound HTTP attempts per source.");
        describe_counter!("fetch_retries_total", "Retried attempts (429/503/timeout).");
        describe_counter!("fetch_errors_total", "Logical fetches that failed after retries.");
        describe_counter!("cache_hits_total", "Lookups served from a fresh cache entry.");
        describe_counter!("cache_refresh_total", "Successful cache refreshes.");
        describe_counter!(
            "cache_stale_served_total",
            "Lookups served from a stale entry after a failed refresh."
        );
        describe_counter!(
            "connector_errors_total",
            "Connector calls that contributed nothing to a tick."
        );
        describe_counter!("engine_ticks_total", "Completed scoring ticks.");
        describe_counter!("engine_tick_failures_total", "Ticks that published nothing.");
        describe_histogram!("engine_tick_ms", "Scoring tick duration in milliseconds.");
        describe_gauge!("hotspot_region_score", "Latest total score per region.");
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Decode entities, strip tags, normalize quotes, collapse whitespace and cap
/// the result at `max_chars` characters.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, "");

    let quoted = stripped
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let out = RE_WS.replace_all(&quoted, " ");
    let out = out.trim();

    if out.chars().count() > max_chars {
        out.chars().take(max_chars).collect()
    } else {
        out.to_string()
    }
}

/// Short hex digest of the given parts, for upstreams without a stable id.
pub fn stable_id(parts: &[&str]) -> String {
    let mut h = Sha256::new();
    for p in parts {
        h.update(p.as_bytes());
        h.update([0u8]);
    }
    h.finalize()
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Strike&nbsp;&nbsp;on <b>Kharkiv</b></p>\n\n “update” ";
        assert_eq!(clean_text(s, 500), "Strike on Kharkiv \"update\"");
    }

    #[test]
    fn clean_text_caps_length_on_char_boundary() {
        let s = "ž".repeat(20);
        assert_eq!(clean_text(&s, 5).chars().count(), 5);
    }

    #[test]
    fn stable_id_is_deterministic_and_separator_aware() {
        assert_eq!(stable_id(&["a", "b"]), stable_id(&["a", "b"]));
        assert_ne!(stable_id(&["ab", ""]), stable_id(&["a", "b"]));
        assert_eq!(stable_id(&["x"]).len(), 16);
    }
}
