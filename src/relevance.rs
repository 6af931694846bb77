// src/relevance.rs
//! Region classifier: tokenizer, keyword tables (TOML or built-in), blocklist,
//! relevance gates and weighted region scoring.
//!
//! A keyword's weight is its word count, so "strait of hormuz" (3) beats a
//! stray "iran" (1). A text classifies to the best-scoring region only when
//! that score reaches `min_score`; otherwise it stays unclassified.

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::region::Region;

pub const DEFAULT_MIN_SCORE: u32 = 2;

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)[\p{L}\p{N}]+").expect("token regex"));

/// Lowercased alphanumeric tokens. Punctuation and dashes split tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    RE_TOKEN
        .find_iter(input)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    pub regions: BTreeMap<Region, Vec<String>>,
    #[serde(default)]
    pub blocklist: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub military_context: Vec<String>,
    #[serde(default)]
    pub conflict_terms: Vec<String>,
    #[serde(default)]
    pub country_terms: Vec<String>,
}

fn default_min_score() -> u32 {
    DEFAULT_MIN_SCORE
}

/* ----------------------------
Compiled structures
---------------------------- */

#[derive(Debug, Clone)]
struct Phrase {
    tokens: Vec<String>,
    weight: u32,
}

impl Phrase {
    fn compile(raw: &str) -> Option<Self> {
        let tokens = tokenize(raw);
        if tokens.is_empty() {
            return None;
        }
        let weight = raw.split_whitespace().count().max(1) as u32;
        Some(Self { tokens, weight })
    }

    fn found_in(&self, hay: &[String]) -> bool {
        let n = self.tokens.len();
        n <= hay.len() && hay.windows(n).any(|w| w == self.tokens.as_slice())
    }
}

fn compile_all(list: &[String]) -> Vec<Phrase> {
    list.iter().filter_map(|s| Phrase::compile(s)).collect()
}

fn any_found(list: &[Phrase], hay: &[String]) -> bool {
    list.iter().any(|p| p.found_in(hay))
}

#[derive(Debug, Clone)]
pub struct RegionClassifier {
    min_score: u32,
    regions: Vec<(Region, Vec<Phrase>)>,
    blocklist: Vec<Phrase>,
    triggers: Vec<Phrase>,
    military_context: Vec<Phrase>,
    conflict_terms: Vec<Phrase>,
    country_terms: Vec<Phrase>,
}

impl Default for RegionClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RegionClassifier {
    pub fn from_config(cfg: &ClassifierConfig) -> Self {
        // Keep Region::ALL order regardless of map order in the file.
        let regions = Region::ALL
            .into_iter()
            .filter_map(|r| cfg.regions.get(&r).map(|kws| (r, compile_all(kws))))
            .collect();
        Self {
            min_score: cfg.min_score.max(1),
            regions,
            blocklist: compile_all(&cfg.blocklist),
            triggers: compile_all(&cfg.triggers),
            military_context: compile_all(&cfg.military_context),
            conflict_terms: compile_all(&cfg.conflict_terms),
            country_terms: compile_all(&cfg.country_terms),
        }
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: ClassifierConfig = toml::from_str(s).context("parsing classifier toml")?;
        Ok(Self::from_config(&cfg))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading classifier config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Built-in keyword tables used when no config file is given.
    pub fn builtin() -> Self {
        Self::from_config(&builtin_config())
    }

    /// Weighted keyword score per region; regions with no hit are omitted.
    pub fn score(&self, text: &str) -> BTreeMap<Region, u32> {
        let hay = tokenize(text);
        self.score_tokens(&hay)
    }

    fn score_tokens(&self, hay: &[String]) -> BTreeMap<Region, u32> {
        let mut out = BTreeMap::new();
        for (region, phrases) in &self.regions {
            let s: u32 = phrases
                .iter()
                .filter(|p| p.found_in(hay))
                .map(|p| p.weight)
                .sum();
            if s > 0 {
                out.insert(*region, s);
            }
        }
        out
    }

    /// Best region, or `None` when blocked or below threshold.
    /// Ties go to the region listed first in `Region::ALL`.
    pub fn classify(&self, text: &str) -> Option<Region> {
        let hay = tokenize(text);
        if any_found(&self.blocklist, &hay) {
            return None;
        }
        let scores = self.score_tokens(&hay);
        let mut best: Option<(Region, u32)> = None;
        for (r, s) in scores {
            if best.is_none_or(|(_, b)| s > b) {
                best = Some((r, s));
            }
        }
        best.filter(|(_, s)| *s >= self.min_score).map(|(r, _)| r)
    }

    /// Blocklist hit (sports, entertainment, crypto noise).
    pub fn exclude(&self, text: &str) -> bool {
        any_found(&self.blocklist, &tokenize(text))
    }

    /// Broad-feed gate: any region keyword, or a trigger word in a military context.
    pub fn is_relevant(&self, text: &str) -> bool {
        let hay = tokenize(text);
        if self.regions.iter().any(|(_, p)| any_found(p, &hay)) {
            return true;
        }
        any_found(&self.triggers, &hay) && any_found(&self.military_context, &hay)
    }

    /// Market-question gate: not blocked, and either a region keyword or a
    /// conflict term together with a country term.
    pub fn is_geopolitical(&self, text: &str) -> bool {
        let hay = tokenize(text);
        if any_found(&self.blocklist, &hay) {
            return false;
        }
        if self.regions.iter().any(|(_, p)| any_found(p, &hay)) {
            return true;
        }
        any_found(&self.conflict_terms, &hay) && any_found(&self.country_terms, &hay)
    }

    /// Relevance in [0,1] for a text already tagged with `region`.
    pub fn relevance_score(&self, text: &str, region: Option<Region>) -> f64 {
        let Some(region) = region else {
            return 0.05;
        };
        let hay = tokenize(text);
        let matches = self
            .regions
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, p)| p.iter().filter(|k| k.found_in(&hay)).count())
            .unwrap_or(0);
        let base = (matches as f64 / 3.0).min(0.6);
        let triggers = self.triggers.iter().filter(|t| t.found_in(&hay)).count();
        let trigger_boost = (0.1 * triggers as f64).min(0.3);
        (base + trigger_boost + 0.1).min(1.0)
    }
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn builtin_config() -> ClassifierConfig {
    let mut regions = BTreeMap::new();
    regions.insert(
        Region::Iran,
        strings(&[
            "iran", "iranian", "tehran", "persian gulf", "strait of hormuz", "hormuz", "irgc",
            "khamenei", "raisi", "rouhani", "nuclear deal", "jcpoa", "enrichment", "natanz",
            "fordow", "parchin", "hezbollah", "quds force", "soleimani", "sanctions iran",
            "revolutionary guard", "ayatollah", "isfahan", "iran nuclear", "strike iran",
        ]),
    );
    regions.insert(
        Region::IsraelPalestine,
        strings(&[
            "israel", "israeli", "gaza", "hamas", "netanyahu", "idf", "west bank", "tel aviv",
            "jerusalem", "rafah", "khan younis", "hezbollah", "lebanon", "beirut", "ceasefire",
            "hostage", "kibbutz", "iron dome", "palestinian", "palestine", "mossad", "shin bet",
            "houthi", "red sea", "yemen strike",
        ]),
    );
    regions.insert(
        Region::RussiaUkraine,
        strings(&[
            "ukraine", "ukrainian", "russia", "russian", "kyiv", "kiev", "moscow", "putin",
            "zelensky", "donbas", "donetsk", "luhansk", "crimea", "kharkiv", "mariupol",
            "bakhmut", "kherson", "odesa", "wagner", "drone strike", "himars",
            "patriot missile", "f-16", "kursk", "belgorod",
        ]),
    );
    regions.insert(
        Region::TaiwanStrait,
        strings(&[
            "taiwan", "taiwanese", "taipei", "china military", "pla navy", "pla air",
            "taiwan strait", "south china sea", "xi jinping", "tsmc", "reunification",
            "one china", "aukus", "indo-pacific", "chinese aircraft", "chinese warship",
            "median line", "adiz", "china invade", "china attack",
        ]),
    );
    regions.insert(
        Region::Korea,
        strings(&[
            "north korea", "dprk", "pyongyang", "kim jong", "south korea", "seoul",
            "korean peninsula", "icbm", "hwasong", "missile test", "nuclear test", "dmz",
            "kaesong", "yongbyon", "kim yo jong", "denuclearization", "korean war",
        ]),
    );

    ClassifierConfig {
        min_score: DEFAULT_MIN_SCORE,
        regions,
        blocklist: strings(&[
            // sports
            "nba", "nfl", "mlb", "nhl", "sports", "basketball", "football", "soccer",
            "baseball", "hockey", "tennis", "golf", "cricket", "rugby", "f1", "nascar",
            "premier league", "la liga", "bundesliga", "serie a", "ligue 1", "mls",
            "champions league", "europa league", "epl", "ronaldo", "messi", "haaland",
            "mbappe", "arsenal", "chelsea", "manchester", "liverpool", "barcelona",
            "real madrid", "fc", "super bowl", "world cup", "playoffs", "championship",
            "finals", "lebron", "mvp", "rookie", "all-star", "lakers",
            // entertainment
            "oscar", "grammy", "emmy", "award", "movie", "film", "album", "song", "netflix",
            "mrbeast", "mr beast", "youtube", "tiktok", "celebrity", "kardashian",
            // crypto
            "crypto", "bitcoin", "ethereum", "doge", "memecoin", "solana", "token",
            // esports
            "esports", "dota", "csgo", "valorant", "league of legends",
        ]),
        triggers: strings(&[
            "breaking", "urgent", "just in", "developing", "strike", "attack", "explosion",
            "missile", "invasion", "troops", "military operation", "nuclear", "war", "conflict",
            "escalation", "casualties", "killed", "wounded", "evacuation",
        ]),
        military_context: strings(&[
            "military", "defense", "army", "navy", "air force", "strike", "missile", "nuclear",
            "war", "conflict",
        ]),
        conflict_terms: strings(&[
            "war", "strike", "invasion", "military", "troops", "missile", "nuclear", "conflict",
            "sanctions",
        ]),
        country_terms: strings(&[
            "u.s.", "usa", "united states", "china", "russia", "iran", "israel", "ukraine", "korea",
            "taiwan",
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clf() -> RegionClassifier {
        RegionClassifier::builtin()
    }

    #[test]
    fn tokenizer_splits_punctuation_and_lowercases() {
        assert_eq!(tokenize("F-16s over Kyiv!"), vec!["f", "16s", "over", "kyiv"]);
        assert_eq!(tokenize("Israel's cabinet"), vec!["israel", "s", "cabinet"]);
    }

    #[test]
    fn classifies_iran_headline() {
        assert_eq!(clf().classify("Iran nuclear talks in Tehran"), Some(Region::Iran));
    }

    #[test]
    fn blocklist_wins_over_everything() {
        let c = clf();
        assert!(c.exclude("Lakers win championship"));
        assert_eq!(c.classify("Lakers win championship"), None);
    }

    #[test]
    fn single_weak_match_stays_unclassified() {
        // "seoul" alone weighs 1 < 2
        assert_eq!(clf().classify("Weather in Seoul is mild"), None);
    }

    #[test]
    fn multi_word_phrases_outweigh_single_words() {
        let scores = clf().score("Tanker seized in the Strait of Hormuz");
        // "strait of hormuz" (3) + "hormuz" (1)
        assert_eq!(scores.get(&Region::Iran), Some(&4));
    }

    #[test]
    fn substrings_inside_words_do_not_match() {
        // "pla" is not a keyword on its own and "player" must not hit anything
        let scores = clf().score("Player of the year");
        assert!(scores.is_empty());
    }

    #[test]
    fn ties_resolve_to_first_region_in_order() {
        // iran: hezbollah(1)+iran(1); israel-palestine: hezbollah(1)+lebanon(1)
        let r = clf().classify("Hezbollah, Iran and Lebanon");
        assert_eq!(r, Some(Region::Iran));
    }

    #[test]
    fn relevance_gate_accepts_trigger_in_military_context() {
        let c = clf();
        assert!(c.is_relevant("Missile strike hits army depot"));
        assert!(!c.is_relevant("Stock markets rally on earnings"));
        assert!(c.is_relevant("Gaza talks resume"));
    }

    #[test]
    fn geopolitical_gate_needs_conflict_and_country_or_keyword() {
        let c = clf();
        assert!(c.is_geopolitical("Will the U.S. strike Venezuela? China responds"));
        assert!(c.is_geopolitical("Will the United States strike Venezuela?"));
        // the pronoun is not a country
        assert!(!c.is_geopolitical("Will they strike us before the deadline?"));
        assert!(c.is_geopolitical("Will Putin meet Zelensky in 2026?"));
        assert!(!c.is_geopolitical("Will Bitcoin hit 200k?"));
        assert!(!c.is_geopolitical("Will it rain in London tomorrow?"));
    }

    #[test]
    fn relevance_score_tiers() {
        let c = clf();
        assert!((c.relevance_score("anything", None) - 0.05).abs() < 1e-9);
        let r = c.relevance_score("Breaking: IDF strike in Gaza as Hamas talks stall", Some(Region::IsraelPalestine));
        // idf, gaza, hamas -> 0.6 cap; breaking + strike -> 0.2; +0.1
        assert!((r - 0.9).abs() < 1e-9, "got {r}");
    }

    #[test]
    fn toml_config_round_trip() {
        let toml = r#"
min_score = 1
blocklist = ["golf"]
[regions]
korea = ["pyongyang"]
iran = ["tehran"]
"#;
        let c = RegionClassifier::from_toml_str(toml).unwrap();
        assert_eq!(c.classify("Pyongyang statement"), Some(Region::Korea));
        assert_eq!(c.classify("Tehran golf club"), None);
    }
}
