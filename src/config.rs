// src/config.rs
//! Service configuration.
//!
//! Lookup order:
//! 1) $HOTSPOT_CONFIG_PATH
//! 2) config/hotspot.toml
//! 3) built-in defaults
//!
//! Every field has a default, so a partial file is valid.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::fetcher::FetchPolicy;
use crate::region::Region;

pub const ENV_CONFIG_PATH: &str = "HOTSPOT_CONFIG_PATH";
pub const ENV_TICK_SECS: &str = "HOTSPOT_TICK_SECS";
pub const ENV_SERPAPI_KEY: &str = "SERPAPI_KEY";
pub const DEFAULT_CONFIG_PATH: &str = "config/hotspot.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineCfg,
    pub fetch: FetchCfg,
    /// Optional classifier keyword tables; built-in tables when absent.
    pub classifier_path: Option<PathBuf>,
    pub news: NewsCfg,
    pub bluesky: BlueskyCfg,
    pub truthsocial: TruthSocialCfg,
    pub polymarket: PolymarketCfg,
    pub commodities: QuotesCfg,
    pub defense_stocks: DefenseStocksCfg,
    pub trends: TrendsCfg,
}

/// Per-source pacing shared by every connector section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub ttl: Duration,
    pub max_concurrent: usize,
    pub base_delay: Duration,
    pub jitter: Duration,
}

impl Pacing {
    pub fn policy(&self, fetch: &FetchCfg) -> FetchPolicy {
        FetchPolicy {
            max_concurrent: self.max_concurrent.max(1),
            base_delay: self.base_delay,
            jitter: self.jitter,
            max_attempts: fetch.max_attempts.max(1),
            timeout: Duration::from_secs(fetch.timeout_secs.max(1)),
            timeout_pause: Duration::from_millis(fetch.timeout_pause_ms),
        }
    }
}

fn pacing(ttl_secs: u64, max_concurrent: usize, base_delay_ms: u64, jitter_ms: u64) -> Pacing {
    Pacing {
        ttl: Duration::from_secs(ttl_secs),
        max_concurrent: max_concurrent.max(1),
        base_delay: Duration::from_millis(base_delay_ms),
        jitter: Duration::from_millis(jitter_ms),
    }
}

/* ----------------------------
Engine + fetch
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineCfg {
    pub tick_interval_secs: u64,
    pub history_capacity: usize,
    pub synthetic_fallback: bool,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            history_capacity: 100,
            synthetic_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchCfg {
    pub timeout_secs: u64,
    pub timeout_pause_ms: u64,
    pub max_attempts: u32,
    pub user_agent: String,
}

impl Default for FetchCfg {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            timeout_pause_ms: 1000,
            max_attempts: 3,
            user_agent: "Mozilla/5.0 (compatible; hotspot-monitor/0.1)".to_string(),
        }
    }
}

/* ----------------------------
News
---------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedCfg {
    pub name: String,
    pub url: String,
    /// e.g. "OSINT-BBC" or "MILINT-D1".
    pub source_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsCfg {
    pub ttl_secs: u64,
    pub max_concurrent: usize,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub entries_per_feed: usize,
    pub max_text_chars: usize,
    pub feeds: Vec<FeedCfg>,
}

impl NewsCfg {
    pub fn pacing(&self) -> Pacing {
        pacing(self.ttl_secs, self.max_concurrent, self.base_delay_ms, self.jitter_ms)
    }
}

fn feed(name: &str, url: &str, source_id: &str) -> FeedCfg {
    FeedCfg {
        name: name.to_string(),
        url: url.to_string(),
        source_id: source_id.to_string(),
    }
}

impl Default for NewsCfg {
    fn default() -> Self {
        Self {
            ttl_secs: 180,
            max_concurrent: 4,
            base_delay_ms: 200,
            jitter_ms: 200,
            entries_per_feed: 20,
            max_text_chars: 500,
            feeds: vec![
                feed("Reuters", "https://www.reutersagency.com/feed/?taxonomy=best-sectors&post_type=best", "WIRE-RTR"),
                feed("Defense One", "https://www.defenseone.com/rss/all/", "MILINT-D1"),
                feed("Breaking Defense", "https://breakingdefense.com/feed/", "MILINT-BD"),
                feed("War on the Rocks", "https://warontherocks.com/feed/", "MILINT-WOR"),
                feed("Al-Monitor", "https://www.al-monitor.com/rss", "OSINT-ALM"),
                feed("Times of Israel", "https://www.timesofisrael.com/feed/", "OSINT-TOI"),
                feed("Jerusalem Post", "https://www.jpost.com/rss/rssfeedsfrontpage.aspx", "OSINT-JP"),
                feed("Iran International", "https://www.iranintl.com/en/rss", "OSINT-IRI"),
                feed("SCMP China", "https://www.scmp.com/rss/5/feed", "OSINT-SCMP"),
                feed("Taipei Times", "https://www.taipeitimes.com/xml/index.rss", "OSINT-TT"),
                feed("NK News", "https://www.nknews.org/feed/", "OSINT-NK"),
                feed("Kyiv Independent", "https://kyivindependent.com/feed/", "OSINT-KI"),
                feed("Ukrainska Pravda", "https://www.pravda.com.ua/eng/rss/", "OSINT-UP"),
                feed("BBC World", "https://feeds.bbci.co.uk/news/world/rss.xml", "OSINT-BBC"),
                feed("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml", "OSINT-AJ"),
            ],
        }
    }
}

/* ----------------------------
Social
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlueskyCfg {
    pub ttl_secs: u64,
    pub max_concurrent: usize,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub api_base: String,
    pub search_limit: u32,
    pub author_feed_limit: u32,
    /// Only the first term of each region is searched per refresh.
    pub search_terms: BTreeMap<Region, Vec<String>>,
    pub accounts: Vec<String>,
}

impl BlueskyCfg {
    pub fn pacing(&self) -> Pacing {
        pacing(self.ttl_secs, self.max_concurrent, self.base_delay_ms, self.jitter_ms)
    }
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for BlueskyCfg {
    fn default() -> Self {
        let mut search_terms = BTreeMap::new();
        search_terms.insert(Region::Iran, strings(&["Iran strike", "IRGC", "Strait of Hormuz"]));
        search_terms.insert(Region::IsraelPalestine, strings(&["Gaza", "IDF", "Hamas"]));
        search_terms.insert(Region::RussiaUkraine, strings(&["Ukraine war", "Kyiv strike", "Zelensky"]));
        search_terms.insert(Region::TaiwanStrait, strings(&["Taiwan China", "Taiwan strait", "PLA Taiwan"]));
        search_terms.insert(Region::Korea, strings(&["North Korea missile", "Kim Jong Un", "Pyongyang"]));
        Self {
            ttl_secs: 180,
            max_concurrent: 3,
            base_delay_ms: 300,
            jitter_ms: 200,
            api_base: "https://public.api.bsky.app/xrpc".to_string(),
            search_limit: 10,
            author_feed_limit: 15,
            search_terms,
            accounts: strings(&[
                "osintradar.bsky.social",
                "osinttechnical.bsky.social",
                "warontherocks.bsky.social",
                "bendobrown.bsky.social",
                "warmapper.org",
                "bellingcat.com",
                "osint.industries",
                "intelcrab.bsky.social",
                "sentdefender.bsky.social",
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TruthSocialCfg {
    pub ttl_secs: u64,
    pub max_concurrent: usize,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub archive_url: String,
    pub max_posts: usize,
    pub min_chars: usize,
    pub author: String,
}

impl TruthSocialCfg {
    pub fn pacing(&self) -> Pacing {
        pacing(self.ttl_secs, self.max_concurrent, self.base_delay_ms, self.jitter_ms)
    }
}

impl Default for TruthSocialCfg {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_concurrent: 1,
            base_delay_ms: 0,
            jitter_ms: 0,
            archive_url: "https://ix.cnn.io/data/truth-social/truth_archive.json".to_string(),
            max_posts: 50,
            min_chars: 10,
            author: "@realDonaldTrump".to_string(),
        }
    }
}

/* ----------------------------
Markets
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolymarketCfg {
    pub ttl_secs: u64,
    pub max_concurrent: usize,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub gamma_base: String,
    pub clob_base: String,
    pub page_limit: u32,
    pub general_page_limit: u32,
    /// Markets (by volume) whose price history is refreshed for `change_24h`.
    pub history_top_n: usize,
}

impl PolymarketCfg {
    pub fn pacing(&self) -> Pacing {
        pacing(self.ttl_secs, self.max_concurrent, self.base_delay_ms, self.jitter_ms)
    }
}

impl Default for PolymarketCfg {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_concurrent: 2,
            base_delay_ms: 500,
            jitter_ms: 300,
            gamma_base: "https://gamma-api.polymarket.com".to_string(),
            clob_base: "https://clob.polymarket.com".to_string(),
            page_limit: 100,
            general_page_limit: 200,
            history_top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SymbolCfg {
    pub symbol: String,
    pub name: String,
}

fn symbol(symbol: &str, name: &str) -> SymbolCfg {
    SymbolCfg {
        symbol: symbol.to_string(),
        name: name.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotesCfg {
    pub ttl_secs: u64,
    pub max_concurrent: usize,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub chart_base: String,
    pub symbols: Vec<SymbolCfg>,
}

impl QuotesCfg {
    pub fn pacing(&self) -> Pacing {
        pacing(self.ttl_secs, self.max_concurrent, self.base_delay_ms, self.jitter_ms)
    }

    pub fn commodities() -> Self {
        Self {
            ttl_secs: 300,
            max_concurrent: 2,
            base_delay_ms: 500,
            jitter_ms: 300,
            chart_base: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
            symbols: vec![
                symbol("CL=F", "Crude Oil WTI"),
                symbol("BZ=F", "Brent Crude"),
                symbol("GC=F", "Gold"),
                symbol("SI=F", "Silver"),
                symbol("NG=F", "Natural Gas"),
            ],
        }
    }
}

/// Same shape as `QuotesCfg`, with the defense-stock preset as its default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefenseStocksCfg {
    pub ttl_secs: u64,
    pub max_concurrent: usize,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub chart_base: String,
    pub symbols: Vec<SymbolCfg>,
}

impl Default for DefenseStocksCfg {
    fn default() -> Self {
        let base = QuotesCfg::commodities();
        Self {
            ttl_secs: 60,
            max_concurrent: base.max_concurrent,
            base_delay_ms: base.base_delay_ms,
            jitter_ms: base.jitter_ms,
            chart_base: base.chart_base,
            symbols: vec![
                symbol("LMT", "Lockheed Martin"),
                symbol("RTX", "RTX Corp"),
                symbol("NOC", "Northrop Grumman"),
                symbol("GD", "General Dynamics"),
                symbol("BA", "Boeing"),
                symbol("LHX", "L3Harris"),
                symbol("HII", "Huntington Ingalls"),
                symbol("KTOS", "Kratos Defense"),
            ],
        }
    }
}

impl From<DefenseStocksCfg> for QuotesCfg {
    fn from(c: DefenseStocksCfg) -> Self {
        Self {
            ttl_secs: c.ttl_secs,
            max_concurrent: c.max_concurrent,
            base_delay_ms: c.base_delay_ms,
            jitter_ms: c.jitter_ms,
            chart_base: c.chart_base,
            symbols: c.symbols,
        }
    }
}

impl Default for QuotesCfg {
    fn default() -> Self {
        Self::commodities()
    }
}

/* ----------------------------
Trends
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendsCfg {
    pub ttl_secs: u64,
    pub max_concurrent: usize,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    pub endpoint: String,
    /// Enables the SerpApi provider; usually supplied via $SERPAPI_KEY.
    pub serpapi_key: Option<String>,
    pub keywords: BTreeMap<Region, Vec<String>>,
}

impl TrendsCfg {
    pub fn pacing(&self) -> Pacing {
        pacing(self.ttl_secs, self.max_concurrent, self.base_delay_ms, self.jitter_ms)
    }
}

impl Default for TrendsCfg {
    fn default() -> Self {
        let mut keywords = BTreeMap::new();
        keywords.insert(Region::Iran, strings(&["Iran nuclear", "Iran Israel", "IRGC", "Tehran"]));
        keywords.insert(Region::IsraelPalestine, strings(&["Gaza", "Israel Hamas", "Netanyahu", "IDF"]));
        keywords.insert(Region::RussiaUkraine, strings(&["Ukraine war", "Russia Ukraine", "Kyiv", "Zelensky"]));
        keywords.insert(Region::TaiwanStrait, strings(&["Taiwan China", "Taiwan strait", "PLA", "TSMC"]));
        keywords.insert(Region::Korea, strings(&["North Korea", "Kim Jong Un", "ICBM", "Korean peninsula"]));
        Self {
            ttl_secs: 1800,
            max_concurrent: 1,
            base_delay_ms: 500,
            jitter_ms: 0,
            endpoint: "https://serpapi.com/search.json".to_string(),
            serpapi_key: None,
            keywords,
        }
    }
}

/* ----------------------------
Loading
---------------------------- */

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing hotspot config toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Env path, then `config/hotspot.toml`, then defaults; env overrides applied last.
    pub fn load_default() -> Result<Self> {
        let cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                AppConfig::default()
            }
        };
        Ok(cfg.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var(ENV_TICK_SECS) {
            match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.engine.tick_interval_secs = secs,
                _ => tracing::warn!(value = %v, "ignoring invalid {ENV_TICK_SECS}"),
            }
        }
        if let Ok(k) = std::env::var(ENV_SERPAPI_KEY) {
            if !k.trim().is_empty() {
                self.trends.serpapi_key = Some(k.trim().to_string());
            }
        }
        self
    }

    fn sanitized(mut self) -> Self {
        if self.engine.history_capacity == 0 {
            self.engine.history_capacity = EngineCfg::default().history_capacity;
        }
        if self.engine.tick_interval_secs == 0 {
            self.engine.tick_interval_secs = EngineCfg::default().tick_interval_secs;
        }
        self.fetch.max_attempts = self.fetch.max_attempts.max(1);
        self.news.max_concurrent = self.news.max_concurrent.max(1);
        self.bluesky.max_concurrent = self.bluesky.max_concurrent.max(1);
        self.truthsocial.max_concurrent = self.truthsocial.max_concurrent.max(1);
        self.polymarket.max_concurrent = self.polymarket.max_concurrent.max(1);
        self.commodities.max_concurrent = self.commodities.max_concurrent.max(1);
        self.defense_stocks.max_concurrent = self.defense_stocks.max_concurrent.max(1);
        self.trends.max_concurrent = self.trends.max_concurrent.max(1);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.engine.tick_interval_secs.max(1))
    }
}
