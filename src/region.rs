//! # Regions
//! The closed set of monitored hotspots. Order of `Region::ALL` is the
//! iteration order used everywhere (scoring, history, tie-breaks).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    Iran,
    IsraelPalestine,
    RussiaUkraine,
    TaiwanStrait,
    Korea,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Iran,
        Region::IsraelPalestine,
        Region::RussiaUkraine,
        Region::TaiwanStrait,
        Region::Korea,
    ];

    /// Stable wire id, e.g. `"israel-palestine"`.
    pub fn id(self) -> &'static str {
        match self {
            Region::Iran => "iran",
            Region::IsraelPalestine => "israel-palestine",
            Region::RussiaUkraine => "russia-ukraine",
            Region::TaiwanStrait => "taiwan-strait",
            Region::Korea => "korea",
        }
    }

    pub fn info(self) -> RegionInfo {
        match self {
            Region::Iran => RegionInfo {
                id: self.id(),
                name: "Iran",
                name_zh: "伊朗",
                color: "#F59E0B",
                keywords: &["Iran", "IRGC", "Tehran", "Khamenei", "Nuclear", "Sanctions"],
            },
            Region::IsraelPalestine => RegionInfo {
                id: self.id(),
                name: "Israel-Palestine",
                name_zh: "巴以",
                color: "#3B82F6",
                keywords: &[
                    "Israel",
                    "Gaza",
                    "Hamas",
                    "IDF",
                    "Netanyahu",
                    "Palestine",
                    "West Bank",
                ],
            },
            Region::RussiaUkraine => RegionInfo {
                id: self.id(),
                name: "Russia-Ukraine",
                name_zh: "俄乌",
                color: "#EF4444",
                keywords: &[
                    "Ukraine", "Russia", "Zelensky", "Putin", "Crimea", "Donbas", "NATO",
                ],
            },
            Region::TaiwanStrait => RegionInfo {
                id: self.id(),
                name: "Taiwan Strait",
                name_zh: "台海",
                color: "#10B981",
                keywords: &["Taiwan", "PLA", "PLAN", "Strait", "China", "Taipei", "TSMC"],
            },
            Region::Korea => RegionInfo {
                id: self.id(),
                name: "Korean Peninsula",
                name_zh: "朝韩",
                color: "#8B5CF6",
                keywords: &["North Korea", "DPRK", "Kim Jong Un", "Pyongyang", "Seoul", "DMZ"],
            },
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown region id `{0}`")]
pub struct UnknownRegion(pub String);

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Region::ALL
            .into_iter()
            .find(|r| r.id() == key)
            .ok_or(UnknownRegion(key))
    }
}

/// Display metadata for a region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub name_zh: &'static str,
    pub color: &'static str,
    pub keywords: &'static [&'static str],
}
