use std::sync::LazyLock;

use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Canonical regulatory item a section heading can be matched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemTag {
    // 8-K
    Item1_01,
    Item1_02,
    Item2_01,
    Item2_02,
    Item2_05,
    Item3_01,
    Item5_02,
    Item5_03,
    Item7_01,
    Item8_01,
    Item9_01,
    // 10-K
    Item1,
    Item1a,
    Item1b,
    Item2,
    Item3,
    Item4,
    Item5,
    Item6,
    Item7,
    Item7a,
    Item8,
    Item9,
    Item9a,
    Item9b,
    Item10,
    Item11,
    Item12,
    Item13,
    Item14,
    Item15,
    // 10-Q
    Item1_10q,
    Item2_10q,
    Item3_10q,
    Item4_10q,
}

const SEP: &str = r"[.\s:\-–—]+";

/// (item number regex, required keyword, tag). First match wins, so the
/// 8-K decimals sit ahead of the 10-K items that share a leading digit and
/// the 10-Q items come last.
const PATTERNS: &[(&str, &str, ItemTag)] = &[
    (r"1\.01", "", ItemTag::Item1_01),
    (r"1\.02", "", ItemTag::Item1_02),
    (r"2\.01", "", ItemTag::Item2_01),
    (r"2\.02", "", ItemTag::Item2_02),
    (r"2\.05", "", ItemTag::Item2_05),
    (r"3\.01", "", ItemTag::Item3_01),
    (r"5\.02", "", ItemTag::Item5_02),
    (r"5\.03", "", ItemTag::Item5_03),
    (r"7\.01", "", ItemTag::Item7_01),
    (r"8\.01", "", ItemTag::Item8_01),
    (r"9\.01", "", ItemTag::Item9_01),
    (r"1", "business", ItemTag::Item1),
    (r"1a", "risk", ItemTag::Item1a),
    (r"1b", "unresolved", ItemTag::Item1b),
    (r"2", "propert", ItemTag::Item2),
    (r"3", "legal", ItemTag::Item3),
    (r"4", "mine", ItemTag::Item4),
    (r"5", "market", ItemTag::Item5),
    (r"6", "selected", ItemTag::Item6),
    (r"7", "management", ItemTag::Item7),
    (r"7a", "quantitative", ItemTag::Item7a),
    (r"8", r"financial\s+stat", ItemTag::Item8),
    (r"9", "changes", ItemTag::Item9),
    (r"9a", "controls", ItemTag::Item9a),
    (r"9b", "other", ItemTag::Item9b),
    (r"10", "directors", ItemTag::Item10),
    (r"11", "executive", ItemTag::Item11),
    (r"12", "security", ItemTag::Item12),
    (r"13", "certain", ItemTag::Item13),
    (r"14", "principal", ItemTag::Item14),
    (r"15", "exhibit", ItemTag::Item15),
    (r"1", r"financial\s+stat", ItemTag::Item1_10q),
    (r"2", "management", ItemTag::Item2_10q),
    (r"3", "quantitative", ItemTag::Item3_10q),
    (r"4", "controls", ItemTag::Item4_10q),
];

static ITEM_RES: LazyLock<Vec<(Regex, ItemTag)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|(number, keyword, tag)| {
            let pattern = if keyword.is_empty() {
                format!(r"(?i)item\s*{number}")
            } else {
                format!(r"(?i)item\s*{number}{SEP}{keyword}")
            };
            (Regex::new(&pattern).unwrap(), *tag)
        })
        .collect()
});

impl ItemTag {
    /// Match a heading against the canonical item table.
    pub fn detect(heading: &str) -> Option<ItemTag> {
        ITEM_RES
            .iter()
            .find(|(re, _)| re.is_match(heading))
            .map(|(_, tag)| *tag)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemTag::Item1_01 => "item_1_01",
            ItemTag::Item1_02 => "item_1_02",
            ItemTag::Item2_01 => "item_2_01",
            ItemTag::Item2_02 => "item_2_02",
            ItemTag::Item2_05 => "item_2_05",
            ItemTag::Item3_01 => "item_3_01",
            ItemTag::Item5_02 => "item_5_02",
            ItemTag::Item5_03 => "item_5_03",
            ItemTag::Item7_01 => "item_7_01",
            ItemTag::Item8_01 => "item_8_01",
            ItemTag::Item9_01 => "item_9_01",
            ItemTag::Item1 => "item_1",
            ItemTag::Item1a => "item_1a",
            ItemTag::Item1b => "item_1b",
            ItemTag::Item2 => "item_2",
            ItemTag::Item3 => "item_3",
            ItemTag::Item4 => "item_4",
            ItemTag::Item5 => "item_5",
            ItemTag::Item6 => "item_6",
            ItemTag::Item7 => "item_7",
            ItemTag::Item7a => "item_7a",
            ItemTag::Item8 => "item_8",
            ItemTag::Item9 => "item_9",
            ItemTag::Item9a => "item_9a",
            ItemTag::Item9b => "item_9b",
            ItemTag::Item10 => "item_10",
            ItemTag::Item11 => "item_11",
            ItemTag::Item12 => "item_12",
            ItemTag::Item13 => "item_13",
            ItemTag::Item14 => "item_14",
            ItemTag::Item15 => "item_15",
            ItemTag::Item1_10q => "item_1_10q",
            ItemTag::Item2_10q => "item_2_10q",
            ItemTag::Item3_10q => "item_3_10q",
            ItemTag::Item4_10q => "item_4_10q",
        }
    }

    pub fn parse(s: &str) -> Option<ItemTag> {
        PATTERNS
            .iter()
            .map(|(_, _, tag)| *tag)
            .find(|tag| tag.as_str() == s)
    }
}

impl Serialize for ItemTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ItemTag::parse(&raw).ok_or_else(|| de::Error::custom(format!("unknown item tag {raw:?}")))
    }
}

/// Heading predicate handed to the extractor for bold pseudo-headings.
pub fn is_item_heading(text: &str) -> bool {
    ItemTag::detect(text).is_some()
}
