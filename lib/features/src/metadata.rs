//! Hand-crafted metadata features.
//!
//! Each post yields [`METADATA_DIM`] raw numbers in the order of
//! [`METADATA_FEATURE_NAMES`]: caption statistics, OCR statistics and the
//! posting hour on the unit circle. Scaling is left to the engine's
//! metadata scaler.

use chrono::{NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const METADATA_DIM: usize = 21;

pub const METADATA_FEATURE_NAMES: [&str; METADATA_DIM] = [
    "cap_len",
    "cap_hashtags",
    "cap_mentions",
    "cap_digits",
    "cap_bang",
    "cap_qmark",
    "cap_emoji",
    "cap_promo",
    "cap_flavor",
    "cap_health",
    "cap_cta",
    "ocr_len",
    "ocr_digits",
    "ocr_has_price",
    "ocr_has_pct",
    "ocr_promo",
    "ocr_flavor",
    "ocr_health",
    "ocr_cta",
    "time_sin",
    "time_cos",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\w+").expect("hardcoded hashtag regex is invalid"));
static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\w+").expect("hardcoded mention regex is invalid"));
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("hardcoded digit regex is invalid"));
static PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(nt\$|n\$|\$|元)\s*\d+").expect("hardcoded price regex is invalid")
});
static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s*%").expect("hardcoded percent regex is invalid"));

/// Keyword lists behind the promo/flavor/health/call-to-action flags.
/// Matching is a case-insensitive substring test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordLexicon {
    pub promo: Vec<String>,
    pub flavor: Vec<String>,
    pub health: Vec<String>,
    pub call_to_action: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for KeywordLexicon {
    /// Beverage-brand lexicon.
    fn default() -> Self {
        Self {
            promo: words(&[
                "折", "折扣", "%off", "% off", "促銷", "滿", "送", "優惠", "特價", "買一送一",
                "買一送二", "限時", "早鳥",
            ]),
            flavor: words(&[
                "芒果", "草莓", "葡萄", "百香", "抹茶", "烏龍", "紅茶", "綠茶", "奶蓋", "珍珠",
                "椰果", "仙草",
            ]),
            health: words(&["無糖", "微糖", "半糖", "少冰", "去冰", "低卡", "健康", "無添加"]),
            call_to_action: words(&[
                "快來", "立刻", "今天", "現在", "一起", "打卡", "留言", "分享", "抽獎",
            ]),
        }
    }
}

impl KeywordLexicon {
    fn flags(&self, lowered: &str) -> [f32; 4] {
        let any = |list: &[String]| -> f32 {
            let hit = list.iter().any(|kw| lowered.contains(kw.to_lowercase().as_str()));
            if hit {
                1.0
            } else {
                0.0
            }
        };
        [
            any(&self.promo),
            any(&self.flavor),
            any(&self.health),
            any(&self.call_to_action),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor {
    lexicon: KeywordLexicon,
}

impl MetadataExtractor {
    pub fn new(lexicon: KeywordLexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &KeywordLexicon {
        &self.lexicon
    }

    /// Raw feature row for one post.
    pub fn extract(&self, caption: &str, ocr: &str, timestamp: Option<&str>) -> Vec<f32> {
        let mut out = Vec::with_capacity(METADATA_DIM);

        let caption_lower = caption.to_lowercase();
        out.push(caption.chars().count() as f32);
        out.push(HASHTAG.find_iter(caption).count() as f32);
        out.push(MENTION.find_iter(caption).count() as f32);
        out.push(DIGIT.find_iter(caption).count() as f32);
        out.push(caption.matches('!').count() as f32);
        out.push(caption.matches('?').count() as f32);
        out.push(count_emoji(caption) as f32);
        out.extend_from_slice(&self.lexicon.flags(&caption_lower));

        let ocr_lower = ocr.to_lowercase();
        out.push(ocr.chars().count() as f32);
        out.push(DIGIT.find_iter(ocr).count() as f32);
        out.push(flag(PRICE.is_match(&ocr_lower)));
        out.push(flag(PERCENT.is_match(&ocr_lower)));
        out.extend_from_slice(&self.lexicon.flags(&ocr_lower));

        let (sin, cos) = hour_on_circle(timestamp.map_or(0, parse_hour));
        out.push(sin);
        out.push(cos);

        debug_assert_eq!(out.len(), METADATA_DIM);
        out
    }
}

/// Characters outside the basic multilingual plane.
pub fn count_emoji(text: &str) -> usize {
    text.chars().filter(|c| *c as u32 >= 0x10000).count()
}

/// Hour of a `%Y-%m-%d %H:%M:%S` timestamp; 0 when it does not parse.
pub fn parse_hour(timestamp: &str) -> u32 {
    NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT)
        .map(|t| t.hour())
        .unwrap_or(0)
}

pub fn hour_on_circle(hour: u32) -> (f32, f32) {
    let angle = 2.0 * std::f64::consts::PI * hour as f64 / 24.0;
    (angle.sin() as f32, angle.cos() as f32)
}

#[inline]
fn flag(hit: bool) -> f32 {
    if hit {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(row: &[f32], name: &str) -> f32 {
        let i = METADATA_FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        row[i]
    }

    #[test]
    fn test_caption_statistics() {
        let row = MetadataExtractor::default().extract(
            "新品上市!! #芒果 #夏天 @friend 只要 59 元? 😀",
            "",
            Some("2025-05-01 20:52:16"),
        );
        assert_eq!(row.len(), METADATA_DIM);
        assert_eq!(feature(&row, "cap_hashtags"), 2.0);
        assert_eq!(feature(&row, "cap_mentions"), 1.0);
        assert_eq!(feature(&row, "cap_digits"), 2.0);
        assert_eq!(feature(&row, "cap_bang"), 2.0);
        assert_eq!(feature(&row, "cap_qmark"), 1.0);
        assert_eq!(feature(&row, "cap_emoji"), 1.0);
        assert_eq!(feature(&row, "cap_flavor"), 1.0);
        assert_eq!(feature(&row, "cap_health"), 0.0);
        assert_eq!(feature(&row, "ocr_len"), 0.0);
    }

    #[test]
    fn test_ocr_price_and_percent() {
        let ex = MetadataExtractor::default();
        let row = ex.extract("", "NT$ 120 限時 8折 20 %", None);
        assert_eq!(feature(&row, "ocr_has_price"), 1.0);
        assert_eq!(feature(&row, "ocr_has_pct"), 1.0);
        assert_eq!(feature(&row, "ocr_promo"), 1.0);
        assert_eq!(feature(&row, "ocr_digits"), 6.0);

        let row = ex.extract("", "no numbers here", None);
        assert_eq!(feature(&row, "ocr_has_price"), 0.0);
        assert_eq!(feature(&row, "ocr_has_pct"), 0.0);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let row = MetadataExtractor::default().extract("Summer 50% OFF", "", None);
        assert_eq!(feature(&row, "cap_promo"), 1.0);
    }

    #[test]
    fn test_time_encoding() {
        assert_eq!(parse_hour("2025-05-01 20:52:16"), 20);
        assert_eq!(parse_hour("yesterday"), 0);
        let (sin, cos) = hour_on_circle(6);
        assert!((sin - 1.0).abs() < 1e-6);
        assert!(cos.abs() < 1e-6);

        let row = MetadataExtractor::default().extract("", "", Some("not a date"));
        assert_eq!(feature(&row, "time_sin"), 0.0);
        assert_eq!(feature(&row, "time_cos"), 1.0);
    }

    #[test]
    fn test_custom_lexicon() {
        let lexicon = KeywordLexicon {
            promo: vec!["SALE".to_string()],
            flavor: Vec::new(),
            health: Vec::new(),
            call_to_action: Vec::new(),
        };
        let row = MetadataExtractor::new(lexicon).extract("big sale today", "", None);
        assert_eq!(feature(&row, "cap_promo"), 1.0);
        assert_eq!(feature(&row, "cap_cta"), 0.0);
    }
}
