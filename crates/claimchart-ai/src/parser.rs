//! Turning a free-text model reply into a [`JudgmentResult`].
//!
//! [`MarkerParser`] scans for the section headers the prompt asks for and
//! never fails. [`JsonResponseParser`] is for models instructed to answer in
//! JSON; callers go through [`ResponseParser::parse_or_degrade`] so a bad
//! reply still yields a usable result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use claimchart_core::{Disclosure, JudgmentResult, JudgmentStatus};

use crate::error::ParseError;

/// Characters taken for the main-differences field, header included.
const DIFFERENCES_LEN: usize = 500;

pub trait ResponseParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<JudgmentResult, ParseError>;

    /// Parse, falling back to [`JudgmentResult::degraded`] on failure.
    fn parse_or_degrade(&self, raw: &str) -> JudgmentResult {
        match self.parse(raw) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, chars = raw.chars().count(), "structured parse failed, keeping raw reply");
                JudgmentResult::degraded(raw)
            }
        }
    }
}

static LABELLED_SIMILARITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"相似度(?:评分)?[：:]\s*(\d+(?:\.\d+)?)").expect("similarity regex")
});

static PERCENT_SIMILARITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("percent regex"));

/// The list number of the next heading, left at the end of the previous
/// section, e.g. "\n\n### 2. **". Bare numbers are content and stay.
static TRAILING_ENUMERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\n)[\s*]*(?:#+[\s*]*\d{1,2}\s*[.、．)）]?|\d{1,2}\s*[.、．)）])[\s*]*$")
        .expect("enumerator regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Related,
    Core,
    Analysis,
    Disclosure,
    Similarity,
    Differences,
}

/// Header labels per section, in lookup order.
const HEADERS: [(Section, &[&str]); 6] = [
    (Section::Related, &["相关片段"]),
    (Section::Core, &["核心相关片段"]),
    (Section::Analysis, &["特征对比分析", "分析过程"]),
    (Section::Disclosure, &["是否被公开"]),
    (Section::Similarity, &["相似度评分"]),
    (Section::Differences, &["主要差异", "差异点"]),
];

/// Header-scanning parser for free-text replies.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerParser;

impl MarkerParser {
    fn locate(raw: &str) -> Vec<(Section, usize, usize)> {
        let mut found = Vec::new();
        for (section, labels) in HEADERS {
            let hit = labels.iter().find_map(|label| {
                raw.match_indices(label)
                    // "相关片段" also occurs inside "核心相关片段".
                    .find(|(at, _)| section != Section::Related || !raw[..*at].ends_with("核心"))
                    .map(|(at, label)| (at, at + label.len()))
            });
            if let Some((start, end)) = hit {
                found.push((section, start, end));
            }
        }
        found.sort_by_key(|&(_, start, _)| start);
        found
    }

    fn section_text(raw: &str, headers: &[(Section, usize, usize)], section: Section) -> String {
        let Some(idx) = headers.iter().position(|(s, _, _)| *s == section) else {
            return String::new();
        };
        let (_, _, body_start) = headers[idx];
        let body_end = headers
            .iter()
            .map(|&(_, start, _)| start)
            .filter(|&start| start >= body_start)
            .min()
            .unwrap_or(raw.len());
        clean_section(&raw[body_start..body_end], body_end < raw.len())
    }
}

/// Strip the header's punctuation and, when another header follows, that
/// header's list number.
fn clean_section(body: &str, followed_by_header: bool) -> String {
    let body = body.trim_start_matches(|c: char| {
        matches!(c, '：' | ':' | '*' | '#' | ')' | '）') || c.is_whitespace()
    });
    let body = body.trim_end();
    if followed_by_header {
        TRAILING_ENUMERATOR.replace(body, "").trim().to_string()
    } else {
        body.to_string()
    }
}

/// Negations anywhere in the reply win; positive phrasing is read from the
/// disclosure section when there is one.
fn disclosure(raw: &str, section: &str) -> Disclosure {
    if ["未被公开", "没被公开", "不被公开"].iter().any(|n| raw.contains(n)) {
        return Disclosure::No;
    }
    let scope = if section.is_empty() { raw } else { section };
    // The header itself contains "被公开".
    if scope.replace("是否被公开", "").contains("被公开") {
        return Disclosure::Yes;
    }
    let conclusion = section.trim_start_matches(|c: char| {
        matches!(c, '：' | ':' | '*' | '【' | '「') || c.is_whitespace()
    });
    if conclusion.starts_with('否') || conclusion.starts_with('不') {
        Disclosure::No
    } else if conclusion.starts_with('是') {
        Disclosure::Yes
    } else {
        Disclosure::Pending
    }
}

fn similarity(raw: &str) -> f64 {
    LABELLED_SIMILARITY
        .captures(raw)
        .or_else(|| PERCENT_SIMILARITY.captures(raw))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map_or(0.0, |value| value.clamp(0.0, 100.0))
}

fn main_differences(raw: &str) -> String {
    ["主要差异", "差异点"]
        .iter()
        .find_map(|label| raw.find(label))
        .map(|start| {
            raw[start..]
                .chars()
                .take(DIFFERENCES_LEN)
                .collect::<String>()
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

impl ResponseParser for MarkerParser {
    fn parse(&self, raw: &str) -> Result<JudgmentResult, ParseError> {
        let headers = Self::locate(raw);
        let disclosure_section = Self::section_text(raw, &headers, Section::Disclosure);

        let mut analysis_process = Self::section_text(raw, &headers, Section::Analysis);
        if analysis_process.is_empty() {
            analysis_process = raw.to_string();
        }

        Ok(JudgmentResult {
            status: JudgmentStatus::Success,
            related_content: Self::section_text(raw, &headers, Section::Related),
            core_content: Self::section_text(raw, &headers, Section::Core),
            analysis_process,
            is_disclosed: disclosure(raw, &disclosure_section),
            similarity: similarity(raw),
            main_differences: main_differences(raw),
            ..Default::default()
        })
    }
}

#[derive(Deserialize)]
struct StructuredReply {
    #[serde(default, alias = "relatedContent")]
    related_content: String,
    #[serde(default, alias = "coreContent")]
    core_content: String,
    #[serde(default, alias = "analysisProcess")]
    analysis_process: String,
    #[serde(default, alias = "isDisclosed")]
    is_disclosed: Value,
    #[serde(default)]
    similarity: Value,
    #[serde(default, alias = "mainDifferences")]
    main_differences: String,
}

/// Parser for replies that carry a single JSON object, possibly inside a code fence.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonResponseParser;

impl ResponseParser for JsonResponseParser {
    fn parse(&self, raw: &str) -> Result<JudgmentResult, ParseError> {
        let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
            return Err(ParseError::NoObject);
        };
        if end < start {
            return Err(ParseError::NoObject);
        }
        let reply: StructuredReply = serde_json::from_str(&raw[start..=end])?;

        let is_disclosed = match &reply.is_disclosed {
            Value::Bool(true) => Disclosure::Yes,
            Value::Bool(false) => Disclosure::No,
            Value::String(s) => match s.trim() {
                "yes" | "是" | "true" => Disclosure::Yes,
                "no" | "否" | "false" => Disclosure::No,
                _ => Disclosure::Pending,
            },
            _ => Disclosure::Pending,
        };
        let similarity = match &reply.similarity {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
            _ => 0.0,
        };

        let analysis_process = if reply.analysis_process.is_empty() {
            raw.to_string()
        } else {
            reply.analysis_process
        };

        Ok(JudgmentResult {
            status: JudgmentStatus::Success,
            related_content: reply.related_content,
            core_content: reply.core_content,
            analysis_process,
            is_disclosed,
            similarity: similarity.clamp(0.0, 100.0),
            main_differences: reply.main_differences,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_REPLY: &str = "\
## 1. 相关片段
本发明公开了一种计算装置，包含CPU和RAM存储单元。

## 2. 核心相关片段
CPU可以运行存储在RAM中的软件代码。

## 3. 特征对比分析
从目的看，两者均用于执行程序；从结构看，CPU对应处理器，RAM对应存储器。

## 4. 是否被公开
是，该技术特征已被公开。

## 5. 相似度评分
相似度：92

## 6. 主要差异点
术语不同，实质相同。";

    fn parse(raw: &str) -> JudgmentResult {
        MarkerParser.parse_or_degrade(raw)
    }

    #[test]
    fn full_reply_fills_every_field() {
        let result = parse(FULL_REPLY);
        assert_eq!(result.status, JudgmentStatus::Success);
        assert_eq!(
            result.related_content,
            "本发明公开了一种计算装置，包含CPU和RAM存储单元。"
        );
        assert_eq!(result.core_content, "CPU可以运行存储在RAM中的软件代码。");
        assert!(result.analysis_process.starts_with("从目的看"));
        assert!(result.analysis_process.ends_with("RAM对应存储器。"));
        assert_eq!(result.is_disclosed, Disclosure::Yes);
        assert_eq!(result.similarity, 92.0);
        assert_eq!(result.main_differences, "主要差异点\n术语不同，实质相同。");
    }

    #[test]
    fn labelled_similarity() {
        assert_eq!(parse("相似度：85").similarity, 85.0);
        assert_eq!(parse("相似度: 60").similarity, 60.0);
        assert_eq!(parse("相似度评分：73").similarity, 73.0);
    }

    #[test]
    fn percent_similarity_fallback() {
        assert_eq!(parse("相似度为78%").similarity, 78.0);
    }

    #[test]
    fn labelled_similarity_beats_percent() {
        assert_eq!(parse("覆盖率50%，相似度：85").similarity, 85.0);
    }

    #[test]
    fn similarity_is_clamped() {
        assert_eq!(parse("相似度：250").similarity, 100.0);
        assert_eq!(parse("无数值").similarity, 0.0);
    }

    #[test]
    fn negated_disclosure_wins() {
        let result = parse("经分析，该特征未被公开。");
        assert_eq!(result.is_disclosed, Disclosure::No);
        assert_eq!(parse("该特征没被公开").is_disclosed, Disclosure::No);
        assert_eq!(parse("该特征被公开").is_disclosed, Disclosure::Yes);
        assert_eq!(parse("无法判断").is_disclosed, Disclosure::Pending);
    }

    #[test]
    fn negation_outside_the_disclosure_section_wins() {
        let result = parse("特征对比分析：该技术特征未被公开，结构不同。\n是否被公开：是");
        assert_eq!(result.is_disclosed, Disclosure::No);
    }

    #[test]
    fn trailing_numeric_content_is_kept() {
        let result = parse("相关片段：额定电压为\n220\n核心相关片段：电源");
        assert_eq!(result.related_content, "额定电压为\n220");
        assert_eq!(result.core_content, "电源");

        let result = parse("核心相关片段：电源\n相关片段：额定电压为\n220");
        assert_eq!(result.related_content, "额定电压为\n220");
    }

    #[test]
    fn next_heading_number_is_stripped() {
        let result = parse("1. 相关片段：额定电压\n2. 核心相关片段：电源");
        assert_eq!(result.related_content, "额定电压");
    }

    #[test]
    fn disclosure_header_alone_is_not_a_conclusion() {
        assert_eq!(parse("是否被公开：否").is_disclosed, Disclosure::No);
        assert_eq!(parse("是否被公开：是").is_disclosed, Disclosure::Yes);
        assert_eq!(parse("是否被公开：待定").is_disclosed, Disclosure::Pending);
    }

    #[test]
    fn reply_without_headers_becomes_analysis() {
        let raw = "两者结构相近但作用不同。";
        let result = parse(raw);
        assert_eq!(result.analysis_process, raw);
        assert!(result.related_content.is_empty());
        assert!(result.core_content.is_empty());
    }

    #[test]
    fn analysis_process_header_variant() {
        let result = parse("分析过程：结构一致\n是否被公开：是");
        assert_eq!(result.analysis_process, "结构一致");
    }

    #[test]
    fn core_header_does_not_count_as_related() {
        let result = parse("核心相关片段：CPU\n相关片段：全文");
        assert_eq!(result.core_content, "CPU");
        assert_eq!(result.related_content, "全文");
    }

    #[test]
    fn differences_take_500_chars_from_header() {
        let raw = format!("差异点：{}", "异".repeat(800));
        let result = parse(&raw);
        assert_eq!(result.main_differences.chars().count(), 500);
        assert!(result.main_differences.starts_with("差异点："));
    }

    #[test]
    fn marker_parser_never_fails() {
        for raw in ["", "   \n\t", "相关片段", "：：：", "%%%", "相似度：", "差异"] {
            let result = MarkerParser.parse(raw).unwrap();
            assert!(result.is_success());
            assert!((0.0..=100.0).contains(&result.similarity));
        }
    }

    #[test]
    fn json_reply_is_parsed() {
        let raw = r#"```json
{"related_content": "A", "core_content": "B", "analysis_process": "C",
 "is_disclosed": "否", "similarity": "64%", "main_differences": "D"}
```"#;
        let result = JsonResponseParser.parse(raw).unwrap();
        assert_eq!(result.core_content, "B");
        assert_eq!(result.is_disclosed, Disclosure::No);
        assert_eq!(result.similarity, 64.0);
        assert_eq!(result.main_differences, "D");
    }

    #[test]
    fn json_camel_case_and_bool() {
        let raw = r#"{"coreContent": "B", "isDisclosed": true, "similarity": 88}"#;
        let result = JsonResponseParser.parse(raw).unwrap();
        assert_eq!(result.core_content, "B");
        assert_eq!(result.is_disclosed, Disclosure::Yes);
        assert_eq!(result.similarity, 88.0);
        assert_eq!(result.analysis_process, raw);
    }

    #[test]
    fn invalid_json_degrades() {
        for raw in ["no json here", "{broken", "} {"] {
            assert!(JsonResponseParser.parse(raw).is_err());
            let result = JsonResponseParser.parse_or_degrade(raw);
            assert!(result.is_success());
            assert_eq!(result.analysis_process, raw);
            assert_eq!(result.is_disclosed, Disclosure::Pending);
            assert_eq!(result.similarity, 0.0);
        }
    }
}
