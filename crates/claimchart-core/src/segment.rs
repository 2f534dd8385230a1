//! Claim segmentation: raw claim text into ordered technical features.
//!
//! Claims are located by their `权利要求N` markers. Each claim block is split
//! by the first method that applies, in priority order:
//!
//! 1. semicolons (`；` or `;`)
//! 2. feature markers (`特征A`, `特征1`, `（1）`, `(1)`)
//! 3. full-width commas (`，`), where fragments of 10 characters or fewer
//!    are joined to a neighbour instead of standing alone
//! 4. the whole block as a single feature
//!
//! Text without any claim marker falls back to one feature per non-blank line
//! under claim `1`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::ChartError;
use crate::model::Feature;

static CLAIM_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"权利要求(\d+)[：:。.\s]*").expect("claim marker regex"));

static FEATURE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"特征[A-Z0-9]|（[0-9]+）|\([0-9]+\)").expect("feature marker regex")
});

/// Comma fragments at or below this many characters are not features on their own.
const MIN_COMMA_FRAGMENT: usize = 10;

/// Claim number used when the text carries no claim markers.
const FALLBACK_CLAIM: &str = "1";

/// Result of [`segment`]: the features plus a human-readable status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub features: Vec<Feature>,
    pub message: String,
}

impl Segmentation {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Split claim text into technical features.
///
/// Never fails: when nothing is found the feature list is empty and the
/// message says so.
pub fn segment(text: &str) -> Segmentation {
    let markers: Vec<_> = CLAIM_MARKER.captures_iter(text).collect();

    let features = if markers.is_empty() {
        debug!("no claim markers, falling back to line split");
        split_lines(text)
    } else {
        let mut features = Vec::new();
        let mut next_sequence: HashMap<String, u32> = HashMap::new();

        for (i, caps) in markers.iter().enumerate() {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let block_end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());
            let block = &text[whole.end()..block_end];

            let claim_number = number.as_str().to_string();
            let sequence = next_sequence.entry(claim_number.clone()).or_insert(0);
            for part in split_block(block) {
                *sequence += 1;
                features.push(Feature {
                    claim_number: claim_number.clone(),
                    sequence: *sequence,
                    text: part,
                });
            }
        }
        features
    };

    if features.is_empty() {
        return Segmentation {
            features,
            message: ChartError::SegmentationEmpty.to_string(),
        };
    }

    info!(count = features.len(), "segmented claim text");
    let message = format!("parsed {} technical features", features.len());
    Segmentation { features, message }
}

/// Split one claim block by the highest-priority method that applies.
fn split_block(block: &str) -> Vec<String> {
    let trimmed = block.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let parts = if block.contains(['；', ';']) {
        split_semicolons(block)
    } else if FEATURE_MARKER.is_match(block) {
        split_feature_markers(block)
    } else if block.contains('，') {
        split_commas(block)
    } else {
        Vec::new()
    };

    if parts.is_empty() {
        vec![trimmed.to_string()]
    } else {
        parts
    }
}

fn split_semicolons(block: &str) -> Vec<String> {
    block
        .split(['；', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_feature_markers(block: &str) -> Vec<String> {
    let marks: Vec<_> = FEATURE_MARKER.find_iter(block).collect();
    let mut parts = Vec::with_capacity(marks.len() + 1);

    // Text ahead of the first marker (e.g. "一种方法，包括：") is kept as its own feature.
    if let Some(first) = marks.first() {
        let preamble = block[..first.start()].trim();
        if !preamble.is_empty() {
            parts.push(preamble.to_string());
        }
    }

    for (i, mark) in marks.iter().enumerate() {
        let end = marks.get(i + 1).map_or(block.len(), |next| next.start());
        let body = block[mark.end()..end]
            .trim_start_matches(|c: char| matches!(c, '：' | ':' | '.') || c.is_whitespace())
            .trim();
        if !body.is_empty() {
            parts.push(body.to_string());
        }
    }
    parts
}

fn split_commas(block: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut pending = String::new();

    for fragment in block.split('，').map(str::trim).filter(|f| !f.is_empty()) {
        if !pending.is_empty() {
            pending.push('，');
        }
        pending.push_str(fragment);
        if fragment.chars().count() > MIN_COMMA_FRAGMENT {
            parts.push(std::mem::take(&mut pending));
        }
    }

    // Trailing short fragments belong to the last feature.
    if !pending.is_empty() {
        match parts.last_mut() {
            Some(last) => {
                last.push('，');
                last.push_str(&pending);
            }
            None => parts.push(pending),
        }
    }
    parts
}

fn split_lines(text: &str) -> Vec<Feature> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .zip(1u32..)
        .map(|(line, sequence)| Feature {
            claim_number: FALLBACK_CLAIM.to_string(),
            sequence,
            text: line.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(seg: &Segmentation) -> Vec<&str> {
        seg.features.iter().map(|f| f.text.as_str()).collect()
    }

    /// Strip delimiters and whitespace so coverage can be compared char-for-char.
    fn significant(s: &str) -> String {
        s.chars()
            .filter(|c| !matches!(c, '；' | ';' | '，') && !c.is_whitespace())
            .collect()
    }

    #[test]
    fn semicolon_split() {
        let seg = segment("权利要求1：一种装置，包括A；所述A连接B；");
        assert_eq!(texts(&seg), vec!["一种装置，包括A", "所述A连接B"]);
        assert!(seg.features.iter().all(|f| f.claim_number == "1"));
        assert_eq!(seg.features[0].sequence, 1);
        assert_eq!(seg.features[1].sequence, 2);
        assert_eq!(seg.message, "parsed 2 technical features");
    }

    #[test]
    fn multiple_claims_keep_text_order() {
        let seg = segment("权利要求1. 处理器；存储器 权利要求2. 所述装置还包括电源");
        let keys: Vec<(&str, u32, &str)> = seg
            .features
            .iter()
            .map(|f| (f.claim_number.as_str(), f.sequence, f.text.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("1", 1, "处理器"),
                ("1", 2, "存储器"),
                ("2", 1, "所述装置还包括电源"),
            ]
        );
    }

    #[test]
    fn semicolon_wins_over_markers() {
        let seg = segment("权利要求1：(1)获取图像；(2)识别目标");
        assert_eq!(texts(&seg), vec!["(1)获取图像", "(2)识别目标"]);
    }

    #[test]
    fn bracket_markers_split_and_keep_preamble() {
        let seg = segment("权利要求1：一种方法，包括：(1)获取图像数据 (2)识别目标区域 （3）输出结果");
        assert_eq!(
            texts(&seg),
            vec!["一种方法，包括：", "获取图像数据", "识别目标区域", "输出结果"]
        );
    }

    #[test]
    fn letter_markers_strip_separators() {
        let seg = segment("权利要求1：特征A：处理器 特征B: 存储器");
        assert_eq!(texts(&seg), vec!["处理器", "存储器"]);
    }

    #[test]
    fn comma_split_glues_short_fragments() {
        let seg = segment(
            "权利要求1：一种图像处理装置，包括用于采集图像数据的摄像模块，以及用于识别目标区域的处理模块，和电源",
        );
        assert_eq!(
            texts(&seg),
            vec![
                "一种图像处理装置，包括用于采集图像数据的摄像模块",
                "以及用于识别目标区域的处理模块，和电源",
            ]
        );
    }

    #[test]
    fn short_comma_fragments_become_one_feature() {
        let seg = segment("权利要求1：一种装置，包括A");
        assert_eq!(texts(&seg), vec!["一种装置，包括A"]);
    }

    #[test]
    fn whole_block_when_no_delimiter() {
        let seg = segment("权利要求3：一种存储介质");
        assert_eq!(texts(&seg), vec!["一种存储介质"]);
        assert_eq!(seg.features[0].claim_number, "3");
    }

    #[test]
    fn empty_claim_block_yields_nothing() {
        let seg = segment("权利要求1：权利要求2：一种装置");
        assert_eq!(seg.features.len(), 1);
        assert_eq!(seg.features[0].claim_number, "2");
        assert_eq!(seg.features[0].sequence, 1);
    }

    #[test]
    fn repeated_claim_number_continues_sequence() {
        let seg = segment("权利要求1：A；B 权利要求1：C");
        let seqs: Vec<u32> = seg.features.iter().map(|f| f.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn line_fallback_without_markers() {
        let seg = segment("处理器\n\n  存储器  \n");
        assert_eq!(texts(&seg), vec!["处理器", "存储器"]);
        assert!(seg.features.iter().all(|f| f.claim_number == "1"));
        assert_eq!(seg.features[1].sequence, 2);
    }

    #[test]
    fn empty_input_reports_message() {
        for input in ["", "   \n\t"] {
            let seg = segment(input);
            assert!(seg.is_empty());
            assert_eq!(seg.message, ChartError::SegmentationEmpty.to_string());
        }
    }

    #[test]
    fn segmentation_is_deterministic() {
        let text = "权利要求1：一种装置，包括A；所述A连接B 权利要求2：特征A：电源 特征B：外壳";
        assert_eq!(segment(text), segment(text));
    }

    #[test]
    fn every_block_character_is_covered() {
        let blocks = [
            "一种装置，包括A；所述A连接B；",
            "一种图像处理装置，包括用于采集图像数据的摄像模块，以及电源",
            "一种存储介质",
        ];
        for block in blocks {
            let seg = segment(&format!("权利要求1：{block}"));
            let joined: String = seg.features.iter().map(|f| f.text.as_str()).collect();
            assert_eq!(significant(&joined), significant(block), "block {block:?}");
        }
    }
}
