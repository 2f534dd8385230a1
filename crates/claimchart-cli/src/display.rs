//! Terminal rendering of features, claim-chart rows and judgments.
//!
//! Everything prints to stdout as labelled cards; JSON output bypasses this
//! module entirely.

use claimchart_core::{Disclosure, Feature, JudgmentResult, MatchRow};

use crate::config::{DatasetEntry, ModelEntry};

const MAX_LIST_ITEMS: usize = 10;
const EXCERPT_WIDTH: usize = 120;

// ── Public API ──

pub fn print_features(features: &[Feature], message: &str) {
    println!("=== Features ===");
    println!("{message}");
    println!();

    let mut current_claim: Option<&str> = None;
    for feature in features {
        if current_claim != Some(feature.claim_number.as_str()) {
            if current_claim.is_some() {
                println!();
            }
            println!("{}", feature.claim_label());
            current_claim = Some(feature.claim_number.as_str());
        }
        println!("  {:>3}. {}", feature.sequence, feature.text);
    }
    if !features.is_empty() {
        println!();
    }
}

/// Print claim-chart rows grouped by document, at most [`MAX_LIST_ITEMS`] per document.
pub fn print_rows(rows: &[MatchRow]) {
    println!("=== Claim Chart ===");
    println!("{} rows", rows.len());
    println!();

    for document in documents(rows) {
        let doc_rows: Vec<&MatchRow> = rows
            .iter()
            .filter(|r| r.document_filename == document)
            .collect();
        println!("{document}");
        for row in doc_rows.iter().take(MAX_LIST_ITEMS) {
            let label = format!("{}.{}", row.claim_number, row.sequence);
            println!("  {:<26} {}", label, excerpt(&row.feature_text, EXCERPT_WIDTH));
            print_field("related", &row.related_excerpt);
            print_field("core", &row.core_excerpt);
            print_field("result", &row.analysis_result);
        }
        if doc_rows.len() > MAX_LIST_ITEMS {
            println!("  ... and {} more", doc_rows.len() - MAX_LIST_ITEMS);
        }
        println!();
    }
}

pub fn print_judgment(result: &JudgmentResult) {
    println!("=== Judgment ===");
    if !result.is_success() {
        println!(
            "  {:<26} {}",
            "error",
            result.message.as_deref().unwrap_or("analysis failed")
        );
        println!();
        return;
    }

    println!("Conclusion");
    println!("  {:<26} {}", "disclosed", disclosure_label(result.is_disclosed));
    println!("  {:<26} {:.0}", "similarity", result.similarity);
    if let Some(model) = &result.model_used {
        println!("  {:<26} {}", "model", model);
    }
    if let Some(retrieved) = result.retrieved_docs {
        println!("  {:<26} {}", "retrieved passages", retrieved);
    }
    println!();

    print_block("Related Content", &result.related_content);
    print_block("Core Content", &result.core_content);
    print_block("Analysis", &result.analysis_process);
    print_block("Main Differences", &result.main_differences);
}

pub fn print_catalogue(models: &[ModelEntry], datasets: &[DatasetEntry]) {
    println!("Models");
    for model in models {
        let mut flags = Vec::new();
        if model.is_default {
            flags.push("default");
        }
        if !model.configured {
            flags.push("no key");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        };
        println!(
            "  {:<26} {} [{}, {}]{}",
            model.id,
            model.name,
            model.provider.vendor(),
            model.kind,
            flags
        );
    }
    println!();

    println!("Datasets");
    if datasets.is_empty() {
        println!("  (none configured)");
    }
    for dataset in datasets {
        let default = if dataset.is_default { " (default)" } else { "" };
        println!(
            "  {:<26} {} [{}]{}",
            dataset.id, dataset.name, dataset.language, default
        );
    }
    println!();
}

// ── Helpers ──

fn print_field(label: &str, value: &str) {
    if !value.is_empty() {
        println!("    {:<24} {}", label, excerpt(value, EXCERPT_WIDTH));
    }
}

fn print_block(header: &str, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    println!("{header}");
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        println!("  {}", line.trim());
    }
    println!();
}

fn disclosure_label(disclosure: Disclosure) -> &'static str {
    match disclosure {
        Disclosure::Yes => "yes (是)",
        Disclosure::No => "no (否)",
        Disclosure::Pending => "pending (待定)",
    }
}

/// Distinct document names in first-seen order.
fn documents(rows: &[MatchRow]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for row in rows {
        if !seen.contains(&row.document_filename.as_str()) {
            seen.push(&row.document_filename);
        }
    }
    seen
}

/// Single-line excerpt of at most `width` characters.
fn excerpt(text: &str, width: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= width {
        return flat;
    }
    let mut cut: String = flat.chars().take(width).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(doc: &str, seq: u32) -> MatchRow {
        MatchRow {
            claim_number: "1".into(),
            sequence: seq,
            feature_text: "特征".into(),
            document_filename: doc.into(),
            ..Default::default()
        }
    }

    #[test]
    fn excerpt_flattens_and_truncates_by_chars() {
        assert_eq!(excerpt("一 二\n三", 10), "一 二 三");
        assert_eq!(excerpt("处理器连接存储器", 3), "处理器…");
    }

    #[test]
    fn documents_keep_first_seen_order() {
        let rows = vec![row("b.txt", 1), row("a.txt", 1), row("b.txt", 2)];
        assert_eq!(documents(&rows), vec!["b.txt", "a.txt"]);
    }
}
