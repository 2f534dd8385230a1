//! Prompt templates for feature-comparison judgments.

use crate::transport::RetrievedChunk;

/// System prompt sent with streaming judgments.
pub const SYSTEM_PROMPT: &str = "你是一名专利AI助理，专注于协助用户高效处理专利领域相关问题。
你的核心职责涵盖：
1. 专利技术解析：深入剖析专利文献中的技术方案、创新点及具体实施方式。
2. 专利比对分析：进行专利检索，并对比分析不同专利技术方案间的异同点、新颖性和创造性。
3. 审查意见答复：协助用户理解和应对专利审查意见，提供答复思路和陈述建议。";

/// Build the comparison prompt for one feature against comparison content.
///
/// The `<用户需求>` section is only present when `user_instruction` is non-empty.
pub fn build_prompt(feature_text: &str, compare_content: &str, user_instruction: &str) -> String {
    let user_section = if user_instruction.is_empty() {
        String::new()
    } else {
        format!("<用户需求>{user_instruction}</用户需求>")
    };

    format!(
        "
您是一位精于特征比对的专利分析专家，现在需要从输入的技术特征，对比文件内容中找到相关的片段，然后再找到核心相关片段，输出技术特征与核心相关片段的不同。

步骤：
1. 首先找到对比文件内容中与技术特征最相关的片段
2. 列出技术特征，以及核心相关片段里待比对的技术特征。
3. 从多个角度来分析，比如实现的目的、结构功能、效果等。并且如果用户有额外的需求，需要结合用户需求来进行分析。

具体比对的方法：
3.1 主要看对比文件片段的技术特征，是否属于权利要求的技术特征的子集。如果是子集，则权要的技术特征被公开。
3.2 如果权要的技术特征里的某些部分与对比文件不同，则没被公开
3.3 如果权要的技术特征有相同类型的部分，但其作用或者效果不一样，则没被公开
4. 给出相同或者不同的结论

<技术特征>
{feature_text}
</技术特征>

<对比文件>
{compare_content}
</对比文件>

{user_section}

请输出结构化的比对分析结果，包括：
1. 相关片段（找到的所有相关内容）
2. 核心相关片段（最相关的部分）
3. 特征对比分析（详细的对比分析过程）
4. 是否被公开（明确结论：是/否）
5. 相似度评分（0-100的数值）
6. 主要差异点（如果存在）

输出格式要求：
- 使用清晰的段落划分
- 重要结论要明确标注
- 相似度用具体数值表示
"
    )
}

/// Render retrieved chunks as numbered blocks with source and score.
pub fn format_retrieved(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "\n文档 {}:\n来源: {}\n相关度: {:.2}\n内容:\n{}\n",
                i + 1,
                chunk.source,
                chunk.score,
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Append retrieved chunks to the comparison content.
pub fn augment_with_retrieved(compare_content: &str, chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return compare_content.to_string();
    }
    format!(
        "{compare_content}\n\n<检索到的相关文档>\n{}\n</检索到的相关文档>",
        format_retrieved(chunks)
    )
}
