//! 结构提取器
//!
//! 按检测结果查提取规则，对同一文本独立套用题干/选项/答案/元数据
//! 四个可选模式；无专用规则时走通用兜底。置信度只来自字段完整度。

use crate::format_rules::{find_extraction_rule, ExtractionRule};
use crate::models::{ExtractionResult, FormatDetectionResult};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;
use tracing::debug;

/// 规则内部异常时的降级置信度
const DEGRADED_CONFIDENCE: f64 = 0.3;

/// 通用兜底的固定置信度
const GENERIC_FALLBACK_CONFIDENCE: f64 = 0.5;

static GENERIC_QUESTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d{1,3})\s*[.、．]\s*(.+)$").expect("static regex"));
static GENERIC_OPTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*([A-D])[.、．)）]\s*(.+?)\s*$").expect("static regex"));
static GENERIC_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G]{1,4}|[^\n]{1,60})").expect("static regex")
});

/// 对片段执行结构提取
///
/// 单条规则内部的异常被就地兜住并降级，不向片段之外传播。
pub fn extract_structure(text: &str, format: &FormatDetectionResult) -> ExtractionResult {
    match find_extraction_rule(format.question_type, &format.sub_type) {
        Some(rule) => {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                apply_rule(text, format, rule)
            }))
            .unwrap_or_else(|_| degraded_result(format))
        }
        None => generic_extract(text, format),
    }
}

fn apply_rule(
    text: &str,
    format: &FormatDetectionResult,
    rule: &'static ExtractionRule,
) -> ExtractionResult {
    let mut question_text = String::new();
    let mut options: Vec<String> = Vec::new();
    let mut correct_answer: Option<String> = None;
    let mut metadata: Map<String, Value> = Map::new();
    let mut issue_count = 0usize;

    // 四个字段彼此独立，单个模式失配只留空该字段
    if let Some(p) = &rule.question_pattern {
        match p.captures(text) {
            Some(cap) => {
                question_text = cap
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
            }
            None => issue_count += 1,
        }
    }

    if let Some(p) = &rule.options_pattern {
        options = p
            .captures_iter(text)
            .filter_map(|cap| cap.get(2).map(|m| m.as_str().trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect();
        if options.is_empty() {
            issue_count += 1;
        }
    }

    if let Some(p) = &rule.answer_pattern {
        correct_answer = p
            .captures(text)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());
    }

    if let Some(p) = &rule.metadata_pattern {
        if let Some(cap) = p.captures(text) {
            if let Some(m) = cap.get(1) {
                metadata.insert(rule.metadata_key.to_string(), json!(m.as_str().trim()));
            }
        }
    }

    let confidence = completeness_confidence(&question_text, &options, &correct_answer, &metadata);
    debug!(
        "[StructureExtractor] 规则 {} 提取完成 (issues={}, 置信度 {:.3})",
        rule.key, issue_count, confidence
    );

    ExtractionResult {
        question_type: format.question_type,
        sub_type: format.sub_type.clone(),
        question_text,
        options,
        correct_answer,
        metadata,
        confidence,
        extraction_rule: rule.key.clone(),
    }
}

/// 无专用规则时的通用兜底：`<编号>. <题干>` + 字母选项 + `Answer: X`
fn generic_extract(text: &str, format: &FormatDetectionResult) -> ExtractionResult {
    let question_text = GENERIC_QUESTION
        .captures(text)
        .and_then(|cap| cap.get(2))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let options: Vec<String> = GENERIC_OPTIONS
        .captures_iter(text)
        .filter_map(|cap| cap.get(2).map(|m| m.as_str().trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect();

    let correct_answer = GENERIC_ANSWER
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    ExtractionResult {
        question_type: format.question_type,
        sub_type: format.sub_type.clone(),
        question_text,
        options,
        correct_answer,
        metadata: Map::new(),
        confidence: GENERIC_FALLBACK_CONFIDENCE,
        extraction_rule: "generic_fallback".to_string(),
    }
}

/// 字段完整度置信度公式
///
/// +0.3 题干非空；+0.3 选项 2–6 个（其余非零 +0.1）；+0.2 有答案；
/// +0.1 元数据非空；+0.1 题干长度 10–500；总和截断到 1.0。
fn completeness_confidence(
    question_text: &str,
    options: &[String],
    correct_answer: &Option<String>,
    metadata: &Map<String, Value>,
) -> f64 {
    let mut confidence = 0.0;
    if !question_text.is_empty() {
        confidence += 0.3;
    }
    match options.len() {
        2..=6 => confidence += 0.3,
        0 => {}
        _ => confidence += 0.1,
    }
    if correct_answer.is_some() {
        confidence += 0.2;
    }
    if !metadata.is_empty() {
        confidence += 0.1;
    }
    let text_len = question_text.chars().count();
    if (10..=500).contains(&text_len) {
        confidence += 0.1;
    }
    f64::min(confidence, 1.0)
}

/// 规则执行被 panic 边界兜住时的降级结果（保留检测类型，置信度压到定值）
fn degraded_result(format: &FormatDetectionResult) -> ExtractionResult {
    ExtractionResult {
        question_type: format.question_type,
        sub_type: format.sub_type.clone(),
        question_text: String::new(),
        options: Vec::new(),
        correct_answer: None,
        metadata: Map::new(),
        confidence: DEGRADED_CONFIDENCE,
        extraction_rule: "degraded".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_detector::detect_format;
    use crate::models::QuestionType;

    fn detection(question_type: QuestionType, sub_type: &str) -> FormatDetectionResult {
        FormatDetectionResult {
            question_type,
            sub_type: sub_type.to_string(),
            confidence: 0.8,
            features: Map::new(),
            detection_rule: String::new(),
        }
    }

    #[test]
    fn test_choice_extraction_full_fields() {
        let text = "1. He ____ to school yesterday.\nA. go\nB. goes\nC. went\nD. gone\nAnswer: C\n（2分）";
        let fmt = detection(QuestionType::Choice, "单项选择");
        let r = extract_structure(text, &fmt);
        assert_eq!(r.question_text, "He ____ to school yesterday.");
        assert_eq!(r.options.len(), 4);
        assert_eq!(r.correct_answer.as_deref(), Some("C"));
        assert_eq!(r.metadata.get("score"), Some(&json!("2")));
        // 0.3 题干 + 0.3 选项 + 0.2 答案 + 0.1 元数据 + 0.1 长度
        assert!((r.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_fields_lower_confidence() {
        let text = "1. He ____ to school yesterday.\nA. go\nB. goes\nC. went\nD. gone";
        let fmt = detection(QuestionType::Choice, "单项选择");
        let r = extract_structure(text, &fmt);
        assert!(r.correct_answer.is_none());
        assert!((r.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_generic_fallback_fixed_confidence() {
        let fmt = detection(QuestionType::Unknown, "未知");
        let r = extract_structure("5. Something here\nA. one\nB. two\nAnswer: A", &fmt);
        assert_eq!(r.extraction_rule, "generic_fallback");
        assert_eq!(r.confidence, GENERIC_FALLBACK_CONFIDENCE);
        assert_eq!(r.question_text, "Something here");
        assert_eq!(r.options, vec!["one", "two"]);
        assert_eq!(r.correct_answer.as_deref(), Some("A"));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "1. 我们应该珍惜时间。(cherish)";
        let fmt = detection(QuestionType::Translation, "中译英");
        let a = extract_structure(text, &fmt);
        let b = extract_structure(text, &fmt);
        assert_eq!(a, b);
    }

    #[test]
    fn test_translation_hint_word_into_metadata() {
        let text = "1. 我们应该珍惜时间。(cherish)";
        let fmt = detection(QuestionType::Translation, "中译英");
        let r = extract_structure(text, &fmt);
        assert_eq!(r.question_text, "我们应该珍惜时间。");
        assert_eq!(r.metadata.get("hint_word"), Some(&json!("cherish")));
    }

    #[test]
    fn test_detect_then_extract_pipeline_shape() {
        let text = "1. What does the man mean?\nA. He missed the bus.\nB. He will walk home.\nC. He lost his ticket.\nD. He is waiting for the woman.";
        let fmt = detect_format(text);
        let r = extract_structure(text, &fmt);
        assert_eq!(r.question_type, fmt.question_type);
        assert!(!r.options.is_empty());
    }

    #[test]
    fn test_option_count_out_of_band_gets_small_bonus() {
        // 7 个选项：+0.1 而非 +0.3
        let text = "1. Pick exactly one of these.\nA. a\nB. b\nC. c\nD. d\nE. e\nF. f\nG. g";
        let fmt = detection(QuestionType::Choice, "单项选择");
        let r = extract_structure(text, &fmt);
        assert_eq!(r.options.len(), 7);
        // 0.3 题干 + 0.1 选项 + 0.1 长度
        assert!((r.confidence - 0.5).abs() < 1e-9);
    }
}
