//! 格式检测器
//!
//! 对单个文本片段逐条套用检测规则库打分，返回最高置信度的题型。
//! 纯函数：无副作用、不抛错，无规则命中时返回 UNKNOWN/0.0。

use crate::format_rules::DETECTION_RULES;
use crate::models::FormatDetectionResult;
use serde_json::{json, Map};
use tracing::debug;

/// 候选置信度下限：低于等于该值的候选直接丢弃
const MIN_CANDIDATE_CONFIDENCE: f64 = 0.3;

/// 短文本惩罚阈值与系数
const SHORT_TEXT_LEN: usize = 50;
const SHORT_TEXT_FACTOR: f64 = 0.9;

/// 长文本奖励阈值与系数
const LONG_TEXT_LEN: usize = 500;
const LONG_TEXT_FACTOR: f64 = 1.05;

/// 检测文本片段的题目格式
pub fn detect_format(text: &str) -> FormatDetectionResult {
    let text_len = text.chars().count();
    let mut best: Option<FormatDetectionResult> = None;

    for rule in DETECTION_RULES.iter() {
        let matched = rule
            .patterns
            .iter()
            .filter(|p| p.is_match(text))
            .count();
        if matched == 0 {
            continue;
        }

        let ratio = matched as f64 / rule.patterns.len() as f64;
        let mut confidence = rule.base_confidence * ratio;
        if text_len < SHORT_TEXT_LEN {
            confidence *= SHORT_TEXT_FACTOR;
        } else if text_len > LONG_TEXT_LEN {
            confidence *= LONG_TEXT_FACTOR;
        }
        let confidence = confidence.min(1.0);

        if confidence <= MIN_CANDIDATE_CONFIDENCE {
            continue;
        }

        // 严格大于才替换：注册顺序即平手裁决序
        let is_better = match &best {
            Some(b) => confidence > b.confidence,
            None => true,
        };
        if is_better {
            let mut features = Map::new();
            features.insert("matched_patterns".to_string(), json!(matched));
            features.insert("total_patterns".to_string(), json!(rule.patterns.len()));
            features.insert("text_length".to_string(), json!(text_len));
            best = Some(FormatDetectionResult {
                question_type: rule.question_type,
                sub_type: rule.sub_type.to_string(),
                confidence,
                features,
                detection_rule: format!("{}_{}", rule.question_type.as_str(), rule.sub_type),
            });
        }
    }

    match best {
        Some(result) => {
            debug!(
                "[FormatDetector] 命中规则 {} (置信度 {:.3})",
                result.detection_rule, result.confidence
            );
            result
        }
        None => FormatDetectionResult::unknown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionType;

    #[test]
    fn test_unknown_on_no_match() {
        let result = detect_format("壹贰叁肆伍陆柒捌玖拾");
        assert_eq!(result.question_type, QuestionType::Unknown);
        assert_eq!(result.sub_type, "未知");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_confidence_always_in_unit_interval() {
        let samples = [
            "",
            "21. ____ (happy)\n22. ____ (quick)",
            "What does the man mean?\nA. He is tired.\nB. He is busy.",
            "Translate the following sentences into English.\n1. 我们应该珍惜时间。(cherish)",
            "Write an English composition in 120-150 words according to the situation given below.",
        ];
        for s in samples {
            let r = detect_format(s);
            assert!((0.0..=1.0).contains(&r.confidence), "out of range: {}", s);
        }
    }

    #[test]
    fn test_zero_confidence_iff_nothing_matches() {
        let r = detect_format("");
        assert_eq!(r.confidence, 0.0);
        let r = detect_format("21. ____ (happy)");
        assert!(r.confidence > 0.0);
    }

    #[test]
    fn test_grammar_blank_fragment_detected_as_fill_blank() {
        let r = detect_format("21. ____ (happy)\n22. ____ (quick)");
        assert_eq!(r.question_type, QuestionType::FillBlank);
    }

    #[test]
    fn test_listening_question_detected() {
        let text = "1. What does the man mean?\nA. He missed the bus.\nB. He will walk home.\nC. He lost his ticket.\nD. He is waiting for the woman.";
        let r = detect_format(text);
        assert_eq!(r.question_type, QuestionType::Listening);
    }

    #[test]
    fn test_translation_directive_detected() {
        let text = "Translate the following sentences into English, using the words given in the brackets.\n1. 我们应该珍惜时间。(cherish)";
        let r = detect_format(text);
        assert_eq!(r.question_type, QuestionType::Translation);
        assert!(r.confidence > 0.5);
    }

    #[test]
    fn test_summary_writing_detected() {
        let text = "Summary Writing\nDirections: Read the following passage. Summarize the main idea of the passage in no more than 60 words. Use your own words as far as possible.";
        let r = detect_format(text);
        assert_eq!(r.question_type, QuestionType::Writing);
        assert_eq!(r.sub_type, "概要写作");
    }

    #[test]
    fn test_deterministic_on_same_input() {
        let text = "Questions 11 and 12 are based on the following passage.";
        let a = detect_format(text);
        let b = detect_format(text);
        assert_eq!(a.detection_rule, b.detection_rule);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_short_text_penalty_applies() {
        // 同一规则，短文本乘 0.9
        let short = "Write a summary";
        let r = detect_format(short);
        if r.confidence > 0.0 {
            assert!(r.confidence < 1.0);
        }
    }
}
