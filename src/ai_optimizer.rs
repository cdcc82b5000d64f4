//! AI 校验与优化门
//!
//! 先做结构完整性检查并折算校验置信度，与提取置信度取均值；
//! 均值低于阈值才调用补全模型要一份修正后的结构化 JSON，且只在
//! 模型自报置信度严格高于现值时采纳。任何调用/解析失败都降级为
//! 建议字符串，绝不向上抛。

use crate::llm_client::CompletionClient;
use crate::models::{
    ExtractionResult, FormatDetectionResult, QuestionType, TokenUsage, ValidationResult,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// 结构完整性问题的专项扣分
const PENALTY_MISSING_TEXT: f64 = 0.3;
const PENALTY_MISSING_OPTIONS: f64 = 0.3;
const PENALTY_MISSING_ANSWER: f64 = 0.2;
/// 每条问题的基础扣分
const PENALTY_PER_ISSUE: f64 = 0.15;

/// 校验入口：结构检查 + 置信度门控的 AI 优化
pub async fn validate(
    text: &str,
    format: &FormatDetectionResult,
    extraction: ExtractionResult,
    client: &dyn CompletionClient,
    threshold: f64,
) -> ValidationResult {
    let (issues, validation_confidence) = structural_check(&extraction);
    let final_confidence = (extraction.confidence + validation_confidence) / 2.0;

    debug!(
        "[AiOptimizer] 结构校验: {} 条问题, 提取 {:.3} / 校验 {:.3} / 综合 {:.3}",
        issues.len(),
        extraction.confidence,
        validation_confidence,
        final_confidence
    );

    // 置信度达标：跳过 AI，两个分支产出同一结果类型
    if final_confidence >= threshold {
        return ValidationResult {
            is_valid: issues.is_empty(),
            confidence: final_confidence,
            validation_method: "structural".to_string(),
            optimized_result: extraction,
            ai_suggestion: None,
            issues,
        };
    }

    match optimize_with_ai(text, &extraction, client).await {
        Some((optimized, usage)) if optimized.confidence > final_confidence => {
            info!(
                "[AiOptimizer] 采纳 AI 优化结果: {:.3} -> {:.3} (tokens {}/{})",
                final_confidence,
                optimized.confidence,
                usage.prompt_tokens,
                usage.completion_tokens
            );
            let confidence = optimized.confidence;
            ValidationResult {
                is_valid: issues.is_empty(),
                confidence,
                validation_method: "structural+ai".to_string(),
                optimized_result: optimized,
                ai_suggestion: None,
                issues,
            }
        }
        Some((discarded, _)) => {
            debug!(
                "[AiOptimizer] AI 结果置信度 {:.3} 未超过现值 {:.3}，丢弃",
                discarded.confidence, final_confidence
            );
            ValidationResult {
                is_valid: issues.is_empty(),
                confidence: final_confidence,
                validation_method: "structural+ai".to_string(),
                optimized_result: extraction,
                ai_suggestion: Some(format!(
                    "AI 优化结果置信度 {:.2} 未超过现有 {:.2}，已保留原提取",
                    discarded.confidence, final_confidence
                )),
                issues,
            }
        }
        None => ValidationResult {
            is_valid: issues.is_empty(),
            confidence: final_confidence,
            validation_method: "structural+ai".to_string(),
            optimized_result: extraction,
            ai_suggestion: Some("AI 优化调用失败，已保留原提取".to_string()),
            issues,
        },
    }
}

/// 结构完整性检查：返回问题列表与校验置信度
fn structural_check(extraction: &ExtractionResult) -> (Vec<String>, f64) {
    let mut issues = Vec::new();
    let mut penalty = 0.0;

    if extraction.question_text.trim().is_empty() {
        issues.push("题干为空".to_string());
        penalty += PENALTY_MISSING_TEXT;
    }
    if extraction.question_type.is_choice_like() && extraction.options.len() < 2 {
        issues.push(format!("选项类题型仅有 {} 个选项", extraction.options.len()));
        penalty += PENALTY_MISSING_OPTIONS;
    }
    if extraction
        .correct_answer
        .as_deref()
        .map(|a| a.trim().is_empty())
        .unwrap_or(true)
    {
        issues.push("答案缺失".to_string());
        penalty += PENALTY_MISSING_ANSWER;
    }

    let confidence = (1.0 - PENALTY_PER_ISSUE * issues.len() as f64 - penalty).max(0.0);
    (issues, confidence)
}

/// 调用补全模型要一份修正后的提取结果；失败返回 None
pub async fn optimize_with_ai(
    text: &str,
    extraction: &ExtractionResult,
    client: &dyn CompletionClient,
) -> Option<(ExtractionResult, TokenUsage)> {
    let prompt = build_optimize_prompt(text, extraction);

    let completion = match client.complete(&prompt).await {
        Ok(c) => c,
        Err(e) => {
            warn!("[AiOptimizer] 补全调用失败: {}", e);
            return None;
        }
    };

    let parsed = match parse_optimized_reply(&completion.content, extraction) {
        Some(p) => p,
        None => {
            warn!("[AiOptimizer] AI 应答无法解析为优化结果");
            return None;
        }
    };

    Some((parsed, completion.usage))
}

fn build_optimize_prompt(text: &str, extraction: &ExtractionResult) -> String {
    let current = serde_json::to_string_pretty(extraction).unwrap_or_default();
    format!(
        r#"以下是一道考试题目的原始文本和当前自动提取结果。请修正提取结果中的错误或缺失。

**原始文本**：
{}

**当前提取结果**：
{}

**输出要求**：
只输出一个 JSON 对象（不要其他内容）：

```json
{{
  "questionText": "修正后的题干",
  "questionType": "listening|choice|fill_blank|reading|translation|writing|matching",
  "options": ["选项A内容", "选项B内容"],
  "correctAnswer": "答案（没有则为 null）",
  "metadata": {{}},
  "confidence": 0.85
}}
```

**规则**：
1. confidence 为你对修正结果的置信度，取值 [0,1]
2. 非选项类题目 options 输出空数组
3. 原文没有的信息不要编造，宁可留空"#,
        text, current
    )
}

/// 从应答中取最外层 `{…}` 并映射回 ExtractionResult
fn parse_optimized_reply(reply: &str, base: &ExtractionResult) -> Option<ExtractionResult> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&reply[start..=end]).ok()?;
    if let Err(errors) = crate::reply_validator::validate(
        crate::reply_validator::Stage::OptimizedExtraction,
        &value,
    ) {
        warn!("[AiOptimizer] 优化应答未通过形状校验: {:?}", errors);
        return None;
    }
    let obj = value.as_object()?;

    let question_text = obj
        .get("questionText")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| base.question_text.clone());

    let question_type = obj
        .get("questionType")
        .and_then(|v| v.as_str())
        .map(QuestionType::from_str)
        .filter(|qt| *qt != QuestionType::Unknown)
        .unwrap_or(base.question_type);

    let options: Vec<String> = obj
        .get("options")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_else(|| base.options.clone());

    let correct_answer = obj
        .get("correctAnswer")
        .or_else(|| obj.get("answer"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| base.correct_answer.clone());

    let metadata: Map<String, Value> = obj
        .get("metadata")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_else(|| base.metadata.clone());

    let confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    Some(ExtractionResult {
        question_type,
        sub_type: base.sub_type.clone(),
        question_text,
        options,
        correct_answer,
        metadata,
        confidence,
        extraction_rule: "ai_optimized".to_string(),
    })
}
