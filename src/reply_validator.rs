//! 按阶段校验模型应答 JSON
//!
//! 修复（json_repair）只保证语法可解析，这里再按阶段校验结构形状；
//! 校验失败由调用方降级处理，不在此处抛错。

use serde_json::Value;
use std::ops::Deref;
use std::sync::LazyLock;

/// 应答校验阶段
pub enum Stage {
    /// 片段级题目提取应答（questions 数组）
    FragmentExtraction,
    /// 单题优化应答（单个对象）
    OptimizedExtraction,
}

static FRAGMENT_EXTRACTION_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "sequenceNumber": { "type": ["integer", "string", "null"] },
                        "questionText": { "type": "string" },
                        "questionType": { "type": ["string", "null"] },
                        "options": {
                            "type": ["array", "null"],
                            "items": { "type": "string" }
                        },
                        "answer": { "type": ["string", "null"] },
                        "passageId": { "type": ["string", "null"] }
                    },
                    "required": ["questionText"],
                    "additionalProperties": true
                }
            }
        },
        "required": ["questions"],
        "additionalProperties": true
    })
});

static OPTIMIZED_EXTRACTION_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "questionText": { "type": ["string", "null"] },
            "questionType": { "type": ["string", "null"] },
            "options": {
                "type": ["array", "null"],
                "items": { "type": "string" }
            },
            "correctAnswer": { "type": ["string", "null"] },
            "confidence": { "type": ["number", "null"] }
        },
        "required": [],
        "additionalProperties": true
    })
});

/// 按阶段校验 JSON 数据
pub fn validate(stage: Stage, data: &Value) -> Result<(), Vec<String>> {
    let schema = match stage {
        Stage::FragmentExtraction => FRAGMENT_EXTRACTION_SCHEMA.deref(),
        Stage::OptimizedExtraction => OPTIMIZED_EXTRACTION_SCHEMA.deref(),
    };
    let compiled = jsonschema::validator_for(schema).map_err(|e| vec![e.to_string()])?;
    let msgs: Vec<String> = compiled.iter_errors(data).map(|e| e.to_string()).collect();
    if msgs.is_empty() {
        Ok(())
    } else {
        Err(msgs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fragment_reply_accepts_minimal_shape() {
        let data = json!({"questions": [{"questionText": "t"}]});
        assert!(validate(Stage::FragmentExtraction, &data).is_ok());
    }

    #[test]
    fn test_fragment_reply_rejects_missing_questions() {
        let data = json!({"items": []});
        assert!(validate(Stage::FragmentExtraction, &data).is_err());
    }

    #[test]
    fn test_fragment_reply_rejects_question_without_text() {
        let data = json!({"questions": [{"questionType": "choice"}]});
        assert!(validate(Stage::FragmentExtraction, &data).is_err());
    }

    #[test]
    fn test_optimized_reply_tolerates_partial_fields() {
        let data = json!({"questionText": "t", "confidence": 0.9});
        assert!(validate(Stage::OptimizedExtraction, &data).is_ok());
    }

    #[test]
    fn test_optimized_reply_rejects_non_object() {
        let data = json!([1, 2, 3]);
        assert!(validate(Stage::OptimizedExtraction, &data).is_err());
    }
}
