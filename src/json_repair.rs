//! AI 应答 JSON 修复工具
//!
//! 一串彼此独立、幂等的文本变换按固定顺序执行，保证输出总能被
//! serde_json 解析；最坏情况回退 `{"questions": []}`。本函数不抛错。

use log::{debug, warn};
use regex::Regex;
use std::sync::LazyLock;

static RE_CODE_FENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*```[\w-]*\s*$").expect("static regex"));
static RE_TILDE_FENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*~~~[\w-]*\s*$").expect("static regex"));
static RE_BACKTICK_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```").expect("static regex"));
static RE_RULE_OR_COMMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:---+|\*\*\*+|//[^\n]*)\s*$").expect("static regex"));
static RE_TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("static regex"));
static RE_MISSING_COMMA_BEFORE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    // 标量值结尾后直接换行接常见字段名：补逗号
    Regex::new(
        r#"(?s)(["\d\]}]|true|false|null)(\s*\n\s*"(?:sequenceNumber|questionText|questionType|options|correctOptions|answer|difficulty|knowledgePoint|partName|passageId|groupId|groupType|confidence)")"#,
    )
    .expect("static regex")
});
static RE_QUESTION_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[^{}]*"sequenceNumber"[^{}]*\}"#).expect("static regex")
});

/// 空结果兜底
pub const EMPTY_QUESTIONS_JSON: &str = r#"{"questions": []}"#;

/// 修复可能畸形的模型应答，返回必可解析的 JSON 字符串
pub fn repair(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return EMPTY_QUESTIONS_JSON.to_string();
    }

    // 已是含 questions 键的合法 JSON：原样返回，保证幂等
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.get("questions").is_some() {
            return trimmed.to_string();
        }
    }

    let mut s = trimmed.to_string();
    s = strip_fences(&s);
    s = clip_to_outer_object(&s);
    s = RE_RULE_OR_COMMENT_LINE.replace_all(&s, "").to_string();
    s = RE_TRAILING_COMMA.replace_all(&s, "$1").to_string();
    s = RE_MISSING_COMMA_BEFORE_KEY.replace_all(&s, "$1,$2").to_string();
    s = balance_questions_array(&s);
    s = close_dangling_braces(&s);

    match serde_json::from_str::<serde_json::Value>(&s) {
        Ok(value) if value.get("questions").is_some() => s,
        Ok(_) => {
            debug!("[JsonRepair] 修复后缺少 questions 键，尝试重构");
            reconstruct_questions(&s)
        }
        Err(e) => {
            warn!("[JsonRepair] 常规修复仍不可解析: {}，进入对象级重构", e);
            reconstruct_questions(&s)
        }
    }
}

fn strip_fences(s: &str) -> String {
    let mut out = RE_CODE_FENCE_LINE.replace_all(s, "").to_string();
    out = RE_TILDE_FENCE_LINE.replace_all(&out, "").to_string();
    out = RE_BACKTICK_INLINE.replace_all(&out, "").to_string();
    out.trim().to_string()
}

/// 截取最外层 `{…}`；只找到一侧时不动
fn clip_to_outer_object(s: &str) -> String {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => s[start..=end].to_string(),
        _ => s.to_string(),
    }
}

/// 对 `questions` 数组补齐缺失的 `]`
fn balance_questions_array(s: &str) -> String {
    let Some(key_pos) = s.find("\"questions\"") else {
        return s.to_string();
    };
    let Some(open_rel) = s[key_pos..].find('[') else {
        return s.to_string();
    };
    let start = key_pos + open_rel;

    let mut sq_depth: i32 = 0;
    let mut curly_depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => sq_depth += 1,
            ']' => {
                sq_depth -= 1;
                if sq_depth == 0 {
                    return s.to_string();
                }
            }
            '{' => curly_depth += 1,
            '}' => {
                curly_depth -= 1;
                // 相对深度转负：这个 `}` 属于外层对象，缺失的 `]` 应插在它之前
                if curly_depth < 0 {
                    let pos = start + i;
                    let missing = "]".repeat(sq_depth.max(0) as usize);
                    let mut out = String::with_capacity(s.len() + missing.len());
                    out.push_str(&s[..pos]);
                    out.push_str(&missing);
                    out.push_str(&s[pos..]);
                    return out;
                }
            }
            _ => {}
        }
    }

    // 扫到末尾仍未闭合：截断型应答，直接在末尾补齐
    format!("{}{}", s, "]".repeat(sq_depth.max(0) as usize))
}

/// 末尾补齐未闭合的 `}`
fn close_dangling_braces(s: &str) -> String {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for ch in s.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    if depth > 0 {
        format!("{}{}", s, "}".repeat(depth as usize))
    } else {
        s.to_string()
    }
}

/// 结构不可恢复时按 `{"sequenceNumber": …}` 形状抢救单个题目对象
fn reconstruct_questions(s: &str) -> String {
    let objects: Vec<serde_json::Value> = RE_QUESTION_OBJECT
        .find_iter(s)
        .filter_map(|m| serde_json::from_str(m.as_str()).ok())
        .collect();

    if objects.is_empty() {
        debug!("[JsonRepair] 未抢救到任何题目对象，返回空兜底");
        return EMPTY_QUESTIONS_JSON.to_string();
    }

    let wrapped = serde_json::json!({ "questions": objects });
    serde_json::to_string(&wrapped).unwrap_or_else(|_| EMPTY_QUESTIONS_JSON.to_string())
}
