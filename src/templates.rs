//! 试卷模板注册表与匹配器
//!
//! 模板匹配只消费标题区与全文关键词证据，打分独立可加、确定性；
//! 每模板的结构规则表仅供结构校验器使用，匹配器不读取。

use crate::models::{ExamStructureRule, ExamTemplate, QuestionType};
use std::sync::LazyLock;
use tracing::debug;

/// 标题区：前 8 个非空行
const TITLE_AREA_LINES: usize = 8;

/// 匹配阈值的默认值（编排器使用）
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;

/// 默认候选模板（平手时靠前者胜出，故不分组版排在分组版之前）
pub const DEFAULT_CANDIDATES: [ExamTemplate; 5] = [
    ExamTemplate::SeniorUngrouped,
    ExamTemplate::SeniorGrouped,
    ExamTemplate::CertificationBasic,
    ExamTemplate::CertificationAdvanced,
    ExamTemplate::Generic,
];

// ============================================================================
// 匹配器
// ============================================================================

/// 在候选模板中选出得分最高且达到阈值者；否则回退通用模板
pub fn choose_template(
    text: &str,
    candidates: &[ExamTemplate],
    threshold: f64,
) -> ExamTemplate {
    let lower = text.to_lowercase();
    let title_area = title_area(&lower);

    let mut best: Option<(ExamTemplate, f64)> = None;
    for template in candidates {
        let score = score_template(&lower, &title_area, *template);
        debug!(
            "[TemplateMatcher] {} 得分 {:.2}",
            template.as_str(),
            score
        );
        let is_better = match best {
            Some((_, s)) => score > s,
            None => true,
        };
        if is_better {
            best = Some((*template, score));
        }
    }

    match best {
        Some((template, score)) if score >= threshold => template,
        _ => ExamTemplate::Generic,
    }
}

fn title_area(lower: &str) -> String {
    lower
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .take(TITLE_AREA_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

/// 模板证据打分：独立加权信号求和后截断到 1.0
pub fn score_template(lower: &str, title_area: &str, template: ExamTemplate) -> f64 {
    let mut score: f64 = 0.0;

    match template {
        ExamTemplate::SeniorGrouped | ExamTemplate::SeniorUngrouped => {
            // 标题区特征短语
            if contains_any(title_area, &["高考", "senior high", "高三", "英语试卷", "高中英语"]) {
                score += 0.5;
            }
            // 分节标签共现
            if lower.contains("listening comprehension") && lower.contains("grammar and vocabulary")
            {
                score += 0.3;
            }
            if lower.contains("summary writing") && lower.contains("guided writing") {
                score += 0.15;
            }
            // 听力共享材料证据只加给分组版
            if template == ExamTemplate::SeniorGrouped && has_group_phrase(lower) {
                score += 0.3;
            }
        }
        ExamTemplate::CertificationBasic => {
            if contains_any(
                title_area,
                &["大学英语四级", "cet-4", "cet4", "college english test band four", "band 4"],
            ) {
                score += 0.6;
            }
            if lower.contains("part i") && lower.contains("part ii") {
                score += 0.2;
            }
        }
        ExamTemplate::CertificationAdvanced => {
            if contains_any(
                title_area,
                &["大学英语六级", "cet-6", "cet6", "college english test band six", "band 6"],
            ) {
                score += 0.6;
            }
            if lower.contains("part i") && lower.contains("part ii") {
                score += 0.2;
            }
        }
        ExamTemplate::Generic => {}
    }

    // 通用指令性措辞的小额奖励
    if lower.contains("directions:") || lower.contains("答题要求") {
        score += 0.05;
    }

    score.min(1.0)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn has_group_phrase(lower: &str) -> bool {
    lower.contains("are based on") && lower.contains("questions")
        || lower.contains("根据你听到的")
}

// ============================================================================
// 结构规则注册表
// ============================================================================

const LISTENING_ONLY: &[QuestionType] = &[QuestionType::Listening];
const GRAMMAR_TYPES: &[QuestionType] = &[QuestionType::FillBlank, QuestionType::Choice];
const VOCAB_TYPES: &[QuestionType] = &[
    QuestionType::Choice,
    QuestionType::Matching,
    QuestionType::FillBlank,
];
const READING_TYPES: &[QuestionType] = &[QuestionType::Reading, QuestionType::Choice];
const READING_MATCH_TYPES: &[QuestionType] = &[QuestionType::Matching, QuestionType::Reading];
const WRITING_ONLY: &[QuestionType] = &[QuestionType::Writing];
const TRANSLATION_ONLY: &[QuestionType] = &[QuestionType::Translation];
const CERT_MIXED: &[QuestionType] = &[
    QuestionType::FillBlank,
    QuestionType::Translation,
    QuestionType::Choice,
];

fn senior_rules(template: ExamTemplate) -> Vec<ExamStructureRule> {
    let prefix = template.as_str();
    let id = |name: &str| -> &'static str {
        Box::leak(format!("{}_{}", prefix, name).into_boxed_str())
    };
    vec![
        ExamStructureRule {
            id: id("listening_a"),
            template,
            order_in_exam: 1,
            min_question_count: Some(7),
            max_question_count: Some(10),
            allowed_question_types: LISTENING_ONLY,
            section_keywords: &["Listening", "Section A"],
            instruction_keywords: &["short conversations"],
        },
        ExamStructureRule {
            id: id("listening_b"),
            template,
            order_in_exam: 2,
            min_question_count: Some(6),
            max_question_count: Some(10),
            allowed_question_types: LISTENING_ONLY,
            section_keywords: &["Listening", "Section B"],
            instruction_keywords: &["passages", "longer conversation"],
        },
        ExamStructureRule {
            id: id("grammar"),
            template,
            order_in_exam: 3,
            min_question_count: Some(8),
            max_question_count: Some(10),
            allowed_question_types: GRAMMAR_TYPES,
            section_keywords: &["Grammar"],
            instruction_keywords: &["proper form", "fill in the blanks"],
        },
        ExamStructureRule {
            id: id("vocabulary"),
            template,
            order_in_exam: 4,
            min_question_count: Some(8),
            max_question_count: Some(10),
            allowed_question_types: VOCAB_TYPES,
            section_keywords: &["Vocabulary"],
            instruction_keywords: &["can only be used once"],
        },
        ExamStructureRule {
            id: id("reading_cloze"),
            template,
            order_in_exam: 5,
            min_question_count: Some(10),
            max_question_count: Some(15),
            allowed_question_types: READING_TYPES,
            section_keywords: &["Reading", "Section A"],
            instruction_keywords: &["word or phrase that best completes"],
        },
        ExamStructureRule {
            id: id("reading_passages"),
            template,
            order_in_exam: 6,
            min_question_count: Some(8),
            max_question_count: Some(15),
            allowed_question_types: READING_TYPES,
            section_keywords: &["Reading", "Section B"],
            instruction_keywords: &["are based on the following passage"],
        },
        ExamStructureRule {
            id: id("reading_match"),
            template,
            order_in_exam: 7,
            min_question_count: Some(3),
            max_question_count: Some(5),
            allowed_question_types: READING_MATCH_TYPES,
            section_keywords: &["Reading", "Section C"],
            instruction_keywords: &["two more than you need"],
        },
        ExamStructureRule {
            id: id("summary"),
            template,
            order_in_exam: 8,
            min_question_count: Some(1),
            max_question_count: Some(1),
            allowed_question_types: WRITING_ONLY,
            section_keywords: &["Summary Writing"],
            instruction_keywords: &["summarize"],
        },
        ExamStructureRule {
            id: id("translation"),
            template,
            order_in_exam: 9,
            min_question_count: Some(3),
            max_question_count: Some(6),
            allowed_question_types: TRANSLATION_ONLY,
            section_keywords: &["Translation"],
            instruction_keywords: &["translate the following sentences"],
        },
        ExamStructureRule {
            id: id("guided_writing"),
            template,
            order_in_exam: 10,
            min_question_count: Some(1),
            max_question_count: Some(1),
            allowed_question_types: WRITING_ONLY,
            section_keywords: &["Guided Writing"],
            instruction_keywords: &["write an english composition"],
        },
    ]
}

fn certification_rules(template: ExamTemplate) -> Vec<ExamStructureRule> {
    let prefix = template.as_str();
    let id = |name: &str| -> &'static str {
        Box::leak(format!("{}_{}", prefix, name).into_boxed_str())
    };
    let (listening_max, reading_max) = match template {
        ExamTemplate::CertificationAdvanced => (25, 30),
        _ => (30, 30),
    };
    vec![
        ExamStructureRule {
            id: id("listening"),
            template,
            order_in_exam: 1,
            min_question_count: Some(10),
            max_question_count: Some(listening_max),
            allowed_question_types: LISTENING_ONLY,
            section_keywords: &["Listening"],
            instruction_keywords: &["you will hear"],
        },
        ExamStructureRule {
            id: id("reading"),
            template,
            order_in_exam: 2,
            min_question_count: Some(10),
            max_question_count: Some(reading_max),
            allowed_question_types: READING_TYPES,
            section_keywords: &["Reading"],
            instruction_keywords: &["passage"],
        },
        ExamStructureRule {
            id: id("integrated"),
            template,
            order_in_exam: 3,
            min_question_count: Some(1),
            max_question_count: Some(25),
            allowed_question_types: CERT_MIXED,
            section_keywords: &["Translation", "Cloze"],
            instruction_keywords: &["translate", "blank"],
        },
        ExamStructureRule {
            id: id("writing"),
            template,
            order_in_exam: 4,
            min_question_count: Some(1),
            max_question_count: Some(2),
            allowed_question_types: WRITING_ONLY,
            section_keywords: &["Writing"],
            instruction_keywords: &["write a", "composition", "essay"],
        },
    ]
}

static SENIOR_GROUPED_RULES: LazyLock<Vec<ExamStructureRule>> =
    LazyLock::new(|| senior_rules(ExamTemplate::SeniorGrouped));
static SENIOR_UNGROUPED_RULES: LazyLock<Vec<ExamStructureRule>> =
    LazyLock::new(|| senior_rules(ExamTemplate::SeniorUngrouped));
static CERT_BASIC_RULES: LazyLock<Vec<ExamStructureRule>> =
    LazyLock::new(|| certification_rules(ExamTemplate::CertificationBasic));
static CERT_ADVANCED_RULES: LazyLock<Vec<ExamStructureRule>> =
    LazyLock::new(|| certification_rules(ExamTemplate::CertificationAdvanced));
static GENERIC_RULES: LazyLock<Vec<ExamStructureRule>> = LazyLock::new(Vec::new);

/// 按模板取结构规则表（注册后只读）
pub fn structure_rules(template: ExamTemplate) -> &'static [ExamStructureRule] {
    match template {
        ExamTemplate::SeniorGrouped => &SENIOR_GROUPED_RULES,
        ExamTemplate::SeniorUngrouped => &SENIOR_UNGROUPED_RULES,
        ExamTemplate::CertificationBasic => &CERT_BASIC_RULES,
        ExamTemplate::CertificationAdvanced => &CERT_ADVANCED_RULES,
        ExamTemplate::Generic => &GENERIC_RULES,
    }
}
