use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// 数据类型定义
// ============================================================================

/// 题目类型
///
/// 七个检测类别 + 未知兜底，与格式规则库的类别一一对应。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Listening,
    Choice,
    FillBlank,
    Reading,
    Translation,
    Writing,
    Matching,
    #[default]
    Unknown,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Listening => "listening",
            QuestionType::Choice => "choice",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::Reading => "reading",
            QuestionType::Translation => "translation",
            QuestionType::Writing => "writing",
            QuestionType::Matching => "matching",
            QuestionType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "listening" => QuestionType::Listening,
            "choice" => QuestionType::Choice,
            "fill_blank" => QuestionType::FillBlank,
            "reading" => QuestionType::Reading,
            "translation" => QuestionType::Translation,
            "writing" => QuestionType::Writing,
            "matching" => QuestionType::Matching,
            _ => QuestionType::Unknown,
        }
    }

    /// 选项类题型：结构校验要求至少 2 个选项
    pub fn is_choice_like(&self) -> bool {
        matches!(
            self,
            QuestionType::Listening | QuestionType::Choice | QuestionType::Reading
        )
    }
}

/// 难度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::VeryHard => "very_hard",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            "very_hard" => Difficulty::VeryHard,
            _ => Difficulty::Medium,
        }
    }
}

/// 切分后的文本片段
///
/// 分段器产出后不可变；`part_name` 形如 "Listening_A"、"Reading"、
/// "Writing_Translation"，无结构兜底切分时为 None。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFragment {
    pub part_name: Option<String>,
    pub content: String,
    /// 片段首行标题（如 "I. Listening Comprehension"）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_heading: Option<String>,
    /// 片段内的 Directions 指令行
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_directions: Option<String>,
}

impl TextFragment {
    pub fn new(part_name: Option<String>, content: String) -> Self {
        Self {
            part_name,
            content,
            section_heading: None,
            section_directions: None,
        }
    }
}

/// 格式检测结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDetectionResult {
    pub question_type: QuestionType,
    pub sub_type: String,
    /// [0,1] 启发式分数，仅用于相对排序与阈值判断
    pub confidence: f64,
    pub features: Map<String, Value>,
    pub detection_rule: String,
}

impl FormatDetectionResult {
    /// 无规则命中时的兜底结果
    pub fn unknown() -> Self {
        Self {
            question_type: QuestionType::Unknown,
            sub_type: "未知".to_string(),
            confidence: 0.0,
            features: Map::new(),
            detection_rule: String::new(),
        }
    }
}

/// 结构提取结果
///
/// `confidence` 只由字段完整度公式计算，编排器不得直接赋值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    pub question_type: QuestionType,
    pub sub_type: String,
    pub question_text: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    pub metadata: Map<String, Value>,
    pub confidence: f64,
    pub extraction_rule: String,
}

/// 单片段 AI 校验门结果
///
/// `optimized_result` 恒为非空：未触发或失败时回退为原始提取结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub confidence: f64,
    pub validation_method: String,
    pub optimized_result: ExtractionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_suggestion: Option<String>,
    pub issues: Vec<String>,
}

/// 合并后的题目记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// 1 起始，全文档唯一，由合并计数器分配
    pub sequence_number: u32,
    pub question_text: String,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_point: Option<String>,
    pub options: Vec<String>,
    pub correct_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_directions: Option<String>,
    /// 阅读题归属的篇章标识（如 "R_A_1"）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_id: Option<String>,
    /// 听力共享材料组标识
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
}

/// 试卷模板（纯分类标签）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExamTemplate {
    /// 高考英语（含听力共享材料分组）
    SeniorGrouped,
    /// 高考英语（不分组）
    SeniorUngrouped,
    /// 等级考试（四段粗粒度）
    CertificationBasic,
    CertificationAdvanced,
    #[default]
    Generic,
}

impl ExamTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamTemplate::SeniorGrouped => "senior_grouped",
            ExamTemplate::SeniorUngrouped => "senior_ungrouped",
            ExamTemplate::CertificationBasic => "certification_basic",
            ExamTemplate::CertificationAdvanced => "certification_advanced",
            ExamTemplate::Generic => "generic",
        }
    }

    pub fn is_senior(&self) -> bool {
        matches!(
            self,
            ExamTemplate::SeniorGrouped | ExamTemplate::SeniorUngrouped
        )
    }

    pub fn is_certification(&self) -> bool {
        matches!(
            self,
            ExamTemplate::CertificationBasic | ExamTemplate::CertificationAdvanced
        )
    }
}

/// 模板结构规则：每模板每节的题量与题型约束
///
/// 静态注册表成员，进程内只读，不参与反序列化。
#[derive(Debug, Clone, Serialize)]
pub struct ExamStructureRule {
    pub id: &'static str,
    pub template: ExamTemplate,
    pub order_in_exam: u32,
    pub min_question_count: Option<u32>,
    pub max_question_count: Option<u32>,
    pub allowed_question_types: &'static [QuestionType],
    pub section_keywords: &'static [&'static str],
    pub instruction_keywords: &'static [&'static str],
}

/// 结构校验状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureStatus {
    Ok,
    Error,
}

impl StructureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureStatus::Ok => "OK",
            StructureStatus::Error => "ERROR",
        }
    }
}

/// 单条结构问题
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructureIssue {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl StructureIssue {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            rule_id: None,
        }
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }
}

/// 结构校验结论
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureValidationOutcome {
    pub structure_status: StructureStatus,
    pub structure_issues: Vec<StructureIssue>,
}

impl StructureValidationOutcome {
    pub fn from_issues(structure_issues: Vec<StructureIssue>) -> Self {
        let structure_status = if structure_issues.is_empty() {
            StructureStatus::Ok
        } else {
            StructureStatus::Error
        };
        Self {
            structure_status,
            structure_issues,
        }
    }
}

/// 分节信息（随最终结果一并返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionInfo {
    pub part_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_directions: Option<String>,
}

/// 管线最终输出：交给外部持久化协作方的唯一边界对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedPaper {
    /// 仅用于日志关联，存储身份由外部系统分配
    pub document_id: String,
    pub subject: String,
    pub questions: Vec<Question>,
    pub sections: Vec<SectionInfo>,
    pub structure_status: StructureStatus,
    pub structure_issues: Vec<StructureIssue>,
    pub template: ExamTemplate,
    pub processed_at: DateTime<Utc>,
}

/// 单次补全调用的 token 用量（显式随返回值传递，不走全局状态）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// 补全模型的一次应答
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
}

// ============================================================================
// 结构化错误处理
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AppErrorType {
    Validation,
    LLM,
    Network,
    Configuration,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: String,
    pub details: Option<Value>,
}

impl AppError {
    pub fn new(error_type: AppErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_type: AppErrorType,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            error_type,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Validation, message)
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::LLM, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Network, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Configuration, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Unknown, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        AppError::validation(message)
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        AppError::validation(message.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::validation(format!("JSON序列化错误: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::network(format!("网络请求错误: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::unknown(err.to_string())
    }
}
