//! 格式规则库
//!
//! 检测规则与提取规则均为静态数据表，进程启动时一次性编译，
//! 之后只读共享。注册顺序即平手裁决顺序，不允许运行时修改。
//!
//! 检测类别固定 7 个：listening / reading / choice / fill_blank /
//! translation / writing / matching。

use crate::models::QuestionType;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// 单条检测规则
pub struct DetectionRule {
    pub question_type: QuestionType,
    pub sub_type: &'static str,
    pub patterns: Vec<Regex>,
    pub base_confidence: f64,
}

/// 单条提取规则，键为 `"{type}_{sub_type}"`
pub struct ExtractionRule {
    pub key: String,
    /// 题干：取第 1 个捕获组
    pub question_pattern: Option<Regex>,
    /// 选项：captures_iter 逐个收集，组 1 为标号、组 2 为内容
    pub options_pattern: Option<Regex>,
    /// 答案：取第 1 个捕获组
    pub answer_pattern: Option<Regex>,
    /// 元数据：命中时以 metadata_key 写入 metadata map
    pub metadata_key: &'static str,
    pub metadata_pattern: Option<Regex>,
}

fn rule(
    question_type: QuestionType,
    sub_type: &'static str,
    base_confidence: f64,
    patterns: &[&str],
) -> DetectionRule {
    DetectionRule {
        question_type,
        sub_type,
        base_confidence,
        patterns: patterns
            .iter()
            .map(|p| Regex::new(p).expect("static regex"))
            .collect(),
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

// ============================================================================
// 检测规则：listening
// ============================================================================

fn listening_rules() -> Vec<DetectionRule> {
    vec![
        rule(
            QuestionType::Listening,
            "短对话理解",
            0.9,
            &[
                r"(?i)short conversations?",
                r"(?i)at the end of each conversation",
                r"(?i)a question will be asked about what was said",
            ],
        ),
        rule(
            QuestionType::Listening,
            "听力对话",
            0.85,
            &[
                r"(?i)what does the (?:man|woman) (?:mean|imply|suggest)",
                r"(?i)what (?:will|does|did) the (?:man|woman)",
                r"(?i)the conversation",
            ],
        ),
        rule(
            QuestionType::Listening,
            "对话场景",
            0.85,
            &[
                r"(?i)where (?:does|did) (?:this|the) conversation (?:most probably |probably )?take place",
                r"(?i)what is the (?:probable |possible )?relationship between",
            ],
        ),
        rule(
            QuestionType::Listening,
            "长对话",
            0.85,
            &[
                r"(?i)longer conversations?",
                r"(?i)hear two longer conversations",
            ],
        ),
        rule(
            QuestionType::Listening,
            "听力篇章",
            0.8,
            &[
                r"(?i)hear (?:two|three|several) (?:short )?passages?",
                r"(?i)after each passage.*questions?",
            ],
        ),
        rule(
            QuestionType::Listening,
            "听力填表",
            0.8,
            &[
                r"(?i)complete the (?:form|notes|table|chart) (?:below|with)",
                r"(?i)blanks? numbered (?:from )?\d+",
                r"(?i)fill in.*while you listen",
            ],
        ),
        rule(
            QuestionType::Listening,
            "共享材料",
            0.9,
            &[
                r"(?i)questions? \d+\s*(?:and|through|to)\s*\d+ (?:are|is) based on",
                r"根据你听到的(?:对话|短文|内容)",
            ],
        ),
        rule(
            QuestionType::Listening,
            "听力指令",
            0.9,
            &[
                r"听下面.{0,8}段(?:对话|独白)",
                r"回答第?\s*\d+.{0,6}小?题",
            ],
        ),
        rule(
            QuestionType::Listening,
            "播放说明",
            0.7,
            &[
                r"(?i)will be (?:read|spoken|played) (?:only )?(?:once|twice)",
                r"(?i)you will hear",
            ],
        ),
        rule(
            QuestionType::Listening,
            "Section标记",
            0.75,
            &[
                r"(?m)^Section [ABC]\b",
                r"(?i)listening comprehension",
            ],
        ),
        rule(
            QuestionType::Listening,
            "独白理解",
            0.7,
            &[
                r"(?i)monologue",
                r"(?i)a short (?:talk|speech|report|lecture)",
            ],
        ),
        rule(
            QuestionType::Listening,
            "数量时间提问",
            0.45,
            &[
                r"(?i)how (?:much|many|long|often|soon) (?:will|does|did|is|are)",
                r"(?i)when (?:will|did|does) the \w+",
            ],
        ),
        rule(
            QuestionType::Listening,
            "听音选图",
            0.7,
            &[
                r"(?i)choose the (?:picture|photo|image)",
                r"(?i)according to what you (?:have )?hear[d]?",
            ],
        ),
        rule(
            QuestionType::Listening,
            "原因目的提问",
            0.6,
            &[
                r"(?i)why (?:does|did|is|was) the (?:man|woman|speaker)",
                r"(?i)what is the (?:speaker|talk|passage) mainly about",
            ],
        ),
    ]
}

// ============================================================================
// 检测规则：reading
// ============================================================================

fn reading_rules() -> Vec<DetectionRule> {
    vec![
        rule(
            QuestionType::Reading,
            "阅读理解",
            0.85,
            &[
                r"(?i)read(?:ing)? the (?:following )?passages?",
                r"(?i)reading comprehension",
            ],
        ),
        rule(
            QuestionType::Reading,
            "篇章题组",
            0.9,
            &[r"(?i)questions? \d+\s*(?:to|through|-|–)\s*\d+ are based on the (?:following )?passage"],
        ),
        rule(
            QuestionType::Reading,
            "细节理解",
            0.85,
            &[
                r"(?i)according to the (?:passage|text|article|author)",
                r"(?i)which of the following is (?:TRUE|NOT true|true|mentioned)",
            ],
        ),
        rule(
            QuestionType::Reading,
            "主旨大意",
            0.9,
            &[
                r"(?i)the main idea of",
                r"(?i)the best title (?:for|of)",
                r"(?i)the passage is mainly about",
            ],
        ),
        rule(
            QuestionType::Reading,
            "推理判断",
            0.9,
            &[
                r"(?i)it can be (?:inferred|concluded|learned) (?:from|that)",
                r"(?i)the author (?:implies|suggests)",
            ],
        ),
        rule(
            QuestionType::Reading,
            "词义猜测",
            0.9,
            &[
                r#"(?i)the (?:word|phrase|expression) ["“'].+?["”'].{0,40}(?:probably |most likely )?means?"#,
                r"(?i)closest in meaning to",
            ],
        ),
        rule(
            QuestionType::Reading,
            "观点态度",
            0.9,
            &[
                r"(?i)the author'?s'? attitude",
                r"(?i)the tone of the (?:passage|author)",
            ],
        ),
        rule(
            QuestionType::Reading,
            "选句填空",
            0.85,
            &[
                r"(?i)sentences? (?:have|has) been removed",
                r"(?i)fill in each (?:of the )?blanks? with a proper sentence",
                r"(?i)there (?:are|is) (?:one|two) (?:extra|more) (?:sentences?|options?)",
            ],
        ),
        rule(
            QuestionType::Reading,
            "完形填空",
            0.85,
            &[
                r"(?i)cloze",
                r"(?i)for each blank.{0,30}four (?:words|choices|options)",
                r"(?i)choose the (?:word|answer|one) that best (?:fits|completes)",
            ],
        ),
        rule(
            QuestionType::Reading,
            "段落定位",
            0.75,
            &[
                r"(?i)according to (?:paragraph|the (?:first|second|third|last) paragraph)",
                r"(?i)in paragraph \d+",
            ],
        ),
        rule(
            QuestionType::Reading,
            "例证作用",
            0.7,
            &[
                r"(?i)the example of .{1,60} is (?:given|used|mentioned) to",
                r"(?i)the author mentions .{1,60} (?:in order )?to",
            ],
        ),
        rule(
            QuestionType::Reading,
            "长篇定位",
            0.75,
            &[
                r"(?i)in which paragraph",
                r"(?i)statements? (?:below|attached).{0,40}paragraphs?",
            ],
        ),
        rule(
            QuestionType::Reading,
            "判断正误",
            0.8,
            &[
                r"(?i)true or false",
                r"(?i)decide whether the (?:following )?statements?",
            ],
        ),
    ]
}

// ============================================================================
// 检测规则：choice
// ============================================================================

fn choice_rules() -> Vec<DetectionRule> {
    vec![
        rule(
            QuestionType::Choice,
            "选择题指令",
            0.9,
            &[
                r"从.{0,10}[ABCD].{0,10}四个选项中.{0,6}选出",
                r"选出.{0,10}最佳(?:选项|答案)",
            ],
        ),
        rule(
            QuestionType::Choice,
            "语法选择",
            0.75,
            &[
                r"(?i)\bgrammar\b",
                r"(?m)^\s*\d{1,3}\s*[.、．]\s*.*_{2,}",
            ],
        ),
        rule(
            QuestionType::Choice,
            "语法词汇混合",
            0.75,
            &[r"(?i)grammar and vocabulary"],
        ),
        rule(
            QuestionType::Choice,
            "词汇选择",
            0.7,
            &[
                r"(?i)\bvocabulary\b",
                r"(?i)choose the (?:word|expression) (?:that|which)",
            ],
        ),
        rule(
            QuestionType::Choice,
            "四选项块",
            0.5,
            &[r"(?s)\bA[.、．)）].{1,80}\bB[.、．)）].{1,80}\bC[.、．)）].{1,80}\bD[.、．)）]"],
        ),
        rule(
            QuestionType::Choice,
            "单项选择",
            0.6,
            &[
                r"(?m)^\s*[A-D][.、．)）]\s*\S+",
                r"(?i)choose the (?:best|correct|proper) (?:answer|one|option)",
            ],
        ),
        rule(
            QuestionType::Choice,
            "括号选择",
            0.6,
            &[
                r"(?m)^\s*\(\s*\)\s*\d{1,3}[.、．]",
                r"（\s*）",
            ],
        ),
        rule(
            QuestionType::Choice,
            "情景对话选择",
            0.6,
            &[
                r"(?m)^\s*[—-]{1,2}\s*\w.*\?\s*$",
                r"(?s)—\s*.+\?\s*\n\s*—",
            ],
        ),
        rule(
            QuestionType::Choice,
            "多选",
            0.8,
            &[
                r"(?i)more than one (?:answer|option) (?:is|may be) (?:possible|correct)",
                r"(?i)choose all that apply",
            ],
        ),
        rule(
            QuestionType::Choice,
            "辨音题",
            0.85,
            &[
                r"(?i)underlined part.{0,40}pronounced",
                r"(?i)pronunciation",
            ],
        ),
        rule(
            QuestionType::Choice,
            "最佳补全",
            0.7,
            &[
                r"(?i)best completes the sentence",
                r"(?i)the best answer",
            ],
        ),
        rule(
            QuestionType::Choice,
            "划线替换",
            0.8,
            &[
                r"(?i)replace the underlined",
                r"(?i)can be replaced by",
            ],
        ),
        rule(
            QuestionType::Choice,
            "固定搭配",
            0.6,
            &[
                r"(?i)the phrase that best",
                r"(?i)\bcollocations?\b",
            ],
        ),
    ]
}

// ============================================================================
// 检测规则：fill_blank
// ============================================================================

fn fill_blank_rules() -> Vec<DetectionRule> {
    vec![
        rule(
            QuestionType::FillBlank,
            "语法填空",
            0.9,
            &[
                r"_{2,}\s*[（(][a-zA-Z]+[)）]",
                r"(?i)proper form of the (?:words?|verbs?) (?:given|in (?:the )?brackets)",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "用所给词填空",
            0.9,
            &[
                r"用所给(?:单词|词语|动词)的(?:适当|正确)形式填空",
                r"(?i)with the proper form of the (?:word|verb)",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "不多于词数",
            0.85,
            &[
                r"(?i)no more than (?:one|two|three|\d+) words?",
                r"每空(?:一词|不超过)",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "语篇填空",
            0.8,
            &[
                r"(?i)fill in (?:the|each) blanks? (?:with|using)",
                r"(?i)one word for each blank",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "介词填空",
            0.8,
            &[
                r"(?i)(?:proper |correct )?prepositions?",
                r"填入(?:适当的)?介词",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "冠词填空",
            0.8,
            &[
                r"(?i)articles? \(?a, an,? (?:or )?the\)?",
                r"填入.{0,6}冠词",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "时态填空",
            0.8,
            &[
                r"(?i)(?:correct|proper) tense",
                r"时态填空",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "首字母填空",
            0.75,
            &[
                r"根据首字母",
                r"(?i)first letters? (?:is |are )?(?:given|provided)",
                r"(?m)\b[a-z]_{2,}",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "单词拼写",
            0.7,
            &[
                r"(?i)spell(?:ing)?",
                r"根据.{0,8}(?:音标|中文提示)(?:写出|填写)单词",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "编号空格",
            0.7,
            &[
                r"(?m)\b\d{1,3}\s*[.、．]?\s*_{2,}",
                r"_{2,}\s*\d{1,3}\s*_{2,}",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "句子补全",
            0.7,
            &[
                r"(?i)complete the (?:following )?sentences?",
                r"补全句子",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "表格填空",
            0.7,
            &[
                r"(?i)complete the (?:table|chart|form|diagram) (?:below|with|according)",
                r"根据.{0,12}完成表格",
            ],
        ),
        rule(
            QuestionType::FillBlank,
            "空格串",
            0.45,
            &[r"_{3,}"],
        ),
    ]
}

// ============================================================================
// 检测规则：translation
// ============================================================================

fn translation_rules() -> Vec<DetectionRule> {
    vec![
        rule(
            QuestionType::Translation,
            "中译英",
            0.95,
            &[
                r"(?i)translate the following sentences? into English",
                r"将?下列句子译成英语",
                r"中译英",
            ],
        ),
        rule(
            QuestionType::Translation,
            "英译中",
            0.95,
            &[
                r"(?i)translate.{0,40}into Chinese",
                r"译成(?:汉语|中文)",
                r"英译汉",
            ],
        ),
        rule(
            QuestionType::Translation,
            "括号关键词",
            0.85,
            &[r"(?m)[\u{4e00}-\u{9fff}]+.{0,20}[（(]\s*[a-zA-Z][a-zA-Z.\s]*[)）]\s*$"],
        ),
        rule(
            QuestionType::Translation,
            "必须使用所给词",
            0.85,
            &[
                r"(?i)(?:using|use) the (?:words?|phrases?) (?:given|in (?:the )?brackets)",
                r"必须使用.{0,8}所给(?:单词|词组|词汇)",
            ],
        ),
        rule(
            QuestionType::Translation,
            "翻译划线",
            0.85,
            &[
                r"(?i)translate the underlined",
                r"翻译.{0,8}(?:划|画)线部分",
            ],
        ),
        rule(
            QuestionType::Translation,
            "段落翻译",
            0.85,
            &[
                r"(?i)translate the (?:following )?paragraphs?",
                r"段落翻译",
            ],
        ),
        rule(
            QuestionType::Translation,
            "整句翻译",
            0.7,
            &[r"(?m)^\s*\d{1,2}\s*[.、．]\s*[\u{4e00}-\u{9fff}].*[。！？].*[（(][a-zA-Z]"],
        ),
        rule(
            QuestionType::Translation,
            "词组翻译",
            0.7,
            &[
                r"翻译.{0,6}(?:词组|短语)",
                r"(?i)translate the (?:phrases?|expressions?)",
            ],
        ),
        rule(
            QuestionType::Translation,
            "汉语句子列表",
            0.6,
            &[r"(?m)^\s*\d{1,2}\s*[.、．]\s*[\u{4e00}-\u{9fff}]{6,}"],
        ),
        rule(
            QuestionType::Translation,
            "翻译评分",
            0.6,
            &[
                r"(?i)translation.{0,20}[（(]\s*\d+\s*(?:points?|marks?|分)\s*[)）]",
                r"翻译.{0,8}共?\s*\d+\s*分",
            ],
        ),
        rule(
            QuestionType::Translation,
            "成语俗语",
            0.6,
            &[
                r"翻译.{0,8}(?:成语|谚语|俗语)",
                r"(?i)\bidioms?\b",
            ],
        ),
        rule(
            QuestionType::Translation,
            "翻译指令",
            0.5,
            &[r"(?i)\btranslations?\b", r"翻译"],
        ),
    ]
}

// ============================================================================
// 检测规则：writing
// ============================================================================

fn writing_rules() -> Vec<DetectionRule> {
    vec![
        rule(
            QuestionType::Writing,
            "概要写作",
            0.95,
            &[
                r"(?i)summary writing",
                r"(?i)write a summary",
                r"概要写作",
                r"(?i)summarize the .{0,60}in no more than \d+ words",
            ],
        ),
        rule(
            QuestionType::Writing,
            "指导性写作",
            0.95,
            &[
                r"(?i)guided writing",
                r"(?i)write an? (?:English )?composition in \d+\s*[-–—]\s*\d+ words",
                r"(?i)according to the (?:situation|instructions|outline) given below",
            ],
        ),
        rule(
            QuestionType::Writing,
            "书面表达",
            0.9,
            &[r"书面表达", r"(?i)written expression"],
        ),
        rule(
            QuestionType::Writing,
            "读后续写",
            0.9,
            &[
                r"(?i)continue (?:writing|the story)",
                r"读后续写",
                r"(?i)continuation writing",
            ],
        ),
        rule(
            QuestionType::Writing,
            "应用文书信",
            0.85,
            &[
                r"(?i)write a letter (?:to|of)",
                r"(?i)write an email (?:to|in reply)",
                r"给.{1,12}写一封(?:信|邮件)",
            ],
        ),
        rule(
            QuestionType::Writing,
            "应用文通知",
            0.85,
            &[
                r"(?i)write a notice",
                r"写一(?:则|份)通知",
            ],
        ),
        rule(
            QuestionType::Writing,
            "看图作文",
            0.85,
            &[
                r"(?i)based on the pictures?",
                r"看图作文",
                r"(?i)describe the picture",
            ],
        ),
        rule(
            QuestionType::Writing,
            "提纲要点",
            0.8,
            &[
                r"(?i)your (?:essay|composition|article) (?:should|must) include",
                r"内容(?:要点|须|需)(?:包括|包含)",
            ],
        ),
        rule(
            QuestionType::Writing,
            "日记随笔",
            0.8,
            &[
                r"(?i)write a diary entry",
                r"写一篇(?:英语)?日记",
            ],
        ),
        rule(
            QuestionType::Writing,
            "议论观点",
            0.75,
            &[
                r"(?i)give your (?:own )?(?:opinions?|views?)",
                r"谈谈你的(?:看法|观点|想法)",
            ],
        ),
        rule(
            QuestionType::Writing,
            "词数要求",
            0.7,
            &[
                r"(?i)in (?:about|at least|no more than) \d+ words",
                r"词数\s*[:：]?\s*\d+",
            ],
        ),
        rule(
            QuestionType::Writing,
            "作文通用",
            0.6,
            &[r"(?i)\bcompositions?\b", r"作文"],
        ),
        rule(
            QuestionType::Writing,
            "演讲稿",
            0.8,
            &[
                r"(?i)write a speech",
                r"写一篇(?:英语)?演讲稿",
            ],
        ),
    ]
}

// ============================================================================
// 检测规则：matching
// ============================================================================

fn matching_rules() -> Vec<DetectionRule> {
    vec![
        rule(
            QuestionType::Matching,
            "六选四",
            0.9,
            &[
                r"(?i)two more (?:answers|choices|options) than you need",
                r"(?i)there (?:is|are) (?:one|two) extra (?:options?|choices?)",
            ],
        ),
        rule(
            QuestionType::Matching,
            "段落标题匹配",
            0.9,
            &[
                r"(?i)choose the (?:best|most suitable) (?:heading|title) for each paragraph",
                r"(?i)headings?.{0,30}paragraphs?",
            ],
        ),
        rule(
            QuestionType::Matching,
            "人物观点匹配",
            0.85,
            &[r"(?i)match the (?:statements?|opinions?) (?:with|to) the (?:people|persons?|speakers?)"],
        ),
        rule(
            QuestionType::Matching,
            "词义配对",
            0.85,
            &[
                r"(?i)match the words? (?:with|to) (?:their )?(?:meanings?|definitions?)",
                r"将.{1,20}与.{1,20}配对",
            ],
        ),
        rule(
            QuestionType::Matching,
            "栏目匹配",
            0.85,
            &[
                r"(?i)from column [AB]",
                r"(?i)column A.{0,40}column B",
            ],
        ),
        rule(
            QuestionType::Matching,
            "可否重复选用",
            0.85,
            &[
                r"(?i)each (?:option|choice|word) (?:can|may) be used (?:more than once|only once|at most once)",
                r"每个选项(?:只能|只可|可以)(?:使用|选用)",
            ],
        ),
        rule(
            QuestionType::Matching,
            "信息匹配",
            0.8,
            &[r"(?i)match (?:the|each)", r"(?i)\bmatching\b"],
        ),
        rule(
            QuestionType::Matching,
            "应答匹配",
            0.8,
            &[
                r"(?i)match (?:each )?questions? (?:with|to) (?:the )?answers?",
                r"问答配对",
            ],
        ),
        rule(
            QuestionType::Matching,
            "句子归位",
            0.8,
            &[
                r"(?i)put the sentences? (?:back )?(?:in|into) the (?:right|correct) (?:place|order)",
                r"还原句子",
            ],
        ),
        rule(
            QuestionType::Matching,
            "图文匹配",
            0.8,
            &[
                r"(?i)match the pictures? (?:with|to)",
                r"图文配对",
            ],
        ),
        rule(
            QuestionType::Matching,
            "排序题",
            0.75,
            &[
                r"(?i)(?:right|correct|proper) order",
                r"排列.{0,6}顺序",
            ],
        ),
        rule(
            QuestionType::Matching,
            "字母选项池",
            0.55,
            &[r"(?m)^[A-G][.、．)）]\s+\S.*\n[A-G][.、．)）]\s+\S"],
        ),
    ]
}

/// 全部检测规则，按类别固定顺序拼接（顺序即平手裁决序）
pub static DETECTION_RULES: LazyLock<Vec<DetectionRule>> = LazyLock::new(|| {
    let mut rules = Vec::new();
    rules.extend(listening_rules());
    rules.extend(reading_rules());
    rules.extend(choice_rules());
    rules.extend(fill_blank_rules());
    rules.extend(translation_rules());
    rules.extend(writing_rules());
    rules.extend(matching_rules());
    rules
});

/// 检测类别数（固定 7）
pub const DETECTION_CATEGORY_COUNT: usize = 7;

// ============================================================================
// 提取规则
// ============================================================================

fn extraction_rule(
    question_type: QuestionType,
    sub_type: &str,
    question_pattern: Option<&str>,
    options_pattern: Option<&str>,
    answer_pattern: Option<&str>,
    metadata_key: &'static str,
    metadata_pattern: Option<&str>,
) -> ExtractionRule {
    ExtractionRule {
        key: extraction_rule_key(question_type, sub_type),
        question_pattern: question_pattern.map(re),
        options_pattern: options_pattern.map(re),
        answer_pattern: answer_pattern.map(re),
        metadata_key,
        metadata_pattern: metadata_pattern.map(re),
    }
}

pub fn extraction_rule_key(question_type: QuestionType, sub_type: &str) -> String {
    format!("{}_{}", question_type.as_str(), sub_type)
}

/// 常用字段模式
const Q_NUMBERED: &str = r"(?m)^\s*(?:\(\s*\)\s*)?\d{1,3}\s*[.、．]\s*(.+)$";
const OPT_LETTERED: &str = r"(?m)^\s*([A-G])[.、．)）]\s*(.+?)\s*$";
const OPT_INLINE: &str = r"([A-G])[.、．)）]\s*([^A-G\n]{1,80}?)(?:\s{2,}|\t|\n|$)";
const ANS_KEYED: &str = r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G]{1,4}|[^\n]{1,60})";
const META_SCORE: &str = r"[（(]\s*(\d{1,3})\s*分\s*[)）]";

fn build_extraction_rules() -> Vec<ExtractionRule> {
    vec![
        // --- 选择类 ---
        extraction_rule(
            QuestionType::Choice,
            "单项选择",
            Some(r"(?s)^\s*(?:\(\s*\)\s*)?\d{1,3}\s*[.、．]\s*(.+?)\n\s*A[.、．)）]"),
            Some(OPT_LETTERED),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "score",
            Some(META_SCORE),
        ),
        extraction_rule(
            QuestionType::Choice,
            "语法选择",
            Some(r"(?s)^\s*\d{1,3}\s*[.、．]\s*(.+?)\n\s*A[.、．)）]"),
            Some(OPT_INLINE),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "score",
            Some(META_SCORE),
        ),
        extraction_rule(
            QuestionType::Choice,
            "多选",
            Some(Q_NUMBERED),
            Some(OPT_LETTERED),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G]{2,4})"),
            "score",
            Some(META_SCORE),
        ),
        // --- 听力类（结构与选择题一致，答案常缺失） ---
        extraction_rule(
            QuestionType::Listening,
            "听力对话",
            Some(r"(?s)^\s*\d{1,3}\s*[.、．]\s*(.+?\?)"),
            Some(OPT_LETTERED),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "score",
            Some(META_SCORE),
        ),
        extraction_rule(
            QuestionType::Listening,
            "短对话理解",
            Some(r"(?s)^\s*\d{1,3}\s*[.、．]\s*(.+?\?)"),
            Some(OPT_LETTERED),
            None,
            "score",
            Some(META_SCORE),
        ),
        extraction_rule(
            QuestionType::Listening,
            "共享材料",
            Some(Q_NUMBERED),
            Some(OPT_LETTERED),
            None,
            "group_span",
            Some(r"(?i)questions? (\d+\s*(?:and|through|to)\s*\d+)"),
        ),
        extraction_rule(
            QuestionType::Listening,
            "听力填表",
            Some(Q_NUMBERED),
            None,
            None,
            "blank_count",
            Some(r"(?i)blanks? numbered (?:from )?(\d+)"),
        ),
        // --- 阅读类 ---
        extraction_rule(
            QuestionType::Reading,
            "阅读理解",
            Some(r"(?s)^\s*\d{1,3}\s*[.、．]\s*(.+?\?)"),
            Some(OPT_LETTERED),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "score",
            Some(META_SCORE),
        ),
        extraction_rule(
            QuestionType::Reading,
            "完形填空",
            Some(Q_NUMBERED),
            Some(OPT_INLINE),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "blank_no",
            Some(r"(?m)^\s*(\d{1,3})\s*[.、．]"),
        ),
        extraction_rule(
            QuestionType::Reading,
            "选句填空",
            Some(Q_NUMBERED),
            Some(OPT_LETTERED),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "extra_options",
            Some(r"(?i)(one|two) (?:extra|more)"),
        ),
        // --- 填空类 ---
        extraction_rule(
            QuestionType::FillBlank,
            "语法填空",
            Some(Q_NUMBERED),
            None,
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([^\n（(]{1,40})"),
            "hint_word",
            Some(r"[（(]\s*([a-zA-Z]+)\s*[)）]"),
        ),
        extraction_rule(
            QuestionType::FillBlank,
            "用所给词填空",
            Some(Q_NUMBERED),
            None,
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([^\n（(]{1,40})"),
            "hint_word",
            Some(r"[（(]\s*([a-zA-Z]+)\s*[)）]"),
        ),
        extraction_rule(
            QuestionType::FillBlank,
            "首字母填空",
            Some(Q_NUMBERED),
            None,
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([a-zA-Z]{1,30})"),
            "first_letter",
            Some(r"\b([a-z])_{2,}"),
        ),
        // --- 翻译类 ---
        extraction_rule(
            QuestionType::Translation,
            "中译英",
            Some(r"(?m)^\s*\d{1,2}\s*[.、．]\s*([\u{4e00}-\u{9fff}][^\n]*?)\s*(?:[（(][a-zA-Z][a-zA-Z.\s]*[)）])?\s*$"),
            None,
            Some(r"(?i)(?:answer|key|答案|参考译文)\s*[:：]\s*([^\n]{1,200})"),
            "hint_word",
            Some(r"[（(]\s*([a-zA-Z][a-zA-Z.\s]*?)\s*[)）]\s*$"),
        ),
        extraction_rule(
            QuestionType::Translation,
            "括号关键词",
            Some(r"(?m)^\s*\d{1,2}\s*[.、．]\s*([^\n]+?)\s*[（(][a-zA-Z][a-zA-Z.\s]*[)）]\s*$"),
            None,
            None,
            "hint_word",
            Some(r"[（(]\s*([a-zA-Z][a-zA-Z.\s]*?)\s*[)）]\s*$"),
        ),
        extraction_rule(
            QuestionType::Translation,
            "英译中",
            Some(Q_NUMBERED),
            None,
            Some(r"(?i)(?:answer|key|答案|参考译文)\s*[:：]\s*([^\n]{1,200})"),
            "score",
            Some(META_SCORE),
        ),
        // --- 写作类（题干即指令全文，无选项） ---
        extraction_rule(
            QuestionType::Writing,
            "概要写作",
            Some(r"(?s)(?:Directions\s*[:：]\s*)?(.{20,2000})"),
            None,
            None,
            "word_limit",
            Some(r"(?i)no more than (\d+) words"),
        ),
        extraction_rule(
            QuestionType::Writing,
            "指导性写作",
            Some(r"(?s)(?:Directions\s*[:：]\s*)?(.{20,2000})"),
            None,
            None,
            "word_limit",
            Some(r"(?i)in (\d+)\s*[-–—]\s*\d+ words"),
        ),
        extraction_rule(
            QuestionType::Writing,
            "应用文书信",
            Some(r"(?s)(.{20,2000})"),
            None,
            None,
            "word_limit",
            Some(r"(?i)(?:about|at least) (\d+) words"),
        ),
        // --- 匹配类 ---
        extraction_rule(
            QuestionType::Matching,
            "六选四",
            Some(Q_NUMBERED),
            Some(OPT_LETTERED),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "extra_options",
            Some(r"(?i)(two) more"),
        ),
        extraction_rule(
            QuestionType::Matching,
            "段落标题匹配",
            Some(Q_NUMBERED),
            Some(OPT_LETTERED),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "score",
            Some(META_SCORE),
        ),
        extraction_rule(
            QuestionType::Matching,
            "信息匹配",
            Some(Q_NUMBERED),
            Some(OPT_LETTERED),
            Some(r"(?i)(?:answer|key|答案)\s*[:：]?\s*([A-G])"),
            "score",
            Some(META_SCORE),
        ),
    ]
}

/// 提取规则索引，键 `"{type}_{sub_type}"`
pub static EXTRACTION_RULES: LazyLock<HashMap<String, ExtractionRule>> = LazyLock::new(|| {
    build_extraction_rules()
        .into_iter()
        .map(|r| (r.key.clone(), r))
        .collect()
});

pub fn find_extraction_rule(
    question_type: QuestionType,
    sub_type: &str,
) -> Option<&'static ExtractionRule> {
    EXTRACTION_RULES.get(&extraction_rule_key(question_type, sub_type))
}
