//! 管线端到端集成测试
//!
//! 用 mockito 冒充 OpenAI 兼容接口，驱动真实的 OpenAiCompatClient +
//! DocumentPipeline 全链路：分段 → 检测/提取/门控 → 模型提取 →
//! 修复/合并 → 模板选择 → 结构校验。

use assert_matches::assert_matches;
use exam_paper_pipeline::models::{AppErrorType, QuestionType, StructureStatus};
use exam_paper_pipeline::{DocumentPipeline, OpenAiCompatClient, PipelineConfig};
use std::sync::Arc;

const SENIOR_PAPER: &str = "2023学年高三英语期中试卷\n\
I. Listening Comprehension\n\
Section A\n\
Directions: In Section A, you will hear ten short conversations.\n\
1. A. At a bank. B. At a hotel. C. At a shop. D. At school.\n\
Section B\n\
Directions: You will hear two short passages.\n\
11. What is the talk mainly about?\n\
II. Grammar and Vocabulary\n\
Directions: Fill in the blanks with the proper form of the words given.\n\
21. ____ (happy)\n\
22. ____ (quick)\n\
III. Reading Comprehension\n\
Questions 41 to 42 are based on the following passage.\n\
41. What is the best title for the passage?\n\
A. x. B. y. C. z. D. w.\n\
IV. Summary Writing\n\
Directions: Summarize the main idea of the passage in no more than 60 words.\n\
V. Translation\n\
Directions: Translate the following sentences into English.\n\
72. 我们应该珍惜时间。(cherish)\n\
VI. Guided Writing\n\
Directions: Write an English composition in 120-150 words according to the situation given below.";

fn completion_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "content": content } }],
        "usage": { "prompt_tokens": 200, "completion_tokens": 80 }
    })
    .to_string()
}

fn config_for(server: &mockito::Server) -> PipelineConfig {
    PipelineConfig {
        base_url: server.url(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        timeout_secs: 5,
        max_retries: 1,
        ..Default::default()
    }
}

fn pipeline_for(server: &mockito::Server) -> DocumentPipeline {
    let client = Arc::new(OpenAiCompatClient::new(&config_for(server)));
    DocumentPipeline::new(client, config_for(server))
}

#[tokio::test]
async fn test_senior_paper_end_to_end() {
    exam_paper_pipeline::init_tracing();
    let mut server = mockito::Server::new_async().await;
    let reply = serde_json::json!({
        "questions": [{
            "sequenceNumber": 99,
            "questionText": "每个片段一题",
            "questionType": "choice",
            "options": ["a", "b"]
        }]
    })
    .to_string();
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(&reply))
        .expect_at_least(7)
        .create_async()
        .await;

    let paper = pipeline_for(&server)
        .process(SENIOR_PAPER, "英语")
        .await
        .expect("pipeline should return a partial-success result");

    // 七个分节各出一题，片段顺序决定题号
    assert_eq!(paper.questions.len(), 7);
    let seqs: Vec<u32> = paper.questions.iter().map(|q| q.sequence_number).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6, 7]);

    let parts: Vec<&str> = paper
        .questions
        .iter()
        .map(|q| q.part_name.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(
        parts,
        vec![
            "Listening_A",
            "Listening_B",
            "Grammar",
            "Reading",
            "Writing_Summary",
            "Writing_Translation",
            "Writing_Guided"
        ]
    );

    // 分节不变量被强制执行
    let summary = &paper.questions[4];
    assert_eq!(summary.question_type, QuestionType::Writing);
    assert!(summary.options.is_empty());
    let translation = &paper.questions[5];
    assert_eq!(translation.question_type, QuestionType::Translation);

    // 标题区证据命中高考模板；题量远低于模板下界 → ERROR 但仍正常返回
    assert!(paper.template.is_senior());
    assert_eq!(paper.structure_status, StructureStatus::Error);
    assert!(!paper.structure_issues.is_empty());
    assert_eq!(paper.subject, "英语");
    assert!(paper.sections.iter().any(|s| s.part_name == "Listening_A"));
}

#[tokio::test]
async fn test_bare_fill_blank_scenario() {
    // 无任何分节标记的片段：单片段兜底 + 最终题号 1、2
    let mut server = mockito::Server::new_async().await;
    let reply = serde_json::json!({
        "questions": [
            { "sequenceNumber": 21, "questionText": "____ (happy)", "questionType": "fill_blank" },
            { "sequenceNumber": 22, "questionText": "____ (quick)", "questionType": "fill_blank" }
        ]
    })
    .to_string();
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(&reply))
        .create_async()
        .await;

    let paper = pipeline_for(&server)
        .process("21. ____ (happy)\n22. ____ (quick)", "英语")
        .await
        .unwrap();

    assert_eq!(paper.questions.len(), 2);
    assert_eq!(paper.questions[0].sequence_number, 1);
    assert_eq!(paper.questions[1].sequence_number, 2);
    assert_eq!(paper.questions[0].question_type, QuestionType::FillBlank);
}

#[tokio::test]
async fn test_malformed_model_reply_is_repaired() {
    // 代码围栏 + 尾逗号 + 未闭合数组：修复层必须兜住
    let mut server = mockito::Server::new_async().await;
    let broken = "```json\n{\"questions\": [{\"sequenceNumber\": 1, \"questionText\": \"修复我\", \"questionType\": \"choice\", \"options\": [\"a\", \"b\"],}\n```";
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body(broken))
        .create_async()
        .await;

    let paper = pipeline_for(&server)
        .process("1. 随便一道题。\nA. 甲\nB. 乙", "英语")
        .await
        .unwrap();

    assert_eq!(paper.questions.len(), 1);
    assert_eq!(paper.questions[0].question_text, "修复我");
    assert_eq!(paper.questions[0].options, vec!["a", "b"]);
}

#[tokio::test]
async fn test_model_hard_failure_surfaces_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let err = pipeline_for(&server)
        .process("1. 一道题。", "英语")
        .await
        .unwrap_err();
    assert_matches!(err.error_type, AppErrorType::LLM);
}

#[tokio::test]
async fn test_empty_document_rejected_without_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let err = pipeline_for(&server)
        .process("", "英语")
        .await
        .unwrap_err();
    assert_matches!(err.error_type, AppErrorType::Validation);
    mock.assert_async().await;
}
