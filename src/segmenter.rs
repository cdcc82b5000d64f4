//! 文档分段器
//!
//! 先按四大考试部分锚点（听力 / 语法 / 阅读 / 写作族）切出粗粒度片段，
//! 听力再按 Section A/B/C 细分，写作族按概要/翻译/指导写作细分；
//! 完全无锚点时退化为罗马数字行切分 + 关键词归类，再退化为
//! 尺寸受限的段落/句子切分。纯函数，任何输入都不报错。

use crate::models::TextFragment;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// 单片段硬字符预算；超出则递归细分
pub const FRAGMENT_CHAR_BUDGET: usize = 8000;

struct AnchorSpec {
    part: &'static str,
    attempts: Vec<Regex>,
}

fn attempts(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
}

/// 四大部分锚点：每个锚点先试灵活的 `<罗马数字>. <标签>`，再试制表符/空格直连变体
static PART_ANCHORS: LazyLock<Vec<AnchorSpec>> = LazyLock::new(|| {
    vec![
        AnchorSpec {
            part: "Listening",
            attempts: attempts(&[
                r"(?im)^\s*[IVX]{1,4}\s*[.、．]\s*Listening(?:\s+Comprehension)?",
                r"(?im)^[IVX]{1,4}[\t ]+Listening",
                r"(?im)^Listening Comprehension\b",
            ]),
        },
        AnchorSpec {
            part: "Grammar",
            attempts: attempts(&[
                r"(?im)^\s*[IVX]{1,4}\s*[.、．]\s*Grammar(?:\s+and\s+Vocabulary)?",
                r"(?im)^[IVX]{1,4}[\t ]+Grammar",
                r"(?im)^Grammar and Vocabulary\b",
            ]),
        },
        AnchorSpec {
            part: "Reading",
            attempts: attempts(&[
                r"(?im)^\s*[IVX]{1,4}\s*[.、．]\s*Reading(?:\s+Comprehension)?",
                r"(?im)^[IVX]{1,4}[\t ]+Reading",
                r"(?im)^Reading Comprehension\b",
            ]),
        },
        AnchorSpec {
            part: "Writing",
            attempts: attempts(&[
                r"(?im)^\s*[IVX]{1,4}\s*[.、．]\s*(?:Summary\s+Writing|Translation|Guided\s+Writing|Writing)",
                r"(?im)^[IVX]{1,4}[\t ]+(?:Summary Writing|Translation|Guided Writing|Writing)",
                r"(?im)^(?:Summary Writing|Guided Writing)\b",
            ]),
        },
    ]
});

static SECTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Section ([ABC])\b").expect("static regex"));

/// 写作族内部锚点（子部分名, 模式）
static WRITING_SUB_ANCHORS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "Writing_Summary",
            Regex::new(r"(?im)^\s*(?:[IVX]{1,4}\s*[.、．]\s*)?Summary\s+Writing\b").expect("static regex"),
        ),
        (
            "Writing_Translation",
            Regex::new(r"(?im)^\s*(?:[IVX]{1,4}\s*[.、．]\s*)?Translation\b").expect("static regex"),
        ),
        (
            "Writing_Guided",
            Regex::new(r"(?im)^\s*(?:[IVX]{1,4}\s*[.、．]\s*)?Guided\s+Writing\b").expect("static regex"),
        ),
    ]
});

static GENERIC_ROMAN_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[IVX]{1,4}\s*[.、．]\s*\S").expect("static regex"));

static DIRECTIONS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*Directions\s*[:：]\s*([^\n]+)").expect("static regex"));

static OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[A-G][.、．)）]\s*\S").expect("static regex"));

/// 分段入口（默认预算）
pub fn segment(full_text: &str) -> Vec<TextFragment> {
    segment_with_budget(full_text, FRAGMENT_CHAR_BUDGET)
}

/// 分段入口（显式预算）
pub fn segment_with_budget(full_text: &str, budget: usize) -> Vec<TextFragment> {
    if full_text.trim().is_empty() {
        return Vec::new();
    }

    let anchored = locate_parts(full_text);
    let coarse = if anchored.is_empty() {
        debug!("[Segmenter] 未命中任何部分锚点，进入罗马数字行回退切分");
        fallback_split(full_text)
    } else {
        build_part_fragments(full_text, &anchored)
    };

    let mut refined = Vec::new();
    for frag in coarse {
        match frag.part_name.as_deref() {
            Some("Listening") => refined.extend(split_listening(&frag)),
            Some("Writing") => refined.extend(split_writing_family(&frag)),
            _ => refined.push(frag),
        }
    }

    let mut bounded = Vec::new();
    for frag in refined {
        bounded.extend(enforce_budget(frag, budget));
    }

    for frag in bounded.iter_mut() {
        annotate_section_meta(frag);
    }
    bounded
}

/// 定位四大部分的起始偏移（每部分取首个命中的尝试）
fn locate_parts(text: &str) -> Vec<(&'static str, usize)> {
    let mut located = Vec::new();
    for spec in PART_ANCHORS.iter() {
        for attempt in &spec.attempts {
            if let Some(m) = attempt.find(text) {
                located.push((spec.part, m.start()));
                break;
            }
        }
    }
    located.sort_by_key(|(_, offset)| *offset);
    located
}

fn build_part_fragments(text: &str, located: &[(&'static str, usize)]) -> Vec<TextFragment> {
    let mut fragments = Vec::new();
    for (i, (part, start)) in located.iter().enumerate() {
        let end = located
            .get(i + 1)
            .map(|(_, next)| *next)
            .unwrap_or(text.len());
        let content = text[*start..end].trim();
        if content.is_empty() {
            continue;
        }
        fragments.push(TextFragment::new(
            Some((*part).to_string()),
            content.to_string(),
        ));
    }
    fragments
}

/// 听力部分按 Section A/B/C 细分；无标记则原样返回
fn split_listening(frag: &TextFragment) -> Vec<TextFragment> {
    let text = &frag.content;
    let markers: Vec<(String, usize)> = SECTION_MARKER
        .captures_iter(text)
        .filter_map(|cap| {
            let letter = cap.get(1)?.as_str().to_string();
            Some((letter, cap.get(0)?.start()))
        })
        .collect();

    if markers.is_empty() {
        return vec![frag.clone()];
    }

    let heading = first_nonempty_line(&text[..markers[0].1]);
    let mut out = Vec::new();
    for (i, (letter, start)) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map(|(_, s)| *s).unwrap_or(text.len());
        let content = text[*start..end].trim();
        if content.is_empty() {
            continue;
        }
        let mut sub = TextFragment::new(
            Some(format!("Listening_{}", letter)),
            content.to_string(),
        );
        sub.section_heading = heading.clone();
        out.push(sub);
    }
    if out.is_empty() {
        vec![frag.clone()]
    } else {
        out
    }
}

/// 写作族按 概要写作 / 翻译 / 指导性写作 的各自锚点细分
fn split_writing_family(frag: &TextFragment) -> Vec<TextFragment> {
    let text = &frag.content;
    let mut found: Vec<(&'static str, usize)> = Vec::new();
    for (name, pattern) in WRITING_SUB_ANCHORS.iter() {
        if let Some(m) = pattern.find(text) {
            found.push((name, m.start()));
        }
    }
    if found.is_empty() {
        return vec![frag.clone()];
    }
    found.sort_by_key(|(_, offset)| *offset);

    let mut out = Vec::new();
    for (i, (name, start)) in found.iter().enumerate() {
        let end = found.get(i + 1).map(|(_, s)| *s).unwrap_or(text.len());
        let content = text[*start..end].trim();
        if content.is_empty() {
            continue;
        }
        out.push(TextFragment::new(
            Some((*name).to_string()),
            content.to_string(),
        ));
    }
    if out.is_empty() {
        vec![frag.clone()]
    } else {
        out
    }
}

/// 无锚点回退：按泛化罗马数字行切分并按关键词归类
fn fallback_split(text: &str) -> Vec<TextFragment> {
    let starts: Vec<usize> = GENERIC_ROMAN_LINE.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return vec![TextFragment::new(None, text.trim().to_string())];
    }

    let mut fragments = Vec::new();
    for (i, start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let content = text[*start..end].trim();
        if content.is_empty() {
            continue;
        }
        let part = classify_by_keyword(content);
        fragments.push(TextFragment::new(Some(part.to_string()), content.to_string()));
    }
    if fragments.is_empty() {
        vec![TextFragment::new(None, text.trim().to_string())]
    } else {
        fragments
    }
}

fn classify_by_keyword(content: &str) -> &'static str {
    let lower = content.to_lowercase();
    if lower.contains("listening") {
        "Listening"
    } else if lower.contains("grammar") {
        "Grammar"
    } else if lower.contains("reading") {
        "Reading"
    } else {
        "Writing"
    }
}

/// 尺寸受限细分：段落优先，超长段落再按句子切；单句超限原样保留
fn enforce_budget(frag: TextFragment, budget: usize) -> Vec<TextFragment> {
    if frag.content.chars().count() <= budget {
        return vec![frag];
    }

    let pieces = split_into_pieces(&frag.content, budget);
    if pieces.len() <= 1 {
        return vec![frag];
    }

    debug!(
        "[Segmenter] 片段 {:?} 超出预算，细分为 {} 段",
        frag.part_name,
        pieces.len()
    );
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let name = frag
                .part_name
                .as_ref()
                .map(|p| format!("{}_p{}", p, i + 1));
            TextFragment::new(name, content)
        })
        .collect()
}

fn split_into_pieces(content: &str, budget: usize) -> Vec<String> {
    let paragraphs: Vec<&str> = content
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .collect();

    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let push_current = |pieces: &mut Vec<String>, current: &mut String, len: &mut usize| {
        if !current.trim().is_empty() {
            pieces.push(current.trim().to_string());
        }
        current.clear();
        *len = 0;
    };

    for para in paragraphs {
        let para_len = para.chars().count();

        if para_len > budget {
            push_current(&mut pieces, &mut current, &mut current_len);
            pieces.extend(split_paragraph_by_sentence(para, budget));
            continue;
        }

        if current_len + para_len > budget && current_len > 0 {
            push_current(&mut pieces, &mut current, &mut current_len);
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
        current_len += para_len;
    }
    push_current(&mut pieces, &mut current, &mut current_len);
    pieces
}

/// 按句末标点切分超长段落；贪心打包到预算内
fn split_paragraph_by_sentence(para: &str, budget: usize) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();
    let mut buf = String::new();
    for ch in para.chars() {
        buf.push(ch);
        if matches!(ch, '。' | '！' | '？' | '.' | '!' | '?') {
            sentences.push(std::mem::take(&mut buf));
        }
    }
    if !buf.trim().is_empty() {
        sentences.push(buf);
    }

    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for sentence in sentences {
        let len = sentence.chars().count();
        if current_len + len > budget && current_len > 0 {
            pieces.push(current.trim().to_string());
            current = String::new();
            current_len = 0;
        }
        current.push_str(&sentence);
        current_len += len;
    }
    if !current.trim().is_empty() {
        pieces.push(current.trim().to_string());
    }
    pieces
}

/// 每片段解析一次节标题与 Directions 指令
fn annotate_section_meta(frag: &mut TextFragment) {
    if frag.section_heading.is_none() {
        frag.section_heading = first_nonempty_line(&frag.content)
            .filter(|line| line.chars().count() <= 80);
    }
    if frag.section_directions.is_none() {
        frag.section_directions = DIRECTIONS_LINE
            .captures(&frag.content)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().trim().to_string());
    }
}

fn first_nonempty_line(text: &str) -> Option<String> {
    text.lines()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .map(|l| l.to_string())
}

/// 分段前的重复选项块清理
///
/// 仅删除与紧邻前一个选项块完全一致（逐行 trim 后逐字节相等）的块；
/// 部分重叠的块一律保留。
pub fn remove_duplicate_option_blocks(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks: Vec<(usize, usize)> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        if OPTION_LINE.is_match(lines[i]) {
            let start = i;
            while i < lines.len() && OPTION_LINE.is_match(lines[i]) {
                i += 1;
            }
            if i - start >= 2 {
                blocks.push((start, i));
            }
        } else {
            i += 1;
        }
    }

    let mut drop_ranges: Vec<(usize, usize)> = Vec::new();
    for pair in blocks.windows(2) {
        let (a_start, a_end) = pair[0];
        let (b_start, b_end) = pair[1];
        let a_key: Vec<&str> = lines[a_start..a_end].iter().map(|l| l.trim()).collect();
        let b_key: Vec<&str> = lines[b_start..b_end].iter().map(|l| l.trim()).collect();
        // 两块之间只隔空行才视为"紧邻"
        let gap_blank = lines[a_end..b_start].iter().all(|l| l.trim().is_empty());
        if gap_blank && a_key == b_key {
            drop_ranges.push((b_start, b_end));
        }
    }

    if drop_ranges.is_empty() {
        return text.to_string();
    }

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    'outer: for (idx, line) in lines.iter().enumerate() {
        for (s, e) in &drop_ranges {
            if idx >= *s && idx < *e {
                continue 'outer;
            }
        }
        out.push(line);
    }
    out.join("\n")
}
