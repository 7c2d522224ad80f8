//! 分词：中英文混合，供哈希嵌入使用
//!
//! 含 CJK 字符时用 jieba（搜索引擎模式），否则按非字母数字字符切分。

use std::sync::OnceLock;

use jieba_rs::Jieba;

static JIEBA: OnceLock<Jieba> = OnceLock::new();

fn get_jieba() -> &'static Jieba {
    JIEBA.get_or_init(Jieba::new)
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |
        '\u{3400}'..='\u{4DBF}' |
        '\u{F900}'..='\u{FAFF}'
    )
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// 小写分词；丢弃单字符的非 CJK 词与纯标点
pub fn tokenize(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let keep = |s: &str| {
        let first = s.chars().next().unwrap_or(' ');
        s.chars().any(char::is_alphanumeric) && (s.chars().count() > 1 || is_cjk(first))
    };

    if contains_cjk(text) {
        get_jieba()
            .cut_for_search(text, true)
            .into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| keep(s))
            .collect()
    } else {
        text.split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .filter(|s| keep(s))
            .collect()
    }
}
