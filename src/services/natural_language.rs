use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

const MEANINGLESS_REPLY: &str =
    "Xin lỗi, tôi chưa hiểu rõ câu hỏi của bạn. Bạn vui lòng đặt câu hỏi rõ ràng hơn nhé.";

const KEYBOARD_WALKS: &[&str] = &["qwerty", "asdfgh", "zxcvbn", "qazwsx", "123456"];

/// A small closed set of Vietnamese stopwords/common short words that still
/// count as "meaningful" despite being under the length-4 threshold.
const COMMON_SHORT_WORDS: &[&str] = &[
    "là", "có", "và", "của", "cho", "khi", "nếu", "đã", "sẽ", "ai", "gì", "ở", "đâu",
];

#[derive(Debug, Clone, PartialEq)]
pub enum NaturalLanguageMatch {
    Greeting(String),
    WellBeing(String),
    Identity(String),
    Thanks(String),
    Farewell(String),
    Meaningless(String),
}

impl NaturalLanguageMatch {
    pub fn reply(&self) -> &str {
        match self {
            NaturalLanguageMatch::Greeting(r)
            | NaturalLanguageMatch::WellBeing(r)
            | NaturalLanguageMatch::Identity(r)
            | NaturalLanguageMatch::Thanks(r)
            | NaturalLanguageMatch::Farewell(r)
            | NaturalLanguageMatch::Meaningless(r) => r,
        }
    }
}

struct GreetingBucket {
    patterns: Vec<Regex>,
    reply: &'static str,
    wrap: fn(String) -> NaturalLanguageMatch,
}

pub struct NaturalLanguageFilter {
    buckets: Vec<GreetingBucket>,
}

impl Default for NaturalLanguageFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl NaturalLanguageFilter {
    pub fn new() -> Self {
        let buckets = vec![
            GreetingBucket {
                patterns: compile(&["^(xin )?chào( bạn)?( ạ)?$", "^hi$", "^hello$", "^alo$"]),
                reply: "Xin chào! Tôi có thể giúp gì cho bạn về các văn bản hành chính hôm nay?",
                wrap: NaturalLanguageMatch::Greeting,
            },
            GreetingBucket {
                patterns: compile(&["bạn (có )?khỏe không", "bạn thế nào", "dạo này ra sao"]),
                reply: "Cảm ơn bạn đã hỏi thăm! Tôi vẫn sẵn sàng hỗ trợ bạn tra cứu thông tin.",
                wrap: NaturalLanguageMatch::WellBeing,
            },
            GreetingBucket {
                patterns: compile(&["bạn là ai", "bạn tên gì", "giới thiệu (về )?bản thân"]),
                reply: "Tôi là trợ lý tra cứu văn bản hành chính, giúp bạn tìm thông tin trong các tài liệu đã tải lên.",
                wrap: NaturalLanguageMatch::Identity,
            },
            GreetingBucket {
                patterns: compile(&["cảm ơn", "cám ơn", "thanks", "thank you"]),
                reply: "Không có gì, rất vui được giúp bạn!",
                wrap: NaturalLanguageMatch::Thanks,
            },
            GreetingBucket {
                patterns: compile(&["tạm biệt", "bye", "hẹn gặp lại"]),
                reply: "Tạm biệt! Hẹn gặp lại bạn.",
                wrap: NaturalLanguageMatch::Farewell,
            },
        ];

        Self { buckets }
    }

    /// Greeting table first, then the meaningless-query heuristic; the first
    /// match wins. Neither matching means retrieval should run.
    pub fn classify(&self, raw: &str) -> Option<NaturalLanguageMatch> {
        let normalized = normalize_text(raw);

        for bucket in &self.buckets {
            if bucket.patterns.iter().any(|re| re.is_match(&normalized)) {
                return Some((bucket.wrap)(bucket.reply.to_string()));
            }
        }

        if is_meaningless_query(&normalized) {
            return Some(NaturalLanguageMatch::Meaningless(MEANINGLESS_REPLY.to_string()));
        }

        None
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).expect("static pattern")).collect()
}

fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '?' || *c == '!')
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_meaningless_query(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.graphemes(true).count() < 3 {
        return true;
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if !compact.is_empty() && compact.chars().all(|c| c.is_ascii_digit() || c.is_ascii_punctuation()) {
        return true;
    }

    if has_consecutive_identical_letters(&compact, 3) {
        return true;
    }

    let len = compact.chars().count();
    if len >= 4 {
        let unique: std::collections::HashSet<char> = compact.chars().collect();
        let repetition_ratio = 1.0 - (unique.len() as f64 / len as f64);
        let threshold = if len >= 6 { 0.4 } else { 0.5 };
        if repetition_ratio >= threshold {
            return true;
        }
    }

    if has_short_period_repeat(&compact) {
        return true;
    }

    if KEYBOARD_WALKS.iter().any(|walk| compact.contains(walk)) {
        return true;
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let has_meaningful = tokens
        .iter()
        .any(|t| t.chars().count() >= 4 || COMMON_SHORT_WORDS.contains(t));

    if !has_meaningful && tokens.len() >= 4 {
        return true;
    }

    false
}

fn has_consecutive_identical_letters(s: &str, run: usize) -> bool {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < run {
        return false;
    }
    chars.windows(run).any(|w| w.iter().all(|c| *c == w[0]))
}

/// Detects short repeating periods (e.g. "ababab", "xyzxyzxyz").
fn has_short_period_repeat(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    if len < 4 {
        return false;
    }

    for period in 1..=(len / 2) {
        if len % period != 0 {
            continue;
        }
        let repeats = chars[..period].repeat(len / period);
        if repeats == chars {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> NaturalLanguageFilter {
        NaturalLanguageFilter::new()
    }

    #[test]
    fn greeting_matches_before_meaningless_check() {
        let m = filter().classify("Xin chào").unwrap();
        assert!(matches!(m, NaturalLanguageMatch::Greeting(_)));
    }

    #[test]
    fn thanks_bucket_matches() {
        let m = filter().classify("cảm ơn bạn nhiều").unwrap();
        assert!(matches!(m, NaturalLanguageMatch::Thanks(_)));
    }

    #[test]
    fn short_query_is_meaningless() {
        let m = filter().classify("ab").unwrap();
        assert!(matches!(m, NaturalLanguageMatch::Meaningless(_)));
    }

    #[test]
    fn all_digit_query_is_meaningless() {
        let m = filter().classify("123456").unwrap();
        assert!(matches!(m, NaturalLanguageMatch::Meaningless(_)));
    }

    #[test]
    fn repeated_letters_are_meaningless() {
        let m = filter().classify("aaaaaa").unwrap();
        assert!(matches!(m, NaturalLanguageMatch::Meaningless(_)));
    }

    #[test]
    fn keyboard_walk_is_meaningless() {
        let m = filter().classify("qwerty thing").unwrap();
        assert!(matches!(m, NaturalLanguageMatch::Meaningless(_)));
    }

    #[test]
    fn real_question_falls_through_to_retrieval() {
        let m = filter().classify("Thủ tục đăng ký khai sinh cần giấy tờ gì?");
        assert!(m.is_none());
    }
}
