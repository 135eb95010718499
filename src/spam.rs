//! Heuristic spam classification for prompt text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::SpamConfig;

/// Points added per matching suspicious pattern.
const PATTERN_SCORE: u32 = 25;
/// Points added per matching denylist keyword.
const KEYWORD_SCORE: u32 = 20;
/// Points added when character entropy exceeds the threshold.
const ENTROPY_SCORE: u32 = 30;
/// Points added per long single-character run.
const REPETITION_SCORE: u32 = 10;

/// Minimum text length for the entropy signal to apply.
const ENTROPY_MIN_LENGTH: usize = 10;
/// Run length that counts as a repetition signal.
const REPETITION_RUN_LENGTH: usize = 11;
/// Run length that counts as a suspicious pattern on its own.
const PATTERN_RUN_LENGTH: usize = 16;
/// Block size and repeat count for the repeated-substring pattern.
const REPEATED_BLOCK_LENGTH: usize = 20;
const REPEATED_BLOCK_TIMES: usize = 4;

/// Regex-checkable suspicious patterns. Flag names carry the index
/// (`pattern_<index>`), so entries must not be reordered. Indexes 3 and 4
/// need backreferences and are matched structurally instead.
static SUSPICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Promotional follower/engagement offers
        Regex::new(r"(?i)(free|cheap|buy|get)\s+(followers|likes|subscribers|views)").unwrap(),
        // Embedded URLs
        Regex::new(r"(?i)https?://\S+|www\.\S+").unwrap(),
        // Long digit runs (phone numbers, card numbers)
        Regex::new(r"[0-9]{16,}").unwrap(),
    ]
});

/// Case-insensitive substring denylist.
const SPAM_KEYWORDS: &[&str] = &[
    "casino",
    "viagra",
    "cialis",
    "lottery",
    "jackpot",
    "betting",
    "porn",
    "xxx",
    "onlyfans",
    "escort",
    "crypto giveaway",
    "free bitcoin",
    "forex signals",
    "pump and dump",
    "wire transfer",
    "nigerian prince",
    "bit.ly",
    "tinyurl",
    "goo.gl",
];

/// The verdict produced by [`SpamClassifier::analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct SpamScore {
    /// Whether the accumulated score crosses the spam threshold
    pub is_spam: bool,
    /// Accumulated score across all signals
    pub score: u32,
    /// One flag per triggered signal, in evaluation order
    pub flags: Vec<String>,
    /// The flags joined into a single string
    pub reason: String,
}

/// Stateless multi-signal spam scorer.
///
/// Scoring is a pure function of the input text and the fixed
/// configuration; no I/O and no shared state, so it is safe to run fully in
/// parallel across requests. Every signal is evaluated unconditionally and
/// flags accumulate; none short-circuits the others.
pub struct SpamClassifier {
    config: SpamConfig,
}

impl SpamClassifier {
    /// Create a classifier with the given thresholds.
    pub fn new(config: SpamConfig) -> Self {
        Self { config }
    }

    /// Score `text` across all spam signals.
    pub fn analyze(&self, text: &str) -> SpamScore {
        let mut score = 0u32;
        let mut flags = Vec::new();
        let length = text.chars().count();

        if length < self.config.min_length {
            score += 20;
            flags.push("too_short".to_string());
        }
        if length > self.config.max_length {
            score += 15;
            flags.push("too_long".to_string());
        }

        for index in pattern_matches(text) {
            score += PATTERN_SCORE;
            flags.push(format!("pattern_{index}"));
        }

        let lowered = text.to_lowercase();
        for keyword in SPAM_KEYWORDS {
            if lowered.contains(keyword) {
                score += KEYWORD_SCORE;
                flags.push(format!("keyword_{keyword}"));
            }
        }

        let entropy = if length >= ENTROPY_MIN_LENGTH {
            shannon_entropy(text)
        } else {
            0.0
        };
        if entropy > self.config.entropy_threshold {
            score += ENTROPY_SCORE;
            flags.push("high_entropy".to_string());
        }

        let runs = repetition_runs(text, REPETITION_RUN_LENGTH);
        if runs > 0 {
            score += REPETITION_SCORE * runs as u32;
            flags.push(format!("repetition_{runs}"));
        }

        let is_spam = score > self.config.score_threshold;
        if is_spam {
            debug!(score, reason = %flags.join(", "), "Text classified as spam");
        }

        SpamScore {
            is_spam,
            score,
            reason: flags.join(", "),
            flags,
        }
    }
}

/// Indexes of every suspicious pattern matching `text`.
fn pattern_matches(text: &str) -> Vec<usize> {
    let mut matched = Vec::new();
    for (index, pattern) in SUSPICIOUS_PATTERNS.iter().enumerate() {
        if pattern.is_match(text) {
            matched.push(index);
        }
    }
    if longest_run(text) >= PATTERN_RUN_LENGTH {
        matched.push(3);
    }
    if has_repeated_block(text, REPEATED_BLOCK_LENGTH, REPEATED_BLOCK_TIMES) {
        matched.push(4);
    }
    matched
}

/// Length of the longest run of one repeated character.
fn longest_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for c in text.chars() {
        current = if previous == Some(c) { current + 1 } else { 1 };
        previous = Some(c);
        longest = longest.max(current);
    }
    longest
}

/// Number of maximal runs of at least `min_len` of one repeated character.
fn repetition_runs(text: &str, min_len: usize) -> usize {
    let mut runs = 0;
    let mut current = 0;
    let mut previous = None;
    for c in text.chars() {
        if previous == Some(c) {
            current += 1;
        } else {
            if current >= min_len {
                runs += 1;
            }
            current = 1;
            previous = Some(c);
        }
    }
    if current >= min_len {
        runs += 1;
    }
    runs
}

/// Whether any `block_len`-byte block repeats `times` or more in immediate
/// succession.
fn has_repeated_block(text: &str, block_len: usize, times: usize) -> bool {
    let bytes = text.as_bytes();
    let span = block_len * times;
    if bytes.len() < span {
        return false;
    }
    for start in 0..=bytes.len() - span {
        let block = &bytes[start..start + block_len];
        if (1..times)
            .all(|i| &bytes[start + i * block_len..start + (i + 1) * block_len] == block)
        {
            return true;
        }
    }
    false
}

/// Shannon entropy of the character distribution, in bits per character.
fn shannon_entropy(text: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut length = 0usize;
    for c in text.chars() {
        *counts.entry(c).or_insert(0) += 1;
        length += 1;
    }
    if length == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / length as f64;
            -p * p.log2()
        })
        .sum()
}
