//! Text normalization for make/model canonicalization and the frequency table
//! that picks a canonical spelling per cluster.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::color::{ColorTable, MatchMode};
use super::fuzzy::FuzzyIndex;

/// Product-line names that sit between the make and the model number.
static LONG_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(arius|avant.?grand|clavinova|celviano|privia|novus) ?").unwrap()
});

/// Anything after one of these is accessory or packaging talk.
static CONNECTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i) ?(?:\bw/|[\[+(/,&]|\bwith\b|\bset\b|\bbundle\b|\bfinish\b|\bin\b|\bpedals?\b)")
        .unwrap()
});

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Drops product-line names and truncates at the first connector.
/// "Clavinova CLP-745 w/ bench" → "CLP-745"
pub fn strip_known_descriptors(s: &str) -> String {
    let without_lines = LONG_NAMES.replace_all(s, "");
    let head = CONNECTOR.split(&without_lines).next().unwrap_or_default();
    head.trim().to_string()
}

/// Keeps the first word and everything up to the last word containing a digit.
/// "P155 DIGITAL PIANO" → "P155"
pub fn strip_trailing_descriptors(s: &str) -> String {
    let stripped = strip_known_descriptors(s);
    let mut words = stripped.split_whitespace();
    let Some(first) = words.next() else {
        return String::new();
    };

    let mut base = first.to_string();
    let mut held: Vec<&str> = Vec::new();
    for word in words {
        held.push(word);
        if word.chars().any(|c| c.is_ascii_digit()) {
            base.push(' ');
            base.push_str(&held.join(" "));
            held.clear();
        }
    }
    base
}

/// Uppercase, descriptor-free, digit runs padded with spaces.
/// "P155B" → "P 155 B"
pub fn normalize(s: &str) -> String {
    let upper = strip_trailing_descriptors(&s.to_uppercase()).replace('-', " ");
    let spaced = DIGIT_RUN.replace_all(&upper, " $1 ");
    collapse_whitespace(&spaced)
}

/// Make spellings only lose product-line names and trailing accessory notes.
pub fn normalize_make(s: &str) -> String {
    collapse_whitespace(&strip_known_descriptors(s).to_uppercase())
}

/// Text after the last "- " separator with all spaces removed.
/// "YAMAHA - P 155" → "P155"
pub fn finalize_model(key: &str) -> String {
    key.rsplit("- ").next().unwrap_or(key).replace(' ', "")
}

pub fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Two model strings may only merge when they carry the same model number.
pub fn model_numbers_match(a: &str, b: &str) -> bool {
    digits(a) == digits(b)
}

/// Normalization steps that need the color table.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    colors: &'a ColorTable,
}

impl<'a> Normalizer<'a> {
    pub fn new(colors: &'a ColorTable) -> Self {
        Self { colors }
    }

    /// Drops a trailing color token; color is inferred separately.
    pub fn strip_color(&self, s: &str) -> String {
        match self.colors.match_token(s, MatchMode::EndsWith, None) {
            Some((token, _)) => s.strip_suffix(token).unwrap_or(s).to_string(),
            None => s.to_string(),
        }
    }

    /// The string compared during fuzzy matching.
    /// "P155B digital piano" → "P 155"
    pub fn fuzzy_key(&self, s: &str) -> String {
        collapse_whitespace(&self.strip_color(&normalize(s)))
    }

    /// "<make> - <model>" with the fields swapped back when the make pass
    /// flagged them, and a repeated make dropped from the front of the model.
    pub fn composite_key(&self, make: &str, model: &str, swapped: bool) -> String {
        let (used_make, used_model) = if swapped { (model, make) } else { (make, model) };
        let used_make = used_make.trim();
        let mut used_model = used_model.trim();

        if !used_make.is_empty()
            && used_model
                .get(..used_make.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(used_make))
        {
            used_model = used_model[used_make.len()..]
                .trim_start()
                .trim_start_matches([':', '-']);
        }

        format!("{} - {}", self.fuzzy_key(used_make), self.fuzzy_key(used_model))
    }
}

// ── Frequency table ───────────────────────────────────────────────────────────

/// Occurrence counts of normalized strings, searchable by fuzzy match.
///
/// The first occurrence of a string registers it with the fuzzy index; later
/// ones only bump its count.
#[derive(Debug, Clone)]
pub struct FrequencyIndex {
    positions: HashMap<String, usize>,
    counts: Vec<usize>,
    fuzzy: FuzzyIndex,
}

impl FrequencyIndex {
    pub fn new(fuzzy: FuzzyIndex) -> Self {
        Self {
            positions: HashMap::new(),
            counts: Vec::new(),
            fuzzy,
        }
    }

    pub fn register(&mut self, key: String) {
        match self.positions.get(&key) {
            Some(&i) => self.counts[i] += 1,
            None => {
                let i = self.fuzzy.add(key.clone());
                debug_assert_eq!(i, self.counts.len());
                self.positions.insert(key, i);
                self.counts.push(1);
            }
        }
    }

    pub fn count(&self, key: &str) -> usize {
        self.positions.get(key).map_or(0, |&i| self.counts[i])
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Most frequent fuzzy hit accepted by `accept`; equal counts go to the
    /// string registered first.
    pub fn best_match<F>(&self, query: &str, accept: F) -> Option<(&str, usize)>
    where
        F: Fn(&str) -> bool,
    {
        self.fuzzy
            .search(query)
            .into_iter()
            .filter(|hit| accept(hit.item))
            .map(|hit| (hit.item, self.counts[hit.index], hit.index))
            .max_by_key(|&(_, count, index)| (count, std::cmp::Reverse(index)))
            .map(|(item, count, _)| (item, count))
    }
}
