use crate::error::Result;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Condition {
    New,
    UsedOther,
    UsedLikeNew,
    Refurbished,
    OpenBox,
    FloorModel,
    BStock,
    Broken,
    Other,
}

impl Condition {
    /// Search priority, most specific first. "like new" has to be seen before
    /// plain "used", and "open box" before "new".
    pub const PRIORITY: [Condition; 8] = [
        Condition::FloorModel,
        Condition::Broken,
        Condition::Refurbished,
        Condition::BStock,
        Condition::OpenBox,
        Condition::UsedLikeNew,
        Condition::UsedOther,
        Condition::New,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Condition::New => "NEW",
            Condition::UsedOther => "USED-OTHER",
            Condition::UsedLikeNew => "USED-LIKE NEW",
            Condition::Refurbished => "REFURBISHED",
            Condition::OpenBox => "OPEN BOX",
            Condition::FloorModel => "FLOOR MODEL",
            Condition::BStock => "B STOCK",
            Condition::Broken => "BROKEN",
            Condition::Other => "OTHER",
        }
    }

    /// `None` for the catch-all, which is what's left when nothing matches.
    fn pattern(self) -> Option<&'static str> {
        let pattern = match self {
            Condition::New => r"new|nib",
            Condition::UsedOther => r"used|(2nd|second).?hand",
            Condition::UsedLikeNew => {
                r"like new|mint|excellent|perfect|flawless|very good|great|near(ly)?.?new|pristine|almost.?new"
            }
            Condition::Refurbished => r"refurb|recertified",
            Condition::OpenBox => r"open box|re.?box|re.?stock",
            Condition::FloorModel => r"floor|demo|display|expo|show",
            Condition::BStock => r"b.?stock",
            Condition::Broken => r"broken|(not|non).?working|faulty",
            Condition::Other => return None,
        };
        Some(pattern)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Compiled condition patterns in priority order.
#[derive(Debug, Clone)]
pub struct ConditionTable {
    rules: Vec<(Condition, Regex)>,
}

impl ConditionTable {
    pub fn new() -> Result<Self> {
        let mut rules = Vec::with_capacity(Condition::PRIORITY.len());
        for condition in Condition::PRIORITY {
            if let Some(pattern) = condition.pattern() {
                rules.push((condition, Regex::new(&format!("(?i){}", pattern))?));
            }
        }
        Ok(Self { rules })
    }

    /// First pattern in priority order that matches; `Other` when none do.
    pub fn resolve(&self, text: &str) -> Condition {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(condition, _)| *condition)
            .unwrap_or(Condition::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ConditionTable {
        ConditionTable::new().unwrap()
    }

    #[test]
    fn test_like_new_beats_used() {
        let t = table();
        assert_eq!(t.resolve("Used, like new"), Condition::UsedLikeNew);
        assert_eq!(t.resolve("used - mint condition"), Condition::UsedLikeNew);
        assert_eq!(t.resolve("Used"), Condition::UsedOther);
        assert_eq!(t.resolve("second-hand"), Condition::UsedOther);
    }

    #[test]
    fn test_specific_conditions_beat_new() {
        let t = table();
        assert_eq!(t.resolve("New (floor model)"), Condition::FloorModel);
        assert_eq!(t.resolve("new, open box"), Condition::OpenBox);
        assert_eq!(t.resolve("B-Stock"), Condition::BStock);
        assert_eq!(t.resolve("Refurbished by Yamaha"), Condition::Refurbished);
        assert_eq!(t.resolve("not working"), Condition::Broken);
        assert_eq!(t.resolve("Brand new"), Condition::New);
        assert_eq!(t.resolve("NIB"), Condition::New);
    }

    #[test]
    fn test_every_prioritized_condition_has_a_pattern() {
        assert!(Condition::PRIORITY.iter().all(|c| c.pattern().is_some()));
        assert!(!Condition::PRIORITY.contains(&Condition::Other));
        assert_eq!(Condition::Other.pattern(), None);
        assert_eq!(table().rules.len(), Condition::PRIORITY.len());
    }

    #[test]
    fn test_fallback_is_other() {
        let t = table();
        assert_eq!(t.resolve("ok"), Condition::Other);
        assert_eq!(t.resolve(""), Condition::Other);
        assert_eq!(Condition::Other.name(), "OTHER");
    }
}
