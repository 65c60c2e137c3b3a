use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Color {
    Ebony,
    Black,
    PolishedBlack,
    White,
    Brown,
    Rosewood,
    Mahogany,
    Walnut,
    Cherry,
    Maple,
    Silver,
    Other,
}

impl Color {
    pub const ALL: [Color; 12] = [
        Color::Ebony,
        Color::Black,
        Color::PolishedBlack,
        Color::White,
        Color::Brown,
        Color::Rosewood,
        Color::Mahogany,
        Color::Walnut,
        Color::Cherry,
        Color::Maple,
        Color::Silver,
        Color::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Color::Ebony => "EBONY",
            Color::Black => "BLACK",
            Color::PolishedBlack => "POLISHED BLACK",
            Color::White => "WHITE",
            Color::Brown => "BROWN",
            Color::Rosewood => "ROSEWOOD",
            Color::Mahogany => "MAHOGANY",
            Color::Walnut => "WALNUT",
            Color::Cherry => "CHERRY",
            Color::Maple => "MAPLE",
            Color::Silver => "SILVER",
            Color::Other => "OTHER/UNKNOWN",
        }
    }

    /// Abbreviations and finish names that mean this color (the name itself excluded).
    pub fn equivalents(self) -> &'static [&'static str] {
        match self {
            Color::Ebony => &[
                "PE",
                "EP",
                "POLISHED EBONY",
                "EBONY POLISH",
                "EBONY POLISHED",
                "BLACK EBONY",
            ],
            Color::Black => &[
                "B",
                "BK",
                "BLK",
                "SB",
                "SATIN BLACK",
                "BLACK SATIN",
                "MATTE BLACK",
                "BLACK MATTE",
                "CHARCOAL",
                "CHARCOAL BLACK",
            ],
            Color::PolishedBlack => &["PB", "BP", "BLACK POLISH"],
            Color::White => &[
                "W",
                "WH",
                "PW",
                "PBW",
                "SW",
                "POLISHED WHITE",
                "POLISHED BRILLIANT WHITE",
                "SATIN WHITE",
                "MATTE WHITE",
                "WHITE MATTE",
            ],
            Color::Brown => &["BRWN"],
            Color::Rosewood => &[
                "R",
                "RO",
                "RW",
                "PR",
                "POLISHED ROSEWOOD",
                "PREMIUM ROSEWOOD",
                "SATIN ROSEWOOD",
                "DARK ROSEWOOD",
            ],
            Color::Mahogany => &[
                "PM",
                "POLISHED MAHOGANY",
                "PREMIUM MAHOGANY",
                "SATIN MAHOGANY",
            ],
            Color::Walnut => &[
                "PW",
                "WALNUT BROWN",
                "POLISHED WALNUT",
                "PREMIUM WALNUT",
                "SATIN WALNUT",
            ],
            Color::Cherry => &["PC", "POLISHED CHERRY", "PREMIUM CHERRY", "SATIN CHERRY"],
            Color::Maple => &["POLISHED MAPLE", "PREMIUM MAPLE", "SATIN MAPLE"],
            Color::Silver => &["ROSE SILVER"],
            Color::Other => &[],
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    StartsWith,
    EndsWith,
    Contains,
}

/// Every color token pooled into one list, longest first, so "SATIN BLACK"
/// is tried before "B" could match on its own.
#[derive(Debug, Clone)]
pub struct ColorTable {
    tokens: Vec<(&'static str, Color)>,
}

impl ColorTable {
    pub fn new() -> Self {
        let mut tokens: Vec<(&'static str, Color)> = Color::ALL
            .iter()
            .flat_map(|&color| {
                color
                    .equivalents()
                    .iter()
                    .copied()
                    .chain(std::iter::once(color.name()))
                    .map(move |token| (token, color))
            })
            .collect();

        // stable: equal lengths keep registration order, so a token shared by two
        // colors ("PW") resolves to the first one registered
        tokens.sort_by_key(|(token, _)| std::cmp::Reverse(token.chars().count()));

        Self { tokens }
    }

    /// First (longest) token matching `text` under `mode`, skipping tokens shorter than `min_len`.
    pub fn match_token(
        &self,
        text: &str,
        mode: MatchMode,
        min_len: Option<usize>,
    ) -> Option<(&'static str, Color)> {
        let test = text.to_uppercase();
        self.tokens
            .iter()
            .filter(|(token, _)| min_len.is_none_or(|min| token.chars().count() >= min))
            .find(|(token, _)| match mode {
                MatchMode::Exact => test == *token,
                MatchMode::StartsWith => test.starts_with(token),
                MatchMode::EndsWith => test.ends_with(token),
                MatchMode::Contains => test.contains(token),
            })
            .copied()
    }

    pub fn resolve(&self, text: &str, mode: MatchMode, min_len: Option<usize>) -> Color {
        self.match_token(text, mode, min_len)
            .map(|(_, color)| color)
            .unwrap_or(Color::Other)
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new()
    }
}
