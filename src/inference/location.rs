//! Free-text location → country.
//!
//! Three key tables (countries, provinces, cities) map normalized names to a
//! country. A lookup tries the strategies the caller asks for, in order, and
//! within each strategy escalates from exact key, to whole-word containment,
//! to fuzzy match.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::fuzzy::FuzzyIndex;
use crate::models::{Country, RawCityRow, RawCountryRow, RawCurrencyRow, RawProvinceRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Country,
    Province,
    City,
}

impl SearchStrategy {
    /// Country names are short and distinctive, so they get the strictest threshold.
    fn fuzzy_threshold(self) -> f64 {
        match self {
            SearchStrategy::Country => 0.05,
            SearchStrategy::Province => 0.1,
            SearchStrategy::City => 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub strategies: Vec<SearchStrategy>,
    pub check_for_includes: bool,
    pub fuzzy: bool,
}

impl SearchOptions {
    pub fn new(strategies: &[SearchStrategy]) -> Self {
        Self {
            strategies: strategies.to_vec(),
            ..Self::default()
        }
    }

    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn check_for_includes(mut self, check: bool) -> Self {
        self.check_for_includes = check;
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            strategies: vec![SearchStrategy::Country],
            check_for_includes: true,
            fuzzy: false,
        }
    }
}

/// Letters and single spaces only, uppercased.
pub fn normalize_key(s: &str) -> String {
    let letters: String = s
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .collect();
    letters.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

/// `needle` occurs in `haystack` bounded by spaces or the ends of the string.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(at, _)| {
        let before_ok = haystack[..at].chars().next_back().is_none_or(|c| c == ' ');
        let after_ok = haystack[at + needle.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ');
        before_ok && after_ok
    })
}

// ── Key tables ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct KeyTable {
    index: HashMap<String, usize>,
    /// Insertion order, scanned by the containment check.
    keys: Vec<String>,
    fuzzy: FuzzyIndex,
}

impl KeyTable {
    fn new(strategy: SearchStrategy) -> Self {
        Self {
            index: HashMap::new(),
            keys: Vec::new(),
            fuzzy: FuzzyIndex::new(strategy.fuzzy_threshold()),
        }
    }

    /// Inserts or overwrites. Names go into the fuzzy matcher; codes and aliases don't.
    /// Returns false when the key was already present.
    fn insert(&mut self, key: &str, country: usize, searchable: bool) -> bool {
        let key = normalize_key(key);
        if key.is_empty() {
            return true;
        }
        if let Some(slot) = self.index.get_mut(&key) {
            *slot = country;
            return false;
        }
        if searchable {
            self.fuzzy.add(key.clone());
        }
        self.keys.push(key.clone());
        self.index.insert(key, country);
        true
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(&normalize_key(key))
    }

    fn lookup(&self, test: &str, options: &SearchOptions) -> Option<usize> {
        if let Some(&country) = self.index.get(test) {
            return Some(country);
        }
        if options.check_for_includes {
            let found = self
                .keys
                .iter()
                .find(|key| key.len() > 3 && contains_word(test, key));
            if let Some(key) = found {
                return self.index.get(key.as_str()).copied();
            }
        }
        if options.fuzzy {
            if let Some(hit) = self.fuzzy.search(test).first() {
                debug!("Fuzzy location match {:?} ~ {:?} ({:.3})", test, hit.item, hit.score);
                return self.index.get(hit.item).copied();
            }
        }
        None
    }
}

// ── Geo index ─────────────────────────────────────────────────────────────────

/// Raw reference tables, as read from disk.
#[derive(Debug, Clone, Default)]
pub struct GeoData {
    pub countries: Vec<RawCountryRow>,
    pub currencies: Vec<RawCurrencyRow>,
    pub provinces: Vec<RawProvinceRow>,
    pub cities: Vec<RawCityRow>,
}

#[derive(Debug, Clone)]
pub struct GeoIndex {
    countries: Vec<Country>,
    by_country: KeyTable,
    by_province: KeyTable,
    by_city: KeyTable,
}

impl GeoIndex {
    /// Provinces are only indexed for `province_countries`; other countries'
    /// province names collide too often. Cities below `min_city_population`
    /// are skipped, and on a name collision the larger city wins.
    pub fn build(data: GeoData, province_countries: &[String], min_city_population: u64) -> Self {
        let currency_names: HashMap<String, String> = data
            .currencies
            .into_iter()
            .map(|c| (c.code.trim().to_uppercase(), c.name.trim().to_uppercase()))
            .collect();

        let mut countries = Vec::with_capacity(data.countries.len());
        let mut by_country = KeyTable::new(SearchStrategy::Country);
        let mut by_code: HashMap<String, usize> = HashMap::new();

        for row in data.countries {
            let code = row.code.trim().to_uppercase();
            let currency_codes: BTreeSet<String> = row
                .currencies
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or("USD")
                .split([',', ';'])
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
            let names = currency_codes
                .iter()
                .filter_map(|c| currency_names.get(c).cloned())
                .collect();

            let country = Country {
                name: row.name.trim().to_uppercase(),
                country_code: code.clone(),
                currency_codes,
                currency_names: names,
            };

            let i = countries.len();
            by_country.insert(&country.name, i, true);
            by_country.insert(&code, i, false);
            match country.name.as_str() {
                // common spellings the code table doesn't cover
                "UNITED STATES" => {
                    by_country.insert("USA", i, false);
                }
                "UNITED KINGDOM" => {
                    by_country.insert("UK", i, false);
                }
                _ => {}
            }
            by_code.insert(code, i);
            countries.push(country);
        }

        let mut by_province = KeyTable::new(SearchStrategy::Province);
        for row in data.provinces {
            let code = row.country.trim().to_uppercase();
            if !province_countries.iter().any(|c| c.eq_ignore_ascii_case(&code)) {
                continue;
            }
            let Some(&i) = by_code.get(&code) else {
                continue;
            };
            if !by_province.insert(&row.name, i, true) {
                warn!("Duplicate province with name {} found", row.name);
            }
            if let Some(short) = row.short.as_deref().filter(|s| !s.trim().is_empty()) {
                if !by_province.insert(short, i, false) {
                    warn!("Duplicate province with short name {} found", short);
                }
            }
        }

        let mut by_city = KeyTable::new(SearchStrategy::City);
        let mut city_population: HashMap<String, u64> = HashMap::new();
        for row in data.cities {
            if row.population < min_city_population {
                continue;
            }
            let Some(&i) = by_code.get(&row.country.trim().to_uppercase()) else {
                continue;
            };
            let key = normalize_key(&row.name);
            if key == "NEW YORK CITY" {
                by_city.insert("NYC", i, false);
            }
            match city_population.get(&key) {
                Some(&pop) if pop >= row.population => {}
                _ => {
                    by_city.insert(&key, i, true);
                    city_population.insert(key, row.population);
                }
            }
        }

        debug!(
            "Geo index: {} countries, {} province keys, {} city keys",
            countries.len(),
            by_province.keys.len(),
            by_city.keys.len()
        );

        Self {
            countries,
            by_country,
            by_province,
            by_city,
        }
    }

    pub fn country_count(&self) -> usize {
        self.countries.len()
    }

    pub fn has_province(&self, name: &str) -> bool {
        self.by_province.contains(name)
    }

    pub fn has_city(&self, name: &str) -> bool {
        self.by_city.contains(name)
    }

    /// Tries each strategy in `options` order; first hit wins.
    pub fn country_from(&self, text: &str, options: &SearchOptions) -> Option<&Country> {
        let test = normalize_key(text);
        if test.is_empty() {
            return None;
        }
        options
            .strategies
            .iter()
            .find_map(|strategy| {
                let table = match strategy {
                    SearchStrategy::Country => &self.by_country,
                    SearchStrategy::Province => &self.by_province,
                    SearchStrategy::City => &self.by_city,
                };
                table.lookup(&test, options)
            })
            .map(|i| &self.countries[i])
    }
}

// ── Post locations ────────────────────────────────────────────────────────────

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^n/?a$|^same$|^(online|web(.?site)?|ebay|craigslist)$|^www\.|\.com$").unwrap()
});

/// "St. Louis" → ("St", "Louis")
static ABBREVIATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([A-Z]+)\. ?([A-Z]+)\b").unwrap());

static NON_ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z ]").unwrap());

#[derive(Debug, Clone, Copy)]
enum Split {
    /// "City, State (Country)" style delimiters.
    Punctuation,
    /// Already stripped to letters: whole string, then each word.
    Words,
}

/// Resolves where a purchase happened from a post's vendor and user locations.
#[derive(Debug, Clone, Copy)]
pub struct LocationResolver<'a> {
    geo: &'a GeoIndex,
}

impl<'a> LocationResolver<'a> {
    pub fn new(geo: &'a GeoIndex) -> Self {
        Self { geo }
    }

    /// Vendor location is preferred over the poster's own location. Exact
    /// province/country lookups are tried first; only when both locations fail
    /// does the search widen to cities and fuzzy matching.
    pub fn purchase_country(&self, vendor: &str, user: &str) -> Option<&'a Country> {
        let strict = SearchOptions::new(&[SearchStrategy::Province, SearchStrategy::Country]);
        let loose = SearchOptions::new(&[
            SearchStrategy::Province,
            SearchStrategy::Country,
            SearchStrategy::City,
        ])
        .fuzzy(true);

        self.country_for_location(vendor, &strict, Split::Punctuation)
            .or_else(|| self.country_for_location(user, &strict, Split::Punctuation))
            .or_else(|| {
                let vendor = NON_ALPHA.replace_all(vendor, "");
                self.country_for_location(&vendor, &loose, Split::Words)
            })
            .or_else(|| {
                let user = NON_ALPHA.replace_all(user, "");
                self.country_for_location(&user, &loose, Split::Words)
            })
    }

    pub fn country_for(&self, location: &str, options: &SearchOptions) -> Option<&'a Country> {
        self.country_for_location(location, options, Split::Punctuation)
    }

    fn country_for_location(
        &self,
        location: &str,
        options: &SearchOptions,
        split: Split,
    ) -> Option<&'a Country> {
        let location = location.trim();
        if location.is_empty() || PLACEHOLDER.is_match(location) {
            return None;
        }

        let mut parts: Vec<String> = Vec::new();
        match split {
            Split::Punctuation => {
                if location.contains('.') {
                    if let Some(caps) = ABBREVIATED.captures(location) {
                        parts.push(format!("{} {}", &caps[1], &caps[2]));
                    }
                }
                // first '.' is usually an abbreviation; anything after a second one is noise
                let dotless = location.replacen('.', "", 1);
                let head = dotless.split('.').next().unwrap_or_default();
                let mut pieces: Vec<String> = head
                    .split(['(', ')', '/', ','])
                    .map(|p| p.to_string())
                    .collect();
                pieces.reverse();
                parts.extend(pieces);
            }
            Split::Words => {
                parts.push(location.to_string());
                parts.extend(location.split_whitespace().rev().map(|p| p.to_string()));
            }
        }

        parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .find_map(|p| self.geo.country_from(p, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn country(code: &str, name: &str, currencies: &str) -> RawCountryRow {
        RawCountryRow {
            code: code.to_string(),
            name: name.to_string(),
            currencies: Some(currencies.to_string()),
        }
    }

    fn province(country: &str, name: &str, short: &str) -> RawProvinceRow {
        RawProvinceRow {
            country: country.to_string(),
            name: name.to_string(),
            short: Some(short.to_string()),
        }
    }

    fn city(name: &str, country: &str, population: u64) -> RawCityRow {
        RawCityRow {
            name: name.to_string(),
            country: country.to_string(),
            population,
        }
    }

    fn geo() -> GeoIndex {
        let data = GeoData {
            countries: vec![
                country("US", "United States", "USD,USN,USS"),
                country("CA", "Canada", "CAD"),
                country("GB", "United Kingdom", "GBP"),
                country("IL", "Israel", "ILS"),
                country("DE", "Germany", "EUR"),
                RawCountryRow {
                    code: "AQ".to_string(),
                    name: "Antarctica".to_string(),
                    currencies: None,
                },
            ],
            currencies: vec![
                RawCurrencyRow {
                    code: "USD".to_string(),
                    name: "US Dollar".to_string(),
                },
                RawCurrencyRow {
                    code: "CAD".to_string(),
                    name: "Canadian Dollar".to_string(),
                },
            ],
            provinces: vec![
                province("US", "Illinois", "IL"),
                province("US", "Missouri", "MO"),
                province("US", "California", "CA"),
                province("CA", "Ontario", "ON"),
                province("DE", "Bavaria", "BY"),
            ],
            cities: vec![
                city("Chicago", "US", 2_700_000),
                city("St Louis", "US", 300_000),
                city("London", "CA", 383_000),
                city("London", "GB", 8_900_000),
                city("Toronto", "CA", 2_700_000),
                city("Munich", "DE", 1_500_000),
                city("New York City", "US", 8_400_000),
                city("Smallville", "US", 900),
            ],
        };
        GeoIndex::build(data, &["US".to_string(), "CA".to_string()], 10_000)
    }

    fn code(c: Option<&Country>) -> Option<&str> {
        c.map(|c| c.country_code.as_str())
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key(" St. Louis,  MO "), "ST LOUIS MO");
        assert_eq!(normalize_key("München"), "MNCHEN");
    }

    #[test]
    fn test_country_table_and_aliases() {
        let geo = geo();
        let opts = SearchOptions::default();
        assert_eq!(code(geo.country_from("usa", &opts)), Some("US"));
        assert_eq!(code(geo.country_from("UK", &opts)), Some("GB"));
        assert_eq!(code(geo.country_from("Germany", &opts)), Some("DE"));
        assert_eq!(code(geo.country_from("Nowhere", &opts)), None);
    }

    #[test]
    fn test_currency_defaults_and_names() {
        let geo = geo();
        let us = geo.country_from("US", &SearchOptions::default()).unwrap();
        assert!(us.currency_codes.contains("USN"));
        assert!(us.currency_names.contains("US DOLLAR"));

        let aq = geo.country_from("Antarctica", &SearchOptions::default()).unwrap();
        assert_eq!(aq.currency_codes.iter().collect::<Vec<_>>(), vec!["USD"]);
    }

    #[test]
    fn test_provinces_restricted_to_configured_countries() {
        let geo = geo();
        assert!(geo.has_province("Illinois"));
        assert!(geo.has_province("ON"));
        assert!(!geo.has_province("Bavaria"));
    }

    #[test]
    fn test_strategy_order_matters() {
        let geo = geo();
        // "IL" is both Illinois and Israel's country code
        let province_first = SearchOptions::new(&[SearchStrategy::Province, SearchStrategy::Country]);
        let country_first = SearchOptions::new(&[SearchStrategy::Country, SearchStrategy::Province]);
        assert_eq!(code(geo.country_from("IL", &province_first)), Some("US"));
        assert_eq!(code(geo.country_from("IL", &country_first)), Some("IL"));
    }

    #[test]
    fn test_includes_scan_uses_whole_words() {
        let geo = geo();
        let cities = SearchOptions::new(&[SearchStrategy::City]);
        assert_eq!(code(geo.country_from("downtown Toronto area", &cities)), Some("CA"));
        assert_eq!(code(geo.country_from("Torontonian", &cities)), None);
        assert_eq!(
            code(geo.country_from("downtown Toronto area", &cities.clone().check_for_includes(false))),
            None
        );
    }

    #[test]
    fn test_fuzzy_fallback() {
        let geo = geo();
        let cities = SearchOptions::new(&[SearchStrategy::City]).check_for_includes(false);
        assert_eq!(code(geo.country_from("Chicagoo", &cities)), None);
        assert_eq!(code(geo.country_from("Chicagoo", &cities.fuzzy(true))), Some("US"));
    }

    #[test]
    fn test_city_collision_prefers_larger_city() {
        let geo = geo();
        let cities = SearchOptions::new(&[SearchStrategy::City]);
        assert_eq!(code(geo.country_from("London", &cities)), Some("GB"));
        assert_eq!(code(geo.country_from("NYC", &cities)), Some("US"));
        assert!(!geo.has_city("Smallville"));
    }

    #[test]
    fn test_chicago_il_resolves_through_province() {
        let geo = geo();
        let resolver = LocationResolver::new(&geo);
        let strict = SearchOptions::new(&[SearchStrategy::Province, SearchStrategy::Country]);
        assert_eq!(code(resolver.country_for("Chicago, IL", &strict)), Some("US"));
    }

    #[test]
    fn test_placeholders_never_resolve() {
        let geo = geo();
        let resolver = LocationResolver::new(&geo);
        let everything = SearchOptions::new(&[
            SearchStrategy::Province,
            SearchStrategy::Country,
            SearchStrategy::City,
        ])
        .fuzzy(true);
        for placeholder in ["n/a", "N/A", "na", "same", "online", "eBay", "www.piano.de", "pianos.com"] {
            assert_eq!(code(resolver.country_for(placeholder, &everything)), None, "{}", placeholder);
        }
        assert_eq!(code(resolver.purchase_country("n/a", "n/a")), None);
    }

    #[test]
    fn test_purchase_country_prefers_vendor() {
        let geo = geo();
        let resolver = LocationResolver::new(&geo);
        assert_eq!(code(resolver.purchase_country("Toronto, ON", "Chicago, IL")), Some("CA"));
        assert_eq!(code(resolver.purchase_country("online", "Chicago, IL")), Some("US"));
    }

    #[test]
    fn test_purchase_country_falls_back_to_cities() {
        let geo = geo();
        let resolver = LocationResolver::new(&geo);
        assert_eq!(code(resolver.purchase_country("Munich", "")), Some("DE"));
        assert_eq!(code(resolver.purchase_country("", "St. Louis")), Some("US"));
        assert_eq!(code(resolver.purchase_country("local store", "")), None);
    }
}
