//! Corpus-wide inference over scraped posts.
//!
//! Passes run in a fixed order (make, model, color, condition, country) and
//! each one finishes over the whole collection before the next starts. A
//! pass writes its own slot on every post once; running it again is a no-op.

pub mod canonical;
pub mod color;
pub mod condition;
pub mod fuzzy;
pub mod location;

use crate::error::Result;
use crate::models::{ExtractedPost, InferredPost, set_once};
use crate::utils::Timer;
use canonical::{FrequencyIndex, Normalizer, finalize_model, model_numbers_match, normalize, normalize_make};
use color::{Color, ColorTable, MatchMode};
use condition::ConditionTable;
use fuzzy::FuzzyIndex;
use location::{GeoIndex, LocationResolver};
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

const MAKE_THRESHOLD: f64 = 0.3;
const MAKE_MIN_QUERY: usize = 2;
const MODEL_THRESHOLD: f64 = 0.05;
const MODEL_MIN_QUERY: usize = 3;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

/// Immutable lookup tables shared by every pass.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    pub colors: ColorTable,
    pub conditions: ConditionTable,
    pub geo: GeoIndex,
}

impl ReferenceTables {
    pub fn new(geo: GeoIndex) -> Result<Self> {
        Ok(Self {
            colors: ColorTable::new(),
            conditions: ConditionTable::new()?,
            geo,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PassesRun {
    make: bool,
    model: bool,
    color: bool,
    condition: bool,
    country: bool,
}

pub struct PostProcessor<'a> {
    tables: &'a ReferenceTables,
    posts: Vec<InferredPost>,
    done: PassesRun,
}

impl<'a> PostProcessor<'a> {
    pub fn new(tables: &'a ReferenceTables, posts: Vec<ExtractedPost>) -> Self {
        Self {
            tables,
            posts: posts.into_iter().map(InferredPost::from).collect(),
            done: PassesRun::default(),
        }
    }

    pub fn posts(&self) -> &[InferredPost] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<InferredPost> {
        self.posts
    }

    pub fn infer_all(&mut self) -> &mut Self {
        let _t = Timer::start(format!("Inference over {} posts", self.posts.len()));
        self.infer_make()
            .infer_model()
            .infer_color()
            .infer_condition()
            .infer_purchase_country()
    }

    fn normalizer(&self) -> Normalizer<'a> {
        Normalizer::new(&self.tables.colors)
    }

    // ── Make ──────────────────────────────────────────────────────────────────

    /// Canonical make per post, by frequency-weighted fuzzy match. A post whose
    /// model text looks more like a known make than its make text does is
    /// flagged as having the two fields swapped.
    pub fn infer_make(&mut self) -> &mut Self {
        if self.done.make {
            warn!("Make inference already ran, skipping");
            return self;
        }
        let _t = Timer::start("Make inference");
        let normalizer = self.normalizer();

        let mut makes = FrequencyIndex::new(
            FuzzyIndex::new(MAKE_THRESHOLD).with_min_query_len(MAKE_MIN_QUERY),
        );
        for p in &self.posts {
            let key = normalize_make(&p.post.make);
            if !key.is_empty() {
                makes.register(key);
            }
        }
        debug!("{} distinct makes", makes.distinct());

        let mut swapped = 0usize;
        for p in &mut self.posts {
            let make_key = normalize_make(&p.post.make);
            if make_key.is_empty() {
                continue;
            }
            let by_make = makes.best_match(&make_key, |_| true);
            let by_model = makes.best_match(&normalizer.fuzzy_key(&p.post.model), |_| true);

            let make_count = by_make.map_or(0, |(_, count)| count);
            let chosen = match by_model {
                Some((item, count)) if count > make_count => {
                    p.inferred.swapped_make_model = true;
                    swapped += 1;
                    item.to_string()
                }
                _ => by_make
                    .map(|(item, _)| item.to_string())
                    .unwrap_or(make_key),
            };
            set_once(&mut p.inferred.make, chosen);
        }

        info!("Make inference: {} posts flagged as make/model swapped", swapped);
        self.done.make = true;
        self
    }

    // ── Model ─────────────────────────────────────────────────────────────────

    fn model_text(p: &InferredPost) -> &str {
        if p.inferred.swapped_make_model {
            &p.post.make
        } else {
            &p.post.model
        }
    }

    fn composite_key(normalizer: &Normalizer<'_>, p: &InferredPost) -> Option<String> {
        let model = Self::model_text(p);
        if model.trim().is_empty() {
            return None;
        }
        let make = match p.inferred.make.as_deref() {
            Some(make) => make,
            None if p.inferred.swapped_make_model => &p.post.model,
            None => &p.post.make,
        };
        Some(normalizer.composite_key(make, model, false))
    }

    /// Canonical model per post. Near-identical "make - model" keys collapse to
    /// the most frequent spelling, but only when their model numbers agree.
    pub fn infer_model(&mut self) -> &mut Self {
        if self.done.model {
            warn!("Model inference already ran, skipping");
            return self;
        }
        if !self.done.make {
            warn!("Model inference before make inference; swapped make/model fields will not be corrected");
        }
        let _t = Timer::start("Model inference");
        let normalizer = self.normalizer();

        let keys: Vec<Option<String>> = self
            .posts
            .iter()
            .map(|p| Self::composite_key(&normalizer, p))
            .collect();

        let mut models = FrequencyIndex::new(
            FuzzyIndex::new(MODEL_THRESHOLD).with_min_query_len(MODEL_MIN_QUERY),
        );
        for key in keys.iter().flatten() {
            models.register(key.clone());
        }
        debug!("{} distinct make/model keys", models.distinct());

        let mut consolidated = 0usize;
        for (p, key) in self.posts.iter_mut().zip(keys) {
            let Some(key) = key else {
                continue;
            };
            let chosen = if finalize_model(&key).len() > 3 {
                models
                    .best_match(&key, |candidate| model_numbers_match(candidate, &key))
                    .map(|(item, _)| item.to_string())
                    .unwrap_or_else(|| key.clone())
            } else {
                key.clone()
            };
            if chosen != key {
                consolidated += 1;
            }

            let model = finalize_model(&chosen);
            if !model.is_empty() {
                set_once(&mut p.inferred.model, model);
            }
        }

        info!("Model inference: {} posts consolidated to a more common spelling", consolidated);
        self.done.model = true;
        self
    }

    // ── Color ─────────────────────────────────────────────────────────────────

    fn color_of(colors: &ColorTable, p: &InferredPost) -> Color {
        let model = Self::model_text(p);

        let color = colors.resolve(&normalize(model), MatchMode::EndsWith, None);
        if color != Color::Other {
            return color;
        }

        // whatever the model name doesn't account for
        let mut residue = model.replace('-', "");
        if let Some(inferred) = p.inferred.model.as_deref().filter(|m| !m.is_empty()) {
            if let Ok(re) = RegexBuilder::new(&regex::escape(inferred))
                .case_insensitive(true)
                .build()
            {
                residue = re.replace_all(&residue, " ").into_owned();
            }
        }

        let color = colors.resolve(&residue, MatchMode::Contains, Some(3));
        if color != Color::Other {
            return color;
        }

        NON_WORD
            .split(&residue)
            .filter(|w| !w.is_empty())
            .map(|w| colors.resolve(w, MatchMode::Exact, None))
            .filter(|c| *c != Color::Other)
            .last()
            .unwrap_or(Color::Other)
    }

    pub fn infer_color(&mut self) -> &mut Self {
        if self.done.color {
            warn!("Color inference already ran, skipping");
            return self;
        }
        let _t = Timer::start("Color inference");
        let colors = &self.tables.colors;

        let mut known = 0usize;
        for p in &mut self.posts {
            let color = Self::color_of(colors, p);
            if color != Color::Other {
                known += 1;
            }
            set_once(&mut p.inferred.color, color.name().to_string());
        }

        info!("Color inference: {}/{} posts with a known color", known, self.posts.len());
        self.done.color = true;
        self
    }

    // ── Condition ─────────────────────────────────────────────────────────────

    pub fn infer_condition(&mut self) -> &mut Self {
        if self.done.condition {
            warn!("Condition inference already ran, skipping");
            return self;
        }
        let _t = Timer::start("Condition inference");
        let conditions = &self.tables.conditions;

        for p in &mut self.posts {
            let condition = conditions.resolve(&p.post.condition);
            set_once(&mut p.inferred.condition, condition.name().to_string());
        }

        self.done.condition = true;
        self
    }

    // ── Purchase country ──────────────────────────────────────────────────────

    pub fn infer_purchase_country(&mut self) -> &mut Self {
        if self.done.country {
            warn!("Purchase country inference already ran, skipping");
            return self;
        }
        let _t = Timer::start("Purchase country inference");
        let resolver = LocationResolver::new(&self.tables.geo);

        let mut resolved = 0usize;
        for p in &mut self.posts {
            match resolver.purchase_country(&p.post.vendor_location, &p.post.user_location) {
                Some(country) => {
                    resolved += 1;
                    set_once(&mut p.inferred.purchase_country, country.clone());
                }
                None => debug!(
                    "Post {}: no country for vendor {:?} / user {:?}",
                    p.post.post_num, p.post.vendor_location, p.post.user_location
                ),
            }
        }

        info!(
            "Purchase country inference: {}/{} posts resolved",
            resolved,
            self.posts.len()
        );
        self.done.country = true;
        self
    }
}
