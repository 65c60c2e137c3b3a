//! Flat CSV output of the price sheet.

use crate::models::InferredPost;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

// ── Layout ────────────────────────────────────────────────────────────────────

pub const HEADER: [&str; 15] = [
    "PAGE",
    "MAKE",
    "MODEL",
    "CONDITION",
    "PRICE_PAID",
    "DELIVERY_CHARGE",
    "USER_LOCATION",
    "VENDOR_LOCATION",
    "VENDOR_NAME",
    "PURCHASE_DATE",
    "INFERRED_MAKE",
    "INFERRED_MODEL",
    "INFERRED_COLOR",
    "INFERRED_CONDITION",
    "INFERRED_PURCHASE_COUNTRY",
];

const UNKNOWN: &str = "UNKNOWN";

/// Missing values become `UNKNOWN`; double quotes become single quotes.
fn cell(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.replace('"', "'"),
        None => UNKNOWN.to_string(),
    }
}

/// Only posts that name a make, a model and a price make it into the sheet.
pub fn is_complete(p: &InferredPost) -> bool {
    [&p.post.make, &p.post.model, &p.post.price_paid]
        .iter()
        .all(|f| !f.trim().is_empty())
}

fn row(p: &InferredPost) -> [String; 15] {
    let post = &p.post;
    let inferred = &p.inferred;
    [
        post.page_num.to_string(),
        cell(Some(&post.make)),
        cell(Some(&post.model)),
        cell(Some(&post.condition)),
        cell(Some(&post.price_paid)),
        cell(Some(&post.delivery_charge)),
        cell(Some(&post.user_location)),
        cell(Some(&post.vendor_location)),
        cell(Some(&post.vendor_name)),
        cell(Some(&post.purchase_date)),
        cell(inferred.make.as_deref()),
        cell(inferred.model.as_deref()),
        cell(inferred.color.as_deref()),
        cell(inferred.condition.as_deref()),
        cell(inferred.purchase_country.as_ref().map(|c| c.name.as_str())),
    ]
}

// ── Writer ────────────────────────────────────────────────────────────────────

pub struct PriceSheet {
    writer: csv::Writer<File>,
    rows: usize,
}

impl PriceSheet {
    /// Creates (or truncates) the file and writes the header.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Creating output directory {:?}", dir))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_path(path)
            .with_context(|| format!("Opening {:?}", path))?;
        writer.write_record(HEADER)?;

        info!("Writing price sheet to {:?}", path);
        Ok(Self { writer, rows: 0 })
    }

    /// Returns the number of rows written; incomplete posts are skipped.
    pub fn write_posts(&mut self, posts: &[InferredPost]) -> Result<usize> {
        let mut written = 0;
        for p in posts {
            if !is_complete(p) {
                debug!("Post {} skipped: missing make, model or price", p.post.post_num);
                continue;
            }
            self.writer.write_record(row(p))?;
            written += 1;
        }
        self.rows += written;
        Ok(written)
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        info!("{} rows written", self.rows);
        Ok(self.rows)
    }
}

pub fn write_csv(path: &Path, posts: &[InferredPost]) -> Result<usize> {
    let mut sheet = PriceSheet::create(path)?;
    sheet.write_posts(posts)?;
    sheet.finish()
}

// ── Summary ───────────────────────────────────────────────────────────────────

/// Row counts of an existing price sheet, grouped by inferred make and country.
#[derive(Debug, Default)]
pub struct SheetSummary {
    pub rows: usize,
    pub by_make: BTreeMap<String, usize>,
    pub by_country: BTreeMap<String, usize>,
}

pub fn summarize(path: &Path) -> Result<SheetSummary> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("Opening {:?}", path))?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("{:?} has no {} column", path, name))
    };
    let make_col = column("INFERRED_MAKE")?;
    let country_col = column("INFERRED_PURCHASE_COUNTRY")?;

    let mut summary = SheetSummary::default();
    for record in reader.records() {
        let record = record?;
        summary.rows += 1;
        let make = record.get(make_col).unwrap_or(UNKNOWN).to_string();
        *summary.by_make.entry(make).or_default() += 1;
        let country = record.get(country_col).unwrap_or(UNKNOWN).to_string();
        *summary.by_country.entry(country).or_default() += 1;
    }
    Ok(summary)
}
