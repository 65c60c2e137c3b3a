//! Reference-table loader for the location resolver.
//!
//! The bundled tables are compiled into the binary; any path set in
//! `[geo]` replaces the matching table with a file of the same layout.

use crate::config::GeoConfig;
use crate::inference::location::{GeoData, GeoIndex};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info, warn};

const BUNDLED_COUNTRIES: &str = include_str!("../../data/countries.csv");
const BUNDLED_CURRENCIES: &str = include_str!("../../data/currencies.csv");
const BUNDLED_PROVINCES: &str = include_str!("../../data/provinces.csv");
const BUNDLED_CITIES: &str = include_str!("../../data/cities.csv");

/// Parse a headered CSV table, skipping rows that don't fit `T`.
pub fn parse_table<T: DeserializeOwned>(label: &str, data: &[u8]) -> Vec<T> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warn!("{} row {}: {}", label, i + 1, e),
        }
    }
    debug!("{}: {} rows", label, rows.len());
    rows
}

fn load_table<T: DeserializeOwned>(
    label: &str,
    path: Option<&Path>,
    bundled: &'static str,
) -> Result<Vec<T>> {
    match path {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Reading {} table from {:?}", label, path))?;
            Ok(parse_table(label, &bytes))
        }
        None => Ok(parse_table(label, bundled.as_bytes())),
    }
}

pub fn load_geo_data(cfg: &GeoConfig) -> Result<GeoData> {
    Ok(GeoData {
        countries: load_table("countries", cfg.countries_path.as_deref(), BUNDLED_COUNTRIES)?,
        currencies: load_table("currencies", cfg.currencies_path.as_deref(), BUNDLED_CURRENCIES)?,
        provinces: load_table("provinces", cfg.provinces_path.as_deref(), BUNDLED_PROVINCES)?,
        cities: load_table("cities", cfg.cities_path.as_deref(), BUNDLED_CITIES)?,
    })
}

pub fn load_geo_index(cfg: &GeoConfig) -> Result<GeoIndex> {
    let data = load_geo_data(cfg)?;
    let index = GeoIndex::build(data, &cfg.province_countries, cfg.min_city_population);
    info!("Geo index ready: {} countries", index.country_count());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_min_city_population, default_province_countries};
    use crate::inference::location::{LocationResolver, SearchOptions, SearchStrategy};
    use crate::models::RawCityRow;
    use std::io::Write;

    fn bundled_config() -> GeoConfig {
        GeoConfig {
            province_countries: default_province_countries(),
            min_city_population: default_min_city_population(),
            ..GeoConfig::default()
        }
    }

    #[test]
    fn test_bundled_tables_parse() {
        let data = load_geo_data(&bundled_config()).unwrap();
        assert!(data.countries.len() > 240);
        assert!(data.currencies.iter().any(|c| c.code == "USD"));
        assert!(data.provinces.iter().any(|p| p.short.as_deref() == Some("ON")));
        assert!(data.cities.iter().any(|c| c.name == "Chicago"));
    }

    #[test]
    fn test_bundled_index_resolves_common_locations() {
        let geo = load_geo_index(&bundled_config()).unwrap();
        let resolver = LocationResolver::new(&geo);

        let us = resolver.purchase_country("Chicago, IL", "").unwrap();
        assert_eq!(us.country_code, "US");
        assert!(us.currency_names.contains("US DOLLAR"));

        let ca = resolver.purchase_country("", "Ottawa, Ontario").unwrap();
        assert_eq!(ca.country_code, "CA");

        let gb = resolver.purchase_country("London", "").unwrap();
        assert_eq!(gb.country_code, "GB");

        let de = geo
            .country_from("Germany", &SearchOptions::new(&[SearchStrategy::Country]))
            .unwrap();
        assert!(de.currency_codes.contains("EUR"));

        assert!(resolver.purchase_country("n/a", "same").is_none());
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let csv = "name,country,population\nChicago,US,2693976\nBroken,US,lots\n";
        let rows: Vec<RawCityRow> = parse_table("cities", csv.as_bytes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].population, 2_693_976);
    }

    #[test]
    fn test_path_override_replaces_bundled_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,country,population").unwrap();
        writeln!(file, "Springfield,US,169176").unwrap();

        let cfg = GeoConfig {
            cities_path: Some(file.path().to_path_buf()),
            ..bundled_config()
        };
        let geo = load_geo_index(&cfg).unwrap();
        assert!(geo.has_city("Springfield"));
        assert!(!geo.has_city("Chicago"));
    }

    #[test]
    fn test_missing_override_is_an_error() {
        let cfg = GeoConfig {
            countries_path: Some("does/not/exist.csv".into()),
            ..bundled_config()
        };
        assert!(load_geo_data(&cfg).is_err());
    }
}
