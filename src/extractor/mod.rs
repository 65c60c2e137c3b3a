//! Labeled field extraction.
//!
//! Posts in a price thread follow a loose template:
//!
//! ```text
//! MAKE: Yamaha
//! MODEL: P155B
//! PRICE PAID: $1000
//! ```
//!
//! Each [`Field`] owns the label that introduces it; the value is whatever
//! follows the label on the same line, up to the next colon.

use crate::error::Result;
use crate::models::{ExtractedPost, RawPost};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Make,
    Model,
    Condition,
    PricePaid,
    DeliveryCharge,
    UserLocation,
    VendorLocation,
    VendorName,
    PurchaseDate,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::UserLocation,
        Field::Make,
        Field::Model,
        Field::Condition,
        Field::PricePaid,
        Field::DeliveryCharge,
        Field::VendorLocation,
        Field::VendorName,
        Field::PurchaseDate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Make => "MAKE",
            Field::Model => "MODEL",
            Field::Condition => "CONDITION",
            Field::PricePaid => "PRICE PAID",
            Field::DeliveryCharge => "DELIVERY CHARGE",
            Field::UserLocation => "USER LOCATION",
            Field::VendorLocation => "VENDOR LOCATION",
            Field::VendorName => "VENDOR NAME",
            Field::PurchaseDate => "PURCHASE DATE",
        }
    }

    /// Output slot on [`ExtractedPost`].
    fn slot(self, post: &mut ExtractedPost) -> &mut String {
        match self {
            Field::Make => &mut post.make,
            Field::Model => &mut post.model,
            Field::Condition => &mut post.condition,
            Field::PricePaid => &mut post.price_paid,
            Field::DeliveryCharge => &mut post.delivery_charge,
            Field::UserLocation => &mut post.user_location,
            Field::VendorLocation => &mut post.vendor_location,
            Field::VendorName => &mut post.vendor_name,
            Field::PurchaseDate => &mut post.purchase_date,
        }
    }
}

/// Compiled label patterns for every registered field.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rules: Vec<(Field, Regex)>,
    trailing_label: Regex,
}

impl FieldExtractor {
    pub fn new() -> Result<Self> {
        let mut rules = Vec::with_capacity(Field::ALL.len());
        for field in Field::ALL {
            let pattern = format!(
                r"(?im)^[ \t]*{}[ \t]*[:\-][ \t]*([^:\n]+)",
                regex::escape(field.label())
            );
            rules.push((field, Regex::new(&pattern)?));
        }

        let labels: Vec<String> = Field::ALL.iter().map(|f| regex::escape(f.label())).collect();
        let trailing_label = Regex::new(&format!(r"(?i)\s+(?:{})\s*$", labels.join("|")))?;

        Ok(Self {
            rules,
            trailing_label,
        })
    }

    /// Text after `field`'s label, or an empty string when the label is absent.
    pub fn extract(&self, field: Field, text: &str) -> String {
        let Some((_, re)) = self.rules.iter().find(|(f, _)| *f == field) else {
            return String::new();
        };
        let Some(value) = re.captures(text).and_then(|c| c.get(1)) else {
            return String::new();
        };

        // Stopped on a colon: the tail of the capture is probably the next label.
        let ran_into_label = text[value.end()..].starts_with(':');
        let captured = value.as_str();
        let captured = if ran_into_label {
            self.trailing_label.replace(captured, "")
        } else {
            captured.into()
        };

        captured.trim().to_string()
    }

    pub fn convert(&self, raw: RawPost) -> ExtractedPost {
        // Non-breaking spaces mis-decoded as latin-1 leave a stray 'Â' behind
        let text = raw.text.replace('Â', "");

        let mut post = ExtractedPost {
            page_num: raw.page_num,
            post_num: raw.post_num,
            ..ExtractedPost::default()
        };
        for field in Field::ALL {
            *field.slot(&mut post) = self.extract(field, &text);
        }
        post.text = text;
        post
    }
}
