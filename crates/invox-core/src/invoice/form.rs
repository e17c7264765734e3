//! Explicit field values submitted alongside an upload.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{CandidateFields, FieldExtractor};

/// Form values as parsed from `key=value` pairs.
///
/// Unparsable values are treated as not submitted. The flags default to
/// `false`, so a submitted form always decides them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub external_id: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub is_paid: bool,
    pub is_reviewed: bool,
}

impl FormFields {
    /// Parse form pairs. Recognized keys are `id`, `date`, `amount`, `isPaid`
    /// and `isReviewed`; others are ignored. The first occurrence of a key wins.
    pub fn parse<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut id = None;
        let mut date = None;
        let mut amount = None;
        let mut paid = None;
        let mut reviewed = None;

        for (key, value) in pairs {
            let value = value.as_ref().to_string();
            let slot = match key.as_ref() {
                "id" => &mut id,
                "date" => &mut date,
                "amount" => &mut amount,
                "isPaid" => &mut paid,
                "isReviewed" => &mut reviewed,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        Self {
            external_id: id.and_then(|v| non_blank(&v)),
            invoice_date: date.and_then(|v| parse_date(&v)),
            amount: amount.and_then(|v| parse_amount(&v)),
            is_paid: paid.is_some_and(|v| parse_flag(&v)),
            is_reviewed: reviewed.is_some_and(|v| parse_flag(&v)),
        }
    }

    /// The form as an extraction layer.
    pub fn candidates(&self) -> CandidateFields {
        CandidateFields {
            external_id: self.external_id.clone(),
            invoice_date: self.invoice_date,
            amount: self.amount,
            is_paid: Some(self.is_paid),
            is_reviewed: Some(self.is_reviewed),
        }
    }
}

#[async_trait]
impl FieldExtractor for FormFields {
    fn name(&self) -> &'static str {
        "form"
    }

    async fn extract(&self, _text: &str) -> CandidateFields {
        self.candidates()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn parse_amount(value: &str) -> Option<Decimal> {
    Decimal::from_str(value.trim()).ok()
}

/// Boolean-like form value. Anything unrecognized is `false`.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "t" | "yes" | "on"
    )
}
