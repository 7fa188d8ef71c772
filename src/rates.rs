//! Core fetch-and-aggregate pipeline: fan out one lookup per requested date,
//! then reduce each day's raw records to the selected currencies.

use anyhow::{Result, anyhow};
use chrono::{Days, NaiveDate};
use futures::future::try_join_all;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::rate_provider::{RateProvider, RateRecord};

/// National bank sale/purchase prices for one currency on one day.
/// Both fields stay unset when the upstream response had no matching
/// record, which serializes as an empty object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurrencyQuote {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase: Option<f64>,
}

/// One day's reduced rates, keyed by the request date (`DD.MM.YYYY`).
///
/// Serializes as a single-key object `{date: {currency: {sale, purchase}}}`
/// to match the documented output shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRates {
    pub date: String,
    pub currencies: BTreeMap<String, CurrencyQuote>,
}

impl Serialize for DailyRates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.date, &self.currencies)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for DailyRates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DailyRatesVisitor;

        impl<'de> Visitor<'de> for DailyRatesVisitor {
            type Value = DailyRates;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a single-key map from date to currency quotes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let (date, currencies) = access
                    .next_entry::<String, BTreeMap<String, CurrencyQuote>>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                Ok(DailyRates { date, currencies })
            }
        }

        deserializer.deserialize_map(DailyRatesVisitor)
    }
}

/// Formats `reference_date - offset` days as a `DD.MM.YYYY` request key.
pub fn date_key(reference_date: NaiveDate, offset: u32) -> Result<String> {
    let date = reference_date
        .checked_sub_days(Days::new(u64::from(offset)))
        .ok_or_else(|| anyhow!("Date out of range: {reference_date} minus {offset} days"))?;
    Ok(date.format("%d.%m.%Y").to_string())
}

/// Fetches rates for `days` consecutive dates ending at `reference_date`
/// and reduces each day to the selected currencies.
///
/// All lookups are issued concurrently against one provider. The call is
/// all-or-nothing: the first failed lookup fails the whole call and any
/// sibling results are discarded. Output order is fixed by day offset
/// (most recent first), never by completion order.
pub async fn aggregate(
    provider: &dyn RateProvider,
    reference_date: NaiveDate,
    days: u32,
    currencies: &[String],
) -> Result<Vec<DailyRates>> {
    let mut date_keys = Vec::with_capacity(days as usize);
    for offset in 0..days {
        date_keys.push(date_key(reference_date, offset)?);
    }

    debug!("Fetching rates for {} dates", date_keys.len());
    let fetches = date_keys.iter().map(|date| provider.fetch_rates(date));
    let raw_days = try_join_all(fetches).await?;

    Ok(date_keys
        .into_iter()
        .zip(raw_days)
        .map(|(date, records)| DailyRates {
            date,
            currencies: reduce_records(records, currencies),
        })
        .collect())
}

/// Builds a total map over the full currency selection first, then applies
/// the matching records. Last matching record wins on duplicates.
fn reduce_records(
    records: Vec<RateRecord>,
    currencies: &[String],
) -> BTreeMap<String, CurrencyQuote> {
    let mut quotes: BTreeMap<String, CurrencyQuote> = currencies
        .iter()
        .map(|code| (code.clone(), CurrencyQuote::default()))
        .collect();

    for record in records {
        if let Some(quote) = quotes.get_mut(&record.currency) {
            quote.sale = record.sale_rate_nb;
            quote.purchase = record.purchase_rate_nb;
        }
    }

    quotes
}
