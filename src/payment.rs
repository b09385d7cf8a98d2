//! Payment intents, their `upi://pay` URI form and the rendered payment QR.
use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use tracing::debug;

use crate::config::PaymentConfig;
use crate::encoder::{QrSymbol, encode_text};
use crate::error::{GateError, GateResult};

const URI_BASE: &str = "upi://pay";

/// Money amount in minor units (paise for INR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    pub fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Whole units, or `None` when the minor amount would overflow.
    pub fn from_major(major: u64) -> Option<Self> {
        major.checked_mul(100).map(Self)
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// `500` for whole amounts, `500.50` otherwise.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = (self.0 / 100, self.0 % 100);
        if minor == 0 {
            write!(f, "{}", major)
        } else {
            write!(f, "{}.{:02}", major, minor)
        }
    }
}

impl FromStr for Amount {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GateError::Input(format!("Invalid amount: {}", s));
        let s = s.trim();
        let (major, minor) = s.split_once('.').unwrap_or((s, ""));
        if major.is_empty() || minor.len() > 2 || !major.bytes().all(|b| b.is_ascii_digit())
            || !minor.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let major: u64 = major.parse().map_err(|_| invalid())?;
        let minor: u64 = match minor.len() {
            0 => 0,
            1 => minor.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => minor.parse().map_err(|_| invalid())?,
        };
        major
            .checked_mul(100)
            .and_then(|m| m.checked_add(minor))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

/// Fields of a `pay` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// `pa`
    pub payee_address: String,
    /// `pn`
    pub payee_name: String,
    /// `am`
    pub amount: Amount,
    /// `cu`
    pub currency: String,
    /// `tn`
    pub note: String,
}

impl PaymentIntent {
    /// Monthly rent intent with the note `Rent payment for MM-YYYY`.
    pub fn monthly(config: &PaymentConfig, amount: Amount, month: u8, year: u16) -> GateResult<Self> {
        Ok(Self {
            payee_address: config.payee_address.clone(),
            payee_name: config.payee_name.clone(),
            amount,
            currency: config.currency.clone(),
            note: rent_note(month, year)?,
        })
    }

    /// Amount followed by its currency code, e.g. `500.50 INR`.
    pub fn amount_label(&self) -> String {
        format!("{} {}", self.amount, self.currency)
    }

    /// Parameters in the order `pa`, `pn`, `am`, `cu`, `tn`; values percent-encoded
    /// with spaces as `%20`.
    pub fn to_uri(&self) -> String {
        let amount = self.amount.to_string();
        let params = [
            ("pa", self.payee_address.as_str()),
            ("pn", self.payee_name.as_str()),
            ("am", amount.as_str()),
            ("cu", self.currency.as_str()),
            ("tn", self.note.as_str()),
        ];
        match Url::parse_with_params(URI_BASE, &params) {
            Ok(mut url) => {
                // Form encoding writes spaces as `+` and a literal `+` as `%2B`
                let query = url.query().map(|q| q.replace('+', "%20"));
                url.set_query(query.as_deref());
                url.to_string()
            }
            // Unreachable for a constant base; keep a usable URI anyway.
            Err(_) => format!(
                "{}?{}",
                URI_BASE,
                params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("&")
            ),
        }
    }

    pub fn from_uri(uri: &str) -> GateResult<Self> {
        let invalid = |why: &str| GateError::Input(format!("Invalid payment URI: {}", why));
        let url = Url::parse(uri.trim()).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "upi" || url.host_str() != Some("pay") {
            return Err(invalid("expected upi://pay"));
        }

        let mut fields: [Option<String>; 5] = Default::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "pa" => 0,
                "pn" => 1,
                "am" => 2,
                "cu" => 3,
                "tn" => 4,
                _ => continue,
            };
            fields[slot] = Some(value.into_owned());
        }
        let [pa, pn, am, cu, tn] = fields;
        let payee_address = pa.filter(|v| !v.is_empty()).ok_or_else(|| invalid("missing pa"))?;
        let amount = am.ok_or_else(|| invalid("missing am"))?.parse()?;

        Ok(Self {
            payee_address,
            payee_name: pn.unwrap_or_default(),
            amount,
            currency: cu.unwrap_or_default(),
            note: tn.unwrap_or_default(),
        })
    }
}

fn rent_note(month: u8, year: u16) -> GateResult<String> {
    if !(1..=12).contains(&month) {
        return Err(GateError::Input(format!("Invalid month: {}", month)));
    }
    Ok(format!("Rent payment for {:02}-{}", month, year))
}

/// A payment URI and its rendered symbol.
#[derive(Debug, Clone)]
pub struct PaymentQr {
    pub intent: PaymentIntent,
    pub uri: String,
    pub symbol: QrSymbol,
}

impl PaymentQr {
    /// PNG using the configured scale and quiet zone.
    pub fn to_png(&self, config: &PaymentConfig) -> GateResult<Vec<u8>> {
        self.symbol.to_png(config.scale, config.quiet_zone)
    }
}

/// Build the monthly payment QR. `None` while the payable amount is unknown or zero.
pub fn payment_qr(
    config: &PaymentConfig,
    payable: Option<Amount>,
    month: u8,
    year: u16,
) -> GateResult<Option<PaymentQr>> {
    let Some(amount) = payable.filter(|a| !a.is_zero()) else {
        debug!("payment QR disabled: no payable amount");
        return Ok(None);
    };
    let intent = PaymentIntent::monthly(config, amount, month, year)?;
    let uri = intent.to_uri();
    let symbol = encode_text(&uri, config.ec_level)?;
    debug!(version = symbol.version().number(), len = uri.len(), "payment QR built");
    Ok(Some(PaymentQr { intent, uri, symbol }))
}
