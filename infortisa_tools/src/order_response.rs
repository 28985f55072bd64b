use fsg_common::Money;
use log::*;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{InfortisaApiError, XmlElement};

pub const OPERATION_NAMESPACE: &str = "http://schemas.datacontract.org/2004/07/BackEnd.Data.Npoco.Models";
pub const UNKNOWN_STATUS: &str = "Unknown";
pub const UNKNOWN_AGENT: &str = "(unknown)";
const LEGACY_STATUS_MARKER: &str = "State of Order:";
/// Largest quantity accepted on a product line.
const MAX_LINE_QUANTITY: i64 = 1_000_000;

type Probe = fn(&XmlElement) -> Option<String>;

/// Candidate sources for the transfer reference, in priority order. The first one that yields a value wins.
static TRANSFER_REFERENCE_PROBES: &[Probe] = &[
    |op| op.child_value("PaymentReference"),
    |op| op.child_value("BankTransferReference"),
    |op| op.child_value("TransferReference"),
    |op| op.child_value("Reference"),
    |op| op.child_value("Code"),
    |op| op.child_value("InternalReference"),
];

//--------------------------------------     ProductLine     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub sku: String,
    pub part_number: String,
    pub description: String,
    pub quantity: Decimal,
    pub price_ex_canon: Money,
    /// Canon figure as reported on the line. Whether it is per unit or already multiplied by the quantity is not
    /// declared by the provider.
    pub canon_raw: Money,
}

impl ProductLine {
    /// Display name: the description if there is one, else the part number, else the SKU.
    pub fn name(&self) -> &str {
        [&self.description, &self.part_number, &self.sku]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(|s| s.as_str())
            .unwrap_or_default()
    }
}

//--------------------------------------    TrackingReport   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingReport {
    pub url: String,
    pub number: String,
    pub status: String,
    pub status_datetime: String,
    pub status_detail: String,
    pub agent: String,
}

impl Default for TrackingReport {
    fn default() -> Self {
        Self {
            url: String::new(),
            number: String::new(),
            status: String::new(),
            status_datetime: String::new(),
            status_detail: String::new(),
            agent: UNKNOWN_AGENT.to_string(),
        }
    }
}

//--------------------------------------   OperationReport   ---------------------------------------------------------
/// Everything of interest in the `Operation` element of a status response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReport {
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub canon: Money,
    pub other_cost: Money,
    pub internal_reference: Option<String>,
    pub transfer_reference: Option<String>,
    pub code: Option<String>,
    pub status: Option<String>,
    pub tracking: TrackingReport,
    pub products: Vec<ProductLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub operation: Option<OperationReport>,
}

impl StatusReport {
    pub fn unknown() -> Self {
        Self { status: UNKNOWN_STATUS.to_string(), operation: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acknowledgment {
    pub internal_reference: Option<String>,
}

//--------------------------------------       Parsers       ---------------------------------------------------------

/// Parses the response to an order submission.
///
/// Fails with [`InfortisaApiError::ProviderError`] if the body carries `HasErrors = true`.
pub fn parse_acknowledgment(body: &str) -> Result<Acknowledgment, InfortisaApiError> {
    match XmlElement::parse(body) {
        Ok(root) => {
            let has_errors = root
                .find("HasErrors")
                .and_then(XmlElement::value)
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            if has_errors {
                return Err(InfortisaApiError::ProviderError(body.to_string()));
            }
            let internal_reference = root
                .find_in_namespace(OPERATION_NAMESPACE, "InternalReference")
                .or_else(|| root.find("InternalReference"))
                .and_then(XmlElement::value)
                .map(str::to_string)
                .or_else(|| root.find("DeliveryComment").and_then(XmlElement::value).and_then(find_ext_token));
            Ok(Acknowledgment { internal_reference })
        },
        Err(e) => {
            warn!("📦️ Could not parse Infortisa acknowledgment as XML. {e}. Falling back to a text scan.");
            if body.contains("<HasErrors>true</HasErrors>") {
                return Err(InfortisaApiError::ProviderError(body.to_string()));
            }
            let internal_reference = body
                .split_once("<InternalReference>")
                .and_then(|(_, rest)| rest.split_once("</InternalReference>"))
                .map(|(value, _)| value.trim().to_string())
                .filter(|s| !s.is_empty());
            Ok(Acknowledgment { internal_reference })
        },
    }
}

/// Parses a status response. This never fails: anything that cannot be understood is reported as
/// [`UNKNOWN_STATUS`].
pub fn parse_status_response(body: &str) -> StatusReport {
    let operation = match XmlElement::parse(body) {
        Ok(root) => root.find_in_namespace(OPERATION_NAMESPACE, "Operation").map(parse_operation),
        Err(e) => {
            debug!("📦️ Status response is not well-formed XML. {e}");
            None
        },
    };
    if let Some(op) = operation {
        let status = op.status.clone().unwrap_or_default();
        return StatusReport { status, operation: Some(op) };
    }
    if let Some(status) = legacy_status(body) {
        return StatusReport { status, operation: None };
    }
    warn!("📦️ Could not find an Operation or a legacy status marker in the Infortisa response");
    StatusReport::unknown()
}

fn parse_operation(op: &XmlElement) -> OperationReport {
    let internal_reference = op
        .child_value("InternalReference")
        .or_else(|| op.child("DeliveryComment").and_then(XmlElement::value).and_then(find_ext_token));
    let transfer_reference = TRANSFER_REFERENCE_PROBES.iter().find_map(|probe| probe(op));
    let tracking = TrackingReport {
        url: op.child_value("TrackingUrl").unwrap_or_default(),
        number: op.child_value("TrackingNumber").unwrap_or_default(),
        status: op.child_value("TrackingStatus").unwrap_or_default(),
        status_datetime: op.child_value("TrackingStatusDateTime").unwrap_or_default(),
        status_detail: op.child_value("TrackingStatusDetail").unwrap_or_default(),
        agent: op.child_value("ShippingAgent").unwrap_or_else(|| UNKNOWN_AGENT.to_string()),
    };
    let products = op
        .child("Products")
        .map(|products| products.children_named("Product").map(parse_product).collect())
        .unwrap_or_default();
    OperationReport {
        shipping: money(op, "Shippingcost"),
        tax: money(op, "Tax"),
        total: money(op, "Total"),
        canon: money(op, "CanonLPI"),
        other_cost: money(op, "OtherCost"),
        internal_reference,
        transfer_reference,
        code: op.child_value("Code"),
        status: op.child("Status").map(|s| s.text.trim().to_string()),
        tracking,
        products,
    }
}

fn parse_product(p: &XmlElement) -> ProductLine {
    ProductLine {
        sku: p.child_value("SKU").unwrap_or_default(),
        part_number: p.child_value("Partnumber").unwrap_or_default(),
        description: p.child_value("ProductDescription").unwrap_or_default(),
        quantity: quantity(p),
        price_ex_canon: money(p, "PriceWithoutCanon"),
        canon_raw: money(p, "CanonLPI"),
    }
}

fn money(e: &XmlElement, name: &str) -> Money {
    match e.child(name).and_then(XmlElement::value) {
        Some(v) => v.parse().unwrap_or_else(|err| {
            debug!("📦️ Ignoring unparseable {name} value. {err}");
            Money::zero()
        }),
        None => Money::zero(),
    }
}

/// Quantities must be whole numbers in `0..=MAX_LINE_QUANTITY`. Anything else counts as zero.
fn quantity(p: &XmlElement) -> Decimal {
    let quantity = money(p, "Quantity").value();
    if quantity.fract().is_zero() && quantity >= Decimal::ZERO && quantity <= Decimal::from(MAX_LINE_QUANTITY) {
        quantity
    } else {
        warn!("📦️ Ignoring out of range quantity {quantity} on product line");
        Decimal::ZERO
    }
}

fn legacy_status(body: &str) -> Option<String> {
    let (_, rest) = body.split_once(LEGACY_STATUS_MARKER)?;
    let status = rest.split('<').next().unwrap_or_default().trim();
    Some(status.to_string())
}

/// Finds the first standalone `EXT<digits>` token, which Infortisa embeds in the delivery comment when it does not
/// fill in the internal reference.
pub fn find_ext_token(text: &str) -> Option<String> {
    let re = Regex::new(r"\bEXT\d+\b").ok()?;
    re.find(text).map(|m| m.as_str().to_string())
}
