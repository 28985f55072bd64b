use std::io::Write;

use quick_xml::{
    escape::unescape,
    events::{BytesDecl, BytesStart, BytesText, Event},
    Writer,
};
use regex::{Captures, Regex};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::InfortisaApiError;

pub const DEFAULT_COMPANY: &str = "Cliente";
pub const DEFAULT_COMMENT: &str = "Pedido web";
pub const DEFAULT_COUNTRY_CODE: &str = "ES";
pub const DEFAULT_DELIVERY_TYPE: &str = "ENV";
/// Shop number that routes a shipment to the provider's mainland warehouse instead of the customer's address.
pub const SPECIAL_DESTINATION_SHOP: &str = "OL001";
pub const MAX_COMPANY_LEN: usize = 50;
pub const MAX_ADDRESS_LEN: usize = 40;
pub const MAX_COMMENT_LEN: usize = 100;

const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

//--------------------------------------   ShippingAddress   ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub company: String,
    pub contact: String,
    pub phone: String,
    pub address1: String,
    pub address2: String,
    pub zip_code: String,
    pub city: String,
    pub country_code: String,
}

//--------------------------------------     RequestLine     ---------------------------------------------------------
/// An order line as the host system knows it. Only some of these end up in the request; see [`sendable_products`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    pub sku: Option<String>,
    pub quantity: Decimal,
    pub is_section: bool,
    pub is_delivery: bool,
}

impl RequestLine {
    pub fn product(sku: &str, quantity: Decimal) -> Self {
        Self { sku: Some(sku.to_string()), quantity, is_section: false, is_delivery: false }
    }

    pub fn section() -> Self {
        Self { sku: None, quantity: Decimal::ZERO, is_section: true, is_delivery: false }
    }

    pub fn delivery(sku: &str) -> Self {
        Self { sku: Some(sku.to_string()), quantity: Decimal::ONE, is_section: false, is_delivery: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRequest {
    pub sku: String,
    pub quantity: u64,
}

/// Returns the lines that can be sent to Infortisa, in their original order.
///
/// Sections and notes, delivery lines, lines without a SKU and lines whose quantity rounds (half to even) to zero or
/// less are dropped.
pub fn sendable_products<'a, I>(lines: I) -> Vec<ProductRequest>
where I: IntoIterator<Item = &'a RequestLine> {
    lines
        .into_iter()
        .filter(|l| !l.is_section && !l.is_delivery)
        .filter_map(|l| {
            let sku = l.sku.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
            let quantity = l.quantity.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven).to_i64()?;
            (quantity > 0).then(|| ProductRequest { sku: sku.to_string(), quantity: quantity.unsigned_abs() })
        })
        .collect()
}

//--------------------------------------    OrderRequest     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub test: bool,
    pub customer_reference: String,
    pub shop_number: String,
    pub delivery_type: String,
    pub block: bool,
    pub delivery_comment: String,
    pub shipping: ShippingAddress,
    pub products: Vec<ProductRequest>,
}

impl OrderRequest {
    pub fn new(customer_reference: &str, shipping: ShippingAddress) -> Self {
        Self {
            test: false,
            customer_reference: customer_reference.trim().to_string(),
            shop_number: String::new(),
            delivery_type: DEFAULT_DELIVERY_TYPE.to_string(),
            block: false,
            delivery_comment: DEFAULT_COMMENT.to_string(),
            shipping,
            products: Vec::new(),
        }
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn with_block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    /// Sets the delivery comment from a free-text (possibly HTML) order note.
    pub fn with_comment(mut self, note: &str) -> Self {
        let comment = clean_comment(note, MAX_COMMENT_LEN);
        self.delivery_comment = if comment.is_empty() { DEFAULT_COMMENT.to_string() } else { comment };
        self
    }

    pub fn with_special_destination(mut self, special: bool) -> Self {
        self.shop_number = if special { SPECIAL_DESTINATION_SHOP.to_string() } else { String::new() };
        self
    }

    /// Fails with a validation error if none of the lines can be sent.
    pub fn with_lines<'a, I>(mut self, lines: I) -> Result<Self, InfortisaApiError>
    where I: IntoIterator<Item = &'a RequestLine> {
        let products = sendable_products(lines);
        if products.is_empty() {
            return Err(InfortisaApiError::Validation(
                "No valid lines to send to Infortisa (every line needs a SKU and a positive quantity)".to_string(),
            ));
        }
        self.products = products;
        Ok(self)
    }

    pub fn to_xml(&self) -> Result<String, InfortisaApiError> {
        if self.customer_reference.is_empty() {
            return Err(InfortisaApiError::Validation("The order has no CustomerReference".to_string()));
        }
        if self.products.is_empty() {
            return Err(InfortisaApiError::Validation("The order has no products".to_string()));
        }
        let ship = &self.shipping;
        let company = non_empty_or(ship.company.trim(), DEFAULT_COMPANY);
        let country = non_empty_or(ship.country_code.trim(), DEFAULT_COUNTRY_CODE);
        let mut wr = Writer::new_with_indent(Vec::new(), b' ', 2);
        wr.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-16"), None)))?;
        let root =
            BytesStart::new("Order").with_attributes([("xmlns:xsd", XSD_NAMESPACE), ("xmlns:xsi", XSI_NAMESPACE)]);
        wr.write_event(Event::Start(root))?;
        write_element(&mut wr, "Test", bool_text(self.test))?;
        write_element(&mut wr, "CustomerReference", &self.customer_reference)?;
        write_element(&mut wr, "ShopNumber", &self.shop_number)?;
        write_element(&mut wr, "DeliveryType", &self.delivery_type)?;
        write_element(&mut wr, "BlockOrder", bool_text(self.block))?;
        write_element(&mut wr, "DeliveryComment", &self.delivery_comment)?;

        wr.write_event(Event::Start(BytesStart::new("ShippingAddress")))?;
        write_element(&mut wr, "Company", &truncate_chars(company, MAX_COMPANY_LEN))?;
        write_element(&mut wr, "Contact", ship.contact.trim())?;
        write_element(&mut wr, "PhoneNumber", ship.phone.trim())?;
        write_element(&mut wr, "Address1", &truncate_chars(ship.address1.trim(), MAX_ADDRESS_LEN))?;
        write_element(&mut wr, "Address2", &truncate_chars(ship.address2.trim(), MAX_ADDRESS_LEN))?;
        write_element(&mut wr, "ZipCode", ship.zip_code.trim())?;
        write_element(&mut wr, "City", ship.city.trim())?;
        write_element(&mut wr, "CountryTwoLetterCode", country)?;
        wr.write_event(Event::End(BytesStart::new("ShippingAddress").to_end()))?;

        wr.write_event(Event::Start(BytesStart::new("Products")))?;
        for product in &self.products {
            wr.write_event(Event::Start(BytesStart::new("Product")))?;
            write_element(&mut wr, "SKU", &product.sku)?;
            write_element(&mut wr, "Partnumber", "")?;
            write_element(&mut wr, "Quantity", &product.quantity.to_string())?;
            wr.write_event(Event::End(BytesStart::new("Product").to_end()))?;
        }
        wr.write_event(Event::End(BytesStart::new("Products").to_end()))?;
        wr.write_event(Event::End(BytesStart::new("Order").to_end()))?;
        String::from_utf8(wr.into_inner()).map_err(|e| InfortisaApiError::XmlError(e.to_string()))
    }
}

//--------------------------------------    BlockRequest     ---------------------------------------------------------
/// Block, unblock or cancel an order that was already submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    pub customer_reference: String,
    pub block: bool,
    pub cancel: bool,
}

impl BlockRequest {
    pub fn block(customer_reference: &str) -> Self {
        Self { customer_reference: customer_reference.to_string(), block: true, cancel: false }
    }

    pub fn unblock(customer_reference: &str) -> Self {
        Self { customer_reference: customer_reference.to_string(), block: false, cancel: false }
    }

    pub fn cancel(customer_reference: &str) -> Self {
        Self { customer_reference: customer_reference.to_string(), block: false, cancel: true }
    }

    pub fn to_xml(&self) -> Result<String, InfortisaApiError> {
        if self.customer_reference.trim().is_empty() {
            return Err(InfortisaApiError::Validation("The order has no CustomerReference".to_string()));
        }
        let mut wr = Writer::new_with_indent(Vec::new(), b' ', 2);
        wr.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-16"), None)))?;
        let root =
            BytesStart::new("BlockOrder").with_attributes([("xmlns:xsd", XSD_NAMESPACE), ("xmlns:xsi", XSI_NAMESPACE)]);
        wr.write_event(Event::Start(root))?;
        write_element(&mut wr, "CustomerReference", self.customer_reference.trim())?;
        write_element(&mut wr, "BlockOrder", bool_text(self.block))?;
        write_element(&mut wr, "CancelOrder", bool_text(self.cancel))?;
        wr.write_event(Event::End(BytesStart::new("BlockOrder").to_end()))?;
        String::from_utf8(wr.into_inner()).map_err(|e| InfortisaApiError::XmlError(e.to_string()))
    }
}

//--------------------------------------       Helpers       ---------------------------------------------------------

/// Encodes a document as UTF-16LE with a byte order mark, matching the `encoding="utf-16"` declaration.
pub fn encode_utf16(xml: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + xml.len() * 2);
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    xml.encode_utf16().for_each(|unit| bytes.extend_from_slice(&unit.to_le_bytes()));
    bytes
}

/// Turns an HTML order note into a short plain-text comment.
///
/// Tags are stripped and entities decoded before whitespace is collapsed and the text truncated, so `max_len` counts
/// visible characters. XML escaping is left to the writer.
pub fn clean_comment(text: &str, max_len: usize) -> String {
    let stripped = match Regex::new(r"(?s)<[^>]*>") {
        Ok(re) => re.replace_all(text, " ").into_owned(),
        Err(_) => text.to_string(),
    };
    let unescaped = decode_entities(&stripped);
    let collapsed = unescaped.split_whitespace().collect::<Vec<&str>>().join(" ");
    truncate_chars(&collapsed, max_len)
}

/// Decodes each HTML entity on its own. Unknown entities and stray ampersands are kept as written.
fn decode_entities(text: &str) -> String {
    let Ok(re) = Regex::new(r"&(#[0-9]+|#x[0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);") else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures<'_>| {
        let entity = &caps[0];
        unescape(entity).map(|s| s.into_owned()).unwrap_or_else(|_| entity.to_string())
    })
    .into_owned()
}

pub fn truncate_chars(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

fn non_empty_or<'a>(s: &'a str, default: &'a str) -> &'a str {
    if s.is_empty() {
        default
    } else {
        s
    }
}

fn bool_text(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn write_element<W: Write>(wr: &mut Writer<W>, name: &str, text: &str) -> Result<(), quick_xml::Error> {
    if text.is_empty() {
        wr.write_event(Event::Empty(BytesStart::new(name)))?;
    } else {
        wr.write_event(Event::Start(BytesStart::new(name)))?;
        wr.write_event(Event::Text(BytesText::new(text)))?;
        wr.write_event(Event::End(BytesStart::new(name).to_end()))?;
    }
    Ok(())
}
