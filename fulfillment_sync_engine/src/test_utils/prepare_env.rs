use log::*;

use crate::sync_types::{CustomerContact, OrderId, OrderLine, PartnerId, SalesOrder};

pub fn prepare_test_env() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

/// An eligible, unsent order with one Infortisa product, one product from someone else, a section and a delivery
/// line.
pub fn sample_order(id: i64, vendor: PartnerId) -> SalesOrder {
    SalesOrder {
        id: OrderId(id),
        name: format!("S{id:05}"),
        note: "<p>Leave at the <b>door</b></p>".to_string(),
        currency: "EUR".to_string(),
        customer: Some(CustomerContact {
            partner_id: PartnerId(1000 + id),
            name: "Ana Customer".to_string(),
            email: Some("ana@example.com".to_string()),
        }),
        lines: vec![
            OrderLine::section(),
            OrderLine::product("INF-001", 2, &[vendor]),
            OrderLine::product("OTHER-9", 1, &[PartnerId(vendor.value() + 1)]),
            OrderLine::delivery("SHIP"),
        ],
        ..Default::default()
    }
}

/// The parts of an Infortisa `Operation` element that tests usually care about.
#[derive(Debug, Clone, Default)]
pub struct OperationXml {
    pub code: &'static str,
    pub status: &'static str,
    pub internal_reference: &'static str,
    pub payment_reference: &'static str,
    pub tracking_url: &'static str,
    pub tracking_number: &'static str,
    pub tracking_status: &'static str,
    pub shipping: &'static str,
    pub total: &'static str,
    pub canon: &'static str,
    /// `(sku, quantity, price without canon, canon)`
    pub products: Vec<(&'static str, &'static str, &'static str, &'static str)>,
}

fn element(name: &str, value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!("<{name}>{value}</{name}>")
    }
}

/// Builds a status response document in the shape Infortisa returns.
pub fn status_xml(op: &OperationXml) -> String {
    let products = op
        .products
        .iter()
        .map(|(sku, qty, price, canon)| {
            format!(
                "<Product><SKU>{sku}</SKU><Quantity>{qty}</Quantity><PriceWithoutCanon>{price}</PriceWithoutCanon>\
                 <CanonLPI>{canon}</CanonLPI></Product>"
            )
        })
        .collect::<String>();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <OrderStatus xmlns:i=\"http://www.w3.org/2001/XMLSchema-instance\">\
         <Operation xmlns=\"http://schemas.datacontract.org/2004/07/BackEnd.Data.Npoco.Models\">\
         {code}{status}{internal}{payment}{url}{number}{tstatus}{shipping}{total}{canon}\
         <Products>{products}</Products></Operation></OrderStatus>",
        code = element("Code", op.code),
        status = element("Status", op.status),
        internal = element("InternalReference", op.internal_reference),
        payment = element("PaymentReference", op.payment_reference),
        url = element("TrackingUrl", op.tracking_url),
        number = element("TrackingNumber", op.tracking_number),
        tstatus = element("TrackingStatus", op.tracking_status),
        shipping = element("Shippingcost", op.shipping),
        total = element("Total", op.total),
        canon = element("CanonLPI", op.canon),
    )
}
