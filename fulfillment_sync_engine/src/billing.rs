use log::*;
use rust_decimal::Decimal;

use crate::{
    config::SyncConfig,
    sync_api::SyncError,
    sync_types::SalesOrder,
    traits::{
        data_objects::{Journal, JournalKind, JournalQuery, NewBillLine, NewVendorBill, VendorBill},
        AccountingBackend,
    },
};

/// One line per positive amount: the goods at their pre-canon price, and shipping.
pub fn bill_lines(order: &SalesOrder, config: &SyncConfig) -> Vec<NewBillLine> {
    let amounts = &order.sync.amounts;
    let mut lines = Vec::with_capacity(2);
    if amounts.base.is_positive() {
        lines.push(NewBillLine {
            name: format!("Infortisa purchase for {}", order.name),
            quantity: Decimal::ONE,
            price_unit: amounts.base,
            product_id: config.purchase_product_id,
        });
    }
    if amounts.shipping.is_positive() {
        lines.push(NewBillLine {
            name: format!("Infortisa shipping for {}", order.name),
            quantity: Decimal::ONE,
            price_unit: amounts.shipping,
            product_id: config.shipping_product_id,
        });
    }
    lines
}

/// The configured purchase journal, else the first purchase journal the backend knows about.
pub async fn resolve_purchase_journal<B: AccountingBackend>(
    backend: &B,
    config: &SyncConfig,
) -> Result<Journal, SyncError> {
    if let Some(id) = config.purchase_journal_id {
        match backend.fetch_journal(id).await? {
            Some(journal) if journal.kind == JournalKind::Purchase => return Ok(journal),
            Some(_) => warn!("🧾️ Configured purchase journal {id} is not a purchase journal. Looking elsewhere."),
            None => warn!("🧾️ Configured purchase journal {id} does not exist. Looking for another."),
        }
    }
    backend
        .search_journal(&JournalQuery::new().with_kind(JournalKind::Purchase))
        .await?
        .ok_or_else(|| SyncError::Configuration("No purchase journal is available for Infortisa bills".to_string()))
}

/// Creates the Infortisa vendor bill for the order. The caller links the returned bill to the order.
pub async fn create_vendor_bill<B: AccountingBackend>(
    backend: &B,
    config: &SyncConfig,
    order: &SalesOrder,
) -> Result<VendorBill, SyncError> {
    if let Some(bill_id) = order.sync.vendor_bill_id {
        return Err(SyncError::BillAlreadyExists(bill_id));
    }
    let partner_id = config
        .vendor_id
        .ok_or_else(|| SyncError::Configuration("The Infortisa vendor is not configured".to_string()))?;
    let journal = resolve_purchase_journal(backend, config).await?;
    let lines = bill_lines(order, config);
    if lines.is_empty() {
        return Err(SyncError::Configuration(format!(
            "Order {} has no positive Infortisa amounts to bill. Refresh its status first.",
            order.name
        )));
    }
    let payment_reference = Some(order.sync.transfer_ref.clone()).filter(|r| !r.is_empty());
    let bill = NewVendorBill {
        partner_id,
        journal_id: journal.id,
        origin: order.name.clone(),
        order_id: order.id,
        currency: order.currency.clone(),
        lines,
        payment_reference,
    };
    debug!("🧾️ Creating Infortisa bill for {} in journal {}. Total {}", order.name, journal.code, bill.total());
    let bill = backend.create_bill(bill).await?;
    info!("🧾️ Vendor bill {} created for order {}", bill.id, order.name);
    Ok(bill)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sync_types::ProductId;

    #[test]
    fn lines_skip_zero_amounts() {
        let config = SyncConfig {
            purchase_product_id: Some(ProductId(10)),
            shipping_product_id: Some(ProductId(11)),
            ..Default::default()
        };
        let mut order = SalesOrder { name: "S001".into(), ..Default::default() };
        assert!(bill_lines(&order, &config).is_empty());
        order.sync.amounts.base = "20".parse().unwrap();
        let lines = bill_lines(&order, &config);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, Some(ProductId(10)));
        order.sync.amounts.shipping = "4.5".parse().unwrap();
        let lines = bill_lines(&order, &config);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].product_id, Some(ProductId(11)));
        assert_eq!(lines[1].price_unit, "4.5".parse().unwrap());
    }
}
