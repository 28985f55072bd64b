use fsg_common::Money;
use infortisa_tools::ProductLine;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};

use crate::{
    reconcile::{checked_total, line_amount, CanonResolution},
    sync_types::ProviderAmounts,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

/// Renders the products reported by Infortisa, followed by the operation totals.
///
/// The per-line canon is always shown per unit, whichever way the provider reported it.
pub fn render_products_summary(products: &[ProductLine], canon: &CanonResolution, amounts: &ProviderAmounts) -> String {
    let mut table = Table::new();
    table.set_titles(row!["Name", "SKU", "Partnumber", "Qty", "Price", "Canon LPI", "Line total"]);
    let mut canon_lines = Money::zero();
    for line in products {
        let unit_canon = canon.unit_canon(line);
        let unit_price = checked_total("Unit price", [line.price_ex_canon, unit_canon]);
        let line_total = line_amount(line, unit_price, "Line total");
        canon_lines = checked_total("Canon", [canon_lines, line_amount(line, unit_canon, "Canon")]);
        table.add_row(row![
            line.name(),
            line.sku,
            line.part_number,
            line.quantity.normalize().to_string(),
            r->line.price_ex_canon.to_string(),
            r->unit_canon.to_string(),
            r->line_total.to_string()
        ]);
    }
    let canon_total = if amounts.canon_op.is_zero() { canon_lines } else { amounts.canon_op };
    table.add_row(row!["Canon LPI", "", "", "", "", "", r->canon_total.to_string()]);
    table.add_row(row!["Other costs", "", "", "", "", "", r->amounts.other_op.to_string()]);
    table.add_row(row!["Shipping", "", "", "", "", "", r->amounts.shipping.to_string()]);
    table.add_row(row!["Tax", "", "", "", "", "", r->amounts.tax.to_string()]);
    table.add_row(row!["Total", "", "", "", "", "", r->amounts.total.to_string()]);
    table.set_format(markdown_format());
    table.to_string()
}

#[cfg(test)]
mod test {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn summary_lists_lines_and_totals() {
        let products = vec![ProductLine {
            sku: "A1".into(),
            part_number: "PN-1".into(),
            description: "Disk".into(),
            quantity: Decimal::from(2),
            price_ex_canon: "10".parse().unwrap(),
            canon_raw: "6".parse().unwrap(),
        }];
        let canon = CanonResolution::resolve("6".parse().unwrap(), &products);
        let amounts = ProviderAmounts {
            base: "20".parse().unwrap(),
            canon_op: "6".parse().unwrap(),
            shipping: "5".parse().unwrap(),
            total: "31".parse().unwrap(),
            ..Default::default()
        };
        let summary = render_products_summary(&products, &canon, &amounts);
        assert!(summary.contains("Disk"));
        assert!(summary.contains("PN-1"));
        // 6 for two units is 3 per unit, so the line total is (10 + 3) * 2
        assert!(summary.contains("3.00"));
        assert!(summary.contains("26.00"));
        assert!(summary.contains("31.00"));
    }
}
