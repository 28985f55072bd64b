use std::fmt::Write;

use anyhow::Result;
use fulfillment_sync_engine::sync_types::{OrderSnapshot, ProviderAmounts};
use infortisa_tools::ProviderResponse;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};

use crate::command_handler::StatusView;

const PREVIEW_CHARS: usize = 500;

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

pub fn format_status_view(view: &StatusView) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "===============================================================================")?;
    writeln!(f, "Order {} at Infortisa", view.customer_reference)?;
    writeln!(f, "===============================================================================")?;
    if view.report.operation.is_none() {
        writeln!(f, "Status: {} (no operation details in the response)", view.report.status)?;
    } else {
        writeln!(f, "{}", format_snapshot(&view.snapshot, &view.lifecycle))?;
        writeln!(f, "{}", format_amounts(&view.snapshot.amounts))?;
        if !view.snapshot.products_summary.is_empty() {
            writeln!(f, "Products\n{}", view.snapshot.products_summary)?;
        }
    }
    if !view.changes.is_empty() {
        writeln!(f, "Changes against an empty snapshot:")?;
        for change in &view.changes {
            writeln!(f, "  * {change}")?;
        }
    }
    if let Some(raw) = &view.raw {
        writeln!(f, "-------------------------------- Raw response --------------------------------")?;
        writeln!(f, "{raw}")?;
    }
    Ok(f)
}

pub fn format_snapshot(snapshot: &OrderSnapshot, lifecycle: &str) -> String {
    let tracking = &snapshot.tracking;
    let mut table = Table::new();
    table.set_titles(row!["Field", "Value"]);
    table.add_row(row!["Status", snapshot.status_text]);
    table.add_row(row!["Code", snapshot.op_code]);
    table.add_row(row!["Lifecycle", lifecycle]);
    table.add_row(row!["Internal reference", snapshot.internal_reference]);
    table.add_row(row!["Transfer reference", snapshot.transfer_ref]);
    table.add_row(row!["Carrier", tracking.agent]);
    table.add_row(row!["Tracking number", tracking.number]);
    table.add_row(row!["Tracking status", tracking.status]);
    table.add_row(row!["Tracking URL", tracking.url]);
    table.set_format(markdown_format());
    table.to_string()
}

pub fn format_amounts(amounts: &ProviderAmounts) -> String {
    let mut table = Table::new();
    table.set_titles(row!["Base", "Canon", "Other", "Shipping", "Tax", "Total"]);
    table.add_row(row![
        r->amounts.base.to_string(),
        r->amounts.canon_op.to_string(),
        r->amounts.other_op.to_string(),
        r->amounts.shipping.to_string(),
        r->amounts.tax.to_string(),
        r->amounts.total.to_string()
    ]);
    table.set_format(markdown_format());
    table.to_string()
}

pub fn format_block_response(action: &str, reference: &str, response: &ProviderResponse) -> String {
    format!(
        "{action} request for {reference} accepted (HTTP {}).\nResponse: {}",
        response.status,
        response.body_preview(PREVIEW_CHARS)
    )
}

#[cfg(test)]
mod test {
    use infortisa_tools::parse_status_response;

    use super::*;

    #[test]
    fn unknown_status_has_no_tables() {
        let view = StatusView::new("S00001", parse_status_response("not xml"));
        let text = format_status_view(&view).unwrap();
        assert!(text.contains("Status: Unknown (no operation details in the response)"));
        assert!(!text.contains("| Base"));
    }

    #[test]
    fn amounts_are_right_aligned_in_markdown() {
        let amounts = ProviderAmounts { total: "12.1".parse().unwrap(), ..Default::default() };
        let table = format_amounts(&amounts);
        assert!(table.starts_with("| Base"));
        assert!(table.contains("12.10"));
    }
}
