//! Turns a parsed status response into the next [`OrderSnapshot`].
//!
//! Reconciliation is pure: it never talks to the provider or the host. The caller persists the returned snapshot and
//! posts the change notes. Tracking fields are left to [`crate::tracking`], which has side effects of its own.
use fsg_common::Money;
use infortisa_tools::{OperationReport, ProductLine, StatusReport};
use log::*;

use crate::{
    summary::render_products_summary,
    sync_types::{OrderSnapshot, ProviderAmounts},
};

//--------------------------------------   CanonResolution   ---------------------------------------------------------
/// Infortisa reports the canon levy per product line without saying whether the figure is per unit or already
/// multiplied by the quantity. The operation-level aggregate is compared against both interpretations to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonResolution {
    pub canon_is_unit: bool,
    /// `Σ raw × quantity`
    pub sum_units: Money,
    /// `Σ raw`
    pub sum_as_is: Money,
    /// The aggregate as reported. May be zero.
    pub reported: Money,
}

impl Default for CanonResolution {
    fn default() -> Self {
        Self { canon_is_unit: true, sum_units: Money::zero(), sum_as_is: Money::zero(), reported: Money::zero() }
    }
}

impl CanonResolution {
    pub fn resolve(reported: Money, products: &[ProductLine]) -> Self {
        let sum_units = checked_total("Canon", products.iter().map(|p| line_amount(p, p.canon_raw, "Canon")));
        let sum_as_is = checked_total("Canon", products.iter().map(|p| p.canon_raw));
        let canon_is_unit = !(reported.is_close(&sum_as_is) && !reported.is_close(&sum_units));
        Self { canon_is_unit, sum_units, sum_as_is, reported }
    }

    /// The canon for one unit of the line.
    pub fn unit_canon(&self, line: &ProductLine) -> Money {
        if self.canon_is_unit {
            line.canon_raw
        } else {
            (line.canon_raw / line.quantity).unwrap_or(line.canon_raw)
        }
    }

    /// The canon figure to store for the operation: the reported aggregate, or the line sum under the chosen
    /// interpretation when none was reported.
    pub fn operation_canon(&self) -> Money {
        if !self.reported.is_zero() {
            self.reported
        } else if self.canon_is_unit {
            self.sum_units
        } else {
            self.sum_as_is
        }
    }
}

//--------------------------------------    Reconciliation   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub snapshot: OrderSnapshot,
    /// Human-readable notes, one per field that changed, in a stable order.
    pub changes: Vec<String>,
    pub canon: CanonResolution,
    pub transfer_ref_changed: bool,
}

impl Reconciliation {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Computes the snapshot that results from applying `report` to `previous`.
///
/// * The internal reference is only ever filled in, never replaced. Discovering one on an order that was not marked
///   as sent marks it as sent.
/// * Code and transfer reference change only when the new value is non-empty and different.
/// * Amounts are overwritten on every poll.
/// * The status text is always taken from the report.
pub fn reconcile(previous: &OrderSnapshot, report: &StatusReport) -> Reconciliation {
    let mut snapshot = previous.clone();
    let mut changes = Vec::new();
    let mut canon = CanonResolution::default();
    let mut transfer_ref_changed = false;

    if let Some(op) = &report.operation {
        if let Some(internal) = op.internal_reference.as_deref().filter(|s| !s.is_empty()) {
            if snapshot.internal_reference.is_empty() {
                snapshot.internal_reference = internal.to_string();
                changes.push(format!("Infortisa internal reference: {internal}"));
            }
            if !snapshot.sent {
                snapshot.sent = true;
                changes.push("Order marked as sent to Infortisa (internal reference found)".to_string());
            }
        }
        if let Some(code) = op.code.as_deref().filter(|c| !c.is_empty() && *c != snapshot.op_code) {
            changes.push(change_note("Infortisa code", &snapshot.op_code, code));
            snapshot.op_code = code.to_string();
        }
        let reference = op.transfer_reference.as_deref().filter(|r| !r.is_empty() && *r != snapshot.transfer_ref);
        if let Some(reference) = reference {
            changes.push(change_note("Transfer reference", &snapshot.transfer_ref, reference));
            snapshot.transfer_ref = reference.to_string();
            transfer_ref_changed = true;
        }
        canon = CanonResolution::resolve(op.canon, &op.products);
        let amounts = compute_amounts(op, &canon);
        changes.extend(amount_changes(&previous.amounts, &amounts));
        snapshot.amounts = amounts;
        snapshot.products_summary = render_products_summary(&op.products, &canon, &amounts);
    } else {
        debug!("🔄️ Status response for {} carried no operation details", previous.customer_reference);
    }

    if report.status != snapshot.status_text {
        changes.push(change_note("Status", &snapshot.status_text, &report.status));
        snapshot.status_text = report.status.clone();
    }

    Reconciliation { snapshot, changes, canon, transfer_ref_changed }
}

fn compute_amounts(op: &OperationReport, canon: &CanonResolution) -> ProviderAmounts {
    ProviderAmounts {
        base: checked_total(
            "Base amount",
            op.products.iter().map(|p| line_amount(p, p.price_ex_canon, "Base amount")),
        ),
        canon_op: canon.operation_canon(),
        other_op: op.other_cost,
        shipping: op.shipping,
        tax: op.tax,
        total: op.total,
    }
}

/// `figure × quantity` for one product line. A product that cannot be represented counts as zero.
pub(crate) fn line_amount(line: &ProductLine, figure: Money, label: &str) -> Money {
    figure.checked_mul(line.quantity).unwrap_or_else(|| {
        warn!("🔄️ {label} for product {} overflows ({figure} x {}). Counting as zero.", line.sku, line.quantity);
        Money::zero()
    })
}

pub(crate) fn checked_total<I: IntoIterator<Item = Money>>(label: &str, values: I) -> Money {
    Money::checked_sum(values).unwrap_or_else(|| {
        warn!("🔄️ {label} total overflows. Counting it as zero.");
        Money::zero()
    })
}

fn amount_changes(old: &ProviderAmounts, new: &ProviderAmounts) -> Vec<String> {
    [
        ("Base amount", old.base, new.base),
        ("Canon", old.canon_op, new.canon_op),
        ("Other costs", old.other_op, new.other_op),
        ("Shipping", old.shipping, new.shipping),
        ("Tax", old.tax, new.tax),
        ("Total", old.total, new.total),
    ]
    .into_iter()
    .filter(|(_, old, new)| old != new)
    .map(|(label, old, new)| format!("{label}: {old} -> {new}"))
    .collect()
}

fn change_note(label: &str, old: &str, new: &str) -> String {
    if old.is_empty() {
        format!("{label}: {new}")
    } else {
        format!("{label}: {old} -> {new}")
    }
}
