use infortisa_tools::{TrackingReport, UNKNOWN_AGENT};
use quick_xml::escape::escape;

use crate::{
    sync_types::{SalesOrder, TrackingState},
    traits::{NotificationError, TrackingMessage},
};

/// What to do with the tracking part of a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingPlan {
    /// Merged tracking fields. `notified` is carried over unchanged; the caller sets it once delivery succeeds.
    pub tracking: TrackingState,
    /// The customer should be told about the tracking URL now.
    pub notify: bool,
    /// Set when the shipment details changed but no notification is due.
    pub change_note: Option<String>,
}

fn merge(new: &str, old: &str) -> String {
    if new.trim().is_empty() {
        old.to_string()
    } else {
        new.trim().to_string()
    }
}

pub fn plan_tracking(previous: &TrackingState, report: &TrackingReport) -> TrackingPlan {
    // The parser reports a missing agent as unknown, which must not overwrite a carrier we already know
    let reported_agent = if report.agent == UNKNOWN_AGENT { "" } else { report.agent.as_str() };
    let agent = match merge(reported_agent, &previous.agent) {
        a if a.is_empty() => UNKNOWN_AGENT.to_string(),
        a => a,
    };
    let tracking = TrackingState {
        url: merge(&report.url, &previous.url),
        number: merge(&report.number, &previous.number),
        status: merge(&report.status, &previous.status),
        status_detail: merge(&report.status_detail, &previous.status_detail),
        agent,
        notified: previous.notified,
    };
    let notify = !tracking.url.is_empty() && !tracking.notified;
    let details_changed = tracking.number != previous.number ||
        tracking.status != previous.status ||
        tracking.status_detail != previous.status_detail;
    let change_note = (!notify && details_changed).then(|| {
        let mut note = format!("Tracking updated. Status: {}", display_or_dash(&tracking.status));
        if !tracking.status_detail.is_empty() {
            note.push_str(&format!(" ({})", tracking.status_detail));
        }
        note.push_str(&format!(". Number: {}", display_or_dash(&tracking.number)));
        note
    });
    TrackingPlan { tracking, notify, change_note }
}

fn display_or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

/// Builds the customer message for the order's shipment. `status_datetime` is shown next to the status if it is
/// non-empty.
pub fn compose_tracking_message(
    order: &SalesOrder,
    tracking: &TrackingState,
    status_datetime: &str,
) -> Result<TrackingMessage, NotificationError> {
    let customer = order.customer.as_ref().ok_or(NotificationError::NoRecipient)?;
    let mut body = format!("<p>Hello {},</p>", escape(&customer.name));
    body.push_str(&format!("<p>Your order <b>{}</b> has shipped.</p><ul>", escape(&order.name)));
    body.push_str(&format!("<li>Carrier: {}</li>", escape(&tracking.agent)));
    if !tracking.status.is_empty() {
        let when = match status_datetime.trim() {
            "" => String::new(),
            dt => format!(" ({})", escape(dt)),
        };
        body.push_str(&format!("<li>Status: {}{when}</li>", escape(&tracking.status)));
    }
    if !tracking.number.is_empty() {
        body.push_str(&format!("<li>Tracking number: {}</li>", escape(&tracking.number)));
    }
    body.push_str("</ul>");
    body.push_str(&format!("<p><a href=\"{url}\" target=\"_blank\">{url}</a></p>", url = escape(&tracking.url)));
    Ok(TrackingMessage {
        order_id: order.id,
        recipient: customer.partner_id,
        recipient_email: customer.email.clone(),
        subject: format!("Tracking for your order {}", order.name),
        body,
    })
}
