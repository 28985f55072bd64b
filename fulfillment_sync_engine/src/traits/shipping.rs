use infortisa_tools::ShippingAddress;
use serde::{Deserialize, Serialize};

use crate::sync_types::SalesOrder;

/// The address a shipment should go to, as decided by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedShipping {
    pub address: ShippingAddress,
    /// When set, the goods are routed to the provider's special destination shop rather than the address.
    pub special_destination: bool,
}

/// Computes shipping addresses, including any address-override policy the host applies.
#[allow(async_fn_in_trait)]
pub trait ShippingAddressResolver {
    async fn resolve_shipping(&self, order: &SalesOrder) -> ResolvedShipping;
}
