use std::{env, time::Duration};

use fsg_common::parse_boolean_flag;
use log::*;

use crate::sync_types::{JournalId, PartnerId, ProductId};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Engine settings. Loaded once and injected into [`crate::FulfillmentSyncApi`] at construction.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Orders are submitted with `Test = true` and are not processed by Infortisa.
    pub test_mode: bool,
    /// Orders are submitted blocked and must be released by hand on the Infortisa side.
    pub default_block: bool,
    /// The partner that represents Infortisa. Orders are only eligible if one of their products is sold by it.
    pub vendor_id: Option<PartnerId>,
    /// Product used for the goods line of the vendor bill.
    pub purchase_product_id: Option<ProductId>,
    /// Product used for the shipping line of the vendor bill.
    pub shipping_product_id: Option<ProductId>,
    pub purchase_journal_id: Option<JournalId>,
    pub bank_journal_id: Option<JournalId>,
    /// Create the vendor bill automatically once the order becomes payable. Off unless configured.
    pub auto_create_bill: bool,
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            test_mode: false,
            default_block: false,
            vendor_id: None,
            purchase_product_id: None,
            shipping_product_id: None,
            purchase_journal_id: None,
            bank_journal_id: None,
            auto_create_bill: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SyncConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let test_mode = env_flag("FSG_TEST_MODE", defaults.test_mode);
        if test_mode {
            warn!("🪛️ FSG_TEST_MODE is on. Orders will be sent to Infortisa as test orders.");
        }
        let default_block = env_flag("FSG_DEFAULT_BLOCK", defaults.default_block);
        let vendor_id = env_id::<PartnerId>("FSG_VENDOR_ID");
        if vendor_id.is_none() {
            warn!("🪛️ FSG_VENDOR_ID is not set. No order will be eligible for Infortisa synchronisation.");
        }
        let purchase_product_id = env_id::<ProductId>("FSG_PURCHASE_PRODUCT_ID");
        let shipping_product_id = env_id::<ProductId>("FSG_SHIPPING_PRODUCT_ID");
        let purchase_journal_id = env_id::<JournalId>("FSG_PURCHASE_JOURNAL_ID");
        let bank_journal_id = env_id::<JournalId>("FSG_BANK_JOURNAL_ID");
        let auto_create_bill = env_flag("FSG_AUTO_CREATE_BILL", defaults.auto_create_bill);
        let poll_interval = env::var("FSG_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid value for FSG_POLL_INTERVAL_SECS. {e}. Using the default.")
                    })
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or_else(|| {
                info!("🪛️ Polling Infortisa every {} seconds", DEFAULT_POLL_INTERVAL.as_secs());
                DEFAULT_POLL_INTERVAL
            });
        Self {
            test_mode,
            default_block,
            vendor_id,
            purchase_product_id,
            shipping_product_id,
            purchase_journal_id,
            bank_journal_id,
            auto_create_bill,
            poll_interval,
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(s) => parse_boolean_flag(Some(s), default),
        Err(_) => {
            debug!("🪛️ {key} is not set. Using {default}");
            default
        },
    }
}

fn env_id<T: From<i64>>(key: &str) -> Option<T> {
    let s = env::var(key).ok()?;
    match s.trim().parse::<i64>() {
        Ok(id) => Some(T::from(id)),
        Err(e) => {
            error!("🪛️ {s} is not a valid record id for {key}. {e}. Ignoring it.");
            None
        },
    }
}
