use std::path::Path;

use anyhow::{Context, Result};
use fulfillment_sync_engine::{
    reconcile::{reconcile, Reconciliation},
    sync_types::OrderSnapshot,
    LifecycleState,
};
use infortisa_tools::{
    encode_utf16,
    parse_status_response,
    BlockRequest,
    InfortisaApi,
    InfortisaConfig,
    StatusReport,
};
use log::*;
use serde::Serialize;

use crate::{
    command_def::Command,
    formatting::{format_block_response, format_status_view},
};

/// Everything the operator gets to see about one status response.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub customer_reference: String,
    pub lifecycle: String,
    pub report: StatusReport,
    pub snapshot: OrderSnapshot,
    pub changes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl StatusView {
    /// Reconciles the report against an empty snapshot, which is what a freshly sent order looks like.
    pub fn new(customer_reference: &str, report: StatusReport) -> Self {
        let previous = OrderSnapshot { customer_reference: customer_reference.to_string(), ..Default::default() };
        let Reconciliation { snapshot, changes, .. } = reconcile(&previous, &report);
        let lifecycle = LifecycleState::from_op_code(&snapshot.op_code).to_string();
        Self { customer_reference: customer_reference.to_string(), lifecycle, report, snapshot, changes, raw: None }
    }

    pub fn with_raw(mut self, raw: String) -> Self {
        self.raw = Some(raw);
        self
    }
}

pub async fn handle_command(command: Command, json: bool) -> Result<()> {
    match command {
        Command::Status { reference, raw } => fetch_status(&reference, raw, json).await,
        Command::Parse { file } => parse_status_file(&file, json),
        Command::Block { reference } => send_block_request(BlockRequest::block(&reference), "Block").await,
        Command::Unblock { reference } => send_block_request(BlockRequest::unblock(&reference), "Unblock").await,
        Command::Cancel { reference } => send_block_request(BlockRequest::cancel(&reference), "Cancellation").await,
    }
}

fn new_infortisa_api() -> Result<InfortisaApi> {
    let config = InfortisaConfig::new_from_env_or_default();
    debug!("🪛️ Using Infortisa at {}", config.base_url);
    InfortisaApi::new(config).context("Could not create the Infortisa client")
}

async fn fetch_status(reference: &str, raw: bool, json: bool) -> Result<()> {
    let api = new_infortisa_api()?;
    let response = api.order_status(reference).await?;
    response.ensure_status(&[200])?;
    let report = parse_status_response(&response.body);
    let mut view = StatusView::new(reference, report);
    if raw {
        view = view.with_raw(response.body);
    }
    print_view(&view, json)
}

fn parse_status_file(path: &Path, json: bool) -> Result<()> {
    let body = std::fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let report = parse_status_response(&body);
    let reference = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    print_view(&StatusView::new(&reference, report), json)
}

fn print_view(view: &StatusView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
    } else {
        println!("{}", format_status_view(view)?);
    }
    Ok(())
}

async fn send_block_request(request: BlockRequest, action: &str) -> Result<()> {
    let api = new_infortisa_api()?;
    let xml = request.to_xml()?;
    let response = api.block_order(encode_utf16(&xml)).await?;
    response.ensure_status(&[200])?;
    info!("📦️ {action} request for {} accepted", request.customer_reference);
    println!("{}", format_block_response(action, &request.customer_reference, &response));
    Ok(())
}
