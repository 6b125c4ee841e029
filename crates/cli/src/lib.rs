//! Line-oriented JSON driver for the inventory services.
//!
//! Each input line is one [`Command`] tagged by `op`; each reply is either
//! `{"ok": true, "result": ...}` or `{"ok": false, "error": {"code", "message"}}`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use thiserror::Error;

use loomerp_core::{RequisitionId, YarnId};
use loomerp_infra::{
    CatalogError, CommitError, InventoryServices, LedgerFilter, RequisitionFilter,
    TransactionFilter,
};
use loomerp_inventory::{RawTransactionRequest, YarnCatalogEntry};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    RegisterYarn {
        yarn: YarnId,
        yarn_name: String,
        #[serde(default)]
        min_quantity: Decimal,
    },
    Transaction {
        request: JsonValue,
    },
    Ledger {
        yarn: YarnId,
    },
    Ledgers {
        #[serde(default)]
        filter: LedgerFilter,
        #[serde(default)]
        limit: Option<u32>,
        #[serde(default)]
        offset: Option<u32>,
    },
    Transactions {
        #[serde(default)]
        filter: TransactionFilter,
    },
    Requisitions {
        #[serde(default)]
        filter: RequisitionFilter,
    },
    MarkPoSent {
        requisition: RequisitionId,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("malformed command: {0}")]
    Malformed(String),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Malformed(_) => "validation_error",
            CliError::Commit(CommitError::Validation(_)) => "validation_error",
            CliError::Commit(CommitError::NotFound(_)) => "not_found",
            CliError::Commit(CommitError::Conflict(_)) => "conflict",
            CliError::Commit(CommitError::Store(_)) | CliError::Catalog(_) => "store_error",
            CliError::Encode(_) => "encode_error",
        }
    }
}

/// Parse and run one input line, always producing a reply.
pub async fn handle_line(services: &InventoryServices, line: &str) -> JsonValue {
    let result = match serde_json::from_str::<Command>(line) {
        Ok(command) => execute(services, command).await,
        Err(e) => Err(CliError::Malformed(e.to_string())),
    };

    match result {
        Ok(result) => json!({ "ok": true, "result": result }),
        Err(err) => {
            tracing::warn!(code = err.code(), error = %err, "command failed");
            json!({
                "ok": false,
                "error": { "code": err.code(), "message": err.to_string() },
            })
        }
    }
}

pub async fn execute(
    services: &InventoryServices,
    command: Command,
) -> Result<JsonValue, CliError> {
    let coordinator = &services.coordinator;
    match command {
        Command::RegisterYarn {
            yarn,
            yarn_name,
            min_quantity,
        } => {
            let entry = YarnCatalogEntry::new(yarn, yarn_name, min_quantity);
            services.catalog.register(entry.clone()).await?;
            encode(&entry)
        }
        Command::Transaction { request } => {
            let raw = RawTransactionRequest::from_json(request).map_err(CommitError::from)?;
            encode(&coordinator.create_transaction(&raw).await?)
        }
        Command::Ledger { yarn } => match coordinator.get_ledger(yarn).await? {
            Some(ledger) => encode(&ledger),
            None => Err(CommitError::NotFound(format!("ledger for yarn {yarn}")).into()),
        },
        Command::Ledgers {
            filter,
            limit,
            offset,
        } => encode(
            &coordinator
                .query_ledgers(&filter, coordinator.pagination(limit, offset))
                .await?,
        ),
        Command::Transactions { filter } => encode(&coordinator.query_transactions(&filter).await?),
        Command::Requisitions { filter } => encode(&coordinator.query_requisitions(&filter).await?),
        Command::MarkPoSent { requisition } => {
            encode(&coordinator.mark_po_sent(requisition).await?)
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<JsonValue, CliError> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loomerp_infra::{InventoryConfig, build_services};

    async fn services() -> InventoryServices {
        build_services(&InventoryConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn registered_yarn_accepts_transactions() {
        let services = services().await;
        let yarn = YarnId::new();

        let reply = handle_line(
            &services,
            &format!(
                r#"{{"op":"register_yarn","yarn":"{yarn}","yarn_name":"Cotton 40s","min_quantity":"50"}}"#
            ),
        )
        .await;
        assert_eq!(reply["ok"], true);

        let reply = handle_line(
            &services,
            &format!(
                r#"{{"op":"transaction","request":{{"type":"stocked","yarnId":"{yarn}","netWeight":40,"numberOfCones":4}}}}"#
            ),
        )
        .await;
        assert_eq!(reply["ok"], true, "{reply}");
        assert_eq!(reply["result"]["ledger"]["inventory_status"], "low_stock");
        assert_eq!(reply["result"]["requisition"]["alert_status"], "below_minimum");

        let reply = handle_line(
            &services,
            r#"{"op":"requisitions","filter":{"po_sent":false}}"#,
        )
        .await;
        assert_eq!(reply["result"].as_array().map(Vec::len), Some(1));

        let reply = handle_line(&services, r#"{"op":"ledgers","limit":10}"#).await;
        assert_eq!(reply["result"]["total"], 1);
        assert_eq!(reply["result"]["has_more"], false);
    }

    #[tokio::test]
    async fn failures_are_reported_per_line() {
        let services = services().await;

        let reply = handle_line(&services, "not json").await;
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["error"]["code"], "validation_error");

        let ghost = YarnId::new();
        let reply = handle_line(
            &services,
            &format!(
                r#"{{"op":"transaction","request":{{"type":"stocked","yarn":"{ghost}","netWeight":1}}}}"#
            ),
        )
        .await;
        assert_eq!(reply["error"]["code"], "not_found");

        let reply = handle_line(
            &services,
            &format!(r#"{{"op":"transaction","request":{{"type":"consumed","yarn":"{ghost}"}}}}"#),
        )
        .await;
        assert_eq!(reply["error"]["code"], "validation_error");

        let reply = handle_line(
            &services,
            &format!(r#"{{"op":"mark_po_sent","requisition":"{}"}}"#, RequisitionId::new()),
        )
        .await;
        assert_eq!(reply["error"]["code"], "not_found");

        let reply = handle_line(&services, &format!(r#"{{"op":"ledger","yarn":"{ghost}"}}"#)).await;
        assert_eq!(reply["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn overflowing_transaction_does_not_stop_the_stream() {
        let services = services().await;
        let yarn = YarnId::new();
        let stock = format!(
            r#"{{"op":"transaction","request":{{"type":"stocked","yarn":"{yarn}","netWeight":"{max}","totalWeight":"{max}"}}}}"#,
            max = Decimal::MAX
        );

        let register =
            format!(r#"{{"op":"register_yarn","yarn":"{yarn}","yarn_name":"Silk 20/22"}}"#);
        assert_eq!(handle_line(&services, &register).await["ok"], true);
        assert_eq!(handle_line(&services, &stock).await["ok"], true);

        let reply = handle_line(&services, &stock).await;
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["error"]["code"], "validation_error");

        let reply = handle_line(
            &services,
            &format!(
                r#"{{"op":"transaction","request":{{"type":"blocked","yarn":"{yarn}","blockedNetWeight":10}}}}"#
            ),
        )
        .await;
        assert_eq!(reply["ok"], true, "{reply}");
    }
}
