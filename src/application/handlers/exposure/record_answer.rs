//! RecordAnswerHandler - applies the viewed -> answered mutation.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::exposure::{ExposureRecord, ExposureResult};
use crate::domain::foundation::{InstanceId, ItemId};
use crate::ports::{ExposureLedger, LedgerError};

/// Command to record the result of an answered item.
#[derive(Debug, Clone)]
pub struct RecordAnswerCommand {
    pub item_id: ItemId,
    pub instance_id: InstanceId,
    pub result: ExposureResult,
}

/// Handler for answer submissions from the delivery layer.
pub struct RecordAnswerHandler {
    ledger: Arc<dyn ExposureLedger>,
}

impl RecordAnswerHandler {
    pub fn new(ledger: Arc<dyn ExposureLedger>) -> Self {
        Self { ledger }
    }

    /// A second submission for the same (item, instance) fails with
    /// `DuplicateWrite`; callers retrying after a timeout treat that as done.
    pub async fn handle(&self, cmd: RecordAnswerCommand) -> Result<ExposureRecord, LedgerError> {
        match self
            .ledger
            .mark_answered(&cmd.item_id, &cmd.instance_id, cmd.result)
            .await
        {
            Ok(record) => {
                info!(
                    item = %record.item_id,
                    instance = %record.instance_id,
                    candidate = %record.candidate_id,
                    result = %record.result.as_str(),
                    "answer recorded"
                );
                Ok(record)
            }
            Err(e) => {
                debug!(item = %cmd.item_id, instance = %cmd.instance_id, error = %e, "answer not recorded");
                Err(e)
            }
        }
    }
}
