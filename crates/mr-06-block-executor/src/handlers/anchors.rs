//! Anchor transactions. The work is done by the anchor processor.

use super::{HandlerInput, TransactionHandler};
use crate::domain::entities::HandlerOutput;
use crate::domain::errors::ExecutorError;
use crate::service::anchors;
use crate::service::context::ExecContext;
use shared_types::{TransactionBody, TransactionType};

fn check_principal(ctx: &ExecContext<'_>, input: &HandlerInput<'_>) -> Result<(), ExecutorError> {
    let pool = ctx.node.id().anchor_pool_url();
    if input.principal_url() != &pool {
        return Err(ExecutorError::BadRequest(format!(
            "anchors are addressed to {pool}, not {}",
            input.principal_url()
        )));
    }
    Ok(())
}

/// Applies a directory anchor.
pub struct DirectoryAnchor;

impl TransactionHandler for DirectoryAnchor {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::DirectoryAnchor
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::DirectoryAnchor(anchor) = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        check_principal(ctx, &input)?;
        anchors::apply_directory_anchor(ctx, input.status, anchor)?;
        Ok(HandlerOutput::default())
    }
}

/// Applies a partition anchor on the directory.
pub struct PartitionAnchor;

impl TransactionHandler for PartitionAnchor {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::PartitionAnchor
    }

    fn execute(&self, ctx: &mut ExecContext<'_>, input: HandlerInput<'_>) -> Result<HandlerOutput, ExecutorError> {
        let TransactionBody::PartitionAnchor(anchor) = &input.transaction.body else {
            return Err(ExecutorError::Unsupported(input.transaction.transaction_type()));
        };
        check_principal(ctx, &input)?;
        anchors::apply_partition_anchor(ctx, input.status, anchor)?;
        Ok(HandlerOutput::default())
    }
}
