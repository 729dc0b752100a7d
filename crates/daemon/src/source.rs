// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound work from the control plane.
//!
//! The HTTP/RPC poller is an external collaborator; the daemon consumes
//! parsed messages through the [`MessageSource`] seam.

use crate::command::InboundCommand;
use crate::reporter::{ReplySink, SinkError};
use async_trait::async_trait;
use steward_core::reply::SendReplyPayload;
use steward_core::CommandId;
use steward_engine::{DetailedStatus, InstanceAssociation};
use tracing::info;

/// One message pulled from the control plane.
pub enum InboundMessage {
    /// Full association listing; replaces the schedule table.
    AssociationListing(Vec<InstanceAssociation>),
    /// One-shot document execution request.
    Command(InboundCommand),
    /// Out-of-band cancel for a previously accepted command.
    CancelCommand(CommandId),
}

/// Transport seam for fetching pending work.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn poll(&self) -> Result<Vec<InboundMessage>, SinkError>;
}

/// Source with no control plane attached; the agent runs whatever the
/// local schedule table already holds.
#[derive(Default)]
pub struct NullMessageSource;

#[async_trait]
impl MessageSource for NullMessageSource {
    async fn poll(&self) -> Result<Vec<InboundMessage>, SinkError> {
        Ok(Vec::new())
    }
}

/// Sink that logs payloads instead of posting them. Stands in for the
/// HTTP client in local runs and tests.
#[derive(Default)]
pub struct LoggingReplySink;

#[async_trait]
impl ReplySink for LoggingReplySink {
    async fn send_reply(
        &self,
        document_id: &str,
        payload: &SendReplyPayload,
    ) -> Result<(), SinkError> {
        info!(
            document_id,
            status = %payload.document_status,
            trace = %payload.document_trace_output,
            "status reply",
        );
        Ok(())
    }

    async fn update_association_status(
        &self,
        association_id: &str,
        status: DetailedStatus,
        _payload: &SendReplyPayload,
    ) -> Result<(), SinkError> {
        info!(association_id, status = ?status, "association status");
        Ok(())
    }
}
