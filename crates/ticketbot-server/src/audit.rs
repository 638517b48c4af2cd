use async_trait::async_trait;
use ticketbot_core::{AuditRecord, AuditSink, BotResult};

/// Fallback audit sink when no log channel is configured.
pub struct TracingAudit;

#[async_trait]
impl AuditSink for TracingAudit {
    async fn record(&self, record: &AuditRecord) -> BotResult<()> {
        tracing::info!(
            user = %record.user,
            app = %record.app_name,
            at = %record.timestamp,
            "Ticket verified"
        );
        Ok(())
    }
}
