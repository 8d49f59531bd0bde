//! Stand-in processor.

use courier_core::bus::BusFuture;
use courier_core::{MessageContext, Processor, ProcessorError};

/// Answers every message with its own text; empty text gets no response text.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoProcessor;

impl Processor for EchoProcessor {
    fn process<'a>(
        &'a self,
        text: &'a str,
        context: &'a MessageContext,
    ) -> BusFuture<'a, Result<Option<String>, ProcessorError>> {
        Box::pin(async move {
            tracing::debug!(
                request_id = ?context.request_id(),
                user_id = ?context.user_id(),
                session_id = ?context.session_id(),
                "Echoing message"
            );
            Ok((!text.is_empty()).then(|| text.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_text() {
        let context = MessageContext::new();
        assert_eq!(EchoProcessor.process("hi", &context).await, Ok(Some("hi".to_string())));
        assert_eq!(EchoProcessor.process("", &context).await, Ok(None));
    }
}
