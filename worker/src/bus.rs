//! Transport selection.

use courier_core::{BusMode, BusSettings, MessageBus};
use courier_redpanda::KafkaMessageBus;
use courier_testing::InMemoryMessageBus;
use std::sync::Arc;

/// Build the bus selected by `settings.mode` (`MESSAGE_BUS_MODE`).
#[must_use]
pub fn bus_from_settings(settings: &BusSettings) -> Arc<dyn MessageBus> {
    match settings.mode {
        BusMode::Mock => {
            tracing::info!("Using in-memory message bus");
            Arc::new(InMemoryMessageBus::new())
        },
        BusMode::Kafka => {
            tracing::info!(bootstrap = %settings.bootstrap_servers, "Using Kafka message bus");
            Arc::new(KafkaMessageBus::new(settings.clone()))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::BusState;

    #[test]
    fn selected_bus_starts_stopped() {
        for mode in [BusMode::Mock, BusMode::Kafka] {
            let settings = BusSettings {
                mode,
                ..BusSettings::default()
            };
            assert_eq!(bus_from_settings(&settings).state(), BusState::Stopped);
        }
    }
}
