use std::sync::Arc;

use qsequencer_core::{
    Config, ConnectionState, ConnectionSupervisor, SanitizedConfig, Sequencer, SequencerStatus,
};

/// Shared application state
pub struct AppState {
    config: Config,
    sequencer: Arc<Sequencer>,
    supervisor: Arc<ConnectionSupervisor>,
}

impl AppState {
    pub fn new(
        config: Config,
        sequencer: Arc<Sequencer>,
        supervisor: Arc<ConnectionSupervisor>,
    ) -> Self {
        Self {
            config,
            sequencer,
            supervisor,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub async fn sequencer_status(&self) -> SequencerStatus {
        self.sequencer.status().await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.supervisor.state().await
    }

    pub fn client_name(&self) -> &str {
        self.supervisor.client_name()
    }
}
