use std::sync::Arc;

use crate::clients::{ElevenLabsClient, VoiceProvider};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::history::GenerationHistory;
use crate::services::{
    AuthService, CredentialAuthService, CredentialDirectoryService, GenerationService,
    UserDirectoryService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub history: Arc<GenerationHistory>,

    pub provider: Arc<dyn VoiceProvider>,

    pub auth_service: Arc<dyn AuthService>,

    pub directory_service: Arc<dyn UserDirectoryService>,

    pub generation_service: Arc<GenerationService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let provider = Arc::new(ElevenLabsClient::new(&config.provider)?);
        Self::with_provider(config, provider).await
    }

    /// Builds the state around an already constructed provider client.
    pub async fn with_provider(
        config: Config,
        provider: Arc<dyn VoiceProvider>,
    ) -> anyhow::Result<Self> {
        let credentials = Arc::new(CredentialStore::from_config(&config));
        credentials
            .initialize()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize credential store: {e}"))?;

        let history = Arc::new(GenerationHistory::new(config.history.retain_per_user));

        let auth_service = Arc::new(CredentialAuthService::new(credentials.clone()))
            as Arc<dyn AuthService + Send + Sync + 'static>;

        let directory_service = Arc::new(CredentialDirectoryService::new(
            credentials.clone(),
            history.clone(),
        )) as Arc<dyn UserDirectoryService + Send + Sync + 'static>;

        let generation_service = Arc::new(GenerationService::new(
            provider.clone(),
            history.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            history,
            provider,
            auth_service,
            directory_service,
            generation_service,
        })
    }
}
