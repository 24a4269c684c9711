use speed_api::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{stage}: {source}")]
    Store { stage: &'static str, source: StoreError },

    #[error("report output: {0}")]
    Output(#[from] std::io::Error),
}

impl EngineError {
    pub fn store(stage: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { stage, source }
    }
}
