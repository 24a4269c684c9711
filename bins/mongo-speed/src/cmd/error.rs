#[derive(Debug, thiserror::Error)]
pub enum SpeedError {
    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Engine(#[from] speed_engine::EngineError),
}
