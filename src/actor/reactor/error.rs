use thiserror::Error;

use crate::model::{HeadId, ModeId};

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("Output manager finished")]
    ManagerFinished,
    #[error("No output manager available")]
    NoOutputManager,
    #[error("Head not found: {0:?}")]
    HeadNotFound(HeadId),
    #[error("Mode {1:?} not found on head {0:?}")]
    ModeNotFound(HeadId, ModeId),
    #[error("Compositor request failed: {0}")]
    Compositor(String),
}
