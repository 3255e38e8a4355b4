use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown cycle kind: {token}")]
    UnknownCycle { token: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid mesh file name: {file_name}")]
    InvalidMeshFile { file_name: String },
}
