use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[cfg(feature = "json")]
    #[error("failed to parse mix config JSON: {message}")]
    JsonParse { message: String },
}

pub(crate) fn check_mix_duration(duration: f32) -> Result<(), Error> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(Error::InvalidValue {
            message: "mix duration must be finite and >= 0".to_string(),
        });
    }
    Ok(())
}
