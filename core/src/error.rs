use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Transfer queue is full")]
    QueueFull,

    #[error("Invalid symbol value: {0} (expected 0-255)")]
    InvalidSymbol(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Slot {slot} mismatch: {reason}")]
    SlotMismatch { slot: usize, reason: &'static str },

    #[error("Insufficient data")]
    InsufficientData,

    #[error("Operation timeout")]
    Timeout,

    #[error("Audio device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;
