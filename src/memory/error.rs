use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A released buffer's capacity is not a class this pool produces.
    IncorrectBufferSize { capacity: usize, max_capacity: usize },
    InvalidConfig(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::IncorrectBufferSize { capacity, max_capacity } => write!(
                f,
                "incorrect buffer size: capacity {capacity} is not a power-of-two class up to {max_capacity}"
            ),
            PoolError::InvalidConfig(msg) => write!(f, "invalid pool configuration: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}
