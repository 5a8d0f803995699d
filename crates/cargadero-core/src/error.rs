use thiserror::Error;

/// Failures raised while a batch row is being normalized or inserted. Row
/// errors abort the whole batch: the loader attaches a diagnostic and rolls
/// the transaction back, so a partial load can never be observed.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The date cell was missing or unparseable at insertion time. User-facing
    /// message kept verbatim from the upstream consumers' contract.
    #[error("Fecha vacía")]
    EmptyDate,

    #[error("Error en campo 'Cita' con valor '{value}': {reason}")]
    InvalidCita { value: String, reason: String },

    #[error("la columna '{name}' no existe en el archivo")]
    MissingColumn { name: String },

    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;
