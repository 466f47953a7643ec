//! Registry of contamination emitters.
//!
//! Sources are validated on the way in: location and height must be finite,
//! and power and both dispersion coefficients must be positive.

use plume_types::Source;

/// Errors that can occur when registering a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source's parameters are not physically meaningful.
    #[error("invalid source: {reason}")]
    InvalidSource {
        /// Explanation of which parameter is out of range.
        reason: String,
    },
}

/// Append-only list of the emitters in a simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRegistry {
    /// Registered sources in insertion order.
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Validate and append a source.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidSource`] if the location or height is
    /// not finite, or if power or either dispersion coefficient is not a
    /// positive finite number.
    pub fn add(&mut self, source: Source) -> Result<(), SourceError> {
        validate(&source)?;
        self.sources.push(source);
        Ok(())
    }

    /// Iterate sources in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    /// Borrow all sources.
    pub const fn as_slice(&self) -> &[Source] {
        self.sources.as_slice()
    }

    /// Number of registered sources.
    pub const fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered.
    pub const fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn validate(source: &Source) -> Result<(), SourceError> {
    if !source.location.is_finite() {
        return Err(invalid("location must be finite"));
    }
    if !source.height.is_finite() {
        return Err(invalid(format!("height must be finite, got {}", source.height)));
    }
    for (name, value) in [
        ("power", source.power),
        ("dispersion_horizontal", source.dispersion_horizontal),
        ("dispersion_vertical", source.dispersion_vertical),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid(format!("{name} must be positive, got {value}")));
        }
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> SourceError {
    SourceError::InvalidSource {
        reason: reason.into(),
    }
}
