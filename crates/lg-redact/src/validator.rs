//! Seam for the external violation tagger.

use crate::{LogRecord, Result};

/// Tags a record with governance violations.
///
/// Implementations add an array of violations under
/// [`VIOLATIONS_KEY`](crate::VIOLATIONS_KEY). Detection logic lives with the
/// implementor; the engine only reads the tags back. An `Err` fails the log
/// call for that record.
pub trait Validator: Send + Sync {
    fn tag_violations(&self, record: &mut LogRecord) -> Result<()>;
}

/// A validator that tags nothing. Redaction then relies on policy alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn tag_violations(&self, _record: &mut LogRecord) -> Result<()> {
        Ok(())
    }
}

impl<F> Validator for F
where
    F: Fn(&mut LogRecord) -> Result<()> + Send + Sync,
{
    fn tag_violations(&self, record: &mut LogRecord) -> Result<()> {
        self(record)
    }
}
