//! Formatting options applied when typed values are rendered back to text.

/// Default strftime pattern for readable timestamps.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Rendering placed where a value is unset.
pub const DEFAULT_NULL_STRING: &str = "-";

/// Options controlling how [`Value`](crate::types::Value)s are formatted.
///
/// # Examples
///
/// ```
/// use brolog::FormatOptions;
///
/// let options = FormatOptions::new()
///     .readable_time(true)
///     .utc(true)
///     .time_format("%Y-%m-%d %H:%M:%S");
/// assert!(options.is_readable_time());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    readable_time: bool,
    utc: bool,
    time_format: String,
    null_string: String,
}

impl FormatOptions {
    /// Create options with raw epoch timestamps and `-` for unset values.
    pub fn new() -> Self {
        Self {
            readable_time: false,
            utc: false,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            null_string: DEFAULT_NULL_STRING.to_string(),
        }
    }

    /// Render `time` values as calendar strings instead of epoch seconds.
    pub fn readable_time(mut self, enabled: bool) -> Self {
        self.readable_time = enabled;
        self
    }

    /// Render readable timestamps in UTC rather than the local time zone.
    pub fn utc(mut self, enabled: bool) -> Self {
        self.utc = enabled;
        self
    }

    /// Set the strftime pattern used for readable timestamps.
    pub fn time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }

    /// Set the string rendered for unset values.
    pub fn null_string(mut self, null: impl Into<String>) -> Self {
        self.null_string = null.into();
        self
    }

    pub fn is_readable_time(&self) -> bool {
        self.readable_time
    }

    pub fn is_utc(&self) -> bool {
        self.utc
    }

    pub fn get_time_format(&self) -> &str {
        &self.time_format
    }

    pub fn get_null_string(&self) -> &str {
        &self.null_string
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self::new()
    }
}
