//! Generic `InputDevice` trait: the atomic OS-input primitives.
//!
//! Backends implement this trait and are shared (behind an `Arc`) by every
//! [`AppAgent`][crate::agent::AppAgent].  Nothing above this layer knows how
//! keystrokes actually reach the OS, so backends can be swapped without
//! touching planning or orchestration logic.

use sara_types::SaraError;

/// A synthetic keyboard.
///
/// Each primitive either succeeds or reports a [`SaraError::InputFailed`]
/// naming the primitive; none of them blocks indefinitely.
pub trait InputDevice: Send + Sync {
    /// Type `text` into whichever window currently has focus.
    ///
    /// # Errors
    ///
    /// Returns [`SaraError::InputFailed`] if the keystrokes cannot be sent.
    fn type_text(&self, text: &str) -> Result<(), SaraError>;

    /// Press and release a single named key, e.g. `"enter"` or `"tab"`.
    ///
    /// # Errors
    ///
    /// Returns [`SaraError::InputFailed`] if the key cannot be sent.
    fn press_key(&self, key: &str) -> Result<(), SaraError>;

    /// Press a chord: hold every key in order, then release in reverse,
    /// e.g. `["ctrl", "s"]`.
    ///
    /// # Errors
    ///
    /// Returns [`SaraError::InputFailed`] if the chord cannot be sent or
    /// `keys` is empty.
    fn hotkey(&self, keys: &[&str]) -> Result<(), SaraError>;
}

pub(crate) fn input_error(primitive: &str, details: impl Into<String>) -> SaraError {
    SaraError::InputFailed {
        primitive: primitive.to_string(),
        details: details.into(),
    }
}
