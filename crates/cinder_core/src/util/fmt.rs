//! Formatting helpers for error messages and diagnostics.

use std::fmt;

/// Displays a slice as a comma-separated list without allocating.
#[derive(Debug)]
pub struct DisplayableSlice<'a, T>(&'a [T]);

impl<'a, T: fmt::Display> fmt::Display for DisplayableSlice<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, item) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

pub trait IntoDisplayableSlice<T> {
    fn displayable(&self) -> DisplayableSlice<'_, T>;
}

impl<T: fmt::Display> IntoDisplayableSlice<T> for [T] {
    fn displayable(&self) -> DisplayableSlice<'_, T> {
        DisplayableSlice(self)
    }
}

impl<T: fmt::Display> IntoDisplayableSlice<T> for Vec<T> {
    fn displayable(&self) -> DisplayableSlice<'_, T> {
        DisplayableSlice(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_slice() {
        assert_eq!(["a", "b", "c"].displayable().to_string(), "a, b, c");
        assert_eq!(Vec::<String>::new().displayable().to_string(), "");
    }
}
