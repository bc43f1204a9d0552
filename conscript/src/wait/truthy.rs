//! What counts as a successful poll.

/// Values a polled predicate can return.
///
/// A poll succeeds on the first truthy value: `true`, `Some(_)`, a
/// non-empty collection or string, a non-zero number.
pub trait Truthy {
    /// Whether this value ends the wait.
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl<T> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.is_some()
    }
}

impl<T> Truthy for Vec<T> {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for &str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

macro_rules! truthy_nonzero {
    ($($ty:ty),*) => {
        $(
            impl Truthy for $ty {
                fn is_truthy(&self) -> bool {
                    *self != 0
                }
            }
        )*
    };
}

truthy_nonzero!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(true.is_truthy());
        assert!(!false.is_truthy());
        assert!(Some(0).is_truthy());
        assert!(!None::<u8>.is_truthy());
        assert!(!Vec::<u8>::new().is_truthy());
        assert!(vec![1].is_truthy());
        assert!(!String::new().is_truthy());
        assert!("running".is_truthy());
        assert!(!0u32.is_truthy());
        assert!((-1i64).is_truthy());
    }
}
