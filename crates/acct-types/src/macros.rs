/// Generates impls for shims wrapping a type as another.
///
/// This must be a newtype a la `struct Foo(Bar);`.
#[macro_export]
macro_rules! impl_thin_wrapper {
    ($target:ty => $inner:ty) => {
        impl $target {
            pub const fn new(v: $inner) -> Self {
                Self(v)
            }

            pub const fn inner(&self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $target {
            fn from(value: $inner) -> $target {
                <$target>::new(value)
            }
        }

        impl From<$target> for $inner {
            fn from(value: $target) -> $inner {
                value.0
            }
        }
    };
}

/// Generates impls for newtypes over fixed byte arrays: accessors, hex
/// `Debug`/`Display`, and conversions.
#[macro_export]
macro_rules! impl_buf_wrapper {
    ($target:ty, $len:expr) => {
        impl $target {
            pub const fn new(buf: [u8; $len]) -> Self {
                Self(buf)
            }

            pub const fn zero() -> Self {
                Self([0; $len])
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $target {
            fn from(value: [u8; $len]) -> Self {
                Self(value)
            }
        }

        impl From<$target> for [u8; $len] {
            fn from(value: $target) -> [u8; $len] {
                value.0
            }
        }

        impl ::std::fmt::Debug for $target {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($target), ::const_hex::encode(self.0))
            }
        }

        impl ::std::fmt::Display for $target {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&::const_hex::encode(self.0))
            }
        }
    };
}
