//! Code generation macros for the value model and primitive impls.
//!
//! All accessor macros use `paste` internally for identifier concatenation.

// =============================================================================
// Value accessor generation
// =============================================================================

/// Generate is_xxx and as_xxx methods for scalar `Value` variants
///
/// # Generated methods per variant:
/// - `is_xxx(&self) -> bool` - kind check
/// - `as_xxx(&self) -> Option<T>` - copy out the scalar
macro_rules! impl_scalar_accessors {
    ($($variant:ident: $ty:ty),* $(,)?) => {
        ::paste::paste! {
            $(
                #[doc = "Check if this is a " $variant " value"]
                pub fn [<is_ $variant:lower>](&self) -> bool {
                    matches!(self, Self::$variant(_))
                }

                #[doc = "Get the " $variant " payload"]
                pub fn [<as_ $variant:lower>](&self) -> Option<$ty> {
                    match self { Self::$variant(v) => Some(*v), _ => None }
                }
            )*
        }
    };
}

/// Generate is_xxx, as_xxx and as_xxx_mut methods for container `Value` variants
macro_rules! impl_container_accessors {
    ($($variant:ident: $ty:ty),* $(,)?) => {
        ::paste::paste! {
            $(
                #[doc = "Check if this is a " $variant " value"]
                pub fn [<is_ $variant:lower>](&self) -> bool {
                    matches!(self, Self::$variant(_))
                }

                #[doc = "Get reference to the " $variant " payload"]
                pub fn [<as_ $variant:lower>](&self) -> Option<&$ty> {
                    match self { Self::$variant(v) => Some(v), _ => None }
                }

                #[doc = "Get mutable reference to the " $variant " payload"]
                pub fn [<as_ $variant:lower _mut>](&mut self) -> Option<&mut $ty> {
                    match self { Self::$variant(v) => Some(v), _ => None }
                }
            )*
        }
    };
}

// =============================================================================
// Diffable impls for primitives
// =============================================================================

/// Implement `Diffable` for integer types stored in one `Value` variant
///
/// Assignment accepts either integer variant as long as the number fits.
macro_rules! impl_diffable_int {
    ($variant:ident as $wide:ty: $($ty:ty),* $(,)?) => {$(
        impl $crate::reflect::Diffable for $ty {
            fn to_value(&self) -> $crate::value::Value {
                $crate::value::Value::$variant(*self as $wide)
            }

            fn set_value(
                &mut self,
                value: &$crate::value::Value,
            ) -> Result<(), $crate::error::ChangeError> {
                let converted = match value {
                    $crate::value::Value::Int(v) => <$ty>::try_from(*v).ok(),
                    $crate::value::Value::Uint(v) => <$ty>::try_from(*v).ok(),
                    $crate::value::Value::Null => Some(0),
                    other => {
                        return Err($crate::error::ChangeError::shape(
                            stringify!($ty),
                            other.kind(),
                        ))
                    }
                };
                *self = converted.ok_or_else(|| {
                    $crate::error::ChangeError::shape(stringify!($ty), "out-of-range integer")
                })?;
                Ok(())
            }

            fn reset(&mut self) {
                *self = 0;
            }
        }
    )*};
}

/// Implement `Diffable` for float types
macro_rules! impl_diffable_float {
    ($($ty:ty),* $(,)?) => {$(
        impl $crate::reflect::Diffable for $ty {
            fn to_value(&self) -> $crate::value::Value {
                $crate::value::Value::Float(f64::from(*self))
            }

            fn set_value(
                &mut self,
                value: &$crate::value::Value,
            ) -> Result<(), $crate::error::ChangeError> {
                *self = match value {
                    $crate::value::Value::Float(v) => *v as $ty,
                    $crate::value::Value::Int(v) => *v as $ty,
                    $crate::value::Value::Uint(v) => *v as $ty,
                    $crate::value::Value::Null => 0.0,
                    other => {
                        return Err($crate::error::ChangeError::shape(
                            stringify!($ty),
                            other.kind(),
                        ))
                    }
                };
                Ok(())
            }

            fn reset(&mut self) {
                *self = 0.0;
            }
        }
    )*};
}
