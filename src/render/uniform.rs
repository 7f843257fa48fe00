//! Typed uniform variables.
//!
//! A [`UniformVariable`] is a tagged value; the tag is derived from the
//! payload, so the two can never disagree. Values are read back with
//! [`UniformVariable::get`], which fails with
//! [`RenderError::TypeMismatch`] when asked for the wrong type.

use std::fmt;

use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::error::{RenderError, RenderResult};

/// Type tag of a uniform variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Invalid,
    Float,
    VectorOfFloat,
    Int,
    VectorOfInt,
    Bool,
    VectorOfBool,
    Vec2,
    VectorOfVec2,
    Vec3,
    VectorOfVec3,
    Vec4,
    VectorOfVec4,
    IVec2,
    VectorOfIVec2,
    IVec3,
    VectorOfIVec3,
    IVec4,
    VectorOfIVec4,
    Mat2,
    VectorOfMat2,
    Mat3,
    VectorOfMat3,
    Mat4,
    VectorOfMat4,
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Types that can be stored in a [`UniformVariable`].
pub trait UniformValue: Sized {
    /// Tag of this type.
    const TYPE: UniformType;

    fn into_data(self) -> UniformData;

    fn from_data(data: &UniformData) -> Option<&Self>;
}

macro_rules! uniform_data {
    ($($ty:ty => $name:ident, $vector:ident;)*) => {
        /// Payload of a [`UniformVariable`].
        #[derive(Debug, Clone, PartialEq, Default)]
        pub enum UniformData {
            #[default]
            Invalid,
            $(
                $name($ty),
                $vector(Vec<$ty>),
            )*
        }

        impl UniformData {
            pub fn uniform_type(&self) -> UniformType {
                match self {
                    UniformData::Invalid => UniformType::Invalid,
                    $(
                        UniformData::$name(_) => UniformType::$name,
                        UniformData::$vector(_) => UniformType::$vector,
                    )*
                }
            }
        }

        $(
            impl UniformValue for $ty {
                const TYPE: UniformType = UniformType::$name;

                fn into_data(self) -> UniformData {
                    UniformData::$name(self)
                }

                fn from_data(data: &UniformData) -> Option<&Self> {
                    match data {
                        UniformData::$name(value) => Some(value),
                        _ => None,
                    }
                }
            }

            impl UniformValue for Vec<$ty> {
                const TYPE: UniformType = UniformType::$vector;

                fn into_data(self) -> UniformData {
                    UniformData::$vector(self)
                }

                fn from_data(data: &UniformData) -> Option<&Self> {
                    match data {
                        UniformData::$vector(value) => Some(value),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for UniformVariable {
                fn from(value: $ty) -> Self {
                    UniformVariable::new(value)
                }
            }

            impl From<Vec<$ty>> for UniformVariable {
                fn from(value: Vec<$ty>) -> Self {
                    UniformVariable::new(value)
                }
            }

            impl<const N: usize> From<[$ty; N]> for UniformVariable {
                fn from(value: [$ty; N]) -> Self {
                    UniformVariable::new(value.to_vec())
                }
            }
        )*
    };
}

uniform_data! {
    f32 => Float, VectorOfFloat;
    i32 => Int, VectorOfInt;
    bool => Bool, VectorOfBool;
    Vec2 => Vec2, VectorOfVec2;
    Vec3 => Vec3, VectorOfVec3;
    Vec4 => Vec4, VectorOfVec4;
    IVec2 => IVec2, VectorOfIVec2;
    IVec3 => IVec3, VectorOfIVec3;
    IVec4 => IVec4, VectorOfIVec4;
    Mat2 => Mat2, VectorOfMat2;
    Mat3 => Mat3, VectorOfMat3;
    Mat4 => Mat4, VectorOfMat4;
}

/// A typed uniform value.
///
/// Equality compares the type first and the value second. The name of a
/// variable is the key it is stored under.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UniformVariable {
    data: UniformData,
}

impl UniformVariable {
    pub fn new<T: UniformValue>(value: T) -> Self {
        Self {
            data: value.into_data(),
        }
    }

    /// Replace type and value.
    pub fn set<T: UniformValue>(&mut self, value: T) {
        self.data = value.into_data();
    }

    /// The value as `T`.
    pub fn get<T: UniformValue>(&self) -> RenderResult<&T> {
        T::from_data(&self.data).ok_or(RenderError::TypeMismatch {
            requested: T::TYPE,
            stored: self.uniform_type(),
        })
    }

    pub fn is_of_type<T: UniformValue>(&self) -> bool {
        self.uniform_type() == T::TYPE
    }

    pub fn uniform_type(&self) -> UniformType {
        self.data.uniform_type()
    }

    pub fn data(&self) -> &UniformData {
        &self.data
    }

    /// Whether no value has been set.
    pub fn is_empty(&self) -> bool {
        self.uniform_type() == UniformType::Invalid
    }
}

impl fmt::Display for UniformVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniformVariable[type = {}, value = ", self.uniform_type())?;
        match &self.data {
            UniformData::Invalid => write!(f, "null]"),
            UniformData::Float(v) => write!(f, "{v}]"),
            UniformData::Int(v) => write!(f, "{v}]"),
            UniformData::Bool(v) => write!(f, "{v}]"),
            other => write!(f, "{other:?}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_inferred_from_value() {
        assert_eq!(UniformVariable::from(1.0f32).uniform_type(), UniformType::Float);
        assert_eq!(UniformVariable::from(true).uniform_type(), UniformType::Bool);
        assert_eq!(
            UniformVariable::from(Vec3::new(1.0, 0.0, 0.0)).uniform_type(),
            UniformType::Vec3
        );
        assert_eq!(
            UniformVariable::from([1i32, 2, 3]).uniform_type(),
            UniformType::VectorOfInt
        );
        assert_eq!(
            UniformVariable::from(Mat4::IDENTITY).uniform_type(),
            UniformType::Mat4
        );
    }

    #[test]
    fn test_get_matching_type() {
        let var = UniformVariable::from(Vec4::ONE);
        assert_eq!(*var.get::<Vec4>().unwrap(), Vec4::ONE);
        assert!(var.is_of_type::<Vec4>());
    }

    #[test]
    fn test_get_mismatched_type() {
        let var = UniformVariable::from(2.0f32);
        let err = var.get::<i32>().unwrap_err();
        assert_eq!(
            err,
            RenderError::TypeMismatch {
                requested: UniformType::Int,
                stored: UniformType::Float,
            }
        );
    }

    #[test]
    fn test_set_replaces_type_and_value() {
        let mut var = UniformVariable::from(2.0f32);
        var.set(vec![1.0f32, 2.0]);
        assert_eq!(var.uniform_type(), UniformType::VectorOfFloat);
        assert_eq!(var.get::<Vec<f32>>().unwrap(), &vec![1.0, 2.0]);
        assert!(var.get::<f32>().is_err());
    }

    #[test]
    fn test_equality() {
        assert_eq!(UniformVariable::from(1i32), UniformVariable::from(1i32));
        assert_ne!(UniformVariable::from(1i32), UniformVariable::from(2i32));
        assert_ne!(UniformVariable::from(1i32), UniformVariable::from(1.0f32));
    }

    #[test]
    fn test_default_is_empty() {
        let var = UniformVariable::default();
        assert!(var.is_empty());
        assert_eq!(var.to_string(), "UniformVariable[type = Invalid, value = null]");
    }
}
