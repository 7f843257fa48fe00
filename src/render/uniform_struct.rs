//! Structs mirroring `struct` uniforms declared in a program.
//!
//! A GLSL struct uniform is set member by member: `light.color`, or
//! `lights[2].color` for an element of an array of structs. Types declared
//! with [`uniform_struct!`](crate::uniform_struct) implement [`UniformStruct`]
//! and expand into exactly those variables.

use super::uniform::UniformVariable;

/// A struct whose members map onto the members of a program's struct uniform.
pub trait UniformStruct {
    /// The member variables of the uniform `name`, or of element `index` of
    /// the uniform array `name`.
    fn uniform_variables(&self, name: &str, index: Option<usize>)
        -> Vec<(String, UniformVariable)>;
}

/// Full uniform name of `member` of the struct uniform `name`.
pub fn member_name(name: &str, index: Option<usize>, member: &str) -> String {
    match index {
        Some(index) => format!("{name}[{index}].{member}"),
        None => format!("{name}.{member}"),
    }
}

/// Declare a struct matching a struct uniform of a program.
///
/// ```
/// use glam::Vec3;
///
/// sequoia_render::uniform_struct! {
///     #[derive(Debug, Clone)]
///     pub struct PointLight {
///         pub position: Vec3,
///         pub color: Vec3,
///         pub intensity: f32,
///     }
/// }
///
/// let light = PointLight {
///     position: Vec3::ZERO,
///     color: Vec3::ONE,
///     intensity: 2.0,
/// };
/// let mut command = sequoia_render::RenderCommand::new(None);
/// command
///     .global_state_mut()
///     .set_shared_struct("u_lights", &light, Some(1));
/// assert!(command.global_state().shared("u_lights[1].intensity").is_some());
/// ```
#[macro_export]
macro_rules! uniform_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($(#[$field_meta])* $field_vis $field: $ty,)*
        }

        impl $crate::render::UniformStruct for $name {
            fn uniform_variables(
                &self,
                name: &str,
                index: ::std::option::Option<usize>,
            ) -> ::std::vec::Vec<(::std::string::String, $crate::render::UniformVariable)> {
                ::std::vec![$((
                    $crate::render::uniform_struct::member_name(name, index, stringify!($field)),
                    $crate::render::UniformVariable::from(::std::clone::Clone::clone(&self.$field)),
                ),)*]
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use std::collections::HashMap;

    crate::uniform_struct! {
        struct Scalars {
            a: f32,
            b: i32,
            c: bool,
        }
    }

    crate::uniform_struct! {
        struct Vectors {
            a: Vec3,
            b: Mat4,
        }
    }

    #[test]
    fn test_member_names() {
        assert_eq!(member_name("u_light", None, "color"), "u_light.color");
        assert_eq!(member_name("u_lights", Some(3), "color"), "u_lights[3].color");
    }

    #[test]
    fn test_struct_flattening() {
        let scalars = Scalars {
            a: 4.1,
            b: 2,
            c: false,
        };
        let vectors = Vectors {
            a: Vec3::ONE,
            b: Mat4::from_scale(Vec3::splat(2.0)),
        };

        let mut map: HashMap<String, UniformVariable> = HashMap::new();
        map.extend(scalars.uniform_variables("Scalars", Some(0)));
        map.extend(vectors.uniform_variables("Vectors", None));

        assert_eq!(map.len(), 5);
        assert_eq!(map["Scalars[0].a"], UniformVariable::from(4.1f32));
        assert_eq!(map["Scalars[0].b"], UniformVariable::from(2));
        assert_eq!(map["Scalars[0].c"], UniformVariable::from(false));
        assert_eq!(map["Vectors.a"], UniformVariable::from(Vec3::ONE));
        assert_eq!(
            map["Vectors.b"].get::<Mat4>().unwrap(),
            &Mat4::from_scale(Vec3::splat(2.0))
        );
    }
}
