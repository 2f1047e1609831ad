//! Specification loading, structural validation and operation extraction.

mod model;
mod resolver;
mod validate;

pub use model::{
    METHODS, OperationSpec, ParamLocation, ParameterSpec, SecurityRequirements, SecurityScheme,
    SpecVersion, Specification, resolve_ref, sanitize,
};
pub use resolver::{ResolvedSpec, SpecSource, resolve_spec};
pub use validate::validate_spec;
