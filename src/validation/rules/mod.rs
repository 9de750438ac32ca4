//! Individual validation rules, one concern per module.
pub(crate) mod bindings;
pub(crate) mod structural;
