//! Bridge host: compiles request templates once and drives each input record
//! through rendering, dispatch, and normalization.

pub mod bridge;
pub mod templates;

pub use bridge::Bridge;
pub use templates::RequestTemplates;
